//! Decoded sample buffers and the per-sample accessor
//!
//! [`DecodedAudio`] is immutable after construction except for two fields
//! published once by the normalizer: the normalization gain and the ready
//! flag. The gain is stored before `ready` is released, and every reader
//! acquires `ready` before touching the gain, so a reader that sees `ready`
//! also sees the final gain.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use super::parser::{AudioFormat, SampleEncoding, WaveFile};
use crate::types::Sample;

/// Raw sample bytes plus everything needed to decode them
#[derive(Debug)]
pub struct DecodedAudio {
    format: AudioFormat,
    frame_count: usize,
    bytes: Box<[u8]>,
    /// f64 bits of the divisor mapping raw values to ±1.0
    normalization_gain: AtomicU64,
    ready: AtomicBool,
}

impl DecodedAudio {
    /// Build from a parsed container
    ///
    /// Integer PCM is ready immediately with a gain of 2^(bits-1), where bits
    /// counts whole bytes. Float data starts unready at gain 1.0 and waits
    /// for [`publish_gain`](Self::publish_gain).
    pub fn from_wave(wave: WaveFile) -> Self {
        let format = wave.format;
        let (gain, ready) = match format.encoding {
            SampleEncoding::Int => (integer_gain(format.bytes_per_sample), true),
            SampleEncoding::Float => (1.0, false),
        };

        Self {
            format,
            frame_count: wave.frame_count,
            bytes: wave.data.into_boxed_slice(),
            normalization_gain: AtomicU64::new(gain.to_bits()),
            ready: AtomicBool::new(ready),
        }
    }

    /// Zero-length asset used by idle emitter slots
    pub(crate) fn silent() -> Self {
        let format = AudioFormat {
            encoding: SampleEncoding::Int,
            channels: 1,
            sample_rate: crate::types::DEFAULT_SAMPLE_RATE,
            bits_per_sample: 16,
            bytes_per_sample: 2,
            frame_stride: 2,
        };
        Self {
            format,
            frame_count: 0,
            bytes: Box::new([]),
            normalization_gain: AtomicU64::new(integer_gain(2).to_bits()),
            ready: AtomicBool::new(true),
        }
    }

    pub fn format(&self) -> &AudioFormat {
        &self.format
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.format.channels as usize
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.format.sample_rate
    }

    #[inline]
    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_float(&self) -> bool {
        self.format.is_float()
    }

    /// Duration at the source rate
    pub fn duration_seconds(&self) -> f64 {
        self.frame_count as f64 / self.format.sample_rate as f64
    }

    /// Whether decoding (and normalization, for float data) has finished
    #[inline]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Current normalization divisor
    ///
    /// Only final once [`is_ready`](Self::is_ready) returns true.
    pub fn normalization_gain(&self) -> f64 {
        f64::from_bits(self.normalization_gain.load(Ordering::Relaxed))
    }

    /// Store the final gain and mark the asset ready
    pub(crate) fn publish_gain(&self, gain: f64) {
        self.normalization_gain
            .store(gain.to_bits(), Ordering::Relaxed);
        self.ready.store(true, Ordering::Release);
    }

    /// Block the calling thread until the asset is ready
    ///
    /// Control path only. Returns false if `timeout` elapsed first.
    pub fn wait_until_ready(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.is_ready() {
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        true
    }

    /// Normalized amplitude of one sample
    ///
    /// Silence while the asset is not ready, and for any channel or frame
    /// outside the buffer.
    #[inline]
    pub fn sample(&self, channel: usize, frame: usize) -> Sample {
        if !self.is_ready() {
            return 0.0;
        }
        self.decode(channel, frame, self.normalization_gain())
    }

    /// Decode ignoring readiness; used by the normalizer's scan
    #[inline]
    pub(crate) fn raw_sample(&self, channel: usize, frame: usize) -> f64 {
        self.decode_f64(channel, frame, 1.0)
    }

    #[inline]
    fn decode(&self, channel: usize, frame: usize, gain: f64) -> Sample {
        self.decode_f64(channel, frame, gain) as Sample
    }

    fn decode_f64(&self, channel: usize, frame: usize, gain: f64) -> f64 {
        if frame >= self.frame_count || channel >= self.channels() {
            return 0.0;
        }

        let width = self.format.bytes_per_sample;
        let start = frame * self.format.frame_stride + channel * width;
        let Some(bytes) = self.bytes.get(start..start + width) else {
            return 0.0;
        };

        match self.format.encoding {
            SampleEncoding::Int => decode_int(bytes) as f64 / gain,
            SampleEncoding::Float => decode_float(bytes) / gain,
        }
    }
}

/// Divisor for integer PCM of the given byte width
fn integer_gain(bytes_per_sample: usize) -> f64 {
    (2.0f64).powi(bytes_per_sample as i32 * 8 - 1)
}

/// Assemble a little-endian two's-complement integer of 1 to 8 bytes
///
/// 8-bit WAVE samples are unsigned with silence at 128.
#[inline]
fn decode_int(bytes: &[u8]) -> i64 {
    let mut value: u64 = 0;
    for (i, &b) in bytes.iter().enumerate() {
        value |= (b as u64) << (8 * i);
    }

    if bytes.len() == 1 {
        return value as i64 - 128;
    }

    // Move the sign bit to bit 63 and shift back arithmetically
    let unused = 64 - 8 * bytes.len() as u32;
    ((value << unused) as i64) >> unused
}

#[inline]
fn decode_float(bytes: &[u8]) -> f64 {
    match *bytes {
        [a, b, c, d] => f32::from_le_bytes([a, b, c, d]) as f64,
        [a, b, c, d, e, f, g, h] => f64::from_le_bytes([a, b, c, d, e, f, g, h]),
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_file::parser::{AudioFormat, ParseReport, FORMAT_IEEE_FLOAT, FORMAT_PCM};

    fn decoded(format_tag: u16, channels: u16, bits: u16, data: Vec<u8>) -> DecodedAudio {
        let format = AudioFormat::from_fields(format_tag, channels, 44100, 0, bits).unwrap();
        let frame_count = data.len() / format.frame_stride;
        DecodedAudio::from_wave(WaveFile {
            format,
            data,
            frame_count,
            report: ParseReport::default(),
        })
    }

    #[test]
    fn test_pcm16_scaling() {
        let values = [0i16, 1, -1, i16::MAX, i16::MIN, 12345];
        let data = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        let audio = decoded(FORMAT_PCM, 1, 16, data);

        assert!(audio.is_ready());
        for (frame, v) in values.iter().enumerate() {
            assert_eq!(audio.sample(0, frame), *v as f32 / 32768.0);
        }
        assert!(audio.sample(0, 4) >= -1.0 && audio.sample(0, 3) < 1.0);
    }

    #[test]
    fn test_pcm8_is_unsigned() {
        let audio = decoded(FORMAT_PCM, 1, 8, vec![0x80, 0x00, 0xFF]);
        assert_eq!(audio.sample(0, 0), 0.0);
        assert_eq!(audio.sample(0, 1), -1.0);
        assert_eq!(audio.sample(0, 2), 127.0 / 128.0);
    }

    #[test]
    fn test_pcm24_sign_extension() {
        // -2 and +0x123456 as packed 24-bit little endian
        let data = vec![0xFE, 0xFF, 0xFF, 0x56, 0x34, 0x12];
        let audio = decoded(FORMAT_PCM, 1, 24, data);
        assert_eq!(audio.sample(0, 0), -2.0 / 8_388_608.0);
        assert_eq!(audio.sample(0, 1), 0x123456 as f32 / 8_388_608.0);
    }

    #[test]
    fn test_pcm32_extremes() {
        let data = [i32::MIN, -1]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        let audio = decoded(FORMAT_PCM, 1, 32, data);
        assert_eq!(audio.sample(0, 0), -1.0);
        assert!(audio.sample(0, 1) < 0.0);
    }

    #[test]
    fn test_interleaved_channels() {
        let data = [100i16, -200, 300, -400]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        let audio = decoded(FORMAT_PCM, 2, 16, data);
        assert_eq!(audio.frame_count(), 2);
        assert_eq!(audio.sample(1, 0), -200.0 / 32768.0);
        assert_eq!(audio.sample(0, 1), 300.0 / 32768.0);
    }

    #[test]
    fn test_out_of_range_is_silent() {
        let data = [i16::MAX].iter().flat_map(|v| v.to_le_bytes()).collect();
        let audio = decoded(FORMAT_PCM, 1, 16, data);
        assert_eq!(audio.sample(0, 1), 0.0);
        assert_eq!(audio.sample(0, usize::MAX), 0.0);
        assert_eq!(audio.sample(3, 0), 0.0);
    }

    #[test]
    fn test_float_silent_until_published() {
        let data = [0.5f32, -0.25]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        let audio = decoded(FORMAT_IEEE_FLOAT, 1, 32, data);

        assert!(!audio.is_ready());
        assert_eq!(audio.sample(0, 0), 0.0);

        audio.publish_gain(2.0);
        assert!(audio.is_ready());
        assert_eq!(audio.sample(0, 0), 0.25);
        assert_eq!(audio.sample(0, 1), -0.125);
    }

    #[test]
    fn test_float64_decoding() {
        let data = [0.75f64].iter().flat_map(|v| v.to_le_bytes()).collect();
        let audio = decoded(FORMAT_IEEE_FLOAT, 1, 64, data);
        audio.publish_gain(1.0);
        assert_eq!(audio.sample(0, 0), 0.75);
    }

    #[test]
    fn test_silent_asset() {
        let audio = DecodedAudio::silent();
        assert!(audio.is_ready());
        assert_eq!(audio.frame_count(), 0);
        assert_eq!(audio.sample(0, 0), 0.0);
    }
}
