//! Per-sample rate conversion
//!
//! Emitter positions count output frames. Each output frame maps back to a
//! fractional source position `position * ratio` where
//! `ratio = source_rate / output_rate`:
//!
//! - **Exact** (equal rates): the source frame at `position`.
//! - **Upsample** (ratio < 1): linear interpolation between the two nearest
//!   source frames.
//! - **Downsample** (ratio > 1): a triangular window spanning `ratio` source
//!   frames either side of the center, normalized by the weights actually
//!   used so the output level does not depend on the ratio.
//!
//! Source frame indices and loop lengths are computed with integer math so
//! the end of a source is detected at the same output frame no matter how
//! long an emitter has been playing.

use crate::audio_file::DecodedAudio;
use crate::types::Sample;

/// Conversion strategy chosen from the rate ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateStrategy {
    Exact,
    Upsample,
    Downsample,
}

/// Cached mapping from one source rate to one output rate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateConversion {
    source_rate: u64,
    output_rate: u64,
    ratio: f64,
    strategy: RateStrategy,
}

impl RateConversion {
    pub fn new(source_rate: u32, output_rate: u32) -> Self {
        let source_rate = source_rate.max(1) as u64;
        let output_rate = output_rate.max(1) as u64;
        let strategy = match source_rate.cmp(&output_rate) {
            std::cmp::Ordering::Equal => RateStrategy::Exact,
            std::cmp::Ordering::Less => RateStrategy::Upsample,
            std::cmp::Ordering::Greater => RateStrategy::Downsample,
        };

        Self {
            source_rate,
            output_rate,
            ratio: source_rate as f64 / output_rate as f64,
            strategy,
        }
    }

    /// Conversion for an asset played at `output_rate`
    pub fn for_audio(audio: &DecodedAudio, output_rate: u32) -> Self {
        Self::new(audio.sample_rate(), output_rate)
    }

    #[inline]
    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    #[inline]
    pub fn strategy(&self) -> RateStrategy {
        self.strategy
    }

    /// Source frame under an output position: floor(position * ratio)
    #[inline]
    pub fn source_frame(&self, position: u64) -> u64 {
        ((position as u128 * self.source_rate as u128) / self.output_rate as u128) as u64
    }

    /// Output frames needed to play `frame_count` source frames
    ///
    /// The smallest position whose source frame reaches `frame_count`, i.e.
    /// ceil(frame_count / ratio).
    #[inline]
    pub fn output_length(&self, frame_count: usize) -> u64 {
        let numerator = frame_count as u128 * self.output_rate as u128;
        numerator.div_ceil(self.source_rate as u128) as u64
    }

    /// Whether `position` is at or past the end of a source of `frame_count` frames
    #[inline]
    pub fn is_exhausted(&self, position: u64, frame_count: usize) -> bool {
        self.source_frame(position) >= frame_count as u64
    }
}

/// Amplitude of `channel` at output frame `position`
#[inline]
pub fn converted_sample(
    audio: &DecodedAudio,
    conversion: &RateConversion,
    position: u64,
    channel: usize,
) -> Sample {
    match conversion.strategy {
        RateStrategy::Exact => audio.sample(channel, position as usize),
        RateStrategy::Upsample => interpolate(audio, conversion, position, channel),
        RateStrategy::Downsample => triangle_window(audio, conversion, position, channel),
    }
}

#[inline]
fn interpolate(
    audio: &DecodedAudio,
    conversion: &RateConversion,
    position: u64,
    channel: usize,
) -> Sample {
    let base = conversion.source_frame(position);
    let frame_count = audio.frame_count() as u64;
    if base >= frame_count {
        return 0.0;
    }

    let exact = position as f64 * conversion.ratio;
    let frac = (exact - base as f64).clamp(0.0, 1.0) as Sample;
    let next = (base + 1).min(frame_count - 1);

    let a = audio.sample(channel, base as usize);
    let b = audio.sample(channel, next as usize);
    a + (b - a) * frac
}

fn triangle_window(
    audio: &DecodedAudio,
    conversion: &RateConversion,
    position: u64,
    channel: usize,
) -> Sample {
    let frame_count = audio.frame_count() as i64;
    if frame_count == 0 {
        return 0.0;
    }

    let ratio = conversion.ratio;
    let center = position as f64 * ratio;

    // Integer frames strictly inside (center - ratio, center + ratio)
    let first = ((center - ratio).floor() as i64 + 1).max(0);
    let last = ((center + ratio).ceil() as i64 - 1).min(frame_count - 1);

    let mut sum = 0.0f64;
    let mut weights = 0.0f64;
    for frame in first..=last {
        let weight = ratio - (frame as f64 - center).abs();
        if weight <= 0.0 {
            continue;
        }
        sum += audio.sample(channel, frame as usize) as f64 * weight;
        weights += weight;
    }

    if weights > 0.0 {
        (sum / weights) as Sample
    } else {
        0.0
    }
}
