//! RIFF/WAVE container parsing
//!
//! Walks the chunk list of a WAVE container and extracts the sample format
//! and the raw sample bytes. Only uncompressed integer PCM and IEEE float
//! data are accepted. Everything else in the container is skipped by length.
//!
//! # Layout
//!
//! ```text
//! "RIFF" <u32 size> "WAVE"
//! { <4-byte tag> <u32 LE length> <payload> [pad byte if length is odd] }*
//! ```
//!
//! The `fmt ` chunk must precede the `data` chunk. A `smpl` chunk after the
//! data is recognized loop metadata; any other trailing chunk is handled by
//! [`TrailingDataPolicy`].

use std::io::{ErrorKind, Read, Seek, SeekFrom};

use serde::{Deserialize, Serialize};

use super::error::{AudioFileError, ChunkId, ParseWarning};

/// Linear PCM compression code
pub const FORMAT_PCM: u16 = 0x0001;
/// IEEE float compression code
pub const FORMAT_IEEE_FLOAT: u16 = 0x0003;
/// WAVE_FORMAT_EXTENSIBLE; the real code lives in the sub-format GUID
pub const FORMAT_EXTENSIBLE: u16 = 0xFFFE;

const RIFF: ChunkId = ChunkId(*b"RIFF");
const WAVE: ChunkId = ChunkId(*b"WAVE");

/// Trailing 12 bytes shared by every KSDATAFORMAT_SUBTYPE GUID
const SUBTYPE_GUID_TAIL: [u8; 12] = [
    0x00, 0x00, 0x10, 0x00, 0x80, 0x00, 0x00, 0xAA, 0x00, 0x38, 0x9B, 0x71,
];

/// What to do when the outer `RIFF`/`WAVE` magic does not match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MagicPolicy {
    /// Fail the load with [`AudioFileError::MalformedContainer`]
    #[default]
    Strict,
    /// Warn and keep parsing chunks after the 12-byte header
    Tolerant,
}

/// What to do with unrecognized chunks after the `data` chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TrailingDataPolicy {
    Ignore,
    /// Record a [`ParseWarning::TrailingChunk`] and log it
    #[default]
    Warn,
    /// Fail the load with [`AudioFileError::UnexpectedTrailingData`]
    Reject,
}

/// Parser knobs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    pub magic: MagicPolicy,
    pub trailing_data: TrailingDataPolicy,
    /// Accept 18-byte and WAVE_FORMAT_EXTENSIBLE (40-byte) fmt chunks
    pub accept_extended_fmt: bool,
}

/// Integer or floating point samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleEncoding {
    Int,
    Float,
}

/// Sample format from the fmt chunk, validated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub encoding: SampleEncoding,
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    /// Bytes per single-channel sample
    pub bytes_per_sample: usize,
    /// Bytes per interleaved frame (block align)
    pub frame_stride: usize,
}

impl AudioFormat {
    /// Validate raw fmt fields
    ///
    /// A block align of zero falls back to `bytes_per_sample * channels`.
    pub fn from_fields(
        format_tag: u16,
        channels: u16,
        sample_rate: u32,
        block_align: u16,
        bits_per_sample: u16,
    ) -> Result<Self, AudioFileError> {
        let encoding = match format_tag {
            FORMAT_PCM => SampleEncoding::Int,
            FORMAT_IEEE_FLOAT => SampleEncoding::Float,
            other => {
                return Err(AudioFileError::UnsupportedFormat(format!(
                    "compression code {:#06x}",
                    other
                )))
            }
        };

        if channels == 0 {
            return Err(AudioFileError::MalformedContainer("zero channels".into()));
        }
        if sample_rate == 0 {
            return Err(AudioFileError::MalformedContainer("zero sample rate".into()));
        }
        if bits_per_sample == 0 {
            return Err(AudioFileError::MalformedContainer(
                "zero bits per sample".into(),
            ));
        }

        let bytes_per_sample = (bits_per_sample as usize + 7) / 8;
        match encoding {
            SampleEncoding::Float if bytes_per_sample != 4 && bytes_per_sample != 8 => {
                return Err(AudioFileError::UnsupportedFormat(format!(
                    "{}-bit float samples",
                    bits_per_sample
                )));
            }
            SampleEncoding::Int if bytes_per_sample > 8 => {
                return Err(AudioFileError::UnsupportedFormat(format!(
                    "{}-bit integer samples",
                    bits_per_sample
                )));
            }
            _ => {}
        }

        let min_stride = bytes_per_sample * channels as usize;
        let frame_stride = match block_align as usize {
            0 => min_stride,
            align if align < min_stride => {
                return Err(AudioFileError::MalformedContainer(format!(
                    "block align {} smaller than {} channels of {} bytes",
                    align, channels, bytes_per_sample
                )));
            }
            align => align,
        };

        Ok(Self {
            encoding,
            channels,
            sample_rate,
            bits_per_sample,
            bytes_per_sample,
            frame_stride,
        })
    }

    pub fn is_float(&self) -> bool {
        self.encoding == SampleEncoding::Float
    }
}

/// Non-fatal findings of a parse
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseReport {
    pub warnings: Vec<ParseWarning>,
    /// Chunks skipped before the data chunk (LIST, fact, cue, ...)
    pub skipped_chunks: Vec<ChunkId>,
}

impl ParseReport {
    pub fn is_truncated(&self) -> bool {
        self.warnings
            .iter()
            .any(|w| matches!(w, ParseWarning::TruncatedData { .. }))
    }

    fn warn(&mut self, warning: ParseWarning) {
        log::warn!("{}", warning);
        self.warnings.push(warning);
    }
}

/// Result of a successful parse
#[derive(Debug)]
pub struct WaveFile {
    pub format: AudioFormat,
    /// Raw interleaved sample bytes, exactly `frame_count * frame_stride` long
    pub data: Vec<u8>,
    pub frame_count: usize,
    pub report: ParseReport,
}

/// Parse a WAVE container from any seekable byte stream
pub fn parse_wave<R: Read + Seek>(
    mut reader: R,
    options: &ParseOptions,
) -> Result<WaveFile, AudioFileError> {
    let mut report = ParseReport::default();

    let mut header = [0u8; 12];
    if read_full(&mut reader, &mut header)? < header.len() {
        return Err(AudioFileError::MalformedContainer(
            "file shorter than the 12-byte RIFF header".into(),
        ));
    }

    let riff = ChunkId([header[0], header[1], header[2], header[3]]);
    let form = ChunkId([header[8], header[9], header[10], header[11]]);
    if riff != RIFF || form != WAVE {
        match options.magic {
            MagicPolicy::Strict => {
                return Err(AudioFileError::MalformedContainer(format!(
                    "expected \"RIFF\"/\"WAVE\" header, found {} / {}",
                    riff, form
                )));
            }
            MagicPolicy::Tolerant => report.warn(ParseWarning::BadMagic { riff, form }),
        }
    }

    let mut format: Option<AudioFormat> = None;
    let mut samples: Option<(Vec<u8>, usize)> = None;

    while let Some((id, length)) = read_chunk_header(&mut reader)? {
        if samples.is_some() {
            match &id.0 {
                b"smpl" => log::debug!("Skipping smpl chunk ({} bytes)", length),
                _ => match options.trailing_data {
                    TrailingDataPolicy::Ignore => {}
                    TrailingDataPolicy::Warn => report.warn(ParseWarning::TrailingChunk(id)),
                    TrailingDataPolicy::Reject => {
                        return Err(AudioFileError::UnexpectedTrailingData(id))
                    }
                },
            }
            skip_chunk(&mut reader, length)?;
            continue;
        }

        match &id.0 {
            b"fmt " => {
                format = Some(read_fmt_chunk(&mut reader, length, options)?);
            }
            b"data" => {
                let format = format.as_ref().ok_or(AudioFileError::DataBeforeFormat)?;
                samples = Some(read_data_chunk(&mut reader, length, format, &mut report)?);
            }
            _ => {
                log::debug!("Skipping chunk {} ({} bytes)", id, length);
                report.skipped_chunks.push(id);
                skip_chunk(&mut reader, length)?;
            }
        }
    }

    let format = format.ok_or(AudioFileError::MissingChunk("fmt "))?;
    let (data, frame_count) = samples.ok_or(AudioFileError::MissingChunk("data"))?;

    Ok(WaveFile {
        format,
        data,
        frame_count,
        report,
    })
}

/// Read until `buf` is full or the stream ends; returns bytes read
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Next chunk tag and length, or `None` at end of stream
fn read_chunk_header<R: Read>(reader: &mut R) -> Result<Option<(ChunkId, u32)>, AudioFileError> {
    let mut header = [0u8; 8];
    let n = read_full(reader, &mut header)?;
    if n < header.len() {
        if n > 0 {
            log::debug!("Ignoring {} stray bytes at end of container", n);
        }
        return Ok(None);
    }

    let id = ChunkId([header[0], header[1], header[2], header[3]]);
    let length = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
    Ok(Some((id, length)))
}

/// Skip a chunk payload, including the pad byte of odd lengths
fn skip_chunk<R: Seek>(reader: &mut R, length: u32) -> Result<(), AudioFileError> {
    let padded = length as i64 + (length % 2) as i64;
    reader.seek(SeekFrom::Current(padded))?;
    Ok(())
}

fn read_fmt_chunk<R: Read + Seek>(
    reader: &mut R,
    length: u32,
    options: &ParseOptions,
) -> Result<AudioFormat, AudioFileError> {
    let extended = length == 18 || length == 40;
    if length != 16 && !(options.accept_extended_fmt && extended) {
        return Err(AudioFileError::UnsupportedFormat(format!(
            "{}-byte fmt chunk",
            length
        )));
    }

    let mut fmt = vec![0u8; length as usize];
    reader.read_exact(&mut fmt).map_err(|e| match e.kind() {
        ErrorKind::UnexpectedEof => {
            AudioFileError::MalformedContainer("fmt chunk cut short".into())
        }
        _ => AudioFileError::Io(e),
    })?;

    let mut format_tag = u16::from_le_bytes([fmt[0], fmt[1]]);
    let channels = u16::from_le_bytes([fmt[2], fmt[3]]);
    let sample_rate = u32::from_le_bytes([fmt[4], fmt[5], fmt[6], fmt[7]]);
    // fmt[8..12] is the byte rate, derivable from the rest
    let block_align = u16::from_le_bytes([fmt[12], fmt[13]]);
    let bits_per_sample = u16::from_le_bytes([fmt[14], fmt[15]]);

    if format_tag == FORMAT_EXTENSIBLE {
        if fmt.len() < 40 || fmt[28..40] != SUBTYPE_GUID_TAIL {
            return Err(AudioFileError::UnsupportedFormat(
                "extensible fmt without a known sub-format".into(),
            ));
        }
        let sub_format = u32::from_le_bytes([fmt[24], fmt[25], fmt[26], fmt[27]]);
        format_tag = u16::try_from(sub_format).map_err(|_| {
            AudioFileError::UnsupportedFormat(format!("sub-format {:#010x}", sub_format))
        })?;
    }

    let format =
        AudioFormat::from_fields(format_tag, channels, sample_rate, block_align, bits_per_sample)?;
    log::debug!("fmt chunk: {:?}", format);
    Ok(format)
}

fn read_data_chunk<R: Read + Seek>(
    reader: &mut R,
    length: u32,
    format: &AudioFormat,
    report: &mut ParseReport,
) -> Result<(Vec<u8>, usize), AudioFileError> {
    let stride = format.frame_stride;
    if length as usize % stride != 0 {
        return Err(AudioFileError::InvalidDataLength { length, stride });
    }

    let mut data = Vec::new();
    reader.by_ref().take(length as u64).read_to_end(&mut data)?;

    if data.len() < length as usize {
        let kept_frames = data.len() / stride;
        data.truncate(kept_frames * stride);
        report.warn(ParseWarning::TruncatedData {
            declared: length,
            kept_frames,
        });
        return Ok((data, kept_frames));
    }

    if length % 2 == 1 {
        reader.seek(SeekFrom::Current(1))?;
    }
    let frame_count = data.len() / stride;
    Ok((data, frame_count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_file::fixtures::{chunk, fmt_chunk, riff, wav_bytes};
    use std::io::Cursor;

    fn parse(bytes: Vec<u8>) -> Result<WaveFile, AudioFileError> {
        parse_wave(Cursor::new(bytes), &ParseOptions::default())
    }

    #[test]
    fn test_parse_pcm16_stereo() {
        let data: Vec<u8> = [1i16, -1, 1000, -1000]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();
        let wave = parse(wav_bytes(FORMAT_PCM, 2, 22050, 16, &data)).unwrap();

        assert_eq!(wave.format.encoding, SampleEncoding::Int);
        assert_eq!(wave.format.channels, 2);
        assert_eq!(wave.format.sample_rate, 22050);
        assert_eq!(wave.format.bytes_per_sample, 2);
        assert_eq!(wave.format.frame_stride, 4);
        assert_eq!(wave.frame_count, 2);
        assert_eq!(wave.data, data);
        assert!(wave.report.warnings.is_empty());
    }

    #[test]
    fn test_bad_magic_strict_and_tolerant() {
        let mut bytes = wav_bytes(FORMAT_PCM, 1, 8000, 8, &[0x80, 0x80]);
        bytes[8..12].copy_from_slice(b"AVI ");

        assert!(matches!(
            parse(bytes.clone()),
            Err(AudioFileError::MalformedContainer(_))
        ));

        let options = ParseOptions {
            magic: MagicPolicy::Tolerant,
            ..Default::default()
        };
        let wave = parse_wave(Cursor::new(bytes), &options).unwrap();
        assert_eq!(wave.frame_count, 2);
        assert!(matches!(
            wave.report.warnings[0],
            ParseWarning::BadMagic { .. }
        ));
    }

    #[test]
    fn test_short_file_is_malformed() {
        assert!(matches!(
            parse(b"RIFF".to_vec()),
            Err(AudioFileError::MalformedContainer(_))
        ));
    }

    #[test]
    fn test_compressed_format_rejected() {
        // 0x0002 = MS ADPCM
        let bytes = wav_bytes(0x0002, 1, 8000, 4, &[0u8; 4]);
        assert!(matches!(
            parse(bytes),
            Err(AudioFileError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_extended_fmt_needs_option() {
        let mut fmt = fmt_chunk(FORMAT_PCM, 1, 8000, 16);
        // cbSize = 0 turns the 16-byte payload into an 18-byte one
        fmt.extend_from_slice(&[0, 0]);
        fmt[4..8].copy_from_slice(&18u32.to_le_bytes());
        let bytes = riff(&[fmt, chunk(b"data", &[0, 0])]);

        assert!(matches!(
            parse(bytes.clone()),
            Err(AudioFileError::UnsupportedFormat(_))
        ));

        let options = ParseOptions {
            accept_extended_fmt: true,
            ..Default::default()
        };
        let wave = parse_wave(Cursor::new(bytes), &options).unwrap();
        assert_eq!(wave.frame_count, 1);
    }

    #[test]
    fn test_extensible_float_sub_format() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&FORMAT_EXTENSIBLE.to_le_bytes());
        payload.extend_from_slice(&2u16.to_le_bytes());
        payload.extend_from_slice(&48000u32.to_le_bytes());
        payload.extend_from_slice(&(48000u32 * 8).to_le_bytes());
        payload.extend_from_slice(&8u16.to_le_bytes());
        payload.extend_from_slice(&32u16.to_le_bytes());
        payload.extend_from_slice(&22u16.to_le_bytes()); // cbSize
        payload.extend_from_slice(&32u16.to_le_bytes()); // valid bits
        payload.extend_from_slice(&3u32.to_le_bytes()); // channel mask
        payload.extend_from_slice(&(FORMAT_IEEE_FLOAT as u32).to_le_bytes());
        payload.extend_from_slice(&SUBTYPE_GUID_TAIL);
        let bytes = riff(&[chunk(b"fmt ", &payload), chunk(b"data", &[0u8; 8])]);

        let options = ParseOptions {
            accept_extended_fmt: true,
            ..Default::default()
        };
        let wave = parse_wave(Cursor::new(bytes), &options).unwrap();
        assert!(wave.format.is_float());
        assert_eq!(wave.format.channels, 2);
        assert_eq!(wave.frame_count, 1);
    }

    #[test]
    fn test_data_before_fmt() {
        let bytes = riff(&[chunk(b"data", &[0, 0]), fmt_chunk(FORMAT_PCM, 1, 8000, 16)]);
        assert!(matches!(parse(bytes), Err(AudioFileError::DataBeforeFormat)));
    }

    #[test]
    fn test_missing_chunks() {
        let bytes = riff(&[fmt_chunk(FORMAT_PCM, 1, 8000, 16)]);
        assert!(matches!(parse(bytes), Err(AudioFileError::MissingChunk("data"))));

        let bytes = riff(&[chunk(b"LIST", b"abcd")]);
        assert!(matches!(parse(bytes), Err(AudioFileError::MissingChunk("fmt "))));
    }

    #[test]
    fn test_data_length_not_whole_frames() {
        let bytes = wav_bytes(FORMAT_PCM, 2, 8000, 16, &[0u8; 6]);
        assert!(matches!(
            parse(bytes),
            Err(AudioFileError::InvalidDataLength { length: 6, stride: 4 })
        ));
    }

    #[test]
    fn test_truncated_data_keeps_whole_frames() {
        let mut bytes = wav_bytes(FORMAT_PCM, 2, 8000, 16, &[7u8; 16]);
        // Stream ends one byte into the third frame
        bytes.truncate(bytes.len() - 7);

        let wave = parse(bytes).unwrap();
        assert_eq!(wave.frame_count, 2);
        assert_eq!(wave.data.len(), 8);
        assert!(wave.report.is_truncated());
    }

    #[test]
    fn test_unknown_chunks_skipped_with_padding() {
        let bytes = riff(&[
            chunk(b"junk", &[1, 2, 3]),
            fmt_chunk(FORMAT_PCM, 1, 8000, 8),
            chunk(b"LIST", &[9; 5]),
            chunk(b"data", &[0x10, 0x20, 0x30]),
        ]);
        let wave = parse(bytes).unwrap();
        assert_eq!(wave.data, vec![0x10, 0x20, 0x30]);
        assert_eq!(wave.frame_count, 3);
        assert_eq!(
            wave.report.skipped_chunks,
            vec![ChunkId(*b"junk"), ChunkId(*b"LIST")]
        );
    }

    #[test]
    fn test_trailing_chunk_policies() {
        let bytes = riff(&[
            fmt_chunk(FORMAT_PCM, 1, 8000, 16),
            chunk(b"data", &[0, 0]),
            chunk(b"id3 ", &[0; 10]),
        ]);

        let wave = parse(bytes.clone()).unwrap();
        assert_eq!(
            wave.report.warnings,
            vec![ParseWarning::TrailingChunk(ChunkId(*b"id3 "))]
        );

        let ignore = ParseOptions {
            trailing_data: TrailingDataPolicy::Ignore,
            ..Default::default()
        };
        let wave = parse_wave(Cursor::new(bytes.clone()), &ignore).unwrap();
        assert!(wave.report.warnings.is_empty());

        let reject = ParseOptions {
            trailing_data: TrailingDataPolicy::Reject,
            ..Default::default()
        };
        assert!(matches!(
            parse_wave(Cursor::new(bytes), &reject),
            Err(AudioFileError::UnexpectedTrailingData(_))
        ));
    }

    #[test]
    fn test_smpl_after_data_is_accepted() {
        let bytes = riff(&[
            fmt_chunk(FORMAT_PCM, 1, 8000, 16),
            chunk(b"data", &[0, 0]),
            chunk(b"smpl", &[0; 36]),
        ]);
        let reject = ParseOptions {
            trailing_data: TrailingDataPolicy::Reject,
            ..Default::default()
        };
        let wave = parse_wave(Cursor::new(bytes), &reject).unwrap();
        assert!(wave.report.warnings.is_empty());
    }

    #[test]
    fn test_format_validation() {
        assert!(matches!(
            AudioFormat::from_fields(FORMAT_IEEE_FLOAT, 1, 8000, 0, 16),
            Err(AudioFileError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            AudioFormat::from_fields(FORMAT_PCM, 0, 8000, 0, 16),
            Err(AudioFileError::MalformedContainer(_))
        ));
        assert!(matches!(
            AudioFormat::from_fields(FORMAT_PCM, 2, 8000, 2, 16),
            Err(AudioFileError::MalformedContainer(_))
        ));

        // 20-bit samples padded into 3 bytes, frames padded to 4 bytes
        let format = AudioFormat::from_fields(FORMAT_PCM, 1, 8000, 4, 20).unwrap();
        assert_eq!(format.bytes_per_sample, 3);
        assert_eq!(format.frame_stride, 4);

        let format = AudioFormat::from_fields(FORMAT_PCM, 2, 8000, 0, 24).unwrap();
        assert_eq!(format.frame_stride, 6);
    }
}
