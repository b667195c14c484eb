//! Core types shared across the mixer
//!
//! Output stream description, sample encodings and the engine-wide
//! constants that size the pre-allocated buffers.

use serde::{Deserialize, Serialize};

/// Audio sample type (32-bit float for processing)
pub type Sample = f32;

/// Default output sample rate when the device does not dictate one
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// Default number of output channels
pub const DEFAULT_CHANNELS: u16 = 2;

/// Maximum frames mixed per pass; larger requests are processed in chunks
pub const MAX_BUFFER_FRAMES: usize = 8192;

/// Sample encoding expected by the output device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Unsigned 8-bit, silence at 0x80
    U8,
    /// Signed 8-bit
    S8,
    /// Signed 16-bit
    #[default]
    S16,
    /// Signed 24-bit packed into 3 bytes
    S24,
    /// Signed 32-bit
    S32,
    /// IEEE 754 32-bit float
    F32,
}

impl OutputFormat {
    /// Bytes occupied by one sample of one channel
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            OutputFormat::U8 | OutputFormat::S8 => 1,
            OutputFormat::S16 => 2,
            OutputFormat::S24 => 3,
            OutputFormat::S32 | OutputFormat::F32 => 4,
        }
    }
}

/// Byte order of multi-byte output samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Endianness {
    Little,
    Big,
}

impl Endianness {
    /// Byte order of the machine we are running on
    pub fn native() -> Self {
        if cfg!(target_endian = "big") {
            Endianness::Big
        } else {
            Endianness::Little
        }
    }
}

impl Default for Endianness {
    fn default() -> Self {
        Self::native()
    }
}

/// Description of the stream the engine renders into
///
/// Fixed for the lifetime of a [`MixEngine`](crate::engine::MixEngine);
/// the device callback hands over raw bytes laid out accordingly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSpec {
    pub sample_rate: u32,
    pub channels: u16,
    pub format: OutputFormat,
    #[serde(default)]
    pub endianness: Endianness,
}

impl OutputSpec {
    pub fn new(sample_rate: u32, channels: u16, format: OutputFormat) -> Self {
        Self {
            sample_rate,
            channels,
            format,
            endianness: Endianness::native(),
        }
    }

    pub fn with_endianness(mut self, endianness: Endianness) -> Self {
        self.endianness = endianness;
        self
    }

    /// Bytes per interleaved output frame
    #[inline]
    pub fn frame_bytes(&self) -> usize {
        self.channels as usize * self.format.bytes_per_sample()
    }
}

impl Default for OutputSpec {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_RATE, DEFAULT_CHANNELS, OutputFormat::S16)
    }
}
