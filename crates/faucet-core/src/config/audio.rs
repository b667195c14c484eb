//! Output device settings
//!
//! Consumed by the CPAL backend; plain data so configs stay portable to
//! builds without it.

use serde::{Deserialize, Serialize};

/// Largest device buffer we ask for (frames)
pub const MAX_DEVICE_BUFFER: u32 = 8192;

/// Preferred buffer size for the output stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BufferSize {
    /// Let the device choose
    #[default]
    Default,
    /// Request a specific size in frames (may be adjusted by the system)
    Fixed(u32),
}

impl BufferSize {
    /// Buffer size in frames, or None for the device default
    pub fn as_frames(&self) -> Option<u32> {
        match self {
            BufferSize::Default => None,
            BufferSize::Fixed(frames) => Some((*frames).clamp(16, MAX_DEVICE_BUFFER)),
        }
    }

    /// Latency in milliseconds at a given sample rate
    pub fn latency_ms(&self, sample_rate: u32) -> Option<f32> {
        self.as_frames()
            .map(|frames| (frames as f32 / sample_rate as f32) * 1000.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Output device name (None = system default)
    pub device: Option<String>,
    /// Preferred sample rate (None = device default)
    pub sample_rate: Option<u32>,
    /// Preferred channel count (None = device default)
    pub channels: Option<u16>,
    pub buffer_size: BufferSize,
}

impl AudioConfig {
    pub fn with_device(mut self, name: impl Into<String>) -> Self {
        self.device = Some(name.into());
        self
    }
}
