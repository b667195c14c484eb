//! CPAL stream setup
//!
//! ```text
//! ┌──────────────────┐   atomics    ┌─────────────────────┐
//! │  Mixer (caller)  │─────────────►│  CPAL Audio Thread  │
//! │                  │◄─────────────│  (owns MixEngine)   │
//! └──────────────────┘  MixerEvent  └─────────────────────┘
//! ```
//!
//! The device buffer is handed to [`MixEngine::render`] reinterpreted as
//! bytes, so every sample format maps onto one [`OutputFormat`] in native
//! byte order and no intermediate copy is made.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{
    BufferSize as CpalBufferSize, SampleFormat, SizedSample, Stream, StreamConfig,
    SupportedStreamConfig, SupportedStreamConfigRange,
};

use super::device::{default_output_device, find_output_device};
use super::error::{AudioError, AudioResult};
use crate::config::{AudioConfig, FaucetConfig};
use crate::engine::{mixer_pair, MixEngine, Mixer};
use crate::types::{OutputFormat, OutputSpec, DEFAULT_CHANNELS, DEFAULT_SAMPLE_RATE};

/// Sample formats we can render, most preferred first
const FORMAT_PREFERENCE: [SampleFormat; 5] = [
    SampleFormat::F32,
    SampleFormat::I16,
    SampleFormat::I32,
    SampleFormat::I8,
    SampleFormat::U8,
];

/// Keeps the output stream alive. Drop this to stop audio.
pub struct CpalAudioHandle {
    _stream: Stream,
    spec: OutputSpec,
    buffer_size: Option<u32>,
}

impl CpalAudioHandle {
    /// Format the engine renders in
    pub fn output_spec(&self) -> &OutputSpec {
        &self.spec
    }

    pub fn sample_rate(&self) -> u32 {
        self.spec.sample_rate
    }

    /// Requested buffer size in frames, if one was requested
    pub fn buffer_size(&self) -> Option<u32> {
        self.buffer_size
    }
}

/// Running output stream plus the control half of its mixer
pub struct AudioSystem {
    pub handle: CpalAudioHandle,
    pub mixer: Mixer,
}

/// Mixer output format for a CPAL sample format
pub fn output_format(format: SampleFormat) -> AudioResult<OutputFormat> {
    match format {
        SampleFormat::F32 => Ok(OutputFormat::F32),
        SampleFormat::I16 => Ok(OutputFormat::S16),
        SampleFormat::I32 => Ok(OutputFormat::S32),
        SampleFormat::I8 => Ok(OutputFormat::S8),
        SampleFormat::U8 => Ok(OutputFormat::U8),
        other => Err(AudioError::UnsupportedFormat(format!("{:?}", other))),
    }
}

/// Open the configured device and start mixing into it
pub fn start_audio_system(config: &FaucetConfig) -> AudioResult<AudioSystem> {
    let device = match &config.audio.device {
        Some(name) => find_output_device(name)?,
        None => default_output_device()?,
    };

    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    log::info!("Using audio device: {}", device_name);

    let supported = get_output_config(&device, &config.audio)?;
    let sample_format = supported.sample_format();
    let spec = OutputSpec::new(
        supported.sample_rate().0,
        supported.channels(),
        output_format(sample_format)?,
    );

    let buffer_size = config.audio.buffer_size.as_frames();
    let stream_config = StreamConfig {
        channels: supported.channels(),
        sample_rate: supported.sample_rate(),
        buffer_size: match buffer_size {
            Some(frames) => CpalBufferSize::Fixed(frames),
            None => CpalBufferSize::Default,
        },
    };

    match config.audio.buffer_size.latency_ms(spec.sample_rate) {
        Some(latency) => log::info!(
            "Audio config: {} channels, {}Hz, {:?}, {} frames (~{:.1}ms latency)",
            spec.channels,
            spec.sample_rate,
            sample_format,
            buffer_size.unwrap_or_default(),
            latency
        ),
        None => log::info!(
            "Audio config: {} channels, {}Hz, {:?}, device buffer size",
            spec.channels,
            spec.sample_rate,
            sample_format
        ),
    }

    let (mixer, engine) = mixer_pair(spec, config.mixer.clone());

    let stream = match sample_format {
        SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, engine)?,
        SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, engine)?,
        SampleFormat::I32 => build_stream::<i32>(&device, &stream_config, engine)?,
        SampleFormat::I8 => build_stream::<i8>(&device, &stream_config, engine)?,
        SampleFormat::U8 => build_stream::<u8>(&device, &stream_config, engine)?,
        other => return Err(AudioError::UnsupportedFormat(format!("{:?}", other))),
    };

    stream
        .play()
        .map_err(|e| AudioError::StreamPlayError(e.to_string()))?;
    log::info!("Audio stream started");

    Ok(AudioSystem {
        handle: CpalAudioHandle {
            _stream: stream,
            spec,
            buffer_size,
        },
        mixer,
    })
}

/// Pick the supported configuration closest to the preferences
///
/// Ranked by channel match, then sample-rate match, then sample format
/// preference. Falls back to the device's maximum rate when the requested
/// rate is out of range.
fn get_output_config(
    device: &cpal::Device,
    config: &AudioConfig,
) -> AudioResult<SupportedStreamConfig> {
    let supported: Vec<SupportedStreamConfigRange> = device
        .supported_output_configs()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?
        .filter(|c| FORMAT_PREFERENCE.contains(&c.sample_format()))
        .collect();

    let target_rate = config.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE);
    let target_channels = config.channels.unwrap_or(DEFAULT_CHANNELS);
    let rate_in_range = |c: &SupportedStreamConfigRange| {
        target_rate >= c.min_sample_rate().0 && target_rate <= c.max_sample_rate().0
    };

    let Some(best) = supported.iter().min_by_key(|c| {
        let preference = FORMAT_PREFERENCE
            .iter()
            .position(|f| *f == c.sample_format())
            .unwrap_or(FORMAT_PREFERENCE.len());
        (c.channels() != target_channels, !rate_in_range(c), preference)
    }) else {
        log::warn!("No renderable output configuration listed, trying device default");
        return device
            .default_output_config()
            .map_err(|e| AudioError::ConfigError(e.to_string()));
    };

    let sample_rate = if rate_in_range(best) {
        cpal::SampleRate(target_rate)
    } else {
        let fallback = best.max_sample_rate();
        log::warn!(
            "Audio device doesn't support {}Hz, falling back to {}Hz (assets will be resampled)",
            target_rate,
            fallback.0
        );
        fallback
    };

    Ok(best.clone().with_sample_rate(sample_rate))
}

/// Build a stream whose callback renders straight into the device buffer
fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    mut engine: MixEngine,
) -> AudioResult<Stream>
where
    T: SizedSample + bytemuck::Pod,
{
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _info: &cpal::OutputCallbackInfo| {
                engine.render(bytemuck::cast_slice_mut(data));
            },
            move |err| {
                log::error!("Audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| AudioError::StreamBuildError(e.to_string()))
}
