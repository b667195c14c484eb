//! Faucet Core - real-time multi-emitter PCM mixer
//!
//! Loads WAVE assets and mixes any number of independently positioned
//! emitters into a device buffer from inside an audio callback.

pub mod audio_file;
pub mod config;
pub mod engine;
pub mod types;

#[cfg(feature = "cpal-backend")]
pub mod audio;

pub use audio_file::{load_audio, AudioAsset, AudioFileError, DecodedAudio, ParseOptions};
pub use engine::{mixer_pair, EmitterHandle, MixEngine, Mixer, MixerError, MixerEvent};
pub use types::*;
