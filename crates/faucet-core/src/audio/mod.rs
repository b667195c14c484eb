//! CPAL output backend
//!
//! Opens an output stream on a real device and runs a [`MixEngine`] inside
//! its callback. The engine is moved into the callback closure and owned by
//! the audio thread; the returned [`Mixer`] stays on the caller's thread.
//!
//! ```ignore
//! use faucet_core::audio::start_audio_system;
//!
//! let system = start_audio_system(&config)?;
//! let asset = system.mixer.load("kick.wav")?;
//! let kick = system.mixer.create(&asset)?;
//! system.mixer.fire(kick)?;
//! ```
//!
//! [`MixEngine`]: crate::engine::MixEngine
//! [`Mixer`]: crate::engine::Mixer

mod cpal_backend;
mod device;
mod error;

pub use cpal_backend::{output_format, start_audio_system, AudioSystem, CpalAudioHandle};
pub use device::{default_output_device, find_output_device, output_device_names};
pub use error::{AudioError, AudioResult};
