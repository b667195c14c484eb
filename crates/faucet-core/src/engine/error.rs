//! Control-path errors

use thiserror::Error;

use super::emitter::EmitterHandle;
use crate::audio_file::AudioFileError;

/// Errors returned by [`Mixer`](super::Mixer) operations
#[derive(Error, Debug)]
pub enum MixerError {
    /// Handle names a killed emitter or a slot that was reused since
    #[error("Unknown emitter {0}")]
    UnknownEmitter(EmitterHandle),

    /// Every emitter slot is in use
    #[error("Emitter registry full ({capacity} slots)")]
    RegistryFull { capacity: usize },

    /// Asset failed to load
    #[error(transparent)]
    Load(#[from] AudioFileError),
}

/// Result type for mixer operations
pub type MixerResult<T> = Result<T, MixerError>;
