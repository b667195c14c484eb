//! WAVE file loading
//!
//! Parses RIFF/WAVE containers holding uncompressed integer or float PCM and
//! turns them into shared [`DecodedAudio`] assets the mixer can play.
//!
//! # Readiness
//!
//! Integer assets are playable as soon as [`load_audio`] returns. Float
//! assets are normalized on a background thread first and render as silence
//! until [`DecodedAudio::is_ready`] flips.
//!
//! ```ignore
//! use faucet_core::audio_file::{load_audio, ParseOptions};
//!
//! let asset = load_audio("kick.wav", &ParseOptions::default())?;
//! asset.wait_until_ready(Duration::from_secs(1));
//! ```

mod decoded;
mod error;
mod normalize;
mod parser;

#[cfg(test)]
pub(crate) mod fixtures;

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use basedrop::Shared;

use crate::engine::gc::gc_handle;

pub use decoded::DecodedAudio;
pub use error::{AudioFileError, ChunkId, ParseWarning};
pub use normalize::{normalize, peak_gain, spawn_normalizer};
pub use parser::{
    parse_wave, AudioFormat, MagicPolicy, ParseOptions, ParseReport, SampleEncoding,
    TrailingDataPolicy, WaveFile, FORMAT_EXTENSIBLE, FORMAT_IEEE_FLOAT, FORMAT_PCM,
};

/// Decoded audio shared between the control path, emitters and the engine
///
/// Dropping the last reference defers deallocation to the GC thread.
pub type AudioAsset = Shared<DecodedAudio>;

/// Load a WAVE file from disk
pub fn load_audio<P: AsRef<Path>>(
    path: P,
    options: &ParseOptions,
) -> Result<AudioAsset, AudioFileError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| AudioFileError::ContainerOpenFailure {
        path: path.to_path_buf(),
        source,
    })?;

    let asset = load_audio_from_reader(BufReader::new(file), options)?;
    log::info!(
        "Loaded {:?}: {} ch, {}Hz, {}-bit {}, {} frames ({:.2}s)",
        path,
        asset.channels(),
        asset.sample_rate(),
        asset.format().bits_per_sample,
        if asset.is_float() { "float" } else { "PCM" },
        asset.frame_count(),
        asset.duration_seconds()
    );
    Ok(asset)
}

/// Load a WAVE container from an in-memory or otherwise seekable stream
pub fn load_audio_from_reader<R: Read + Seek>(
    reader: R,
    options: &ParseOptions,
) -> Result<AudioAsset, AudioFileError> {
    let wave = parse_wave(reader, options)?;
    Ok(into_asset(wave))
}

/// Wrap a parsed container as a shared asset, scheduling normalization
///
/// If the normalizer thread cannot be spawned the scan runs inline, so the
/// asset always becomes ready.
pub fn into_asset(wave: WaveFile) -> AudioAsset {
    let asset = Shared::new(&gc_handle(), DecodedAudio::from_wave(wave));

    if !asset.is_ready() {
        if let Err(e) = spawn_normalizer(asset.clone()) {
            log::warn!("Failed to spawn normalizer thread ({}), normalizing inline", e);
            normalize(&asset);
        }
    }

    asset
}
