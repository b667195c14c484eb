//! Background peak normalization for floating point assets
//!
//! Float WAVE data has no fixed full-scale value, so each float asset gets a
//! one-shot pass that finds its peak and publishes a divisor bringing it into
//! ±1.0. The pass runs on its own thread and holds a counted reference, so an
//! asset released by everyone else mid-scan is reclaimed only after the pass
//! publishes.

use std::io;
use std::thread::{self, JoinHandle};

use super::decoded::DecodedAudio;
use super::AudioAsset;

/// Peak divisor for an asset: max(highest, -lowest), never below 1.0
pub fn peak_gain(audio: &DecodedAudio) -> f64 {
    let mut highest = 1.0f64;
    let mut lowest = -1.0f64;

    for frame in 0..audio.frame_count() {
        for channel in 0..audio.channels() {
            let value = audio.raw_sample(channel, frame);
            if value > highest {
                highest = value;
            } else if value < lowest {
                lowest = value;
            }
        }
    }

    highest.max(-lowest)
}

/// Scan the asset and publish its gain, marking it ready
///
/// Returns the published gain.
pub fn normalize(audio: &DecodedAudio) -> f64 {
    let gain = peak_gain(audio);
    audio.publish_gain(gain);
    gain
}

/// Run [`normalize`] on a dedicated thread; the handle yields the gain
pub fn spawn_normalizer(asset: AudioAsset) -> io::Result<JoinHandle<f64>> {
    thread::Builder::new()
        .name("faucet-normalize".to_string())
        .spawn(move || {
            let gain = normalize(&asset);
            log::debug!(
                "Normalized float asset: {} frames, gain {:.4}",
                asset.frame_count(),
                gain
            );
            gain
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_file::fixtures::{f32_asset, pending_f32_asset};
    use std::time::Duration;

    #[test]
    fn test_gain_is_one_when_within_range() {
        let asset = f32_asset(1, 44100, &[0.5, -0.9, 1.0, -1.0]);
        assert!(asset.wait_until_ready(Duration::from_secs(5)));
        assert_eq!(asset.normalization_gain(), 1.0);
        assert_eq!(asset.sample(0, 1), -0.9);
    }

    #[test]
    fn test_gain_tracks_positive_peak() {
        let asset = f32_asset(2, 44100, &[0.5, 4.0, -2.0, 0.0]);
        assert!(asset.wait_until_ready(Duration::from_secs(5)));
        assert_eq!(asset.normalization_gain(), 4.0);
        assert_eq!(asset.sample(1, 0), 1.0);
        assert_eq!(asset.sample(0, 1), -0.5);
    }

    #[test]
    fn test_gain_tracks_negative_peak() {
        let asset = f32_asset(1, 44100, &[0.5, -3.0]);
        assert!(asset.wait_until_ready(Duration::from_secs(5)));
        assert_eq!(asset.normalization_gain(), 3.0);
        assert_eq!(asset.sample(0, 1), -1.0);
    }

    #[test]
    fn test_asset_dropped_during_normalization() {
        let mut samples = vec![0.25f32; 200_000];
        samples[123_457] = -6.0;
        let asset = pending_f32_asset(2, 48000, &samples);

        let normalizer = spawn_normalizer(asset.clone()).unwrap();
        // Only the normalizer's reference is left
        drop(asset);
        assert_eq!(normalizer.join().unwrap(), 6.0);
    }

    #[test]
    fn test_normalizer_marks_ready() {
        let asset = pending_f32_asset(1, 44100, &[0.5, 2.5]);
        assert!(!asset.is_ready());

        let gain = spawn_normalizer(asset.clone()).unwrap().join().unwrap();
        assert_eq!(gain, 2.5);
        assert!(asset.is_ready());
        assert_eq!(asset.normalization_gain(), 2.5);
        assert_eq!(asset.sample(0, 0), 0.2);
    }
}
