//! Emitter lifecycle control
//!
//! [`Mixer`] is the control-path half of the mixer: it creates emitters,
//! starts and stops them and adjusts their gain. Every operation is a handful
//! of atomic stores into the shared slot arena and never waits on the audio
//! callback. State changes take effect at the next rendered buffer.

use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use super::emitter::{
    EmitterHandle, EmitterSlot, EmitterSlots, LOOPING, PLAYING, STOP_GRACEFUL,
};
use super::error::{MixerError, MixerResult};
use super::mixer::{MixEngine, MixerEvent};
use crate::audio_file::{load_audio, AudioAsset};
use crate::config::{ClipPolicy, MixerConfig};
use crate::types::OutputSpec;

/// Create a connected control/callback pair
///
/// Move the [`MixEngine`] into the device callback; keep the [`Mixer`] on
/// the control thread.
pub fn mixer_pair(output: OutputSpec, config: MixerConfig) -> (Mixer, MixEngine) {
    let slots = Arc::new(EmitterSlots::new(config.max_emitters));
    let (producer, consumer) = rtrb::RingBuffer::new(config.event_queue_capacity.max(1));

    log::info!(
        "Mixer created: {} emitter slots, {}Hz, {} channels, {:?} {:?}",
        slots.capacity(),
        output.sample_rate,
        output.channels,
        output.format,
        output.endianness
    );

    let engine = MixEngine::new(Arc::clone(&slots), output, config.clip_scope, producer);
    let mixer = Mixer {
        slots,
        events: consumer,
        config,
        output,
    };
    (mixer, engine)
}

/// Control surface for emitters
pub struct Mixer {
    slots: Arc<EmitterSlots>,
    events: rtrb::Consumer<MixerEvent>,
    config: MixerConfig,
    output: OutputSpec,
}

impl Mixer {
    pub fn output_spec(&self) -> &OutputSpec {
        &self.output
    }

    pub fn config(&self) -> &MixerConfig {
        &self.config
    }

    /// Load a WAVE file with the configured parse options
    pub fn load<P: AsRef<Path>>(&self, path: P) -> MixerResult<AudioAsset> {
        Ok(load_audio(path, &self.config.parse)?)
    }

    fn slot(&self, handle: EmitterHandle) -> MixerResult<&EmitterSlot> {
        self.slots
            .get(handle)
            .ok_or(MixerError::UnknownEmitter(handle))
    }

    /// Register a stopped emitter at position 0 playing `asset`
    pub fn create(&self, asset: &AudioAsset) -> MixerResult<EmitterHandle> {
        let handle = self
            .slots
            .claim(asset, self.config.default_volume.max(0.0))
            .ok_or(MixerError::RegistryFull {
                capacity: self.slots.capacity(),
            })?;
        log::debug!("Created emitter {}", handle);
        Ok(handle)
    }

    /// Play from the start, restarting if already playing
    pub fn fire(&self, handle: EmitterHandle) -> MixerResult<()> {
        let slot = self.slot(handle)?;
        if self.config.clip_policy == ClipPolicy::DuckUntilFire {
            slot.mixdown.store(1.0);
        }
        slot.position.store(0, Ordering::Release);
        slot.update_transport(|flags| (flags & LOOPING) | PLAYING);
        Ok(())
    }

    /// Play and loop from the current position
    ///
    /// A stopped emitter's cursor keeps running, so this joins the loop
    /// where it would be had it never stopped.
    pub fn play_looping(&self, handle: EmitterHandle) -> MixerResult<()> {
        self.slot(handle)?.update_transport(|_| PLAYING | LOOPING);
        Ok(())
    }

    /// Silence the emitter at the next buffer
    pub fn stop(&self, handle: EmitterHandle) -> MixerResult<()> {
        self.slot(handle)?.halt();
        Ok(())
    }

    /// Stop at the end of the current pass through the source
    pub fn stop_graceful(&self, handle: EmitterHandle) -> MixerResult<()> {
        self.slot(handle)?
            .update_transport(|flags| flags | STOP_GRACEFUL);
        Ok(())
    }

    /// Stop and free the emitter; the handle becomes invalid
    ///
    /// The asset itself stays alive for as long as anything else holds it.
    pub fn kill(&self, handle: EmitterHandle) -> MixerResult<()> {
        if self.slots.release(handle) {
            log::debug!("Killed emitter {}", handle);
            Ok(())
        } else {
            Err(MixerError::UnknownEmitter(handle))
        }
    }

    pub fn volume(&self, handle: EmitterHandle) -> MixerResult<f32> {
        Ok(self.slot(handle)?.volume())
    }

    /// Set the linear gain; negative values clamp to 0
    pub fn set_volume(&self, handle: EmitterHandle, volume: f32) -> MixerResult<()> {
        self.slot(handle)?.volume.store(volume.max(0.0));
        Ok(())
    }

    pub fn pan(&self, handle: EmitterHandle) -> MixerResult<f32> {
        Ok(self.slot(handle)?.pan())
    }

    /// Set the balance, -1.0 (left) to 1.0 (right)
    pub fn set_pan(&self, handle: EmitterHandle, pan: f32) -> MixerResult<()> {
        let pan = if pan.is_nan() { 0.0 } else { pan.clamp(-1.0, 1.0) };
        self.slot(handle)?.pan.store(pan);
        Ok(())
    }

    pub fn is_playing(&self, handle: EmitterHandle) -> MixerResult<bool> {
        Ok(self.slot(handle)?.is_playing())
    }

    pub fn is_looping(&self, handle: EmitterHandle) -> MixerResult<bool> {
        Ok(self.slot(handle)?.is_looping())
    }

    /// Cursor in output frames
    pub fn position(&self, handle: EmitterHandle) -> MixerResult<u64> {
        Ok(self.slot(handle)?.position())
    }

    /// Current clip correction factor (1.0 until the emitter has clipped)
    pub fn mixdown(&self, handle: EmitterHandle) -> MixerResult<f32> {
        Ok(self.slot(handle)?.mixdown())
    }

    /// Number of live emitters
    pub fn emitter_count(&self) -> usize {
        self.slots.live_count()
    }

    /// Number of live emitters currently playing
    pub fn playing_count(&self) -> usize {
        self.slots.playing_count()
    }

    pub fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    /// Drain notifications from the audio callback
    ///
    /// With `auto_release_finished` set, finished emitters are killed here.
    pub fn poll_events(&mut self) -> Vec<MixerEvent> {
        let mut events = Vec::with_capacity(self.events.slots());
        while let Ok(event) = self.events.pop() {
            events.push(event);
        }

        if self.config.auto_release_finished {
            for event in &events {
                self.release_finished(*event);
            }
        }
        events
    }

    /// Kill every emitter reported finished and not re-fired since
    ///
    /// Returns how many were freed.
    pub fn reap_finished(&mut self) -> usize {
        let mut freed = 0;
        while let Ok(event) = self.events.pop() {
            if self.release_finished(event) {
                freed += 1;
            }
        }
        freed
    }

    fn release_finished(&self, event: MixerEvent) -> bool {
        let MixerEvent::Finished(handle) = event;
        match self.slots.get(handle) {
            Some(slot) if !slot.is_playing() => self.slots.release(handle),
            _ => false,
        }
    }
}
