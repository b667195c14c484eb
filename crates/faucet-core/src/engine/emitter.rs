//! Emitter slots shared between the control path and the audio callback
//!
//! The registry is a fixed arena allocated once. Each slot is a bundle of
//! atomics, so the control path can mutate an emitter while the callback is
//! mixing it without any lock. Handles carry the slot's generation; reusing a
//! slot bumps the generation and invalidates every handle to its previous
//! occupant.
//!
//! ```text
//!   FREE ──claim──► CLAIMED ──publish──► LIVE ──release──► FREE
//!                   (control only)       (mixed by callback)
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};

use basedrop::{Shared, SharedCell};

use crate::audio_file::{AudioAsset, DecodedAudio};
use crate::engine::gc::gc_handle;

const SLOT_FREE: u8 = 0;
const SLOT_CLAIMED: u8 = 1;
const SLOT_LIVE: u8 = 2;

pub(crate) const PLAYING: u32 = 1;
pub(crate) const LOOPING: u32 = 1 << 1;
pub(crate) const STOP_GRACEFUL: u32 = 1 << 2;
const FLAG_BITS: u32 = 3;
const FLAG_MASK: u32 = (1 << FLAG_BITS) - 1;

/// Stable reference to one emitter
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EmitterHandle {
    index: u32,
    generation: u32,
}

impl EmitterHandle {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Slot index inside the registry
    pub fn index(&self) -> usize {
        self.index as usize
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for EmitterHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Emitter({}v{})", self.index, self.generation)
    }
}

impl fmt::Display for EmitterHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

/// f32 stored as bits in an `AtomicU32`
pub(crate) struct AtomicF32(AtomicU32);

impl AtomicF32 {
    pub(crate) fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    #[inline]
    pub(crate) fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    #[inline]
    pub(crate) fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// Snapshot of an emitter's transport word
///
/// The low bits are the playback flags; the rest is a counter bumped by
/// every control-path write, so the callback can tell whether the flags it
/// acted on are still current.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Transport(u32);

impl Transport {
    #[inline]
    pub(crate) fn is_playing(self) -> bool {
        self.0 & PLAYING != 0
    }

    #[inline]
    pub(crate) fn is_looping(self) -> bool {
        self.0 & LOOPING != 0
    }

    #[inline]
    pub(crate) fn stop_pending(self) -> bool {
        self.0 & STOP_GRACEFUL != 0
    }
}

/// One emitter's playback state
pub struct EmitterSlot {
    state: AtomicU8,
    generation: AtomicU32,
    /// Playback cursor in output frames
    pub(crate) position: AtomicU64,
    pub(crate) volume: AtomicF32,
    pub(crate) pan: AtomicF32,
    /// Clip correction factor, lowered by the callback when output overshoots
    pub(crate) mixdown: AtomicF32,
    transport: AtomicU32,
    audio: SharedCell<DecodedAudio>,
}

impl EmitterSlot {
    fn new(silence: &AudioAsset) -> Self {
        Self {
            state: AtomicU8::new(SLOT_FREE),
            generation: AtomicU32::new(0),
            position: AtomicU64::new(0),
            volume: AtomicF32::new(1.0),
            pan: AtomicF32::new(0.0),
            mixdown: AtomicF32::new(1.0),
            transport: AtomicU32::new(0),
            audio: SharedCell::new(silence.clone()),
        }
    }

    /// Whether the callback should mix this slot
    #[inline]
    pub fn is_live(&self) -> bool {
        self.state.load(Ordering::Acquire) == SLOT_LIVE
    }

    #[inline]
    pub fn generation(&self) -> u32 {
        self.generation.load(Ordering::Acquire)
    }

    /// Counted reference to the slot's asset
    #[inline]
    pub fn audio(&self) -> AudioAsset {
        self.audio.get()
    }

    #[inline]
    pub fn position(&self) -> u64 {
        self.position.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn transport(&self) -> Transport {
        Transport(self.transport.load(Ordering::Acquire))
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.transport().is_playing()
    }

    #[inline]
    pub fn is_looping(&self) -> bool {
        self.transport().is_looping()
    }

    #[inline]
    pub fn volume(&self) -> f32 {
        self.volume.load()
    }

    #[inline]
    pub fn pan(&self) -> f32 {
        self.pan.load()
    }

    #[inline]
    pub fn mixdown(&self) -> f32 {
        self.mixdown.load()
    }

    /// Rewrite the playback flags from the control path
    pub(crate) fn update_transport(&self, flags: impl Fn(u32) -> u32) {
        let _ = self
            .transport
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |word| {
                let sequence = (word >> FLAG_BITS).wrapping_add(1) << FLAG_BITS;
                Some(sequence | (flags(word & FLAG_MASK) & FLAG_MASK))
            });
    }

    /// Clear the flags that make an emitter audible
    pub(crate) fn halt(&self) {
        self.update_transport(|_| 0);
    }

    /// Stop from the callback, unless the control path wrote the flags
    /// since `observed` was read
    pub(crate) fn finish(&self, observed: Transport) -> bool {
        self.transport
            .compare_exchange(
                observed.0,
                observed.0 & !FLAG_MASK,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}

/// Fixed-capacity emitter arena
pub struct EmitterSlots {
    slots: Box<[EmitterSlot]>,
    silence: AudioAsset,
}

impl EmitterSlots {
    pub fn new(capacity: usize) -> Self {
        let silence = Shared::new(&gc_handle(), DecodedAudio::silent());
        let slots = (0..capacity).map(|_| EmitterSlot::new(&silence)).collect();
        Self { slots, silence }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// All slots, live or not, in index order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &EmitterSlot)> {
        self.slots.iter().enumerate()
    }

    /// Slot behind a handle, if the handle still names a live emitter
    pub fn get(&self, handle: EmitterHandle) -> Option<&EmitterSlot> {
        let slot = self.slots.get(handle.index())?;
        (slot.is_live() && slot.generation() == handle.generation).then_some(slot)
    }

    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_live()).count()
    }

    pub fn playing_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| s.is_live() && s.is_playing())
            .count()
    }

    /// Claim a free slot, reset it and make it visible to the callback
    ///
    /// Returns `None` when every slot is taken. Control path only.
    pub(crate) fn claim(&self, asset: &AudioAsset, volume: f32) -> Option<EmitterHandle> {
        for (index, slot) in self.slots.iter().enumerate() {
            if slot
                .state
                .compare_exchange(SLOT_FREE, SLOT_CLAIMED, Ordering::Acquire, Ordering::Relaxed)
                .is_err()
            {
                continue;
            }

            let generation = slot.generation.load(Ordering::Relaxed).wrapping_add(1);
            slot.generation.store(generation, Ordering::Relaxed);
            slot.position.store(0, Ordering::Relaxed);
            slot.volume.store(volume);
            slot.pan.store(0.0);
            slot.mixdown.store(1.0);
            slot.halt();
            slot.audio.set(asset.clone());

            slot.state.store(SLOT_LIVE, Ordering::Release);
            return Some(EmitterHandle::new(index as u32, generation));
        }
        None
    }

    /// Free the slot behind `handle`; returns false for a stale handle
    ///
    /// The slot's asset reference is swapped for silence. If the callback is
    /// mixing the asset at this moment it holds its own reference, and the
    /// last drop is deferred to the GC thread.
    pub(crate) fn release(&self, handle: EmitterHandle) -> bool {
        let Some(slot) = self.slots.get(handle.index()) else {
            return false;
        };
        if slot.generation() != handle.generation {
            return false;
        }
        if slot
            .state
            .compare_exchange(SLOT_LIVE, SLOT_CLAIMED, Ordering::AcqRel, Ordering::Relaxed)
            .is_err()
        {
            return false;
        }

        slot.halt();
        slot.audio.set(self.silence.clone());
        slot.state.store(SLOT_FREE, Ordering::Release);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_file::fixtures::pcm16_asset;

    #[test]
    fn test_claim_and_release() {
        let slots = EmitterSlots::new(2);
        let asset = pcm16_asset(1, 44100, &[1, 2, 3]);

        let a = slots.claim(&asset, 0.8).unwrap();
        let b = slots.claim(&asset, 1.0).unwrap();
        assert!(slots.claim(&asset, 1.0).is_none());
        assert_eq!(slots.live_count(), 2);

        let slot = slots.get(a).unwrap();
        assert_eq!(slot.volume(), 0.8);
        assert_eq!(slot.audio().frame_count(), 3);

        assert!(slots.release(a));
        assert!(!slots.release(a));
        assert!(slots.get(a).is_none());
        assert!(slots.get(b).is_some());
        assert_eq!(slots.live_count(), 1);
    }

    #[test]
    fn test_reused_slot_rejects_stale_handle() {
        let slots = EmitterSlots::new(1);
        let asset = pcm16_asset(1, 44100, &[1]);

        let first = slots.claim(&asset, 1.0).unwrap();
        slots.release(first);
        let second = slots.claim(&asset, 1.0).unwrap();

        assert_eq!(first.index(), second.index());
        assert_ne!(first.generation(), second.generation());
        assert!(slots.get(first).is_none());
        assert!(!slots.release(first));
        assert!(slots.get(second).is_some());
    }

    #[test]
    fn test_release_drops_asset_reference() {
        let slots = EmitterSlots::new(1);
        let asset = pcm16_asset(1, 44100, &[1, 2]);
        let handle = slots.claim(&asset, 1.0).unwrap();

        let (_, slot) = slots.iter().next().unwrap();
        assert_eq!(slot.audio().frame_count(), 2);

        slots.release(handle);
        assert_eq!(slot.audio().frame_count(), 0);
        // Our own reference is unaffected
        assert_eq!(asset.frame_count(), 2);
    }

    #[test]
    fn test_finish_loses_to_control_writes() {
        let slots = EmitterSlots::new(1);
        let asset = pcm16_asset(1, 44100, &[1]);
        let handle = slots.claim(&asset, 1.0).unwrap();
        let slot = slots.get(handle).unwrap();

        slot.update_transport(|_| PLAYING);
        let observed = slot.transport();
        slot.update_transport(|flags| flags | LOOPING);
        assert!(!slot.finish(observed));
        assert!(slot.is_playing());
        assert!(slot.is_looping());

        // Same flags rewritten still count as a control write
        let observed = slot.transport();
        slot.update_transport(|flags| flags);
        assert!(!slot.finish(observed));

        let observed = slot.transport();
        assert!(slot.finish(observed));
        assert!(!slot.is_playing());
        assert!(!slot.is_looping());
    }

    #[test]
    fn test_atomic_f32() {
        let value = AtomicF32::new(0.5);
        assert_eq!(value.load(), 0.5);
        value.store(-0.25);
        assert_eq!(value.load(), -0.25);
    }
}
