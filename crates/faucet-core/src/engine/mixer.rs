//! Real-time mixing
//!
//! [`MixEngine`] is the half of the mixer that lives inside the device
//! callback. Every call to [`MixEngine::render`] fills one output buffer:
//!
//! 1. Clear the pre-allocated f32 mix bus.
//! 2. For each live emitter whose asset is ready, add its rate-converted,
//!    panned and gain-adjusted samples to the bus and advance its cursor.
//! 3. Clamp the bus to ±1.0 and pack it into the device's sample format.
//!
//! Nothing here allocates, locks or blocks. Requests larger than the bus are
//! rendered in chunks.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use super::emitter::{EmitterHandle, EmitterSlot, EmitterSlots};
use super::resample::{converted_sample, RateConversion};
use crate::config::ClipScope;
use crate::types::{Endianness, OutputFormat, OutputSpec, Sample, MAX_BUFFER_FRAMES};

/// Notifications from the callback to the control path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MixerEvent {
    /// Emitter reached the end of its source and stopped
    Finished(EmitterHandle),
}

/// Callback-side mixer state (owned exclusively by the audio thread)
pub struct MixEngine {
    slots: Arc<EmitterSlots>,
    spec: OutputSpec,
    clip_scope: ClipScope,
    /// Interleaved mix bus, `MAX_BUFFER_FRAMES * channels` samples
    bus: Box<[Sample]>,
    events: rtrb::Producer<MixerEvent>,
}

impl MixEngine {
    pub(crate) fn new(
        slots: Arc<EmitterSlots>,
        spec: OutputSpec,
        clip_scope: ClipScope,
        events: rtrb::Producer<MixerEvent>,
    ) -> Self {
        let bus = vec![0.0; MAX_BUFFER_FRAMES * spec.channels as usize].into_boxed_slice();
        Self {
            slots,
            spec,
            clip_scope,
            bus,
            events,
        }
    }

    pub fn output_spec(&self) -> &OutputSpec {
        &self.spec
    }

    /// Fill `out` with interleaved frames in the output format
    ///
    /// Trailing bytes that do not form a whole frame are zeroed.
    pub fn render(&mut self, out: &mut [u8]) {
        let frame_bytes = self.spec.frame_bytes();
        if frame_bytes == 0 {
            out.fill(0);
            return;
        }

        let whole = out.len() / frame_bytes * frame_bytes;
        let (frames, tail) = out.split_at_mut(whole);
        tail.fill(0);

        let channels = self.spec.channels as usize;
        for chunk in frames.chunks_mut(MAX_BUFFER_FRAMES * frame_bytes) {
            let n_frames = chunk.len() / frame_bytes;
            let bus = &mut self.bus[..n_frames * channels];
            bus.fill(0.0);

            for (index, slot) in self.slots.iter() {
                mix_emitter(
                    slot,
                    index,
                    &self.spec,
                    self.clip_scope,
                    bus,
                    n_frames,
                    &mut self.events,
                );
            }

            pack(bus, chunk, self.spec.format, self.spec.endianness);
        }
    }
}

/// Gain of one output channel for a given volume and balance
///
/// Stereo balance: panning right attenuates channel 0, panning left
/// attenuates channel 1. Extra channels and mono outputs get the volume.
#[inline]
pub fn channel_gain(channel: usize, channels: usize, volume: f32, pan: f32) -> f32 {
    if channels < 2 {
        return volume;
    }
    match channel {
        0 => volume * (1.0 - pan).min(1.0),
        1 => volume * (1.0 + pan).min(1.0),
        _ => volume,
    }
}

/// Add one emitter's contribution to the bus and advance its cursor
///
/// Control-path writes made during the pass win: the cursor is published
/// only if nobody moved it, and the emitter is stopped only if its transport
/// word is unchanged since it was read.
fn mix_emitter(
    slot: &EmitterSlot,
    index: usize,
    spec: &OutputSpec,
    clip_scope: ClipScope,
    bus: &mut [Sample],
    n_frames: usize,
    events: &mut rtrb::Producer<MixerEvent>,
) {
    if !slot.is_live() {
        return;
    }
    let generation = slot.generation();
    let audio = slot.audio();

    // Pending assets hold their cursor until they become audible
    if !audio.is_ready() {
        return;
    }

    let transport = slot.transport();
    let start = slot.position();
    if !transport.is_playing() {
        // Stopped emitters keep time so a later loop request joins in progress
        if slot.generation() == generation {
            let _ = slot.position.compare_exchange(
                start,
                start.saturating_add(n_frames as u64),
                Ordering::AcqRel,
                Ordering::Acquire,
            );
        }
        return;
    }

    let conversion = RateConversion::for_audio(&audio, spec.sample_rate);
    let frame_count = audio.frame_count();
    let loop_length = conversion.output_length(frame_count);
    let looping = transport.is_looping() && !transport.stop_pending() && loop_length > 0;
    let guarded = audio.is_float() || clip_scope == ClipScope::AllEmitters;
    let channels = spec.channels as usize;
    let source_channels = audio.channels().max(1);
    let volume = slot.volume();
    let pan = slot.pan();
    let mut mixdown = slot.mixdown();

    // At the natural boundary: wrap if looping, otherwise stop
    let at_boundary = |pos: &mut u64| -> bool {
        if !conversion.is_exhausted(*pos, frame_count) {
            return false;
        }
        if looping {
            *pos %= loop_length;
            return false;
        }
        true
    };

    let mut pos = start;
    let mut finished = false;
    for frame in 0..n_frames {
        if at_boundary(&mut pos) {
            finished = true;
            pos = pos.saturating_add((n_frames - frame) as u64);
            break;
        }

        let out = &mut bus[frame * channels..(frame + 1) * channels];
        for (channel, acc) in out.iter_mut().enumerate() {
            let value = converted_sample(&audio, &conversion, pos, channel % source_channels);
            let mut v = value * channel_gain(channel, channels, volume, pan) * mixdown;
            if guarded && v.abs() > 1.0 {
                mixdown /= v.abs();
                v = v.signum();
            }
            *acc += v;
        }
        pos += 1;
    }
    if !finished {
        finished = at_boundary(&mut pos);
    }

    if slot.generation() != generation {
        return;
    }
    let committed = slot
        .position
        .compare_exchange(start, pos, Ordering::AcqRel, Ordering::Acquire)
        .is_ok();
    if !committed {
        return;
    }

    slot.mixdown.store(mixdown);
    if finished && slot.finish(transport) {
        // Dropped if the control path is not draining events
        let _ = events.push(MixerEvent::Finished(EmitterHandle::new(
            index as u32,
            generation,
        )));
    }
}

/// Convert the bus into device samples
fn pack(bus: &[Sample], out: &mut [u8], format: OutputFormat, endianness: Endianness) {
    let width = format.bytes_per_sample();
    for (value, bytes) in bus.iter().zip(out.chunks_exact_mut(width)) {
        write_sample(*value, format, endianness, bytes);
    }
}

/// Clamp and encode one sample into `out` (exactly one sample wide)
#[inline]
pub fn write_sample(value: Sample, format: OutputFormat, endianness: Endianness, out: &mut [u8]) {
    let v = value.clamp(-1.0, 1.0);
    match format {
        OutputFormat::U8 => out[0] = ((v * 127.0).round() as i16 + 128) as u8,
        OutputFormat::S8 => out[0] = (v * 127.0).round() as i8 as u8,
        OutputFormat::S16 => put(&((v * 32767.0).round() as i16).to_le_bytes(), out, endianness),
        OutputFormat::S24 => {
            let s = (v * 8_388_607.0).round() as i32;
            put(&s.to_le_bytes()[..3], out, endianness);
        }
        OutputFormat::S32 => {
            let s = (v as f64 * 2_147_483_647.0).round() as i32;
            put(&s.to_le_bytes(), out, endianness);
        }
        OutputFormat::F32 => put(&v.to_le_bytes(), out, endianness),
    }
}

#[inline]
fn put(le: &[u8], out: &mut [u8], endianness: Endianness) {
    match endianness {
        Endianness::Little => out.copy_from_slice(le),
        Endianness::Big => {
            for (o, b) in out.iter_mut().zip(le.iter().rev()) {
                *o = *b;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_gain_balance() {
        assert_eq!(channel_gain(0, 1, 0.7, 1.0), 0.7);
        assert_eq!(channel_gain(0, 2, 1.0, 0.0), 1.0);
        assert_eq!(channel_gain(1, 2, 1.0, 0.0), 1.0);
        assert_eq!(channel_gain(0, 2, 1.0, 1.0), 0.0);
        assert_eq!(channel_gain(1, 2, 1.0, 1.0), 1.0);
        assert_eq!(channel_gain(0, 2, 0.5, -0.5), 0.5);
        assert_eq!(channel_gain(1, 2, 0.5, -0.5), 0.25);
        assert_eq!(channel_gain(3, 4, 0.5, -1.0), 0.5);
    }

    #[test]
    fn test_write_sample_formats() {
        let mut buf = [0u8; 4];

        write_sample(0.0, OutputFormat::U8, Endianness::Little, &mut buf[..1]);
        assert_eq!(buf[0], 0x80);
        write_sample(1.0, OutputFormat::U8, Endianness::Little, &mut buf[..1]);
        assert_eq!(buf[0], 0xFF);
        write_sample(-1.0, OutputFormat::U8, Endianness::Little, &mut buf[..1]);
        assert_eq!(buf[0], 0x01);

        write_sample(-1.0, OutputFormat::S8, Endianness::Little, &mut buf[..1]);
        assert_eq!(buf[0] as i8, -127);

        write_sample(2.0, OutputFormat::S16, Endianness::Little, &mut buf[..2]);
        assert_eq!(i16::from_le_bytes([buf[0], buf[1]]), 32767);

        write_sample(-1.0, OutputFormat::S24, Endianness::Little, &mut buf[..3]);
        assert_eq!(&buf[..3], &[0x01, 0x00, 0x80]);

        write_sample(0.5, OutputFormat::F32, Endianness::Little, &mut buf);
        assert_eq!(f32::from_le_bytes(buf), 0.5);

        write_sample(1.0, OutputFormat::S32, Endianness::Little, &mut buf);
        assert_eq!(i32::from_le_bytes(buf), i32::MAX);
    }

    #[test]
    fn test_big_endian_swaps_bytes() {
        let mut little = [0u8; 3];
        let mut big = [0u8; 3];
        write_sample(0.3, OutputFormat::S24, Endianness::Little, &mut little);
        write_sample(0.3, OutputFormat::S24, Endianness::Big, &mut big);
        assert_eq!(little, [big[2], big[1], big[0]]);

        let mut little = [0u8; 2];
        let mut big = [0u8; 2];
        write_sample(-0.6, OutputFormat::S16, Endianness::Little, &mut little);
        write_sample(-0.6, OutputFormat::S16, Endianness::Big, &mut big);
        assert_eq!(i16::from_le_bytes(little), i16::from_be_bytes(big));
    }
}
