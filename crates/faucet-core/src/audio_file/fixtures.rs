//! Hand-built WAVE containers for tests

use std::io::Cursor;

use basedrop::Shared;

use super::{
    load_audio_from_reader, parse_wave, AudioAsset, DecodedAudio, ParseOptions,
    FORMAT_IEEE_FLOAT, FORMAT_PCM,
};
use crate::engine::gc::gc_handle;

/// One chunk: tag, little-endian length, payload, pad byte if odd
pub(crate) fn chunk(id: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 9);
    out.extend_from_slice(id);
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(payload);
    if payload.len() % 2 == 1 {
        out.push(0);
    }
    out
}

/// Plain 16-byte fmt chunk with a tightly packed block align
pub(crate) fn fmt_chunk(format_tag: u16, channels: u16, sample_rate: u32, bits: u16) -> Vec<u8> {
    let block_align = channels * ((bits + 7) / 8);
    let mut payload = Vec::with_capacity(16);
    payload.extend_from_slice(&format_tag.to_le_bytes());
    payload.extend_from_slice(&channels.to_le_bytes());
    payload.extend_from_slice(&sample_rate.to_le_bytes());
    payload.extend_from_slice(&(sample_rate * block_align as u32).to_le_bytes());
    payload.extend_from_slice(&block_align.to_le_bytes());
    payload.extend_from_slice(&bits.to_le_bytes());
    chunk(b"fmt ", &payload)
}

/// Wrap chunks in a RIFF/WAVE header
pub(crate) fn riff(chunks: &[Vec<u8>]) -> Vec<u8> {
    let body: Vec<u8> = chunks.concat();
    let mut out = Vec::with_capacity(body.len() + 12);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(body.len() as u32 + 4).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(&body);
    out
}

/// Minimal fmt + data container
pub(crate) fn wav_bytes(
    format_tag: u16,
    channels: u16,
    sample_rate: u32,
    bits: u16,
    data: &[u8],
) -> Vec<u8> {
    riff(&[fmt_chunk(format_tag, channels, sample_rate, bits), chunk(b"data", data)])
}

/// Loaded 16-bit asset from interleaved samples (ready immediately)
pub(crate) fn pcm16_asset(channels: u16, sample_rate: u32, samples: &[i16]) -> AudioAsset {
    let data: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
    let bytes = wav_bytes(FORMAT_PCM, channels, sample_rate, 16, &data);
    load_audio_from_reader(Cursor::new(bytes), &ParseOptions::default())
        .expect("fixture container parses")
}

fn f32_bytes(channels: u16, sample_rate: u32, samples: &[f32]) -> Vec<u8> {
    let data: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
    wav_bytes(FORMAT_IEEE_FLOAT, channels, sample_rate, 32, &data)
}

/// Loaded 32-bit float asset; normalization runs in the background
pub(crate) fn f32_asset(channels: u16, sample_rate: u32, samples: &[f32]) -> AudioAsset {
    let bytes = f32_bytes(channels, sample_rate, samples);
    load_audio_from_reader(Cursor::new(bytes), &ParseOptions::default())
        .expect("fixture container parses")
}

/// 32-bit float asset with no normalizer; stays unready until the test
/// publishes a gain
pub(crate) fn pending_f32_asset(channels: u16, sample_rate: u32, samples: &[f32]) -> AudioAsset {
    let bytes = f32_bytes(channels, sample_rate, samples);
    let wave = parse_wave(Cursor::new(bytes), &ParseOptions::default())
        .expect("fixture container parses");
    Shared::new(&gc_handle(), DecodedAudio::from_wave(wave))
}
