//! Play WAVE files through the default output device
//!
//! Usage: faucet-play [--loop] [--config <path>] [--device <name>] <file.wav>...
//!        faucet-play --list-devices
//!
//! Every file gets its own emitter; all start together, panned across the
//! stereo field. Without `--loop` the program exits once all of them have
//! played to the end.

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use faucet_core::audio::{output_device_names, start_audio_system};
use faucet_core::config::{default_config_path, load_config, read_config, FaucetConfig};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut looping = false;
    let mut config_path = None;
    let mut device = None;
    let mut files: Vec<PathBuf> = Vec::new();

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--loop" => looping = true,
            "--list-devices" => {
                for name in output_device_names()? {
                    println!("{}", name);
                }
                return Ok(());
            }
            "--device" => device = Some(args.next().context("--device needs a name")?),
            "--config" => {
                let path = args.next().context("--config needs a path")?;
                config_path = Some(PathBuf::from(path));
            }
            _ => files.push(PathBuf::from(arg)),
        }
    }
    if files.is_empty() {
        bail!("usage: faucet-play [--loop] [--config <path>] [--device <name>] <file.wav>...");
    }

    // An explicit config must be valid; the default location may be absent or broken
    let mut config: FaucetConfig = match config_path {
        Some(path) => read_config(&path)?.with_context(|| format!("{:?} not found", path))?,
        None => load_config(&default_config_path()),
    };
    if let Some(name) = device {
        config.audio = config.audio.with_device(name);
    }
    let system = start_audio_system(&config).context("Failed to start audio output")?;
    let mixer = &system.mixer;

    let mut emitters = Vec::with_capacity(files.len());
    for (i, path) in files.iter().enumerate() {
        let asset = mixer
            .load(path)
            .with_context(|| format!("Failed to load {:?}", path))?;
        if !asset.wait_until_ready(Duration::from_secs(10)) {
            log::warn!("{:?} still normalizing, starting anyway", path);
        }

        let emitter = mixer.create(&asset)?;
        if files.len() > 1 {
            let pan = -1.0 + 2.0 * i as f32 / (files.len() - 1) as f32;
            mixer.set_pan(emitter, pan)?;
        }
        emitters.push(emitter);
    }

    for &emitter in &emitters {
        if looping {
            mixer.play_looping(emitter)?;
        } else {
            mixer.fire(emitter)?;
        }
    }
    log::info!(
        "Playing {} file(s) at {}Hz{}",
        emitters.len(),
        system.handle.sample_rate(),
        if looping { ", looping (Ctrl+C to quit)" } else { "" }
    );

    while mixer.playing_count() > 0 {
        thread::sleep(Duration::from_millis(50));
    }

    log::info!("Playback finished");
    Ok(())
}
