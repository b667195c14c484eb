//! Configuration for faucet
//!
//! - Generic YAML config loading/saving
//! - Mixer behavior ([`MixerConfig`])
//! - Output device preferences ([`AudioConfig`])
//!
//! ```ignore
//! use faucet_core::config::{default_config_path, load_config, FaucetConfig};
//!
//! let config: FaucetConfig = load_config(&default_config_path());
//! let (mixer, engine) = mixer_pair(output, config.mixer.clone());
//! ```

mod audio;
mod io;
mod mixer;
mod paths;

use serde::{Deserialize, Serialize};

pub use audio::{AudioConfig, BufferSize, MAX_DEVICE_BUFFER};
pub use io::{load_config, read_config, save_config};
pub use mixer::{
    ClipPolicy, ClipScope, MixerConfig, DEFAULT_EVENT_QUEUE_CAPACITY, DEFAULT_MAX_EMITTERS,
};
pub use paths::{default_config_dir, default_config_path};

/// Top-level config file contents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaucetConfig {
    pub audio: AudioConfig,
    pub mixer: MixerConfig,
}
