//! Standard locations for faucet configuration

use std::path::PathBuf;

/// Directory holding faucet's configuration
///
/// Returns: `{config_dir}/faucet` (e.g. `~/.config/faucet` on Linux),
/// or `./faucet` when the platform has no config directory.
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("faucet")
}

/// Default path of the main config file
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.yaml")
}
