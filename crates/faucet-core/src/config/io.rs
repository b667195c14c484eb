//! YAML configuration I/O
//!
//! Generic loading and saving for any serde configuration type.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Read and parse a YAML config file
///
/// `Ok(None)` when the file does not exist.
pub fn read_config<T>(path: &Path) -> Result<Option<T>>
where
    T: DeserializeOwned,
{
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("Cannot read {:?}", path)),
    };
    let config = serde_yaml::from_str(&contents)
        .with_context(|| format!("Invalid configuration in {:?}", path))?;
    Ok(Some(config))
}

/// Load configuration, falling back to defaults
///
/// A broken config file is logged and never keeps the mixer from starting.
pub fn load_config<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    match read_config(path) {
        Ok(Some(config)) => {
            log::info!("Loaded config from {:?}", path);
            config
        }
        Ok(None) => {
            log::info!("No config at {:?}, using defaults", path);
            T::default()
        }
        Err(e) => {
            log::warn!("{:#}, using defaults", e);
            T::default()
        }
    }
}

/// Write configuration as YAML
///
/// Parent directories are created. The file is written beside its final
/// location and renamed into place, so readers never see half a file.
pub fn save_config<T>(config: &T, path: &Path) -> Result<()>
where
    T: Serialize,
{
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create config directory {:?}", parent))?;
    }

    let yaml = serde_yaml::to_string(config).context("Cannot serialize config")?;
    let staging = path.with_extension("yaml.tmp");
    fs::write(&staging, yaml).with_context(|| format!("Cannot write {:?}", staging))?;
    fs::rename(&staging, path).with_context(|| format!("Cannot replace {:?}", path))?;

    log::debug!("Saved config to {:?}", path);
    Ok(())
}
