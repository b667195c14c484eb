//! Output device lookup

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::Device;

use super::error::{AudioError, AudioResult};

/// The host's default output device
pub fn default_output_device() -> AudioResult<Device> {
    cpal::default_host()
        .default_output_device()
        .ok_or(AudioError::NoDefaultDevice)
}

/// Find an output device of the default host by name
pub fn find_output_device(name: &str) -> AudioResult<Device> {
    cpal::default_host()
        .output_devices()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?
        .find(|d| d.name().ok().as_deref() == Some(name))
        .ok_or_else(|| AudioError::DeviceNotFound(name.to_string()))
}

/// Names of every output device of the default host
pub fn output_device_names() -> AudioResult<Vec<String>> {
    let devices = cpal::default_host()
        .output_devices()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?;

    let names: Vec<String> = devices.filter_map(|d| d.name().ok()).collect();
    log::debug!("Enumerated {} output devices", names.len());
    Ok(names)
}
