//! Input device resolution and enumeration.

#[cfg(feature = "audio-cpal")]
use cpal::traits::{DeviceTrait, HostTrait};

#[cfg(feature = "audio-cpal")]
use crate::error::{HarkError, Result};

/// Resolve an input device: preferred name first, then the system default,
/// then the first device the host reports.
///
/// # Errors
/// `HarkError::NoDefaultInputDevice` when the host has no usable input.
#[cfg(feature = "audio-cpal")]
pub fn resolve_input_device(
    host: &cpal::Host,
    preferred: Option<&str>,
) -> Result<cpal::Device> {
    if let Some(name) = preferred {
        match host.input_devices() {
            Ok(mut devices) => {
                if let Some(device) =
                    devices.find(|d| d.name().map(|n| n == name).unwrap_or(false))
                {
                    return Ok(device);
                }
                tracing::warn!("preferred input device '{name}' not found, falling back");
            }
            Err(e) => {
                tracing::warn!("failed to list input devices while resolving preference: {e}");
            }
        }
    }

    if let Some(default) = host.default_input_device() {
        return Ok(default);
    }

    let mut devices = host
        .input_devices()
        .map_err(|e| HarkError::AudioDevice(e.to_string()))?;
    let first = devices.next().ok_or(HarkError::NoDefaultInputDevice)?;
    tracing::warn!("no default input device, falling back to first available input");
    Ok(first)
}

/// Names of all input devices on the system, default first.
///
/// Returns an empty list when enumeration fails or cpal is unavailable.
#[cfg(feature = "audio-cpal")]
pub fn list_input_devices() -> Vec<String> {
    let host = cpal::default_host();
    let default_name = host.default_input_device().and_then(|d| d.name().ok());

    let mut names: Vec<String> = match host.input_devices() {
        Ok(devices) => devices.filter_map(|d| d.name().ok()).collect(),
        Err(e) => {
            tracing::warn!("failed to enumerate input devices: {e}");
            return default_name.into_iter().collect();
        }
    };

    if let Some(default) = default_name {
        names.sort_by_key(|n| n != &default);
    }
    names
}

#[cfg(not(feature = "audio-cpal"))]
pub fn list_input_devices() -> Vec<String> {
    vec![]
}
