// Device enumeration and virtual cable detection.
//
// Device lists are snapshots. An index only means something within the
// enumeration that produced it; anything kept across a topology change holds
// the device name and re-resolves it through DeviceRegistry.

use cpal::traits::{DeviceTrait, HostTrait};

use crate::error::DeviceError;

// lowercase substrings that mark a possible virtual cable
const VIRTUAL_CABLE_KEYWORDS: [&str; 4] = ["vb-audio", "cable", "virtual", "voicemeeter"];

// a usable cable exposes exactly this many input channels
const VIRTUAL_CABLE_INPUT_CHANNELS: u16 = 8;

// playback side of VB-Audio's cable, case-sensitive
const CABLE_OUTPUT_MARKER: &str = "CABLE Input";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioDevice {
    pub index: usize, // position in the enumeration that produced it
    pub name: String,
    pub max_input_channels: u16, // best any supported config offers
    pub max_output_channels: u16,
}

// why a device that looks like a cable wasn't offered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CableRejection {
    WrongInputChannels { found: u16 },
}

#[derive(Debug, Clone, Default)]
pub struct CableScan {
    pub valid: Vec<AudioDevice>,
    pub rejected: Vec<(AudioDevice, CableRejection)>, // matched the name, excluded anyway
}

pub fn classify(name: &str) -> bool {
    let lower = name.to_lowercase();
    VIRTUAL_CABLE_KEYWORDS.iter().any(|k| lower.contains(k))
}

// every rejection is logged with its reason
pub fn scan_virtual_cables(devices: &[AudioDevice]) -> CableScan {
    let mut scan = CableScan::default();
    for device in devices.iter().filter(|d| classify(&d.name)) {
        if device.max_input_channels == VIRTUAL_CABLE_INPUT_CHANNELS {
            tracing::info!(device = %device.name, "detected valid virtual cable");
            scan.valid.push(device.clone());
        } else {
            tracing::info!(
                device = %device.name,
                input_channels = device.max_input_channels,
                required = VIRTUAL_CABLE_INPUT_CHANNELS,
                "skipped virtual cable: wrong number of input channels"
            );
            scan.rejected.push((
                device.clone(),
                CableRejection::WrongInputChannels {
                    found: device.max_input_channels,
                },
            ));
        }
    }

    if scan.valid.is_empty() {
        tracing::warn!("no virtual cables with 8 input channels detected");
    } else {
        tracing::info!(count = scan.valid.len(), "virtual cables detected");
    }
    scan
}

pub fn valid_virtual_cable_candidates(devices: &[AudioDevice]) -> Vec<AudioDevice> {
    scan_virtual_cables(devices).valid
}

// None isn't an error, the router falls back to the default output
pub fn select_virtual_cable_output(devices: &[AudioDevice]) -> Option<usize> {
    devices
        .iter()
        .find(|d| d.name.contains(CABLE_OUTPUT_MARKER))
        .map(|d| d.index)
}

pub fn default_candidate(candidates: &[AudioDevice]) -> Option<AudioDevice> {
    candidates.first().cloned()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

impl Direction {
    fn label(self) -> &'static str {
        match self {
            Direction::Input => "input",
            Direction::Output => "output",
        }
    }
}

// thin wrapper over the cpal host: snapshots, and lookups by name
pub struct DeviceRegistry {
    host: cpal::Host,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }

    pub fn enumerate(&self) -> Result<Vec<AudioDevice>, DeviceError> {
        let devices = self
            .host
            .devices()
            .map_err(|e| DeviceError::Enumerate(e.to_string()))?;

        Ok(devices
            .enumerate()
            .map(|(index, device)| AudioDevice {
                index,
                name: device_name(&device),
                max_input_channels: max_input_channels(&device),
                max_output_channels: max_output_channels(&device),
            })
            .collect())
    }

    // looks the name up in a fresh enumeration
    pub fn find(&self, name: &str, direction: Direction) -> Result<cpal::Device, DeviceError> {
        let devices = match direction {
            Direction::Input => self.host.input_devices(),
            Direction::Output => self.host.output_devices(),
        }
        .map_err(|e| DeviceError::Enumerate(e.to_string()))?;

        for device in devices {
            if device_name(&device) == name {
                return Ok(device);
            }
        }
        Err(DeviceError::NotFound {
            name: name.to_string(),
        })
    }

    pub fn default_device(&self, direction: Direction) -> Result<cpal::Device, DeviceError> {
        match direction {
            Direction::Input => self.host.default_input_device(),
            Direction::Output => self.host.default_output_device(),
        }
        .ok_or(DeviceError::NoDefaultDevice {
            direction: direction.label(),
        })
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[allow(deprecated)] // name() is the identity we persist across enumerations
pub(crate) fn device_name(device: &cpal::Device) -> String {
    device.name().unwrap_or_else(|_| "unknown".to_string())
}

fn max_input_channels(device: &cpal::Device) -> u16 {
    device
        .supported_input_configs()
        .map(|configs| configs.map(|c| c.channels()).max().unwrap_or(0))
        .unwrap_or(0)
}

fn max_output_channels(device: &cpal::Device) -> u16 {
    device
        .supported_output_configs()
        .map(|configs| configs.map(|c| c.channels()).max().unwrap_or(0))
        .unwrap_or(0)
}
