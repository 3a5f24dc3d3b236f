pub use crate::audio::AudioDevice;

use crate::shared::BUFFER_SIZE;

// Which devices the router should open. Devices are named, never indexed, so
// a selection survives re-enumeration; `None` means "pick for me".
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceSelection {
    pub capture: Option<String>,
    pub virtual_cable: Option<String>, // falls back to "CABLE Input", then the default output
    pub speaker: Option<String>,
    pub buffer_size: u32, // frames, shared by all three streams
}

impl Default for DeviceSelection {
    fn default() -> Self {
        Self {
            capture: None,
            virtual_cable: None,
            speaker: None,
            buffer_size: BUFFER_SIZE,
        }
    }
}

impl DeviceSelection {
    #[cfg(test)]
    pub fn with_virtual_cable(mut self, name: impl Into<String>) -> Self {
        self.virtual_cable = Some(name.into());
        self
    }
}

// Names of the devices a running route actually opened.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RouteDevices {
    pub capture: String,
    pub virtual_cable: String,
    pub speaker: String,
}

// Non-fatal problems found while opening a route.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RoutingWarning {
    // No "CABLE Input" device, mixed audio goes to the default output instead
    VirtualCableMissing { fallback: String },
    // A named device vanished, its role went to the default device
    FellBackToDefault {
        role: &'static str,
        requested: String,
        fallback: String,
    },
}

impl std::fmt::Display for RoutingWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoutingWarning::VirtualCableMissing { fallback } => write!(
                f,
                "VB-Cable was not detected, routing to '{fallback}'. Install it for proper audio routing."
            ),
            RoutingWarning::FellBackToDefault {
                role,
                requested,
                fallback,
            } => write!(f, "{role} device '{requested}' not found, using '{fallback}'"),
        }
    }
}
