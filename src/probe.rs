//! Local VPN liveness probe
//!
//! Looks for the VPN client process and its tunnel interface. A check that
//! cannot run (tool missing, permission denied, unsupported OS) reports the
//! signal as absent.

use crate::config::ProbeConfig;
use crate::platform::{get_system_inspector, InterfaceState, SystemInspector};
use tracing::{debug, warn};

/// Local evidence that the VPN client is running
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LivenessSignal {
    pub process_name: String,
    pub process_present: bool,
    pub interface_name: String,
    pub interface: InterfaceState,
}

/// Anything that can produce a [`LivenessSignal`]
pub trait LivenessSource {
    fn probe(&self) -> LivenessSignal;
}

pub struct SystemProbe {
    inspector: Option<Box<dyn SystemInspector>>,
    process_name: String,
    interface_name: String,
}

impl SystemProbe {
    pub fn new(
        inspector: Box<dyn SystemInspector>,
        process_name: &str,
        interface_name: &str,
    ) -> Self {
        Self {
            inspector: Some(inspector),
            process_name: process_name.to_string(),
            interface_name: interface_name.to_string(),
        }
    }

    /// Probe using the current platform's inspector
    pub fn from_config(config: &ProbeConfig) -> Self {
        let inspector = match get_system_inspector() {
            Ok(inspector) => Some(inspector),
            Err(e) => {
                warn!("Liveness probe unavailable: {}", e);
                None
            }
        };

        Self {
            inspector,
            process_name: config.process_name.clone(),
            interface_name: config.interface.clone(),
        }
    }
}

impl LivenessSource for SystemProbe {
    fn probe(&self) -> LivenessSignal {
        let (process_present, interface) = match &self.inspector {
            None => (false, InterfaceState::Absent),
            Some(inspector) => {
                let process_present = inspector
                    .process_running(&self.process_name)
                    .unwrap_or_else(|e| {
                        warn!("Process check for '{}' failed: {}", self.process_name, e);
                        false
                    });
                let interface = inspector
                    .interface_state(&self.interface_name)
                    .unwrap_or_else(|e| {
                        warn!("Interface check for '{}' failed: {}", self.interface_name, e);
                        InterfaceState::Absent
                    });
                (process_present, interface)
            }
        };

        debug!(
            "Liveness: process '{}' present={}, interface '{}' {:?}",
            self.process_name, process_present, self.interface_name, interface
        );

        LivenessSignal {
            process_name: self.process_name.clone(),
            process_present,
            interface_name: self.interface_name.clone(),
            interface,
        }
    }
}
