//! macOS process and interface inspection

use super::{process_listed, unix_interface_state, InterfaceState, PlatformError, SystemInspector};
use std::process::Command;

pub struct MacInspector;

impl MacInspector {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MacInspector {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemInspector for MacInspector {
    fn process_running(&self, name: &str) -> Result<bool, PlatformError> {
        // comm is the full executable path on macOS
        let output = Command::new("ps")
            .args(["-axo", "comm="])
            .output()
            .map_err(|e| PlatformError::ProcessListError(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PlatformError::ProcessListError(stderr.to_string()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(process_listed(&stdout, name))
    }

    fn interface_state(&self, name: &str) -> Result<InterfaceState, PlatformError> {
        // OpenVPN and WireGuard both show up as utunN here
        unix_interface_state(name)
    }
}
