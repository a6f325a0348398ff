//! Linux process and interface inspection

use super::{
    comm_name, process_listed, unix_interface_state, InterfaceState, PlatformError,
    SystemInspector,
};
use std::process::Command;

pub struct LinuxInspector;

impl LinuxInspector {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LinuxInspector {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemInspector for LinuxInspector {
    fn process_running(&self, name: &str) -> Result<bool, PlatformError> {
        let output = Command::new("ps")
            .args(["-eo", "comm="])
            .output()
            .map_err(|e| PlatformError::ProcessListError(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PlatformError::ProcessListError(stderr.to_string()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        // `comm` holds at most 15 bytes of the command name
        Ok(process_listed(&stdout, comm_name(name.trim())))
    }

    fn interface_state(&self, name: &str) -> Result<InterfaceState, PlatformError> {
        unix_interface_state(name)
    }
}
