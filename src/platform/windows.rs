//! Windows process and interface inspection

use super::{process_listed, InterfaceState, PlatformError, SystemInspector};
use std::process::Command;

pub struct WindowsInspector;

impl WindowsInspector {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WindowsInspector {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemInspector for WindowsInspector {
    fn process_running(&self, name: &str) -> Result<bool, PlatformError> {
        let output = Command::new("tasklist")
            .args(["/FO", "CSV", "/NH"])
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
        let output = Command::new("netsh")
            .args(["interface", "show", "interface"])
            .arg(format!("name={}", name))
            .output()
            .map_err(|e| PlatformError::InterfaceListError(e.to_string()))?;

        // netsh exits non-zero when the interface does not exist
        if !output.status.success() {
            return Ok(InterfaceState::Absent);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(parse_netsh_interface(&stdout))
    }
}

/// Parse the key/value block printed by `netsh interface show interface name=...`
///
/// ```text
/// OpenVPN TAP-Windows6:
///    Type:                 Dedicated
///    Administrative state: Enabled
///    Connect state:        Connected
/// ```
pub fn parse_netsh_interface(output: &str) -> InterfaceState {
    let mut admin_enabled = None;
    let mut connected = None;

    for line in output.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            "Administrative state" => admin_enabled = Some(value.eq_ignore_ascii_case("Enabled")),
            "Connect state" => connected = Some(value.eq_ignore_ascii_case("Connected")),
            _ => {}
        }
    }

    match (admin_enabled, connected) {
        (None, None) => InterfaceState::Absent,
        (admin, conn) => super::state_from_flags(admin.unwrap_or(false), conn.unwrap_or(false)),
    }
}
