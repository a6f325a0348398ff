//! Platform-specific process and interface inspection

#[cfg(target_os = "macos")]
pub mod mac;

#[cfg(target_os = "linux")]
pub mod linux;

#[cfg(target_os = "windows")]
pub mod windows;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("Failed to list processes: {0}")]
    ProcessListError(String),
    #[error("Failed to list network interfaces: {0}")]
    InterfaceListError(String),
    #[error("Unsupported platform")]
    UnsupportedPlatform,
}

/// State of a named network interface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceState {
    Absent,
    Down,
    Up,
}

impl InterfaceState {
    pub fn is_up(self) -> bool {
        self == InterfaceState::Up
    }
}

/// Platform-agnostic view of the local process table and interface list
pub trait SystemInspector {
    fn process_running(&self, name: &str) -> Result<bool, PlatformError>;
    fn interface_state(&self, name: &str) -> Result<InterfaceState, PlatformError>;
}

/// Get the appropriate inspector for the current platform
pub fn get_system_inspector() -> Result<Box<dyn SystemInspector>, PlatformError> {
    #[cfg(target_os = "macos")]
    {
        Ok(Box::new(mac::MacInspector::new()))
    }

    #[cfg(target_os = "linux")]
    {
        Ok(Box::new(linux::LinuxInspector::new()))
    }

    #[cfg(target_os = "windows")]
    {
        Ok(Box::new(windows::WindowsInspector::new()))
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        Err(PlatformError::UnsupportedPlatform)
    }
}

/// Check whether `name` appears in a process listing, one process per line
///
/// Lines may hold a bare command name, a full path, or a quoted CSV row
/// (`tasklist`); only the first CSV column is considered. Matching is on the
/// basename, case-insensitive, with an optional `.exe` suffix.
pub fn process_listed(listing: &str, name: &str) -> bool {
    let wanted = strip_exe(name.trim());
    if wanted.is_empty() {
        return false;
    }

    listing.lines().any(|line| {
        let first_column = line.split("\",").next().unwrap_or_default();
        let command = first_column.trim().trim_matches('"');
        let basename = command.rsplit(['/', '\\']).next().unwrap_or_default();
        strip_exe(basename).eq_ignore_ascii_case(wanted)
    })
}

/// Longest command name Linux keeps in `comm` (TASK_COMM_LEN minus the NUL)
pub const COMM_MAX_LEN: usize = 15;

/// Cut `name` the way the kernel cuts `comm`, so long names still match `ps -o comm`
pub fn comm_name(name: &str) -> &str {
    if name.len() <= COMM_MAX_LEN {
        return name;
    }
    let mut end = COMM_MAX_LEN;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}

fn strip_exe(name: &str) -> &str {
    let len = name.len();
    if len > 4 && name.is_char_boundary(len - 4) && name[len - 4..].eq_ignore_ascii_case(".exe") {
        &name[..len - 4]
    } else {
        name
    }
}

/// Interface state from `getifaddrs`, shared by Linux and macOS
///
/// `getifaddrs` yields one entry per address; flags are merged across all
/// entries carrying the interface name.
#[cfg(unix)]
pub(crate) fn unix_interface_state(name: &str) -> Result<InterfaceState, PlatformError> {
    use nix::net::if_::InterfaceFlags;

    let addrs =
        nix::ifaddrs::getifaddrs().map_err(|e| PlatformError::InterfaceListError(e.to_string()))?;

    let flags = addrs
        .filter(|ifa| ifa.interface_name == name)
        .map(|ifa| ifa.flags)
        .reduce(|acc, f| acc | f);

    Ok(match flags {
        None => InterfaceState::Absent,
        Some(f) => state_from_flags(
            f.contains(InterfaceFlags::IFF_UP),
            f.contains(InterfaceFlags::IFF_RUNNING),
        ),
    })
}

/// An interface counts as up only when administratively and operationally up
pub fn state_from_flags(admin_up: bool, running: bool) -> InterfaceState {
    if admin_up && running {
        InterfaceState::Up
    } else {
        InterfaceState::Down
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_error_display() {
        let err = PlatformError::ProcessListError("ps not found".to_string());
        assert_eq!(err.to_string(), "Failed to list processes: ps not found");

        let err = PlatformError::InterfaceListError("permission denied".to_string());
        assert_eq!(
            err.to_string(),
            "Failed to list network interfaces: permission denied"
        );

        let err = PlatformError::UnsupportedPlatform;
        assert_eq!(err.to_string(), "Unsupported platform");
    }

    #[test]
    fn test_get_system_inspector_returns_ok() {
        #[cfg(any(target_os = "macos", target_os = "linux", target_os = "windows"))]
        {
            assert!(get_system_inspector().is_ok());
        }
    }

    #[test]
    fn test_process_listed_plain_names() {
        let listing = "systemd\nsshd\nopenvpn\nbash\n";
        assert!(process_listed(listing, "openvpn"));
        assert!(!process_listed(listing, "wireguard-go"));
    }

    #[test]
    fn test_process_listed_full_paths() {
        let listing = "/sbin/launchd\n/usr/local/sbin/openvpn\n/bin/zsh\n";
        assert!(process_listed(listing, "openvpn"));
    }

    #[test]
    fn test_process_listed_requires_exact_basename() {
        let listing = "openvpn-helper\nmyopenvpn\n";
        assert!(!process_listed(listing, "openvpn"));
    }

    #[test]
    fn test_process_listed_tasklist_csv() {
        let listing = "\"System Idle Process\",\"0\",\"Services\",\"0\",\"8 K\"\r\n\
                       \"openvpn.exe\",\"4242\",\"Console\",\"1\",\"12,345 K\"\r\n";
        assert!(process_listed(listing, "openvpn"));
        assert!(process_listed(listing, "OpenVPN.exe"));
        assert!(!process_listed(listing, "4242"));
    }

    #[test]
    fn test_process_listed_long_linux_comm() {
        let listing = "systemd\nopenvpn3-servic\n";
        assert!(!process_listed(listing, "openvpn3-service-client"));
        assert!(process_listed(listing, comm_name("openvpn3-service-client")));
        assert!(!process_listed(listing, comm_name("openvpn3-session-manager")));
    }

    #[test]
    fn test_comm_name() {
        assert_eq!(comm_name("openvpn"), "openvpn");
        assert_eq!(comm_name("exactly-15-char"), "exactly-15-char");
        assert_eq!(comm_name("openvpn3-service-client"), "openvpn3-servic");
        // never splits a multi-byte character
        assert_eq!(comm_name("openvpn-clienté-x"), "openvpn-client");
    }

    #[test]
    fn test_process_listed_empty_name_never_matches() {
        assert!(!process_listed("\n\n", ""));
        assert!(!process_listed("bash\n", "  "));
    }

    #[test]
    fn test_state_from_flags() {
        assert_eq!(state_from_flags(true, true), InterfaceState::Up);
        assert_eq!(state_from_flags(true, false), InterfaceState::Down);
        assert_eq!(state_from_flags(false, false), InterfaceState::Down);
        assert!(InterfaceState::Up.is_up());
        assert!(!InterfaceState::Absent.is_up());
    }

    #[cfg(unix)]
    #[test]
    fn test_unknown_interface_is_absent() {
        let state = unix_interface_state("definitely-not-an-iface0").unwrap();
        assert_eq!(state, InterfaceState::Absent);
    }
}
