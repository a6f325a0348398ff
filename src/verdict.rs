//! Secure / not-secure decision
//!
//! Rules are evaluated in order and the first match wins:
//!
//! 1. VPN process or interface missing (when probed)
//! 2. External IP could not be resolved
//! 3. Resolved identity matches a blocklist rule
//! 4. External IP equals the home IP
//!
//! Anything that trips a rule is `notsecure`. Only a run that clears all
//! four is `secure`.

use crate::ip::IpAddress;
use crate::platform::InterfaceState;
use crate::probe::LivenessSignal;
use crate::resolver::{Identity, Resolution};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Known non-VPN egress identity, e.g. the home ISP
///
/// A rule matches when at least one field is set and every set field equals
/// the identity's metadata, ignoring ASCII case. Identities without the
/// metadata never match.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BlockRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl BlockRule {
    pub fn matches(&self, identity: &Identity) -> bool {
        if self.org.is_none() && self.country.is_none() {
            return false;
        }
        field_matches(self.org.as_deref(), identity.org.as_deref())
            && field_matches(self.country.as_deref(), identity.country.as_deref())
    }
}

fn field_matches(rule: Option<&str>, actual: Option<&str>) -> bool {
    match (rule, actual) {
        (None, _) => true,
        (Some(_), None) => false,
        (Some(wanted), Some(actual)) => wanted.trim().eq_ignore_ascii_case(actual.trim()),
    }
}

impl fmt::Display for BlockRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.org, &self.country) {
            (Some(org), Some(country)) => write!(f, "{} / {}", org, country),
            (Some(org), None) => write!(f, "{}", org),
            (None, Some(country)) => write!(f, "{}", country),
            (None, None) => write!(f, "(empty rule)"),
        }
    }
}

/// Reason a run was judged not secure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finding {
    MissingHomeIp,
    ProcessMissing { name: String },
    InterfaceMissing { name: String },
    InterfaceDown { name: String },
    Unresolved { attempts: usize },
    Blocklisted { ip: IpAddress, rule: BlockRule },
    Leak { ip: IpAddress },
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Finding::MissingHomeIp => write!(f, "No home IP to compare against!"),
            Finding::ProcessMissing { name } => write!(f, "VPN process '{}' not running!", name),
            Finding::InterfaceMissing { name } => write!(f, "VPN interface '{}' not found!", name),
            Finding::InterfaceDown { name } => write!(f, "VPN interface '{}' down!", name),
            Finding::Unresolved { attempts } => write!(
                f,
                "Cannot determine external IP after {} attempt(s)!",
                attempts
            ),
            Finding::Blocklisted { ip, rule } => {
                write!(f, "BLOCKLISTED EGRESS: {} ({})", ip, rule)
            }
            Finding::Leak { ip } => write!(f, "IP LEAK DETECTED: {}", ip),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Secure,
    NotSecure(Finding),
}

impl Verdict {
    pub fn is_secure(&self) -> bool {
        matches!(self, Verdict::Secure)
    }

    /// The single word printed on stdout
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Secure => "secure",
            Verdict::NotSecure(_) => "notsecure",
        }
    }

    pub fn finding(&self) -> Option<&Finding> {
        match self {
            Verdict::Secure => None,
            Verdict::NotSecure(finding) => Some(finding),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rule 1 on its own, so callers can stop before any network activity
pub fn liveness_finding(signal: &LivenessSignal) -> Option<Finding> {
    if !signal.process_present {
        return Some(Finding::ProcessMissing {
            name: signal.process_name.clone(),
        });
    }

    match signal.interface {
        InterfaceState::Up => None,
        InterfaceState::Down => Some(Finding::InterfaceDown {
            name: signal.interface_name.clone(),
        }),
        InterfaceState::Absent => Some(Finding::InterfaceMissing {
            name: signal.interface_name.clone(),
        }),
    }
}

/// A blank home IP never compares equal to anything, so it is refused outright
pub fn evaluate(
    home: &IpAddress,
    liveness: Option<&LivenessSignal>,
    resolution: &Resolution,
    blocklist: &[BlockRule],
) -> Verdict {
    if home.is_empty() {
        return Verdict::NotSecure(Finding::MissingHomeIp);
    }

    if let Some(finding) = liveness.and_then(liveness_finding) {
        return Verdict::NotSecure(finding);
    }

    let Some(identity) = resolution.identity() else {
        return Verdict::NotSecure(Finding::Unresolved {
            attempts: resolution.attempts().len(),
        });
    };

    if let Some(rule) = blocklist.iter().find(|rule| rule.matches(identity)) {
        return Verdict::NotSecure(Finding::Blocklisted {
            ip: identity.ip.clone(),
            rule: rule.clone(),
        });
    }

    if identity.ip == *home {
        return Verdict::NotSecure(Finding::Leak {
            ip: identity.ip.clone(),
        });
    }

    Verdict::Secure
}
