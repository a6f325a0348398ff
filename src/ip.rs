//! Whitespace-normalized IP address values
//!
//! Addresses reported by lookup services (and typed on the command line)
//! often carry trailing newlines. Comparison happens on the trimmed text;
//! no structural validation is applied.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct IpAddress(String);

impl IpAddress {
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for IpAddress {
    fn from(raw: String) -> Self {
        Self::new(&raw)
    }
}

impl From<&str> for IpAddress {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<IpAddress> for String {
    fn from(ip: IpAddress) -> Self {
        ip.0
    }
}

impl std::str::FromStr for IpAddress {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl fmt::Display for IpAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
