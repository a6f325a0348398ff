//! vpn-leak-check - is this host's traffic really leaving through the VPN?
//!
//! Compares the host's public IP, as seen by third-party lookup services,
//! against the caller's known home (non-VPN) IP. Intended to be run
//! periodically from cron or a systemd timer.
//!
//! # Architecture
//!
//! - `ip`: whitespace-normalized address values
//! - `resolver`: external IP lookup with bounded retry or multi-service fallback
//! - `platform`: process and interface inspection (macOS, Linux, Windows)
//! - `probe`: local VPN liveness signal built on `platform`
//! - `verdict`: fail-closed secure / not-secure decision
//! - `check`: one full run, probe then resolve then decide
//! - `config`: optional TOML configuration
//!
//! # Usage
//!
//! ```bash
//! vpn-leak-check 203.0.113.9 || notify-send "VPN leak"
//! ```

pub mod check;
pub mod config;
pub mod ip;
pub mod platform;
pub mod probe;
pub mod resolver;
pub mod verdict;

pub use check::{run_check, Report};
pub use config::Config;
pub use ip::IpAddress;
pub use resolver::{Resolution, Resolver, Strategy};
pub use verdict::{Finding, Verdict};
