//! Per-request outcomes and the single-service retry state machine

use crate::ip::IpAddress;
use crate::resolver::service::Identity;
use std::time::SystemTime;
use thiserror::Error;

/// Why a single lookup request failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AttemptError {
    #[error("request timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("HTTP status {0}")]
    HttpStatus(u16),
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for AttemptError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AttemptError::Timeout
        } else if let Some(status) = e.status() {
            AttemptError::HttpStatus(status.as_u16())
        } else {
            AttemptError::Network(e.to_string())
        }
    }
}

/// One request to one service
#[derive(Debug, Clone)]
pub struct Attempt {
    pub service: String,
    /// 1-based position of this attempt within the resolution
    pub ordinal: u32,
    pub outcome: Result<IpAddress, AttemptError>,
    pub at: SystemTime,
}

impl Attempt {
    pub fn succeeded(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Progress of a bounded retry loop against a single service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryState {
    Pending,
    Retrying { attempts: u32 },
    Resolved(Identity),
    Exhausted { attempts: u32 },
}

impl RetryState {
    /// Failed attempts recorded so far
    pub fn attempts(&self) -> u32 {
        match self {
            RetryState::Pending | RetryState::Resolved(_) => 0,
            RetryState::Retrying { attempts } | RetryState::Exhausted { attempts } => *attempts,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RetryState::Resolved(_) | RetryState::Exhausted { .. })
    }

    /// Advance after one attempt; `cap` of 0 behaves like 1
    pub fn step(self, outcome: Result<Identity, AttemptError>, cap: u32) -> Self {
        if self.is_terminal() {
            return self;
        }

        let attempts = self.attempts() + 1;
        match outcome {
            Ok(identity) => RetryState::Resolved(identity),
            Err(_) if attempts >= cap.max(1) => RetryState::Exhausted { attempts },
            Err(_) => RetryState::Retrying { attempts },
        }
    }
}
