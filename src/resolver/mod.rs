//! External IP resolution
//!
//! Queries third-party lookup services to learn the address the rest of the
//! internet sees for this host. Two strategies are supported:
//!
//! - `single-retry`: hammer the first configured service until it answers
//!   with a parseable 200 or the attempt cap is reached
//! - `fallback`: one attempt per service, in order, first success wins
//!
//! Resolution never returns an error. Every failed request is recorded as
//! an [`Attempt`] and the caller receives either [`Resolution::Resolved`] or
//! [`Resolution::Exhausted`].

pub mod attempt;
pub mod service;

pub use attempt::{Attempt, AttemptError, RetryState};
pub use service::{default_services, Identity, ResponseFormat, Service};

use crate::config::ResolverConfig;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug)]
pub enum ResolverError {
    #[error("No lookup services configured")]
    NoServices,
    #[error("Failed to build HTTP client: {0}")]
    ClientError(#[from] reqwest::Error),
}

/// Which resolution procedure to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Retry the first service up to the attempt cap
    #[default]
    SingleRetry,
    /// Try every service once, in order
    Fallback,
}

/// Bounds applied to every request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub timeout: Duration,
    /// Pause between failed single-retry attempts
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 25,
            timeout: Duration::from_secs(10),
            retry_delay: Duration::from_millis(500),
        }
    }
}

/// Final outcome of a resolution run
#[derive(Debug, Clone)]
pub enum Resolution {
    Resolved {
        identity: Identity,
        attempts: Vec<Attempt>,
    },
    Exhausted {
        attempts: Vec<Attempt>,
    },
}

impl Resolution {
    pub fn attempts(&self) -> &[Attempt] {
        match self {
            Resolution::Resolved { attempts, .. } | Resolution::Exhausted { attempts } => attempts,
        }
    }

    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Resolution::Resolved { identity, .. } => Some(identity),
            Resolution::Exhausted { .. } => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved { .. })
    }
}

/// Anything that can report the host's external address
pub trait IpSource {
    fn resolve(&self) -> impl Future<Output = Resolution>;
}

pub struct Resolver {
    client: Client,
    services: Vec<Service>,
    strategy: Strategy,
    policy: RetryPolicy,
}

impl Resolver {
    pub fn new(
        services: Vec<Service>,
        strategy: Strategy,
        policy: RetryPolicy,
    ) -> Result<Self, ResolverError> {
        if services.is_empty() {
            return Err(ResolverError::NoServices);
        }

        let client = Client::builder()
            .user_agent(concat!("vpn-leak-check/", env!("CARGO_PKG_VERSION")))
            .build()?;

        debug!(
            "Resolver ready: strategy={:?}, services={}, cap={}, timeout={:?}",
            strategy,
            services.len(),
            policy.max_attempts,
            policy.timeout
        );

        Ok(Self {
            client,
            services,
            strategy,
            policy,
        })
    }

    pub fn from_config(config: &ResolverConfig) -> Result<Self, ResolverError> {
        Self::new(config.services.clone(), config.strategy, config.retry_policy())
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Issue one request and parse the body according to the service's format
    async fn fetch(&self, service: &Service) -> Result<Identity, AttemptError> {
        let timeout = service.timeout.unwrap_or(self.policy.timeout);
        let response = self
            .client
            .get(&service.url)
            .timeout(timeout)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(AttemptError::HttpStatus(status.as_u16()));
        }

        let body = response.text().await?;
        service.format.parse(&service.name, &body)
    }

    async fn attempt(
        &self,
        service: &Service,
        ordinal: u32,
    ) -> (Attempt, Result<Identity, AttemptError>) {
        debug!("Attempt {} against {} ({})", ordinal, service.name, service.url);
        let at = SystemTime::now();
        let outcome = self.fetch(service).await;

        match &outcome {
            Ok(identity) => info!("{} reports external IP {}", service.name, identity.ip),
            Err(e) => warn!("{} attempt {} failed: {}", service.name, ordinal, e),
        }

        let record = Attempt {
            service: service.name.clone(),
            ordinal,
            outcome: outcome.as_ref().map(|i| i.ip.clone()).map_err(Clone::clone),
            at,
        };
        (record, outcome)
    }

    async fn resolve_single_retry(&self) -> Resolution {
        let service = &self.services[0];
        let mut attempts = Vec::new();
        let mut state = RetryState::Pending;

        loop {
            let (record, outcome) = self.attempt(service, state.attempts() + 1).await;
            attempts.push(record);
            state = state.step(outcome, self.policy.max_attempts);

            match state {
                RetryState::Resolved(identity) => {
                    return Resolution::Resolved { identity, attempts };
                }
                RetryState::Exhausted { attempts: count } => {
                    error!("{}: all {} attempts exhausted", service.name, count);
                    return Resolution::Exhausted { attempts };
                }
                RetryState::Pending | RetryState::Retrying { .. } => {
                    if !self.policy.retry_delay.is_zero() {
                        tokio::time::sleep(self.policy.retry_delay).await;
                    }
                }
            }
        }
    }

    async fn resolve_fallback(&self) -> Resolution {
        let mut attempts = Vec::with_capacity(self.services.len());

        for (service, ordinal) in self.services.iter().zip(1..) {
            let (record, outcome) = self.attempt(service, ordinal).await;
            attempts.push(record);
            if let Ok(identity) = outcome {
                return Resolution::Resolved { identity, attempts };
            }
        }

        error!("All {} IP lookup services failed", self.services.len());
        Resolution::Exhausted { attempts }
    }
}

impl IpSource for Resolver {
    async fn resolve(&self) -> Resolution {
        match self.strategy {
            Strategy::SingleRetry => self.resolve_single_retry().await,
            Strategy::Fallback => self.resolve_fallback().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_service_table_rejected() {
        let result = Resolver::new(vec![], Strategy::Fallback, RetryPolicy::default());
        assert!(matches!(result, Err(ResolverError::NoServices)));
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 25);
        assert_eq!(policy.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_strategy_serde_names() {
        #[derive(Deserialize)]
        struct Wrapper {
            strategy: Strategy,
        }
        let w: Wrapper = toml::from_str(r#"strategy = "fallback""#).unwrap();
        assert_eq!(w.strategy, Strategy::Fallback);
        let w: Wrapper = toml::from_str(r#"strategy = "single-retry""#).unwrap();
        assert_eq!(w.strategy, Strategy::SingleRetry);
    }

    #[test]
    fn test_resolution_accessors() {
        let exhausted = Resolution::Exhausted { attempts: vec![] };
        assert!(!exhausted.is_resolved());
        assert!(exhausted.identity().is_none());
        assert!(exhausted.attempts().is_empty());
    }
}
