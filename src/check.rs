//! One leak check, from liveness probe to verdict

use crate::ip::IpAddress;
use crate::probe::{LivenessSignal, LivenessSource};
use crate::resolver::{IpSource, Resolution};
use crate::verdict::{evaluate, liveness_finding, BlockRule, Verdict};
use tracing::{info, warn};

/// Everything a run observed, for reporting
#[derive(Debug, Clone)]
pub struct Report {
    pub verdict: Verdict,
    pub liveness: Option<LivenessSignal>,
    /// `None` when the liveness probe short-circuited the run
    pub resolution: Option<Resolution>,
}

impl Report {
    pub fn external_ip(&self) -> Option<&IpAddress> {
        self.resolution
            .as_ref()
            .and_then(Resolution::identity)
            .map(|identity| &identity.ip)
    }
}

/// Run the check
///
/// When a liveness source is given it runs first; a missing process or
/// interface ends the run as not secure without touching the network.
pub async fn run_check<L, S>(
    home: &IpAddress,
    liveness: Option<&L>,
    source: &S,
    blocklist: &[BlockRule],
) -> Report
where
    L: LivenessSource,
    S: IpSource,
{
    let signal = liveness.map(LivenessSource::probe);

    if let Some(finding) = signal.as_ref().and_then(liveness_finding) {
        warn!("{}", finding);
        return Report {
            verdict: Verdict::NotSecure(finding),
            liveness: signal,
            resolution: None,
        };
    }

    let resolution = source.resolve().await;
    let verdict = evaluate(home, signal.as_ref(), &resolution, blocklist);

    match verdict.finding() {
        None => info!("Egress differs from home IP {}, VPN in use", home),
        Some(finding) => warn!("{}", finding),
    }

    Report {
        verdict,
        liveness: signal,
        resolution: Some(resolution),
    }
}
