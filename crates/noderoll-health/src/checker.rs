//! Health check retry loop.
//!
//! Probes an endpoint until it answers as expected or the attempt budget
//! runs out, keeping one diagnostic line per failed attempt.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use noderoll_core::ConfigError;
use noderoll_core::config::ProbeConfig;

use crate::probe::{Endpoint, ProbeResponse, Prober};

/// What a healthy response looks like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acceptance {
    pub status: u16,
    /// Compared as JSON when both sides parse as JSON, else as trimmed text.
    pub body: String,
    /// Exclusive upper bound on response latency.
    pub max_latency: Duration,
}

impl Acceptance {
    pub fn from_config(config: &ProbeConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            status: config.expected_status,
            body: config.expected_body.clone(),
            max_latency: config.max_latency()?,
        })
    }

    pub fn accepts(&self, resp: &ProbeResponse) -> bool {
        resp.status == self.status
            && body_matches(&self.body, &resp.body)
            && resp.elapsed < self.max_latency
    }
}

/// How many times to probe and how long to wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbePolicy {
    pub max_attempts: u32,
    /// Minimum gap after a failed attempt.
    pub interval: Duration,
    /// Wait before the first attempt.
    pub warmup: Duration,
}

impl ProbePolicy {
    pub fn from_config(config: &ProbeConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            max_attempts: config.max_attempts,
            interval: config.interval()?,
            warmup: config.warmup()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthCheckOutcome {
    pub success: bool,
    /// Probes actually issued.
    pub attempts: u32,
    /// One line per failed attempt.
    pub reasons: Vec<String>,
}

impl HealthCheckOutcome {
    /// A check that never got to probe, e.g. no port for the node.
    pub fn not_run(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            attempts: 0,
            reasons: vec![reason.into()],
        }
    }

    pub fn transcript(&self) -> String {
        self.reasons.join("\n")
    }
}

/// Probe `endpoint` until one attempt passes `acceptance`.
///
/// Always waits `policy.warmup` first, then issues at most
/// `policy.max_attempts` probes (at least one).
pub async fn probe_until_healthy(
    prober: &dyn Prober,
    endpoint: &Endpoint,
    acceptance: &Acceptance,
    policy: &ProbePolicy,
) -> HealthCheckOutcome {
    let max_attempts = policy.max_attempts.max(1);
    let mut reasons = Vec::new();

    debug!(%endpoint, warmup = ?policy.warmup, "waiting for service to start");
    tokio::time::sleep(policy.warmup).await;

    for attempt in 1..=max_attempts {
        let resp = prober.probe(endpoint).await;

        if acceptance.accepts(&resp) {
            info!(%endpoint, attempt, latency = ?resp.elapsed, "service is responding as intended");
            return HealthCheckOutcome {
                success: true,
                attempts: attempt,
                reasons,
            };
        }

        let line = describe_attempt(attempt, &resp);
        warn!(%endpoint, attempt, max_attempts, status = resp.status, "health probe did not pass");
        reasons.push(line);

        if attempt < max_attempts {
            tokio::time::sleep(policy.interval).await;
        }
    }

    warn!(%endpoint, attempts = max_attempts, "health checks exhausted");
    HealthCheckOutcome {
        success: false,
        attempts: max_attempts,
        reasons,
    }
}

fn describe_attempt(attempt: u32, resp: &ProbeResponse) -> String {
    let body = resp.body.trim();
    let mut line = format!(
        "attempt {attempt}: status={} latency={}ms body={}",
        resp.status,
        resp.elapsed.as_millis(),
        if body.is_empty() { "<empty>" } else { body }
    );
    if let Some(err) = &resp.error {
        line.push_str(&format!(" error={err}"));
    }
    line
}

fn body_matches(expected: &str, actual: &str) -> bool {
    let (expected, actual) = (expected.trim(), actual.trim());
    match (
        serde_json::from_str::<serde_json::Value>(expected),
        serde_json::from_str::<serde_json::Value>(actual),
    ) {
        (Ok(e), Ok(a)) => e == a,
        _ => expected == actual,
    }
}
