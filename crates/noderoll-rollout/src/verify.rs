//! Post-action health gate.

use std::sync::Arc;

use noderoll_core::config::ProbeConfig;
use noderoll_core::{BoxFuture, ConfigError, HostProfile, NodeUnit, TopologyResolver};
use noderoll_health::{Acceptance, Endpoint, HealthCheckOutcome, ProbePolicy, Prober, probe_until_healthy};

/// Decides whether a node came back healthy after its action.
pub trait HealthVerifier: Send + Sync {
    fn verify<'a>(&'a self, host: &'a HostProfile, unit: &'a NodeUnit) -> BoxFuture<'a, HealthCheckOutcome>;
}

/// Probes the node's own port, looked up from the environment's services.
pub struct ProbeVerifier {
    resolver: TopologyResolver,
    prober: Arc<dyn Prober>,
    service_type: String,
    uri: String,
    acceptance: Acceptance,
    policy: ProbePolicy,
}

impl ProbeVerifier {
    pub fn new(
        resolver: TopologyResolver,
        prober: Arc<dyn Prober>,
        service_type: impl Into<String>,
        uri: impl Into<String>,
        acceptance: Acceptance,
        policy: ProbePolicy,
    ) -> Self {
        Self {
            resolver,
            prober,
            service_type: service_type.into(),
            uri: uri.into(),
            acceptance,
            policy,
        }
    }

    pub fn from_config(
        resolver: TopologyResolver,
        prober: Arc<dyn Prober>,
        config: &ProbeConfig,
    ) -> Result<Self, ConfigError> {
        Ok(Self::new(
            resolver,
            prober,
            config.service_type.clone(),
            config.uri.clone(),
            Acceptance::from_config(config)?,
            ProbePolicy::from_config(config)?,
        ))
    }

    fn endpoint(&self, host: &HostProfile, unit: &NodeUnit) -> Option<Endpoint> {
        let port = self
            .resolver
            .service_port(&host.environment, &self.service_type, unit)?;
        Some(Endpoint::new(&host.host, port, &self.uri))
    }
}

impl HealthVerifier for ProbeVerifier {
    fn verify<'a>(&'a self, host: &'a HostProfile, unit: &'a NodeUnit) -> BoxFuture<'a, HealthCheckOutcome> {
        Box::pin(async move {
            let Some(endpoint) = self.endpoint(host, unit) else {
                tracing::warn!(host = %host.host, node = %unit, service_type = %self.service_type, "no port known for node; cannot health check");
                return HealthCheckOutcome::not_run(format!(
                    "no {} port for {} in environment {}",
                    self.service_type, unit, host.environment
                ));
            };
            probe_until_healthy(&*self.prober, &endpoint, &self.acceptance, &self.policy).await
        })
    }
}
