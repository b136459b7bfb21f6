//! Service port sweep.
//!
//! Sends one probe to every port of a service type on every host of an
//! environment that serves a role, and collects the ports that did not
//! answer with the expected status.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{info, warn};

use noderoll_core::{MachineKind, Role, TopologyError, TopologyResolver};

use crate::probe::{Endpoint, Prober};

/// Elasticsearch's HTTP port; the only one probed on virtual index hosts.
const ELASTIC_HTTP_PORT: u16 = 9200;
const ELASTIC_UNIT: &str = "elasticsearch.service";

#[derive(Debug, Clone)]
pub struct SweepRequest {
    pub environment: String,
    pub role: Role,
    pub service_type: String,
    /// Appended to `https://host:port`; empty probes the root.
    pub uri: String,
    pub expected_status: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Ports that answered as expected, per host.
    pub passed: BTreeMap<String, Vec<u16>>,
    /// Ports that did not, per host.
    pub failed: BTreeMap<String, Vec<u16>>,
}

impl SweepReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Probe every matching (host, port) once.
pub async fn sweep(
    resolver: &TopologyResolver,
    prober: &dyn Prober,
    req: &SweepRequest,
) -> Result<SweepReport, TopologyError> {
    let services = resolver.services(&req.environment, &req.service_type)?;
    let hosts = resolver.hosts_with_role(&req.environment, req.role)?;
    let mut report = SweepReport::default();

    for host in hosts {
        let machine = resolver.machine_kind(host);

        for (service, &port) in services {
            if skip_port(req.role, machine, service, port) {
                continue;
            }

            let path = if req.uri.is_empty() { "/" } else { req.uri.as_str() };
            let endpoint = Endpoint::new(host, port, path);
            let resp = prober.probe(&endpoint).await;

            let bucket = if resp.status == req.expected_status {
                info!(%host, port, %service, environment = %req.environment, "passed the port check");
                &mut report.passed
            } else {
                warn!(%host, port, %service, environment = %req.environment, status = resp.status, "FAILED the port check");
                &mut report.failed
            };
            bucket.entry(host.to_string()).or_default().push(port);
        }
    }

    Ok(report)
}

/// Index hosts on VMs run a single elasticsearch on 9200; bare-metal index
/// hosts run per-disk instances and no plain `elasticsearch.service`.
fn skip_port(role: Role, machine: Option<MachineKind>, service: &str, port: u16) -> bool {
    if role != Role::IndexLayer {
        return false;
    }
    match machine {
        Some(MachineKind::Virtual) => port != ELASTIC_HTTP_PORT,
        Some(MachineKind::BareMetal) => service == ELASTIC_UNIT,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::ProbeResponse;
    use noderoll_core::{BoxFuture, Inventory};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    const INVENTORY: &str = r#"{
        "environments": {
            "prod_b": {
                "hosts": ["es-vm", "es-bm", "api1"],
                "split": true,
                "services": {
                    "elastic": {
                        "elasticsearch.service": 9200,
                        "elasticsearch@d1.service": 9201,
                        "elasticsearch@d2.service": 9202
                    },
                    "index": { "tomcat@node1.service": 8443, "tomcat@node2.service": 8444 }
                }
            }
        },
        "functions": {
            "elastic_index_layer": { "hosts": ["es-vm", "es-bm"] },
            "middle_tier_and_ui": { "hosts": ["api1"] }
        },
        "server_type": { "children": {
            "vm": { "hosts": ["es-vm", "api1"] },
            "bm": { "hosts": ["es-bm"] }
        } }
    }"#;

    /// Answers 200 except on the listed ports; records every endpoint.
    struct PortProber {
        down: Vec<u16>,
        seen: Mutex<Vec<String>>,
    }

    impl Prober for PortProber {
        fn probe<'a>(&'a self, endpoint: &'a Endpoint) -> BoxFuture<'a, ProbeResponse> {
            self.seen.lock().unwrap().push(format!("{}:{}", endpoint.host, endpoint.port));
            let resp = if self.down.contains(&endpoint.port) {
                ProbeResponse::unreachable(Duration::ZERO, "refused")
            } else {
                ProbeResponse {
                    status: 200,
                    body: String::new(),
                    elapsed: Duration::from_millis(3),
                    error: None,
                }
            };
            Box::pin(async move { resp })
        }
    }

    fn resolver() -> TopologyResolver {
        TopologyResolver::new(Arc::new(Inventory::from_json_str(INVENTORY).unwrap()))
    }

    fn request(role: Role, service_type: &str) -> SweepRequest {
        SweepRequest {
            environment: "prod_b".to_string(),
            role,
            service_type: service_type.to_string(),
            uri: String::new(),
            expected_status: 200,
        }
    }

    #[tokio::test]
    async fn elastic_exclusions() {
        let prober = PortProber {
            down: vec![],
            seen: Mutex::new(Vec::new()),
        };
        let report = sweep(&resolver(), &prober, &request(Role::IndexLayer, "elastic"))
            .await
            .unwrap();

        assert!(report.is_clean());
        assert_eq!(report.passed["es-vm"], vec![9200]);
        assert_eq!(report.passed["es-bm"], vec![9201, 9202]);
        assert_eq!(prober.seen.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn failed_ports_grouped_by_host() {
        let prober = PortProber {
            down: vec![8444],
            seen: Mutex::new(Vec::new()),
        };
        let report = sweep(&resolver(), &prober, &request(Role::MiddleTierAndUi, "index"))
            .await
            .unwrap();

        assert_eq!(report.failed["api1"], vec![8444]);
        assert_eq!(report.passed["api1"], vec![8443]);
        assert!(!report.is_clean());
    }

    #[tokio::test]
    async fn unknown_service_type_errors() {
        let prober = PortProber {
            down: vec![],
            seen: Mutex::new(Vec::new()),
        };
        let err = sweep(&resolver(), &prober, &request(Role::IndexLayer, "kibana"))
            .await
            .unwrap_err();
        assert!(matches!(err, TopologyError::UnknownServiceType { .. }));
    }
}
