//! Run report: per-host results and the human-readable summary.

use std::collections::BTreeMap;

use serde::Serialize;

use noderoll_core::{Action, HostProfile};

use crate::lifecycle::NodeOutcome;

/// What happened on one host.
#[derive(Debug, Clone, Serialize)]
pub struct HostReport {
    pub host: String,
    /// `None` when the host could not be resolved.
    pub profile: Option<HostProfile>,
    /// Why the host was skipped; its nodes were never touched.
    pub skipped: Option<String>,
    pub nodes: Vec<NodeOutcome>,
}

impl HostReport {
    pub fn skipped(host: &str, reason: impl Into<String>) -> Self {
        Self {
            host: host.to_string(),
            profile: None,
            skipped: Some(reason.into()),
            nodes: Vec::new(),
        }
    }

    pub fn is_skipped(&self) -> bool {
        self.skipped.is_some()
    }
}

/// Results of a whole run, keyed by host.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub action: Action,
    pub environment: Option<String>,
    pub hosts: BTreeMap<String, HostReport>,
}

impl RunReport {
    pub fn new(action: Action, environment: Option<String>) -> Self {
        Self {
            action,
            environment,
            hosts: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, report: HostReport) {
        self.hosts.insert(report.host.clone(), report);
    }

    pub fn outcomes(&self) -> impl Iterator<Item = &NodeOutcome> {
        self.hosts.values().flat_map(|h| h.nodes.iter())
    }

    /// Nodes left out of the load-balancer pool.
    pub fn stranded(&self) -> Vec<&NodeOutcome> {
        self.outcomes().filter(|o| o.is_stranded()).collect()
    }

    pub fn failed(&self) -> Vec<&NodeOutcome> {
        self.outcomes().filter(|o| !o.succeeded()).collect()
    }

    pub fn skipped_hosts(&self) -> Vec<&HostReport> {
        self.hosts.values().filter(|h| h.is_skipped()).collect()
    }

    /// Any failed node or skipped host.
    pub fn has_failures(&self) -> bool {
        self.hosts.values().any(|h| h.is_skipped() || h.nodes.iter().any(|o| !o.succeeded()))
    }
}

pub fn format_report(report: &RunReport) -> String {
    let mut out = String::new();
    let environment = report.environment.as_deref().unwrap_or("-");

    out.push_str("\n╔══════════════════════════════════════════╗\n");
    out.push_str("║  noderoll run                            ║\n");
    out.push_str("╠══════════════════════════════════════════╣\n");
    out.push_str(&format!("║  Action:      {:<27}║\n", report.action.as_str()));
    out.push_str(&format!("║  Environment: {:<27}║\n", environment));
    out.push_str("╚══════════════════════════════════════════╝\n\n");

    let total = report.outcomes().count();
    let failed = report.failed().len();
    let skipped = report.skipped_hosts().len();
    out.push_str(&format!("Nodes ({total} total):\n"));
    out.push_str(&format!("  ✅ {} done\n", total - failed));
    out.push_str(&format!("  ❌ {failed} failed\n"));
    if skipped > 0 {
        out.push_str(&format!("  ⚠️  {skipped} host(s) skipped\n"));
    }
    out.push('\n');

    let stranded = report.stranded();
    if !stranded.is_empty() {
        out.push_str("❗ NODES LEFT OUT OF THE LOAD-BALANCER POOL:\n\n");
        for o in stranded {
            out.push_str(&format!("  • {} {}\n", o.host, o.node));
        }
        out.push_str("\n  Set their monitor files back to true by hand.\n\n");
    }

    for host in report.hosts.values() {
        if let Some(reason) = &host.skipped {
            out.push_str(&format!("⚠️  {} skipped: {reason}\n\n", host.host));
            continue;
        }
        out.push_str(&format!("{}:\n", host.host));
        for o in &host.nodes {
            match o.reason {
                None => {
                    let detail = o
                        .status
                        .map(|s| format!(" ({s})"))
                        .unwrap_or_default();
                    out.push_str(&format!("  ✅ {}{detail}\n", o.node));
                }
                Some(reason) => {
                    out.push_str(&format!("  ❌ {} {}\n", o.node, reason.as_str()));
                    out.push_str(&format!("     {}\n", reason.guidance()));
                    for e in &o.errors {
                        out.push_str(&format!("     - {e}\n"));
                    }
                    if let Some(health) = &o.health {
                        for line in &health.reasons {
                            out.push_str(&format!("       {line}\n"));
                        }
                    }
                }
            }
        }
        out.push('\n');
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::{FailureReason, LifecycleState};
    use noderoll_core::{NodeUnit, ServiceStatus};

    fn outcome(host: &str, node: &str, reason: Option<FailureReason>) -> NodeOutcome {
        NodeOutcome {
            host: host.to_string(),
            node: NodeUnit::from_instance(node),
            action: Action::Restart,
            state: if reason.is_some() { LifecycleState::Failed } else { LifecycleState::Done },
            reason,
            errors: reason.map(|r| vec![format!("{} happened", r.as_str())]).unwrap_or_default(),
            pool_removed: true,
            pool_reinserted: reason != Some(FailureReason::PoolReinsertionFailed),
            status: None,
            health: None,
            transitions: Vec::new(),
        }
    }

    fn report() -> RunReport {
        let mut report = RunReport::new(Action::Restart, Some("prod_a".into()));
        report.insert(HostReport {
            host: "api1".into(),
            profile: None,
            skipped: None,
            nodes: vec![
                outcome("api1", "node1", None),
                outcome("api1", "node2", Some(FailureReason::PoolReinsertionFailed)),
            ],
        });
        report.insert(HostReport::skipped("ghost", "host not found in inventory: ghost"));
        report
    }

    #[test]
    fn counts_and_flags() {
        let report = report();
        assert!(report.has_failures());
        assert_eq!(report.outcomes().count(), 2);
        assert_eq!(report.failed().len(), 1);
        assert_eq!(report.stranded().len(), 1);
        assert_eq!(report.skipped_hosts().len(), 1);
    }

    #[test]
    fn stranded_nodes_listed_before_hosts() {
        let text = format_report(&report());
        let stranded = text.find("NODES LEFT OUT").unwrap();
        let host = text.find("api1:").unwrap();
        assert!(stranded < host);
        assert!(text.contains("api1 tomcat@node2.service"));
        assert!(text.contains("pool-reinsertion-failed"));
        assert!(text.contains("ghost skipped"));
    }

    #[test]
    fn clean_run() {
        let mut report = RunReport::new(Action::Status, None);
        let mut ok = outcome("at1", "node1", None);
        ok.status = Some(ServiceStatus::Active);
        report.insert(HostReport {
            host: "at1".into(),
            profile: None,
            skipped: None,
            nodes: vec![ok],
        });
        assert!(!report.has_failures());
        let text = format_report(&report);
        assert!(text.contains("tomcat@node1.service (Active)"));
        assert!(!text.contains("NODES LEFT OUT"));
    }

    #[test]
    fn serializes_reason_in_kebab_case() {
        let json = serde_json::to_value(report()).unwrap();
        assert_eq!(
            json["hosts"]["api1"]["nodes"][1]["reason"],
            serde_json::json!("pool-reinsertion-failed")
        );
    }
}
