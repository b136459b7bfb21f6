//! Domain types shared by every noderoll crate.
//!
//! A host runs several tomcat nodes (`tomcat@node1.service` ..
//! `tomcat@node10.service`). Each host carries one or more roles from a
//! closed set, resolved once from the inventory and carried around in a
//! [`HostProfile`].

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseActionError;

/// Node instances the restart job exposes, in job-parameter order.
pub const KNOWN_NODES: [&str; 6] = ["node1", "node2", "node3", "node4", "node7", "node10"];

/// Template service name the node instances run under.
pub const SERVICE_TEMPLATE: &str = "tomcat";

const UNIT_SUFFIX: &str = ".service";

// ── Action ────────────────────────────────────────────────────────

/// What to do to a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Start,
    Stop,
    Restart,
    Status,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Start => "start",
            Action::Stop => "stop",
            Action::Restart => "restart",
            Action::Status => "status",
        }
    }

    /// Start, stop and restart take the node out of service; status is a read.
    pub fn is_disruptive(&self) -> bool {
        !matches!(self, Action::Status)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = ParseActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "start" => Ok(Action::Start),
            "stop" => Ok(Action::Stop),
            "restart" => Ok(Action::Restart),
            "status" => Ok(Action::Status),
            _ => Err(ParseActionError(s.to_string())),
        }
    }
}

// ── Role ──────────────────────────────────────────────────────────

/// Function a host serves, as listed under `functions` in the inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Elasticsearch index hosts.
    IndexLayer,
    /// Data API tomcat hosts.
    DataAccessLayer,
    /// Index API / UI tomcat hosts.
    MiddleTierAndUi,
    /// Search hosts.
    SearchLayer,
}

impl Role {
    pub const ALL: [Role; 4] = [
        Role::IndexLayer,
        Role::DataAccessLayer,
        Role::MiddleTierAndUi,
        Role::SearchLayer,
    ];

    /// Name of the role's group in the inventory `functions` map.
    pub fn function_name(&self) -> &'static str {
        match self {
            Role::IndexLayer => "elastic_index_layer",
            Role::DataAccessLayer => "data_access_layer",
            Role::MiddleTierAndUi => "middle_tier_and_ui",
            Role::SearchLayer => "search_layer",
        }
    }

    pub fn from_function_name(name: &str) -> Option<Role> {
        Role::ALL.into_iter().find(|r| r.function_name() == name)
    }

    /// Roles whose nodes sit behind the load balancer and own a monitor record.
    pub fn is_pool_fronted(&self) -> bool {
        matches!(self, Role::DataAccessLayer | Role::MiddleTierAndUi)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.function_name())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::from_function_name(s.trim()).ok_or_else(|| format!("unknown role '{s}'"))
    }
}

/// Hardware class from the inventory `server_type` groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MachineKind {
    Virtual,
    BareMetal,
}

// ── NodeUnit ──────────────────────────────────────────────────────

/// A node's systemd unit, stored in its fully qualified form.
///
/// Older deployments registered the unit without the `.service` suffix,
/// so callers that talk to systemd try [`NodeUnit::qualified`] first and
/// fall back to [`NodeUnit::short`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeUnit(String);

impl NodeUnit {
    /// Unit for an instance name: `node1` → `tomcat@node1.service`.
    pub fn from_instance(instance: &str) -> Self {
        Self(format!("{SERVICE_TEMPLATE}@{}{UNIT_SUFFIX}", instance.trim()))
    }

    /// `tomcat@node1.service`
    pub fn qualified(&self) -> &str {
        &self.0
    }

    /// `tomcat@node1`
    pub fn short(&self) -> &str {
        self.0.strip_suffix(UNIT_SUFFIX).unwrap_or(&self.0)
    }

    /// `node1`, the directory name used in monitor-record paths.
    pub fn instance(&self) -> &str {
        let short = self.short();
        match short.split_once('@') {
            Some((_, instance)) => instance,
            None => short,
        }
    }
}

impl fmt::Display for NodeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── HostProfile ───────────────────────────────────────────────────

/// Everything the orchestrator needs to know about a host, resolved once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostProfile {
    pub host: String,
    pub environment: String,
    /// Traffic is split across several load-balanced instances per host.
    pub split: bool,
    /// File name of the per-node monitor record.
    pub monitor_file: String,
    pub roles: BTreeSet<Role>,
    pub machine: Option<MachineKind>,
}

impl HostProfile {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// The role that decides the monitor-record layout.
    ///
    /// Data access is checked before middle tier; a host carrying both
    /// uses the data-access layout.
    pub fn pool_role(&self) -> Option<Role> {
        [Role::DataAccessLayer, Role::MiddleTierAndUi]
            .into_iter()
            .find(|r| self.has_role(*r))
    }

    /// Whether `action` must pull the node out of the load-balancer pool first.
    pub fn requires_pool_removal(&self, action: Action) -> bool {
        self.split && action.is_disruptive() && self.pool_role().is_some()
    }
}

/// Result of a systemd status query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceStatus {
    Active,
    Inactive,
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceStatus::Active => f.write_str("Active"),
            ServiceStatus::Inactive => f.write_str("Inactive"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(split: bool, roles: &[Role]) -> HostProfile {
        HostProfile {
            host: "h1".to_string(),
            environment: "prod_a".to_string(),
            split,
            monitor_file: "monitor.json".to_string(),
            roles: roles.iter().copied().collect(),
            machine: None,
        }
    }

    #[test]
    fn unit_forms() {
        let unit = NodeUnit::from_instance("node1");
        assert_eq!(unit.qualified(), "tomcat@node1.service");
        assert_eq!(unit.short(), "tomcat@node1");
        assert_eq!(unit.instance(), "node1");
    }

    #[test]
    fn action_parse_is_case_insensitive() {
        assert_eq!("Restart".parse::<Action>(), Ok(Action::Restart));
        assert_eq!(" status ".parse::<Action>(), Ok(Action::Status));
        assert!("reload".parse::<Action>().is_err());
    }

    #[test]
    fn status_is_not_disruptive() {
        assert!(!Action::Status.is_disruptive());
        assert!(Action::Start.is_disruptive());
        assert!(Action::Stop.is_disruptive());
        assert!(Action::Restart.is_disruptive());
    }

    #[test]
    fn role_names_roundtrip() {
        for role in Role::ALL {
            assert_eq!(Role::from_function_name(role.function_name()), Some(role));
        }
        assert_eq!(Role::from_function_name("bastion"), None);
    }

    #[test]
    fn pool_role_prefers_data_access() {
        let p = profile(true, &[Role::MiddleTierAndUi, Role::DataAccessLayer]);
        assert_eq!(p.pool_role(), Some(Role::DataAccessLayer));

        let p = profile(true, &[Role::IndexLayer]);
        assert_eq!(p.pool_role(), None);
    }

    #[test]
    fn pool_removal_needs_split_disruptive_and_pool_role() {
        let split = profile(true, &[Role::MiddleTierAndUi]);
        assert!(split.requires_pool_removal(Action::Restart));
        assert!(!split.requires_pool_removal(Action::Status));

        let unsplit = profile(false, &[Role::MiddleTierAndUi]);
        assert!(!unsplit.requires_pool_removal(Action::Restart));

        let index = profile(true, &[Role::IndexLayer]);
        assert!(!index.requires_pool_removal(Action::Restart));
    }
}
