//! Topology resolver: host → environment, split flag, monitor file, roles.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::TopologyError;
use crate::inventory::Inventory;
use crate::types::{HostProfile, MachineKind, NodeUnit, Role};

/// Read-only lookups against the shared inventory.
#[derive(Debug, Clone)]
pub struct TopologyResolver {
    inventory: Arc<Inventory>,
}

impl TopologyResolver {
    pub fn new(inventory: Arc<Inventory>) -> Self {
        Self { inventory }
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    /// Resolve a host to its profile.
    ///
    /// Environments are searched in name order and the first one listing
    /// the host wins.
    pub fn resolve(&self, host: &str) -> Result<HostProfile, TopologyError> {
        let mut matches = self
            .inventory
            .environments
            .iter()
            .filter(|(_, env)| env.contains(host));

        let (env_name, env) = matches
            .next()
            .ok_or_else(|| TopologyError::HostNotFound(host.to_string()))?;

        let others: Vec<&str> = matches.map(|(name, _)| name.as_str()).collect();
        if !others.is_empty() {
            warn!(%host, environment = %env_name, ?others, "host listed in several environments");
        }

        let mut roles = BTreeSet::new();
        for (function, group) in &self.inventory.functions {
            if !group.contains(host) {
                continue;
            }
            match Role::from_function_name(function) {
                Some(role) => {
                    roles.insert(role);
                }
                None => debug!(%host, %function, "ignoring unknown function"),
            }
        }
        if roles.is_empty() {
            return Err(TopologyError::RoleNotFound(host.to_string()));
        }

        let profile = HostProfile {
            host: host.to_string(),
            environment: env_name.clone(),
            split: env.split,
            monitor_file: env.monitor_file.clone(),
            roles,
            machine: self.machine_kind(host),
        };
        debug!(%host, environment = %profile.environment, split = profile.split, roles = ?profile.roles, "resolved host");
        Ok(profile)
    }

    /// `vm` / `bm` membership from the inventory `server_type` groups.
    pub fn machine_kind(&self, host: &str) -> Option<MachineKind> {
        if self.inventory.machine_group("vm").iter().any(|h| h == host) {
            Some(MachineKind::Virtual)
        } else if self.inventory.machine_group("bm").iter().any(|h| h == host) {
            Some(MachineKind::BareMetal)
        } else {
            None
        }
    }

    /// Port the node's service listens on, from `services.<service_type>`.
    pub fn service_port(&self, environment: &str, service_type: &str, unit: &NodeUnit) -> Option<u16> {
        let services = self.inventory.environments.get(environment)?.services.get(service_type)?;
        services
            .get(unit.qualified())
            .or_else(|| services.get(unit.short()))
            .copied()
    }

    /// All `unit → port` entries of a service type.
    pub fn services(
        &self,
        environment: &str,
        service_type: &str,
    ) -> Result<&BTreeMap<String, u16>, TopologyError> {
        self.inventory
            .environment(environment)?
            .services
            .get(service_type)
            .ok_or_else(|| TopologyError::UnknownServiceType {
                environment: environment.to_string(),
                service_type: service_type.to_string(),
            })
    }

    /// Hosts of `environment` that serve `role`, in inventory order.
    pub fn hosts_with_role(&self, environment: &str, role: Role) -> Result<Vec<&str>, TopologyError> {
        let env = self.inventory.environment(environment)?;
        let group = self.inventory.functions.get(role.function_name());
        Ok(env
            .hosts
            .iter()
            .filter(|h| group.is_some_and(|g| g.contains(h)))
            .map(String::as_str)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::tests::SAMPLE;

    fn resolver() -> TopologyResolver {
        TopologyResolver::new(Arc::new(Inventory::from_json_str(SAMPLE).unwrap()))
    }

    #[test]
    fn resolves_split_middle_tier_host() {
        let profile = resolver().resolve("api1.example.gov").unwrap();
        assert_eq!(profile.environment, "prod_a");
        assert!(profile.split);
        assert_eq!(profile.monitor_file, "monitor.json");
        assert!(profile.has_role(Role::MiddleTierAndUi));
        assert_eq!(profile.machine, Some(MachineKind::Virtual));
    }

    #[test]
    fn resolves_unsplit_host() {
        let profile = resolver().resolve("at1.example.gov").unwrap();
        assert_eq!(profile.environment, "at");
        assert!(!profile.split);
        assert_eq!(profile.machine, None);
    }

    #[test]
    fn missing_host() {
        let err = resolver().resolve("ghost.example.gov").unwrap_err();
        assert!(matches!(err, TopologyError::HostNotFound(h) if h == "ghost.example.gov"));
    }

    #[test]
    fn host_without_known_role() {
        let mut inv = Inventory::from_json_str(SAMPLE).unwrap();
        inv.environments
            .get_mut("prod_a")
            .unwrap()
            .hosts
            .push("jump.example.gov".to_string());
        let err = TopologyResolver::new(Arc::new(inv))
            .resolve("jump.example.gov")
            .unwrap_err();
        assert!(matches!(err, TopologyError::RoleNotFound(_)));
    }

    #[test]
    fn service_port_lookup() {
        let r = resolver();
        let unit = NodeUnit::from_instance("node2");
        assert_eq!(r.service_port("prod_a", "index", &unit), Some(8444));
        assert_eq!(r.service_port("prod_a", "index", &NodeUnit::from_instance("node7")), None);
        assert_eq!(r.service_port("prod_z", "index", &unit), None);
    }

    #[test]
    fn hosts_with_role_filters_environment() {
        let r = resolver();
        assert_eq!(
            r.hosts_with_role("prod_a", Role::IndexLayer).unwrap(),
            vec!["es1.example.gov"]
        );
        assert!(r.hosts_with_role("at", Role::DataAccessLayer).unwrap().is_empty());
    }

    #[test]
    fn unknown_service_type() {
        let err = resolver().services("at", "elastic").unwrap_err();
        assert!(matches!(err, TopologyError::UnknownServiceType { .. }));
    }
}
