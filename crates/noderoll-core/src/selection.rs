//! Selection builder: job parameters → per-host node lists.
//!
//! The CI job exposes one multi-select parameter per known node
//! (`node1`, `node2`, ...). Each holds a comma-separated list of hosts on
//! which that node should be acted on. This module flips that into
//! `host → [units]`, keeping the order hosts first appear in.

use serde::Serialize;

use crate::types::NodeUnit;

/// The nodes selected on a single host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostSelection {
    pub host: String,
    pub nodes: Vec<NodeUnit>,
}

/// The full work list for a run. Each (host, node) pair appears once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Selection {
    hosts: Vec<HostSelection>,
}

impl Selection {
    /// Build from `(instance, hosts)` pairs, e.g. `("node1", Some("a,b"))`.
    ///
    /// Empty or missing host lists are skipped; whitespace around host
    /// names is ignored.
    pub fn from_params<'a, I>(params: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, Option<&'a str>)>,
    {
        let mut selection = Selection::default();
        for (instance, hosts) in params {
            let Some(hosts) = hosts else { continue };
            let unit = NodeUnit::from_instance(instance);
            for host in hosts.split(',').map(str::trim).filter(|h| !h.is_empty()) {
                selection.add(host, unit.clone());
            }
        }
        selection
    }

    /// Add a pair; duplicates are dropped.
    pub fn add(&mut self, host: &str, unit: NodeUnit) {
        match self.hosts.iter_mut().find(|h| h.host == host) {
            Some(entry) => {
                if !entry.nodes.contains(&unit) {
                    entry.nodes.push(unit);
                }
            }
            None => self.hosts.push(HostSelection {
                host: host.to_string(),
                nodes: vec![unit],
            }),
        }
    }

    pub fn hosts(&self) -> &[HostSelection] {
        &self.hosts
    }

    /// Number of (host, node) pairs.
    pub fn len(&self) -> usize {
        self.hosts.iter().map(|h| h.nodes.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

impl IntoIterator for Selection {
    type Item = HostSelection;
    type IntoIter = std::vec::IntoIter<HostSelection>;

    fn into_iter(self) -> Self::IntoIter {
        self.hosts.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_nodes_by_host_in_parameter_order() {
        let sel = Selection::from_params([
            ("node1", Some("a.gov,b.gov")),
            ("node2", None),
            ("node3", Some("b.gov")),
            ("node10", Some("c.gov, a.gov")),
        ]);

        let hosts: Vec<&str> = sel.hosts().iter().map(|h| h.host.as_str()).collect();
        assert_eq!(hosts, ["a.gov", "b.gov", "c.gov"]);

        let a: Vec<&str> = sel.hosts()[0].nodes.iter().map(|n| n.qualified()).collect();
        assert_eq!(a, ["tomcat@node1.service", "tomcat@node10.service"]);

        let b: Vec<&str> = sel.hosts()[1].nodes.iter().map(|n| n.qualified()).collect();
        assert_eq!(b, ["tomcat@node1.service", "tomcat@node3.service"]);
        assert_eq!(sel.len(), 5);
    }

    #[test]
    fn empty_parameters_yield_empty_selection() {
        let sel = Selection::from_params([("node1", Some("")), ("node2", Some(" , ")), ("node3", None)]);
        assert!(sel.is_empty());
        assert_eq!(sel.len(), 0);
    }

    #[test]
    fn duplicate_pairs_are_dropped() {
        let sel = Selection::from_params([("node4", Some("a.gov,a.gov"))]);
        assert_eq!(sel.len(), 1);
    }
}
