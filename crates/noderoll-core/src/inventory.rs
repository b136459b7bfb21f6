//! Inventory file parser (`inventories.json`).
//!
//! The inventory is loaded once at startup and shared read-only behind an
//! `Arc`. Host groups may be written either as a list of hostnames or as an
//! ansible-style map keyed by hostname; both parse to a `Vec<String>`.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::TopologyError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Inventory {
    pub environments: BTreeMap<String, EnvironmentSpec>,
    /// Role name → hosts serving it.
    #[serde(default)]
    pub functions: BTreeMap<String, HostGroup>,
    #[serde(default)]
    pub server_type: Option<ServerTypes>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentSpec {
    #[serde(default, deserialize_with = "host_list")]
    pub hosts: Vec<String>,
    #[serde(default, deserialize_with = "split_flag")]
    pub split: bool,
    #[serde(default = "default_monitor_file")]
    pub monitor_file: String,
    /// Service type → unit name → port.
    #[serde(default)]
    pub services: BTreeMap<String, BTreeMap<String, u16>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostGroup {
    #[serde(default, deserialize_with = "host_list")]
    pub hosts: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerTypes {
    /// `vm` and `bm` groups.
    #[serde(default)]
    pub children: BTreeMap<String, HostGroup>,
}

impl Inventory {
    pub fn from_file(path: &Path) -> Result<Self, TopologyError> {
        let content = std::fs::read_to_string(path).map_err(|source| TopologyError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> Result<Self, TopologyError> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn environment(&self, name: &str) -> Result<&EnvironmentSpec, TopologyError> {
        self.environments
            .get(name)
            .ok_or_else(|| TopologyError::UnknownEnvironment(name.to_string()))
    }

    /// Hosts listed under a `server_type.children` group (`vm`, `bm`).
    pub fn machine_group(&self, group: &str) -> &[String] {
        self.server_type
            .as_ref()
            .and_then(|st| st.children.get(group))
            .map(|g| g.hosts.as_slice())
            .unwrap_or(&[])
    }
}

impl EnvironmentSpec {
    pub fn contains(&self, host: &str) -> bool {
        self.hosts.iter().any(|h| h == host)
    }
}

impl HostGroup {
    pub fn contains(&self, host: &str) -> bool {
        self.hosts.iter().any(|h| h == host)
    }
}

fn default_monitor_file() -> String {
    "monitor.json".to_string()
}

fn host_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Hosts {
        List(Vec<String>),
        Map(BTreeMap<String, serde_json::Value>),
    }

    Ok(match Option::<Hosts>::deserialize(deserializer)? {
        Some(Hosts::List(hosts)) => hosts,
        Some(Hosts::Map(hosts)) => hosts.into_keys().collect(),
        None => Vec::new(),
    })
}

/// The job inventory writes `"split": "True"`; newer files use a boolean.
fn split_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    Ok(match Option::<Flag>::deserialize(deserializer)? {
        Some(Flag::Bool(b)) => b,
        Some(Flag::Text(s)) => s.trim().eq_ignore_ascii_case("true"),
        None => false,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const SAMPLE: &str = r#"{
        "environments": {
            "prod_a": {
                "hosts": ["api1.example.gov", "api2.example.gov", "es1.example.gov"],
                "split": "True",
                "monitor_file": "monitor.json",
                "services": {
                    "index": {
                        "tomcat@node1.service": 8443,
                        "tomcat@node2.service": 8444
                    },
                    "elastic": {
                        "elasticsearch.service": 9200,
                        "elasticsearch@data1.service": 9201
                    }
                }
            },
            "at": {
                "hosts": { "at1.example.gov": null },
                "split": false,
                "services": { "index": { "tomcat@node1.service": 8443 } }
            }
        },
        "functions": {
            "middle_tier_and_ui": { "hosts": ["api1.example.gov", "at1.example.gov"] },
            "data_access_layer": { "hosts": ["api2.example.gov"] },
            "elastic_index_layer": { "hosts": ["es1.example.gov"] },
            "bastion": { "hosts": ["jump.example.gov"] }
        },
        "server_type": {
            "children": {
                "vm": { "hosts": ["api1.example.gov", "es1.example.gov"] },
                "bm": { "hosts": ["api2.example.gov"] }
            }
        }
    }"#;

    #[test]
    fn parses_sample() {
        let inv = Inventory::from_json_str(SAMPLE).unwrap();
        let prod = inv.environment("prod_a").unwrap();
        assert!(prod.split);
        assert_eq!(prod.hosts.len(), 3);
        assert_eq!(prod.services["index"]["tomcat@node2.service"], 8444);
    }

    #[test]
    fn host_map_and_bool_split() {
        let inv = Inventory::from_json_str(SAMPLE).unwrap();
        let at = inv.environment("at").unwrap();
        assert!(!at.split);
        assert!(at.contains("at1.example.gov"));
        assert_eq!(at.monitor_file, "monitor.json");
    }

    #[test]
    fn machine_groups() {
        let inv = Inventory::from_json_str(SAMPLE).unwrap();
        assert_eq!(inv.machine_group("bm"), ["api2.example.gov".to_string()]);
        assert!(inv.machine_group("container").is_empty());
    }

    #[test]
    fn unknown_environment() {
        let inv = Inventory::from_json_str(SAMPLE).unwrap();
        assert!(matches!(
            inv.environment("prod_z"),
            Err(TopologyError::UnknownEnvironment(_))
        ));
    }

    #[test]
    fn from_file_reports_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = Inventory::from_file(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, TopologyError::Read { .. }));
    }

    #[test]
    fn from_file_reads_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inventories.json");
        std::fs::write(&path, SAMPLE).unwrap();
        let inv = Inventory::from_file(&path).unwrap();
        assert_eq!(inv.environments.len(), 2);
    }
}
