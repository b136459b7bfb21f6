//! noderoll.toml configuration parser.
//!
//! Every section has defaults matching the production job, so the file is
//! optional. Durations are written as `"15s"`, `"500ms"` or `"2m"`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoderollConfig {
    pub inventory: InventoryConfig,
    pub remote: RemoteConfig,
    pub monitor: MonitorConfig,
    pub probe: ProbeConfig,
    pub run: RunConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryConfig {
    pub path: PathBuf,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("Scripts/inventory/inventories.json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Program used to reach a host.
    pub program: String,
    /// Arguments placed before the hostname.
    pub options: Vec<String>,
    /// Upper bound for one remote command.
    pub command_timeout: String,
    /// Prefix for start/stop/restart, followed by `<action> <unit>`.
    pub service_manager: String,
    /// Prefix for status queries, followed by `<unit>`.
    pub status_command: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            program: "ssh".to_string(),
            options: vec![
                "-q".to_string(),
                "-o".to_string(),
                "BatchMode=yes".to_string(),
            ],
            command_timeout: "120s".to_string(),
            service_manager: "sudo systemctl".to_string(),
            status_command: "systemctl is-active".to_string(),
        }
    }
}

impl RemoteConfig {
    pub fn command_timeout(&self) -> Result<Duration, ConfigError> {
        duration_field("remote.command_timeout", &self.command_timeout)
    }
}

/// Where monitor records live on the tomcat hosts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub data_access_root: String,
    pub middle_tier_root: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            data_access_root: "/data/tomcat/base.d".to_string(),
            middle_tier_root: "/data/tomcat/base".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Inventory service type holding the node ports.
    pub service_type: String,
    pub uri: String,
    pub expected_status: u16,
    pub expected_body: String,
    /// Responses slower than this do not count as healthy.
    pub max_latency: String,
    pub max_attempts: u32,
    pub interval: String,
    /// Wait before the first probe, for the JVM to come up.
    pub warmup: String,
    pub request_timeout: String,
    pub verify_tls: bool,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            service_type: "index".to_string(),
            uri: "/api/search/webpages?keyWords=population".to_string(),
            expected_status: 200,
            expected_body: "true".to_string(),
            max_latency: "60s".to_string(),
            max_attempts: 35,
            interval: "10s".to_string(),
            warmup: "15s".to_string(),
            request_timeout: "60s".to_string(),
            verify_tls: false,
        }
    }
}

impl ProbeConfig {
    pub fn max_latency(&self) -> Result<Duration, ConfigError> {
        duration_field("probe.max_latency", &self.max_latency)
    }

    pub fn interval(&self) -> Result<Duration, ConfigError> {
        duration_field("probe.interval", &self.interval)
    }

    pub fn warmup(&self) -> Result<Duration, ConfigError> {
        duration_field("probe.warmup", &self.warmup)
    }

    pub fn request_timeout(&self) -> Result<Duration, ConfigError> {
        duration_field("probe.request_timeout", &self.request_timeout)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Hosts processed at once. Nodes on one host are always sequential.
    pub max_parallel_hosts: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self { max_parallel_hosts: 1 }
    }
}

impl NoderollConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: NoderollConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` when given, otherwise the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::from_file(p),
            None => Ok(Self::default()),
        }
    }

    /// Check every duration parses and the counters are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.remote.command_timeout()?;
        self.probe.max_latency()?;
        self.probe.interval()?;
        self.probe.warmup()?;
        self.probe.request_timeout()?;

        if self.probe.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "probe.max_attempts",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.run.max_parallel_hosts == 0 {
            return Err(ConfigError::Invalid {
                field: "run.max_parallel_hosts",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.remote.program.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "remote.program",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

fn duration_field(field: &'static str, value: &str) -> Result<Duration, ConfigError> {
    parse_duration(value).ok_or_else(|| ConfigError::InvalidDuration {
        field,
        value: value.to_string(),
    })
}

/// Parse a duration string like "5s", "500ms", "1m".
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        ms.parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>().ok()?.checked_mul(60).map(Duration::from_secs)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}
