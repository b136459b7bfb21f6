//! Error types for inventory lookups and configuration loading.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading the inventory or resolving a host against it.
#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("failed to read inventory {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse inventory: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("host {0} was not found in any environment")]
    HostNotFound(String),

    #[error("no known role lists host {0}")]
    RoleNotFound(String),

    #[error("unknown environment: {0}")]
    UnknownEnvironment(String),

    #[error("environment {environment} has no '{service_type}' services")]
    UnknownServiceType {
        environment: String,
        service_type: String,
    },
}

/// Errors raised while loading `noderoll.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid duration for {field}: '{value}'")]
    InvalidDuration { field: &'static str, value: String },

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Returned when a job parameter names an action this tool does not know.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown action '{0}' (expected start, stop, restart or status)")]
pub struct ParseActionError(pub String);
