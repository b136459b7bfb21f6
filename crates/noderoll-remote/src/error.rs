//! Error types for remote execution.

use std::time::Duration;

use thiserror::Error;

/// The command never produced an exit status we can trust.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to launch remote command for {host}: {source}")]
    Spawn {
        host: String,
        #[source]
        source: std::io::Error,
    },

    #[error("remote command on {host} timed out after {after:?}")]
    Timeout { host: String, after: Duration },

    #[error("{host} is unreachable: {detail}")]
    Unreachable { host: String, detail: String },
}

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Monitor-record failures.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The read itself did not run; this says nothing about the record.
    #[error("could not read monitor record {path} on {host}: {detail}")]
    Unreachable {
        host: String,
        path: String,
        detail: String,
    },

    #[error("monitor record {path} on {host} has no active flag")]
    Unparseable { host: String, path: String },

    #[error("failed to set monitor record {path} on {host} to {desired}: {detail}")]
    ToggleFailed {
        host: String,
        path: String,
        desired: bool,
        detail: String,
    },

    #[error("{host} has no load-balanced role, so no monitor record")]
    NoMonitorPath { host: String },
}
