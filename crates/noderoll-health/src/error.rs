use thiserror::Error;

/// Why a single probe produced no HTTP response.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("tls setup failed: {0}")]
    TlsConfig(String),

    #[error("connect failed: {0}")]
    Connect(String),

    #[error("tls handshake failed: {0}")]
    Handshake(String),

    #[error("request failed: {0}")]
    Request(String),
}
