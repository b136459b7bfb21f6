//! Single HTTPS probe against a node endpoint.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use hyper_util::rt::TokioIo;
use rustls::pki_types::ServerName;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::debug;

use noderoll_core::BoxFuture;

use crate::error::ProbeError;

/// Status recorded when no HTTP response came back at all.
pub const UNREACHABLE_STATUS: u16 = 0;

/// `https://<host>:<port><path>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    /// Path and query, starting with `/`.
    pub path: String,
}

impl Endpoint {
    pub fn new(host: &str, port: u16, path: &str) -> Self {
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };
        Self {
            host: host.to_string(),
            port,
            path,
        }
    }

    /// `<host>:<port>`, used both to connect and as the `Host` header.
    pub(crate) fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "https://{}:{}{}", self.host, self.port, self.path)
    }
}

/// What one probe saw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResponse {
    /// HTTP status, or [`UNREACHABLE_STATUS`].
    pub status: u16,
    pub body: String,
    pub elapsed: Duration,
    /// Set when no response was received.
    pub error: Option<String>,
}

impl ProbeResponse {
    pub fn unreachable(elapsed: Duration, error: impl Into<String>) -> Self {
        Self {
            status: UNREACHABLE_STATUS,
            body: String::new(),
            elapsed,
            error: Some(error.into()),
        }
    }
}

/// Issues one probe. Never fails: connection problems become an
/// unreachable response.
pub trait Prober: Send + Sync {
    fn probe<'a>(&'a self, endpoint: &'a Endpoint) -> BoxFuture<'a, ProbeResponse>;
}

/// GET over HTTP/1.1 + TLS with a per-request timeout.
pub struct HttpsProber {
    tls: Arc<rustls::ClientConfig>,
    timeout: Duration,
}

impl HttpsProber {
    /// With `verify_tls` off, any server certificate is accepted; the
    /// tomcat nodes serve self-signed certificates on their node ports.
    pub fn new(verify_tls: bool, timeout: Duration) -> Result<Self, ProbeError> {
        let builder = rustls::ClientConfig::builder_with_provider(
            rustls::crypto::ring::default_provider().into(),
        )
        .with_safe_default_protocol_versions()
        .map_err(|e| ProbeError::TlsConfig(e.to_string()))?;

        let config = if verify_tls {
            let mut roots = rustls::RootCertStore::empty();
            roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
            builder.with_root_certificates(roots).with_no_client_auth()
        } else {
            builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(insecure::AcceptAnyCert))
                .with_no_client_auth()
        };

        Ok(Self {
            tls: Arc::new(config),
            timeout,
        })
    }

    async fn fetch(&self, endpoint: &Endpoint) -> Result<(u16, String), ProbeError> {
        let authority = endpoint.authority();
        let tcp = TcpStream::connect(&authority)
            .await
            .map_err(|e| ProbeError::Connect(e.to_string()))?;

        let server_name = ServerName::try_from(endpoint.host.clone())
            .map_err(|e| ProbeError::Handshake(e.to_string()))?;
        let stream = TlsConnector::from(Arc::clone(&self.tls))
            .connect(server_name, tcp)
            .await
            .map_err(|e| ProbeError::Handshake(e.to_string()))?;

        let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
            .await
            .map_err(|e| ProbeError::Handshake(e.to_string()))?;

        // Drive the connection in the background.
        tokio::spawn(async move {
            let _ = conn.await;
        });

        let req = http::Request::builder()
            .method("GET")
            .uri(endpoint.path.as_str())
            .header(http::header::HOST, authority.as_str())
            .header(http::header::USER_AGENT, "noderoll/0.1")
            .body(Empty::<Bytes>::new())
            .map_err(|e| ProbeError::Request(e.to_string()))?;

        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| ProbeError::Request(e.to_string()))?;
        let status = resp.status().as_u16();
        let body = resp
            .into_body()
            .collect()
            .await
            .map_err(|e| ProbeError::Request(e.to_string()))?
            .to_bytes();

        Ok((status, String::from_utf8_lossy(&body).into_owned()))
    }

    async fn probe_once(&self, endpoint: &Endpoint) -> ProbeResponse {
        let start = Instant::now();
        match tokio::time::timeout(self.timeout, self.fetch(endpoint)).await {
            Ok(Ok((status, body))) => {
                let elapsed = start.elapsed();
                debug!(%endpoint, status, ?elapsed, "probe answered");
                ProbeResponse {
                    status,
                    body,
                    elapsed,
                    error: None,
                }
            }
            Ok(Err(e)) => {
                debug!(%endpoint, error = %e, "probe failed");
                ProbeResponse::unreachable(start.elapsed(), e.to_string())
            }
            Err(_) => {
                debug!(%endpoint, timeout = ?self.timeout, "probe timed out");
                ProbeResponse::unreachable(start.elapsed(), format!("timed out after {:?}", self.timeout))
            }
        }
    }
}

impl Prober for HttpsProber {
    fn probe<'a>(&'a self, endpoint: &'a Endpoint) -> BoxFuture<'a, ProbeResponse> {
        Box::pin(self.probe_once(endpoint))
    }
}

mod insecure {
    use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
    use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
    use rustls::{DigitallySignedStruct, Error, SignatureScheme};

    #[derive(Debug)]
    pub struct AcceptAnyCert;

    impl ServerCertVerifier for AcceptAnyCert {
        fn verify_server_cert(
            &self,
            _end_entity: &CertificateDer<'_>,
            _intermediates: &[CertificateDer<'_>],
            _server_name: &ServerName<'_>,
            _ocsp_response: &[u8],
            _now: UnixTime,
        ) -> Result<ServerCertVerified, Error> {
            Ok(ServerCertVerified::assertion())
        }

        fn verify_tls12_signature(
            &self,
            _message: &[u8],
            _cert: &CertificateDer<'_>,
            _dss: &DigitallySignedStruct,
        ) -> Result<HandshakeSignatureValid, Error> {
            Ok(HandshakeSignatureValid::assertion())
        }

        fn verify_tls13_signature(
            &self,
            _message: &[u8],
            _cert: &CertificateDer<'_>,
            _dss: &DigitallySignedStruct,
        ) -> Result<HandshakeSignatureValid, Error> {
            Ok(HandshakeSignatureValid::assertion())
        }

        fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
            rustls::crypto::ring::default_provider()
                .signature_verification_algorithms
                .supported_schemes()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_display() {
        let ep = Endpoint::new("api1.example.gov", 8443, "api/search/webpages?keyWords=population");
        assert_eq!(
            ep.to_string(),
            "https://api1.example.gov:8443/api/search/webpages?keyWords=population"
        );
    }

    #[test]
    fn host_header_carries_the_node_port() {
        let ep = Endpoint::new("api1.example.gov", 8444, "/");
        assert_eq!(ep.authority(), "api1.example.gov:8444");
    }

    #[test]
    fn builds_both_tls_modes() {
        assert!(HttpsProber::new(false, Duration::from_secs(1)).is_ok());
        assert!(HttpsProber::new(true, Duration::from_secs(1)).is_ok());
    }

    #[tokio::test]
    async fn closed_port_is_unreachable() {
        let prober = HttpsProber::new(false, Duration::from_millis(500)).unwrap();
        let resp = prober.probe(&Endpoint::new("127.0.0.1", 1, "/")).await;
        assert_eq!(resp.status, UNREACHABLE_STATUS);
        assert!(resp.error.is_some());
        assert!(resp.body.is_empty());
    }

    #[tokio::test]
    async fn plain_tcp_peer_fails_handshake_without_panicking() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            if let Ok((mut sock, _)) = listener.accept().await {
                use tokio::io::AsyncWriteExt;
                let _ = sock.write_all(b"HTTP/1.1 200 OK\r\n\r\n").await;
            }
        });

        let prober = HttpsProber::new(false, Duration::from_secs(2)).unwrap();
        let resp = prober.probe(&Endpoint::new("127.0.0.1", port, "/")).await;
        assert_eq!(resp.status, UNREACHABLE_STATUS);
    }
}
