//! noderoll-remote — everything that touches a tomcat host over ssh.
//!
//! # Components
//!
//! - **`transport`** — [`RemoteTransport`] trait and the ssh implementation
//! - **`executor`** — systemd start/stop/restart/status with unit-name fallback
//! - **`pool`** — monitor-record reads and flips that drive load-balancer pool membership
//!
//! The executor and pool controller are exposed through the
//! [`ServiceControl`] and [`PoolMembership`] traits so the orchestrator can
//! be driven by recording mocks in tests.

pub mod error;
pub mod executor;
pub mod pool;
pub mod transport;

pub use error::{PoolError, RemoteError, TransportError};
pub use executor::{ActionOutcome, RemoteExecutor, ServiceControl};
pub use pool::{PoolController, PoolMembership, parse_monitor_record};
pub use transport::{CommandOutput, RemoteTransport, SshTransport};
