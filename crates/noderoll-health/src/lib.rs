//! noderoll-health — post-restart health verification.
//!
//! A node counts as healthy when its search endpoint answers with the
//! expected status and body inside the latency ceiling. After a restart the
//! JVM takes a while to come up, so the checker waits out a warm-up period
//! and then probes repeatedly until one attempt passes or the attempt
//! budget runs out.
//!
//! # Architecture
//!
//! ```text
//! probe_until_healthy()
//!   ├── warm-up sleep
//!   ├── Prober::probe() → ProbeResponse     (HttpsProber: hyper over rustls)
//!   ├── Acceptance::accepts()
//!   └── interval sleep, retry up to max_attempts
//! ```
//!
//! Connection failures never abort the loop: they come back as a response
//! with status `0` and count as a failed attempt.

pub mod checker;
pub mod error;
pub mod probe;
pub mod sweep;

pub use checker::{Acceptance, HealthCheckOutcome, ProbePolicy, probe_until_healthy};
pub use error::ProbeError;
pub use probe::{Endpoint, HttpsProber, ProbeResponse, Prober, UNREACHABLE_STATUS};
pub use sweep::{SweepReport, SweepRequest, sweep};
