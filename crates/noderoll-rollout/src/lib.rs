//! noderoll rolling restarts — pool-safe per-node lifecycles.
//!
//! Each selected (host, node) pair goes through a small state machine:
//! check whether the node is live in the load balancer, pull it out,
//! run the action, optionally wait for it to answer health probes, and put
//! it back. The one invariant that matters is that a node taken out of the
//! pool is always given a chance to go back in, whatever failed in between.
//!
//! # Components
//!
//! - **`lifecycle`** — the per-node state machine and its outcome
//! - **`verify`** — the post-action health gate
//! - **`orchestrator`** — host fan-out, per-host sequencing
//! - **`report`** — run results and the operator-facing summary

pub mod lifecycle;
pub mod orchestrator;
pub mod report;
pub mod verify;

pub use lifecycle::{Components, FailureReason, Lifecycle, LifecycleRequest, LifecycleState, NodeOutcome};
pub use orchestrator::{Orchestrator, RunRequest};
pub use report::{HostReport, RunReport, format_report};
pub use verify::{HealthVerifier, ProbeVerifier};
