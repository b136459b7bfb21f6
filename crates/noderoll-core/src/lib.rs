//! noderoll-core — shared types for the rolling restart tooling.
//!
//! Holds the read-only view of the inventory (environments, host roles,
//! service ports), the topology resolver built on top of it, the selection
//! builder that turns job parameters into a per-host work list, and the
//! `noderoll.toml` configuration.

pub mod config;
pub mod error;
pub mod inventory;
pub mod selection;
pub mod topology;
pub mod types;

pub use config::NoderollConfig;
pub use error::{ConfigError, TopologyError};
pub use inventory::Inventory;
pub use selection::{HostSelection, Selection};
pub use topology::TopologyResolver;
pub use types::*;

/// Boxed future used by the object-safe component traits.
pub type BoxFuture<'a, T> =
    std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;
