pub mod profile;
pub mod run;
pub mod sweep;

use std::sync::Arc;

use anyhow::Context;
use clap::ValueEnum;

use noderoll_core::{Inventory, NoderollConfig, TopologyResolver};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Load the inventory named by the config.
pub fn load_resolver(config: &NoderollConfig) -> anyhow::Result<TopologyResolver> {
    let path = &config.inventory.path;
    let inventory = Inventory::from_file(path)
        .with_context(|| format!("loading inventory from {}", path.display()))?;
    Ok(TopologyResolver::new(Arc::new(inventory)))
}
