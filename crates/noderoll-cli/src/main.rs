//! noderoll — rolling restarts for tomcat nodes behind the F5 pool.
//!
//! # Usage
//!
//! ```text
//! noderoll run --env prod_a --action restart --node1 api1,api2 --check-nodes Yes
//! noderoll sweep --env prod_a --role elastic_index_layer --service-type elastic
//! noderoll profile api1.example.gov
//! ```
//!
//! Every `run` flag can also come from the CI job's environment variables
//! (`env`, `action`, `node1` … `node10`, `check_nodes`).

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

mod commands;

use commands::OutputFormat;

#[derive(Parser)]
#[command(
    name = "noderoll",
    about = "Rolling start/stop/restart of tomcat nodes behind the load balancer",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Path to noderoll.toml (defaults apply when omitted)
    #[arg(long, global = true, env = "NODEROLL_CONFIG")]
    config: Option<PathBuf>,

    /// Inventory JSON, overriding [inventory].path
    #[arg(long, global = true)]
    inventory: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an action on the selected nodes, one host's nodes at a time.
    ///
    /// Nodes on split hosts are taken out of the load-balancer pool before a
    /// start, stop or restart and put back afterwards.
    Run(commands::run::RunArgs),
    /// Probe every service port of a role in an environment once
    Sweep(commands::sweep::SweepArgs),
    /// Show how a host resolves against the inventory
    Profile {
        host: String,
        /// Output format: text or json
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

fn init_tracing(json: bool) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("info,noderoll=info"))?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.log_json)?;

    let mut config = noderoll_core::NoderollConfig::load(cli.config.as_deref())?;
    if let Some(path) = cli.inventory {
        config.inventory.path = path;
    }

    let ok = match cli.command {
        Commands::Run(args) => commands::run::run(args, &config).await?,
        Commands::Sweep(args) => commands::sweep::sweep(args, &config).await?,
        Commands::Profile { host, format } => commands::profile::profile(&host, format, &config)?,
    };

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
