use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use tracing::{info, warn};

use noderoll_core::{Action, KNOWN_NODES, NoderollConfig, Selection};
use noderoll_health::HttpsProber;
use noderoll_remote::{PoolController, RemoteExecutor, RemoteTransport, SshTransport};
use noderoll_rollout::{Components, Orchestrator, ProbeVerifier, RunRequest, format_report};

use super::{OutputFormat, load_resolver};

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Environment the selected hosts belong to
    #[arg(long, env = "env")]
    pub env: Option<String>,

    /// start, stop, restart or status
    #[arg(long, env = "action")]
    pub action: Action,

    /// Hosts to act on for node1 (comma-separated)
    #[arg(long, env = "node1")]
    pub node1: Option<String>,
    #[arg(long, env = "node2")]
    pub node2: Option<String>,
    #[arg(long, env = "node3")]
    pub node3: Option<String>,
    #[arg(long, env = "node4")]
    pub node4: Option<String>,
    #[arg(long, env = "node7")]
    pub node7: Option<String>,
    #[arg(long, env = "node10")]
    pub node10: Option<String>,

    /// Probe each node after its action: Yes or No
    #[arg(long = "check-nodes", env = "check_nodes", default_value = "No", value_parser = parse_yes_no, action = clap::ArgAction::Set)]
    pub check_nodes: bool,

    /// Hosts processed at once, overriding [run].max_parallel_hosts
    #[arg(long)]
    pub max_parallel_hosts: Option<usize>,

    /// Output format: text or json
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

impl RunArgs {
    /// Per-node host lists, in the fixed node order.
    pub fn selection(&self) -> Selection {
        let hosts = [
            self.node1.as_deref(),
            self.node2.as_deref(),
            self.node3.as_deref(),
            self.node4.as_deref(),
            self.node7.as_deref(),
            self.node10.as_deref(),
        ];
        Selection::from_params(KNOWN_NODES.into_iter().zip(hosts))
    }
}

fn parse_yes_no(s: &str) -> Result<bool, String> {
    match s.trim().to_ascii_lowercase().as_str() {
        "yes" | "y" | "true" => Ok(true),
        "no" | "n" | "false" | "" => Ok(false),
        other => Err(format!("expected Yes or No, got '{other}'")),
    }
}

/// Returns whether every node succeeded.
pub async fn run(args: RunArgs, config: &NoderollConfig) -> anyhow::Result<bool> {
    let resolver = load_resolver(config)?;
    let selection = args.selection();
    if selection.is_empty() {
        warn!("no node was given any hosts; nothing to do");
        return Ok(true);
    }

    let transport: Arc<dyn RemoteTransport> =
        Arc::new(SshTransport::from_config(&config.remote).context("remote settings")?);
    let prober = HttpsProber::new(
        config.probe.verify_tls,
        config.probe.request_timeout().context("probe settings")?,
    )?;
    let verifier = ProbeVerifier::from_config(resolver.clone(), Arc::new(prober), &config.probe)
        .context("probe settings")?;

    let components = Components {
        pool: Arc::new(PoolController::new(Arc::clone(&transport), config.monitor.clone())),
        service: Arc::new(RemoteExecutor::new(transport, &config.remote)),
        health: Arc::new(verifier),
    };
    let parallel = args.max_parallel_hosts.unwrap_or(config.run.max_parallel_hosts);
    let orchestrator = Orchestrator::new(resolver, components, parallel);

    info!(action = %args.action, check_nodes = args.check_nodes, "performing {} on the selected nodes", args.action);
    let report = orchestrator
        .run(RunRequest {
            action: args.action,
            environment: args.env.clone(),
            verify_health: args.check_nodes,
            selection,
        })
        .await;

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => println!("{}", format_report(&report)),
    }

    Ok(!report.has_failures())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: RunArgs,
    }

    #[test]
    fn yes_no_values() {
        assert_eq!(parse_yes_no("Yes"), Ok(true));
        assert_eq!(parse_yes_no("no"), Ok(false));
        assert!(parse_yes_no("maybe").is_err());
    }

    #[test]
    fn node_flags_become_a_selection() {
        let h = Harness::try_parse_from([
            "noderoll",
            "--action",
            "Restart",
            "--node1",
            "api1, api2",
            "--node10",
            "api1",
            "--check-nodes",
            "Yes",
        ])
        .unwrap();

        assert_eq!(h.args.action, Action::Restart);
        assert!(h.args.check_nodes);
        let selection = h.args.selection();
        assert_eq!(selection.len(), 3);
        let api1 = &selection.hosts()[0];
        assert_eq!(api1.host, "api1");
        assert_eq!(
            api1.nodes.iter().map(|n| n.to_string()).collect::<Vec<_>>(),
            ["tomcat@node1.service", "tomcat@node10.service"]
        );
    }

    #[test]
    fn unknown_action_is_rejected() {
        assert!(Harness::try_parse_from(["noderoll", "--action", "reboot"]).is_err());
    }
}
