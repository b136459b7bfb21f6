use clap::Args;

use noderoll_core::{NoderollConfig, Role};
use noderoll_health::{HttpsProber, SweepReport, SweepRequest};

use super::{OutputFormat, load_resolver};

#[derive(Debug, Args)]
pub struct SweepArgs {
    /// Environment to sweep
    #[arg(long, env = "env")]
    pub env: String,

    /// Inventory function, e.g. elastic_index_layer
    #[arg(long)]
    pub role: Role,

    /// Service type under the environment's `services`, e.g. elastic
    #[arg(long)]
    pub service_type: String,

    /// Path appended to each https://host:port
    #[arg(long, default_value = "")]
    pub uri: String,

    #[arg(long, default_value = "200")]
    pub expected_status: u16,

    /// Output format: text or json
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

/// Returns whether every port answered as expected.
pub async fn sweep(args: SweepArgs, config: &NoderollConfig) -> anyhow::Result<bool> {
    let resolver = load_resolver(config)?;
    let prober = HttpsProber::new(config.probe.verify_tls, config.probe.request_timeout()?)?;

    let request = SweepRequest {
        environment: args.env,
        role: args.role,
        service_type: args.service_type,
        uri: args.uri,
        expected_status: args.expected_status,
    };
    let report = noderoll_health::sweep(&resolver, &prober, &request).await?;

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => println!("{}", format_sweep(&request, &report)),
    }

    Ok(report.is_clean())
}

fn format_sweep(request: &SweepRequest, report: &SweepReport) -> String {
    let mut out = String::new();
    let passed: usize = report.passed.values().map(Vec::len).sum();
    let failed: usize = report.failed.values().map(Vec::len).sum();

    out.push_str(&format!(
        "\nPort sweep of {} ({}, {}):\n",
        request.environment, request.role, request.service_type
    ));
    out.push_str(&format!("  ✅ {passed} ports passed\n"));
    out.push_str(&format!("  ❌ {failed} ports failed\n\n"));

    if !report.failed.is_empty() {
        out.push_str("❌ FAILED PORTS:\n\n");
        for (host, ports) in &report.failed {
            let ports: Vec<String> = ports.iter().map(u16::to_string).collect();
            out.push_str(&format!("  • {host}: {}\n", ports.join(", ")));
        }
        out.push('\n');
    }

    out
}
