use noderoll_core::{Action, HostProfile, NoderollConfig};

use super::{OutputFormat, load_resolver};

pub fn profile(host: &str, format: OutputFormat, config: &NoderollConfig) -> anyhow::Result<bool> {
    let resolver = load_resolver(config)?;
    let profile = resolver.resolve(host)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&profile)?),
        OutputFormat::Text => println!("{}", format_profile(&profile)),
    }
    Ok(true)
}

fn format_profile(profile: &HostProfile) -> String {
    let roles: Vec<String> = profile.roles.iter().map(|r| r.to_string()).collect();
    let machine = match profile.machine {
        Some(m) => format!("{m:?}"),
        None => "unknown".to_string(),
    };

    let mut out = String::new();
    out.push_str(&format!("{}\n", profile.host));
    out.push_str(&format!("  environment:  {}\n", profile.environment));
    out.push_str(&format!("  split:        {}\n", profile.split));
    out.push_str(&format!("  roles:        {}\n", roles.join(", ")));
    out.push_str(&format!("  machine:      {machine}\n"));
    out.push_str(&format!("  monitor file: {}\n", profile.monitor_file));
    out.push_str(&format!(
        "  restarts leave the pool: {}\n",
        if profile.requires_pool_removal(Action::Restart) { "yes" } else { "no" }
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const INVENTORY: &str = r#"{
        "environments": {
            "prod_a": { "hosts": ["api2"], "split": "True", "monitor_file": "f5.json" }
        },
        "functions": { "data_access_layer": { "hosts": ["api2"] } }
    }"#;

    fn config_with_inventory() -> (tempfile::NamedTempFile, NoderollConfig) {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(INVENTORY.as_bytes()).unwrap();
        let mut config = NoderollConfig::default();
        config.inventory.path = file.path().to_path_buf();
        (file, config)
    }

    #[test]
    fn renders_resolved_profile() {
        let (_file, config) = config_with_inventory();
        let profile = load_resolver(&config).unwrap().resolve("api2").unwrap();

        let text = format_profile(&profile);
        assert!(text.contains("environment:  prod_a"));
        assert!(text.contains("monitor file: f5.json"));
        assert!(text.contains("restarts leave the pool: yes"));
    }

    #[test]
    fn unknown_host_is_an_error() {
        let (_file, config) = config_with_inventory();
        assert!(profile("ghost", OutputFormat::Text, &config).is_err());
    }

    #[test]
    fn missing_inventory_file_is_an_error() {
        let mut config = NoderollConfig::default();
        config.inventory.path = "/nonexistent/inventories.json".into();
        let err = load_resolver(&config).unwrap_err();
        assert!(format!("{err:#}").contains("loading inventory"));
    }
}
