//! Load-balancer pool membership through monitor records.
//!
//! The F5 health monitor fetches a small JSON file from each node
//! (`{"active": true}`). Flipping its `active` key takes the node out of,
//! or puts it back into, the pool on the next monitor cycle. Every flip is
//! read back before it counts as done.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::{debug, info, warn};

use noderoll_core::config::MonitorConfig;
use noderoll_core::{BoxFuture, HostProfile, NodeUnit, Role};

use crate::error::PoolError;
use crate::transport::{RemoteTransport, shell_quote};

static BOOLEAN_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(true|false)\b").expect("valid regex"));

/// Reads and flips pool membership. Implemented over ssh by [`PoolController`].
pub trait PoolMembership: Send + Sync {
    /// `Ok(false)` means the record says inactive; `Err` means we could not tell.
    fn is_active<'a>(
        &'a self,
        host: &'a HostProfile,
        unit: &'a NodeUnit,
    ) -> BoxFuture<'a, Result<bool, PoolError>>;

    /// Flip the record to `desired`. A record already at `desired` is left as is.
    fn set_active<'a>(
        &'a self,
        host: &'a HostProfile,
        unit: &'a NodeUnit,
        desired: bool,
    ) -> BoxFuture<'a, Result<(), PoolError>>;
}

pub struct PoolController {
    transport: Arc<dyn RemoteTransport>,
    monitor: MonitorConfig,
}

impl PoolController {
    pub fn new(transport: Arc<dyn RemoteTransport>, monitor: MonitorConfig) -> Self {
        Self { transport, monitor }
    }

    /// `<root>/<instance>/webapps/ROOT/<monitor_file>`; the root depends on the host role.
    pub fn monitor_path(&self, host: &HostProfile, unit: &NodeUnit) -> Result<String, PoolError> {
        let root = match host.pool_role() {
            Some(Role::DataAccessLayer) => &self.monitor.data_access_root,
            Some(Role::MiddleTierAndUi) => &self.monitor.middle_tier_root,
            _ => {
                return Err(PoolError::NoMonitorPath {
                    host: host.host.clone(),
                });
            }
        };
        Ok(format!(
            "{}/{}/webapps/ROOT/{}",
            root.trim_end_matches('/'),
            unit.instance(),
            host.monitor_file
        ))
    }

    async fn read(&self, host: &HostProfile, unit: &NodeUnit) -> Result<bool, PoolError> {
        let path = self.monitor_path(host, unit)?;
        let command = format!("cat {}", shell_quote(&path));

        let out = self
            .transport
            .run(&host.host, &command)
            .await
            .map_err(|e| PoolError::Unreachable {
                host: host.host.clone(),
                path: path.clone(),
                detail: e.to_string(),
            })?;

        if !out.success() {
            return Err(PoolError::Unreachable {
                host: host.host.clone(),
                path,
                detail: out.describe(),
            });
        }

        let active = parse_monitor_record(&out.stdout).ok_or_else(|| PoolError::Unparseable {
            host: host.host.clone(),
            path: path.clone(),
        })?;
        debug!(host = %host.host, node = %unit, %path, active, "read monitor record");
        Ok(active)
    }

    async fn write(&self, host: &HostProfile, unit: &NodeUnit, desired: bool) -> Result<(), PoolError> {
        let path = self.monitor_path(host, unit)?;
        let command = toggle_command(&shell_quote(&path), desired);

        let toggle_failed = |detail: String| PoolError::ToggleFailed {
            host: host.host.clone(),
            path: path.clone(),
            desired,
            detail,
        };

        match self.transport.run(&host.host, &command).await {
            Ok(out) if out.success() => {}
            Ok(out) => {
                warn!(host = %host.host, node = %unit, result = %out.describe(), "monitor record update failed");
                return Err(toggle_failed(out.describe()));
            }
            Err(e) => {
                warn!(host = %host.host, node = %unit, error = %e, "monitor record update could not run");
                return Err(toggle_failed(e.to_string()));
            }
        }

        match self.read(host, unit).await {
            Ok(active) if active == desired => {
                info!(host = %host.host, node = %unit, active = desired, "monitor record updated");
                Ok(())
            }
            Ok(active) => {
                warn!(host = %host.host, node = %unit, active, desired, "monitor record did not take the update");
                Err(toggle_failed(format!("record still reads active={active} after the update")))
            }
            Err(e) => {
                warn!(host = %host.host, node = %unit, error = %e, "monitor record could not be read back");
                Err(toggle_failed(format!("record could not be read back: {e}")))
            }
        }
    }
}

/// Shell command flipping the record at `quoted_path` to `desired`.
///
/// JSON records only have their `active` value rewritten, keeping the
/// original spacing. Records without an `active` key get their first
/// boolean token flipped, matching [`parse_monitor_record`].
fn toggle_command(quoted_path: &str, desired: bool) -> String {
    let from = !desired;
    format!(
        r#"if grep -q '"active"' {quoted_path}; then sed -i -E '0,/("active"[[:space:]]*:[[:space:]]*){from}\b/s//\1{desired}/' {quoted_path}; else sed -i -E '0,/\b{from}\b/s//{desired}/' {quoted_path}; fi"#
    )
}

impl PoolMembership for PoolController {
    fn is_active<'a>(
        &'a self,
        host: &'a HostProfile,
        unit: &'a NodeUnit,
    ) -> BoxFuture<'a, Result<bool, PoolError>> {
        Box::pin(self.read(host, unit))
    }

    fn set_active<'a>(
        &'a self,
        host: &'a HostProfile,
        unit: &'a NodeUnit,
        desired: bool,
    ) -> BoxFuture<'a, Result<(), PoolError>> {
        Box::pin(self.write(host, unit, desired))
    }
}

/// The record's active flag: the `active` key when the record is JSON,
/// otherwise the first boolean token in the text.
pub fn parse_monitor_record(content: &str) -> Option<bool> {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(content)
        && let Some(active) = value.get("active").and_then(serde_json::Value::as_bool)
    {
        return Some(active);
    }
    BOOLEAN_TOKEN
        .captures(content)
        .map(|caps| &caps[1] == "true")
}
