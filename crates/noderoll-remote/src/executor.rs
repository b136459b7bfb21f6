//! Service actions on a remote node.
//!
//! Units are addressed twice in one invocation: fully qualified first,
//! then the short form (`tomcat@node1`) if that failed. Hosts built by
//! older provisioning only know the short name.

use std::sync::Arc;

use tracing::{debug, info, warn};

use noderoll_core::config::RemoteConfig;
use noderoll_core::{Action, BoxFuture, NodeUnit, ServiceStatus};

use crate::error::RemoteError;
use crate::transport::RemoteTransport;

/// Outcome of a start/stop/restart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutcome {
    pub succeeded: bool,
    pub error: Option<String>,
}

impl ActionOutcome {
    pub fn ok() -> Self {
        Self {
            succeeded: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            error: Some(error.into()),
        }
    }
}

/// Drives node services. Implemented over ssh by [`RemoteExecutor`].
pub trait ServiceControl: Send + Sync {
    /// Run a disruptive action; transport failures come back as a failed outcome.
    fn execute<'a>(
        &'a self,
        host: &'a str,
        unit: &'a NodeUnit,
        action: Action,
    ) -> BoxFuture<'a, ActionOutcome>;

    fn query_status<'a>(
        &'a self,
        host: &'a str,
        unit: &'a NodeUnit,
    ) -> BoxFuture<'a, Result<ServiceStatus, RemoteError>>;
}

pub struct RemoteExecutor {
    transport: Arc<dyn RemoteTransport>,
    service_manager: String,
    status_command: String,
}

impl RemoteExecutor {
    pub fn new(transport: Arc<dyn RemoteTransport>, config: &RemoteConfig) -> Self {
        Self {
            transport,
            service_manager: config.service_manager.clone(),
            status_command: config.status_command.clone(),
        }
    }

    /// `sudo systemctl restart tomcat@node1.service || sudo systemctl restart tomcat@node1`
    pub fn action_command(&self, unit: &NodeUnit, action: Action) -> String {
        let manager = &self.service_manager;
        format!(
            "{manager} {action} {} || {manager} {action} {}",
            unit.qualified(),
            unit.short()
        )
    }

    pub fn status_command(&self, unit: &NodeUnit) -> String {
        let status = &self.status_command;
        format!("{status} {} || {status} {}", unit.qualified(), unit.short())
    }

    async fn run_action(&self, host: &str, unit: &NodeUnit, action: Action) -> ActionOutcome {
        let command = self.action_command(unit, action);
        match self.transport.run(host, &command).await {
            Ok(out) if out.success() => {
                info!(%host, node = %unit, %action, "action succeeded");
                ActionOutcome::ok()
            }
            Ok(out) => {
                warn!(%host, node = %unit, %action, result = %out.describe(), "action failed");
                ActionOutcome::failed(format!(
                    "the {action} command failed on {host} ({}); check the node",
                    out.describe()
                ))
            }
            Err(e) => {
                warn!(%host, node = %unit, %action, error = %e, "action could not run");
                ActionOutcome::failed(format!("the {action} command could not run: {e}"))
            }
        }
    }

    async fn run_status(&self, host: &str, unit: &NodeUnit) -> Result<ServiceStatus, RemoteError> {
        let out = self.transport.run(host, &self.status_command(unit)).await?;
        let status = if out.success() {
            ServiceStatus::Active
        } else {
            ServiceStatus::Inactive
        };
        debug!(%host, node = %unit, %status, output = %out.stdout.trim(), "status queried");
        Ok(status)
    }
}

impl ServiceControl for RemoteExecutor {
    fn execute<'a>(
        &'a self,
        host: &'a str,
        unit: &'a NodeUnit,
        action: Action,
    ) -> BoxFuture<'a, ActionOutcome> {
        Box::pin(self.run_action(host, unit, action))
    }

    fn query_status<'a>(
        &'a self,
        host: &'a str,
        unit: &'a NodeUnit,
    ) -> BoxFuture<'a, Result<ServiceStatus, RemoteError>> {
        Box::pin(self.run_status(host, unit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::transport::CommandOutput;
    use crate::transport::tests::local_shell;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records commands and replies with a fixed exit code.
    struct ScriptedTransport {
        exit_code: Option<i32>,
        unreachable: bool,
        commands: Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        fn exiting(code: i32) -> Self {
            Self {
                exit_code: Some(code),
                unreachable: false,
                commands: Mutex::new(Vec::new()),
            }
        }

        fn unreachable() -> Self {
            Self {
                exit_code: None,
                unreachable: true,
                commands: Mutex::new(Vec::new()),
            }
        }
    }

    impl RemoteTransport for ScriptedTransport {
        fn run<'a>(
            &'a self,
            host: &'a str,
            command: &'a str,
        ) -> BoxFuture<'a, Result<CommandOutput, TransportError>> {
            self.commands.lock().unwrap().push(command.to_string());
            let result = if self.unreachable {
                Err(TransportError::Unreachable {
                    host: host.to_string(),
                    detail: "exit 255".to_string(),
                })
            } else {
                Ok(CommandOutput {
                    exit_code: self.exit_code,
                    stdout: String::new(),
                    stderr: String::new(),
                })
            };
            Box::pin(async move { result })
        }
    }

    fn executor(transport: Arc<dyn RemoteTransport>) -> RemoteExecutor {
        RemoteExecutor::new(transport, &RemoteConfig::default())
    }

    #[test]
    fn action_command_falls_back_to_short_unit() {
        let exec = executor(Arc::new(ScriptedTransport::exiting(0)));
        let unit = NodeUnit::from_instance("node1");
        assert_eq!(
            exec.action_command(&unit, Action::Restart),
            "sudo systemctl restart tomcat@node1.service || sudo systemctl restart tomcat@node1"
        );
        assert_eq!(
            exec.status_command(&unit),
            "systemctl is-active tomcat@node1.service || systemctl is-active tomcat@node1"
        );
    }

    #[tokio::test]
    async fn execute_issues_one_invocation() {
        let transport = Arc::new(ScriptedTransport::exiting(0));
        let exec = executor(transport.clone());
        let unit = NodeUnit::from_instance("node3");

        let outcome = exec.execute("h1", &unit, Action::Stop).await;
        assert_eq!(outcome, ActionOutcome::ok());

        let commands = transport.commands.lock().unwrap();
        assert_eq!(commands.len(), 1);
        assert!(commands[0].contains("stop tomcat@node3.service || "));
    }

    #[tokio::test]
    async fn non_zero_exit_fails_action() {
        let exec = executor(Arc::new(ScriptedTransport::exiting(1)));
        let outcome = exec.execute("h1", &NodeUnit::from_instance("node1"), Action::Restart).await;
        assert!(!outcome.succeeded);
        assert!(outcome.error.unwrap().contains("restart command failed"));
    }

    #[tokio::test]
    async fn unreachable_host_fails_action() {
        let exec = executor(Arc::new(ScriptedTransport::unreachable()));
        let outcome = exec.execute("h1", &NodeUnit::from_instance("node1"), Action::Start).await;
        assert!(!outcome.succeeded);
        assert!(outcome.error.unwrap().contains("could not run"));
    }

    #[tokio::test]
    async fn status_maps_exit_code() {
        let unit = NodeUnit::from_instance("node1");

        let active = executor(Arc::new(ScriptedTransport::exiting(0)));
        assert_eq!(active.query_status("h1", &unit).await.unwrap(), ServiceStatus::Active);

        let inactive = executor(Arc::new(ScriptedTransport::exiting(3)));
        assert_eq!(inactive.query_status("h1", &unit).await.unwrap(), ServiceStatus::Inactive);

        let down = executor(Arc::new(ScriptedTransport::unreachable()));
        assert!(down.query_status("h1", &unit).await.is_err());
    }

    #[tokio::test]
    async fn fallback_runs_through_a_real_shell() {
        // The qualified form fails, the short form succeeds.
        let config = RemoteConfig {
            service_manager: "sh -c 'case $2 in *.service) exit 1;; esac' unit-check".to_string(),
            ..RemoteConfig::default()
        };
        let exec = RemoteExecutor::new(Arc::new(local_shell(Duration::from_secs(5))), &config);
        let outcome = exec.execute("h1", &NodeUnit::from_instance("node2"), Action::Restart).await;
        assert!(outcome.succeeded, "{outcome:?}");
    }
}
