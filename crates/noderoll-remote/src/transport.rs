//! Remote command transport.
//!
//! Runs one shell command line on a named host and hands back its exit
//! status and captured output. The ssh implementation shells out to the
//! system `ssh` so host keys, jump hosts and agent forwarding come from the
//! operator's ssh config.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

use noderoll_core::BoxFuture;
use noderoll_core::config::RemoteConfig;
use noderoll_core::ConfigError;

use crate::error::TransportError;

/// ssh exits with 255 when the connection itself failed.
const SSH_CONNECTION_FAILURE: i32 = 255;

/// Captured result of a remote command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// A one-line description for error messages.
    pub fn describe(&self) -> String {
        let code = self
            .exit_code
            .map_or_else(|| "signal".to_string(), |c| c.to_string());
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            format!("exit {code}")
        } else {
            format!("exit {code}: {stderr}")
        }
    }
}

/// Runs a command line on a remote host.
pub trait RemoteTransport: Send + Sync {
    fn run<'a>(
        &'a self,
        host: &'a str,
        command: &'a str,
    ) -> BoxFuture<'a, Result<CommandOutput, TransportError>>;
}

/// `ssh <options> <host> <command>` with a hard timeout.
#[derive(Debug, Clone)]
pub struct SshTransport {
    program: String,
    options: Vec<String>,
    timeout: Duration,
}

impl SshTransport {
    pub fn new(program: &str, options: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.to_string(),
            options,
            timeout,
        }
    }

    pub fn from_config(config: &RemoteConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(
            &config.program,
            config.options.clone(),
            config.command_timeout()?,
        ))
    }

    async fn run_command(&self, host: &str, command: &str) -> Result<CommandOutput, TransportError> {
        debug!(%host, %command, "running remote command");

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.options)
            .arg(host)
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => {
                return Err(TransportError::Spawn {
                    host: host.to_string(),
                    source,
                });
            }
            Err(_) => {
                return Err(TransportError::Timeout {
                    host: host.to_string(),
                    after: self.timeout,
                });
            }
        };

        let result = CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if result.exit_code == Some(SSH_CONNECTION_FAILURE) {
            return Err(TransportError::Unreachable {
                host: host.to_string(),
                detail: result.describe(),
            });
        }

        debug!(%host, exit_code = ?result.exit_code, "remote command finished");
        Ok(result)
    }
}

impl RemoteTransport for SshTransport {
    fn run<'a>(
        &'a self,
        host: &'a str,
        command: &'a str,
    ) -> BoxFuture<'a, Result<CommandOutput, TransportError>> {
        Box::pin(self.run_command(host, command))
    }
}

/// Wrap `s` in single quotes for a POSIX shell.
pub(crate) fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}
