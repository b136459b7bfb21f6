//! Node lifecycle: drives one (host, node) through the restart state machine.
//!
//! ```text
//! Pending ─▶ PoolCheck ─▶ Removing ─▶ Acting ─▶ HealthChecking ─▶ Reinserting ─▶ Done
//!    │           │                      ▲  │           │                │
//!    └───────────┴──────────────────────┘  └───────────┴────────────────┴──────▶ Failed
//! ```
//!
//! Pool removal only happens for disruptive actions on split hosts with a
//! load-balanced role. Once a node has been removed, every path through the
//! machine attempts to put it back, even when the action or the health
//! check failed. There are no retries at this level; only the health
//! checker retries, inside its own probe loop.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use noderoll_core::{Action, HostProfile, NodeUnit, ServiceStatus};
use noderoll_health::HealthCheckOutcome;
use noderoll_remote::{PoolMembership, ServiceControl};

use crate::verify::HealthVerifier;

/// Where a lifecycle currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Pending,
    /// Reading the monitor record.
    PoolCheck,
    /// Flipping the monitor record to inactive.
    Removing,
    /// Running the service action.
    Acting,
    HealthChecking,
    /// Flipping the monitor record back to active.
    Reinserting,
    Done,
    Failed,
}

impl LifecycleState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LifecycleState::Done | LifecycleState::Failed)
    }
}

/// Why a lifecycle ended in `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureReason {
    /// Health probes never passed. The node was put back if it had been removed.
    HealthCheckFailed,
    /// The service action reported failure. The node was put back if it had been removed.
    ActionFailed,
    /// The monitor record could not be flipped to inactive; no action was run.
    PoolRemovalFailed,
    /// The monitor record could not be read; no action was run.
    PoolStateIndeterminate,
    /// The node is out of the pool and could not be put back.
    PoolReinsertionFailed,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::HealthCheckFailed => "health-check-failed",
            FailureReason::ActionFailed => "action-failed",
            FailureReason::PoolRemovalFailed => "pool-removal-failed",
            FailureReason::PoolStateIndeterminate => "pool-state-indeterminate",
            FailureReason::PoolReinsertionFailed => "pool-reinsertion-failed",
        }
    }

    /// What the operator should do next.
    pub fn guidance(&self) -> &'static str {
        match self {
            FailureReason::HealthCheckFailed => {
                "the node is back in the pool but never answered as expected; check the service"
            }
            FailureReason::ActionFailed => "the action did not succeed; check the node",
            FailureReason::PoolRemovalFailed => {
                "the node is still in the pool and was not touched; check the monitor file"
            }
            FailureReason::PoolStateIndeterminate => {
                "could not tell whether the node is live, so nothing was done; check the monitor file"
            }
            FailureReason::PoolReinsertionFailed => {
                "the node is OUT of the load-balancer pool; set the monitor file back to true by hand"
            }
        }
    }
}

/// One unit of work for the orchestrator.
#[derive(Debug, Clone)]
pub struct LifecycleRequest {
    pub host: Arc<HostProfile>,
    pub unit: NodeUnit,
    pub action: Action,
    /// Probe the node after a successful action.
    pub verify_health: bool,
}

/// Final record of one lifecycle.
#[derive(Debug, Clone, Serialize)]
pub struct NodeOutcome {
    pub host: String,
    pub node: NodeUnit,
    pub action: Action,
    /// `Done` or `Failed`.
    pub state: LifecycleState,
    pub reason: Option<FailureReason>,
    /// Human-readable messages, in the order they happened.
    pub errors: Vec<String>,
    pub pool_removed: bool,
    pub pool_reinserted: bool,
    /// Only set for status actions.
    pub status: Option<ServiceStatus>,
    pub health: Option<HealthCheckOutcome>,
    /// Every state visited, starting with `Pending`.
    pub transitions: Vec<LifecycleState>,
}

impl NodeOutcome {
    pub fn succeeded(&self) -> bool {
        self.state == LifecycleState::Done
    }

    /// Removed from the pool and never put back.
    pub fn is_stranded(&self) -> bool {
        self.reason == Some(FailureReason::PoolReinsertionFailed)
    }
}

/// The collaborators a lifecycle talks to.
#[derive(Clone)]
pub struct Components {
    pub pool: Arc<dyn PoolMembership>,
    pub service: Arc<dyn ServiceControl>,
    pub health: Arc<dyn HealthVerifier>,
}

/// A single lifecycle in progress.
pub struct Lifecycle<'a> {
    components: &'a Components,
    request: &'a LifecycleRequest,
    state: LifecycleState,
    removed: bool,
    action_failed: bool,
    health_failed: bool,
    outcome: NodeOutcome,
}

impl<'a> Lifecycle<'a> {
    pub fn new(components: &'a Components, request: &'a LifecycleRequest) -> Self {
        Self {
            components,
            request,
            state: LifecycleState::Pending,
            removed: false,
            action_failed: false,
            health_failed: false,
            outcome: NodeOutcome {
                host: request.host.host.clone(),
                node: request.unit.clone(),
                action: request.action,
                state: LifecycleState::Pending,
                reason: None,
                errors: Vec::new(),
                pool_removed: false,
                pool_reinserted: false,
                status: None,
                health: None,
                transitions: vec![LifecycleState::Pending],
            },
        }
    }

    /// Step until `Done` or `Failed`.
    pub async fn run(mut self) -> NodeOutcome {
        while !self.state.is_terminal() {
            let next = self.step().await;
            debug!(
                host = %self.request.host.host,
                node = %self.request.unit,
                from = ?self.state,
                to = ?next,
                "lifecycle transition"
            );
            self.state = next;
            self.outcome.transitions.push(next);
        }
        self.outcome.state = self.state;
        self.outcome
    }

    /// Perform the work of the current state and return the next one.
    pub async fn step(&mut self) -> LifecycleState {
        let request = self.request;
        let components = self.components;
        let host = &*request.host;
        let unit = &request.unit;
        let action = request.action;

        match self.state {
            LifecycleState::Done | LifecycleState::Failed => self.state,

            LifecycleState::Pending => {
                if host.requires_pool_removal(action) {
                    LifecycleState::PoolCheck
                } else {
                    LifecycleState::Acting
                }
            }

            LifecycleState::PoolCheck => match components.pool.is_active(host, unit).await {
                Ok(true) => LifecycleState::Removing,
                Ok(false) => {
                    info!(host = %host.host, node = %unit, "node is already out of the pool");
                    LifecycleState::Acting
                }
                Err(e) => self.fail(
                    FailureReason::PoolStateIndeterminate,
                    format!("could not check whether {unit} is live ({e}); the {action} command will not be performed"),
                ),
            },

            LifecycleState::Removing => {
                info!(host = %host.host, node = %unit, %action, "removing node from the pool to perform the action");
                match components.pool.set_active(host, unit, false).await {
                    Ok(()) => {
                        self.removed = true;
                        self.outcome.pool_removed = true;
                        LifecycleState::Acting
                    }
                    Err(e) => self.fail(
                        FailureReason::PoolRemovalFailed,
                        format!("removing {unit} from the pool failed: {e}"),
                    ),
                }
            }

            LifecycleState::Acting if action == Action::Status => {
                match components.service.query_status(&host.host, unit).await {
                    Ok(status) => {
                        if status == ServiceStatus::Active {
                            info!(host = %host.host, node = %unit, "status shows Active");
                        } else {
                            warn!(host = %host.host, node = %unit, "status shows NOT ACTIVE; check the node");
                        }
                        self.outcome.status = Some(status);
                        LifecycleState::Done
                    }
                    Err(e) => self.fail(
                        FailureReason::ActionFailed,
                        format!("the status command could not run: {e}"),
                    ),
                }
            }

            LifecycleState::Acting => {
                let result = components.service.execute(&host.host, unit, action).await;
                if result.succeeded {
                    info!(host = %host.host, node = %unit, %action, "the action was successful");
                    if request.verify_health {
                        LifecycleState::HealthChecking
                    } else {
                        self.after_action()
                    }
                } else {
                    self.action_failed = true;
                    self.outcome.errors.push(
                        result
                            .error
                            .unwrap_or_else(|| format!("the {action} command failed")),
                    );
                    if self.removed {
                        warn!(host = %host.host, node = %unit, "action failed; putting the node back into the pool anyway");
                        LifecycleState::Reinserting
                    } else {
                        self.resolve()
                    }
                }
            }

            LifecycleState::HealthChecking => {
                let outcome = components.health.verify(host, unit).await;
                if !outcome.success {
                    self.health_failed = true;
                    self.outcome.errors.push(format!(
                        "health checks failed after the {action} ({} attempts)",
                        outcome.attempts
                    ));
                    if self.removed {
                        warn!(host = %host.host, node = %unit, "health checks failed; putting the node back into the pool anyway");
                    }
                }
                self.outcome.health = Some(outcome);
                self.after_action()
            }

            LifecycleState::Reinserting => {
                info!(host = %host.host, node = %unit, "placing the node back into the pool");
                match components.pool.set_active(host, unit, true).await {
                    Ok(()) => {
                        self.outcome.pool_reinserted = true;
                        info!(host = %host.host, node = %unit, "node is back in the pool; verify it via the load balancer");
                        self.resolve()
                    }
                    Err(e) => {
                        error!(host = %host.host, node = %unit, error = %e, "node is OUT of the pool and could not be put back");
                        self.fail(
                            FailureReason::PoolReinsertionFailed,
                            format!("putting {unit} back into the pool failed: {e}"),
                        )
                    }
                }
            }
        }
    }

    /// After the action (and any health check) ran.
    fn after_action(&mut self) -> LifecycleState {
        if self.removed {
            LifecycleState::Reinserting
        } else {
            self.resolve()
        }
    }

    /// Terminal state once no pool work is left.
    fn resolve(&mut self) -> LifecycleState {
        if self.action_failed {
            self.outcome.reason = Some(FailureReason::ActionFailed);
            LifecycleState::Failed
        } else if self.health_failed {
            self.outcome.reason = Some(FailureReason::HealthCheckFailed);
            LifecycleState::Failed
        } else {
            LifecycleState::Done
        }
    }

    fn fail(&mut self, reason: FailureReason, message: String) -> LifecycleState {
        warn!(
            host = %self.request.host.host,
            node = %self.request.unit,
            reason = reason.as_str(),
            %message,
            "lifecycle failed"
        );
        self.outcome.errors.push(message);
        self.outcome.reason = Some(reason);
        LifecycleState::Failed
    }
}
