//! Runs node lifecycles across the selected hosts.
//!
//! Hosts are processed concurrently up to `max_parallel_hosts`; nodes on
//! one host always run one after another, in selection order, so at most
//! one node per host is out of the pool at any time. A host that cannot be
//! resolved is skipped and the run moves on to the next one.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard, Semaphore};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use noderoll_core::{Action, HostSelection, NodeUnit, Selection, TopologyResolver};

use crate::lifecycle::{Components, Lifecycle, LifecycleRequest};
use crate::report::{HostReport, RunReport};

/// Parameters of one run.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub action: Action,
    /// When set, hosts resolving to another environment are skipped.
    pub environment: Option<String>,
    pub verify_health: bool,
    pub selection: Selection,
}

/// Guards against two lifecycles on the same (host, node) at once.
#[derive(Default)]
struct NodeLocks {
    locks: Mutex<HashMap<(String, NodeUnit), Arc<AsyncMutex<()>>>>,
}

impl NodeLocks {
    async fn acquire(&self, host: &str, unit: &NodeUnit) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(
                locks
                    .entry((host.to_string(), unit.clone()))
                    .or_default(),
            )
        };
        lock.lock_owned().await
    }
}

#[derive(Clone)]
pub struct Orchestrator {
    resolver: TopologyResolver,
    components: Components,
    max_parallel_hosts: usize,
    locks: Arc<NodeLocks>,
}

impl Orchestrator {
    pub fn new(resolver: TopologyResolver, components: Components, max_parallel_hosts: usize) -> Self {
        Self {
            resolver,
            components,
            max_parallel_hosts: max_parallel_hosts.max(1),
            locks: Arc::new(NodeLocks::default()),
        }
    }

    /// Run `request.action` on every selected (host, node) pair.
    pub async fn run(&self, request: RunRequest) -> RunReport {
        let mut report = RunReport::new(request.action, request.environment.clone());
        if request.selection.is_empty() {
            warn!("no hosts were given; nothing to do");
            return report;
        }

        info!(
            action = %request.action,
            environment = request.environment.as_deref().unwrap_or("-"),
            hosts = request.selection.hosts().len(),
            nodes = request.selection.len(),
            verify_health = request.verify_health,
            "starting run"
        );

        let semaphore = Arc::new(Semaphore::new(self.max_parallel_hosts));
        let mut tasks = JoinSet::new();

        for selection in request.selection.clone() {
            let this = self.clone();
            let semaphore = Arc::clone(&semaphore);
            let request = request.clone();
            tasks.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return HostReport::skipped(&selection.host, "run was cancelled"),
                };
                this.run_host(&selection, &request).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(host_report) => report.insert(host_report),
                Err(e) => error!(error = %e, "host task panicked"),
            }
        }

        // A panicked task leaves its host without a report.
        for selection in request.selection.hosts() {
            if !report.hosts.contains_key(&selection.host) {
                report.insert(HostReport::skipped(&selection.host, "host task panicked"));
            }
        }

        info!(
            nodes = report.outcomes().count(),
            failed = report.failed().len(),
            stranded = report.stranded().len(),
            "run finished"
        );
        report
    }

    async fn run_host(&self, selection: &HostSelection, request: &RunRequest) -> HostReport {
        let host = selection.host.as_str();

        let profile = match self.resolver.resolve(host) {
            Ok(profile) => profile,
            Err(e) => {
                warn!(%host, error = %e, "skipping host");
                return HostReport::skipped(host, e.to_string());
            }
        };

        if let Some(expected) = &request.environment
            && &profile.environment != expected
        {
            warn!(%host, environment = %profile.environment, %expected, "host is not in the requested environment; skipping");
            return HostReport::skipped(
                host,
                format!("host belongs to {}, not {expected}", profile.environment),
            );
        }

        info!(
            %host,
            environment = %profile.environment,
            split = profile.split,
            roles = ?profile.roles,
            nodes = selection.nodes.len(),
            "processing host"
        );

        let profile = Arc::new(profile);
        let mut nodes = Vec::with_capacity(selection.nodes.len());
        for unit in &selection.nodes {
            let _guard = self.locks.acquire(host, unit).await;
            let node_request = LifecycleRequest {
                host: Arc::clone(&profile),
                unit: unit.clone(),
                action: request.action,
                verify_health: request.verify_health,
            };
            let outcome = Lifecycle::new(&self.components, &node_request).run().await;
            nodes.push(outcome);
        }

        HostReport {
            host: host.to_string(),
            profile: Some((*profile).clone()),
            skipped: None,
            nodes,
        }
    }
}
