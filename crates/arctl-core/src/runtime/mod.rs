//! Local lifecycle of a rendered topology.
//!
//! ```text
//! starting -> waiting-healthy -> ready -> interacting -> stopping -> stopped
//!     \              \
//!      `-> failed     `-> failed
//! ```
//!
//! A failed start is fatal and skips the health wait. A health timeout is
//! fatal but leaves the topology running so it can be inspected; tearing it
//! down is then up to the caller. Once a session has run, teardown always
//! happens and its failure is only a warning.

pub mod compose;
pub mod health;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::process::ProcessError;
use crate::topology::Topology;

pub use compose::DockerCompose;
pub use health::{HealthError, HealthPolicy, HealthProbe, HttpHealthProbe, wait_healthy};

pub const DEFAULT_LOG_TAIL: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Starting,
    WaitingHealthy,
    Ready,
    Interacting,
    Stopping,
    Stopped,
    Failed,
}

impl RunState {
    pub fn can_transition_to(&self, next: RunState) -> bool {
        use RunState::*;
        matches!(
            (self, next),
            (Starting, WaitingHealthy)
                | (Starting, Ready)
                | (Starting, Failed)
                | (WaitingHealthy, Ready)
                | (WaitingHealthy, Failed)
                | (Ready, Interacting)
                | (Ready, Stopping)
                | (Interacting, Stopping)
                | (Stopping, Stopped)
        )
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunState::Starting => "starting",
            RunState::WaitingHealthy => "waiting-healthy",
            RunState::Ready => "ready",
            RunState::Interacting => "interacting",
            RunState::Stopping => "stopping",
            RunState::Stopped => "stopped",
            RunState::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("failed to start '{project}': {source}")]
    Start {
        project: String,
        #[source]
        source: ProcessError,
    },

    #[error("'{project}' did not become healthy ({source}); containers left running for inspection\n{logs}")]
    HealthTimeout {
        project: String,
        #[source]
        source: HealthError,
        logs: String,
    },

    #[error("start of '{project}' cancelled")]
    Cancelled { project: String },

    #[error("interactive session for '{project}' failed: {message}")]
    Session { project: String, message: String },

    #[error("cannot move from {from} to {to}")]
    InvalidTransition { from: RunState, to: RunState },
}

/// Compose-equivalent container runtime.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn up(&self, topology: &Topology) -> Result<(), ProcessError>;
    async fn down(&self, topology: &Topology) -> Result<(), ProcessError>;
    async fn logs(&self, topology: &Topology, tail: usize) -> Result<String, ProcessError>;
}

/// Interactive session against a running resource.
#[async_trait]
pub trait InteractiveSession: Send + Sync {
    async fn run(&self, endpoint: &str, cancel: &CancellationToken) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub warnings: Vec<String>,
}

pub struct LocalRuntimeManager {
    runtime: Arc<dyn ContainerRuntime>,
    policy: HealthPolicy,
    log_tail: usize,
    history: Vec<RunState>,
}

impl LocalRuntimeManager {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, policy: HealthPolicy) -> Self {
        Self {
            runtime,
            policy,
            log_tail: DEFAULT_LOG_TAIL,
            history: Vec::new(),
        }
    }

    pub fn with_log_tail(mut self, lines: usize) -> Self {
        self.log_tail = lines;
        self
    }

    /// Current state; `None` before the first start.
    pub fn state(&self) -> Option<RunState> {
        self.history.last().copied()
    }

    /// Every state visited, in order.
    pub fn history(&self) -> &[RunState] {
        &self.history
    }

    fn enter(&mut self, next: RunState) -> Result<(), RuntimeError> {
        if let Some(current) = self.state()
            && !current.can_transition_to(next)
        {
            return Err(RuntimeError::InvalidTransition {
                from: current,
                to: next,
            });
        }
        tracing::debug!(state = %next, "runtime state");
        self.history.push(next);
        Ok(())
    }

    /// Bring the topology up and wait until it is healthy.
    ///
    /// Without a probe the topology is considered ready as soon as it is up.
    pub async fn start(
        &mut self,
        topology: &Topology,
        probe: Option<&dyn HealthProbe>,
        cancel: &CancellationToken,
    ) -> Result<(), RuntimeError> {
        self.history.clear();
        self.enter(RunState::Starting)?;
        if cancel.is_cancelled() {
            self.enter(RunState::Failed)?;
            return Err(RuntimeError::Cancelled {
                project: topology.project_name.clone(),
            });
        }
        tracing::info!(project = %topology.project_name, "starting topology");

        if let Err(source) = self.runtime.up(topology).await {
            self.enter(RunState::Failed)?;
            return Err(RuntimeError::Start {
                project: topology.project_name.clone(),
                source,
            });
        }

        let Some(probe) = probe else {
            return self.enter(RunState::Ready);
        };

        self.enter(RunState::WaitingHealthy)?;
        match wait_healthy(probe, self.policy, cancel).await {
            Ok(_) => self.enter(RunState::Ready),
            Err(HealthError::Cancelled { .. }) => {
                self.enter(RunState::Failed)?;
                Err(RuntimeError::Cancelled {
                    project: topology.project_name.clone(),
                })
            }
            Err(source) => {
                let logs = match self.runtime.logs(topology, self.log_tail).await {
                    Ok(logs) => logs,
                    Err(e) => format!("(failed to capture logs: {e})"),
                };
                tracing::error!(
                    project = %topology.project_name,
                    "health check timed out; recent logs:\n{}",
                    logs
                );
                self.enter(RunState::Failed)?;
                Err(RuntimeError::HealthTimeout {
                    project: topology.project_name.clone(),
                    source,
                    logs,
                })
            }
        }
    }

    /// Tear the topology down. Failures become warnings.
    pub async fn stop(&mut self, topology: &Topology) -> Vec<String> {
        let mut warnings = Vec::new();
        if let Err(e) = self.enter(RunState::Stopping) {
            warnings.push(e.to_string());
        }
        if let Err(e) = self.runtime.down(topology).await {
            let warning = format!("failed to tear down '{}': {e}", topology.project_name);
            tracing::warn!("{}", warning);
            warnings.push(warning);
        }
        if let Err(e) = self.enter(RunState::Stopped) {
            warnings.push(e.to_string());
        }
        warnings
    }

    /// Start, run the interactive session, then always tear down.
    pub async fn run_interactive(
        &mut self,
        topology: &Topology,
        probe: Option<&dyn HealthProbe>,
        session: &dyn InteractiveSession,
        endpoint: &str,
        cancel: &CancellationToken,
    ) -> Result<RunReport, RuntimeError> {
        self.start(topology, probe, cancel).await?;

        self.enter(RunState::Interacting)?;
        tracing::info!(endpoint, "starting interactive session");
        let outcome = session.run(endpoint, cancel).await;

        let warnings = self.stop(topology).await;
        match outcome {
            Ok(()) => Ok(RunReport { warnings }),
            Err(e) => Err(RuntimeError::Session {
                project: topology.project_name.clone(),
                message: format!("{e:#}"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_is_absorbing() {
        for next in [
            RunState::Starting,
            RunState::Ready,
            RunState::Stopping,
            RunState::Stopped,
        ] {
            assert!(!RunState::Failed.can_transition_to(next));
        }
    }

    #[test]
    fn test_failed_only_from_start_or_health_wait() {
        assert!(RunState::Starting.can_transition_to(RunState::Failed));
        assert!(RunState::WaitingHealthy.can_transition_to(RunState::Failed));
        assert!(!RunState::Interacting.can_transition_to(RunState::Failed));
        assert!(!RunState::Ready.can_transition_to(RunState::Failed));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(RunState::WaitingHealthy.to_string(), "waiting-healthy");
    }
}
