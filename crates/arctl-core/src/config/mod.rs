//! Configuration for arctl.
//!
//! Settings come from `config.toml` in the global config directory, with a
//! few environment overrides applied once at the entry point. Core logic
//! only ever sees the resulting [`ArctlConfig`] and an [`EnvSnapshot`].

pub mod env;
pub mod store;

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::runtime::HealthPolicy;
use crate::topology::AGENT_PORT;

pub use env::EnvSnapshot;
pub use store::ConfigStore;

pub const DEFAULT_REGISTRY_URL: &str = "http://localhost:12121";

pub const ENV_REGISTRY_URL: &str = "ARCTL_REGISTRY_URL";
pub const ENV_STATE_DIR: &str = "ARCTL_STATE_DIR";
pub const ENV_DOCKER: &str = "ARCTL_DOCKER";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArctlConfig {
    /// Registry API base URL
    pub registry_url: String,
    /// Root for temporary resolution workspaces and resolved server config
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_dir: Option<PathBuf>,
    /// Container CLI used for builds and compose
    pub docker_binary: String,
    pub health: HealthConfig,
    /// Log lines captured when a health check times out
    pub log_tail_lines: usize,
    /// Host port the primary agent is published on
    pub agent_port: u16,
}

impl Default for ArctlConfig {
    fn default() -> Self {
        Self {
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            state_dir: None,
            docker_binary: "docker".to_string(),
            health: HealthConfig::default(),
            log_tail_lines: crate::runtime::DEFAULT_LOG_TAIL,
            agent_port: AGENT_PORT,
        }
    }
}

impl ArctlConfig {
    /// Apply `ARCTL_*` overrides from an environment snapshot.
    pub fn apply_env(&mut self, env: &EnvSnapshot) {
        if let Some(url) = env.get(ENV_REGISTRY_URL) {
            self.registry_url = url.to_string();
        }
        if let Some(dir) = env.get(ENV_STATE_DIR) {
            self.state_dir = Some(PathBuf::from(dir));
        }
        if let Some(docker) = env.get(ENV_DOCKER) {
            self.docker_binary = docker.to_string();
        }
    }

    /// Configured state directory, else the platform data directory.
    pub fn state_dir(&self) -> PathBuf {
        self.state_dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("arctl")
        })
    }

    /// Where `<agent>[/<version>]/mcp-servers.json` files live for
    /// registry runs.
    pub fn agents_dir(&self) -> PathBuf {
        self.state_dir().join("agents")
    }

    pub fn health_url(&self) -> String {
        self.health
            .url
            .clone()
            .unwrap_or_else(|| format!("http://localhost:{}/health", self.agent_port))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    pub interval_ms: u64,
    pub timeout_secs: u64,
    /// Health endpoint of the primary agent; derived from `agent_port` when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Default for HealthConfig {
    fn default() -> Self {
        let policy = HealthPolicy::default();
        Self {
            interval_ms: policy.interval.as_millis() as u64,
            timeout_secs: policy.timeout.as_secs(),
            url: None,
        }
    }
}

impl HealthConfig {
    pub fn policy(&self) -> HealthPolicy {
        HealthPolicy {
            interval: Duration::from_millis(self.interval_ms),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}
