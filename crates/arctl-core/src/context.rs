//! Application context for unified dependency injection.

use std::sync::Arc;

use crate::build::{DockerBuilder, ImageBuilder};
use crate::commands::{ComposeLocalExecutor, RunCommand};
use crate::config::{ArctlConfig, ConfigStore, EnvSnapshot};
use crate::deploy::DeploymentDispatcher;
use crate::registry::{HttpRegistryClient, RegistryApi, RegistryError};
use crate::runtime::{ContainerRuntime, DockerCompose};

/// Unified application context for dependency injection.
///
/// Holds the effective configuration and the environment snapshot taken at
/// startup. The CLI creates this once and asks it for services.
#[derive(Debug, Clone)]
pub struct AppContext {
    config: ArctlConfig,
    env: EnvSnapshot,
}

impl AppContext {
    pub fn new(config: ArctlConfig, env: EnvSnapshot) -> Self {
        Self { config, env }
    }

    /// Load config from `store` and apply environment overrides from `env`.
    pub fn load(store: &ConfigStore, env: EnvSnapshot) -> anyhow::Result<Self> {
        let mut config = store.load()?;
        config.apply_env(&env);
        Ok(Self::new(config, env))
    }

    pub fn config(&self) -> &ArctlConfig {
        &self.config
    }

    pub fn env(&self) -> &EnvSnapshot {
        &self.env
    }

    /// Get a registry client for the configured registry.
    pub fn registry(&self) -> Result<Arc<dyn RegistryApi>, RegistryError> {
        Ok(Arc::new(HttpRegistryClient::new(&self.config.registry_url)?))
    }

    pub fn image_builder(&self) -> Arc<dyn ImageBuilder> {
        Arc::new(DockerBuilder::new(&self.config.docker_binary))
    }

    pub fn container_runtime(&self) -> Arc<dyn ContainerRuntime> {
        Arc::new(DockerCompose::new(&self.config.docker_binary))
    }

    /// Get a RunCommand wired to the real registry and docker.
    pub fn run_command(&self) -> Result<RunCommand, RegistryError> {
        Ok(RunCommand::new(
            self.registry()?,
            self.image_builder(),
            self.container_runtime(),
            self.config.clone(),
            self.env.clone(),
        ))
    }

    /// Get a DeploymentDispatcher whose local path runs on docker compose.
    pub fn dispatcher(&self) -> Result<DeploymentDispatcher, RegistryError> {
        let registry = self.registry()?;
        let local = ComposeLocalExecutor::new(
            Arc::clone(&registry),
            self.image_builder(),
            self.container_runtime(),
            self.config.clone(),
        );
        Ok(DeploymentDispatcher::new(
            registry,
            Arc::new(local),
            self.env.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_applies_env_over_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("config.toml"),
            "registry_url = \"http://file.example.com\"\n",
        )
        .unwrap();
        let store = ConfigStore::from_dir(dir.path());

        let env = EnvSnapshot::from_iter([("ARCTL_REGISTRY_URL", "http://env.example.com")]);
        let ctx = AppContext::load(&store, env).unwrap();
        assert_eq!(ctx.config().registry_url, "http://env.example.com");
        assert_eq!(ctx.registry().unwrap().base_url(), "http://env.example.com");
    }

    #[test]
    fn test_invalid_registry_url() {
        let mut config = ArctlConfig::default();
        config.registry_url = "not a url".to_string();
        let ctx = AppContext::new(config, EnvSnapshot::default());
        assert!(ctx.registry().is_err());
    }
}
