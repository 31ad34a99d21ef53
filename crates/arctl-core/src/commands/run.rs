//! Run command implementation.
//!
//! Runs an agent on this machine: resolve registry MCP servers, build their
//! images, build the agent image for directory runs, render the topology and
//! hand it to the local runtime for an interactive session.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use crate::build::{BuiltImage, ImageBuildOrchestrator, ImageBuilder};
use crate::config::{ArctlConfig, EnvSnapshot};
use crate::manifest::Manifest;
use crate::registry::RegistryApi;
use crate::resolve::{ReferenceResolver, ResolutionWorkspace, ResolveOptions};
use crate::runtime::{
    ContainerRuntime, HealthProbe, HttpHealthProbe, InteractiveSession, LocalRuntimeManager,
};
use crate::topology::{RenderRequest, TopologyRenderer, primary_image};

/// Where the agent comes from.
#[derive(Debug, Clone)]
pub enum RunSource {
    /// A project directory and the manifest read from it
    Directory { dir: PathBuf, manifest: Manifest },
    /// A published agent, fetched from the registry
    Registry { name: String, version: String },
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Extra environment for the agent container
    pub env: BTreeMap<String, String>,
    /// Override the manifest's model provider
    pub model_provider: Option<String>,
    /// Override the manifest's model name
    pub model_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub name: String,
    pub version: String,
    pub image: String,
    /// Images built for this run, MCP servers first
    pub built: Vec<BuiltImage>,
    /// Non-fatal problems, such as a failed teardown
    pub warnings: Vec<String>,
}

pub struct RunCommand {
    registry: Arc<dyn RegistryApi>,
    builder: Arc<dyn ImageBuilder>,
    runtime: Arc<dyn ContainerRuntime>,
    probe: Arc<dyn HealthProbe>,
    config: ArctlConfig,
    env: EnvSnapshot,
}

impl RunCommand {
    pub fn new(
        registry: Arc<dyn RegistryApi>,
        builder: Arc<dyn ImageBuilder>,
        runtime: Arc<dyn ContainerRuntime>,
        config: ArctlConfig,
        env: EnvSnapshot,
    ) -> Self {
        let probe = Arc::new(HttpHealthProbe::new(config.health_url()));
        Self {
            registry,
            builder,
            runtime,
            probe,
            config,
            env,
        }
    }

    /// Replace the HTTP health probe.
    pub fn with_health_probe(mut self, probe: Arc<dyn HealthProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub async fn execute(
        &self,
        source: RunSource,
        options: &RunOptions,
        session: &dyn InteractiveSession,
        cancel: &CancellationToken,
    ) -> anyhow::Result<RunSummary> {
        let (mut manifest, workspace, resolve_options, project_dir) = match source {
            RunSource::Directory { dir, manifest } => {
                let resolve_options = ResolveOptions::new(&dir);
                (
                    manifest,
                    ResolutionWorkspace::borrowed(&dir),
                    resolve_options,
                    Some(dir),
                )
            }
            RunSource::Registry { name, version } => {
                let manifest = self
                    .registry
                    .get_agent(&name, &version)
                    .await
                    .with_context(|| format!("Failed to fetch agent '{name}@{version}'"))?;
                let workspace = ResolutionWorkspace::temporary(&self.config.state_dir())?;
                let resolve_options =
                    ResolveOptions::new(self.config.agents_dir()).with_version(&version);
                (manifest, workspace, resolve_options, None)
            }
        };

        if let Some(provider) = &options.model_provider {
            manifest.model_provider = provider.clone();
        }
        if let Some(model) = &options.model_name {
            manifest.model_name = model.clone();
        }
        manifest
            .validate()
            .with_context(|| format!("Invalid manifest for '{}'", manifest.name))?;

        if let Some(variable) = manifest.required_credential() {
            anyhow::ensure!(
                self.env.contains(variable),
                "model provider '{}' requires {} to be set in the environment",
                manifest.model_provider,
                variable
            );
        }

        let resolved = ReferenceResolver::new(Arc::clone(&self.registry))
            .resolve(&manifest, workspace.path(), &resolve_options)
            .await
            .with_context(|| format!("Failed to resolve MCP servers for '{}'", manifest.name))?;

        let orchestrator = ImageBuildOrchestrator::new(Arc::clone(&self.builder));
        let mut built = orchestrator
            .build_all(&resolved)
            .await
            .with_context(|| format!("Failed to build MCP servers for '{}'", manifest.name))?
            .built;

        let image = primary_image(&resolved.manifest);
        if let Some(dir) = &project_dir
            && dir.join("Dockerfile").is_file()
        {
            built.push(
                orchestrator
                    .build_primary(&resolved.manifest.name, &image, dir)
                    .await
                    .with_context(|| format!("Failed to build agent '{}'", manifest.name))?,
            );
        }

        let mut request = RenderRequest::for_manifest(&resolved.manifest, self.config.agent_port);
        request.image = image.clone();
        request.env = options.env.clone();
        let topology = TopologyRenderer::new()
            .render(&request)
            .with_context(|| format!("Failed to render topology for '{}'", manifest.name))?;

        let endpoint = format!("http://localhost:{}", self.config.agent_port);
        let mut manager =
            LocalRuntimeManager::new(Arc::clone(&self.runtime), self.config.health.policy())
                .with_log_tail(self.config.log_tail_lines);
        let report = manager
            .run_interactive(&topology, Some(self.probe.as_ref()), session, &endpoint, cancel)
            .await
            .with_context(|| format!("Failed to run agent '{}'", manifest.name))?;

        // The temporary workspace of a registry run is released here.
        drop(workspace);

        Ok(RunSummary {
            name: resolved.manifest.name.clone(),
            version: resolved.manifest.version().to_string(),
            image,
            built,
            warnings: report.warnings,
        })
    }
}
