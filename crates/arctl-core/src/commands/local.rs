//! Local execution path of the deployment dispatcher.
//!
//! Unlike `run`, a local deployment is started detached: once the workload
//! is healthy it is left running and the record tracks it.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::build::{ImageBuildOrchestrator, ImageBuilder};
use crate::config::ArctlConfig;
use crate::deploy::{DeploymentRecord, LocalExecutor, LocalTarget};
use crate::manifest::{Manifest, McpServerRef, RegistryServerRef};
use crate::registry::RegistryApi;
use crate::resolve::{ReferenceResolver, ResolutionWorkspace, ResolveOptions};
use crate::runtime::{ContainerRuntime, HealthProbe, HttpHealthProbe, LocalRuntimeManager};
use crate::topology::{
    MCP_PEER_PORT, RenderRequest, Topology, TopologyRenderer, project_name,
};
use crate::types::ResourceType;

/// Owner name for images of standalone MCP server deployments.
const STANDALONE_OWNER: &str = "arctl";

pub struct ComposeLocalExecutor {
    registry: Arc<dyn RegistryApi>,
    builder: Arc<dyn ImageBuilder>,
    runtime: Arc<dyn ContainerRuntime>,
    probe: Arc<dyn HealthProbe>,
    config: ArctlConfig,
}

impl ComposeLocalExecutor {
    pub fn new(
        registry: Arc<dyn RegistryApi>,
        builder: Arc<dyn ImageBuilder>,
        runtime: Arc<dyn ContainerRuntime>,
        config: ArctlConfig,
    ) -> Self {
        let probe = Arc::new(HttpHealthProbe::new(config.health_url()));
        Self {
            registry,
            builder,
            runtime,
            probe,
            config,
        }
    }

    pub fn with_health_probe(mut self, probe: Arc<dyn HealthProbe>) -> Self {
        self.probe = probe;
        self
    }

    fn manager(&self) -> LocalRuntimeManager {
        LocalRuntimeManager::new(Arc::clone(&self.runtime), self.config.health.policy())
            .with_log_tail(self.config.log_tail_lines)
    }

    async fn launch_agent(
        &self,
        target: &LocalTarget,
        workspace: &ResolutionWorkspace,
    ) -> anyhow::Result<()> {
        let manifest = self
            .registry
            .get_agent(&target.resource_name, &target.version)
            .await
            .with_context(|| {
                format!(
                    "Failed to fetch agent '{}@{}'",
                    target.resource_name, target.version
                )
            })?;
        manifest
            .validate()
            .with_context(|| format!("Invalid manifest for '{}'", manifest.name))?;

        let resolve_options =
            ResolveOptions::new(self.config.agents_dir()).with_version(&target.version);
        let resolved = ReferenceResolver::new(Arc::clone(&self.registry))
            .resolve(&manifest, workspace.path(), &resolve_options)
            .await?;
        ImageBuildOrchestrator::new(Arc::clone(&self.builder))
            .build_all(&resolved)
            .await?;

        let mut request = RenderRequest::for_manifest(&resolved.manifest, self.config.agent_port);
        request.env = target.env.clone();
        request.project = Some(project_name(&target.resource_name, &target.version));
        let topology = TopologyRenderer::new().render(&request)?;

        self.manager()
            .start(&topology, Some(self.probe.as_ref()), &CancellationToken::new())
            .await?;
        Ok(())
    }

    async fn launch_server(
        &self,
        target: &LocalTarget,
        workspace: &ResolutionWorkspace,
    ) -> anyhow::Result<()> {
        // Resolve the server as the only peer of a stand-in owner, then run
        // the built image on its own.
        let mut owner = Manifest::new(STANDALONE_OWNER);
        owner.mcp_servers.push(McpServerRef::Registry(RegistryServerRef {
            name: target.resource_name.clone(),
            registry_url: None,
            registry_server_name: target.resource_name.clone(),
            registry_server_version: Some(target.version.clone()),
            prefer_remote: target.prefer_remote,
        }));

        let resolve_options = ResolveOptions::new(workspace.path());
        let resolved = ReferenceResolver::new(Arc::clone(&self.registry))
            .resolve(&owner, workspace.path(), &resolve_options)
            .await?;
        let built = ImageBuildOrchestrator::new(Arc::clone(&self.builder))
            .build_all(&resolved)
            .await?;
        let image = built.built.first().map(|b| b.image.clone()).with_context(|| {
            format!(
                "MCP server '{}@{}' is only available as a remote endpoint; nothing to run locally",
                target.resource_name, target.version
            )
        })?;

        let topology = TopologyRenderer::new().render_server(
            &target.resource_name,
            &target.version,
            &image,
            &target.env,
            MCP_PEER_PORT,
        )?;
        self.manager()
            .start(&topology, None, &CancellationToken::new())
            .await?;
        Ok(())
    }
}

#[async_trait]
impl LocalExecutor for ComposeLocalExecutor {
    async fn launch(&self, target: &LocalTarget) -> anyhow::Result<()> {
        let workspace = ResolutionWorkspace::temporary(&self.config.state_dir())?;
        tracing::info!(
            name = %target.resource_name,
            version = %target.version,
            kind = %target.resource_type,
            "starting local deployment"
        );
        match target.resource_type {
            ResourceType::Agent => self.launch_agent(target, &workspace).await,
            ResourceType::Mcp => self.launch_server(target, &workspace).await,
        }
    }

    async fn teardown(&self, record: &DeploymentRecord) -> anyhow::Result<()> {
        let topology = Topology::detached(project_name(&record.resource_name, &record.version))?;
        self.runtime.down(&topology).await.with_context(|| {
            format!(
                "Failed to stop '{}' ({})",
                record.resource_name, topology.project_name
            )
        })?;
        Ok(())
    }
}
