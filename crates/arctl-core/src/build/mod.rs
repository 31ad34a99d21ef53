//! Container image builds for resolved MCP servers.
//!
//! Builds run one at a time in manifest order and stop at the first
//! failure. Image names are a pure function of (agent, server), so a retry
//! overwrites earlier images instead of accumulating new ones.

pub mod docker;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::process::ProcessError;
use crate::resolve::ResolvedManifest;
use crate::topology::dns_label;

pub use docker::DockerBuilder;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("failed to build image '{image}' for MCP server '{server}': {source}")]
    Server {
        server: String,
        image: String,
        #[source]
        source: ProcessError,
    },

    #[error("failed to build image '{image}' for '{name}': {source}")]
    Primary {
        name: String,
        image: String,
        #[source]
        source: ProcessError,
    },

    #[error("build context for '{name}' does not exist: {}", .path.display())]
    MissingContext { name: String, path: PathBuf },

    #[error("MCP server '{server}' is still a registry reference; resolve the manifest first")]
    UnresolvedReference { server: String },
}

/// Output of a successful build.
#[derive(Debug, Clone, Default)]
pub struct BuildOutput {
    pub log: String,
}

/// A container build tool.
#[async_trait]
pub trait ImageBuilder: Send + Sync {
    async fn build(&self, image: &str, context_dir: &Path) -> Result<BuildOutput, ProcessError>;
}

/// Image name for a server owned by an agent.
pub fn peer_image_name(agent_name: &str, server_name: &str) -> String {
    format!("{}-{}:latest", dns_label(agent_name), dns_label(server_name))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltImage {
    pub server: String,
    pub image: String,
}

#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    pub built: Vec<BuiltImage>,
}

pub struct ImageBuildOrchestrator {
    builder: Arc<dyn ImageBuilder>,
}

impl ImageBuildOrchestrator {
    pub fn new(builder: Arc<dyn ImageBuilder>) -> Self {
        Self { builder }
    }

    /// Build every image resolution asked for, sequentially.
    pub async fn build_all(&self, resolved: &ResolvedManifest) -> Result<BuildReport, BuildError> {
        if let Some(server) = resolved.manifest.mcp_servers.iter().find(|s| s.is_registry()) {
            return Err(BuildError::UnresolvedReference {
                server: server.name().to_string(),
            });
        }

        let mut report = BuildReport::default();
        for pending in &resolved.pending_builds {
            if !pending.context_dir.is_dir() {
                return Err(BuildError::MissingContext {
                    name: pending.server_name.clone(),
                    path: pending.context_dir.clone(),
                });
            }

            tracing::info!(
                server = %pending.server_name,
                image = %pending.image,
                "building MCP server image"
            );
            let output = self
                .builder
                .build(&pending.image, &pending.context_dir)
                .await
                .map_err(|source| BuildError::Server {
                    server: pending.server_name.clone(),
                    image: pending.image.clone(),
                    source,
                })?;
            tracing::debug!(server = %pending.server_name, log = %output.log, "build finished");

            report.built.push(BuiltImage {
                server: pending.server_name.clone(),
                image: pending.image.clone(),
            });
        }
        Ok(report)
    }

    /// Build the primary resource's image from its project directory.
    pub async fn build_primary(
        &self,
        name: &str,
        image: &str,
        context_dir: &Path,
    ) -> Result<BuiltImage, BuildError> {
        if !context_dir.is_dir() {
            return Err(BuildError::MissingContext {
                name: name.to_string(),
                path: context_dir.to_path_buf(),
            });
        }
        tracing::info!(name, image, "building image");
        self.builder
            .build(image, context_dir)
            .await
            .map_err(|source| BuildError::Primary {
                name: name.to_string(),
                image: image.to_string(),
                source,
            })?;
        Ok(BuiltImage {
            server: name.to_string(),
            image: image.to_string(),
        })
    }
}
