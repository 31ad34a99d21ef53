//! Resolution of registry references into buildable artifacts.
//!
//! Every `registry` MCP server reference becomes either a `remote` entry
//! or a `command` entry whose build context is materialized under
//! `<workspace>/registry/<server>/`. Resolution is all-or-nothing: on the
//! first failure no manifest is returned and the build contexts written by
//! this call are removed again.

pub mod recipe;
pub mod side_channel;
pub mod workspace;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::build::peer_image_name;
use crate::manifest::{CommandServer, Manifest, McpServerRef, RegistryServerRef, RemoteServer};
use crate::registry::{RegistryApi, RegistryError, ResolvedTransport, ServerDefinition, client_for};
use crate::topology::{dns_label, peer_url};

pub use side_channel::{DescriptorKind, ServerDescriptor};
pub use workspace::ResolutionWorkspace;

/// Directory under the workspace holding materialized build contexts.
pub const REGISTRY_DIR: &str = "registry";

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("failed to resolve MCP server '{server}' ({registry_name}@{version}): {source}")]
    Lookup {
        server: String,
        registry_name: String,
        version: String,
        #[source]
        source: RegistryError,
    },

    #[error("MCP server '{server}' ({registry_name}@{version}) has no package or remote to run")]
    NoRunnableForm {
        server: String,
        registry_name: String,
        version: String,
    },

    #[error("MCP servers '{server}' and '{other}' would share the build context registry/{segment}")]
    ContextCollision {
        server: String,
        other: String,
        segment: String,
    },

    #[error("failed to write build context for MCP server '{server}' at {}: {source}", .path.display())]
    Materialize {
        server: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to update resolved server config at {}: {source}", .path.display())]
    SideChannel {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Where resolution writes its side-channel config.
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Directory holding `<agent-name>[/<version>]/mcp-servers.json`
    pub agent_dir: PathBuf,
    /// Version segment, used for registry runs
    pub version: Option<String>,
}

impl ResolveOptions {
    pub fn new(agent_dir: impl Into<PathBuf>) -> Self {
        Self {
            agent_dir: agent_dir.into(),
            version: None,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }
}

/// An image resolution needs built before the topology can run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingBuild {
    pub server_name: String,
    pub context_dir: PathBuf,
    pub image: String,
}

#[derive(Debug, Clone)]
pub struct ResolvedManifest {
    /// Equivalent manifest without registry references
    pub manifest: Manifest,
    /// Builds for entries materialized by this resolution, in manifest order
    pub pending_builds: Vec<PendingBuild>,
    /// Descriptors written to `mcp-servers.json`
    pub descriptors: Vec<ServerDescriptor>,
    /// Location of `mcp-servers.json`
    pub descriptor_path: PathBuf,
}

impl ResolvedManifest {
    pub fn is_noop(&self) -> bool {
        self.pending_builds.is_empty() && self.descriptors.is_empty()
    }
}

pub struct ReferenceResolver {
    registry: Arc<dyn RegistryApi>,
}

impl ReferenceResolver {
    pub fn new(registry: Arc<dyn RegistryApi>) -> Self {
        Self { registry }
    }

    /// Resolve every registry reference in `manifest`.
    ///
    /// `workspace` receives the build contexts. With no registry references
    /// present this does no work beyond removing a stale `mcp-servers.json`.
    pub async fn resolve(
        &self,
        manifest: &Manifest,
        workspace: &Path,
        options: &ResolveOptions,
    ) -> Result<ResolvedManifest, ResolveError> {
        let descriptor_path = side_channel::descriptor_path(
            &options.agent_dir,
            &manifest.name,
            options.version.as_deref(),
        );

        if !manifest.has_registry_servers() {
            let removed = side_channel::remove(&descriptor_path).map_err(|source| {
                ResolveError::SideChannel {
                    path: descriptor_path.clone(),
                    source,
                }
            })?;
            if removed {
                tracing::debug!(
                    path = %descriptor_path.display(),
                    "removed stale resolved server config"
                );
            }
            return Ok(ResolvedManifest {
                manifest: manifest.clone(),
                pending_builds: Vec::new(),
                descriptors: Vec::new(),
                descriptor_path,
            });
        }

        let mut written = Vec::new();
        let outcome = self
            .resolve_servers(manifest, workspace, &mut written)
            .await;

        let (manifest, pending_builds, descriptors) = match outcome {
            Ok(parts) => parts,
            Err(err) => {
                discard(&written);
                return Err(err);
            }
        };

        if let Err(source) = side_channel::write(&descriptor_path, &descriptors) {
            discard(&written);
            return Err(ResolveError::SideChannel {
                path: descriptor_path,
                source,
            });
        }

        tracing::info!(
            agent = %manifest.name,
            resolved = descriptors.len(),
            builds = pending_builds.len(),
            "resolved registry MCP servers"
        );

        Ok(ResolvedManifest {
            manifest,
            pending_builds,
            descriptors,
            descriptor_path,
        })
    }

    async fn resolve_servers(
        &self,
        manifest: &Manifest,
        workspace: &Path,
        written: &mut Vec<PathBuf>,
    ) -> Result<(Manifest, Vec<PendingBuild>, Vec<ServerDescriptor>), ResolveError> {
        let mut resolved = manifest.clone();
        let mut servers = Vec::with_capacity(manifest.mcp_servers.len());
        let mut pending = Vec::new();
        let mut descriptors = Vec::new();
        let mut segments: Vec<(String, &str)> = Vec::new();

        for server in &manifest.mcp_servers {
            let McpServerRef::Registry(reference) = server else {
                servers.push(server.clone());
                continue;
            };

            let definition = self.fetch(reference).await?;
            let transport = definition.resolve_transport(reference.prefer_remote).ok_or_else(
                || ResolveError::NoRunnableForm {
                    server: reference.name.clone(),
                    registry_name: reference.registry_server_name.clone(),
                    version: reference.version().to_string(),
                },
            )?;

            match transport {
                ResolvedTransport::Remote(remote) => {
                    tracing::debug!(server = %reference.name, url = %remote.url, "resolved to remote");
                    descriptors.push(ServerDescriptor {
                        name: reference.name.clone(),
                        kind: DescriptorKind::Remote,
                        url: remote.url.clone(),
                        headers: remote.headers.clone(),
                    });
                    servers.push(McpServerRef::Remote(RemoteServer {
                        name: reference.name.clone(),
                        url: remote.url.clone(),
                        headers: remote.headers.clone(),
                    }));
                }
                ResolvedTransport::Package(package) => {
                    let segment = dns_label(&reference.name);
                    if let Some((_, other)) = segments.iter().find(|(s, _)| *s == segment) {
                        return Err(ResolveError::ContextCollision {
                            server: reference.name.clone(),
                            other: other.to_string(),
                            segment,
                        });
                    }
                    segments.push((segment.clone(), reference.name.as_str()));
                    let context_dir = workspace.join(REGISTRY_DIR).join(&segment);
                    written.push(context_dir.clone());
                    materialize(&context_dir, &definition, &recipe::dockerfile(package))
                        .map_err(|source| ResolveError::Materialize {
                            server: reference.name.clone(),
                            path: context_dir.clone(),
                            source,
                        })?;
                    tracing::debug!(
                        server = %reference.name,
                        context = %context_dir.display(),
                        "materialized build context"
                    );

                    pending.push(PendingBuild {
                        server_name: reference.name.clone(),
                        context_dir,
                        image: peer_image_name(&manifest.name, &reference.name),
                    });
                    descriptors.push(ServerDescriptor {
                        name: reference.name.clone(),
                        kind: DescriptorKind::Command,
                        url: peer_url(&reference.name),
                        headers: Default::default(),
                    });
                    servers.push(McpServerRef::Command(CommandServer {
                        name: reference.name.clone(),
                        build: Some(format!("{REGISTRY_DIR}/{segment}")),
                        ..Default::default()
                    }));
                }
            }
        }

        resolved.mcp_servers = servers;
        resolved.sort_references();
        debug_assert!(!resolved.has_registry_servers());
        Ok((resolved, pending, descriptors))
    }

    async fn fetch(&self, reference: &RegistryServerRef) -> Result<ServerDefinition, ResolveError> {
        let lookup_error = |source| ResolveError::Lookup {
            server: reference.name.clone(),
            registry_name: reference.registry_server_name.clone(),
            version: reference.version().to_string(),
            source,
        };
        let registry =
            client_for(&self.registry, reference.registry_url.as_deref()).map_err(lookup_error)?;
        registry
            .get_server(&reference.registry_server_name, reference.version())
            .await
            .map_err(lookup_error)
    }
}

fn materialize(
    context_dir: &Path,
    definition: &ServerDefinition,
    dockerfile: &str,
) -> std::io::Result<()> {
    if context_dir.exists() {
        std::fs::remove_dir_all(context_dir)?;
    }
    std::fs::create_dir_all(context_dir)?;
    std::fs::write(context_dir.join("Dockerfile"), dockerfile)?;
    let payload = serde_json::to_vec_pretty(definition)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    std::fs::write(context_dir.join("server.json"), payload)?;
    Ok(())
}

/// Best-effort removal of build contexts from a failed resolution.
fn discard(paths: &[PathBuf]) {
    for path in paths {
        if let Err(e) = std::fs::remove_dir_all(path)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!(path = %path.display(), error = %e, "failed to clean up build context");
        }
    }
}
