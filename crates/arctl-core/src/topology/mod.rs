//! Rendering of compose-style topology documents.
//!
//! The rendered document is self-contained: apart from the images it
//! names, nothing outside the returned bytes is referenced. Credentials
//! are passed as `${VAR}` interpolations so secret values never appear in
//! the document.

pub mod sanitize;

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

use crate::build::peer_image_name;
use crate::manifest::{Manifest, McpServerRef};
use crate::resolve::{DescriptorKind, ServerDescriptor};

pub use sanitize::{dns_label, sanitize_version};

/// Port the primary agent serves on inside the topology.
pub const AGENT_PORT: u16 = 8080;
/// Port peer MCP servers listen on inside the topology.
pub const MCP_PEER_PORT: u16 = 3000;
/// Path of the MCP endpoint on a peer service.
pub const MCP_PEER_PATH: &str = "/mcp";
/// Primary service variable listing the peers it can reach, as JSON.
pub const MCP_SERVERS_ENV: &str = "MCP_SERVERS";

#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("MCP server '{server}' is still a registry reference; resolve the manifest first")]
    UnresolvedReference { server: String },

    #[error("MCP server '{server}' maps to service '{service}', which is already taken")]
    ServiceCollision { server: String, service: String },

    #[error("failed to serialize peer list for '{name}': {source}")]
    Descriptors {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize topology for '{name}': {source}")]
    Serialize {
        name: String,
        #[source]
        source: serde_yaml::Error,
    },
}

/// A rendered topology ready to hand to the container runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    pub project_name: String,
    pub primary_service: String,
    pub document: Vec<u8>,
}

impl Topology {
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.document).unwrap_or_default()
    }

    /// A project with no services. Tearing it down with orphan removal
    /// stops everything previously started under `project_name`.
    pub fn detached(project_name: impl Into<String>) -> Result<Self, TopologyError> {
        let compose = ComposeFile {
            name: project_name.into(),
            services: BTreeMap::new(),
        };
        to_topology(compose, String::new())
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ComposeFile {
    pub name: String,
    pub services: BTreeMap<String, ComposeService>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ComposeService {
    pub image: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restart: Option<String>,
}

/// Inputs for rendering an agent topology.
#[derive(Debug, Clone)]
pub struct RenderRequest<'a> {
    /// Resolved manifest; registry references are rejected
    pub manifest: &'a Manifest,
    /// Image of the primary service
    pub image: String,
    pub model_provider: String,
    pub model_name: String,
    /// Extra environment for the primary service
    pub env: BTreeMap<String, String>,
    /// Host port the primary service is published on
    pub host_port: u16,
    /// Compose project name; derived from name and version when unset
    pub project: Option<String>,
}

impl<'a> RenderRequest<'a> {
    /// Request using the manifest's own image and model selection.
    pub fn for_manifest(manifest: &'a Manifest, host_port: u16) -> Self {
        Self {
            manifest,
            image: primary_image(manifest),
            model_provider: manifest.model_provider.clone(),
            model_name: manifest.model_name.clone(),
            env: BTreeMap::new(),
            host_port,
            project: None,
        }
    }
}

/// Explicit manifest image, or `<name>:<sanitized version>`.
pub fn primary_image(manifest: &Manifest) -> String {
    match &manifest.image {
        Some(image) if !image.is_empty() => image.clone(),
        _ => format!(
            "{}:{}",
            dns_label(&manifest.name),
            sanitize_version(manifest.version())
        ),
    }
}

/// Compose project name for a resource version.
pub fn project_name(name: &str, version: &str) -> String {
    dns_label(&format!("arctl-{}-{}", name, sanitize_version(version)))
}

/// URL a peer MCP service is reachable at from inside the topology.
pub fn peer_url(server_name: &str) -> String {
    format!(
        "http://{}:{}{}",
        dns_label(server_name),
        MCP_PEER_PORT,
        MCP_PEER_PATH
    )
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TopologyRenderer;

impl TopologyRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Render the primary agent plus one service per containerised peer.
    pub fn render(&self, request: &RenderRequest<'_>) -> Result<Topology, TopologyError> {
        let manifest = request.manifest;
        let primary = dns_label(&manifest.name);
        let mut services = BTreeMap::new();
        let mut depends_on = Vec::new();
        let mut peers = Vec::new();

        for server in &manifest.mcp_servers {
            match server {
                McpServerRef::Registry(r) => {
                    return Err(TopologyError::UnresolvedReference {
                        server: r.name.clone(),
                    });
                }
                McpServerRef::Remote(remote) => peers.push(ServerDescriptor {
                    name: remote.name.clone(),
                    kind: DescriptorKind::Remote,
                    url: remote.url.clone(),
                    headers: remote.headers.clone(),
                }),
                McpServerRef::Command(cmd) => {
                    let image = match (&cmd.image, &cmd.build) {
                        (Some(image), _) => image.clone(),
                        (None, Some(_)) => peer_image_name(&manifest.name, &cmd.name),
                        // Plain commands run inside the agent's own container.
                        (None, None) => continue,
                    };
                    let service_name = dns_label(&cmd.name);
                    if service_name == primary || services.contains_key(&service_name) {
                        return Err(TopologyError::ServiceCollision {
                            server: cmd.name.clone(),
                            service: service_name,
                        });
                    }
                    let mut service = ComposeService {
                        image,
                        command: cmd.command.iter().chain(&cmd.args).cloned().collect(),
                        environment: cmd.env.clone(),
                        restart: Some("unless-stopped".to_string()),
                        ..Default::default()
                    };
                    service
                        .environment
                        .entry("PORT".to_string())
                        .or_insert_with(|| MCP_PEER_PORT.to_string());
                    peers.push(ServerDescriptor {
                        name: cmd.name.clone(),
                        kind: DescriptorKind::Command,
                        url: peer_url(&cmd.name),
                        headers: BTreeMap::new(),
                    });
                    depends_on.push(service_name.clone());
                    services.insert(service_name, service);
                }
            }
        }

        let mut environment = BTreeMap::new();
        environment.insert("AGENT_NAME".to_string(), manifest.name.clone());
        environment.insert("AGENT_VERSION".to_string(), manifest.version().to_string());
        environment.insert("PORT".to_string(), AGENT_PORT.to_string());
        if !request.model_provider.is_empty() {
            environment.insert(
                "MODEL_PROVIDER".to_string(),
                request.model_provider.clone(),
            );
        }
        if !request.model_name.is_empty() {
            environment.insert("MODEL_NAME".to_string(), request.model_name.clone());
        }
        if let Some(var) = crate::manifest::provider_credential(&request.model_provider) {
            environment.insert(var.to_string(), format!("${{{var}}}"));
        }
        if let Some(endpoint) = &manifest.telemetry_endpoint {
            environment.insert(
                "OTEL_EXPORTER_OTLP_ENDPOINT".to_string(),
                endpoint.clone(),
            );
        }
        if !peers.is_empty() {
            let json = serde_json::to_string(&peers).map_err(|source| {
                TopologyError::Descriptors {
                    name: manifest.name.clone(),
                    source,
                }
            })?;
            // `$$` keeps compose from interpolating literal header values.
            environment.insert(MCP_SERVERS_ENV.to_string(), json.replace('$', "$$"));
        }
        environment.extend(request.env.clone());

        services.insert(
            primary.clone(),
            ComposeService {
                image: request.image.clone(),
                environment,
                ports: vec![format!("{}:{}", request.host_port, AGENT_PORT)],
                depends_on,
                ..Default::default()
            },
        );

        let compose = ComposeFile {
            name: request
                .project
                .clone()
                .unwrap_or_else(|| project_name(&manifest.name, manifest.version())),
            services,
        };
        to_topology(compose, primary)
    }

    /// Render a single MCP server as its own topology.
    pub fn render_server(
        &self,
        name: &str,
        version: &str,
        image: &str,
        env: &BTreeMap<String, String>,
        host_port: u16,
    ) -> Result<Topology, TopologyError> {
        let service_name = dns_label(name);
        let mut environment = env.clone();
        environment
            .entry("PORT".to_string())
            .or_insert_with(|| MCP_PEER_PORT.to_string());

        let mut services = BTreeMap::new();
        services.insert(
            service_name.clone(),
            ComposeService {
                image: image.to_string(),
                environment,
                ports: vec![format!("{}:{}", host_port, MCP_PEER_PORT)],
                restart: Some("unless-stopped".to_string()),
                ..Default::default()
            },
        );

        let compose = ComposeFile {
            name: project_name(name, version),
            services,
        };
        to_topology(compose, service_name)
    }
}

fn to_topology(compose: ComposeFile, primary_service: String) -> Result<Topology, TopologyError> {
    let document = serde_yaml::to_string(&compose).map_err(|source| TopologyError::Serialize {
        name: compose.name.clone(),
        source,
    })?;
    Ok(Topology {
        project_name: compose.name,
        primary_service,
        document: document.into_bytes(),
    })
}
