//! Wire types for server definitions served by the registry.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A published MCP server version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub packages: Vec<Package>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remotes: Vec<RemoteEndpoint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageRegistry {
    Npm,
    Pypi,
    Oci,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PackageTransport {
    #[default]
    Stdio,
    StreamableHttp,
    Sse,
}

/// An installable distribution of a server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    pub registry_type: PackageRegistry,
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_hint: Option<String>,
    #[serde(default)]
    pub transport: PackageTransportSpec,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub package_arguments: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub environment_variables: Vec<EnvironmentVariable>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PackageTransportSpec {
    #[serde(rename = "type", default)]
    pub kind: PackageTransport,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentVariable {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

/// A hosted endpoint for a server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteEndpoint {
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

/// How a server definition should be run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResolvedTransport<'a> {
    Remote(&'a RemoteEndpoint),
    Package(&'a Package),
}

impl ServerDefinition {
    /// Pick the runnable form of this server.
    ///
    /// Remotes win when preferred; otherwise the first package is used and
    /// remotes are the fallback. `None` when the definition has neither.
    pub fn resolve_transport(&self, prefer_remote: bool) -> Option<ResolvedTransport<'_>> {
        if prefer_remote && let Some(remote) = self.remotes.first() {
            return Some(ResolvedTransport::Remote(remote));
        }
        if let Some(package) = self.packages.first() {
            return Some(ResolvedTransport::Package(package));
        }
        self.remotes.first().map(ResolvedTransport::Remote)
    }
}

impl Package {
    pub fn version(&self) -> &str {
        self.version.as_deref().unwrap_or(crate::manifest::DEFAULT_VERSION)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ServerResponse {
    pub server: ServerDefinition,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AgentResponse {
    pub agent: crate::manifest::Manifest,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct DeploymentListResponse {
    #[serde(default)]
    pub deployments: Vec<crate::deploy::DeploymentRecord>,
}
