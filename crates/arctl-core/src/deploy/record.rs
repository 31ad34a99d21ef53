//! Provider-agnostic deployment records as stored by the registry.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::ResourceType;

/// Provider id meaning "run on this machine".
pub const LOCAL_PROVIDER: &str = "local";

/// True when a provider id selects local execution.
pub fn is_local_provider(provider_id: &str) -> bool {
    provider_id.is_empty() || provider_id.eq_ignore_ascii_case(LOCAL_PROVIDER)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    Deploying,
    Deployed,
    Failed,
    Cancelled,
    /// Found running without having been created by this tool
    Discovered,
}

impl DeploymentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DeploymentStatus::Deployed | DeploymentStatus::Failed | DeploymentStatus::Cancelled
        )
    }

    /// Deploying moves once to a terminal status. A redeploy of an existing
    /// record starts a new attempt from any terminal status.
    pub fn can_transition_to(&self, next: DeploymentStatus) -> bool {
        use DeploymentStatus::*;
        match (self, next) {
            (Deploying, Deployed | Failed | Cancelled) => true,
            (Deployed | Failed | Cancelled, Deploying) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DeploymentStatus::Deploying => "deploying",
            DeploymentStatus::Deployed => "deployed",
            DeploymentStatus::Failed => "failed",
            DeploymentStatus::Cancelled => "cancelled",
            DeploymentStatus::Discovered => "discovered",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    #[default]
    Managed,
    Discovered,
}

/// Durable deployment record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    pub id: String,
    pub resource_name: String,
    pub version: String,
    pub resource_type: ResourceType,
    /// Empty or `local` means local execution
    #[serde(default)]
    pub provider_id: String,
    pub status: DeploymentStatus,
    #[serde(default)]
    pub origin: Origin,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub cloud_metadata: BTreeMap<String, serde_json::Value>,
    /// Environment actually injected into the workload
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub provider_config: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub prefer_remote: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DeploymentRecord {
    pub fn is_local(&self) -> bool {
        is_local_provider(&self.provider_id)
    }

    pub fn is_managed(&self) -> bool {
        self.origin == Origin::Managed
    }

    pub fn namespace(&self) -> Option<&str> {
        self.provider_config
            .get("namespace")
            .and_then(|v| v.as_str())
    }

    /// Whether this record describes the same logical deployment target.
    pub fn matches(
        &self,
        name: &str,
        version: &str,
        resource_type: ResourceType,
        provider_id: &str,
    ) -> bool {
        self.resource_name == name
            && self.version == version
            && self.resource_type == resource_type
            && (self.provider_id == provider_id
                || (self.is_local() && is_local_provider(provider_id)))
    }
}

/// Body of a create-deployment call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRequest {
    pub resource_name: String,
    pub version: String,
    pub resource_type: ResourceType,
    pub provider_id: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub provider_config: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub prefer_remote: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
}

/// Body of an update-deployment call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentUpdate {
    pub status: DeploymentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<BTreeMap<String, String>>,
}
