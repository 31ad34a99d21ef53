//! Deployment dispatch.
//!
//! A deploy creates (or reuses) a deployment record in the registry, then
//! either runs the resource on this machine through a [`LocalExecutor`] or
//! leaves the record for the registry service to hand to an external
//! provider. Credentials for the selected model provider are checked before
//! anything else happens.

pub mod record;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::EnvSnapshot;
use crate::manifest::provider_credential;
use crate::registry::{RegistryApi, RegistryError};
use crate::types::ResourceType;

pub use record::{
    DeploymentRecord, DeploymentRequest, DeploymentStatus, DeploymentUpdate, LOCAL_PROVIDER,
    Origin, is_local_provider,
};

#[derive(Debug, Error)]
pub enum DeployError {
    #[error(
        "model provider '{provider}' requires {variable} to be set in the environment; no deployment was created"
    )]
    MissingCredential {
        provider: String,
        variable: &'static str,
    },

    #[error("failed to look up agent '{name}@{version}' to check its model credentials: {source}")]
    AgentLookup {
        name: String,
        version: String,
        #[source]
        source: RegistryError,
    },

    #[error("failed to {operation} deployment for '{name}': {source}")]
    Registry {
        operation: &'static str,
        name: String,
        #[source]
        source: RegistryError,
    },

    #[error("local deployment of '{name}@{version}' failed: {message}")]
    Local {
        name: String,
        version: String,
        message: String,
    },

    #[error("deployment '{id}' is {status} and cannot be redeployed")]
    InvalidTransition {
        id: String,
        status: DeploymentStatus,
    },

    #[error("deployment '{id}' not found")]
    NotFound { id: String },
}

/// What to deploy and where.
#[derive(Debug, Clone)]
pub struct DeployRequest {
    pub resource_name: String,
    pub version: String,
    pub resource_type: ResourceType,
    /// Environment injected into the workload
    pub env: BTreeMap<String, String>,
    /// Empty or `local` runs on this machine
    pub provider_id: String,
    pub namespace: Option<String>,
    /// Model provider whose credential must be present; for agents the
    /// published manifest's provider is used when unset
    pub model_provider: Option<String>,
    pub prefer_remote: bool,
    pub actor: Option<String>,
}

impl DeployRequest {
    pub fn new(
        resource_name: impl Into<String>,
        version: impl Into<String>,
        resource_type: ResourceType,
    ) -> Self {
        Self {
            resource_name: resource_name.into(),
            version: version.into(),
            resource_type,
            env: BTreeMap::new(),
            provider_id: LOCAL_PROVIDER.to_string(),
            namespace: None,
            model_provider: None,
            prefer_remote: false,
            actor: None,
        }
    }

    pub fn is_local(&self) -> bool {
        is_local_provider(&self.provider_id)
    }

    fn provider_id(&self) -> &str {
        if self.is_local() {
            LOCAL_PROVIDER
        } else {
            &self.provider_id
        }
    }

    fn to_registry_request(&self) -> DeploymentRequest {
        let mut provider_config = BTreeMap::new();
        if let Some(namespace) = &self.namespace {
            provider_config.insert(
                "namespace".to_string(),
                serde_json::Value::String(namespace.clone()),
            );
        }
        DeploymentRequest {
            resource_name: self.resource_name.clone(),
            version: self.version.clone(),
            resource_type: self.resource_type,
            provider_id: self.provider_id().to_string(),
            env: self.env.clone(),
            provider_config,
            prefer_remote: self.prefer_remote,
            actor: self.actor.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployOutcome {
    Local {
        resource_name: String,
        version: String,
        deployment_id: String,
    },
    Remote {
        provider_id: String,
        namespace: Option<String>,
        deployment_id: String,
    },
}

impl DeployOutcome {
    pub fn deployment_id(&self) -> &str {
        match self {
            DeployOutcome::Local { deployment_id, .. }
            | DeployOutcome::Remote { deployment_id, .. } => deployment_id,
        }
    }
}

/// A resource to run on this machine.
#[derive(Debug, Clone)]
pub struct LocalTarget {
    pub deployment_id: String,
    pub resource_name: String,
    pub version: String,
    pub resource_type: ResourceType,
    pub env: BTreeMap<String, String>,
    pub prefer_remote: bool,
}

/// Runs and stops local deployments.
#[async_trait]
pub trait LocalExecutor: Send + Sync {
    /// Start the target and return once it is running.
    async fn launch(&self, target: &LocalTarget) -> anyhow::Result<()>;

    /// Stop whatever `launch` started for this record.
    async fn teardown(&self, record: &DeploymentRecord) -> anyhow::Result<()>;
}

#[derive(Debug, Clone)]
pub struct RemoveReport {
    pub record: DeploymentRecord,
    pub warnings: Vec<String>,
}

pub struct DeploymentDispatcher {
    registry: Arc<dyn RegistryApi>,
    local: Arc<dyn LocalExecutor>,
    env: EnvSnapshot,
}

impl DeploymentDispatcher {
    pub fn new(
        registry: Arc<dyn RegistryApi>,
        local: Arc<dyn LocalExecutor>,
        env: EnvSnapshot,
    ) -> Self {
        Self {
            registry,
            local,
            env,
        }
    }

    /// Fails when `provider` needs a credential that is not set.
    pub fn check_credentials(&self, provider: &str) -> Result<(), DeployError> {
        match provider_credential(provider) {
            Some(variable) if !self.env.contains(variable) => Err(DeployError::MissingCredential {
                provider: provider.to_string(),
                variable,
            }),
            _ => Ok(()),
        }
    }

    /// The request's model provider, or the one the published agent declares.
    async fn model_provider(&self, request: &DeployRequest) -> Result<Option<String>, DeployError> {
        if let Some(provider) = &request.model_provider {
            return Ok(Some(provider.clone()));
        }
        if request.resource_type != ResourceType::Agent {
            return Ok(None);
        }
        let agent = self
            .registry
            .get_agent(&request.resource_name, &request.version)
            .await
            .map_err(|source| DeployError::AgentLookup {
                name: request.resource_name.clone(),
                version: request.version.clone(),
                source,
            })?;
        Ok(Some(agent.model_provider).filter(|p| !p.is_empty()))
    }

    pub async fn deploy(&self, request: &DeployRequest) -> Result<DeployOutcome, DeployError> {
        if let Some(provider) = self.model_provider(request).await? {
            self.check_credentials(&provider)?;
        }

        let record = self.open_record(request).await?;
        tracing::info!(
            id = %record.id,
            name = %request.resource_name,
            version = %request.version,
            provider = %request.provider_id(),
            "deployment record ready"
        );

        if !request.is_local() {
            return Ok(DeployOutcome::Remote {
                provider_id: record.provider_id.clone(),
                namespace: record.namespace().map(str::to_string),
                deployment_id: record.id,
            });
        }

        let target = LocalTarget {
            deployment_id: record.id.clone(),
            resource_name: request.resource_name.clone(),
            version: request.version.clone(),
            resource_type: request.resource_type,
            env: request.env.clone(),
            prefer_remote: request.prefer_remote,
        };

        match self.local.launch(&target).await {
            Ok(()) => {
                self.finish(&record, DeploymentStatus::Deployed, None)
                    .await?;
                Ok(DeployOutcome::Local {
                    resource_name: request.resource_name.clone(),
                    version: request.version.clone(),
                    deployment_id: record.id,
                })
            }
            Err(e) => {
                let message = format!("{e:#}");
                if let Err(update) = self
                    .finish(&record, DeploymentStatus::Failed, Some(message.clone()))
                    .await
                {
                    tracing::warn!(id = %record.id, error = %update, "failed to record deployment failure");
                }
                Err(DeployError::Local {
                    name: request.resource_name.clone(),
                    version: request.version.clone(),
                    message,
                })
            }
        }
    }

    /// Create the record, or restart an existing one for the same target.
    async fn open_record(&self, request: &DeployRequest) -> Result<DeploymentRecord, DeployError> {
        let registry_error = |operation, source| DeployError::Registry {
            operation,
            name: request.resource_name.clone(),
            source,
        };

        let existing = self
            .registry
            .list_deployments()
            .await
            .map_err(|e| registry_error("list", e))?
            .into_iter()
            .find(|r| {
                r.matches(
                    &request.resource_name,
                    &request.version,
                    request.resource_type,
                    request.provider_id(),
                )
            });

        match existing {
            Some(record) => {
                if !record.status.can_transition_to(DeploymentStatus::Deploying) {
                    return Err(DeployError::InvalidTransition {
                        id: record.id,
                        status: record.status,
                    });
                }
                tracing::debug!(id = %record.id, status = %record.status, "redeploying existing record");
                let update = DeploymentUpdate {
                    status: DeploymentStatus::Deploying,
                    error: None,
                    env: Some(request.env.clone()),
                };
                self.registry
                    .update_deployment(&record.id, &update)
                    .await
                    .map_err(|e| registry_error("update", e))
            }
            None => self
                .registry
                .create_deployment(&request.to_registry_request())
                .await
                .map_err(|e| registry_error("create", e)),
        }
    }

    async fn finish(
        &self,
        record: &DeploymentRecord,
        status: DeploymentStatus,
        error: Option<String>,
    ) -> Result<DeploymentRecord, DeployError> {
        let update = DeploymentUpdate {
            status,
            error,
            env: None,
        };
        self.registry
            .update_deployment(&record.id, &update)
            .await
            .map_err(|source| DeployError::Registry {
                operation: "update",
                name: record.resource_name.clone(),
                source,
            })
    }

    pub async fn list(&self) -> Result<Vec<DeploymentRecord>, DeployError> {
        self.registry
            .list_deployments()
            .await
            .map_err(|source| DeployError::Registry {
                operation: "list",
                name: String::new(),
                source,
            })
    }

    /// Current record for a resource version, if deployed.
    pub async fn status(
        &self,
        name: &str,
        version: &str,
        resource_type: ResourceType,
    ) -> Result<Option<DeploymentRecord>, DeployError> {
        let registry_error = |source| DeployError::Registry {
            operation: "look up",
            name: name.to_string(),
            source,
        };
        match resource_type {
            ResourceType::Mcp => self
                .registry
                .get_deployed_server(name, version)
                .await
                .map_err(registry_error),
            ResourceType::Agent => Ok(self
                .registry
                .list_deployments()
                .await
                .map_err(registry_error)?
                .into_iter()
                .find(|r| {
                    r.resource_type == ResourceType::Agent
                        && r.resource_name == name
                        && r.version == version
                })),
        }
    }

    /// Delete the record, then stop any local workload behind it.
    ///
    /// The record goes first so a later sweep over deployments never sees
    /// one whose resources are already gone. Teardown problems are warnings.
    pub async fn remove(&self, id: &str) -> Result<RemoveReport, DeployError> {
        let record = self
            .list()
            .await?
            .into_iter()
            .find(|r| r.id == id)
            .ok_or_else(|| DeployError::NotFound { id: id.to_string() })?;

        self.registry
            .delete_deployment(id)
            .await
            .map_err(|source| match source {
                RegistryError::DeploymentNotFound { .. } => {
                    DeployError::NotFound { id: id.to_string() }
                }
                source => DeployError::Registry {
                    operation: "delete",
                    name: record.resource_name.clone(),
                    source,
                },
            })?;
        tracing::info!(id, name = %record.resource_name, "deployment removed");

        let mut warnings = Vec::new();
        if record.is_local()
            && record.is_managed()
            && let Err(e) = self.local.teardown(&record).await
        {
            let warning = format!(
                "failed to stop local deployment '{}@{}': {e:#}",
                record.resource_name, record.version
            );
            tracing::warn!("{}", warning);
            warnings.push(warning);
        }

        Ok(RemoveReport { record, warnings })
    }
}
