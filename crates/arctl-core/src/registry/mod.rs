//! Registry API consumed by resolution and deployment.
//!
//! The registry service itself is external; this module only defines the
//! calls this crate makes and an HTTP implementation of them.

pub mod client;
pub mod schema;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::deploy::{DeploymentRecord, DeploymentRequest, DeploymentUpdate};
use crate::manifest::Manifest;
use crate::types::ResourceType;

pub use client::HttpRegistryClient;
pub use schema::{
    EnvironmentVariable, Package, PackageRegistry, PackageTransport, RemoteEndpoint,
    ResolvedTransport, ServerDefinition,
};

/// Transport errors and non-success statuses, with the underlying message.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("{kind} '{name}@{version}' not found in registry")]
    NotFound {
        kind: ResourceType,
        name: String,
        version: String,
    },

    #[error("deployment '{id}' not found in registry")]
    DeploymentNotFound { id: String },

    #[error("registry returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("registry request failed: {message}")]
    Transport { message: String },

    #[error("invalid registry response: {message}")]
    Decode { message: String },

    #[error("invalid registry URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },
}

#[async_trait]
pub trait RegistryApi: Send + Sync {
    /// Base URL this client talks to.
    fn base_url(&self) -> &str;

    /// A client for another registry, used by references that name one.
    fn at(&self, registry_url: &str) -> Result<Arc<dyn RegistryApi>, RegistryError>;

    async fn get_server(&self, name: &str, version: &str)
    -> Result<ServerDefinition, RegistryError>;

    async fn get_agent(&self, name: &str, version: &str) -> Result<Manifest, RegistryError>;

    async fn create_deployment(
        &self,
        request: &DeploymentRequest,
    ) -> Result<DeploymentRecord, RegistryError>;

    async fn update_deployment(
        &self,
        id: &str,
        update: &DeploymentUpdate,
    ) -> Result<DeploymentRecord, RegistryError>;

    async fn list_deployments(&self) -> Result<Vec<DeploymentRecord>, RegistryError>;

    async fn delete_deployment(&self, id: &str) -> Result<(), RegistryError>;

    async fn get_deployed_server(
        &self,
        name: &str,
        version: &str,
    ) -> Result<Option<DeploymentRecord>, RegistryError>;
}

/// Pick the client for an optional per-reference registry URL.
pub fn client_for(
    default: &Arc<dyn RegistryApi>,
    registry_url: Option<&str>,
) -> Result<Arc<dyn RegistryApi>, RegistryError> {
    match registry_url {
        Some(url) if url.trim_end_matches('/') != default.base_url().trim_end_matches('/') => {
            default.at(url)
        }
        _ => Ok(Arc::clone(default)),
    }
}
