//! HTTP client for the registry API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use url::Url;

use super::schema::{AgentResponse, DeploymentListResponse, ServerResponse};
use super::{RegistryApi, RegistryError, ServerDefinition};
use crate::deploy::{DeploymentRecord, DeploymentRequest, DeploymentUpdate};
use crate::manifest::Manifest;
use crate::types::ResourceType;

const USER_AGENT: &str = concat!("arctl/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct HttpRegistryClient {
    client: reqwest::Client,
    base_url: Url,
    base: String,
}

impl HttpRegistryClient {
    pub fn new(base_url: &str) -> Result<Self, RegistryError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| RegistryError::Transport {
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Self::with_client(client, base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Result<Self, RegistryError> {
        let parsed = Url::parse(base_url).map_err(|e| RegistryError::InvalidUrl {
            url: base_url.to_string(),
            message: e.to_string(),
        })?;
        if parsed.cannot_be_a_base() {
            return Err(RegistryError::InvalidUrl {
                url: base_url.to_string(),
                message: "URL cannot be used as a base".to_string(),
            });
        }
        Ok(Self {
            client,
            base_url: parsed,
            base: base_url.to_string(),
        })
    }

    /// Build `<base>/v0/<segments...>`, percent-encoding each segment so
    /// names such as `io.github.org/weather` stay a single path segment.
    pub fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().push("v0");
            for segment in segments {
                path.push(segment);
            }
        }
        url
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<Option<T>, RegistryError> {
        tracing::debug!(%url, "registry GET");
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(transport_error)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        decode(response).await.map(Some)
    }

    async fn send_json<B: serde::Serialize + Sync, T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        url: Url,
        body: &B,
    ) -> Result<Option<T>, RegistryError> {
        tracing::debug!(%url, %method, "registry request");
        let response = self
            .client
            .request(method, url)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        decode(response).await.map(Some)
    }
}

fn transport_error(err: reqwest::Error) -> RegistryError {
    RegistryError::Transport {
        message: err.to_string(),
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, RegistryError> {
    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(RegistryError::Status {
            status: status.as_u16(),
            message: message.trim().to_string(),
        });
    }
    let bytes = response.bytes().await.map_err(transport_error)?;
    serde_json::from_slice(&bytes).map_err(|e| RegistryError::Decode {
        message: e.to_string(),
    })
}

#[async_trait]
impl RegistryApi for HttpRegistryClient {
    fn base_url(&self) -> &str {
        &self.base
    }

    fn at(&self, registry_url: &str) -> Result<Arc<dyn RegistryApi>, RegistryError> {
        Ok(Arc::new(Self::with_client(
            self.client.clone(),
            registry_url,
        )?))
    }

    async fn get_server(
        &self,
        name: &str,
        version: &str,
    ) -> Result<ServerDefinition, RegistryError> {
        let url = self.endpoint(&["servers", name, "versions", version]);
        self.get_json::<ServerResponse>(url)
            .await?
            .map(|r| r.server)
            .ok_or_else(|| RegistryError::NotFound {
                kind: ResourceType::Mcp,
                name: name.to_string(),
                version: version.to_string(),
            })
    }

    async fn get_agent(&self, name: &str, version: &str) -> Result<Manifest, RegistryError> {
        let url = self.endpoint(&["agents", name, "versions", version]);
        self.get_json::<AgentResponse>(url)
            .await?
            .map(|r| r.agent)
            .ok_or_else(|| RegistryError::NotFound {
                kind: ResourceType::Agent,
                name: name.to_string(),
                version: version.to_string(),
            })
    }

    async fn create_deployment(
        &self,
        request: &DeploymentRequest,
    ) -> Result<DeploymentRecord, RegistryError> {
        let url = self.endpoint(&["deployments"]);
        self.send_json(reqwest::Method::POST, url, request)
            .await?
            .ok_or_else(|| RegistryError::Status {
                status: StatusCode::NOT_FOUND.as_u16(),
                message: "deployments endpoint not available".to_string(),
            })
    }

    async fn update_deployment(
        &self,
        id: &str,
        update: &DeploymentUpdate,
    ) -> Result<DeploymentRecord, RegistryError> {
        let url = self.endpoint(&["deployments", id]);
        self.send_json(reqwest::Method::PUT, url, update)
            .await?
            .ok_or_else(|| RegistryError::DeploymentNotFound { id: id.to_string() })
    }

    async fn list_deployments(&self) -> Result<Vec<DeploymentRecord>, RegistryError> {
        let url = self.endpoint(&["deployments"]);
        Ok(self
            .get_json::<DeploymentListResponse>(url)
            .await?
            .map(|r| r.deployments)
            .unwrap_or_default())
    }

    async fn delete_deployment(&self, id: &str) -> Result<(), RegistryError> {
        let url = self.endpoint(&["deployments", id]);
        tracing::debug!(%url, "registry DELETE");
        let response = self
            .client
            .delete(url)
            .send()
            .await
            .map_err(transport_error)?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(RegistryError::DeploymentNotFound { id: id.to_string() });
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RegistryError::Status {
                status: status.as_u16(),
                message: message.trim().to_string(),
            });
        }
        Ok(())
    }

    async fn get_deployed_server(
        &self,
        name: &str,
        version: &str,
    ) -> Result<Option<DeploymentRecord>, RegistryError> {
        let url = self.endpoint(&["deployments", "servers", name, "versions", version]);
        self.get_json(url).await
    }
}
