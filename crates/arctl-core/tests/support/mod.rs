//! In-memory fakes for the external collaborators.
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use arctl_core::build::{BuildOutput, ImageBuilder};
use arctl_core::deploy::{
    DeploymentRecord, DeploymentRequest, DeploymentStatus, DeploymentUpdate, LocalExecutor,
    LocalTarget, Origin,
};
use arctl_core::manifest::Manifest;
use arctl_core::process::ProcessError;
use arctl_core::registry::schema::PackageTransportSpec;
use arctl_core::registry::{
    Package, PackageRegistry, RegistryApi, RegistryError, RemoteEndpoint, ServerDefinition,
};
use arctl_core::runtime::{ContainerRuntime, HealthProbe, InteractiveSession};
use arctl_core::topology::Topology;
use arctl_core::types::ResourceType;
use async_trait::async_trait;
use chrono::Utc;
use tokio_util::sync::CancellationToken;

pub const REGISTRY_URL: &str = "http://registry.test";

pub fn npm_server(name: &str, version: &str) -> ServerDefinition {
    ServerDefinition {
        name: name.to_string(),
        description: String::new(),
        version: version.to_string(),
        packages: vec![Package {
            registry_type: PackageRegistry::Npm,
            identifier: format!("@example/{name}"),
            version: Some(version.to_string()),
            runtime_hint: None,
            transport: PackageTransportSpec::default(),
            package_arguments: Vec::new(),
            environment_variables: Vec::new(),
        }],
        remotes: Vec::new(),
    }
}

pub fn remote_server(name: &str, version: &str, url: &str) -> ServerDefinition {
    ServerDefinition {
        name: name.to_string(),
        description: String::new(),
        version: version.to_string(),
        packages: Vec::new(),
        remotes: vec![RemoteEndpoint {
            kind: "streamable-http".to_string(),
            url: url.to_string(),
            headers: BTreeMap::new(),
        }],
    }
}

#[derive(Default)]
pub struct FakeRegistry {
    servers: Mutex<BTreeMap<(String, String), ServerDefinition>>,
    agents: Mutex<BTreeMap<(String, String), Manifest>>,
    deployments: Mutex<Vec<DeploymentRecord>>,
    calls: Mutex<Vec<String>>,
    next_id: AtomicU32,
}

impl FakeRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_server(&self, server: ServerDefinition) {
        self.servers
            .lock()
            .unwrap()
            .insert((server.name.clone(), server.version.clone()), server);
    }

    pub fn add_agent(&self, agent: Manifest) {
        let key = (agent.name.clone(), agent.version().to_string());
        self.agents.lock().unwrap().insert(key, agent);
    }

    pub fn add_deployment(&self, record: DeploymentRecord) {
        self.deployments.lock().unwrap().push(record);
    }

    pub fn deployments(&self) -> Vec<DeploymentRecord> {
        self.deployments.lock().unwrap().clone()
    }

    /// Calls made so far, as `method name`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record_call(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

pub fn record(id: &str, name: &str, version: &str, provider_id: &str) -> DeploymentRecord {
    let now = Utc::now();
    DeploymentRecord {
        id: id.to_string(),
        resource_name: name.to_string(),
        version: version.to_string(),
        resource_type: ResourceType::Agent,
        provider_id: provider_id.to_string(),
        status: DeploymentStatus::Deployed,
        origin: Origin::Managed,
        cloud_metadata: BTreeMap::new(),
        env: BTreeMap::new(),
        provider_config: BTreeMap::new(),
        prefer_remote: false,
        actor: None,
        error: None,
        created_at: now,
        updated_at: now,
    }
}

#[async_trait]
impl RegistryApi for FakeRegistry {
    fn base_url(&self) -> &str {
        REGISTRY_URL
    }

    fn at(&self, registry_url: &str) -> Result<Arc<dyn RegistryApi>, RegistryError> {
        Err(RegistryError::InvalidUrl {
            url: registry_url.to_string(),
            message: "unknown registry".to_string(),
        })
    }

    async fn get_server(
        &self,
        name: &str,
        version: &str,
    ) -> Result<ServerDefinition, RegistryError> {
        self.record_call(format!("get_server {name}"));
        let servers = self.servers.lock().unwrap();
        let found = if version == "latest" {
            servers
                .iter()
                .rev()
                .find(|((n, _), _)| n == name)
                .map(|(_, s)| s.clone())
        } else {
            servers.get(&(name.to_string(), version.to_string())).cloned()
        };
        found.ok_or_else(|| RegistryError::NotFound {
            kind: ResourceType::Mcp,
            name: name.to_string(),
            version: version.to_string(),
        })
    }

    async fn get_agent(&self, name: &str, version: &str) -> Result<Manifest, RegistryError> {
        self.record_call(format!("get_agent {name}"));
        self.agents
            .lock()
            .unwrap()
            .get(&(name.to_string(), version.to_string()))
            .cloned()
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
        self.record_call(format!("create_deployment {}", request.resource_name));
        let id = format!("dep-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let mut created = record(
            &id,
            &request.resource_name,
            &request.version,
            &request.provider_id,
        );
        created.resource_type = request.resource_type;
        created.status = DeploymentStatus::Deploying;
        created.env = request.env.clone();
        created.provider_config = request.provider_config.clone();
        created.prefer_remote = request.prefer_remote;
        created.actor = request.actor.clone();
        self.deployments.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn update_deployment(
        &self,
        id: &str,
        update: &DeploymentUpdate,
    ) -> Result<DeploymentRecord, RegistryError> {
        self.record_call(format!("update_deployment {id} {}", update.status));
        let mut deployments = self.deployments.lock().unwrap();
        let record = deployments
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| RegistryError::DeploymentNotFound { id: id.to_string() })?;
        record.status = update.status;
        record.error = update.error.clone();
        if let Some(env) = &update.env {
            record.env = env.clone();
        }
        record.updated_at = Utc::now();
        Ok(record.clone())
    }

    async fn list_deployments(&self) -> Result<Vec<DeploymentRecord>, RegistryError> {
        self.record_call("list_deployments".to_string());
        Ok(self.deployments())
    }

    async fn delete_deployment(&self, id: &str) -> Result<(), RegistryError> {
        self.record_call(format!("delete_deployment {id}"));
        let mut deployments = self.deployments.lock().unwrap();
        let before = deployments.len();
        deployments.retain(|r| r.id != id);
        if deployments.len() == before {
            return Err(RegistryError::DeploymentNotFound { id: id.to_string() });
        }
        Ok(())
    }

    async fn get_deployed_server(
        &self,
        name: &str,
        version: &str,
    ) -> Result<Option<DeploymentRecord>, RegistryError> {
        self.record_call(format!("get_deployed_server {name}"));
        Ok(self.deployments().into_iter().find(|r| {
            r.resource_type == ResourceType::Mcp && r.resource_name == name && r.version == version
        }))
    }
}

/// Records builds; fails for images listed in `fail`.
#[derive(Default)]
pub struct RecordingBuilder {
    builds: Mutex<Vec<(String, PathBuf)>>,
    fail: Mutex<Vec<String>>,
}

impl RecordingBuilder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_on(&self, image: &str) {
        self.fail.lock().unwrap().push(image.to_string());
    }

    pub fn builds(&self) -> Vec<(String, PathBuf)> {
        self.builds.lock().unwrap().clone()
    }

    pub fn images(&self) -> Vec<String> {
        self.builds().into_iter().map(|(image, _)| image).collect()
    }
}

#[async_trait]
impl ImageBuilder for RecordingBuilder {
    async fn build(&self, image: &str, context_dir: &Path) -> Result<BuildOutput, ProcessError> {
        self.builds
            .lock()
            .unwrap()
            .push((image.to_string(), context_dir.to_path_buf()));
        if self.fail.lock().unwrap().iter().any(|f| f == image) {
            return Err(ProcessError::Failed {
                program: "docker".to_string(),
                exit_code: Some(1),
                output: "npm ERR! 404 Not Found".to_string(),
            });
        }
        Ok(BuildOutput {
            log: format!("built {image}"),
        })
    }
}

/// Records runtime calls as `up <project>`, `down <project>`, `logs <project>`.
#[derive(Default)]
pub struct RecordingRuntime {
    calls: Mutex<Vec<String>>,
    documents: Mutex<Vec<Vec<u8>>>,
    pub fail_up: bool,
    pub fail_down: bool,
}

impl RecordingRuntime {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_up() -> Arc<Self> {
        Arc::new(Self {
            fail_up: true,
            ..Self::default()
        })
    }

    pub fn failing_down() -> Arc<Self> {
        Arc::new(Self {
            fail_down: true,
            ..Self::default()
        })
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, action: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.split_whitespace().next() == Some(action))
            .count()
    }

    /// Documents passed to `up`.
    pub fn documents(&self) -> Vec<Vec<u8>> {
        self.documents.lock().unwrap().clone()
    }

    fn failure(&self, output: &str) -> ProcessError {
        ProcessError::Failed {
            program: "docker".to_string(),
            exit_code: Some(1),
            output: output.to_string(),
        }
    }
}

#[async_trait]
impl ContainerRuntime for RecordingRuntime {
    async fn up(&self, topology: &Topology) -> Result<(), ProcessError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("up {}", topology.project_name));
        self.documents.lock().unwrap().push(topology.document.clone());
        if self.fail_up {
            return Err(self.failure("port is already allocated"));
        }
        Ok(())
    }

    async fn down(&self, topology: &Topology) -> Result<(), ProcessError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("down {}", topology.project_name));
        if self.fail_down {
            return Err(self.failure("daemon not running"));
        }
        Ok(())
    }

    async fn logs(&self, topology: &Topology, tail: usize) -> Result<String, ProcessError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("logs {}", topology.project_name));
        Ok(format!(
            "{} | Traceback: missing module (last {tail} lines)",
            topology.primary_service
        ))
    }
}

/// Healthy from the `healthy_from`-th check on; never healthy when 0.
pub struct ScriptedProbe {
    healthy_from: u32,
    checks: AtomicU32,
}

impl ScriptedProbe {
    pub fn healthy_from(n: u32) -> Arc<Self> {
        Arc::new(Self {
            healthy_from: n,
            checks: AtomicU32::new(0),
        })
    }

    pub fn never() -> Arc<Self> {
        Self::healthy_from(0)
    }

    pub fn checks(&self) -> u32 {
        self.checks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HealthProbe for ScriptedProbe {
    async fn check(&self) -> bool {
        let n = self.checks.fetch_add(1, Ordering::SeqCst) + 1;
        self.healthy_from != 0 && n >= self.healthy_from
    }
}

/// Session that records its endpoint and returns a scripted outcome.
#[derive(Default)]
pub struct RecordingSession {
    endpoints: Mutex<Vec<String>>,
    pub fail: bool,
}

impl RecordingSession {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn runs(&self) -> Vec<String> {
        self.endpoints.lock().unwrap().clone()
    }
}

#[async_trait]
impl InteractiveSession for RecordingSession {
    async fn run(&self, endpoint: &str, _cancel: &CancellationToken) -> anyhow::Result<()> {
        self.endpoints.lock().unwrap().push(endpoint.to_string());
        anyhow::ensure!(!self.fail, "connection reset by peer");
        Ok(())
    }
}

/// Local executor that records launches and teardowns.
#[derive(Default)]
pub struct RecordingExecutor {
    launched: Mutex<Vec<String>>,
    torn_down: Mutex<Vec<String>>,
    pub fail_launch: bool,
    pub fail_teardown: bool,
}

impl RecordingExecutor {
    pub fn failing_launch() -> Self {
        Self {
            fail_launch: true,
            ..Self::default()
        }
    }

    pub fn failing_teardown() -> Self {
        Self {
            fail_teardown: true,
            ..Self::default()
        }
    }

    pub fn launched(&self) -> Vec<String> {
        self.launched.lock().unwrap().clone()
    }

    pub fn torn_down(&self) -> Vec<String> {
        self.torn_down.lock().unwrap().clone()
    }
}

#[async_trait]
impl LocalExecutor for RecordingExecutor {
    async fn launch(&self, target: &LocalTarget) -> anyhow::Result<()> {
        self.launched
            .lock()
            .unwrap()
            .push(format!("{}@{}", target.resource_name, target.version));
        anyhow::ensure!(!self.fail_launch, "did not become healthy");
        Ok(())
    }

    async fn teardown(&self, record: &DeploymentRecord) -> anyhow::Result<()> {
        self.torn_down.lock().unwrap().push(record.id.clone());
        anyhow::ensure!(!self.fail_teardown, "daemon not running");
        Ok(())
    }
}
