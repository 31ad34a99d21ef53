//! arctl Core Library
//!
//! Turns a declarative agent / MCP server manifest into a running,
//! health-verified workload, either on the local container runtime or
//! through a remote provider reached via the registry API.

pub mod build;
pub mod commands;
pub mod config;
pub mod context;
pub mod deploy;
pub mod manifest;
pub mod process;
pub mod registry;
pub mod resolve;
pub mod runtime;
pub mod topology;
pub mod types;

/// Re-exports of commonly used types
pub mod prelude {
    // Configuration
    pub use crate::config::{ArctlConfig, ConfigStore, EnvSnapshot};
    pub use crate::context::AppContext;

    // Manifest
    pub use crate::manifest::{
        CommandServer, Manifest, McpServerRef, RegistryServerRef, RemoteServer, SkillRef,
        SkillSource, ValidationError,
    };

    // Registry
    pub use crate::registry::{HttpRegistryClient, RegistryApi, RegistryError, ServerDefinition};

    // Pipeline
    pub use crate::build::{ImageBuildOrchestrator, ImageBuilder};
    pub use crate::resolve::{ReferenceResolver, ResolveOptions, ResolvedManifest};
    pub use crate::runtime::{
        ContainerRuntime, HealthPolicy, HealthProbe, InteractiveSession, LocalRuntimeManager,
        RunState,
    };
    pub use crate::topology::{RenderRequest, Topology, TopologyRenderer};

    // Deployments
    pub use crate::deploy::{
        DeployOutcome, DeployRequest, DeploymentDispatcher, DeploymentRecord, DeploymentStatus,
        LocalExecutor,
    };

    pub use crate::types::ResourceType;
}
