//! Tests for building images of resolved MCP servers.

mod support;

use arctl_core::build::{BuildError, ImageBuildOrchestrator};
use arctl_core::manifest::{Manifest, McpServerRef, RegistryServerRef};
use arctl_core::resolve::{ReferenceResolver, ResolveOptions, ResolvedManifest};
use support::{FakeRegistry, RecordingBuilder, npm_server};
use tempfile::TempDir;

fn dice(servers: &[&str]) -> Manifest {
    let mut manifest = Manifest::new("dice");
    for name in servers {
        manifest.mcp_servers.push(McpServerRef::Registry(RegistryServerRef {
            name: name.to_string(),
            registry_url: None,
            registry_server_name: name.to_string(),
            registry_server_version: Some("1.0.0".to_string()),
            prefer_remote: false,
        }));
    }
    manifest
}

async fn resolve(manifest: &Manifest, workspace: &TempDir) -> ResolvedManifest {
    let registry = FakeRegistry::new();
    for server in &manifest.mcp_servers {
        registry.add_server(npm_server(server.name(), "1.0.0"));
    }
    ReferenceResolver::new(registry)
        .resolve(manifest, workspace.path(), &ResolveOptions::new(workspace.path()))
        .await
        .unwrap()
}

#[tokio::test]
async fn builds_run_in_manifest_order() {
    let workspace = TempDir::new().unwrap();
    let resolved = resolve(&dice(&["files", "weather"]), &workspace).await;
    let builder = RecordingBuilder::new();

    let report = ImageBuildOrchestrator::new(builder.clone())
        .build_all(&resolved)
        .await
        .unwrap();

    assert_eq!(
        builder.images(),
        vec!["dice-files:latest", "dice-weather:latest"]
    );
    assert_eq!(report.built.len(), 2);
    assert_eq!(builder.builds()[1].1, workspace.path().join("registry/weather"));
}

#[tokio::test]
async fn first_failure_stops_remaining_builds() {
    let workspace = TempDir::new().unwrap();
    let resolved = resolve(&dice(&["files", "weather"]), &workspace).await;
    let builder = RecordingBuilder::new();
    builder.fail_on("dice-files:latest");

    let err = ImageBuildOrchestrator::new(builder.clone())
        .build_all(&resolved)
        .await
        .unwrap_err();

    assert!(matches!(&err, BuildError::Server { server, .. } if server == "files"));
    let message = err.to_string();
    assert!(message.contains("'files'"), "{message}");
    assert!(message.contains("npm ERR! 404 Not Found"), "{message}");
    assert_eq!(builder.images(), vec!["dice-files:latest"]);
}

#[tokio::test]
async fn image_names_are_stable_across_runs() {
    let manifest = dice(&["weather"]);
    let mut images = Vec::new();
    for _ in 0..2 {
        let workspace = TempDir::new().unwrap();
        let resolved = resolve(&manifest, &workspace).await;
        let builder = RecordingBuilder::new();
        ImageBuildOrchestrator::new(builder.clone())
            .build_all(&resolved)
            .await
            .unwrap();
        images.push(builder.images());
    }
    assert_eq!(images[0], images[1]);
}

#[tokio::test]
async fn prebuilt_entries_are_not_rebuilt() {
    let workspace = TempDir::new().unwrap();
    let mut resolved = resolve(&dice(&["weather"]), &workspace).await;
    resolved.pending_builds.clear();
    let builder = RecordingBuilder::new();

    let report = ImageBuildOrchestrator::new(builder.clone())
        .build_all(&resolved)
        .await
        .unwrap();
    assert!(report.built.is_empty());
    assert!(builder.builds().is_empty());
}

#[tokio::test]
async fn unresolved_manifest_is_rejected() {
    let workspace = TempDir::new().unwrap();
    let mut resolved = resolve(&dice(&[]), &workspace).await;
    resolved.manifest = dice(&["weather"]);

    let err = ImageBuildOrchestrator::new(RecordingBuilder::new())
        .build_all(&resolved)
        .await
        .unwrap_err();
    assert!(matches!(err, BuildError::UnresolvedReference { server } if server == "weather"));
}

#[tokio::test]
async fn missing_context_is_reported() {
    let workspace = TempDir::new().unwrap();
    let resolved = resolve(&dice(&["weather"]), &workspace).await;
    std::fs::remove_dir_all(workspace.path().join("registry/weather")).unwrap();

    let err = ImageBuildOrchestrator::new(RecordingBuilder::new())
        .build_all(&resolved)
        .await
        .unwrap_err();
    assert!(matches!(err, BuildError::MissingContext { .. }));
}
