//! Container build recipes for registry packages.
//!
//! Every generated image serves MCP over streamable HTTP on
//! [`MCP_PEER_PORT`]. Stdio servers are bridged with `supergateway`.

use crate::registry::{Package, PackageRegistry, PackageTransport};
use crate::topology::MCP_PEER_PORT;

const NODE_BASE: &str = "node:22-slim";
const PYTHON_BASE: &str = "nikolaik/python-nodejs:python3.12-nodejs22-slim";
const BRIDGE_PACKAGE: &str = "supergateway";

/// Render a Dockerfile that runs `package`.
pub fn dockerfile(package: &Package) -> String {
    let version = package.version();
    let mut lines = Vec::new();

    let launch: Vec<String> = match package.registry_type {
        PackageRegistry::Npm => {
            lines.push(format!("FROM {NODE_BASE}"));
            lines.push(format!(
                "RUN npm install -g {}@{} {BRIDGE_PACKAGE}",
                package.identifier, version
            ));
            vec![
                "npx".to_string(),
                "-y".to_string(),
                format!("{}@{}", package.identifier, version),
            ]
        }
        PackageRegistry::Pypi => {
            lines.push(format!("FROM {PYTHON_BASE}"));
            lines.push(format!(
                "RUN pip install --no-cache-dir uv && npm install -g {BRIDGE_PACKAGE}"
            ));
            let spec = if version == crate::manifest::DEFAULT_VERSION {
                package.identifier.clone()
            } else {
                format!("{}=={}", package.identifier, version)
            };
            vec!["uvx".to_string(), spec]
        }
        PackageRegistry::Oci => {
            lines.push(format!("FROM {}:{}", package.identifier, version));
            Vec::new()
        }
    };

    for var in &package.environment_variables {
        if let Some(default) = &var.default {
            lines.push(format!("ENV {}={}", var.name, quote(default)));
        }
    }
    lines.push(format!("ENV PORT={MCP_PEER_PORT}"));
    lines.push(format!("EXPOSE {MCP_PEER_PORT}"));

    if !launch.is_empty() {
        let mut command = launch;
        command.extend(package.package_arguments.iter().cloned());

        let cmd: Vec<String> = match package.transport.kind {
            PackageTransport::Stdio => vec![
                BRIDGE_PACKAGE.to_string(),
                "--stdio".to_string(),
                command.join(" "),
                "--outputTransport".to_string(),
                "streamableHttp".to_string(),
                "--port".to_string(),
                MCP_PEER_PORT.to_string(),
            ],
            PackageTransport::StreamableHttp | PackageTransport::Sse => command,
        };
        lines.push(format!("CMD {}", exec_form(&cmd)));
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn quote(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("\"{value}\""))
}

fn exec_form(args: &[String]) -> String {
    serde_json::to_string(args).unwrap_or_else(|_| "[]".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::EnvironmentVariable;
    use crate::registry::schema::PackageTransportSpec;

    fn package(registry_type: PackageRegistry, transport: PackageTransport) -> Package {
        Package {
            registry_type,
            identifier: "weather-mcp".to_string(),
            version: Some("1.0.0".to_string()),
            runtime_hint: None,
            transport: PackageTransportSpec { kind: transport },
            package_arguments: vec!["--units".to_string(), "metric".to_string()],
            environment_variables: Vec::new(),
        }
    }

    #[test]
    fn test_npm_stdio_is_bridged() {
        let recipe = dockerfile(&package(PackageRegistry::Npm, PackageTransport::Stdio));
        assert!(recipe.starts_with("FROM node:22-slim\n"));
        assert!(recipe.contains("npm install -g weather-mcp@1.0.0 supergateway"));
        assert!(recipe.contains(
            r#"CMD ["supergateway","--stdio","npx -y weather-mcp@1.0.0 --units metric","--outputTransport","streamableHttp","--port","3000"]"#
        ));
    }

    #[test]
    fn test_pypi_http_runs_directly() {
        let recipe = dockerfile(&package(
            PackageRegistry::Pypi,
            PackageTransport::StreamableHttp,
        ));
        assert!(recipe.contains(r#"CMD ["uvx","weather-mcp==1.0.0","--units","metric"]"#));
        assert!(!recipe.contains("--stdio"));
    }

    #[test]
    fn test_oci_uses_image_as_base() {
        let recipe = dockerfile(&package(PackageRegistry::Oci, PackageTransport::Stdio));
        assert!(recipe.starts_with("FROM weather-mcp:1.0.0\n"));
        assert!(!recipe.contains("CMD"));
    }

    #[test]
    fn test_env_defaults_are_baked_in() {
        let mut pkg = package(PackageRegistry::Npm, PackageTransport::Stdio);
        pkg.environment_variables.push(EnvironmentVariable {
            name: "UNITS".to_string(),
            description: String::new(),
            is_required: false,
            default: Some("metric".to_string()),
        });
        assert!(dockerfile(&pkg).contains("ENV UNITS=\"metric\""));
    }
}
