//! MCP server references declared by a manifest.
//!
//! A reference is one of three kinds. `registry` references are pointers
//! that must be resolved before anything is built or run.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::ValidationError;

const KIND: &str = "mcp server";

/// Discriminant of an [`McpServerRef`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum McpServerKind {
    Remote,
    Command,
    Registry,
}

/// A reference to an MCP server, tagged by `type` in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum McpServerRef {
    /// Reachable over HTTP; nothing to build.
    Remote(RemoteServer),
    /// Runs as a local process or container.
    Command(CommandServer),
    /// Pointer into the registry. Never runnable as-is.
    Registry(RegistryServerRef),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteServer {
    pub name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CommandServer {
    pub name: String,
    /// Prebuilt container image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Build context, relative to the project (or resolution workspace)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<String>,
    /// Explicit executable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryServerRef {
    pub name: String,
    /// Registry to query; the configured default when absent
    #[serde(
        default,
        rename = "registryURL",
        skip_serializing_if = "Option::is_none"
    )]
    pub registry_url: Option<String>,
    pub registry_server_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_server_version: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub prefer_remote: bool,
}

impl RegistryServerRef {
    pub fn version(&self) -> &str {
        self.registry_server_version
            .as_deref()
            .filter(|v| !v.is_empty())
            .unwrap_or(super::DEFAULT_VERSION)
    }
}

impl McpServerRef {
    pub fn name(&self) -> &str {
        match self {
            McpServerRef::Remote(s) => &s.name,
            McpServerRef::Command(s) => &s.name,
            McpServerRef::Registry(s) => &s.name,
        }
    }

    pub fn kind(&self) -> McpServerKind {
        match self {
            McpServerRef::Remote(_) => McpServerKind::Remote,
            McpServerRef::Command(_) => McpServerKind::Command,
            McpServerRef::Registry(_) => McpServerKind::Registry,
        }
    }

    pub fn is_registry(&self) -> bool {
        matches!(self, McpServerRef::Registry(_))
    }

    /// Validate the fields required by this kind of reference.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name().trim().is_empty() {
            return Err(ValidationError::MissingField {
                kind: KIND,
                name: None,
                field: "name",
            });
        }

        match self {
            McpServerRef::Remote(server) => {
                if server.url.trim().is_empty() {
                    return Err(ValidationError::MissingField {
                        kind: KIND,
                        name: Some(server.name.clone()),
                        field: "url",
                    });
                }
                url::Url::parse(&server.url).map_err(|e| ValidationError::InvalidValue {
                    kind: KIND,
                    name: server.name.clone(),
                    field: "url",
                    reason: e.to_string(),
                })?;
            }
            McpServerRef::Command(server) => {
                let found: Vec<&'static str> = [
                    ("build", server.build.is_some()),
                    ("image", server.image.is_some()),
                    ("command", server.command.is_some()),
                ]
                .into_iter()
                .filter_map(|(field, set)| set.then_some(field))
                .collect();

                match found.len() {
                    0 => {
                        return Err(ValidationError::NoSource {
                            kind: KIND,
                            name: server.name.clone(),
                            expected: "build, image, or command",
                        });
                    }
                    1 => {}
                    _ => {
                        return Err(ValidationError::MultipleSources {
                            kind: KIND,
                            name: server.name.clone(),
                            found,
                        });
                    }
                }
            }
            McpServerRef::Registry(server) => {
                if server.registry_server_name.trim().is_empty() {
                    return Err(ValidationError::MissingField {
                        kind: KIND,
                        name: Some(server.name.clone()),
                        field: "registryServerName",
                    });
                }
                if let Some(registry_url) = &server.registry_url {
                    url::Url::parse(registry_url).map_err(|e| ValidationError::InvalidValue {
                        kind: KIND,
                        name: server.name.clone(),
                        field: "registryURL",
                        reason: e.to_string(),
                    })?;
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_registry_reference() {
        let json = r#"{
            "type": "registry",
            "name": "weather",
            "registryServerName": "weather",
            "registryServerVersion": "1.0.0"
        }"#;
        let server: McpServerRef = serde_json::from_str(json).unwrap();
        assert_eq!(server.kind(), McpServerKind::Registry);
        assert_eq!(server.name(), "weather");
        match server {
            McpServerRef::Registry(r) => {
                assert_eq!(r.version(), "1.0.0");
                assert!(!r.prefer_remote);
            }
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn test_registry_version_defaults_to_latest() {
        let server = RegistryServerRef {
            name: "weather".to_string(),
            registry_url: None,
            registry_server_name: "weather".to_string(),
            registry_server_version: None,
            prefer_remote: false,
        };
        assert_eq!(server.version(), "latest");
    }

    #[test]
    fn test_command_requires_a_source() {
        let server = McpServerRef::Command(CommandServer {
            name: "fs".to_string(),
            ..Default::default()
        });
        let err = server.validate().unwrap_err();
        assert!(err.to_string().contains("build, image, or command"));
    }

    #[test]
    fn test_command_rejects_multiple_sources() {
        let server = McpServerRef::Command(CommandServer {
            name: "fs".to_string(),
            build: Some("fs".to_string()),
            image: Some("ghcr.io/org/fs:1".to_string()),
            ..Default::default()
        });
        let err = server.validate().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("build"), "{msg}");
        assert!(msg.contains("image"), "{msg}");
    }

    #[test]
    fn test_remote_requires_valid_url() {
        let server = McpServerRef::Remote(RemoteServer {
            name: "search".to_string(),
            url: "not a url".to_string(),
            headers: BTreeMap::new(),
        });
        assert!(server.validate().is_err());
    }

    #[test]
    fn test_serialize_omits_empty_fields() {
        let server = McpServerRef::Command(CommandServer {
            name: "weather".to_string(),
            build: Some("registry/weather".to_string()),
            ..Default::default()
        });
        let value = serde_json::to_value(&server).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"type": "command", "name": "weather", "build": "registry/weather"})
        );
    }
}
