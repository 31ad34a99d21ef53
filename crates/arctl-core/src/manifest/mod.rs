//! Typed project manifest and its validation rules.
//!
//! Reference names are unique within a manifest (case-insensitive) and
//! both reference lists are kept sorted by name after every mutation so
//! serialized manifests diff deterministically.

pub mod mcp;
pub mod skill;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::topology::dns_label;

pub use mcp::{CommandServer, McpServerKind, McpServerRef, RegistryServerRef, RemoteServer};
pub use skill::{RawSkillRef, RegistrySkillRef, SkillRef, SkillSource};

pub const DEFAULT_VERSION: &str = "latest";

/// Manifest schema violations. Always local, never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{kind}{} is missing required field '{field}'", .name.as_deref().map(|n| format!(" '{n}'")).unwrap_or_default())]
    MissingField {
        kind: &'static str,
        name: Option<String>,
        field: &'static str,
    },

    #[error("invalid {field} for {kind} '{name}': {reason}")]
    InvalidValue {
        kind: &'static str,
        name: String,
        field: &'static str,
        reason: String,
    },

    #[error("{kind} '{name}' already exists (names are case-insensitive)")]
    Duplicate { kind: &'static str, name: String },

    #[error("{kind} '{name}' has no source: set exactly one of {expected}")]
    NoSource {
        kind: &'static str,
        name: String,
        expected: &'static str,
    },

    #[error("{kind} '{name}' sets multiple sources ({}): set exactly one", .found.join(", "))]
    MultipleSources {
        kind: &'static str,
        name: String,
        found: Vec<&'static str>,
    },

    #[error("mcp server '{name}' maps to service name '{label}', already used by {other}")]
    NameCollision {
        name: String,
        other: String,
        label: String,
    },

    #[error("invalid manifest version '{version}': {reason}")]
    InvalidVersion { version: String, reason: String },
}

/// Declarative description of an agent project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub name: String,
    /// Base container image; derived from `name` when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub language: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub framework: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub model_provider: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub model_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Runtime-only; stripped by [`Manifest::for_publish`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telemetry_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mcp_servers: Vec<McpServerRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skills: Vec<SkillRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Manifest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: None,
            language: String::new(),
            framework: String::new(),
            model_provider: String::new(),
            model_name: String::new(),
            description: String::new(),
            version: None,
            telemetry_endpoint: None,
            mcp_servers: Vec::new(),
            skills: Vec::new(),
            updated_at: None,
        }
    }

    /// Declared version, `latest` when unset.
    pub fn version(&self) -> &str {
        self.version
            .as_deref()
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_VERSION)
    }

    pub fn has_registry_servers(&self) -> bool {
        self.mcp_servers.iter().any(McpServerRef::is_registry)
    }

    pub fn find_mcp_server(&self, name: &str) -> Option<&McpServerRef> {
        self.mcp_servers
            .iter()
            .find(|s| s.name().eq_ignore_ascii_case(name))
    }

    pub fn find_skill(&self, name: &str) -> Option<&SkillRef> {
        self.skills
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
    }

    /// Validate the whole manifest.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingField {
                kind: "manifest",
                name: None,
                field: "name",
            });
        }

        let version = self.version();
        if version != DEFAULT_VERSION {
            semver::Version::parse(version).map_err(|e| ValidationError::InvalidVersion {
                version: version.to_string(),
                reason: e.to_string(),
            })?;
        }

        for (i, server) in self.mcp_servers.iter().enumerate() {
            server.validate()?;
            if self.mcp_servers[..i]
                .iter()
                .any(|prev| prev.name().eq_ignore_ascii_case(server.name()))
            {
                return Err(ValidationError::Duplicate {
                    kind: "mcp server",
                    name: server.name().to_string(),
                });
            }
        }
        self.check_server_labels(&self.mcp_servers)?;

        for (i, skill) in self.skills.iter().enumerate() {
            skill.validate()?;
            if self.skills[..i]
                .iter()
                .any(|prev| prev.name.eq_ignore_ascii_case(&skill.name))
            {
                return Err(ValidationError::Duplicate {
                    kind: "skill",
                    name: skill.name.clone(),
                });
            }
        }

        Ok(())
    }

    /// Server names become build directories, image names and compose
    /// service names through [`dns_label`], so two servers (or a server and
    /// the agent itself) must not map to the same label.
    pub fn check_server_labels(&self, servers: &[McpServerRef]) -> Result<(), ValidationError> {
        let agent = dns_label(&self.name);
        let mut seen: Vec<(String, &str)> = Vec::with_capacity(servers.len());
        for server in servers {
            let label = dns_label(server.name());
            let other = if label == agent {
                Some(format!("agent '{}'", self.name))
            } else {
                seen.iter()
                    .find(|(l, _)| *l == label)
                    .map(|(_, name)| format!("mcp server '{name}'"))
            };
            if let Some(other) = other {
                return Err(ValidationError::NameCollision {
                    name: server.name().to_string(),
                    other,
                    label,
                });
            }
            seen.push((label, server.name()));
        }
        Ok(())
    }

    /// Add an MCP server reference. The manifest is untouched on error.
    pub fn add_mcp_server(&mut self, server: McpServerRef) -> Result<(), ValidationError> {
        server.validate()?;
        if self.find_mcp_server(server.name()).is_some() {
            return Err(ValidationError::Duplicate {
                kind: "mcp server",
                name: server.name().to_string(),
            });
        }
        let mut candidate = self.mcp_servers.clone();
        candidate.push(server.clone());
        self.check_server_labels(&candidate)?;
        self.mcp_servers.push(server);
        self.sort_references();
        self.touch();
        Ok(())
    }

    pub fn remove_mcp_server(&mut self, name: &str) -> Option<McpServerRef> {
        let index = self
            .mcp_servers
            .iter()
            .position(|s| s.name().eq_ignore_ascii_case(name))?;
        let removed = self.mcp_servers.remove(index);
        self.touch();
        Some(removed)
    }

    /// Add a skill reference. The manifest is untouched on error.
    pub fn add_skill(&mut self, skill: SkillRef) -> Result<(), ValidationError> {
        skill.validate()?;
        if self.find_skill(&skill.name).is_some() {
            return Err(ValidationError::Duplicate {
                kind: "skill",
                name: skill.name,
            });
        }
        self.skills.push(skill);
        self.sort_references();
        self.touch();
        Ok(())
    }

    pub fn remove_skill(&mut self, name: &str) -> Option<SkillRef> {
        let index = self
            .skills
            .iter()
            .position(|s| s.name.eq_ignore_ascii_case(name))?;
        let removed = self.skills.remove(index);
        self.touch();
        Some(removed)
    }

    /// Sort both reference lists by name.
    pub fn sort_references(&mut self) {
        self.mcp_servers
            .sort_by(|a, b| a.name().to_lowercase().cmp(&b.name().to_lowercase()));
        self.skills
            .sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
    }

    pub fn touch(&mut self) {
        self.updated_at = Some(Utc::now());
    }

    /// Copy suitable for publishing: runtime-only fields removed.
    pub fn for_publish(&self) -> Manifest {
        let mut published = self.clone();
        published.telemetry_endpoint = None;
        published
    }

    /// Environment variable holding the credential for this manifest's
    /// model provider, if the provider needs one.
    pub fn required_credential(&self) -> Option<&'static str> {
        provider_credential(&self.model_provider)
    }
}

/// Credential variable required by a model provider.
pub fn provider_credential(provider: &str) -> Option<&'static str> {
    match provider.to_lowercase().as_str() {
        "openai" => Some("OPENAI_API_KEY"),
        "anthropic" => Some("ANTHROPIC_API_KEY"),
        "gemini" | "google" => Some("GOOGLE_API_KEY"),
        "azureopenai" | "azure-openai" => Some("AZURE_OPENAI_API_KEY"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn remote(name: &str) -> McpServerRef {
        McpServerRef::Remote(RemoteServer {
            name: name.to_string(),
            url: "https://mcp.example.com/mcp".to_string(),
            headers: BTreeMap::new(),
        })
    }

    fn path_skill(name: &str) -> SkillRef {
        SkillRef::new(name, SkillSource::Path(format!("./skills/{name}"))).unwrap()
    }

    #[test]
    fn test_version_defaults_to_latest() {
        let manifest = Manifest::new("dice");
        assert_eq!(manifest.version(), "latest");
    }

    #[test]
    fn test_add_keeps_servers_sorted() {
        let mut manifest = Manifest::new("dice");
        manifest.add_mcp_server(remote("zeta")).unwrap();
        manifest.add_mcp_server(remote("Alpha")).unwrap();
        manifest.add_mcp_server(remote("mid")).unwrap();

        let names: Vec<&str> = manifest.mcp_servers.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["Alpha", "mid", "zeta"]);
        assert!(manifest.updated_at.is_some());
    }

    #[test]
    fn test_duplicate_server_is_rejected_case_insensitive() {
        let mut manifest = Manifest::new("dice");
        manifest.add_mcp_server(remote("weather")).unwrap();
        let before = manifest.clone();

        let err = manifest.add_mcp_server(remote("WEATHER")).unwrap_err();
        assert!(matches!(err, ValidationError::Duplicate { .. }));
        assert_eq!(manifest, before);
    }

    #[test]
    fn test_duplicate_skill_is_rejected_case_insensitive() {
        let mut manifest = Manifest::new("dice");
        manifest.add_skill(path_skill("pdf")).unwrap();
        let before = manifest.clone();

        let err = manifest.add_skill(path_skill("PDF")).unwrap_err();
        assert!(err.to_string().contains("already exists"));
        assert_eq!(manifest, before);
    }

    #[test]
    fn test_invalid_server_leaves_manifest_unmodified() {
        let mut manifest = Manifest::new("dice");
        let before = manifest.clone();
        let invalid = McpServerRef::Command(CommandServer {
            name: "fs".to_string(),
            ..Default::default()
        });
        assert!(manifest.add_mcp_server(invalid).is_err());
        assert_eq!(manifest, before);
    }

    #[test]
    fn test_remove_server_case_insensitive() {
        let mut manifest = Manifest::new("dice");
        manifest.add_mcp_server(remote("weather")).unwrap();
        assert!(manifest.remove_mcp_server("Weather").is_some());
        assert!(manifest.mcp_servers.is_empty());
        assert!(manifest.remove_mcp_server("weather").is_none());
    }

    #[test]
    fn test_validate_detects_duplicates_from_file() {
        let json = r#"{
            "name": "dice",
            "mcpServers": [
                {"type": "remote", "name": "search", "url": "https://a.example.com"},
                {"type": "remote", "name": "Search", "url": "https://b.example.com"}
            ]
        }"#;
        let manifest: Manifest = serde_json::from_str(json).unwrap();
        assert!(matches!(
            manifest.validate(),
            Err(ValidationError::Duplicate { .. })
        ));
    }

    #[test]
    fn test_servers_with_same_service_name_are_rejected() {
        let mut manifest = Manifest::new("dice");
        manifest.add_mcp_server(remote("foo.bar")).unwrap();
        let before = manifest.clone();

        let err = manifest.add_mcp_server(remote("foo_bar")).unwrap_err();
        assert_eq!(
            err,
            ValidationError::NameCollision {
                name: "foo_bar".to_string(),
                other: "mcp server 'foo.bar'".to_string(),
                label: "foo-bar".to_string(),
            }
        );
        assert_eq!(manifest, before);

        manifest.mcp_servers.push(remote("foo_bar"));
        assert!(matches!(
            manifest.validate(),
            Err(ValidationError::NameCollision { .. })
        ));
    }

    #[test]
    fn test_server_named_like_agent_is_rejected() {
        let mut manifest = Manifest::new("dice");
        let err = manifest.add_mcp_server(remote("Dice")).unwrap_err();
        assert!(err.to_string().contains("agent 'dice'"));
        assert!(manifest.mcp_servers.is_empty());
    }

    #[test]
    fn test_validate_rechecks_skills() {
        let mut manifest = Manifest::new("dice");
        manifest.skills.push(SkillRef {
            name: String::new(),
            source: SkillSource::Path("./skills/pdf".to_string()),
        });
        assert!(matches!(
            manifest.validate(),
            Err(ValidationError::MissingField { kind: "skill", .. })
        ));
    }

    #[test]
    fn test_validate_rejects_bad_version() {
        let mut manifest = Manifest::new("dice");
        manifest.version = Some("one".to_string());
        assert!(matches!(
            manifest.validate(),
            Err(ValidationError::InvalidVersion { .. })
        ));

        manifest.version = Some("1.2.3".to_string());
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_for_publish_strips_telemetry() {
        let mut manifest = Manifest::new("dice");
        manifest.telemetry_endpoint = Some("http://localhost:4317".to_string());
        let published = manifest.for_publish();
        assert!(published.telemetry_endpoint.is_none());
        assert!(manifest.telemetry_endpoint.is_some());
    }

    #[test]
    fn test_provider_credentials() {
        assert_eq!(provider_credential("OpenAI"), Some("OPENAI_API_KEY"));
        assert_eq!(provider_credential("gemini"), Some("GOOGLE_API_KEY"));
        assert_eq!(provider_credential("ollama"), None);
    }

    #[test]
    fn test_missing_field_message_names_field() {
        let err = ValidationError::MissingField {
            kind: "mcp server",
            name: Some("weather".to_string()),
            field: "url",
        };
        assert_eq!(
            err.to_string(),
            "mcp server 'weather' is missing required field 'url'"
        );
    }
}
