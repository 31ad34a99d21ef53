//! Skill references declared by a manifest.
//!
//! On disk a skill is a flat record where exactly one of `image`, `path`
//! or the registry fields is set. In memory the source is a sum type, so
//! an invalid combination can never be constructed.

use serde::{Deserialize, Serialize};

use super::ValidationError;

const KIND: &str = "skill";

/// A named skill with exactly one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawSkillRef", into = "RawSkillRef")]
pub struct SkillRef {
    pub name: String,
    pub source: SkillSource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkillSource {
    /// Container image carrying the skill
    Image(String),
    /// Local directory
    Path(String),
    /// Pointer to a skill published in a registry
    Registry(RegistrySkillRef),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrySkillRef {
    pub name: String,
    pub version: Option<String>,
    pub registry_url: Option<String>,
}

impl SkillRef {
    pub fn new(name: impl Into<String>, source: SkillSource) -> Result<Self, ValidationError> {
        let skill = Self {
            name: name.into(),
            source,
        };
        skill.validate()?;
        Ok(skill)
    }

    /// Check the name and source. Fields are public, so a skill built
    /// without [`SkillRef::new`] is only checked here.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingField {
                kind: KIND,
                name: None,
                field: "name",
            });
        }
        let missing = match &self.source {
            SkillSource::Image(image) if image.trim().is_empty() => Some("image"),
            SkillSource::Path(path) if path.trim().is_empty() => Some("path"),
            SkillSource::Registry(registry) if registry.name.trim().is_empty() => {
                Some("registrySkillName")
            }
            _ => None,
        };
        match missing {
            Some(field) => Err(ValidationError::MissingField {
                kind: KIND,
                name: Some(self.name.clone()),
                field,
            }),
            None => Ok(()),
        }
    }

    pub fn is_registry(&self) -> bool {
        matches!(self.source, SkillSource::Registry(_))
    }
}

/// Flat on-disk representation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSkillRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_skill_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_skill_version: Option<String>,
    #[serde(
        default,
        rename = "registryURL",
        skip_serializing_if = "Option::is_none"
    )]
    pub registry_url: Option<String>,
}

impl TryFrom<RawSkillRef> for SkillRef {
    type Error = ValidationError;

    fn try_from(raw: RawSkillRef) -> Result<Self, Self::Error> {
        let name = raw
            .name
            .filter(|n| !n.trim().is_empty())
            .ok_or(ValidationError::MissingField {
                kind: KIND,
                name: None,
                field: "name",
            })?;

        let mut found = Vec::new();
        if raw.image.is_some() {
            found.push("image");
        }
        if raw.path.is_some() {
            found.push("path");
        }
        // Registry version or URL alone still selects the registry source,
        // which then fails for the missing registrySkillName.
        let registry_fields = raw.registry_skill_name.is_some()
            || raw.registry_skill_version.is_some()
            || raw.registry_url.is_some();
        if registry_fields {
            found.push("registrySkillName");
        }

        if found.len() > 1 {
            return Err(ValidationError::MultipleSources {
                kind: KIND,
                name,
                found,
            });
        }

        let source = if let Some(image) = raw.image {
            SkillSource::Image(image)
        } else if let Some(path) = raw.path {
            SkillSource::Path(path)
        } else if registry_fields {
            SkillSource::Registry(RegistrySkillRef {
                name: raw.registry_skill_name.unwrap_or_default(),
                version: raw.registry_skill_version,
                registry_url: raw.registry_url,
            })
        } else {
            return Err(ValidationError::NoSource {
                kind: KIND,
                name,
                expected: "image, path, or registrySkillName",
            });
        };

        SkillRef::new(name, source)
    }
}

impl From<SkillRef> for RawSkillRef {
    fn from(skill: SkillRef) -> Self {
        let mut raw = RawSkillRef {
            name: Some(skill.name),
            ..Default::default()
        };
        match skill.source {
            SkillSource::Image(image) => raw.image = Some(image),
            SkillSource::Path(path) => raw.path = Some(path),
            SkillSource::Registry(registry) => {
                raw.registry_skill_name = Some(registry.name);
                raw.registry_skill_version = registry.version;
                raw.registry_url = registry.registry_url;
            }
        }
        raw
    }
}
