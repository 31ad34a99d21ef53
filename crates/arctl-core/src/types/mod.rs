//! Shared core types used across manifest, registry and deployment layers.

use serde::{Deserialize, Serialize};

/// Kind of resource a deployment or registry lookup refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Agent,
    Mcp,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Agent => "agent",
            ResourceType::Mcp => "mcp",
        }
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ResourceType {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "agent" => Ok(ResourceType::Agent),
            "mcp" | "mcp-server" | "server" => Ok(ResourceType::Mcp),
            _ => anyhow::bail!("Invalid resource type: '{}'. Valid values: agent, mcp", value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_type_parse() {
        assert_eq!(ResourceType::try_from("Agent").unwrap(), ResourceType::Agent);
        assert_eq!(ResourceType::try_from("mcp").unwrap(), ResourceType::Mcp);
        assert!(ResourceType::try_from("skill").is_err());
    }

    #[test]
    fn test_resource_type_serde() {
        let json = serde_json::to_string(&ResourceType::Mcp).unwrap();
        assert_eq!(json, "\"mcp\"");
    }
}
