//! `mcp-servers.json`: resolved peer descriptors read by the running agent.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::topology::sanitize_version;

pub const FILE_NAME: &str = "mcp-servers.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DescriptorKind {
    Remote,
    Command,
}

/// How the agent reaches one resolved server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: DescriptorKind,
    pub url: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

/// `<agent_dir>/<agent_name>[/<sanitized version>]/mcp-servers.json`
pub fn descriptor_path(agent_dir: &Path, agent_name: &str, version: Option<&str>) -> PathBuf {
    let mut dir = agent_dir.join(agent_name);
    if let Some(version) = version {
        dir = dir.join(sanitize_version(version));
    }
    dir.join(FILE_NAME)
}

pub fn write(path: &Path, descriptors: &[ServerDescriptor]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_vec_pretty(descriptors)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    std::fs::write(path, json)
}

/// Remove a stale descriptor file. Returns whether one existed.
pub fn remove(path: &Path) -> std::io::Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

pub fn read(path: &Path) -> std::io::Result<Vec<ServerDescriptor>> {
    let bytes = std::fs::read(path)?;
    serde_json::from_slice(&bytes)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}
