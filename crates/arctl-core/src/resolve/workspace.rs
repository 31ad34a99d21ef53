//! Resolution workspaces.
//!
//! Directory runs resolve into the project directory itself. Registry runs
//! get a temporary directory that is removed when the workspace is dropped,
//! on success and on every error path.

use std::path::{Path, PathBuf};

use anyhow::Context;
use tempfile::TempDir;

#[derive(Debug)]
pub struct ResolutionWorkspace {
    root: PathBuf,
    temp: Option<TempDir>,
}

impl ResolutionWorkspace {
    /// Use an existing directory. Nothing is removed on drop.
    pub fn borrowed(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            temp: None,
        }
    }

    /// Create a fresh temporary directory under `parent`.
    pub fn temporary(parent: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create state directory: {}", parent.display()))?;
        let temp = tempfile::Builder::new()
            .prefix("arctl-run-")
            .tempdir_in(parent)
            .with_context(|| {
                format!(
                    "Failed to create resolution workspace in {}",
                    parent.display()
                )
            })?;
        Ok(Self {
            root: temp.path().to_path_buf(),
            temp: Some(temp),
        })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn is_temporary(&self) -> bool {
        self.temp.is_some()
    }
}

impl Drop for ResolutionWorkspace {
    fn drop(&mut self) {
        if let Some(temp) = self.temp.take() {
            let path = temp.path().to_path_buf();
            match temp.close() {
                Ok(()) => tracing::debug!(path = %path.display(), "removed resolution workspace"),
                Err(e) => tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to remove resolution workspace"
                ),
            }
        }
    }
}
