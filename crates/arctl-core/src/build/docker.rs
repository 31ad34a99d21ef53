//! `docker build` backed image builder.

use std::path::Path;

use async_trait::async_trait;

use super::{BuildOutput, ImageBuilder};
use crate::process::{ProcessError, run_captured};

#[derive(Debug, Clone)]
pub struct DockerBuilder {
    binary: String,
}

impl DockerBuilder {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn build_args<'a>(image: &'a str, context: &'a str) -> Vec<&'a str> {
        vec!["build", "-t", image, context]
    }
}

impl Default for DockerBuilder {
    fn default() -> Self {
        Self::new("docker")
    }
}

#[async_trait]
impl ImageBuilder for DockerBuilder {
    async fn build(&self, image: &str, context_dir: &Path) -> Result<BuildOutput, ProcessError> {
        let context = context_dir.to_string_lossy();
        let output = run_captured(
            &self.binary,
            &Self::build_args(image, &context),
            None,
            None,
        )
        .await?;
        Ok(BuildOutput {
            log: output.combined(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_args() {
        assert_eq!(
            DockerBuilder::build_args("dice-weather:latest", "/tmp/ws/registry/weather"),
            vec!["build", "-t", "dice-weather:latest", "/tmp/ws/registry/weather"]
        );
    }

    #[tokio::test]
    async fn test_missing_binary_reports_spawn_error() {
        let builder = DockerBuilder::new("arctl-no-such-docker");
        let err = builder
            .build("x:latest", Path::new("."))
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::Spawn { .. }));
    }
}
