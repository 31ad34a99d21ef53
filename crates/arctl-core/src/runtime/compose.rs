//! `docker compose` backed container runtime.
//!
//! The topology document is always fed on stdin (`-f -`) and never written
//! to disk.

use async_trait::async_trait;

use super::ContainerRuntime;
use crate::process::{ProcessError, run_captured};
use crate::topology::Topology;

#[derive(Debug, Clone)]
pub struct DockerCompose {
    binary: String,
}

impl DockerCompose {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn args<'a>(project: &'a str, action: &[&'a str]) -> Vec<&'a str> {
        let mut args = vec!["compose", "-p", project, "-f", "-"];
        args.extend_from_slice(action);
        args
    }
}

impl Default for DockerCompose {
    fn default() -> Self {
        Self::new("docker")
    }
}

#[async_trait]
impl ContainerRuntime for DockerCompose {
    async fn up(&self, topology: &Topology) -> Result<(), ProcessError> {
        let args = Self::args(&topology.project_name, &["up", "-d"]);
        run_captured(&self.binary, &args, Some(&topology.document), None).await?;
        Ok(())
    }

    async fn down(&self, topology: &Topology) -> Result<(), ProcessError> {
        let args = Self::args(&topology.project_name, &["down", "--remove-orphans"]);
        run_captured(&self.binary, &args, Some(&topology.document), None).await?;
        Ok(())
    }

    async fn logs(&self, topology: &Topology, tail: usize) -> Result<String, ProcessError> {
        let tail = tail.to_string();
        let args = Self::args(&topology.project_name, &["logs", "--no-color", "--tail", &tail]);
        let output = run_captured(&self.binary, &args, Some(&topology.document), None).await?;
        Ok(output.combined())
    }
}
