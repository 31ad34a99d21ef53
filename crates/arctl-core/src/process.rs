//! Running external tools with captured output.

use std::path::Path;
use std::process::Stdio;

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {}: {output}", .exit_code.map(|c| format!("status {c}")).unwrap_or_else(|| "a signal".to_string()))]
    Failed {
        program: String,
        exit_code: Option<i32>,
        output: String,
    },
}

#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Stdout and stderr joined, for diagnostics.
    pub fn combined(&self) -> String {
        match (self.stdout.trim(), self.stderr.trim()) {
            ("", err) => err.to_string(),
            (out, "") => out.to_string(),
            (out, err) => format!("{out}\n{err}"),
        }
    }
}

/// Run `program args...`, optionally feeding `stdin`, and fail on a
/// non-zero exit with the captured output attached.
pub async fn run_captured(
    program: &str,
    args: &[&str],
    stdin: Option<&[u8]>,
    current_dir: Option<&Path>,
) -> Result<CommandOutput, ProcessError> {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .kill_on_drop(true);
    if let Some(dir) = current_dir {
        cmd.current_dir(dir);
    }

    tracing::debug!(program, ?args, "running command");
    let mut child = cmd.spawn().map_err(|source| ProcessError::Spawn {
        program: program.to_string(),
        source,
    })?;

    if let Some(input) = stdin
        && let Some(mut pipe) = child.stdin.take()
    {
        pipe.write_all(input)
            .await
            .map_err(|source| ProcessError::Spawn {
                program: program.to_string(),
                source,
            })?;
        // Closing stdin signals end of input.
        drop(pipe);
    }

    let output = child
        .wait_with_output()
        .await
        .map_err(|source| ProcessError::Spawn {
            program: program.to_string(),
            source,
        })?;

    let captured = CommandOutput {
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    };

    if !output.status.success() {
        return Err(ProcessError::Failed {
            program: program.to_string(),
            exit_code: output.status.code(),
            output: captured.combined(),
        });
    }

    Ok(captured)
}
