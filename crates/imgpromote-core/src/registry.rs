//! Typed registry commands and the container CLI that executes them.

use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::debug;

use crate::domain::{ExecError, ImageRef};

/// Registry operations the promoter needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryOp {
    Pull,
    Tag,
    Push,
}

impl RegistryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistryOp::Pull => "pull",
            RegistryOp::Tag => "tag",
            RegistryOp::Push => "push",
        }
    }
}

/// A single registry operation with structured references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistryCommand {
    Pull { image: ImageRef },
    Tag { source: ImageRef, target: ImageRef },
    Push { image: ImageRef },
}

impl RegistryCommand {
    pub fn op(&self) -> RegistryOp {
        match self {
            RegistryCommand::Pull { .. } => RegistryOp::Pull,
            RegistryCommand::Tag { .. } => RegistryOp::Tag,
            RegistryCommand::Push { .. } => RegistryOp::Push,
        }
    }

    /// Argument vector for a docker-compatible CLI. Each reference is one
    /// argument, so nothing passes through a shell.
    pub fn args(&self) -> Vec<String> {
        match self {
            RegistryCommand::Pull { image } => vec!["pull".to_string(), image.to_string()],
            RegistryCommand::Tag { source, target } => {
                vec!["tag".to_string(), source.to_string(), target.to_string()]
            }
            RegistryCommand::Push { image } => vec!["push".to_string(), image.to_string()],
        }
    }
}

/// Captured output of a successful command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

/// Executes registry commands. Implementations must treat a non-zero exit
/// or transport failure as an `Err`.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    async fn execute(&self, command: &RegistryCommand) -> Result<CommandOutput, ExecError>;
}

/// Runs commands through a docker-compatible binary (`docker`, `podman`).
#[derive(Debug, Clone)]
pub struct ContainerCli {
    program: String,
}

impl Default for ContainerCli {
    fn default() -> Self {
        Self::new("docker")
    }
}

impl ContainerCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait]
impl RegistryClient for ContainerCli {
    async fn execute(&self, command: &RegistryCommand) -> Result<CommandOutput, ExecError> {
        let start = Instant::now();
        let args = command.args();
        debug!(program = %self.program, args = ?args, "Executing registry command");

        // kill_on_drop: a timed-out attempt drops this future, and the child
        // must not outlive it.
        let child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ExecError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let output = child
            .wait_with_output()
            .await
            .map_err(|source| ExecError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if !output.status.success() {
            return Err(ExecError::NonZeroExit {
                program: self.program.clone(),
                op: command.op().as_str(),
                code: output.status.code().unwrap_or(-1),
                stderr,
            });
        }

        Ok(CommandOutput {
            stdout,
            stderr,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn svc(tag: &str) -> ImageRef {
        ImageRef::new("reg.local", "svc", tag)
    }

    #[test]
    fn test_command_args_keep_references_whole() {
        let tag = RegistryCommand::Tag {
            source: svc("latest"),
            target: svc("stable"),
        };
        assert_eq!(
            tag.args(),
            vec!["tag", "reg.local/svc:latest", "reg.local/svc:stable"]
        );
        assert_eq!(tag.op(), RegistryOp::Tag);

        let push = RegistryCommand::Push { image: svc("stable") };
        assert_eq!(push.args(), vec!["push", "reg.local/svc:stable"]);
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let cli = ContainerCli::new("imgpromote-definitely-not-installed");
        let err = cli
            .execute(&RegistryCommand::Pull { image: svc("latest") })
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::Spawn { .. }));
        assert!(!err.is_transient());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit_is_reported() {
        // `false` ignores its arguments and exits 1.
        let cli = ContainerCli::new("false");
        let err = cli
            .execute(&RegistryCommand::Push { image: svc("stable") })
            .await
            .unwrap_err();
        match err {
            ExecError::NonZeroExit { op, code, .. } => {
                assert_eq!(op, "push");
                assert_eq!(code, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_zero_exit_captures_stdout() {
        let cli = ContainerCli::new("echo");
        let out = cli
            .execute(&RegistryCommand::Pull { image: svc("latest") })
            .await
            .expect("echo succeeds");
        assert_eq!(out.stdout, "pull reg.local/svc:latest");
    }
}
