//! In-memory registry client (testing only)
//!
//! `ScriptedRegistry` records every command it receives and fails according
//! to a small script, so promoter and orchestrator behaviour can be checked
//! without a container daemon.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::ExecError;
use crate::registry::{CommandOutput, RegistryClient, RegistryCommand, RegistryOp};

#[derive(Debug, Clone)]
struct FailureRule {
    op: RegistryOp,
    repository: Option<String>,
    /// `None` fails forever.
    remaining: Option<u32>,
}

/// Registry client whose outcomes are scripted per operation.
#[derive(Debug, Default)]
pub struct ScriptedRegistry {
    rules: Mutex<Vec<FailureRule>>,
    calls: Mutex<Vec<RegistryCommand>>,
    latency: Option<Duration>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl ScriptedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `times` invocations of `op`, then succeed.
    pub fn fail_times(self, op: RegistryOp, times: u32) -> Self {
        self.push_rule(op, None, Some(times))
    }

    /// Fail every invocation of `op`.
    pub fn always_fail(self, op: RegistryOp) -> Self {
        self.push_rule(op, None, None)
    }

    /// Fail every invocation of `op` for one repository.
    pub fn always_fail_for(self, repository: &str, op: RegistryOp) -> Self {
        self.push_rule(op, Some(repository.to_string()), None)
    }

    /// Hold each command for `latency` before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    fn push_rule(self, op: RegistryOp, repository: Option<String>, remaining: Option<u32>) -> Self {
        if let Ok(mut rules) = self.rules.lock() {
            rules.push(FailureRule {
                op,
                repository,
                remaining,
            });
        }
        self
    }

    /// Every command received, in arrival order.
    pub fn calls(&self) -> Vec<RegistryCommand> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of invocations of `op`.
    pub fn count(&self, op: RegistryOp) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| c.op() == op).count()
    }

    /// Highest number of commands that were executing at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn should_fail(&self, command: &RegistryCommand) -> bool {
        let repository = match command {
            RegistryCommand::Pull { image } | RegistryCommand::Push { image } => &image.repository,
            RegistryCommand::Tag { source, .. } => &source.repository,
        };
        let mut rules = self.rules.lock().unwrap();
        for rule in rules.iter_mut() {
            if rule.op != command.op() {
                continue;
            }
            if rule.repository.as_deref().is_some_and(|r| r != repository) {
                continue;
            }
            match rule.remaining.as_mut() {
                None => return true,
                Some(0) => continue,
                Some(n) => {
                    *n -= 1;
                    return true;
                }
            }
        }
        false
    }
}

#[async_trait]
impl RegistryClient for ScriptedRegistry {
    async fn execute(&self, command: &RegistryCommand) -> Result<CommandOutput, ExecError> {
        self.calls.lock().unwrap().push(command.clone());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.should_fail(command) {
            return Err(ExecError::NonZeroExit {
                program: "scripted".to_string(),
                op: command.op().as_str(),
                code: 1,
                stderr: format!("scripted {} failure for {}", command.op().as_str(), command.args().join(" ")),
            });
        }

        Ok(CommandOutput::default())
    }
}
