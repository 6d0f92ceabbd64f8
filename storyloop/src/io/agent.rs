//! Agent runner abstraction.
//!
//! The [`AgentRunner`] trait decouples story orchestration from the actual agent
//! backend (currently the `claude` CLI). Tests use scripted runners that return
//! predetermined results without spawning processes.

use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::io::process::{StreamLabels, run_streaming};

/// Role an agent invocation plays in the loop; used for labels and messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentRole {
    ScrumMaster,
    StoryCreator,
    Dev,
    Review,
}

impl AgentRole {
    pub fn label(self) -> &'static str {
        match self {
            AgentRole::ScrumMaster => "SM",
            AgentRole::StoryCreator => "Story Creator",
            AgentRole::Dev => "Dev",
            AgentRole::Review => "Review",
        }
    }
}

/// Parameters for one agent invocation.
#[derive(Debug, Clone)]
pub struct AgentRequest {
    /// Working directory for the agent process.
    pub workdir: PathBuf,
    pub role: AgentRole,
    /// Model name passed to the CLI.
    pub model: String,
    /// Instruction payload.
    pub prompt: String,
    /// Tools the agent may use.
    pub allowed_tools: Vec<String>,
    /// Line prefixes for labeled (verbose) streaming; `None` streams raw output.
    pub labels: Option<StreamLabels>,
}

/// Result of a successful (exit code 0) invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentRun {
    pub duration: Duration,
    /// Captured stdout, used for secondary success signals.
    pub stdout: String,
}

/// Abstraction over agent execution backends.
pub trait AgentRunner {
    /// Run the agent to completion. Fails on spawn failure or non-zero exit.
    fn run(&self, request: &AgentRequest) -> Result<AgentRun>;
}

/// Runner that spawns the `claude` CLI (or a compatible binary).
#[derive(Debug, Clone)]
pub struct ClaudeRunner {
    binary: String,
}

impl ClaudeRunner {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// True if `<binary> --version` runs and exits successfully.
    pub fn is_installed(&self) -> bool {
        Command::new(&self.binary)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok_and(|status| status.success())
    }

    fn command(&self, request: &AgentRequest) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("--model")
            .arg(&request.model)
            .arg("-p")
            .arg(&request.prompt);
        if !request.allowed_tools.is_empty() {
            cmd.arg("--allowedTools")
                .arg(request.allowed_tools.join(","));
        }
        cmd.current_dir(&request.workdir);
        cmd
    }
}

impl AgentRunner for ClaudeRunner {
    #[instrument(skip_all, fields(role = request.role.label(), model = %request.model))]
    fn run(&self, request: &AgentRequest) -> Result<AgentRun> {
        info!(workdir = %request.workdir.display(), "starting agent");
        debug!(prompt_len = request.prompt.len(), "agent prompt");

        let output = run_streaming(self.command(request), request.labels.clone())
            .with_context(|| format!("run {} agent ({})", request.role.label(), self.binary))?;

        if !output.status.success() {
            warn!(exit_code = ?output.status.code(), "agent failed");
            return Err(anyhow!(
                "{} agent exited with code {}",
                request.role.label(),
                output
                    .status
                    .code()
                    .map_or_else(|| "none (killed by signal)".to_string(), |c| c.to_string())
            ));
        }

        debug!(duration_ms = output.duration.as_millis() as u64, "agent completed");
        Ok(AgentRun {
            duration: output.duration,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(workdir: PathBuf) -> AgentRequest {
        AgentRequest {
            workdir,
            role: AgentRole::Dev,
            model: "sonnet".to_string(),
            prompt: "implement".to_string(),
            allowed_tools: vec!["Read".to_string(), "Write".to_string()],
            labels: None,
        }
    }

    #[test]
    fn command_line_carries_model_prompt_and_tools() {
        let temp = tempfile::tempdir().expect("tempdir");
        let runner = ClaudeRunner::new("claude");
        let cmd = runner.command(&request(temp.path().to_path_buf()));
        let args: Vec<String> = cmd
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec!["--model", "sonnet", "-p", "implement", "--allowedTools", "Read,Write"]
        );
        assert_eq!(cmd.get_current_dir(), Some(temp.path()));
    }

    #[test]
    fn missing_binary_is_not_installed_and_fails_to_run() {
        let temp = tempfile::tempdir().expect("tempdir");
        let runner = ClaudeRunner::new("storyloop-no-such-agent");
        assert!(!runner.is_installed());
        let err = runner.run(&request(temp.path().to_path_buf())).unwrap_err();
        assert!(format!("{err:#}").contains("spawn command"));
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        // `false` ignores its arguments and exits 1.
        let runner = ClaudeRunner::new("false");
        let err = runner.run(&request(temp.path().to_path_buf())).unwrap_err();
        assert_eq!(err.to_string(), "Dev agent exited with code 1");
    }
}
