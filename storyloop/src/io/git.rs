//! Story commits through the `git` CLI.

use std::path::PathBuf;
use std::process::{Command, Stdio};

use anyhow::{Context, Result, bail};
use tracing::{debug, instrument};

/// What `commit_all` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed { message: String, files: usize },
    NothingToCommit,
}

#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    /// True if the working directory is inside a git work tree. A missing
    /// `git` binary counts as "not a repository".
    pub fn is_repo(&self) -> bool {
        self.git(&["rev-parse", "--is-inside-work-tree"])
            .is_ok_and(|out| out.trim() == "true")
    }

    /// Paths with uncommitted changes, untracked files included.
    pub fn changed_paths(&self) -> Result<Vec<String>> {
        let out = self.git(&["status", "--porcelain=v1", "-uall"])?;
        Ok(out.lines().filter_map(changed_path).collect())
    }

    /// Stage the whole tree and commit it under `message`.
    #[instrument(skip_all, fields(message))]
    pub fn commit_all(&self, message: &str) -> Result<CommitOutcome> {
        let changed = self.changed_paths()?;
        if changed.is_empty() {
            debug!("working tree clean");
            return Ok(CommitOutcome::NothingToCommit);
        }
        self.git(&["add", "-A"])?;
        // Everything may be ignored or already staged away by a hook.
        if self.git(&["diff", "--cached", "--quiet"]).is_ok() {
            debug!("nothing staged after add");
            return Ok(CommitOutcome::NothingToCommit);
        }
        self.git(&["commit", "-q", "-m", message])?;
        debug!(files = changed.len(), "committed");
        Ok(CommitOutcome::Committed {
            message: message.to_string(),
            files: changed.len(),
        })
    }

    /// Subject line of the HEAD commit.
    pub fn head_subject(&self) -> Result<String> {
        Ok(self.git(&["log", "-1", "--pretty=%s"])?.trim().to_string())
    }

    /// Run git and return stdout; a non-zero exit is an error carrying stderr.
    fn git(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))?;
        if !output.status.success() {
            bail!(
                "git {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Conventional commit message for a finished story.
pub fn story_commit_message(story_id: &str, title: &str) -> String {
    format!("feat({story_id}): {title}")
}

/// Path named by one porcelain v1 line; renames yield the new path.
fn changed_path(line: &str) -> Option<String> {
    let path = line.get(3..)?.trim();
    let path = path.rsplit_once(" -> ").map_or(path, |(_, new)| new);
    (!path.is_empty()).then(|| path.to_string())
}
