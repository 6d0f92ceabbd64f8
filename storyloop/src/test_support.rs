//! Test helpers: scripted agents and prompters plus a throwaway BMAD project.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tempfile::TempDir;

use crate::context::LoopContext;
use crate::core::status::DONE;
use crate::core::types::{Epic, MaxIterationsAction};
use crate::io::agent::{AgentRequest, AgentRun, AgentRunner};
use crate::io::config::RunSettings;
use crate::io::git::Git;
use crate::io::project::{ProjectPaths, load_epics};
use crate::io::prompter::Prompter;
use crate::io::sprint_status::{load_sprint_status, update_story_status};

/// Side effect a scripted agent performs on the project before "exiting".
#[derive(Debug, Clone)]
enum Effect {
    CreateStory(String),
    MarkDone(String),
    WriteFile(PathBuf, String),
    WriteSprintStatus(String),
}

/// One scripted agent invocation.
#[derive(Debug, Clone)]
pub struct ScriptedRun {
    ok: bool,
    stdout: String,
    effects: Vec<Effect>,
}

impl ScriptedRun {
    /// Exit code 0 with no output.
    pub fn ok() -> Self {
        Self {
            ok: true,
            stdout: String::new(),
            effects: Vec::new(),
        }
    }

    /// Non-zero exit.
    pub fn fail() -> Self {
        Self {
            ok: false,
            ..Self::ok()
        }
    }

    pub fn stdout(mut self, stdout: &str) -> Self {
        self.stdout = stdout.to_string();
        self
    }

    /// Write a minimal story file for `story_id`.
    pub fn creates_story(mut self, story_id: &str) -> Self {
        self.effects.push(Effect::CreateStory(story_id.to_string()));
        self
    }

    /// Record `story_id` as done in the sprint status, like a passing review.
    pub fn marks_done(mut self, story_id: &str) -> Self {
        self.effects.push(Effect::MarkDone(story_id.to_string()));
        self
    }

    /// Write a file relative to the project root.
    pub fn writes_file(mut self, rel: &str, contents: &str) -> Self {
        self.effects
            .push(Effect::WriteFile(PathBuf::from(rel), contents.to_string()));
        self
    }

    /// Replace the sprint-status document, like a sprint-planning agent.
    pub fn writes_sprint_status(mut self, yaml: &str) -> Self {
        self.effects.push(Effect::WriteSprintStatus(yaml.to_string()));
        self
    }
}

/// Agent runner that replays [`ScriptedRun`]s in order and records requests.
#[derive(Debug, Default)]
pub struct ScriptedAgentRunner {
    runs: RefCell<VecDeque<ScriptedRun>>,
    requests: RefCell<Vec<AgentRequest>>,
}

impl ScriptedAgentRunner {
    pub fn new(runs: Vec<ScriptedRun>) -> Self {
        Self {
            runs: RefCell::new(runs.into()),
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<AgentRequest> {
        self.requests.borrow().clone()
    }

    /// Scripted runs that were never consumed.
    pub fn remaining(&self) -> usize {
        self.runs.borrow().len()
    }
}

impl AgentRunner for ScriptedAgentRunner {
    fn run(&self, request: &AgentRequest) -> Result<AgentRun> {
        self.requests.borrow_mut().push(request.clone());
        let run = self
            .runs
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("no scripted run left for {} agent", request.role.label()))?;
        if !run.ok {
            return Err(anyhow!("{} agent exited with code 1", request.role.label()));
        }
        let paths = ProjectPaths::new(&request.workdir);
        for effect in &run.effects {
            apply_effect(&paths, effect)?;
        }
        Ok(AgentRun {
            duration: Duration::ZERO,
            stdout: run.stdout,
        })
    }
}

fn apply_effect(paths: &ProjectPaths, effect: &Effect) -> Result<()> {
    match effect {
        Effect::CreateStory(id) => write_file(
            &paths.stories_dir.join(format!("{id}.md")),
            &format!("# Story {id}\n\n## Acceptance Criteria\n\n- [ ] scripted\n"),
        ),
        Effect::MarkDone(id) => {
            if update_story_status(&paths.sprint_status_path, id, DONE) {
                Ok(())
            } else {
                Err(anyhow!("scripted review could not mark {id} done"))
            }
        }
        Effect::WriteFile(rel, contents) => write_file(&paths.root.join(rel), contents),
        Effect::WriteSprintStatus(yaml) => write_file(&paths.sprint_status_path, yaml),
    }
}

/// Prompter with canned answers that records what it was asked.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    epic_choice: Option<String>,
    confirm_default: bool,
    confirm_answers: RefCell<VecDeque<bool>>,
    actions: RefCell<VecDeque<MaxIterationsAction>>,
    offered_epics: RefCell<Vec<Vec<String>>>,
    confirmations: RefCell<Vec<String>>,
    asked_actions: RefCell<Vec<(String, u32)>>,
}

impl ScriptedPrompter {
    pub fn with_actions(actions: Vec<MaxIterationsAction>) -> Self {
        Self {
            actions: RefCell::new(actions.into()),
            ..Self::default()
        }
    }

    /// Answer every confirmation not covered by [`Self::answering`] with `yes`.
    pub fn confirming(mut self, yes: bool) -> Self {
        self.confirm_default = yes;
        self
    }

    /// Queue answers for the next confirmations, in order.
    pub fn answering(self, answers: Vec<bool>) -> Self {
        *self.confirm_answers.borrow_mut() = answers.into();
        self
    }

    pub fn choosing_epic(mut self, epic_id: &str) -> Self {
        self.epic_choice = Some(epic_id.to_string());
        self
    }

    pub fn offered_epics(&self) -> Vec<Vec<String>> {
        self.offered_epics.borrow().clone()
    }

    pub fn confirmations(&self) -> Vec<String> {
        self.confirmations.borrow().clone()
    }

    pub fn asked_actions(&self) -> Vec<(String, u32)> {
        self.asked_actions.borrow().clone()
    }
}

impl Prompter for ScriptedPrompter {
    fn select_epic(&self, epics: &[Epic]) -> Result<Option<String>> {
        self.offered_epics
            .borrow_mut()
            .push(epics.iter().map(|epic| epic.id.clone()).collect());
        Ok(self.epic_choice.clone())
    }

    fn confirm(&self, message: &str, _default: bool) -> Result<bool> {
        self.confirmations.borrow_mut().push(message.to_string());
        Ok(self
            .confirm_answers
            .borrow_mut()
            .pop_front()
            .unwrap_or(self.confirm_default))
    }

    fn max_iterations_action(
        &self,
        story_id: &str,
        iterations: u32,
    ) -> Result<MaxIterationsAction> {
        self.asked_actions
            .borrow_mut()
            .push((story_id.to_string(), iterations));
        self.actions
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("unexpected max-iterations prompt for {story_id}"))
    }
}

/// A BMAD project in a temp directory.
pub struct TestProject {
    temp: TempDir,
    paths: ProjectPaths,
    git: Cell<bool>,
}

impl TestProject {
    /// Create `_bmad/bmm/config.yaml` and the output directories.
    pub fn new() -> Result<Self> {
        let temp = tempfile::tempdir().context("create temp dir")?;
        let paths = ProjectPaths::new(temp.path());
        write_file(
            &paths.bmad_config_path,
            "project_name: demo\nuser_name: tester\n",
        )?;
        fs::create_dir_all(&paths.epics_dir).context("create epics dir")?;
        fs::create_dir_all(&paths.stories_dir).context("create stories dir")?;
        Ok(Self {
            temp,
            paths,
            git: Cell::new(false),
        })
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    pub fn paths(&self) -> &ProjectPaths {
        &self.paths
    }

    pub fn write_sprint_status(&self, yaml: &str) -> Result<()> {
        write_file(&self.paths.sprint_status_path, yaml)
    }

    /// Write `planning-artifacts/<epic_id>.md`.
    pub fn write_epic(&self, epic_id: &str, markdown: &str) -> Result<()> {
        write_file(&self.paths.epics_dir.join(format!("{epic_id}.md")), markdown)
    }

    /// Write `implementation-artifacts/<story_id>.md`.
    pub fn write_story(&self, story_id: &str, markdown: &str) -> Result<()> {
        write_file(
            &self.paths.stories_dir.join(format!("{story_id}.md")),
            markdown,
        )
    }

    pub fn epic(&self, epic_id: &str) -> Result<Epic> {
        load_epics(&self.paths.epics_dir)
            .into_iter()
            .find(|epic| epic.id == epic_id)
            .ok_or_else(|| anyhow!("epic {epic_id} not found"))
    }

    pub fn story_status(&self, id: &str) -> Option<String> {
        load_sprint_status(&self.paths.sprint_status_path)?
            .status_of(id)
            .map(str::to_string)
    }

    /// Turn the project into a git repository with a local identity.
    pub fn init_git(&self) -> Result<()> {
        self.git_cmd(&["init", "-q"])?;
        self.git_cmd(&["config", "user.email", "loop@example.com"])?;
        self.git_cmd(&["config", "user.name", "Loop"])?;
        self.git_cmd(&["config", "commit.gpgsign", "false"])?;
        self.git.set(true);
        Ok(())
    }

    pub fn last_commit_message(&self) -> Result<String> {
        Git::new(self.root()).head_subject()
    }

    /// Loop context over this project with no retry backoff.
    pub fn context<'a, A: AgentRunner, P: Prompter>(
        &self,
        runner: &'a A,
        prompter: &'a P,
    ) -> LoopContext<'a, A, P> {
        let settings = RunSettings {
            retry_backoff: Duration::ZERO,
            ..RunSettings::default()
        };
        let git = self.git.get().then(|| Git::new(self.root()));
        LoopContext::new(self.paths.clone(), settings, runner, prompter, git)
    }

    fn git_cmd(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(self.root())
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))?;
        if !output.status.success() {
            return Err(anyhow!(
                "git {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    fs::write(path, contents).with_context(|| format!("write {}", path.display()))
}
