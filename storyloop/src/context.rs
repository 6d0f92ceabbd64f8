//! Everything one orchestrator run needs, passed explicitly instead of globals.

use anyhow::Result;

use crate::console::Console;
use crate::io::agent::AgentRunner;
use crate::io::config::RunSettings;
use crate::io::git::Git;
use crate::io::project::ProjectPaths;
use crate::io::prompt::PromptEngine;
use crate::io::prompter::Prompter;
use crate::io::session_state::{SessionState, save_session_state};

pub struct LoopContext<'a, A: AgentRunner, P: Prompter> {
    pub paths: ProjectPaths,
    pub settings: RunSettings,
    pub runner: &'a A,
    pub prompter: &'a P,
    pub prompts: PromptEngine,
    /// `None` when the project is not a git repository (commits are skipped).
    pub git: Option<Git>,
    pub console: Console,
}

impl<'a, A: AgentRunner, P: Prompter> LoopContext<'a, A, P> {
    pub fn new(
        paths: ProjectPaths,
        settings: RunSettings,
        runner: &'a A,
        prompter: &'a P,
        git: Option<Git>,
    ) -> Self {
        let console = Console::new(settings.verbose);
        Self {
            paths,
            settings,
            runner,
            prompter,
            prompts: PromptEngine::new(),
            git,
            console,
        }
    }

    /// Write the session checkpoint. Failures are fatal: resume depends on it.
    pub fn persist(&self, state: &mut SessionState) -> Result<()> {
        save_session_state(&self.paths.session_state_path, state)
    }
}
