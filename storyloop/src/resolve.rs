//! Deciding which epic to work on and where to start inside it.
//!
//! Sources, in priority order: the saved session (crash recovery), ongoing work
//! in the sprint status, then an interactive selection after a sprint check.

use anyhow::{Result, anyhow, bail};
use tracing::debug;

use crate::agents::{AgentTask, invoke_with_retry};
use crate::context::LoopContext;
use crate::core::locator::find_ongoing_work;
use crate::core::status::epic_key;
use crate::core::types::{OngoingWork, WorkSource};
use crate::io::agent::AgentRunner;
use crate::io::project::load_epics;
use crate::io::prompter::Prompter;
use crate::io::session_state::{SessionState, clear_session_state, load_session_state};
use crate::io::sprint_status::load_sprint_status;

/// Outcome of the three-way resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A saved session names the epic and story index.
    Resumed(SessionState),
    /// The sprint status has actionable work.
    Discovered(OngoingWork),
    /// Nothing to pick up; the operator must choose an epic.
    FreshSelection,
}

/// Pick the highest-priority source that has an answer.
pub fn resolve_work(session: Option<SessionState>, entries: &[(String, String)]) -> Resolution {
    if let Some(state) = session {
        return Resolution::Resumed(state);
    }
    match find_ongoing_work(entries) {
        Some(work) => Resolution::Discovered(work),
        None => Resolution::FreshSelection,
    }
}

/// Where the epic loop starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartPoint {
    pub state: SessionState,
    /// Actionable stories of the epic, used when its file is missing or empty.
    pub ongoing: Option<OngoingWork>,
}

/// Resolve the starting epic, asking before resuming unless told not to.
pub fn start_session<A: AgentRunner, P: Prompter>(
    ctx: &LoopContext<'_, A, P>,
) -> Result<StartPoint> {
    let session = confirm_resume(ctx, load_session_state(&ctx.paths.session_state_path))?;
    let entries = load_sprint_status(&ctx.paths.sprint_status_path)
        .map(|doc| doc.entries())
        .unwrap_or_default();

    match resolve_work(session, &entries) {
        Resolution::Resumed(mut state) => {
            state.current_epic = epic_key(&state.current_epic);
            ctx.console.info(&format!(
                "Resuming {} from story #{} (iteration {})",
                state.current_epic,
                state.current_story_index + 1,
                state.dev_review_iteration
            ));
            let ongoing = find_ongoing_work(&entries)
                .filter(|work| work.epic_id == state.current_epic)
                .map(|work| OngoingWork {
                    source: WorkSource::SessionState,
                    ..work
                });
            Ok(StartPoint { state, ongoing })
        }
        Resolution::Discovered(work) => {
            let ids: Vec<String> = work.stories.iter().map(ToString::to_string).collect();
            ctx.console.info(&format!(
                "Found ongoing work in {}: {}",
                work.epic_id,
                ids.join(", ")
            ));
            Ok(StartPoint {
                state: SessionState::new(work.epic_id.clone()),
                ongoing: Some(work),
            })
        }
        Resolution::FreshSelection => fresh_selection(ctx),
    }
}

fn confirm_resume<A: AgentRunner, P: Prompter>(
    ctx: &LoopContext<'_, A, P>,
    session: Option<SessionState>,
) -> Result<Option<SessionState>> {
    let Some(state) = session else {
        return Ok(None);
    };
    if ctx.settings.resume || ctx.settings.yolo {
        return Ok(Some(state));
    }
    let question = format!(
        "Resume {} from story #{}?",
        state.current_epic,
        state.current_story_index + 1
    );
    if ctx.prompter.confirm(&question, true)? {
        return Ok(Some(state));
    }
    clear_session_state(&ctx.paths.session_state_path)?;
    ctx.console.info("Saved session cleared");
    Ok(None)
}

fn fresh_selection<A: AgentRunner, P: Prompter>(
    ctx: &LoopContext<'_, A, P>,
) -> Result<StartPoint> {
    ctx.console
        .info("No ongoing work found; running sprint status check");
    invoke_with_retry(ctx, &AgentTask::SprintCheck)?;

    let epics = load_epics(&ctx.paths.epics_dir);
    if epics.is_empty() {
        bail!("no epic files found in {}", ctx.paths.epics_dir.display());
    }
    debug!(count = epics.len(), "offering epics");
    let chosen = ctx
        .prompter
        .select_epic(&epics)?
        .ok_or_else(|| anyhow!("no epic selected"))?;
    Ok(StartPoint {
        state: SessionState::new(epic_key(&chosen)),
        ongoing: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::session_state::save_session_state;
    use crate::test_support::{ScriptedAgentRunner, ScriptedPrompter, ScriptedRun, TestProject};

    fn entries(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn session_wins_over_sprint_status() {
        let state = SessionState::new("epic-2");
        let resolution = resolve_work(Some(state.clone()), &entries(&[("1-1-a", "backlog")]));
        assert_eq!(resolution, Resolution::Resumed(state));
    }

    #[test]
    fn sprint_status_is_used_without_session() {
        let resolution = resolve_work(None, &entries(&[("3-1-a", "review")]));
        let Resolution::Discovered(work) = resolution else {
            panic!("expected discovered work");
        };
        assert_eq!(work.epic_id, "epic-3");
        assert_eq!(work.source, WorkSource::SprintStatus);
    }

    #[test]
    fn nothing_found_needs_selection() {
        let resolution = resolve_work(None, &entries(&[("1-1-a", "done")]));
        assert_eq!(resolution, Resolution::FreshSelection);
    }

    #[test]
    fn declining_resume_clears_session_and_discovers() {
        let project = TestProject::new().expect("project");
        project
            .write_sprint_status("development_status:\n  2-1-a: backlog\n")
            .expect("status");
        let mut saved = SessionState::new("epic-1");
        save_session_state(&project.paths().session_state_path, &mut saved).expect("save");

        let runner = ScriptedAgentRunner::new(Vec::new());
        let prompter = ScriptedPrompter::default().answering(vec![false]);
        let ctx = project.context(&runner, &prompter);

        let start = start_session(&ctx).expect("start");
        assert_eq!(start.state.current_epic, "epic-2");
        assert!(!project.paths().session_state_path.exists());
        assert_eq!(prompter.confirmations(), vec!["Resume epic-1 from story #1?"]);
    }

    #[test]
    fn resume_flag_skips_the_question() {
        let project = TestProject::new().expect("project");
        let mut saved = SessionState::new("epic-4");
        saved.current_story_index = 2;
        save_session_state(&project.paths().session_state_path, &mut saved).expect("save");

        let runner = ScriptedAgentRunner::new(Vec::new());
        let prompter = ScriptedPrompter::default();
        let mut ctx = project.context(&runner, &prompter);
        ctx.settings.resume = true;

        let start = start_session(&ctx).expect("start");
        assert_eq!(start.state.current_story_index, 2);
        assert!(prompter.confirmations().is_empty());
    }

    #[test]
    fn fresh_start_runs_sprint_check_then_selection() {
        let project = TestProject::new().expect("project");
        project
            .write_epic("epic-1", "# Epic 1\n\n## Stories\n\n- [ ] 1-1-a: A\n")
            .expect("epic");
        let runner = ScriptedAgentRunner::new(vec![ScriptedRun::ok()]);
        let prompter = ScriptedPrompter::default().choosing_epic("epic-1");
        let ctx = project.context(&runner, &prompter);

        let start = start_session(&ctx).expect("start");
        assert_eq!(start.state.current_epic, "epic-1");
        assert_eq!(start.state.current_story_index, 0);
        assert_eq!(prompter.offered_epics(), vec![vec!["epic-1".to_string()]]);
        assert_eq!(runner.requests().len(), 1);
    }

    #[test]
    fn fresh_start_without_epics_is_an_error() {
        let project = TestProject::new().expect("project");
        let runner = ScriptedAgentRunner::new(vec![ScriptedRun::ok()]);
        let prompter = ScriptedPrompter::default();
        let ctx = project.context(&runner, &prompter);

        let err = start_session(&ctx).unwrap_err();
        assert!(err.to_string().contains("no epic files found"));
    }
}
