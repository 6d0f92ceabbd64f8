//! Epic loop driver: resolve an epic, work its stories, finalize, move on.

use anyhow::{Result, bail};
use tracing::{debug, instrument, warn};

use crate::context::LoopContext;
use crate::core::locator::{all_stories_for_epic, find_ongoing_work};
use crate::core::status::epic_key;
use crate::core::types::{Epic, OngoingWork};
use crate::io::agent::AgentRunner;
use crate::io::project::load_epics;
use crate::io::prompter::Prompter;
use crate::io::session_state::{SessionState, clear_session_state};
use crate::io::sprint_status::{load_sprint_status, mark_epic_complete};
use crate::iteration::{StoryOutcome, run_story};
use crate::resolve::start_session;

/// Why the loop returned normally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopStop {
    /// No work left anywhere.
    Finished { epics_completed: usize },
    /// More work exists but the operator chose to stop.
    Declined { next_epic: String },
}

/// Run epics until no work remains or the operator stops.
pub fn run_loop<A: AgentRunner, P: Prompter>(ctx: &LoopContext<'_, A, P>) -> Result<LoopStop> {
    let start = start_session(ctx)?;
    let mut state = start.state;
    let mut ongoing = start.ongoing;
    let mut epics_completed = 0;

    loop {
        let epic = prepare_epic(ctx, &state.current_epic, ongoing.as_ref())?;
        run_epic(ctx, &epic, &mut state)?;
        finalize_epic(ctx, &epic)?;
        epics_completed += 1;

        let Some(next) = next_work(ctx) else {
            ctx.console.success("No remaining work found");
            return Ok(LoopStop::Finished { epics_completed });
        };
        if next.epic_id == epic.id {
            // Finalizing did not stick (best-effort write); do not spin on it.
            warn!(epic = %epic.id, "finished epic still reported as ongoing");
            ctx.console.warn(&format!(
                "{} still has actionable stories in the sprint status; stopping",
                epic.id
            ));
            return Ok(LoopStop::Finished { epics_completed });
        }

        let go_on = ctx.settings.yolo
            || ctx
                .prompter
                .confirm(&format!("Continue with {}?", next.epic_id), true)?;
        if !go_on {
            return Ok(LoopStop::Declined {
                next_epic: next.epic_id,
            });
        }
        state = SessionState::new(next.epic_id.clone());
        ongoing = Some(next);
    }
}

/// Load the epic, falling back to the sprint status when the file is missing
/// or lists no stories.
#[instrument(skip_all, fields(epic_id))]
pub fn prepare_epic<A: AgentRunner, P: Prompter>(
    ctx: &LoopContext<'_, A, P>,
    epic_id: &str,
    ongoing: Option<&OngoingWork>,
) -> Result<Epic> {
    let key = epic_key(epic_id);
    let entries = load_sprint_status(&ctx.paths.sprint_status_path)
        .map(|doc| doc.entries())
        .unwrap_or_default();
    let from_file = load_epics(&ctx.paths.epics_dir)
        .into_iter()
        .find(|epic| epic.id == key);

    let epic = match from_file {
        Some(mut epic) => {
            if epic.stories.is_empty() {
                let stories = all_stories_for_epic(&entries, &key);
                if !stories.is_empty() {
                    debug!(
                        count = stories.len(),
                        "epic file lists no stories, using sprint status"
                    );
                    epic.stories = Epic::synthesized(&key, &stories).stories;
                }
            }
            epic
        }
        None => {
            let stories = match ongoing.filter(|work| work.epic_id == key) {
                Some(work) if !work.stories.is_empty() => work.stories.clone(),
                _ => all_stories_for_epic(&entries, &key),
            };
            if stories.is_empty() {
                bail!("no epic file and no sprint-status stories for {key}");
            }
            ctx.console.info(&format!(
                "No epic file for {key}; using {} stories from sprint status",
                stories.len()
            ));
            Epic::synthesized(&key, &stories)
        }
    };
    Ok(epic)
}

/// Work every story from the saved index onward.
fn run_epic<A: AgentRunner, P: Prompter>(
    ctx: &LoopContext<'_, A, P>,
    epic: &Epic,
    state: &mut SessionState,
) -> Result<()> {
    ctx.console.header(&format!("{}: {}", epic.id, epic.title));
    state.current_epic = epic.id.clone();
    ctx.persist(state)?;

    while state.current_story_index < epic.stories.len() {
        let index = state.current_story_index;
        let outcome = run_story(ctx, epic, index, state)?;
        debug!(index, ?outcome, "story finished");
        if outcome == StoryOutcome::MissingStoryFile {
            ctx.console.warn(&format!(
                "Story {} skipped: no story file",
                epic.stories[index].id
            ));
        }
        state.current_story_index = index + 1;
        state.dev_review_iteration = 0;
        ctx.persist(state)?;
    }
    Ok(())
}

/// Mark the epic and its stories done, then drop the session checkpoint.
fn finalize_epic<A: AgentRunner, P: Prompter>(
    ctx: &LoopContext<'_, A, P>,
    epic: &Epic,
) -> Result<()> {
    if !mark_epic_complete(&ctx.paths.sprint_status_path, &epic.id, &epic.story_ids()) {
        ctx.console.warn(&format!(
            "Could not mark {} done in {}",
            epic.id,
            ctx.paths.sprint_status_path.display()
        ));
    }
    clear_session_state(&ctx.paths.session_state_path)?;
    ctx.console.success(&format!("{} complete", epic.id));
    Ok(())
}

fn next_work<A: AgentRunner, P: Prompter>(ctx: &LoopContext<'_, A, P>) -> Option<OngoingWork> {
    let doc = load_sprint_status(&ctx.paths.sprint_status_path)?;
    find_ongoing_work(&doc.entries())
}
