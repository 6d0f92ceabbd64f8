//! Iteration controller: drives one story through create → dev/review → commit.
//!
//! The session checkpoint is written before every dev pass so an interrupted
//! run restarts the same iteration. Exhausting the iteration bound escalates to
//! the operator (or force-completes in unattended mode).

use std::fmt;

use anyhow::Result;
use tracing::{debug, instrument, warn};

use crate::agents::review::{PassSignal, ReviewOutcome, classify_review};
use crate::agents::{AgentTask, invoke, invoke_with_retry};
use crate::context::LoopContext;
use crate::core::status::DONE;
use crate::core::types::{Epic, EpicStory, MaxIterationsAction, Story};
use crate::io::agent::AgentRunner;
use crate::io::git::{CommitOutcome, story_commit_message};
use crate::io::project::{load_story, story_file_exists};
use crate::io::prompter::Prompter;
use crate::io::session_state::SessionState;
use crate::io::sprint_status::{load_sprint_status, update_story_status};

/// How a story left the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoryOutcome {
    /// Already in the completed set or recorded as done.
    AlreadyComplete,
    Completed {
        /// Marked complete at the iteration bound without a passing review.
        forced: bool,
        committed: bool,
    },
    /// Operator chose to leave the story incomplete.
    Skipped,
    /// No story file even after running the story creator.
    MissingStoryFile,
}

/// Operator chose to stop at the iteration bound. State has been saved.
#[derive(Debug)]
pub struct AbortRequested {
    pub story_id: String,
    pub iteration: u32,
}

impl fmt::Display for AbortRequested {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "aborted at story {} (iteration {})",
            self.story_id, self.iteration
        )
    }
}

impl std::error::Error for AbortRequested {}

enum DevReview {
    Passed,
    Exhausted,
}

/// Work the story at `story_index` of `epic` until it completes, is skipped, or
/// the run stops.
#[instrument(skip_all, fields(epic = %epic.id, story_index))]
pub fn run_story<A: AgentRunner, P: Prompter>(
    ctx: &LoopContext<'_, A, P>,
    epic: &Epic,
    story_index: usize,
    state: &mut SessionState,
) -> Result<StoryOutcome> {
    let Some(entry) = epic.stories.get(story_index) else {
        return Ok(StoryOutcome::AlreadyComplete);
    };
    let recorded_done = load_sprint_status(&ctx.paths.sprint_status_path)
        .is_some_and(|doc| doc.status_of(&entry.id) == Some(DONE));
    if state.is_completed(&entry.id) || entry.is_done() || recorded_done {
        ctx.console
            .info(&format!("Story {} already complete, skipping", entry.id));
        return Ok(StoryOutcome::AlreadyComplete);
    }

    ctx.console.sub_header(&format!(
        "Story {}/{}: {} - {}",
        story_index + 1,
        epic.stories.len(),
        entry.id,
        entry.title
    ));

    let Some(story) = ensure_story_file(ctx, epic, entry, state)? else {
        return Ok(StoryOutcome::MissingStoryFile);
    };
    ctx.console.info(&format!(
        "{}: {}/{} acceptance criteria checked",
        story.title,
        story.criteria_checked(),
        story.acceptance_criteria.len()
    ));

    loop {
        if let DevReview::Passed = dev_review_cycle(ctx, &story, state)? {
            let committed = complete_story(ctx, &story, state)?;
            return Ok(StoryOutcome::Completed {
                forced: false,
                committed,
            });
        }

        let action = if ctx.settings.yolo {
            MaxIterationsAction::Complete
        } else {
            ctx.prompter
                .max_iterations_action(&story.id, ctx.settings.max_iterations)?
        };
        debug!(story = %story.id, ?action, "iteration bound reached");

        match action {
            MaxIterationsAction::Continue => {
                ctx.console.info(&format!(
                    "Resetting iteration counter for {}",
                    story.id
                ));
                state.dev_review_iteration = 0;
                ctx.persist(state)?;
            }
            MaxIterationsAction::Complete => {
                ctx.console.warn(&format!(
                    "Max iterations reached for {}; running a final dev pass",
                    story.id
                ));
                final_dev_pass(ctx, &story);
                let committed = complete_story(ctx, &story, state)?;
                return Ok(StoryOutcome::Completed {
                    forced: true,
                    committed,
                });
            }
            MaxIterationsAction::Skip => {
                ctx.console
                    .warn(&format!("Skipping {} (left incomplete)", story.id));
                return Ok(StoryOutcome::Skipped);
            }
            MaxIterationsAction::Abort => {
                ctx.persist(state)?;
                return Err(AbortRequested {
                    story_id: story.id.clone(),
                    iteration: state.dev_review_iteration,
                }
                .into());
            }
        }
    }
}

/// Create the story file when missing, then load it.
fn ensure_story_file<A: AgentRunner, P: Prompter>(
    ctx: &LoopContext<'_, A, P>,
    epic: &Epic,
    entry: &EpicStory,
    state: &mut SessionState,
) -> Result<Option<Story>> {
    if !story_file_exists(&ctx.paths.stories_dir, &entry.id) {
        ctx.console
            .step(1, 4, &format!("Creating story file for {}", entry.id));
        ctx.persist(state)?;
        let task = AgentTask::CreateStory {
            story: entry,
            epic_id: &epic.id,
        };
        if let Err(err) = invoke_with_retry(ctx, &task) {
            ctx.persist(state)?;
            return Err(err);
        }
    }

    match load_story(&ctx.paths.stories_dir, &entry.id) {
        Some(story) => Ok(Some(story)),
        None => {
            warn!(story = %entry.id, "story file missing after creation");
            ctx.console.warn(&format!(
                "No story file found for {} in {}; skipping",
                entry.id,
                ctx.paths.stories_dir.display()
            ));
            Ok(None)
        }
    }
}

/// Run dev + review until a review passes or the bound is hit. Resumes at the
/// persisted iteration.
fn dev_review_cycle<A: AgentRunner, P: Prompter>(
    ctx: &LoopContext<'_, A, P>,
    story: &Story,
    state: &mut SessionState,
) -> Result<DevReview> {
    let max = ctx.settings.max_iterations;
    // A session saved under a larger bound still gets one pass at this one.
    let first = state.dev_review_iteration.clamp(1, max.max(1));

    for iteration in first..=max {
        state.dev_review_iteration = iteration;
        ctx.persist(state)?;

        ctx.console.step(
            2,
            4,
            &format!("Dev pass {iteration}/{max} for {}", story.id),
        );
        invoke_with_retry(
            ctx,
            &AgentTask::Dev {
                story_id: &story.id,
                story_file: &story.file_path,
            },
        )?;

        ctx.console
            .step(3, 4, &format!("Review {iteration}/{max} for {}", story.id));
        let review = invoke_with_retry(
            ctx,
            &AgentTask::Review {
                story_id: &story.id,
                story_file: &story.file_path,
            },
        )?;

        let status = load_sprint_status(&ctx.paths.sprint_status_path);
        match classify_review(status.as_ref(), &story.id, &review.stdout) {
            ReviewOutcome::Passed(signal) => {
                if signal == PassSignal::Sentinel {
                    ctx.console
                        .debug("Sprint status unreadable; review passed via sentinel");
                }
                ctx.console
                    .success(&format!("Review passed for {} on iteration {iteration}", story.id));
                return Ok(DevReview::Passed);
            }
            ReviewOutcome::NeedsWork => {
                ctx.console.info(&format!(
                    "Review requested changes for {} (iteration {iteration}/{max})",
                    story.id
                ));
            }
        }
    }
    Ok(DevReview::Exhausted)
}

/// Best-effort last dev pass before a forced completion.
fn final_dev_pass<A: AgentRunner, P: Prompter>(ctx: &LoopContext<'_, A, P>, story: &Story) {
    let task = AgentTask::Dev {
        story_id: &story.id,
        story_file: &story.file_path,
    };
    if let Err(err) = invoke(ctx, &task) {
        warn!(story = %story.id, err = %format!("{err:#}"), "final dev pass failed");
        ctx.console
            .warn(&format!("Final dev pass for {} failed: {err:#}", story.id));
    }
}

/// Commit, record completion and write the status back. Returns whether a
/// commit was made.
fn complete_story<A: AgentRunner, P: Prompter>(
    ctx: &LoopContext<'_, A, P>,
    story: &Story,
    state: &mut SessionState,
) -> Result<bool> {
    ctx.console.step(4, 4, &format!("Completing {}", story.id));
    let committed = commit_story(ctx, story)?;

    state.mark_completed(&story.id);
    state.dev_review_iteration = 0;
    if !update_story_status(&ctx.paths.sprint_status_path, &story.id, DONE) {
        ctx.console.warn(&format!(
            "Could not mark {} done in {}",
            story.id,
            ctx.paths.sprint_status_path.display()
        ));
    }
    ctx.persist(state)?;
    ctx.console.success(&format!("Story {} complete", story.id));
    Ok(committed)
}

fn commit_story<A: AgentRunner, P: Prompter>(
    ctx: &LoopContext<'_, A, P>,
    story: &Story,
) -> Result<bool> {
    let Some(git) = &ctx.git else {
        return Ok(false);
    };
    let message = story_commit_message(&story.id, &story.title);
    if !ctx.settings.yolo && !ctx.prompter.confirm(&format!("Commit \"{message}\"?"), true)? {
        ctx.console.info("Commit skipped");
        return Ok(false);
    }
    match git.commit_all(&message) {
        Ok(CommitOutcome::Committed { message, files }) => {
            ctx.console
                .success(&format!("Committed {files} file(s): {message}"));
            Ok(true)
        }
        Ok(CommitOutcome::NothingToCommit) => {
            ctx.console.info("Nothing to commit");
            Ok(false)
        }
        Err(err) => {
            warn!(err = %format!("{err:#}"), "git commit failed");
            ctx.console.warn(&format!("Git commit failed: {err:#}"));
            Ok(false)
        }
    }
}
