//! Shared types for the orchestration core.
//!
//! These types carry no I/O. Epics and stories are produced by the markdown
//! parsers or synthesized from the sprint-status document; [`OngoingWork`] is a
//! derived view that is recomputed on demand and never persisted.

use std::fmt;
use std::path::PathBuf;

use crate::core::status::{self, DONE};

/// A story as listed inside an epic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpicStory {
    pub id: String,
    pub title: String,
    pub status: Option<String>,
}

impl EpicStory {
    /// True when the epic file or sprint status already records the story as done.
    pub fn is_done(&self) -> bool {
        self.status.as_deref() == Some(DONE)
    }
}

impl From<&StoryStatus> for EpicStory {
    fn from(story: &StoryStatus) -> Self {
        Self {
            id: story.id.clone(),
            title: story.id.clone(),
            status: Some(story.status.clone()),
        }
    }
}

/// A grouping of stories identified by `epic-<N>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Epic {
    pub id: String,
    pub title: String,
    pub stories: Vec<EpicStory>,
    /// Markdown file the epic was parsed from; `None` when synthesized.
    pub file_path: Option<PathBuf>,
}

impl Epic {
    /// Build an epic from sprint-status story entries when no usable file exists.
    pub fn synthesized(epic_id: &str, stories: &[StoryStatus]) -> Self {
        Self {
            id: status::epic_key(epic_id),
            title: format!("Epic {}", status::epic_number(epic_id)),
            stories: stories.iter().map(EpicStory::from).collect(),
            file_path: None,
        }
    }

    pub fn story_ids(&self) -> Vec<String> {
        self.stories.iter().map(|story| story.id.clone()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptanceCriterion {
    pub text: String,
    pub done: bool,
}

/// Full story detail, loaded lazily right before the story is worked on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Story {
    pub id: String,
    pub title: String,
    pub acceptance_criteria: Vec<AcceptanceCriterion>,
    pub file_path: PathBuf,
}

impl Story {
    pub fn criteria_checked(&self) -> usize {
        self.acceptance_criteria.iter().filter(|ac| ac.done).count()
    }
}

/// A story id with its recorded sprint status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryStatus {
    pub id: String,
    pub status: String,
}

impl StoryStatus {
    pub fn new(id: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: status.into(),
        }
    }
}

impl fmt::Display for StoryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.status)
    }
}

/// Where a piece of ongoing work was discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkSource {
    SessionState,
    SprintStatus,
}

/// Epic with actionable stories, derived from the sprint-status document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OngoingWork {
    pub epic_id: String,
    pub stories: Vec<StoryStatus>,
    pub source: WorkSource,
}

/// Escape hatch chosen when a story exhausts its dev-review iterations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxIterationsAction {
    /// Reset the iteration counter and run the same story again.
    Continue,
    /// Run one final dev pass, then mark the story complete.
    Complete,
    /// Leave the story incomplete and move to the next one.
    Skip,
    /// Persist state and stop the process.
    Abort,
}

impl MaxIterationsAction {
    pub const ALL: [MaxIterationsAction; 4] = [
        MaxIterationsAction::Continue,
        MaxIterationsAction::Complete,
        MaxIterationsAction::Skip,
        MaxIterationsAction::Abort,
    ];

    pub fn describe(self) -> &'static str {
        match self {
            MaxIterationsAction::Continue => "Continue (reset iteration counter)",
            MaxIterationsAction::Complete => "Mark as complete (run final dev pass, then commit)",
            MaxIterationsAction::Skip => "Skip story (leave it incomplete)",
            MaxIterationsAction::Abort => "Abort (exit, resume later)",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthesized_epic_uses_marker_id_and_story_ids_as_titles() {
        let epic = Epic::synthesized(
            "8",
            &[
                StoryStatus::new("8-2-b", "backlog"),
                StoryStatus::new("8-3-c", "done"),
            ],
        );
        assert_eq!(epic.id, "epic-8");
        assert_eq!(epic.title, "Epic 8");
        assert_eq!(epic.stories[0].title, "8-2-b");
        assert!(!epic.stories[0].is_done());
        assert!(epic.stories[1].is_done());
        assert!(epic.file_path.is_none());
    }

    #[test]
    fn criteria_checked_counts_done_items() {
        let mut story = Story {
            id: "1-1-a".to_string(),
            title: "A".to_string(),
            acceptance_criteria: Vec::new(),
            file_path: PathBuf::from("1-1-a.md"),
        };
        assert_eq!(story.criteria_checked(), 0);

        story.acceptance_criteria = vec![
            AcceptanceCriterion {
                text: "one".to_string(),
                done: true,
            },
            AcceptanceCriterion {
                text: "two".to_string(),
                done: false,
            },
        ];
        assert_eq!(story.criteria_checked(), 1);
    }
}
