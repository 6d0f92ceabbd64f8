//! Session state storage for crash-safe resume (`.storyloop-state.json`).

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Persisted resume checkpoint for the epic being worked on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    /// Epic id in marker form (`epic-3`).
    pub current_epic: String,
    /// Index into the epic's story list of the story being worked on.
    pub current_story_index: usize,
    /// Dev-review iteration in progress for the current story (0 = not started).
    pub dev_review_iteration: u32,
    /// Story ids finished during this session, without duplicates.
    pub completed_stories: Vec<String>,
    /// RFC 3339 timestamp of the last save.
    pub last_updated: String,
}

impl SessionState {
    pub fn new(epic_id: impl Into<String>) -> Self {
        Self {
            current_epic: epic_id.into(),
            current_story_index: 0,
            dev_review_iteration: 0,
            completed_stories: Vec::new(),
            last_updated: now(),
        }
    }

    pub fn is_completed(&self, story_id: &str) -> bool {
        self.completed_stories.iter().any(|id| id == story_id)
    }

    /// Record a story as completed. Returns false if it was already recorded.
    pub fn mark_completed(&mut self, story_id: &str) -> bool {
        if self.is_completed(story_id) {
            return false;
        }
        self.completed_stories.push(story_id.to_string());
        true
    }
}

/// Load session state. A missing or unparsable file means "no active session".
pub fn load_session_state(path: &Path) -> Option<SessionState> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(_) => {
            debug!(path = %path.display(), "no session state file");
            return None;
        }
    };
    match serde_json::from_str::<SessionState>(&contents) {
        Ok(state) => {
            debug!(
                epic = %state.current_epic,
                story_index = state.current_story_index,
                iteration = state.dev_review_iteration,
                "session state loaded"
            );
            Some(state)
        }
        Err(err) => {
            debug!(path = %path.display(), err = %err, "ignoring unparsable session state");
            None
        }
    }
}

/// Stamp `last_updated` and atomically write session state (temp file + rename).
pub fn save_session_state(path: &Path, state: &mut SessionState) -> Result<()> {
    state.last_updated = now();
    debug!(
        path = %path.display(),
        epic = %state.current_epic,
        story_index = state.current_story_index,
        iteration = state.dev_review_iteration,
        "writing session state"
    );
    let mut buf = serde_json::to_string_pretty(state).context("serialize session state")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

/// Delete the session state file. A missing file is not an error.
pub fn clear_session_state(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => {
            debug!(path = %path.display(), "cleared session state");
            Ok(())
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err).with_context(|| format!("remove {}", path.display())),
    }
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("session state path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp session state {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .with_context(|| format!("replace session state {}", path.display()))?;
    Ok(())
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_state_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(".storyloop-state.json");

        let mut state = SessionState::new("epic-3");
        state.current_story_index = 2;
        state.dev_review_iteration = 4;
        state.mark_completed("3-1-a");

        save_session_state(&path, &mut state).expect("save");
        let loaded = load_session_state(&path).expect("load");
        assert_eq!(loaded, state);
    }

    #[test]
    fn serializes_camel_case_fields() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("state.json");
        let mut state = SessionState::new("epic-1");
        save_session_state(&path, &mut state).expect("save");

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).expect("read")).expect("json");
        for key in [
            "currentEpic",
            "currentStoryIndex",
            "devReviewIteration",
            "completedStories",
            "lastUpdated",
        ] {
            assert!(raw.get(key).is_some(), "missing {key}");
        }
    }

    #[test]
    fn missing_or_corrupt_file_is_no_session() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("state.json");
        assert!(load_session_state(&path).is_none());

        fs::write(&path, "{ not json").expect("write");
        assert!(load_session_state(&path).is_none());
    }

    #[test]
    fn completed_stories_stay_unique() {
        let mut state = SessionState::new("epic-1");
        assert!(state.mark_completed("1-1-a"));
        assert!(!state.mark_completed("1-1-a"));
        assert_eq!(state.completed_stories, vec!["1-1-a".to_string()]);
    }

    #[test]
    fn clear_tolerates_missing_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("state.json");
        clear_session_state(&path).expect("clear missing");

        let mut state = SessionState::new("epic-1");
        save_session_state(&path, &mut state).expect("save");
        clear_session_state(&path).expect("clear");
        assert!(!path.exists());
    }
}
