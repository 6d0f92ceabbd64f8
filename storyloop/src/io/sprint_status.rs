//! Shared sprint-status document (`sprint-status.yaml`).
//!
//! The document is written by external agents as well as by the orchestrator,
//! so it is kept as an ordered YAML mapping: unknown top-level fields and key
//! order survive a parse → mutate → serialize round trip. Reads are tolerant
//! and writes are best-effort; neither ever fails the caller.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde_yaml::{Mapping, Value};
use tracing::{debug, instrument, warn};

use crate::core::status::{self, DONE};

const DEVELOPMENT_STATUS: &str = "development_status";

/// Parsed sprint-status document.
#[derive(Debug, Clone, PartialEq)]
pub struct SprintStatus {
    root: Mapping,
}

impl SprintStatus {
    pub fn parse(contents: &str) -> Result<Self> {
        let value: Value = serde_yaml::from_str(contents).context("parse sprint status yaml")?;
        match value {
            Value::Mapping(root) => Ok(Self { root }),
            Value::Null => Ok(Self {
                root: Mapping::new(),
            }),
            _ => Err(anyhow!("sprint status root must be a mapping")),
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(&self.root).context("serialize sprint status yaml")
    }

    /// `development_status` entries in document order.
    ///
    /// Unquoted numeric keys (`3: done`) are read as their text. Entries whose
    /// key or value is not a scalar string are skipped.
    pub fn entries(&self) -> Vec<(String, String)> {
        let Some(map) = self.statuses() else {
            return Vec::new();
        };
        map.iter()
            .filter_map(|(key, value)| Some((key_text(key)?, value.as_str()?.to_string())))
            .collect()
    }

    pub fn status_of(&self, id: &str) -> Option<&str> {
        let map = self.statuses()?;
        map.get(find_key(map, id)?).and_then(Value::as_str)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.statuses()
            .is_some_and(|map| find_key(map, id).is_some())
    }

    pub fn project(&self) -> Option<&str> {
        self.root.get("project").and_then(Value::as_str)
    }

    /// Set the status of `id`, creating `development_status` if needed. An
    /// existing key keeps its position and its YAML type.
    pub fn set_status(&mut self, id: &str, status: &str) {
        let entry = self
            .root
            .entry(Value::from(DEVELOPMENT_STATUS))
            .or_insert(Value::Mapping(Mapping::new()));
        if !entry.is_mapping() {
            *entry = Value::Mapping(Mapping::new());
        }
        if let Value::Mapping(map) = entry {
            let key = find_key(map, id)
                .cloned()
                .unwrap_or_else(|| Value::from(id));
            map.insert(key, Value::from(status));
        }
    }

    fn statuses(&self) -> Option<&Mapping> {
        self.root.get(DEVELOPMENT_STATUS)?.as_mapping()
    }

    /// Mark an epic and all of its stories `done`.
    ///
    /// Writes `epic-<N>` always, and the bare `<N>` key only when the document
    /// already uses it.
    pub fn mark_epic_complete(&mut self, epic_id: &str, story_ids: &[String]) {
        let number = status::epic_number(epic_id);
        self.set_status(&status::epic_key(epic_id), DONE);
        if self.contains(number) {
            self.set_status(number, DONE);
        }
        for id in story_ids {
            self.set_status(id, DONE);
        }
    }
}

/// Load the sprint status. Missing or malformed documents yield `None`.
pub fn load_sprint_status(path: &Path) -> Option<SprintStatus> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) => {
            debug!(path = %path.display(), err = %err, "sprint status not readable");
            return None;
        }
    };
    match SprintStatus::parse(&contents) {
        Ok(status) => Some(status),
        Err(err) => {
            debug!(
                path = %path.display(),
                err = %format!("{err:#}"),
                "sprint status not parseable"
            );
            None
        }
    }
}

/// Set one story's status. Best-effort: failures are logged and reported as `false`.
#[instrument(skip_all, fields(story_id, status))]
pub fn update_story_status(path: &Path, story_id: &str, status: &str) -> bool {
    best_effort(path, |doc| doc.set_status(story_id, status))
}

/// Mark an epic and its stories done. Best-effort like [`update_story_status`].
#[instrument(skip_all, fields(epic_id, stories = story_ids.len()))]
pub fn mark_epic_complete(path: &Path, epic_id: &str, story_ids: &[String]) -> bool {
    best_effort(path, |doc| doc.mark_epic_complete(epic_id, story_ids))
}

/// Text of a status key: strings as-is, numbers as written (`3`).
fn key_text(key: &Value) -> Option<String> {
    match key {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn find_key<'a>(map: &'a Mapping, id: &str) -> Option<&'a Value> {
    map.keys().find(|key| key_text(key).as_deref() == Some(id))
}

fn best_effort(path: &Path, mutate: impl FnOnce(&mut SprintStatus)) -> bool {
    match read_modify_write(path, mutate) {
        Ok(()) => true,
        Err(err) => {
            warn!(
                path = %path.display(),
                err = %format!("{err:#}"),
                "failed to update sprint status"
            );
            false
        }
    }
}

fn read_modify_write(path: &Path, mutate: impl FnOnce(&mut SprintStatus)) -> Result<()> {
    // The document is owned by the planning workflow; never create it here.
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let mut doc =
        SprintStatus::parse(&contents).with_context(|| format!("parse {}", path.display()))?;
    mutate(&mut doc);
    fs::write(path, doc.to_yaml()?).with_context(|| format!("write {}", path.display()))
}
