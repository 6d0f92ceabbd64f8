//! Classification of sprint-status entries.
//!
//! The `development_status` mapping mixes epic markers and story entries that are
//! only distinguished by key shape. Everything downstream works on the
//! [`StatusEntry`] variants produced here instead of re-deriving the distinction.

/// Prefix used by epic marker keys (`epic-8`, `epic-8-retrospective`).
pub const EPIC_PREFIX: &str = "epic-";

/// Terminal status value for stories and epics.
pub const DONE: &str = "done";

/// Status used for an epic marker whose stories are being worked on.
pub const IN_PROGRESS: &str = "in-progress";

/// Story statuses that count as work still to be picked up.
///
/// `backlog` and `pending` are included: stories that were planned but never
/// started are resumed by the loop just like stories left mid-review.
pub const ACTIONABLE_STATUSES: &[&str] = &[
    "review",
    "in-progress",
    "ready-for-dev",
    "backlog",
    "pending",
    "ready",
];

/// One classified `development_status` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEntry {
    /// An epic marker (`epic-<N>`, `epic-<N>-<suffix>` or a bare `<N>`).
    Epic {
        key: String,
        number: String,
        status: String,
    },
    /// A story whose epic number is its leading numeric token.
    Story {
        id: String,
        epic_number: String,
        status: String,
    },
}

impl StatusEntry {
    pub fn status(&self) -> &str {
        match self {
            StatusEntry::Epic { status, .. } | StatusEntry::Story { status, .. } => status,
        }
    }
}

/// Classify raw `(key, status)` pairs, preserving input order.
///
/// Keys that are neither an epic marker nor a story with a numeric epic token
/// are dropped.
pub fn classify(entries: &[(String, String)]) -> Vec<StatusEntry> {
    entries
        .iter()
        .filter_map(|(key, status)| classify_entry(key, status))
        .collect()
}

fn classify_entry(key: &str, status: &str) -> Option<StatusEntry> {
    if let Some(rest) = key.strip_prefix(EPIC_PREFIX) {
        let number = leading_token(rest)?;
        return Some(StatusEntry::Epic {
            key: key.to_string(),
            number: number.to_string(),
            status: status.to_string(),
        });
    }
    if is_numeric(key) {
        return Some(StatusEntry::Epic {
            key: key.to_string(),
            number: key.to_string(),
            status: status.to_string(),
        });
    }
    let epic_number = story_epic_number(key)?;
    Some(StatusEntry::Story {
        id: key.to_string(),
        epic_number: epic_number.to_string(),
        status: status.to_string(),
    })
}

/// Epic number of a story id (`8-2-pool-reset` → `8`).
pub fn story_epic_number(story_id: &str) -> Option<&str> {
    let (head, rest) = story_id.split_once('-')?;
    if rest.is_empty() || !is_numeric(head) {
        return None;
    }
    Some(head)
}

/// Numeric part of an epic id, accepting both `epic-8` and `8`.
pub fn epic_number(epic_id: &str) -> &str {
    epic_id.strip_prefix(EPIC_PREFIX).unwrap_or(epic_id)
}

/// Canonical marker key for an epic number or id.
pub fn epic_key(epic_id: &str) -> String {
    format!("{EPIC_PREFIX}{}", epic_number(epic_id))
}

pub fn is_terminal(status: &str) -> bool {
    status == DONE
}

pub fn is_actionable(status: &str) -> bool {
    ACTIONABLE_STATUSES.contains(&status)
}

fn leading_token(value: &str) -> Option<&str> {
    let token = value.split('-').next().unwrap_or_default();
    is_numeric(token).then_some(token)
}

fn is_numeric(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}
