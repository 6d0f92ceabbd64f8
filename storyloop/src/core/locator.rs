//! Work discovery over the sprint-status document.

use crate::core::status::{self, IN_PROGRESS, StatusEntry};
use crate::core::types::{OngoingWork, StoryStatus, WorkSource};

/// Find the epic that still has actionable work.
///
/// The first actionable story (in document order) decides the epic; every
/// actionable story of that epic is returned. Without actionable stories, an
/// `in-progress` epic marker is only reported while at least one of its stories
/// is non-terminal, so a marker left stale by an external writer is ignored.
pub fn find_ongoing_work(entries: &[(String, String)]) -> Option<OngoingWork> {
    let classified = status::classify(entries);

    let first_actionable = classified.iter().find_map(|entry| match entry {
        StatusEntry::Story {
            epic_number,
            status,
            ..
        } if status::is_actionable(status) => Some(epic_number.as_str()),
        _ => None,
    });
    if let Some(number) = first_actionable {
        return Some(ongoing(number, &classified));
    }

    for entry in &classified {
        let StatusEntry::Epic { number, status, .. } = entry else {
            continue;
        };
        if status != IN_PROGRESS {
            continue;
        }
        let has_open_story =
            stories_of(number, &classified).any(|(_, status)| !status::is_terminal(status));
        if has_open_story {
            return Some(ongoing(number, &classified));
        }
    }

    None
}

/// Every story of `epic_id`, whatever its status. Epic marker keys are never included.
pub fn all_stories_for_epic(entries: &[(String, String)], epic_id: &str) -> Vec<StoryStatus> {
    let classified = status::classify(entries);
    let number = status::epic_number(epic_id);
    stories_of(number, &classified)
        .map(|(id, status)| StoryStatus::new(id, status))
        .collect()
}

fn ongoing(number: &str, classified: &[StatusEntry]) -> OngoingWork {
    let stories = stories_of(number, classified)
        .filter(|(_, status)| status::is_actionable(status))
        .map(|(id, status)| StoryStatus::new(id, status))
        .collect();
    OngoingWork {
        epic_id: status::epic_key(number),
        stories,
        source: WorkSource::SprintStatus,
    }
}

fn stories_of<'a>(
    number: &'a str,
    classified: &'a [StatusEntry],
) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
    classified.iter().filter_map(move |entry| match entry {
        StatusEntry::Story {
            id,
            epic_number,
            status,
        } if epic_number == number => Some((id.as_str(), status.as_str())),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn ids(work: &OngoingWork) -> Vec<&str> {
        work.stories.iter().map(|s| s.id.as_str()).collect()
    }

    #[test]
    fn empty_document_has_no_work() {
        assert_eq!(find_ongoing_work(&[]), None);
    }

    #[test]
    fn all_done_without_in_progress_epic_has_no_work() {
        let entries = doc(&[
            ("epic-1", "done"),
            ("1-1-a", "done"),
            ("1-2-b", "done"),
            ("epic-2", "backlog"),
            ("2-1-c", "blocked"),
        ]);
        assert_eq!(find_ongoing_work(&entries), None);
    }

    #[test]
    fn in_progress_story_selects_its_epic() {
        let entries = doc(&[
            ("epic-1", "in-progress"),
            ("1-1-a", "in-progress"),
            ("1-2-b", "done"),
        ]);
        let work = find_ongoing_work(&entries).expect("work");
        assert_eq!(work.epic_id, "epic-1");
        assert_eq!(work.stories, vec![StoryStatus::new("1-1-a", "in-progress")]);
        assert_eq!(work.source, WorkSource::SprintStatus);
    }

    #[test]
    fn backlog_stories_are_actionable() {
        let entries = doc(&[
            ("epic-8", "in-progress"),
            ("8-1-a", "done"),
            ("8-2-b", "backlog"),
            ("8-3-c", "backlog"),
        ]);
        let work = find_ongoing_work(&entries).expect("work");
        assert_eq!(work.epic_id, "epic-8");
        assert_eq!(ids(&work), vec!["8-2-b", "8-3-c"]);
    }

    #[test]
    fn first_actionable_story_wins_and_only_its_epic_is_returned() {
        let entries = doc(&[
            ("epic-2", "backlog"),
            ("2-1-a", "ready-for-dev"),
            ("3-1-b", "review"),
            ("2-2-c", "review"),
            ("2-3-d", "done"),
        ]);
        let work = find_ongoing_work(&entries).expect("work");
        assert_eq!(work.epic_id, "epic-2");
        assert_eq!(ids(&work), vec!["2-1-a", "2-2-c"]);
    }

    #[test]
    fn stale_in_progress_epic_is_ignored() {
        let entries = doc(&[("epic-4", "in-progress"), ("4-1-a", "done"), ("4-2-b", "done")]);
        assert_eq!(find_ongoing_work(&entries), None);
    }

    #[test]
    fn stale_epic_is_skipped_in_favour_of_a_live_one() {
        let entries = doc(&[
            ("epic-4", "in-progress"),
            ("4-1-a", "done"),
            ("epic-5", "in-progress"),
            ("5-1-a", "blocked"),
        ]);
        let work = find_ongoing_work(&entries).expect("work");
        assert_eq!(work.epic_id, "epic-5");
        // "blocked" keeps the epic open but is not itself actionable.
        assert!(work.stories.is_empty());
    }

    #[test]
    fn all_stories_for_epic_matches_prefix_only() {
        let entries = doc(&[
            ("epic-1", "in-progress"),
            ("epic-1-retrospective", "optional"),
            ("1-1-a", "done"),
            ("1-2-b", "backlog"),
            ("11-1-c", "backlog"),
            ("2-1-d", "backlog"),
        ]);
        let stories = all_stories_for_epic(&entries, "epic-1");
        assert_eq!(
            stories,
            vec![
                StoryStatus::new("1-1-a", "done"),
                StoryStatus::new("1-2-b", "backlog"),
            ]
        );
        assert_eq!(all_stories_for_epic(&entries, "11").len(), 1);
    }
}
