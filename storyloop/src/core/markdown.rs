//! Parsers for epic and story markdown files.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::core::status::{self, DONE};
use crate::core::types::{AcceptanceCriterion, Epic, EpicStory, Story};

static CHECKBOX_STORY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^-\s+\[([ x])\]\s+(\w+-[\w-]+):\s*(.+)").unwrap());
static BULLET_STORY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^-\s+(\w+-[\w-]+):\s*(.+)").unwrap());
static NUMBERED_STORY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\d+\.\s+(\w+-[\w-]+):\s*(.+)").unwrap());
static CRITERION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-\s+\[([ xX])\]\s*(.+)").unwrap());
static STORIES_HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^##\s+.*stories").unwrap());
static CRITERIA_HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^##\s+.*acceptance.*criteria").unwrap());

/// Parse an `epic-<N>.md` file. The epic id comes from the file name.
pub fn parse_epic(content: &str, path: &Path) -> Epic {
    let raw_id = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .and_then(|stem| stem.strip_prefix(status::EPIC_PREFIX))
        .unwrap_or("unknown");
    let id = status::epic_key(raw_id);
    let title = first_heading(content).unwrap_or_else(|| format!("Epic {raw_id}"));

    let stories = section_lines(content, &STORIES_HEADING_RE)
        .filter_map(parse_story_line)
        .collect();

    Epic {
        id,
        title,
        stories,
        file_path: Some(path.to_path_buf()),
    }
}

/// Parse a story file into its title and acceptance criteria.
pub fn parse_story(content: &str, story_id: &str, path: &Path) -> Story {
    let title = first_heading(content).unwrap_or_else(|| format!("Story {story_id}"));
    let acceptance_criteria = section_lines(content, &CRITERIA_HEADING_RE)
        .filter_map(|line| {
            let caps = CRITERION_RE.captures(line)?;
            Some(AcceptanceCriterion {
                text: caps[2].trim().to_string(),
                done: !caps[1].trim().is_empty(),
            })
        })
        .collect();

    Story {
        id: story_id.to_string(),
        title,
        acceptance_criteria,
        file_path: path.to_path_buf(),
    }
}

fn parse_story_line(line: &str) -> Option<EpicStory> {
    if let Some(caps) = CHECKBOX_STORY_RE.captures(line) {
        let checked = caps[1].eq_ignore_ascii_case("x");
        return Some(EpicStory {
            id: caps[2].to_string(),
            title: caps[3].trim().to_string(),
            status: Some(if checked { DONE } else { "pending" }.to_string()),
        });
    }
    let caps = BULLET_STORY_RE
        .captures(line)
        .or_else(|| NUMBERED_STORY_RE.captures(line))?;
    Some(EpicStory {
        id: caps[1].to_string(),
        title: caps[2].trim().to_string(),
        status: None,
    })
}

fn first_heading(content: &str) -> Option<String> {
    content
        .lines()
        .find_map(|line| line.strip_prefix("# "))
        .map(|title| title.trim().to_string())
}

/// Lines between the `##` heading matching `heading` and the next `##` heading.
fn section_lines<'a>(content: &'a str, heading: &'a Regex) -> impl Iterator<Item = &'a str> + 'a {
    let mut inside = false;
    content.lines().filter(move |line| {
        if line.starts_with("## ") || line.starts_with("##\t") {
            inside = heading.is_match(line);
            return false;
        }
        inside
    })
}
