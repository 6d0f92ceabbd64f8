//! BMAD project layout: canonical paths, pre-flight checks and markdown loading.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::core::markdown::{parse_epic, parse_story};
use crate::core::types::{Epic, Story};
use crate::io::sprint_status::load_sprint_status;

/// All canonical paths for a project root.
#[derive(Debug, Clone)]
pub struct ProjectPaths {
    pub root: PathBuf,
    pub bmad_dir: PathBuf,
    pub bmad_config_path: PathBuf,
    pub output_dir: PathBuf,
    pub epics_dir: PathBuf,
    pub stories_dir: PathBuf,
    pub sprint_status_path: PathBuf,
    pub session_state_path: PathBuf,
    pub loop_config_path: PathBuf,
}

impl ProjectPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let bmad_dir = root.join("_bmad");
        let output_dir = root.join("_bmad-output");
        let stories_dir = output_dir.join("implementation-artifacts");
        Self {
            root: root.clone(),
            bmad_config_path: bmad_dir.join("bmm").join("config.yaml"),
            bmad_dir,
            epics_dir: output_dir.join("planning-artifacts"),
            sprint_status_path: stories_dir.join("sprint-status.yaml"),
            stories_dir,
            output_dir,
            session_state_path: root.join(".storyloop-state.json"),
            loop_config_path: root.join(".storyloop.toml"),
        }
    }

    /// True when the root has `_bmad/` and `_bmad/bmm/config.yaml`.
    pub fn is_bmad_project(&self) -> bool {
        self.bmad_dir.is_dir() && self.bmad_config_path.is_file()
    }

    pub fn ensure_output_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("create {}", self.output_dir.display()))
    }

    /// Project name from `_bmad/bmm/config.yaml`, if it can be read.
    pub fn project_name(&self) -> Option<String> {
        let contents = fs::read_to_string(&self.bmad_config_path).ok()?;
        let value: serde_yaml::Value = serde_yaml::from_str(&contents).ok()?;
        value
            .get("project")
            .and_then(|project| project.get("name"))
            .or_else(|| value.get("project_name"))
            .and_then(|name| name.as_str())
            .map(str::to_string)
    }

    /// Name for the run banner: BMAD config, then the sprint status `project`
    /// field, then the root directory name.
    pub fn display_name(&self) -> String {
        self.project_name()
            .or_else(|| {
                load_sprint_status(&self.sprint_status_path)
                    .and_then(|doc| doc.project().map(str::to_string))
            })
            .or_else(|| {
                self.root
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| self.root.display().to_string())
    }
}

/// Load every `epic-*.md` file under the planning directory, sorted by file name.
///
/// Epic files are planning data: a missing directory yields an empty list and
/// an unreadable file is skipped with a warning.
pub fn load_epics(epics_dir: &Path) -> Vec<Epic> {
    let entries = match fs::read_dir(epics_dir) {
        Ok(entries) => entries,
        Err(err) => {
            debug!(dir = %epics_dir.display(), err = %err, "epics directory not readable");
            return Vec::new();
        }
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|name| name.starts_with("epic-") && name.ends_with(".md"))
        })
        .collect();
    files.sort();

    let epics: Vec<Epic> = files
        .iter()
        .filter_map(|path| match fs::read_to_string(path) {
            Ok(contents) => Some(parse_epic(&contents, path)),
            Err(err) => {
                warn!(path = %path.display(), err = %err, "skipping unreadable epic file");
                None
            }
        })
        .collect();
    debug!(count = epics.len(), "epics loaded");
    epics
}

/// Find the markdown file for a story (case-insensitive id substring match).
pub fn find_story_file(stories_dir: &Path, story_id: &str) -> Option<PathBuf> {
    let needle = story_id.to_lowercase();
    let mut matches: Vec<PathBuf> = fs::read_dir(stories_dir)
        .ok()?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|name| name.ends_with(".md") && name.to_lowercase().contains(&needle))
        })
        .collect();
    matches.sort();
    matches.into_iter().next()
}

pub fn story_file_exists(stories_dir: &Path, story_id: &str) -> bool {
    find_story_file(stories_dir, story_id).is_some()
}

/// Load and parse a story file. Returns `None` when no file matches or it cannot be read.
pub fn load_story(stories_dir: &Path, story_id: &str) -> Option<Story> {
    let path = find_story_file(stories_dir, story_id)?;
    match fs::read_to_string(&path) {
        Ok(contents) => Some(parse_story(&contents, story_id, &path)),
        Err(err) => {
            debug!(path = %path.display(), err = %err, "failed to read story file");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project() -> (tempfile::TempDir, ProjectPaths) {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = ProjectPaths::new(temp.path());
        (temp, paths)
    }

    #[test]
    fn detects_bmad_project_marker() {
        let (_temp, paths) = project();
        assert!(!paths.is_bmad_project());

        fs::create_dir_all(paths.bmad_config_path.parent().expect("parent")).expect("mkdir");
        assert!(!paths.is_bmad_project());

        fs::write(&paths.bmad_config_path, "project:\n  name: kana\n").expect("write");
        assert!(paths.is_bmad_project());
        assert_eq!(paths.project_name().as_deref(), Some("kana"));
    }

    #[test]
    fn display_name_falls_back_to_sprint_status_then_directory() {
        let (temp, paths) = project();
        let dir_name = temp
            .path()
            .file_name()
            .expect("name")
            .to_string_lossy()
            .into_owned();
        assert_eq!(paths.display_name(), dir_name);

        fs::create_dir_all(&paths.stories_dir).expect("mkdir");
        fs::write(
            &paths.sprint_status_path,
            "project: kana-quizz\ndevelopment_status: {}\n",
        )
        .expect("write");
        assert_eq!(paths.display_name(), "kana-quizz");

        fs::create_dir_all(paths.bmad_config_path.parent().expect("parent")).expect("mkdir");
        fs::write(&paths.bmad_config_path, "project_name: kana\n").expect("write");
        assert_eq!(paths.display_name(), "kana");
    }

    #[test]
    fn loads_only_epic_markdown_files() {
        let (_temp, paths) = project();
        fs::create_dir_all(&paths.epics_dir).expect("mkdir");
        fs::write(
            paths.epics_dir.join("epic-2.md"),
            "# Second\n\n## Stories\n\n- 2-1-a: A\n",
        )
        .expect("write");
        fs::write(paths.epics_dir.join("epic-1.md"), "# First\n").expect("write");
        fs::write(paths.epics_dir.join("prd.md"), "# PRD\n").expect("write");

        let epics = load_epics(&paths.epics_dir);
        let ids: Vec<&str> = epics.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["epic-1", "epic-2"]);
        assert_eq!(epics[1].stories.len(), 1);
    }

    #[test]
    fn missing_epics_dir_is_empty() {
        let (_temp, paths) = project();
        assert!(load_epics(&paths.epics_dir).is_empty());
    }

    #[test]
    fn unreadable_epic_file_is_skipped() {
        let (_temp, paths) = project();
        fs::create_dir_all(&paths.epics_dir).expect("mkdir");
        fs::write(
            paths.epics_dir.join("epic-1.md"),
            "# First\n\n## Stories\n\n- 1-1-a: A\n",
        )
        .expect("write");
        fs::write(paths.epics_dir.join("epic-2.md"), [0xff, 0xfe, b'\n']).expect("write");

        let epics = load_epics(&paths.epics_dir);
        let ids: Vec<&str> = epics.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["epic-1"]);
    }

    #[test]
    fn story_lookup_is_case_insensitive() {
        let (_temp, paths) = project();
        fs::create_dir_all(&paths.stories_dir).expect("mkdir");
        fs::write(
            paths.stories_dir.join("1-1-Login-Form.md"),
            "# Login\n\n## Acceptance Criteria\n\n- [ ] renders\n",
        )
        .expect("write");

        assert!(story_file_exists(&paths.stories_dir, "1-1-login-form"));
        assert!(!story_file_exists(&paths.stories_dir, "1-2-logout"));

        let story = load_story(&paths.stories_dir, "1-1-login-form").expect("story");
        assert_eq!(story.title, "Login");
        assert_eq!(story.acceptance_criteria.len(), 1);
    }
}
