//! Prompt rendering for agent invocations.

use std::path::Path;

use anyhow::Result;
use minijinja::{Environment, context};
use serde::Serialize;

use crate::core::status::DONE;
use crate::core::types::EpicStory;

const SPRINT_CHECK_TEMPLATE: &str = include_str!("prompts/sprint_check.md");
const CREATE_STORY_TEMPLATE: &str = include_str!("prompts/create_story.md");
const DEV_STORY_TEMPLATE: &str = include_str!("prompts/dev_story.md");
const CODE_REVIEW_TEMPLATE: &str = include_str!("prompts/code_review.md");

/// Workflow engine every BMAD workflow is executed through.
const WORKFLOW_ENGINE: &str = "_bmad/core/tasks/workflow.xml";
/// Directory holding the implementation-phase workflow configs.
const WORKFLOWS_DIR: &str = "_bmad/bmm/workflows/4-implementation";

/// Stdout marker a review agent prints when it passed but could not record it.
pub const REVIEW_PASSED_SENTINEL: &str = "REVIEW_PASSED";

/// Story fields exposed to templates.
#[derive(Debug, Clone, Serialize)]
struct StoryContext {
    id: String,
    title: String,
    file: String,
}

/// Template engine wrapper around minijinja.
pub struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.add_template("sprint_check", SPRINT_CHECK_TEMPLATE)
            .expect("sprint_check template should be valid");
        env.add_template("create_story", CREATE_STORY_TEMPLATE)
            .expect("create_story template should be valid");
        env.add_template("dev_story", DEV_STORY_TEMPLATE)
            .expect("dev_story template should be valid");
        env.add_template("code_review", CODE_REVIEW_TEMPLATE)
            .expect("code_review template should be valid");
        Self { env }
    }

    pub fn render_sprint_check(&self) -> Result<String> {
        let template = self.env.get_template("sprint_check")?;
        Ok(template.render(context! {
            workflow_engine => WORKFLOW_ENGINE,
            workflows_dir => WORKFLOWS_DIR,
        })?)
    }

    pub fn render_create_story(&self, story: &EpicStory, epic_id: &str) -> Result<String> {
        let template = self.env.get_template("create_story")?;
        let story = StoryContext {
            id: story.id.clone(),
            title: story.title.clone(),
            file: String::new(),
        };
        Ok(template.render(context! {
            workflow_engine => WORKFLOW_ENGINE,
            workflows_dir => WORKFLOWS_DIR,
            story => story,
            epic_id => epic_id,
        })?)
    }

    pub fn render_dev_story(&self, story_id: &str, story_file: &Path) -> Result<String> {
        self.render_story_workflow("dev_story", story_id, story_file)
    }

    pub fn render_code_review(&self, story_id: &str, story_file: &Path) -> Result<String> {
        self.render_story_workflow("code_review", story_id, story_file)
    }

    fn render_story_workflow(
        &self,
        name: &str,
        story_id: &str,
        story_file: &Path,
    ) -> Result<String> {
        let template = self.env.get_template(name)?;
        let story = StoryContext {
            id: story_id.to_string(),
            title: String::new(),
            file: story_file.display().to_string(),
        };
        Ok(template.render(context! {
            workflow_engine => WORKFLOW_ENGINE,
            workflows_dir => WORKFLOWS_DIR,
            story => story,
            done_status => DONE,
            sentinel => REVIEW_PASSED_SENTINEL,
        })?)
    }
}

impl Default for PromptEngine {
    fn default() -> Self {
        Self::new()
    }
}
