//! Agent tasks: which role runs, on which model tier, with which tools and prompt.
//!
//! Every invocation in the loop goes through [`invoke_with_retry`]: one attempt,
//! a fixed backoff, one more attempt, then a [`FatalAgentError`].

use std::fmt;
use std::path::Path;
use std::thread;

use anyhow::Result;
use tracing::{instrument, warn};

use crate::context::LoopContext;
use crate::core::types::EpicStory;
use crate::io::agent::{AgentRequest, AgentRole, AgentRun, AgentRunner};
use crate::io::prompt::PromptEngine;
use crate::io::prompter::Prompter;

pub mod review;

const FULL_TOOLS: &[&str] = &["Read", "Write", "Edit", "Bash", "Glob", "Grep"];
const AUTHORING_TOOLS: &[&str] = &["Read", "Write", "Edit", "Glob", "Grep"];

/// Model class an agent runs on; mapped to a concrete model by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityTier {
    Fast,
    Capable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentProfile {
    pub role: AgentRole,
    pub tier: CapabilityTier,
    pub allowed_tools: &'static [&'static str],
}

/// One unit of agent work.
#[derive(Debug, Clone, Copy)]
pub enum AgentTask<'a> {
    /// Refresh or create the sprint status (fresh start only).
    SprintCheck,
    CreateStory {
        story: &'a EpicStory,
        epic_id: &'a str,
    },
    Dev {
        story_id: &'a str,
        story_file: &'a Path,
    },
    Review {
        story_id: &'a str,
        story_file: &'a Path,
    },
}

impl AgentTask<'_> {
    pub fn profile(&self) -> AgentProfile {
        match self {
            AgentTask::SprintCheck => AgentProfile {
                role: AgentRole::ScrumMaster,
                tier: CapabilityTier::Capable,
                allowed_tools: FULL_TOOLS,
            },
            AgentTask::CreateStory { .. } => AgentProfile {
                role: AgentRole::StoryCreator,
                tier: CapabilityTier::Capable,
                allowed_tools: AUTHORING_TOOLS,
            },
            AgentTask::Dev { .. } => AgentProfile {
                role: AgentRole::Dev,
                tier: CapabilityTier::Fast,
                allowed_tools: FULL_TOOLS,
            },
            AgentTask::Review { .. } => AgentProfile {
                role: AgentRole::Review,
                tier: CapabilityTier::Capable,
                allowed_tools: FULL_TOOLS,
            },
        }
    }

    pub fn prompt(&self, prompts: &PromptEngine) -> Result<String> {
        match self {
            AgentTask::SprintCheck => prompts.render_sprint_check(),
            AgentTask::CreateStory { story, epic_id } => {
                prompts.render_create_story(story, epic_id)
            }
            AgentTask::Dev {
                story_id,
                story_file,
            } => prompts.render_dev_story(story_id, story_file),
            AgentTask::Review {
                story_id,
                story_file,
            } => prompts.render_code_review(story_id, story_file),
        }
    }
}

/// An agent failed on both attempts. Stops the whole run.
#[derive(Debug)]
pub struct FatalAgentError {
    pub role: AgentRole,
    pub cause: String,
}

impl fmt::Display for FatalAgentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} agent failed after retry: {}",
            self.role.label(),
            self.cause
        )
    }
}

impl std::error::Error for FatalAgentError {}

fn build_request<A: AgentRunner, P: Prompter>(
    ctx: &LoopContext<'_, A, P>,
    task: &AgentTask<'_>,
) -> Result<AgentRequest> {
    let profile = task.profile();
    let model = match profile.tier {
        CapabilityTier::Fast => &ctx.settings.fast_model,
        CapabilityTier::Capable => &ctx.settings.capable_model,
    };
    Ok(AgentRequest {
        workdir: ctx.paths.root.clone(),
        role: profile.role,
        model: model.clone(),
        prompt: task.prompt(&ctx.prompts)?,
        allowed_tools: profile
            .allowed_tools
            .iter()
            .map(|tool| (*tool).to_string())
            .collect(),
        labels: ctx.console.agent_labels(profile.role),
    })
}

fn run_once<A: AgentRunner, P: Prompter>(
    ctx: &LoopContext<'_, A, P>,
    request: &AgentRequest,
) -> Result<AgentRun> {
    let run = ctx.runner.run(request)?;
    ctx.console.agent_finished(request.role, run.duration);
    Ok(run)
}

/// Single attempt, no retry.
pub fn invoke<A: AgentRunner, P: Prompter>(
    ctx: &LoopContext<'_, A, P>,
    task: &AgentTask<'_>,
) -> Result<AgentRun> {
    let request = build_request(ctx, task)?;
    run_once(ctx, &request)
}

/// Run a task, retrying exactly once after the configured backoff.
#[instrument(skip_all, fields(role = task.profile().role.label()))]
pub fn invoke_with_retry<A: AgentRunner, P: Prompter>(
    ctx: &LoopContext<'_, A, P>,
    task: &AgentTask<'_>,
) -> Result<AgentRun> {
    let request = build_request(ctx, task)?;
    let first = match run_once(ctx, &request) {
        Ok(run) => return Ok(run),
        Err(err) => err,
    };

    warn!(err = %format!("{first:#}"), "agent attempt failed, retrying");
    ctx.console.warn(&format!(
        "{} agent failed ({first:#}); retrying in {}s",
        request.role.label(),
        ctx.settings.retry_backoff.as_secs()
    ));
    thread::sleep(ctx.settings.retry_backoff);

    run_once(ctx, &request).map_err(|second| {
        anyhow::Error::new(FatalAgentError {
            role: request.role,
            cause: format!("{second:#}"),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedAgentRunner, ScriptedPrompter, ScriptedRun, TestProject};

    #[test]
    fn profiles_follow_the_catalogue() {
        let story = EpicStory {
            id: "1-1-a".to_string(),
            title: "A".to_string(),
            status: None,
        };
        let file = Path::new("1-1-a.md");
        let create = AgentTask::CreateStory {
            story: &story,
            epic_id: "epic-1",
        }
        .profile();
        assert_eq!(create.role, AgentRole::StoryCreator);
        assert!(!create.allowed_tools.contains(&"Bash"));

        let dev = AgentTask::Dev {
            story_id: "1-1-a",
            story_file: file,
        }
        .profile();
        assert_eq!(dev.tier, CapabilityTier::Fast);
        assert!(dev.allowed_tools.contains(&"Bash"));

        assert_eq!(AgentTask::SprintCheck.profile().tier, CapabilityTier::Capable);
        assert_eq!(
            AgentTask::Review {
                story_id: "1-1-a",
                story_file: file
            }
            .profile()
            .tier,
            CapabilityTier::Capable
        );
    }

    #[test]
    fn request_uses_tier_model_and_project_root() {
        let project = TestProject::new().expect("project");
        let runner = ScriptedAgentRunner::new(vec![ScriptedRun::ok()]);
        let prompter = ScriptedPrompter::default();
        let ctx = project.context(&runner, &prompter);

        invoke_with_retry(
            &ctx,
            &AgentTask::Dev {
                story_id: "1-1-a",
                story_file: Path::new("1-1-a.md"),
            },
        )
        .expect("invoke");

        let requests = runner.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model, "sonnet");
        assert_eq!(requests[0].workdir, project.root());
        assert!(requests[0].prompt.contains("dev-story/workflow.yaml"));
        assert_eq!(requests[0].allowed_tools.join(","), "Read,Write,Edit,Bash,Glob,Grep");
    }

    #[test]
    fn one_failure_is_retried() {
        let project = TestProject::new().expect("project");
        let runner = ScriptedAgentRunner::new(vec![ScriptedRun::fail(), ScriptedRun::ok()]);
        let prompter = ScriptedPrompter::default();
        let ctx = project.context(&runner, &prompter);

        invoke_with_retry(&ctx, &AgentTask::SprintCheck).expect("second attempt succeeds");
        assert_eq!(runner.requests().len(), 2);
    }

    #[test]
    fn two_failures_are_fatal() {
        let project = TestProject::new().expect("project");
        let runner = ScriptedAgentRunner::new(vec![ScriptedRun::fail(), ScriptedRun::fail()]);
        let prompter = ScriptedPrompter::default();
        let ctx = project.context(&runner, &prompter);

        let err = invoke_with_retry(&ctx, &AgentTask::SprintCheck).unwrap_err();
        let fatal = err.downcast_ref::<FatalAgentError>().expect("fatal agent error");
        assert_eq!(fatal.role, AgentRole::ScrumMaster);
        assert_eq!(runner.requests().len(), 2);
    }
}
