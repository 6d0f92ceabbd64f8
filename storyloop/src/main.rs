//! Resumable dev → review → commit loop over the stories of BMAD epics.
//!
//! Run from a project root. Progress is checkpointed in `.storyloop-state.json`
//! so an interrupted run picks up where it stopped.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;

use storyloop::agents::FatalAgentError;
use storyloop::console::Console;
use storyloop::context::LoopContext;
use storyloop::core::duration::format_duration;
use storyloop::epic_loop::{LoopStop, run_loop};
use storyloop::exit_codes;
use storyloop::io::agent::ClaudeRunner;
use storyloop::io::config::{CliOverrides, RunSettings, load_config, parse_max_iterations};
use storyloop::io::git::Git;
use storyloop::io::project::ProjectPaths;
use storyloop::io::prompter::TerminalPrompter;
use storyloop::iteration::AbortRequested;
use storyloop::logging;

const RESUME_HINT: &str = "Run storyloop again to resume from the saved session.";

#[derive(Parser, Debug)]
#[command(
    name = "storyloop",
    version,
    about = "Drive BMAD stories through dev, review and commit with an AI agent"
)]
struct Cli {
    /// Resume the saved session without asking.
    #[arg(short, long)]
    resume: bool,

    /// Label agent output per role and print debug lines.
    #[arg(short, long)]
    verbose: bool,

    /// Dev-review iterations per story before escalating (positive integer).
    #[arg(short = 'm', long, value_name = "N", allow_hyphen_values = true)]
    max_iterations: Option<String>,

    /// Unattended: auto-continue, auto-complete at the bound, auto-commit.
    #[arg(short, long)]
    yolo: bool,
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    std::process::exit(run(&cli));
}

fn run(cli: &Cli) -> i32 {
    let console = Console::new(cli.verbose);
    let prepared = match preflight(cli, &console) {
        Ok(prepared) => prepared,
        Err(err) => {
            console.error(&format!("{err:#}"));
            return exit_codes::FAILURE;
        }
    };

    let prompter = TerminalPrompter::stdio();
    let ctx = LoopContext::new(
        prepared.paths,
        prepared.settings,
        &prepared.runner,
        &prompter,
        prepared.git,
    );

    match run_loop(&ctx) {
        Ok(LoopStop::Finished { epics_completed }) => {
            ctx.console.success(&format!(
                "All work complete: {epics_completed} epic(s) in {}",
                format_duration(ctx.console.elapsed())
            ));
            exit_codes::OK
        }
        Ok(LoopStop::Declined { next_epic }) => {
            ctx.console
                .info(&format!("Stopped before {next_epic}. Run storyloop again to continue."));
            exit_codes::OK
        }
        Err(err) => {
            if let Some(abort) = err.downcast_ref::<AbortRequested>() {
                ctx.console.warn(&format!("{abort}"));
            } else if let Some(fatal) = err.downcast_ref::<FatalAgentError>() {
                ctx.console.error(&format!("{fatal}"));
            } else {
                ctx.console.error(&format!("{err:#}"));
            }
            ctx.console.info(RESUME_HINT);
            exit_codes::FAILURE
        }
    }
}

struct Prepared {
    paths: ProjectPaths,
    settings: RunSettings,
    runner: ClaudeRunner,
    git: Option<Git>,
}

/// Check the environment and build run settings.
fn preflight(cli: &Cli, console: &Console) -> Result<Prepared> {
    let root: PathBuf = std::env::current_dir().context("resolve current directory")?;
    let paths = ProjectPaths::new(&root);

    let max_iterations = cli.max_iterations.as_deref().and_then(|raw| {
        let parsed = parse_max_iterations(raw);
        if parsed.is_none() {
            console.warn(&format!(
                "Ignoring --max-iterations {raw:?}: expected a positive integer"
            ));
        }
        parsed
    });
    let overrides = CliOverrides {
        resume: cli.resume,
        verbose: cli.verbose,
        yolo: cli.yolo,
        max_iterations,
    };
    let cfg = load_config(&paths.loop_config_path)?;
    let settings = RunSettings::new(&cfg, &overrides);

    let runner = ClaudeRunner::new(&settings.agent_binary);
    if !runner.is_installed() {
        bail!(
            "`{} --version` failed; install the agent CLI or set agent_binary in {}",
            settings.agent_binary,
            paths.loop_config_path.display()
        );
    }
    if !paths.is_bmad_project() {
        bail!(
            "{} is not a BMAD project (expected _bmad/ and _bmad/bmm/config.yaml)",
            root.display()
        );
    }
    paths.ensure_output_dir()?;

    let git = Git::new(&root);
    let git = if git.is_repo() {
        Some(git)
    } else {
        console.warn("Not a git repository; story commits will be skipped");
        None
    };

    console.header(&format!("storyloop: {}", paths.display_name()));
    console.info(&format!(
        "Max iterations: {}, yolo: {}, models: {} (fast) / {} (capable)",
        settings.max_iterations, settings.yolo, settings.fast_model, settings.capable_model
    ));

    Ok(Prepared {
        paths,
        settings,
        runner,
        git,
    })
}
