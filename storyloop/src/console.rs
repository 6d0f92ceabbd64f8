//! Operator-facing console output.
//!
//! Everything the operator is meant to read goes through [`Console`]; `tracing`
//! stays a developer diagnostic. The console carries the session start time so
//! each line can report elapsed time without global state.

use std::time::{Duration, Instant};

use chrono::Local;
use colored::{ColoredString, Colorize};

use crate::core::duration::format_duration;
use crate::io::agent::AgentRole;
use crate::io::process::StreamLabels;

const RULE_WIDTH: usize = 60;

#[derive(Debug, Clone)]
pub struct Console {
    started: Instant,
    verbose: bool,
}

impl Console {
    pub fn new(verbose: bool) -> Self {
        Self {
            started: Instant::now(),
            verbose,
        }
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Time since the session started.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn info(&self, message: &str) {
        println!("{}", self.line("INFO".blue(), message));
    }

    pub fn success(&self, message: &str) {
        println!("{}", self.line("OK".green().bold(), message));
    }

    pub fn warn(&self, message: &str) {
        println!("{}", self.line("WARN".yellow().bold(), message));
    }

    pub fn error(&self, message: &str) {
        eprintln!("{}", self.line("ERROR".red().bold(), message));
    }

    /// Only printed in verbose mode.
    pub fn debug(&self, message: &str) {
        if self.verbose {
            println!("{}", self.line("DEBUG".dimmed(), message));
        }
    }

    pub fn header(&self, title: &str) {
        let rule = "═".repeat(RULE_WIDTH);
        println!();
        println!("{}", rule.bold());
        println!("{}", title.bold());
        println!("{}", rule.bold());
    }

    pub fn sub_header(&self, title: &str) {
        println!();
        println!("{} {} {}", "──".dimmed(), title.bold(), "──".dimmed());
    }

    /// Numbered step marker, e.g. `[2/4] Running dev agent`.
    pub fn step(&self, current: usize, total: usize, message: &str) {
        println!(
            "{}",
            self.line(format!("[{current}/{total}]").cyan(), message)
        );
    }

    /// Report how long an agent invocation took.
    pub fn agent_finished(&self, role: AgentRole, took: Duration) {
        let message = format!(
            "{} agent finished {}",
            role.label(),
            format!("(agent: {})", format_duration(took)).dimmed()
        );
        println!("{}", self.line("OK".green().bold(), &message));
    }

    /// Line prefixes for an agent's output; only labeled in verbose mode.
    pub fn agent_labels(&self, role: AgentRole) -> Option<StreamLabels> {
        if !self.verbose {
            return None;
        }
        let out = format!("[{}]", role.label());
        let err = format!("[{}:ERR]", role.label());
        Some(StreamLabels {
            stdout: format!("{} ", role_color(role, &out)),
            stderr: format!("{} ", role_color(role, &err)),
        })
    }

    fn line(&self, level: ColoredString, message: &str) -> String {
        format_line(
            &Local::now().format("%H:%M:%S").to_string(),
            &level.to_string(),
            message,
            self.elapsed(),
        )
    }
}

fn role_color(role: AgentRole, text: &str) -> ColoredString {
    match role {
        AgentRole::ScrumMaster => text.cyan(),
        AgentRole::StoryCreator => text.magenta(),
        AgentRole::Dev => text.blue(),
        AgentRole::Review => text.yellow(),
    }
}

fn format_line(clock: &str, level: &str, message: &str, elapsed: Duration) -> String {
    format!(
        "[{clock}] {level} {message} {}",
        format!("({})", format_duration(elapsed)).dimmed()
    )
}
