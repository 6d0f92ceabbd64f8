//! Interactive questions asked of the operator.
//!
//! The loop only talks to the [`Prompter`] trait so tests can answer questions
//! from a script. [`TerminalPrompter`] reads answers line by line.

use std::cell::RefCell;
use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use colored::Colorize;

use crate::core::types::{Epic, MaxIterationsAction};

pub trait Prompter {
    /// Ask which epic to work on. `None` means the operator chose nothing.
    fn select_epic(&self, epics: &[Epic]) -> Result<Option<String>>;

    /// Yes/no question; an empty answer takes `default`.
    fn confirm(&self, message: &str, default: bool) -> Result<bool>;

    /// Ask what to do with a story that used up its dev-review iterations.
    fn max_iterations_action(&self, story_id: &str, iterations: u32)
    -> Result<MaxIterationsAction>;
}

/// Prompter over a line reader and a writer (stdin/stdout in production).
pub struct TerminalPrompter<R, W> {
    input: RefCell<R>,
    output: RefCell<W>,
}

impl TerminalPrompter<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> TerminalPrompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input: RefCell::new(input),
            output: RefCell::new(output),
        }
    }

    /// Print `question` and read one line. `None` on end of input.
    fn ask(&self, question: &str) -> Result<Option<String>> {
        {
            let mut out = self.output.borrow_mut();
            write!(out, "{question}").context("write prompt")?;
            out.flush().context("flush prompt")?;
        }
        let mut line = String::new();
        let read = self
            .input
            .borrow_mut()
            .read_line(&mut line)
            .context("read answer")?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn say(&self, text: &str) -> Result<()> {
        writeln!(self.output.borrow_mut(), "{text}").context("write prompt")
    }
}

impl<R: BufRead, W: Write> Prompter for TerminalPrompter<R, W> {
    fn select_epic(&self, epics: &[Epic]) -> Result<Option<String>> {
        if epics.is_empty() {
            return Ok(None);
        }
        self.say(&format!("\n{}", "Available epics:".bold()))?;
        for (i, epic) in epics.iter().enumerate() {
            self.say(&format!(
                "  {}. {} {} ({} stories)",
                i + 1,
                epic.id.cyan(),
                epic.title,
                epic.stories.len()
            ))?;
        }
        loop {
            let Some(answer) = self.ask(&format!("Select an epic [1-{}]: ", epics.len()))? else {
                return Ok(None);
            };
            if answer.is_empty() {
                return Ok(None);
            }
            match parse_choice(&answer, epics.len()) {
                Some(index) => return Ok(Some(epics[index].id.clone())),
                None => self.say(&format!("{}", "Invalid selection, try again.".yellow()))?,
            }
        }
    }

    fn confirm(&self, message: &str, default: bool) -> Result<bool> {
        let hint = if default { "[Y/n]" } else { "[y/N]" };
        loop {
            let Some(answer) = self.ask(&format!("{message} {hint}: "))? else {
                return Ok(default);
            };
            match parse_confirm(&answer, default) {
                Some(yes) => return Ok(yes),
                None => self.say(&format!("{}", "Please answer y or n.".yellow()))?,
            }
        }
    }

    fn max_iterations_action(
        &self,
        story_id: &str,
        iterations: u32,
    ) -> Result<MaxIterationsAction> {
        let headline = format!(
            "Story {story_id} reached {iterations} dev-review iterations without passing review."
        );
        self.say(&format!("\n{}", headline.yellow().bold()))?;
        for (i, action) in MaxIterationsAction::ALL.iter().enumerate() {
            self.say(&format!("  {}. {}", i + 1, action.describe()))?;
        }
        loop {
            let Some(answer) = self.ask("Choose an action [1-4]: ")? else {
                return Ok(MaxIterationsAction::Abort);
            };
            match parse_choice(&answer, MaxIterationsAction::ALL.len()) {
                Some(index) => return Ok(MaxIterationsAction::ALL[index]),
                None => self.say(&format!("{}", "Invalid selection, try again.".yellow()))?,
            }
        }
    }
}

/// Parse a 1-based menu answer into a 0-based index.
fn parse_choice(answer: &str, len: usize) -> Option<usize> {
    answer
        .trim()
        .parse::<usize>()
        .ok()
        .filter(|n| (1..=len).contains(n))
        .map(|n| n - 1)
}

fn parse_confirm(answer: &str, default: bool) -> Option<bool> {
    match answer.trim().to_ascii_lowercase().as_str() {
        "" => Some(default),
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}
