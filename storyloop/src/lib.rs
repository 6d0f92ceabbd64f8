//! Resumable orchestration of AI agents over BMAD epics and stories.
//!
//! The loop picks an epic (saved session, then sprint status, then the
//! operator), creates missing story files, alternates dev and review agents
//! until a review passes, commits, and records progress in both the shared
//! sprint-status document and a local session checkpoint.
//!
//! - **[`core`]**: Pure logic (status classification, work discovery, markdown
//!   parsing). No I/O.
//! - **[`io`]**: Filesystem stores, agent processes, git and the terminal.
//!
//! Orchestration modules ([`resolve`], [`iteration`], [`epic_loop`]) combine
//! the two through a [`context::LoopContext`].

pub mod agents;
pub mod console;
pub mod context;
pub mod core;
pub mod epic_loop;
pub mod exit_codes;
pub mod io;
pub mod iteration;
pub mod logging;
pub mod resolve;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
