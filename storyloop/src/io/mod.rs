//! Side-effecting adapters: filesystem stores, processes, git and the terminal.

pub mod agent;
pub mod config;
pub mod git;
pub mod process;
pub mod project;
pub mod prompt;
pub mod prompter;
pub mod session_state;
pub mod sprint_status;
