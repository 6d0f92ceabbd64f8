//! Deterministic, pure logic shared by the orchestrator.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data (status entries, markdown text, byte chunks) and return deterministic
//! outputs suitable for tests.

pub mod duration;
pub mod locator;
pub mod markdown;
pub mod status;
pub mod stream;
pub mod types;
