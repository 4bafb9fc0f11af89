//! Shared test utilities for plagcheck integration tests.
//!
//! - `TestHarness`: an isolated media root, database and config per test
//! - builders for fixture PDF and DOCX uploads
//! - in-process `WebSearch` fakes

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::TestHarness;
