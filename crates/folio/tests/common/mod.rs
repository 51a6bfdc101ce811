//! Shared test utilities for folio integration tests.
//!
//! This module provides:
//! - `TestHarness` wiring an in-memory database to fake renderer and mailer
//! - Builders for seeding catalog data and writing configuration files

pub mod builders;
pub mod fakes;
pub mod harness;

pub use builders::*;
pub use fakes::{RecordingMailer, ScriptedSerials, StubRenderer};
pub use harness::TestHarness;
