//! Testing utilities for toolkit runs.
//!
//! This module provides:
//! - [`Recorder`], tools that record their calls under the `test` namespace
//! - Fixtures building settings, toolkits and contexts
//! - [`ENV_LOCK`] for tests that touch process environment variables

mod fixtures;
mod recording;

pub use fixtures::{context_from, settings_in, test_toolkit, write_file, ENV_LOCK, TEST_VERSION};
pub use recording::Recorder;
