//! Fixtures for settings, toolkits and contexts.

use super::Recorder;
use crate::config::Settings;
use crate::context::Context;
use crate::errors::SosResult;
use crate::tools::Toolkit;
use parking_lot::Mutex;
use std::path::Path;

/// Toolkit version the fixtures run as.
pub const TEST_VERSION: &str = "1.0.0";

/// Serializes tests that read or write process environment variables.
pub static ENV_LOCK: Mutex<()> = parking_lot::const_mutex(());

/// Creates settings rooted at `dir`, independent of the process
/// environment.
#[must_use]
pub fn settings_in(dir: &Path) -> Settings {
    Settings::from_lookup(|_| None)
        .with_system_path(dir)
        .with_toolkit_version(TEST_VERSION)
}

/// Creates a toolkit with default settings and `recorder`'s tools.
#[must_use]
pub fn test_toolkit(recorder: &Recorder) -> Toolkit {
    recorder.toolkit(Settings::from_lookup(|_| None).with_toolkit_version(TEST_VERSION))
}

/// Materializes a context from YAML text.
///
/// # Errors
///
/// Fails if the text is not YAML or does not materialize.
pub fn context_from(yaml: &str) -> SosResult<Context> {
    let value: serde_json::Value = serde_yaml::from_str(yaml)?;
    Context::from_config(value)
}

/// Writes `body` to `dir/name`, creating parent directories.
///
/// # Errors
///
/// Propagates I/O failures.
pub fn write_file(dir: &Path, name: &str, body: &str) -> SosResult<()> {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, body)?;
    Ok(())
}
