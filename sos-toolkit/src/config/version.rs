//! Toolkit version compatibility check.

use crate::errors::{SosResult, VersionMismatchError};
use serde_json::Value;
use tracing::warn;

fn normalize(version: &str) -> &str {
    let version = version.trim();
    version.strip_prefix('v').unwrap_or(version)
}

/// Compares the configuration's `meta.sos_version` with the running
/// toolkit version. A leading `v` is ignored on both sides; a missing or
/// empty declaration passes.
///
/// # Errors
///
/// Returns `VersionMismatchError` on a mismatch unless `ignore` is set,
/// in which case the mismatch is only logged.
pub fn check_version(config: &Value, toolkit_version: &str, ignore: bool) -> SosResult<()> {
    let declared = config
        .get("meta")
        .and_then(|meta| meta.get("sos_version"))
        .and_then(Value::as_str)
        .filter(|v| !v.trim().is_empty());

    let Some(declared) = declared else {
        return Ok(());
    };
    if normalize(declared) == normalize(toolkit_version) {
        return Ok(());
    }

    let err = VersionMismatchError::new(declared, toolkit_version);
    if ignore {
        warn!(system_version = declared, toolkit_version, "{err}");
        Ok(())
    } else {
        Err(err.into())
    }
}
