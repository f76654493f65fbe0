//! Dotted attribute paths.
//!
//! A path is a `.`-separated list of segments. Each segment is an
//! identifier, optionally followed by one bracketed list index:
//! `service.ollama.action.sos_up`, `namespace.items[3].name`.

use crate::errors::{InvalidPathError, ShadowError, SosResult};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// Names that would shadow the attribute model's own operations.
pub const RESERVED_NAMES: &[&str] = &["get", "set", "remove", "has", "keys", "values", "items", "run"];

/// How far past the end of a list a write may address. Slots in between
/// are filled with empty maps.
pub const MAX_LIST_GROWTH: usize = 1024;

static SEGMENT: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)(?:\[(\d+)\])?$"));

/// One step of a dotted path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSegment {
    /// The map key.
    pub key: String,
    /// Optional list index applied to the value under `key`.
    pub index: Option<usize>,
}

impl PathSegment {
    /// Creates a plain key segment.
    #[must_use]
    pub fn key(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            index: None,
        }
    }

    /// Creates an indexed segment.
    #[must_use]
    pub fn indexed(key: impl Into<String>, index: usize) -> Self {
        Self {
            key: key.into(),
            index: Some(index),
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(index) => write!(f, "{}[{index}]", self.key),
            None => write!(f, "{}", self.key),
        }
    }
}

/// Parses a dotted path into segments.
///
/// # Errors
///
/// Returns `InvalidPathError` for empty or malformed segments and
/// `ShadowError` for reserved names.
pub fn parse_path(path: &str) -> SosResult<Vec<PathSegment>> {
    if path.is_empty() {
        return Err(InvalidPathError::new(path, "empty path").into());
    }

    path.split('.').map(|raw| parse_segment(path, raw)).collect()
}

fn parse_segment(path: &str, raw: &str) -> SosResult<PathSegment> {
    let pattern = SEGMENT
        .as_ref()
        .map_err(|e| InvalidPathError::new(path, e.to_string()))?;
    let caps = pattern
        .captures(raw)
        .ok_or_else(|| InvalidPathError::new(path, format!("invalid segment '{raw}'")))?;

    let key = caps.get(1).map_or("", |m| m.as_str());
    if RESERVED_NAMES.contains(&key) {
        return Err(ShadowError::new(key, "a reserved attribute operation").into());
    }

    let index = match caps.get(2) {
        Some(m) => Some(
            m.as_str()
                .parse::<usize>()
                .map_err(|_| InvalidPathError::new(path, format!("index out of range in '{raw}'")))?,
        ),
        None => None,
    };

    Ok(PathSegment {
        key: key.to_string(),
        index,
    })
}

/// Validates a single map key: an identifier that is not reserved.
///
/// # Errors
///
/// Returns `InvalidPathError` or `ShadowError`.
pub fn validate_key(key: &str) -> SosResult<()> {
    let segment = parse_segment(key, key)?;
    if segment.index.is_some() {
        return Err(InvalidPathError::new(key, "map keys may not carry an index").into());
    }
    Ok(())
}
/// Checks that writing `index` into a list of `len` items stays within
/// [`MAX_LIST_GROWTH`].
pub(crate) fn check_list_growth(path: &str, len: usize, index: usize) -> SosResult<()> {
    if index.saturating_sub(len) > MAX_LIST_GROWTH {
        return Err(InvalidPathError::new(
            path,
            format!("index {index} is more than {MAX_LIST_GROWTH} past the end of a list of {len}"),
        )
        .into());
    }
    Ok(())
}

/// Joins segments back into a dotted path.
#[must_use]
pub fn join_path(segments: &[PathSegment]) -> String {
    segments
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_path() {
        let segments = parse_path("service.ollama.meta").unwrap();
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[1], PathSegment::key("ollama"));
    }

    #[test]
    fn test_parse_indexed_segment() {
        let segments = parse_path("namespace.items[3].name").unwrap();
        assert_eq!(segments[1], PathSegment::indexed("items", 3));
        assert_eq!(join_path(&segments), "namespace.items[3].name");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(parse_path("").is_err());
        assert!(parse_path("a..b").is_err());
        assert!(parse_path("1abc").is_err());
        assert!(parse_path("a[x]").is_err());
        assert!(parse_path("a[1][2]").is_err());
        assert!(parse_path("sos-up").is_err());
    }

    #[test]
    fn test_list_growth_limit() {
        assert!(check_list_growth("a[0]", 0, 0).is_ok());
        assert!(check_list_growth("a[9]", 0, MAX_LIST_GROWTH).is_ok());
        assert!(check_list_growth("a[9]", 10, MAX_LIST_GROWTH + 10).is_ok());
        let err = check_list_growth("a[9]", 0, MAX_LIST_GROWTH + 1).unwrap_err();
        assert_eq!(err.kind(), "InvalidPathError");
        assert!(check_list_growth("a[9]", 3, usize::MAX).is_err());
    }

    #[test]
    fn test_reserved_names_shadow() {
        let err = parse_path("namespace.keys").unwrap_err();
        assert_eq!(err.kind(), "ShadowError");
        assert!(validate_key("get").is_err());
        assert!(validate_key("__TARGET__").is_ok());
    }
}
