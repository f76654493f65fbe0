//! Runtime platform detection.

/// Platform name used when a service has no platform-specific definition.
pub const DEFAULT_PLATFORM: &str = "default";

/// Returns the name of the running platform, e.g. `linux`, `macos` or
/// `windows`.
#[must_use]
pub fn detect() -> &'static str {
    std::env::consts::OS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_is_not_default() {
        assert!(!detect().is_empty());
        assert_ne!(detect(), DEFAULT_PLATFORM);
    }
}
