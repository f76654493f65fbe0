//! Structured logging setup.
//!
//! Everything in the toolkit logs through `tracing`; this module installs
//! the subscriber that renders it.

use serde::{Deserialize, Serialize};
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Environment variable holding an `EnvFilter` directive.
pub const LOG_ENV: &str = "SOS_LOG";
/// Environment variable selecting the output format.
pub const LOG_FORMAT_ENV: &str = "SOS_LOG_FORMAT";

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LogSettings {
    /// Filter directive; overrides the level derived from `debug`.
    pub filter: Option<String>,
    /// Output format.
    pub format: LogFormat,
    /// Debug mode lowers the default level to `debug`.
    pub debug: bool,
}

impl LogSettings {
    /// Reads logging settings through `lookup`.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let format = match lookup(LOG_FORMAT_ENV).as_deref().map(str::trim) {
            Some(f) if f.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };
        Self {
            filter: lookup(LOG_ENV).filter(|f| !f.trim().is_empty()),
            format,
            debug: lookup("SOS_DEBUG")
                .as_deref()
                .is_some_and(crate::config::is_truthy),
        }
    }

    /// Returns the filter directive in effect.
    #[must_use]
    pub fn directive(&self) -> &str {
        match &self.filter {
            Some(filter) => filter,
            None if self.debug => "debug",
            None => "info",
        }
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_new(self.directive()).unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// Installs the global subscriber.
///
/// Returns false if a subscriber was already installed, in which case
/// nothing changes.
pub fn init_logging(settings: &LogSettings) -> bool {
    let registry = Registry::default().with(settings.env_filter());

    let installed = match settings.format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        LogFormat::Text => registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };
    installed.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directive_precedence() {
        let settings = LogSettings::default();
        assert_eq!(settings.directive(), "info");

        let settings = LogSettings {
            debug: true,
            ..LogSettings::default()
        };
        assert_eq!(settings.directive(), "debug");

        let settings = LogSettings {
            filter: Some("sos_toolkit=trace".to_string()),
            debug: true,
            ..LogSettings::default()
        };
        assert_eq!(settings.directive(), "sos_toolkit=trace");
    }

    #[test]
    fn test_from_lookup() {
        let settings = LogSettings::from_lookup(|key| match key {
            LOG_FORMAT_ENV => Some("JSON".to_string()),
            "SOS_DEBUG" => Some("1".to_string()),
            _ => None,
        });
        assert_eq!(settings.format, LogFormat::Json);
        assert!(settings.debug);
        assert!(settings.filter.is_none());
    }

    #[test]
    fn test_second_init_is_noop() {
        let settings = LogSettings::default();
        init_logging(&settings);
        assert!(!init_logging(&settings));
    }
}
