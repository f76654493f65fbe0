//! Observability utilities.

mod logging;

pub use logging::{init_logging, LogFormat, LogSettings, LOG_ENV, LOG_FORMAT_ENV};
