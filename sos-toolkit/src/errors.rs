//! Error types for the sos toolkit.
//!
//! Every failure raised by the attribute model, the registry, the runnable
//! engine and the context generator is expressed as one of the structs
//! below and bubbles up wrapped in [`SosError`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for toolkit operations.
#[derive(Debug, Error)]
pub enum SosError {
    /// An attribute path did not resolve.
    #[error("{0}")]
    Lookup(#[from] LookupError),

    /// A write hit an occupied key without `overwrite`.
    #[error("{0}")]
    Conflict(#[from] ConflictError),

    /// A preserved or locked node was removed or replaced.
    #[error("{0}")]
    Protection(#[from] ProtectionError),

    /// A name collides with a reserved name or a non-repo attribute.
    #[error("{0}")]
    Shadow(#[from] ShadowError),

    /// A registry key is already bound.
    #[error("{0}")]
    Exists(#[from] ExistsError),

    /// A tool expects the previous result but none is available.
    #[error("{0}")]
    MissingResult(#[from] MissingResultError),

    /// A composite tree contains a child of an unsupported type.
    #[error("{0}")]
    InvalidChild(#[from] InvalidChildError),

    /// A dotted path is malformed or steps through a scalar.
    #[error("{0}")]
    InvalidPath(#[from] InvalidPathError),

    /// The configuration targets a different toolkit version.
    #[error("{0}")]
    VersionMismatch(#[from] VersionMismatchError),

    /// A condition failed and was configured to raise.
    #[error("{0}")]
    ConditionFailed(#[from] ConditionFailedError),

    /// Service dependencies never converge.
    #[error("{0}")]
    CycleDetected(#[from] CycleDetectedError),

    /// Malformed layer file, unresolved service or invalid parameters.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),

    /// A tool handler failed.
    #[error("Tool '{tool}' failed: {source}")]
    ToolFailed {
        /// Dotted path of the tool.
        tool: String,
        /// The handler's error.
        #[source]
        source: anyhow::Error,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML (de)serialization error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SosError {
    /// Wraps a handler error raised by the tool at `tool`.
    #[must_use]
    pub fn tool_failed(tool: impl Into<String>, source: anyhow::Error) -> Self {
        Self::ToolFailed {
            tool: tool.into(),
            source,
        }
    }

    /// Returns true if this is a missing-path error.
    #[must_use]
    pub const fn is_lookup(&self) -> bool {
        matches!(self, Self::Lookup(_))
    }

    /// Returns a short, stable name for the error kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Lookup(_) => "LookupError",
            Self::Conflict(_) => "ConflictError",
            Self::Protection(_) => "ProtectionError",
            Self::Shadow(_) => "ShadowError",
            Self::Exists(_) => "ExistsError",
            Self::MissingResult(_) => "MissingResultError",
            Self::InvalidChild(_) => "InvalidChildError",
            Self::InvalidPath(_) => "InvalidPathError",
            Self::VersionMismatch(_) => "VersionMismatchError",
            Self::ConditionFailed(_) => "ConditionFailedError",
            Self::CycleDetected(_) => "CycleDetectedError",
            Self::Configuration(_) => "ConfigurationError",
            Self::ToolFailed { .. } => "ToolFailed",
            Self::Io(_) => "IoError",
            Self::Yaml(_) => "YamlError",
            Self::Json(_) => "JsonError",
        }
    }
}

/// Metadata about a contract error for better diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ContractErrorInfo {
    /// Error code (e.g., "SERVICE-001-CYCLE").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ContractErrorInfo {
    /// Creates a new contract error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Error raised when an attribute path does not resolve.
#[derive(Debug, Clone, Error)]
#[error("Attribute not found: '{path}'")]
pub struct LookupError {
    /// The requested path.
    pub path: String,
}

impl LookupError {
    /// Creates a new lookup error.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

/// Error raised when writing an occupied key without `overwrite`.
#[derive(Debug, Clone, Error)]
#[error("Attribute conflict: '{path}' already exists")]
pub struct ConflictError {
    /// The conflicting path.
    pub path: String,
}

impl ConflictError {
    /// Creates a new conflict error.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

/// Why a protected node refused a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protection {
    /// The node may not be removed.
    Preserved,
    /// The node may not be replaced without force.
    Locked,
}

impl std::fmt::Display for Protection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Preserved => write!(f, "preserved"),
            Self::Locked => write!(f, "locked"),
        }
    }
}

/// Error raised when removing a preserved node or replacing a locked one.
#[derive(Debug, Clone, Error)]
#[error("Attribute '{path}' is protected ({protection})")]
pub struct ProtectionError {
    /// The protected path.
    pub path: String,
    /// Which protection triggered.
    pub protection: Protection,
}

impl ProtectionError {
    /// Creates an error for a preserved node.
    #[must_use]
    pub fn preserved(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            protection: Protection::Preserved,
        }
    }

    /// Creates an error for a locked node.
    #[must_use]
    pub fn locked(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            protection: Protection::Locked,
        }
    }
}

/// Error raised when a name shadows a reserved name or a non-repo entry.
#[derive(Debug, Clone, Error)]
#[error("Name '{name}' shadows {shadowed}")]
pub struct ShadowError {
    /// The offending name.
    pub name: String,
    /// What the name would shadow.
    pub shadowed: String,
}

impl ShadowError {
    /// Creates a new shadow error.
    #[must_use]
    pub fn new(name: impl Into<String>, shadowed: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shadowed: shadowed.into(),
        }
    }
}

/// Error raised when a registry key is already bound and overwrite is off.
#[derive(Debug, Clone, Error)]
#[error("Tool '{namespace}.{key}' already exists")]
pub struct ExistsError {
    /// The repo namespace.
    pub namespace: String,
    /// The tool key.
    pub key: String,
}

impl ExistsError {
    /// Creates a new exists error.
    #[must_use]
    pub fn new(namespace: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            key: key.into(),
        }
    }
}

/// Error raised when a tool binds the previous result but none is set.
#[derive(Debug, Clone, Error)]
#[error("Tool '{tool}' expects a previous result but none was provided")]
pub struct MissingResultError {
    /// The tool path.
    pub tool: String,
}

impl MissingResultError {
    /// Creates a new missing result error.
    #[must_use]
    pub fn new(tool: impl Into<String>) -> Self {
        Self { tool: tool.into() }
    }
}

/// Error raised when a composite holds a child that cannot run.
#[derive(Debug, Clone, Error)]
#[error("Invalid child '{key}' in '{parent}': {kind}")]
pub struct InvalidChildError {
    /// The parent composite label.
    pub parent: String,
    /// The child key.
    pub key: String,
    /// The child's node kind.
    pub kind: String,
}

impl InvalidChildError {
    /// Creates a new invalid child error.
    #[must_use]
    pub fn new(parent: impl Into<String>, key: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            parent: parent.into(),
            key: key.into(),
            kind: kind.into(),
        }
    }
}

/// Error raised for malformed paths or traversal through scalars.
#[derive(Debug, Clone, Error)]
#[error("Invalid path '{path}': {message}")]
pub struct InvalidPathError {
    /// The offending path.
    pub path: String,
    /// What is wrong with it.
    pub message: String,
}

impl InvalidPathError {
    /// Creates a new invalid path error.
    #[must_use]
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Error raised when a configuration targets another toolkit version.
#[derive(Debug, Clone, Error)]
#[error("Version mismatch: system declares '{system_version}', toolkit is '{toolkit_version}'")]
pub struct VersionMismatchError {
    /// The version declared by the configuration.
    pub system_version: String,
    /// The running toolkit version.
    pub toolkit_version: String,
}

impl VersionMismatchError {
    /// Creates a new version mismatch error.
    #[must_use]
    pub fn new(system_version: impl Into<String>, toolkit_version: impl Into<String>) -> Self {
        Self {
            system_version: system_version.into(),
            toolkit_version: toolkit_version.into(),
        }
    }
}

/// Error raised by a failing condition with `raise_exc` set.
#[derive(Debug, Clone, Error)]
#[error("Condition failed on '{ctx_key}' (label: {}, value: {value})", .label.as_deref().unwrap_or("none"))]
pub struct ConditionFailedError {
    /// The condition label.
    pub label: Option<String>,
    /// The context path the condition reads.
    pub ctx_key: String,
    /// Rendered context value.
    pub value: String,
}

impl ConditionFailedError {
    /// Creates a new condition failed error.
    #[must_use]
    pub fn new(label: Option<String>, ctx_key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label,
            ctx_key: ctx_key.into(),
            value: value.into(),
        }
    }
}

/// Error raised when service dependencies form a cycle.
#[derive(Debug, Clone, Error)]
#[error("{}", .error_info.summary)]
pub struct CycleDetectedError {
    /// The services stuck waiting on each other.
    pub services: Vec<String>,
    /// Contract error info.
    pub error_info: ContractErrorInfo,
}

impl CycleDetectedError {
    /// Creates a new cycle detected error.
    #[must_use]
    pub fn new(services: Vec<String>) -> Self {
        let info = ContractErrorInfo::new(
            "SERVICE-001-CYCLE",
            format!("Service dependencies never converge: {}", services.join(" -> ")),
        )
        .with_fix_hint("Remove one of the service dependencies in the cycle to break it.");

        Self {
            services,
            error_info: info,
        }
    }
}

/// Error raised for malformed configuration.
#[derive(Debug, Clone, Error)]
#[error("Configuration error: {message}{}", .source_path.as_ref().map(|p| format!(" ({})", p.display())).unwrap_or_default())]
pub struct ConfigurationError {
    /// The error message.
    pub message: String,
    /// The file the error came from, if any.
    pub source_path: Option<PathBuf>,
}

impl ConfigurationError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source_path: None,
        }
    }

    /// Sets the originating file.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.source_path = Some(path.into());
        self
    }
}

/// Convenience alias for toolkit results.
pub type SosResult<T> = Result<T, SosError>;
