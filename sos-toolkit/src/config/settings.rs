//! Process settings read from the environment.

use crate::observability::LogSettings;
use config::{Config, ConfigError, Environment};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Default network name for generated systems.
pub const DEFAULT_NETWORK: &str = "sos";
/// Default profile name.
pub const DEFAULT_PROFILE: &str = "default";
/// File name of a service's base configuration.
pub const SERVICE_FILE: &str = "sos-service.yaml";

const ENV_PREFIX: &str = "SOS";
const DEFAULT_SERVICE_PATH: &str = "service";
const DEFAULT_ROOT_PATH: &str = ".";

/// Variables read by [`Settings::from_lookup`], without the prefix.
const ENV_KEYS: [&str; 9] = [
    "SYSTEM_FILE",
    "LOCAL_FILE",
    "USER_FILE",
    "ROOT_FILE",
    "CONTEXT_FILE",
    "DEBUG",
    "DELETE",
    "SERVICE_PATH",
    "ROOT_PATH",
];

/// The `SOS_*` environment layer as the `config` crate sees it.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EnvLayer {
    system_file: Option<String>,
    local_file: Option<String>,
    user_file: Option<String>,
    root_file: Option<String>,
    context_file: Option<String>,
    debug: Option<String>,
    delete: Option<String>,
    service_path: Option<String>,
    root_path: Option<String>,
}

impl EnvLayer {
    fn read(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let vars: config::Map<String, String> = ENV_KEYS
            .iter()
            .filter_map(|key| {
                let name = format!("{ENV_PREFIX}_{key}");
                lookup(&name).map(|value| (name, value))
            })
            .collect();

        Config::builder()
            .set_default("service_path", DEFAULT_SERVICE_PATH)?
            .set_default("root_path", DEFAULT_ROOT_PATH)?
            .add_source(Environment::with_prefix(ENV_PREFIX).source(Some(vars)))
            .build()?
            .try_deserialize()
    }
}

/// The configuration files the toolkit reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerFile {
    /// Lowest precedence, shared by every system.
    Root,
    /// Per-user overrides.
    User,
    /// The system definition.
    System,
    /// Local overrides.
    Local,
    /// The resolved context snapshot.
    Context,
}

impl LayerFile {
    /// Returns the environment variable overriding this file's path.
    #[must_use]
    pub const fn env_var(self) -> &'static str {
        match self {
            Self::Root => "SOS_ROOT_FILE",
            Self::User => "SOS_USER_FILE",
            Self::System => "SOS_SYSTEM_FILE",
            Self::Local => "SOS_LOCAL_FILE",
            Self::Context => "SOS_CONTEXT_FILE",
        }
    }

    /// Returns the conventional file name.
    #[must_use]
    pub const fn default_name(self) -> &'static str {
        match self {
            Self::Root => "sos-root.yaml",
            Self::User => "sos-user.yaml",
            Self::System => "sos-system.yaml",
            Self::Local => "sos-local.yaml",
            Self::Context => "sos-context.yaml",
        }
    }

    /// Returns the layer name used in logs and meta keys.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Root => "root",
            Self::User => "user",
            Self::System => "system",
            Self::Local => "local",
            Self::Context => "context",
        }
    }
}

/// Toolkit settings.
///
/// Plain data: [`Settings::from_env`] fills it from the process
/// environment, tests build it by hand or through
/// [`Settings::from_lookup`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// `SOS_SYSTEM_FILE`.
    pub system_file: Option<PathBuf>,
    /// `SOS_LOCAL_FILE`.
    pub local_file: Option<PathBuf>,
    /// `SOS_USER_FILE`.
    pub user_file: Option<PathBuf>,
    /// `SOS_ROOT_FILE`.
    pub root_file: Option<PathBuf>,
    /// `SOS_CONTEXT_FILE`.
    pub context_file: Option<PathBuf>,
    /// `SOS_DEBUG`.
    pub debug: bool,
    /// `SOS_DELETE`: destructive tools only act when set.
    pub delete_enabled: bool,
    /// `SOS_SERVICE_PATH`: where installed services live.
    pub service_path: PathBuf,
    /// `SOS_ROOT_PATH`: directory holding the root layer.
    pub root_path: PathBuf,
    /// The system directory; relative paths resolve against it.
    pub system_path: PathBuf,
    /// The running toolkit version.
    pub toolkit_version: String,
    /// Logging configuration.
    pub log: LogSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl Settings {
    /// Reads settings from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through `lookup`, which maps a variable name to its
    /// value.
    ///
    /// The `SOS_*` variables are layered over the defaults with the `config`
    /// crate. A layer that fails to deserialize is logged and the defaults
    /// are used.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let system_path = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let env = EnvLayer::read(&lookup).unwrap_or_else(|err| {
            warn!(error = %err, "invalid SOS environment, using defaults");
            EnvLayer::default()
        });
        let path = |value: Option<String>| value.filter(|v| !v.is_empty()).map(PathBuf::from);
        let flag = |value: Option<String>| value.as_deref().is_some_and(is_truthy);

        Self {
            system_file: path(env.system_file),
            local_file: path(env.local_file),
            user_file: path(env.user_file),
            root_file: path(env.root_file),
            context_file: path(env.context_file),
            debug: flag(env.debug),
            delete_enabled: flag(env.delete),
            service_path: path(env.service_path).unwrap_or_else(|| PathBuf::from(DEFAULT_SERVICE_PATH)),
            root_path: path(env.root_path).unwrap_or_else(|| PathBuf::from(DEFAULT_ROOT_PATH)),
            system_path,
            toolkit_version: env!("CARGO_PKG_VERSION").to_string(),
            log: LogSettings::from_lookup(&lookup),
        }
    }

    /// Sets the system directory.
    #[must_use]
    pub fn with_system_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.system_path = path.into();
        self
    }

    /// Sets the service directory.
    #[must_use]
    pub fn with_service_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.service_path = path.into();
        self
    }

    /// Enables or disables destructive operations.
    #[must_use]
    pub const fn with_delete_enabled(mut self, enabled: bool) -> Self {
        self.delete_enabled = enabled;
        self
    }

    /// Sets the running toolkit version.
    #[must_use]
    pub fn with_toolkit_version(mut self, version: impl Into<String>) -> Self {
        self.toolkit_version = version.into();
        self
    }

    /// Makes `path` absolute against the system directory.
    #[must_use]
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.system_path.join(path)
        }
    }

    /// Returns the environment override for a layer file, if any.
    #[must_use]
    pub fn layer_override(&self, layer: LayerFile) -> Option<&Path> {
        match layer {
            LayerFile::System => self.system_file.as_deref(),
            LayerFile::Local => self.local_file.as_deref(),
            LayerFile::User => self.user_file.as_deref(),
            LayerFile::Root => self.root_file.as_deref(),
            LayerFile::Context => self.context_file.as_deref(),
        }
    }

    /// Returns the absolute default path of a layer file: the
    /// environment override, else the conventional name. The root layer
    /// lives under `root_path`.
    #[must_use]
    pub fn layer_path(&self, layer: LayerFile) -> PathBuf {
        let path = match (self.layer_override(layer), layer) {
            (Some(path), LayerFile::Root) => self.resolve(&self.root_path).join(path),
            (Some(path), _) => path.to_path_buf(),
            (None, LayerFile::Root) => self.resolve(&self.root_path).join(layer.default_name()),
            (None, _) => PathBuf::from(layer.default_name()),
        };
        self.resolve(&path)
    }

    /// Returns the absolute service directory.
    #[must_use]
    pub fn service_dir(&self) -> PathBuf {
        self.resolve(&self.service_path)
    }
}

/// Parses a boolean flag: `1`, `true`, `yes` or `on`, in any case.
#[must_use]
pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_lookup(|_| None).with_system_path("/srv/app");

        assert!(!settings.delete_enabled);
        assert!(!settings.debug);
        assert_eq!(settings.layer_path(LayerFile::System), PathBuf::from("/srv/app/sos-system.yaml"));
        assert_eq!(settings.layer_path(LayerFile::Root), PathBuf::from("/srv/app/./sos-root.yaml"));
        assert_eq!(settings.service_dir(), PathBuf::from("/srv/app/service"));
    }

    #[test]
    fn test_overrides() {
        let settings = Settings::from_lookup(lookup(&[
            ("SOS_SYSTEM_FILE", "/etc/sos/system.yaml"),
            ("SOS_LOCAL_FILE", "conf/local.yaml"),
            ("SOS_ROOT_PATH", "/opt/sos"),
            ("SOS_DELETE", "Yes"),
            ("SOS_DEBUG", "0"),
        ]))
        .with_system_path("/srv/app");

        assert!(settings.delete_enabled);
        assert!(!settings.debug);
        assert_eq!(settings.layer_path(LayerFile::System), PathBuf::from("/etc/sos/system.yaml"));
        assert_eq!(settings.layer_path(LayerFile::Local), PathBuf::from("/srv/app/conf/local.yaml"));
        assert_eq!(settings.layer_path(LayerFile::Root), PathBuf::from("/opt/sos/sos-root.yaml"));
    }

    #[test]
    fn test_empty_values_are_unset() {
        let settings = Settings::from_lookup(lookup(&[("SOS_CONTEXT_FILE", "")]));
        assert!(settings.context_file.is_none());
    }

    #[test]
    fn test_env_layer_reads_only_known_keys() {
        let layer = EnvLayer::read(&lookup(&[
            ("SOS_SERVICE_PATH", ""),
            ("SOS_USER_FILE", "~/.sos.yaml"),
            ("SOS_UNKNOWN", "x"),
        ]))
        .unwrap();

        assert_eq!(layer.service_path.as_deref(), Some(""));
        assert_eq!(layer.root_path.as_deref(), Some(DEFAULT_ROOT_PATH));
        assert_eq!(layer.user_file.as_deref(), Some("~/.sos.yaml"));
        assert!(layer.system_file.is_none());

        let settings = Settings::from_lookup(lookup(&[("SOS_SERVICE_PATH", "")])).with_system_path("/srv/app");
        assert_eq!(settings.service_dir(), PathBuf::from("/srv/app/service"));
    }

    #[test]
    fn test_from_env() {
        let _guard = crate::testing::ENV_LOCK.lock();
        std::env::set_var("SOS_SERVICE_PATH", "services");
        std::env::set_var("SOS_DELETE", "on");

        let settings = Settings::from_env().with_system_path("/srv/app");

        std::env::remove_var("SOS_SERVICE_PATH");
        std::env::remove_var("SOS_DELETE");
        assert!(settings.delete_enabled);
        assert_eq!(settings.service_dir(), PathBuf::from("/srv/app/services"));
        assert_eq!(settings.toolkit_version, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_is_truthy() {
        for value in ["1", "true", "TRUE", " yes ", "on"] {
            assert!(is_truthy(value), "{value}");
        }
        for value in ["", "0", "false", "no", "maybe"] {
            assert!(!is_truthy(value), "{value}");
        }
    }
}
