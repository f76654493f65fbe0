//! Locating installed service definitions.

use crate::config::{load_yaml, platform::DEFAULT_PLATFORM, SERVICE_FILE};
use crate::errors::{ConfigurationError, SosResult};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// A service's base definition for one platform.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceDefinition {
    /// Service key.
    pub key: String,
    /// The service's directory.
    pub root: PathBuf,
    /// The platform directory the definition came from; may be
    /// `default` when the requested platform has no entry.
    pub platform: String,
    /// The definition file.
    pub file: PathBuf,
    /// The parsed definition.
    pub config: Value,
}

/// Looks up service definitions.
#[cfg_attr(test, mockall::automock)]
pub trait ServiceSource {
    /// Returns the definition of `key` for `platform`, falling back to
    /// the default platform.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` when the service is not installed,
    /// supports neither platform, or its file does not parse.
    fn locate(&self, key: &str, platform: &str) -> SosResult<ServiceDefinition>;
}

#[derive(Debug, Clone, Default)]
struct CatalogEntry {
    root: PathBuf,
    platforms: BTreeMap<String, PathBuf>,
}

/// Services installed under a directory laid out as
/// `<key>/platform/<platform>/sos-service.yaml`.
#[derive(Debug, Clone, Default)]
pub struct ServiceCatalog {
    base: PathBuf,
    entries: BTreeMap<String, CatalogEntry>,
}

impl ServiceCatalog {
    /// Scans `base` for service definitions. A missing directory yields
    /// an empty catalog.
    ///
    /// # Errors
    ///
    /// Fails if the directory tree cannot be walked.
    pub fn scan(base: &Path) -> SosResult<Self> {
        let mut catalog = Self {
            base: base.to_path_buf(),
            entries: BTreeMap::new(),
        };
        if !base.is_dir() {
            warn!(path = %base.display(), "service directory missing");
            return Ok(catalog);
        }

        for entry in WalkDir::new(base).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| walk_error(base, &e))?;
            if entry.file_type().is_dir() {
                let key = entry.file_name().to_string_lossy().into_owned();
                catalog.entries.insert(
                    key,
                    CatalogEntry {
                        root: entry.path().to_path_buf(),
                        platforms: BTreeMap::new(),
                    },
                );
            }
        }

        for entry in WalkDir::new(base).min_depth(4).max_depth(4) {
            let entry = entry.map_err(|e| walk_error(base, &e))?;
            if !entry.file_type().is_file() || entry.file_name() != SERVICE_FILE {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(base) else {
                continue;
            };
            let parts: Vec<String> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            if let [key, marker, platform, _] = parts.as_slice() {
                if marker != "platform" {
                    continue;
                }
                if let Some(service) = catalog.entries.get_mut(key) {
                    debug!(service = %key, platform = %platform, "found service definition");
                    service
                        .platforms
                        .insert(platform.clone(), entry.path().to_path_buf());
                }
            }
        }
        Ok(catalog)
    }

    /// Returns the installed service keys.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Returns the platforms `key` has definitions for.
    #[must_use]
    pub fn platforms(&self, key: &str) -> Vec<&str> {
        self.entries
            .get(key)
            .map(|e| e.platforms.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Returns the number of installed services.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no services are installed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ServiceSource for ServiceCatalog {
    fn locate(&self, key: &str, platform: &str) -> SosResult<ServiceDefinition> {
        let Some(entry) = self.entries.get(key) else {
            return Err(ConfigurationError::new(format!("service not installed: {key}"))
                .with_path(self.base.join(key))
                .into());
        };

        let (used, file) = [platform, DEFAULT_PLATFORM]
            .into_iter()
            .find_map(|p| entry.platforms.get(p).map(|file| (p, file)))
            .ok_or_else(|| {
                ConfigurationError::new(format!(
                    "service {key} does not support platform {platform} and has no default"
                ))
                .with_path(entry.root.join("platform"))
            })?;

        Ok(ServiceDefinition {
            key: key.to_string(),
            root: entry.root.clone(),
            platform: used.to_string(),
            file: file.clone(),
            config: load_yaml(file)?,
        })
    }
}

fn walk_error(base: &Path, err: &walkdir::Error) -> ConfigurationError {
    ConfigurationError::new(format!("cannot scan services: {err}")).with_path(base)
}
