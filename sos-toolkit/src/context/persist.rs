//! Loading and saving context snapshots.

use super::Context;
use crate::config::{check_version, load_yaml, LayerFile};
use crate::errors::{ConfigurationError, SosResult};
use crate::tools::Toolkit;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

/// Hook run after a context is loaded.
pub const ON_CONTEXT_LOAD: &str = "hook.on_context_load";
/// Hook run before a context is saved.
pub const ON_CONTEXT_SAVE: &str = "hook.on_context_save";

/// Options for [`Context::file_load`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    /// Required value of `meta.is_installed`, if any.
    pub install_state: Option<bool>,
    /// Run `hook.on_context_load` after loading.
    pub run_hooks: bool,
    /// Log version mismatches instead of failing.
    pub ignore_version: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            install_state: None,
            run_hooks: true,
            ignore_version: false,
        }
    }
}

impl LoadOptions {
    /// Creates default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires an install state.
    #[must_use]
    pub const fn with_install_state(mut self, installed: bool) -> Self {
        self.install_state = Some(installed);
        self
    }

    /// Sets whether hooks run.
    #[must_use]
    pub const fn with_hooks(mut self, run_hooks: bool) -> Self {
        self.run_hooks = run_hooks;
        self
    }

    /// Sets whether version mismatches are only logged.
    #[must_use]
    pub const fn ignore_version(mut self, ignore: bool) -> Self {
        self.ignore_version = ignore;
        self
    }
}

impl Context {
    /// Loads a context snapshot.
    ///
    /// Without `path`, the snapshot named by the settings is used. The
    /// recorded `system_path` must match the settings' system directory.
    ///
    /// # Errors
    ///
    /// Fails on unreadable files, version mismatches, a foreign system
    /// directory, the wrong install state, and hook failures.
    pub fn file_load(toolkit: &Toolkit, path: Option<&Path>, opts: LoadOptions) -> SosResult<Self> {
        let settings = toolkit.settings();
        let path = path.map_or_else(|| settings.layer_path(LayerFile::Context), |p| settings.resolve(p));
        info!(path = %path.display(), "loading context");

        let config = load_yaml(&path)?;
        check_version(&config, &settings.toolkit_version, opts.ignore_version)?;
        let mut ctx = Self::from_config(config)?;

        if let Some(system_path) = ctx.meta().system_path.as_deref() {
            if Path::new(system_path) != settings.system_path {
                return Err(ConfigurationError::new(format!(
                    "current system directory {} does not match the context's {system_path}",
                    settings.system_path.display()
                ))
                .with_path(path)
                .into());
            }
        }

        if let Some(required) = opts.install_state {
            if ctx.meta().is_installed != required {
                return Err(ConfigurationError::new(format!(
                    "system install state is {}, {required} required",
                    ctx.meta().is_installed
                ))
                .with_path(path)
                .into());
            }
        }

        if opts.run_hooks {
            ctx.run(toolkit, ON_CONTEXT_LOAD)?;
        }
        Ok(ctx)
    }

    /// Saves the context as YAML and returns the path written.
    ///
    /// Without `path`, `meta.context_file` is used, then the settings'
    /// default. The transient target and result are cleared first.
    ///
    /// # Errors
    ///
    /// Fails if the context file is disabled and no path is given, if the
    /// save hook fails, or on I/O and serialization errors.
    pub fn file_save(&mut self, toolkit: &Toolkit, path: Option<&Path>, run_hooks: bool) -> SosResult<PathBuf> {
        let settings = toolkit.settings();
        let path = match path {
            Some(path) => settings.resolve(path),
            None if self.meta().context_file.is_disabled() => {
                return Err(ConfigurationError::new("context file is disabled and no path was given").into())
            }
            None => self
                .meta()
                .context_file
                .path()
                .map_or_else(|| settings.layer_path(LayerFile::Context), |p| settings.resolve(Path::new(p))),
        };

        if run_hooks {
            self.run(toolkit, ON_CONTEXT_SAVE)?;
        }
        self.clear_transient();

        info!(path = %path.display(), "saving context");
        let text = serde_yaml::to_string(&self.to_value())?;
        std::fs::write(&path, text)?;
        Ok(path)
    }

    /// Flattens `meta`, `namespace`, `service` and `action` into compound
    /// keys joined by `sep`.
    ///
    /// Keys are upper-cased with `-` replaced by `_`; list items are keyed
    /// by index. Only string leaves are kept.
    #[must_use]
    pub fn flatten(&self, parent: &str, sep: &str) -> BTreeMap<String, String> {
        let value = self.to_value();
        let mut out = BTreeMap::new();
        for section in ["meta", "namespace", "service", "action"] {
            if let Some(tree) = value.get(section) {
                flatten_into(tree, &join(parent, section, sep), sep, &mut out);
            }
        }
        out
    }
}

fn join(parent: &str, key: &str, sep: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}{sep}{key}")
    }
}

fn flatten_into(value: &Value, key: &str, sep: &str, out: &mut BTreeMap<String, String>) {
    match value {
        Value::Object(map) => {
            for (child, v) in map {
                flatten_into(v, &join(key, child, sep), sep, out);
            }
        }
        Value::Array(items) => {
            for (n, v) in items.iter().enumerate() {
                flatten_into(v, &join(key, &n.to_string(), sep), sep, out);
            }
        }
        Value::String(s) => {
            out.insert(key.replace('-', "_").to_uppercase(), s.clone());
        }
        _ => {}
    }
}
