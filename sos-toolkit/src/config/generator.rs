//! Building a context from configuration layers.

use super::interpolate::resolve_tree;
use super::layers::{load_layer, load_yaml, LayerSource, LoadedLayer};
use super::merge::{merge_all, merge_into, take_key, update_path};
use super::{check_version, platform, LayerFile, Settings};
use crate::context::Context;
use crate::errors::{ConfigurationError, SosResult};
use crate::services::{ServiceCatalog, ServiceDefinition, ServiceLayers, ServiceResolver, ServiceSource};
use serde_json::{json, Map, Value};
use std::path::Path;
use tracing::{debug, info};

/// Sections carried over from a previous context file by `persist`.
const PERSISTED_SECTIONS: &[&str] = &["namespace", "service"];

/// Options for [`ContextGenerator::generate`].
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// The system layer.
    pub system: LayerSource,
    /// The local layer.
    pub local: LayerSource,
    /// The user layer.
    pub user: LayerSource,
    /// The root layer.
    pub root: LayerSource,
    /// Where the context is saved; `Disabled` records `false`.
    pub context_file: LayerSource,
    /// Runtime layer, highest precedence below the persisted one.
    pub runtime_config: Value,
    /// Dotted `(key, value)` pairs force-written after service resolution.
    pub runtime_update: Vec<(String, Value)>,
    /// Folded into the runtime layer's `meta`.
    pub meta_config: Map<String, Value>,
    /// Folded into the runtime layer's `namespace`.
    pub namespace_config: Map<String, Value>,
    /// Expand the `service` section into sub-contexts.
    pub resolve_services: bool,
    /// Resolve `${...}` references.
    pub resolve_variables: bool,
    /// Carry `namespace` and `service` over from the existing context file.
    pub persist: bool,
    /// Log version mismatches instead of failing.
    pub ignore_version: bool,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            system: LayerSource::Default,
            local: LayerSource::Default,
            user: LayerSource::Default,
            root: LayerSource::Default,
            context_file: LayerSource::Default,
            runtime_config: Value::Object(Map::new()),
            runtime_update: Vec::new(),
            meta_config: Map::new(),
            namespace_config: Map::new(),
            resolve_services: true,
            resolve_variables: true,
            persist: false,
            ignore_version: false,
        }
    }
}

impl GenerateOptions {
    /// Creates default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the system layer.
    #[must_use]
    pub fn with_system(mut self, source: LayerSource) -> Self {
        self.system = source;
        self
    }

    /// Sets the local layer.
    #[must_use]
    pub fn with_local(mut self, source: LayerSource) -> Self {
        self.local = source;
        self
    }

    /// Sets the user layer.
    #[must_use]
    pub fn with_user(mut self, source: LayerSource) -> Self {
        self.user = source;
        self
    }

    /// Sets the root layer.
    #[must_use]
    pub fn with_root(mut self, source: LayerSource) -> Self {
        self.root = source;
        self
    }

    /// Sets the context file.
    #[must_use]
    pub fn with_context_file(mut self, source: LayerSource) -> Self {
        self.context_file = source;
        self
    }

    /// Sets the runtime layer.
    #[must_use]
    pub fn with_runtime_config(mut self, config: Value) -> Self {
        self.runtime_config = config;
        self
    }

    /// Adds a dotted runtime update.
    #[must_use]
    pub fn with_runtime_update(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.runtime_update.push((key.into(), value.into()));
        self
    }

    /// Adds a runtime meta value.
    #[must_use]
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta_config.insert(key.into(), value.into());
        self
    }

    /// Adds a runtime namespace value.
    #[must_use]
    pub fn with_namespace(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.namespace_config.insert(key.into(), value.into());
        self
    }

    /// Sets whether services are resolved.
    #[must_use]
    pub const fn resolve_services(mut self, enabled: bool) -> Self {
        self.resolve_services = enabled;
        self
    }

    /// Sets whether variables are resolved.
    #[must_use]
    pub const fn resolve_variables(mut self, enabled: bool) -> Self {
        self.resolve_variables = enabled;
        self
    }

    /// Carries namespace and service over from the existing context file.
    #[must_use]
    pub const fn persist(mut self, enabled: bool) -> Self {
        self.persist = enabled;
        self
    }

    /// Sets whether version mismatches are only logged.
    #[must_use]
    pub const fn ignore_version(mut self, ignore: bool) -> Self {
        self.ignore_version = ignore;
        self
    }
}

/// Builds contexts from layered configuration.
pub struct ContextGenerator<'a> {
    settings: &'a Settings,
    services: Option<&'a dyn ServiceSource>,
}

impl<'a> ContextGenerator<'a> {
    /// Creates a generator; services are discovered under the settings'
    /// service directory.
    #[must_use]
    pub const fn new(settings: &'a Settings) -> Self {
        Self {
            settings,
            services: None,
        }
    }

    /// Uses `source` to locate service definitions.
    #[must_use]
    pub const fn with_services(mut self, source: &'a dyn ServiceSource) -> Self {
        self.services = Some(source);
        self
    }

    /// Returns the settings.
    #[must_use]
    pub const fn settings(&self) -> &'a Settings {
        self.settings
    }

    /// Generates a context.
    ///
    /// # Errors
    ///
    /// See [`ContextGenerator::generate_value`]; materializing the merged
    /// tree can fail too.
    pub fn generate(&self, opts: &GenerateOptions) -> SosResult<Context> {
        Context::from_config(self.generate_value(opts)?)
    }

    /// Generates the merged configuration tree without materializing it.
    ///
    /// # Errors
    ///
    /// Fails on missing or malformed layer files, version mismatches,
    /// unresolvable services and unresolvable references.
    pub fn generate_value(&self, opts: &GenerateOptions) -> SosResult<Value> {
        let system = load_layer(self.settings, LayerFile::System, &opts.system)?;
        check_version(&system.config, &self.settings.toolkit_version, opts.ignore_version)?;

        let layers = Layers {
            local: load_layer(self.settings, LayerFile::Local, &opts.local)?,
            user: load_layer(self.settings, LayerFile::User, &opts.user)?,
            root: load_layer(self.settings, LayerFile::Root, &opts.root)?,
            system,
        };
        self.assemble(layers, opts)
    }

    /// Generates the base configuration of one service: its definition
    /// file as the only layer, services and variables left unresolved.
    ///
    /// # Errors
    ///
    /// Fails if the definition does not materialize.
    pub fn service_context(
        &self,
        definition: &ServiceDefinition,
        platform: &str,
        ignore_version: bool,
    ) -> SosResult<Value> {
        check_version(&definition.config, &self.settings.toolkit_version, ignore_version)?;

        let layers = Layers {
            system: LoadedLayer {
                config: definition.config.clone(),
                file: Some(definition.file.clone()),
            },
            local: LoadedLayer::empty(),
            user: LoadedLayer::empty(),
            root: LoadedLayer::empty(),
        };
        let opts = GenerateOptions::new()
            .with_context_file(LayerSource::Disabled)
            .with_meta("platform", platform)
            .with_meta("system_path", path_string(&definition.root))
            .resolve_services(false)
            .resolve_variables(false)
            .ignore_version(ignore_version);

        let value = self.assemble(layers, &opts)?;
        Ok(Context::from_config(value)?.to_value())
    }

    fn assemble(&self, layers: Layers, opts: &GenerateOptions) -> SosResult<Value> {
        let Layers {
            mut root,
            mut user,
            mut system,
            mut local,
        } = layers;

        let persisted = if opts.persist {
            self.persisted_sections(&opts.context_file)?
        } else {
            Value::Object(Map::new())
        };

        let mut runtime = opts.runtime_config.clone();
        merge_into(
            &mut runtime,
            json!({"meta": opts.meta_config, "namespace": opts.namespace_config}),
        );

        let service_layers = ServiceLayers {
            system: take_key(&mut system.config, "service"),
            local: take_key(&mut local.config, "service"),
            user: take_key(&mut user.config, "service"),
            root: take_key(&mut root.config, "service"),
            runtime: take_key(&mut runtime, "service"),
        };

        let mut config = merge_all([
            root.config,
            user.config,
            system.config,
            local.config,
            runtime,
            persisted,
        ]);

        let platform = match config.pointer("/meta/platform").and_then(Value::as_str) {
            Some(platform) if !platform.is_empty() => platform.to_string(),
            _ => platform::detect().to_string(),
        };
        update_path(&mut config, "meta.platform", Value::String(platform.clone()))?;

        let service = if opts.resolve_services {
            Value::Object(self.resolve_services(&platform, service_layers, opts.ignore_version)?)
        } else {
            service_layers.system
        };
        update_path(&mut config, "service", service)?;

        for (key, value) in &opts.runtime_update {
            debug!(key = %key, "runtime update");
            update_path(&mut config, key, value.clone())?;
        }

        if opts.resolve_variables {
            resolve_tree(&mut config, &|var| std::env::var(var).ok())?;
        }

        for (layer, loaded) in [
            (LayerFile::Local, &local.file),
            (LayerFile::User, &user.file),
            (LayerFile::System, &system.file),
            (LayerFile::Root, &root.file),
        ] {
            let file = loaded.as_deref().map_or(Value::Null, |p| Value::String(path_string(p)));
            update_path(&mut config, &format!("meta.{}_file", layer.as_str()), file)?;
        }

        let context_file = self.context_file(&opts.context_file, &config);
        update_path(&mut config, "meta.context_file", context_file)?;

        if config.pointer("/meta/system_path").map_or(true, Value::is_null) {
            let system_path = path_string(&self.settings.system_path);
            update_path(&mut config, "meta.system_path", Value::String(system_path))?;
        }

        Ok(config)
    }

    fn resolve_services(
        &self,
        platform: &str,
        layers: ServiceLayers,
        ignore_version: bool,
    ) -> SosResult<Map<String, Value>> {
        if let Some(source) = self.services {
            return ServiceResolver::new(self, source).resolve(platform, layers, ignore_version);
        }
        if layers.is_empty() {
            return Ok(Map::new());
        }
        let catalog = ServiceCatalog::scan(&self.settings.service_dir())?;
        ServiceResolver::new(self, &catalog).resolve(platform, layers, ignore_version)
    }

    fn persisted_sections(&self, context_file: &LayerSource) -> SosResult<Value> {
        let path = match context_file {
            LayerSource::Disabled => {
                return Err(ConfigurationError::new("persist needs a context file, but it is disabled").into())
            }
            LayerSource::Default => self.settings.layer_path(LayerFile::Context),
            LayerSource::Path(path) => self.settings.resolve(path),
        };
        if !path.is_file() {
            return Err(ConfigurationError::new(format!(
                "previous context file does not exist for persist: {}",
                path.display()
            ))
            .with_path(path)
            .into());
        }

        info!(path = %path.display(), "persisting namespace and service");
        let mut previous = load_yaml(&path)?;
        let mut persisted = Map::new();
        for section in PERSISTED_SECTIONS {
            let value = take_key(&mut previous, section);
            if !value.is_null() {
                persisted.insert((*section).to_string(), value);
            }
        }
        Ok(Value::Object(persisted))
    }

    fn context_file(&self, source: &LayerSource, config: &Value) -> Value {
        let path = match source {
            LayerSource::Disabled => return Value::Bool(false),
            LayerSource::Path(path) => self.settings.resolve(path),
            LayerSource::Default => match config.pointer("/meta/context_file") {
                Some(Value::Bool(false)) => return Value::Bool(false),
                Some(Value::String(path)) if !path.is_empty() => self.settings.resolve(Path::new(path)),
                _ => self.settings.layer_path(LayerFile::Context),
            },
        };
        Value::String(path_string(&path))
    }
}

/// The four file layers, loaded.
struct Layers {
    root: LoadedLayer,
    user: LoadedLayer,
    system: LoadedLayer,
    local: LoadedLayer,
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
