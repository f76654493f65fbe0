//! Reading configuration layer files.

use super::{LayerFile, Settings};
use crate::errors::{ConfigurationError, SosResult};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Where a layer comes from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LayerSource {
    /// Skip the layer.
    Disabled,
    /// The environment override, else the conventional file name.
    #[default]
    Default,
    /// An explicit file.
    Path(PathBuf),
}

impl LayerSource {
    /// Creates an explicit source.
    #[must_use]
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }
}

/// A layer after loading.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedLayer {
    /// The parsed configuration; an empty map when nothing was read.
    pub config: Value,
    /// The absolute path actually read.
    pub file: Option<PathBuf>,
}

impl LoadedLayer {
    /// Creates an empty layer.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            config: Value::Object(Map::new()),
            file: None,
        }
    }
}

/// Parses a YAML file into a map value.
///
/// # Errors
///
/// Fails if the file cannot be read, is not YAML, or is not a map at the
/// top level.
pub fn load_yaml(path: &Path) -> SosResult<Value> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        ConfigurationError::new(format!("cannot read {}: {e}", path.display())).with_path(path)
    })?;
    let value: Value = serde_yaml::from_str(&text).map_err(|e| {
        ConfigurationError::new(format!("invalid YAML in {}: {e}", path.display())).with_path(path)
    })?;

    match value {
        Value::Null => Ok(Value::Object(Map::new())),
        Value::Object(_) => Ok(value),
        other => Err(ConfigurationError::new(format!(
            "{} must hold a map, found {}",
            path.display(),
            kind(&other)
        ))
        .with_path(path)
        .into()),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a bool",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a map",
    }
}

/// Loads one layer.
///
/// A missing system file is fatal, as is a missing root file that was
/// named explicitly. Missing local and user files degrade to an empty
/// layer.
///
/// # Errors
///
/// Returns `ConfigurationError` for fatal missing files and for files
/// that do not parse.
pub fn load_layer(settings: &Settings, layer: LayerFile, source: &LayerSource) -> SosResult<LoadedLayer> {
    let (path, explicit) = match source {
        LayerSource::Disabled => {
            debug!(layer = layer.as_str(), "layer disabled");
            return Ok(LoadedLayer::empty());
        }
        LayerSource::Default => (settings.layer_path(layer), false),
        LayerSource::Path(path) => (settings.resolve(path), true),
    };

    if path.is_file() {
        info!(layer = layer.as_str(), path = %path.display(), "loading layer");
        return Ok(LoadedLayer {
            config: load_yaml(&path)?,
            file: Some(path),
        });
    }

    let fatal = match layer {
        LayerFile::System | LayerFile::Context => true,
        LayerFile::Root => explicit,
        LayerFile::Local | LayerFile::User => false,
    };
    if fatal {
        return Err(ConfigurationError::new(format!(
            "no {} file available: {} is missing",
            layer.as_str(),
            path.display()
        ))
        .with_path(path)
        .into());
    }

    debug!(layer = layer.as_str(), path = %path.display(), "layer file absent");
    Ok(LoadedLayer::empty())
}
