//! Scalar system configuration: the `meta` section of a context.

use crate::attr::{AttrMap, Node};
use crate::config::{platform, DEFAULT_NETWORK, DEFAULT_PROFILE};
use crate::errors::{ConfigurationError, SosResult};
use serde::{Deserialize, Serialize};

/// A file slot in meta: disabled with `false`, or a path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FileRef {
    /// `false` disables the file; `true` asks for the default.
    Flag(bool),
    /// An explicit path.
    Path(String),
}

impl FileRef {
    /// Returns the path, if one is set.
    #[must_use]
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::Path(path) => Some(path),
            Self::Flag(_) => None,
        }
    }

    /// Returns true for an explicit `false`.
    #[must_use]
    pub const fn is_disabled(&self) -> bool {
        matches!(self, Self::Flag(false))
    }
}

impl Default for FileRef {
    fn default() -> Self {
        Self::Path(crate::config::LayerFile::Context.default_name().to_string())
    }
}

fn default_platform() -> String {
    platform::detect().to_string()
}

fn default_profile() -> String {
    DEFAULT_PROFILE.to_string()
}

fn default_network() -> String {
    DEFAULT_NETWORK.to_string()
}

/// The typed `meta` section.
///
/// Keys the toolkit does not know are kept in `extra` and survive a
/// save/load cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaConfig {
    /// Toolkit version the system was built for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sos_version: Option<String>,
    /// System name.
    #[serde(default)]
    pub system_name: String,
    /// System version.
    #[serde(default)]
    pub system_version: String,
    /// Internal directory of the system.
    #[serde(default)]
    pub system_internal: String,
    /// System description.
    #[serde(default)]
    pub system_description: String,
    /// Runtime platform.
    #[serde(default = "default_platform")]
    pub platform: String,
    /// Runtime profile.
    #[serde(default = "default_profile")]
    pub profile: String,
    /// Default network.
    #[serde(default = "default_network")]
    pub network: String,
    /// Run sandboxed.
    #[serde(default)]
    pub sandbox: bool,
    /// Directory the system was generated in.
    #[serde(default)]
    pub system_path: Option<String>,
    /// Whether `install` has completed.
    #[serde(default)]
    pub is_installed: bool,
    /// Local layer file actually used.
    #[serde(default)]
    pub local_file: Option<String>,
    /// User layer file actually used.
    #[serde(default)]
    pub user_file: Option<String>,
    /// System layer file actually used.
    #[serde(default)]
    pub system_file: Option<String>,
    /// Root layer file actually used.
    #[serde(default)]
    pub root_file: Option<String>,
    /// Where the context snapshot is saved.
    #[serde(default)]
    pub context_file: FileRef,
    /// Everything else.
    #[serde(flatten)]
    pub extra: AttrMap,
}

impl Default for MetaConfig {
    fn default() -> Self {
        Self {
            sos_version: None,
            system_name: String::new(),
            system_version: String::new(),
            system_internal: String::new(),
            system_description: String::new(),
            platform: default_platform(),
            profile: default_profile(),
            network: default_network(),
            sandbox: false,
            system_path: None,
            is_installed: false,
            local_file: None,
            user_file: None,
            system_file: None,
            root_file: None,
            context_file: FileRef::default(),
            extra: AttrMap::new(),
        }
    }
}

impl MetaConfig {
    /// Parses meta from a plain map.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` for fields of the wrong type.
    pub fn from_attr_map(map: &AttrMap) -> SosResult<Self> {
        serde_json::from_value(Node::Map(map.clone()).to_value())
            .map_err(|e| ConfigurationError::new(format!("invalid meta: {e}")).into())
    }

    /// Converts meta to a preserved, locked map.
    #[must_use]
    pub fn to_attr_map(&self) -> AttrMap {
        let map = match serde_json::to_value(self).map(Node::from_value) {
            Ok(Node::Map(map)) => map,
            _ => AttrMap::new(),
        };
        map.with_preserve(true).with_locked(true)
    }
}
