//! Layered configuration: settings, layer files, merging and context
//! generation.

mod generator;
mod interpolate;
mod layers;
mod merge;
pub mod platform;
mod settings;
mod version;

#[cfg(test)]
mod config_tests;

pub use generator::{ContextGenerator, GenerateOptions};
pub use interpolate::{interpolate_str, resolve_tree};
pub use layers::{load_layer, load_yaml, LayerSource, LoadedLayer};
pub use merge::{lookup_path, merge_all, merge_into, take_key, update_path};
pub use settings::{is_truthy, LayerFile, Settings, DEFAULT_NETWORK, DEFAULT_PROFILE, SERVICE_FILE};
pub use version::check_version;
