//! The resolved state of a system.
//!
//! A [`Context`] holds the five sections of a merged configuration tree:
//! - `meta`: typed scalar configuration ([`MetaConfig`])
//! - `namespace`: free-form values, preserved and locked
//! - `service`: resolved service sub-contexts
//! - `action` and `hook`: executable composites
//!
//! It is the root the engine runs against, and it persists as a YAML
//! snapshot between lifecycle actions.

#[allow(clippy::module_inception)]
mod context;
mod meta;
mod persist;


pub use context::Context;
pub use meta::{FileRef, MetaConfig};
pub use persist::{LoadOptions, ON_CONTEXT_LOAD, ON_CONTEXT_SAVE};
