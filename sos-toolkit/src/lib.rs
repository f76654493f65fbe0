//! # SOS Toolkit
//!
//! A declarative orchestration engine for layered system configurations.
//!
//! A system is described in YAML layers (root, user, system, local) plus
//! runtime overrides. The toolkit merges them into a [`Context`], expands
//! the services the system declares, and runs the executable trees in
//! its `action` and `hook` sections against registered tools.
//!
//! - **Attribute model**: dotted-path access over nested maps and lists
//! - **Registry**: tools and actions bound into namespaced repos
//! - **Runnables and composites**: gated tool calls with parameter
//!   mapping, result mapping and callback chains
//! - **Context generation**: layer merging, service resolution,
//!   `${...}` interpolation and snapshot persistence
//! - **Lifecycle actions**: setup, build, install, up, down and friends
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sos_toolkit::prelude::*;
//!
//! let toolkit = Toolkit::builder()
//!     .with_settings(Settings::from_env())
//!     .with_core_tools()
//!     .with_actions()
//!     .build();
//!
//! toolkit.run_action("setup", &AttrMap::new())?;
//! toolkit.run_action("install", &AttrMap::new())?;
//! toolkit.run_action("up", &AttrMap::new())?;
//! ```
//!
//! [`Context`]: context::Context

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod actions;
pub mod attr;
pub mod config;
pub mod context;
pub mod core;
pub mod errors;
pub mod observability;
pub mod runnable;
pub mod services;
pub mod testing;
pub mod tools;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::attr::{AttrMap, Attributes, Node, WriteMode};
    pub use crate::config::{ContextGenerator, GenerateOptions, LayerSource, Settings};
    pub use crate::context::{Context, LoadOptions, MetaConfig};
    pub use crate::core::{RunResult, RunStatus, ToolOutput};
    pub use crate::errors::{ContractErrorInfo, SosError, SosResult};
    pub use crate::observability::{init_logging, LogSettings};
    pub use crate::runnable::{Composite, Condition, Resolvable, Runnable};
    pub use crate::services::{ServiceCatalog, ServiceResolver, ServiceSource};
    pub use crate::tools::{ParamKind, ParamSpec, PluginDescriptor, ToolCall, Toolkit};
}
