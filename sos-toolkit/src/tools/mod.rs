//! The tool registry.
//!
//! This module provides:
//! - Parameter schemas attached to every tool
//! - [`Root`]s holding namespaced [`Repo`]s of tools
//! - The [`Toolkit`], the four roots built once from plugin descriptors
//! - The built-in `context`, `runtime` and `filesystem` tools

mod builtin;
mod definitions;
mod registry;
mod toolkit;

pub use definitions::{ParamKind, ParamSpec, ToolSchema};
pub use registry::{Handler, Repo, Root, RootEntry, RootKind, Tool};
pub use toolkit::{PluginDescriptor, ToolCall, Toolkit, ToolkitBuilder};
