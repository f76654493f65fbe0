//! Core tools registered by [`ToolkitBuilder::with_core_tools`].
//!
//! [`ToolkitBuilder::with_core_tools`]: super::ToolkitBuilder::with_core_tools

mod context;
mod filesystem;
mod runtime;

use super::PluginDescriptor;
use crate::attr::{AttrMap, Node};
use crate::core::ToolOutput;

pub(super) fn plugins() -> Vec<PluginDescriptor> {
    let mut plugins = context::plugins();
    plugins.extend(runtime::plugins());
    plugins.extend(filesystem::plugins());
    plugins
}

/// Wraps a value as `{result: value}`.
fn output(value: impl Into<Node>) -> ToolOutput {
    let mut map = AttrMap::new();
    map.insert("result", value.into());
    ToolOutput::Value(Node::Map(map))
}

/// Combines per-target outcomes.
fn qualify(qualifier: &str, outcomes: &[bool]) -> anyhow::Result<bool> {
    match qualifier {
        "any" => Ok(outcomes.iter().any(|v| *v)),
        "all" => Ok(outcomes.iter().all(|v| *v)),
        "none" => Ok(!outcomes.iter().any(|v| *v)),
        other => anyhow::bail!("invalid qualifier '{other}', expected any, all or none"),
    }
}
