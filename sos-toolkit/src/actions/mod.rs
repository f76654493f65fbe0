//! Lifecycle actions: the `sos` namespace of the action root.
//!
//! Every action loads (or generates) a context, runs one target of it and
//! saves it back. They are invoked through [`Toolkit::run_action`] and use
//! the toolkit's own settings.
//!
//! [`Toolkit::run_action`]: crate::tools::Toolkit::run_action

mod lifecycle;
mod query;

#[cfg(test)]
mod actions_tests;

use crate::attr::Node;
use crate::config::LayerSource;
use crate::context::{Context, LoadOptions};
use crate::tools::{ParamKind, ParamSpec, PluginDescriptor, ToolCall};
use anyhow::bail;
use std::path::PathBuf;

/// Namespace of the lifecycle actions.
pub const NAMESPACE: &str = "sos";

pub(crate) fn plugins() -> Vec<PluginDescriptor> {
    let mut plugins = lifecycle::plugins();
    plugins.extend(query::plugins());
    plugins
}

fn target_param(description: &str) -> ParamSpec {
    ParamSpec::optional("target", ParamKind::String, description, Node::Null)
}

fn context_file_param() -> ParamSpec {
    ParamSpec::optional(
        "context_file",
        ParamKind::Path,
        "Context file to use instead of the configured one",
        Node::Null,
    )
}

fn layer_param(name: &str, description: &str) -> ParamSpec {
    ParamSpec::optional(name, ParamKind::Any, description, Node::Null)
}

/// Reads a layer parameter: absent for the default file, `false` to skip
/// the layer, or a path.
fn layer_source(call: &ToolCall<'_>, name: &str) -> anyhow::Result<LayerSource> {
    match call.param(name) {
        None => Ok(LayerSource::Default),
        Some(Node::Bool(false)) => Ok(LayerSource::Disabled),
        Some(Node::Bool(true)) => Ok(LayerSource::Default),
        Some(Node::Str(path)) if path.is_empty() => Ok(LayerSource::Default),
        Some(Node::Str(path)) => Ok(LayerSource::path(path)),
        Some(other) => bail!("'{name}' must be a path or false, found a {}", other.kind_name()),
    }
}

fn context_file(call: &ToolCall<'_>) -> Option<PathBuf> {
    call.opt_str("context_file")
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
}

/// `base` or `base.<target>` when a target is given.
fn target_path(base: &str, target: Option<&str>) -> String {
    match target.filter(|t| !t.is_empty()) {
        Some(target) => format!("{base}.{target}"),
        None => base.to_string(),
    }
}

/// An opened context plus the file it came from.
struct Session {
    ctx: Context,
    file: Option<PathBuf>,
}

impl Session {
    fn load(call: &ToolCall<'_>, opts: LoadOptions) -> anyhow::Result<Self> {
        let file = context_file(call);
        let ctx = Context::file_load(call.toolkit, file.as_deref(), opts)?;
        Ok(Self { ctx, file })
    }

    fn save(&mut self, call: &ToolCall<'_>) -> anyhow::Result<PathBuf> {
        Ok(self.ctx.file_save(call.toolkit, self.file.as_deref(), true)?)
    }
}
