//! `context.*`: reading and writing the live context.

use super::{output, qualify};
use crate::attr::{AttrMap, Attributes, Node, WriteMode};
use crate::config::{interpolate_str, merge_into, ContextGenerator, GenerateOptions, LayerSource};
use crate::context::{Context, FileRef};
use crate::core::ToolOutput;
use crate::runnable::format_placeholders;
use crate::tools::{ParamKind, ParamSpec, PluginDescriptor, ToolCall};
use anyhow::bail;
use tracing::info;

const NAMESPACE: &str = "context";

pub(super) fn plugins() -> Vec<PluginDescriptor> {
    vec![
        PluginDescriptor::tool(NAMESPACE, "ctx_get", ctx_get)
            .with_description("Get a value from the context")
            .with_param(ParamSpec::required("target", ParamKind::String, "Dotted path to read"))
            .with_param(ParamSpec::optional(
                "default",
                ParamKind::Any,
                "Returned when the path does not resolve",
                Node::Null,
            ))
            .binds_context(),
        PluginDescriptor::tool(NAMESPACE, "ctx_set", ctx_set)
            .with_description("Set a value in the context")
            .with_param(ParamSpec::required("target", ParamKind::String, "Dotted path to write"))
            .with_param(ParamSpec::required("value", ParamKind::Any, "Value to write"))
            .with_param(ParamSpec::optional(
                "overwrite",
                ParamKind::Bool,
                "Replace an existing value",
                false,
            ))
            .binds_context(),
        PluginDescriptor::tool(NAMESPACE, "ctx_remove", ctx_remove)
            .with_description("Remove a value from the context")
            .with_param(ParamSpec::required("target", ParamKind::String, "Dotted path to remove"))
            .binds_context(),
        PluginDescriptor::tool(NAMESPACE, "ctx_has", ctx_has)
            .with_description("Check which paths are set in the context")
            .with_param(ParamSpec::required(
                "targets",
                ParamKind::Any,
                "A dotted path or a list of them",
            ))
            .with_param(ParamSpec::optional(
                "qualifier",
                ParamKind::String,
                "any, all or none",
                "all",
            ))
            .binds_context(),
        PluginDescriptor::tool(NAMESPACE, "ctx_flag", ctx_flag)
            .with_description("Set a context flag to true")
            .with_param(ParamSpec::required("target", ParamKind::String, "Dotted path of the flag"))
            .binds_context(),
        PluginDescriptor::tool(NAMESPACE, "ctx_format", ctx_format)
            .with_description("Format a string from context values")
            .with_param(ParamSpec::required(
                "format_string",
                ParamKind::String,
                "Template with {name} placeholders",
            ))
            .with_param(ParamSpec::optional(
                "targets",
                ParamKind::Map,
                "Placeholder name to context path",
                AttrMap::new(),
            ))
            .with_param(ParamSpec::optional(
                "values",
                ParamKind::Map,
                "Literal placeholder values",
                AttrMap::new(),
            ))
            .with_param(ParamSpec::optional(
                "result",
                ParamKind::String,
                "Context path receiving the formatted string",
                Node::Null,
            ))
            .binds_context(),
        PluginDescriptor::tool(NAMESPACE, "ctx_parse", ctx_parse)
            .with_description("Resolve ${...} references in a context value")
            .with_param(ParamSpec::required("target", ParamKind::String, "Dotted path to parse"))
            .with_param(ParamSpec::optional(
                "result",
                ParamKind::String,
                "Context path receiving the parsed value",
                Node::Null,
            ))
            .binds_context(),
        PluginDescriptor::tool(NAMESPACE, "ctx_merge", ctx_merge)
            .with_description("Merge a system file into the context")
            .with_param(ParamSpec::required(
                "system_file",
                ParamKind::Path,
                "System file to generate and merge over the context",
            ))
            .with_param(ParamSpec::optional(
                "ignore_version",
                ParamKind::Bool,
                "Log toolkit version mismatches instead of failing",
                false,
            ))
            .binds_context(),
    ]
}

fn ctx_get(mut call: ToolCall<'_>) -> anyhow::Result<ToolOutput> {
    let target = call.str_param("target")?;
    let default = call.param("default").cloned();
    let ctx = call.context()?;

    let value = match default {
        Some(default) => ctx.get_or(target, default),
        None => ctx.get(target)?,
    };
    Ok(output(value))
}

fn ctx_set(mut call: ToolCall<'_>) -> anyhow::Result<ToolOutput> {
    let target = call.str_param("target")?;
    let value = call.param("value").cloned().unwrap_or_default();
    let overwrite = call.bool_param("overwrite");

    call.context()?.set(target, value, overwrite)?;
    Ok(output(target))
}

fn ctx_remove(mut call: ToolCall<'_>) -> anyhow::Result<ToolOutput> {
    let target = call.str_param("target")?;
    let removed = call.context()?.remove(target)?;
    Ok(output(removed.unwrap_or_default()))
}

fn ctx_has(mut call: ToolCall<'_>) -> anyhow::Result<ToolOutput> {
    let targets: Vec<&str> = match call.param("targets") {
        Some(Node::Str(target)) => vec![target.as_str()],
        Some(Node::List(items)) => items.iter().filter_map(Node::as_str).collect(),
        _ => bail!("targets must be a path or a list of paths"),
    };
    let qualifier = call.str_param("qualifier")?;
    let ctx = call.context()?;

    let found: Vec<bool> = targets.iter().map(|target| ctx.has(target)).collect();
    Ok(output(qualify(qualifier, &found)?))
}

fn ctx_flag(mut call: ToolCall<'_>) -> anyhow::Result<ToolOutput> {
    let target = call.str_param("target")?;
    call.context()?.set(target, Node::Bool(true), true)?;
    Ok(output(true))
}

fn ctx_format(mut call: ToolCall<'_>) -> anyhow::Result<ToolOutput> {
    let template = call.str_param("format_string")?;
    let result = call.opt_str("result");
    let targets = call.param("targets").and_then(Node::as_map).cloned().unwrap_or_default();
    let mut values = call.param("values").and_then(Node::as_map).cloned().unwrap_or_default();
    let ctx = call.context()?;

    for (name, path) in targets.iter() {
        let Some(path) = path.as_str() else {
            bail!("target '{name}' must be a context path");
        };
        values.insert(name, ctx.get(path)?);
    }
    let formatted = format_placeholders(template, &values)?;
    if let Some(result) = result {
        ctx.set(result, Node::from(formatted.as_str()), true)?;
    }
    Ok(output(formatted))
}

fn ctx_parse(mut call: ToolCall<'_>) -> anyhow::Result<ToolOutput> {
    let target = call.str_param("target")?;
    let result = call.opt_str("result");
    let ctx = call.context()?;

    let value = ctx.get(target)?;
    let parsed = match &value {
        Node::Str(text) => {
            let root = ctx.to_value();
            interpolate_str(text, &root, &|var| std::env::var(var).ok())?
                .map_or_else(|| value.clone(), Node::from_value)
        }
        other => other.clone(),
    };
    if let Some(result) = result {
        ctx.set(result, parsed.clone(), true)?;
    }
    Ok(output(parsed))
}

fn layer_of(file: Option<&str>) -> LayerSource {
    file.map_or(LayerSource::Disabled, LayerSource::path)
}

/// Generates a context from `system_file` with the live context's other
/// layers, merges it over the live one and force-writes every section.
fn ctx_merge(mut call: ToolCall<'_>) -> anyhow::Result<ToolOutput> {
    let system_file = call.str_param("system_file")?;
    let ignore_version = call.bool_param("ignore_version");
    let toolkit = call.toolkit;
    let ctx = call.context()?;

    let meta = ctx.meta();
    let opts = GenerateOptions::new()
        .with_system(LayerSource::path(system_file))
        .with_local(layer_of(meta.local_file.as_deref()))
        .with_user(layer_of(meta.user_file.as_deref()))
        .with_root(layer_of(meta.root_file.as_deref()))
        .with_context_file(match &meta.context_file {
            FileRef::Path(path) => LayerSource::path(path),
            FileRef::Flag(false) => LayerSource::Disabled,
            FileRef::Flag(true) => LayerSource::Default,
        })
        .ignore_version(ignore_version);
    let fresh = ContextGenerator::new(toolkit.settings()).generate_value(&opts)?;

    let mut merged = ctx.to_value();
    merge_into(&mut merged, fresh);
    let merged = Context::from_config(merged)?;
    for section in ["meta", "namespace", "service", "action", "hook"] {
        ctx.set_with(section, merged.get(section)?, WriteMode::FORCE)?;
    }

    info!(system_file, "system file merged");
    Ok(output(true))
}
