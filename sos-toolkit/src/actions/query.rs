//! Actions that inspect or run parts of an existing context.

use super::{context_file_param, target_param, target_path, Session, NAMESPACE};
use crate::attr::{Attributes, Node};
use crate::context::LoadOptions;
use crate::core::{RunResult, RunStatus, ToolOutput};
use crate::tools::{ParamKind, ParamSpec, PluginDescriptor, ToolCall};
use anyhow::bail;
use tracing::{info, warn};

pub(super) fn plugins() -> Vec<PluginDescriptor> {
    vec![
        PluginDescriptor::action(NAMESPACE, "context", context)
            .with_description("Query or edit the system context")
            .with_param(target_param("Dotted path to read or write"))
            .with_param(context_file_param())
            .with_param(ParamSpec::optional(
                "value",
                ParamKind::Any,
                "Value to write at the target",
                Node::Null,
            )),
        PluginDescriptor::action(NAMESPACE, "config", config)
            .with_description("Run a configuration target")
            .with_param(target_param("Config target, or service.<name>.<target>"))
            .with_param(context_file_param()),
        PluginDescriptor::action(NAMESPACE, "action", action)
            .with_description("Run any target of the context")
            .with_param(ParamSpec::required("target", ParamKind::String, "Dotted path to run"))
            .with_param(context_file_param()),
        PluginDescriptor::action(NAMESPACE, "service", service)
            .with_description("Run an action of the resolved services")
            .with_param(target_param("Service to run; none runs every service"))
            .with_param(ParamSpec::required("action", ParamKind::String, "Service action to run"))
            .with_param(context_file_param()),
    ]
}

fn context(call: ToolCall<'_>) -> anyhow::Result<ToolOutput> {
    let mut session = Session::load(&call, LoadOptions::new())?;
    let hook = session.ctx.run(call.toolkit, "action.sos_context")?;

    let target = call.opt_str("target").filter(|t| !t.is_empty());
    let data = match (target, call.param("value")) {
        (Some(target), Some(value)) => {
            session.ctx.set(target, value.clone(), true)?;
            session.save(&call)?;
            info!(path = target, "context value set");
            value.clone()
        }
        (Some(target), None) => session.ctx.get(target)?,
        (None, Some(_)) => bail!("a value needs a target"),
        (None, None) => session.ctx.to_node(),
    };

    let mut result = RunResult::ok(data).with_label(Some("context".to_string()));
    result.push_child("sos_context", hook);
    Ok(ToolOutput::Result(result.finish()))
}

/// Maps a config target to the path it runs.
fn config_path(ctx: &impl Attributes, target: Option<&str>) -> anyhow::Result<String> {
    match target.filter(|t| !t.is_empty()) {
        None if ctx.has("action.sos_config.default") => Ok("action.sos_config.default".to_string()),
        None => Ok("action.sos_config".to_string()),
        Some(target) if target == "service" || target.starts_with("service.") => {
            let parts: Vec<&str> = target.split('.').collect();
            match parts.as_slice() {
                ["service", name, key] => Ok(format!("service.{name}.action.sos_config.{key}")),
                _ => bail!("service config targets look like service.<name>.<target>, got {target}"),
            }
        }
        Some(target) => Ok(format!("action.sos_config.{target}")),
    }
}

fn config(call: ToolCall<'_>) -> anyhow::Result<ToolOutput> {
    let mut session = Session::load(&call, LoadOptions::new())?;
    let path = config_path(&session.ctx, call.opt_str("target"))?;

    let result = session.ctx.run(call.toolkit, &path)?;
    session.save(&call)?;
    Ok(ToolOutput::Result(result))
}

fn action(call: ToolCall<'_>) -> anyhow::Result<ToolOutput> {
    let target = call.str_param("target")?;
    let mut session = Session::load(&call, LoadOptions::new())?;

    let result = session.ctx.run(call.toolkit, target)?;
    session.save(&call)?;
    Ok(ToolOutput::Result(result))
}

fn service(call: ToolCall<'_>) -> anyhow::Result<ToolOutput> {
    let action = call.str_param("action")?;
    let mut session = Session::load(&call, LoadOptions::new())?;

    let names: Vec<String> = match call.opt_str("target").filter(|t| !t.is_empty()) {
        Some(name) => vec![name.to_string()],
        None => session.ctx.service().keys().map(str::to_string).collect(),
    };

    let mut results = Vec::with_capacity(names.len());
    for name in &names {
        let path = target_path(&format!("service.{name}.action"), Some(action));
        let result = if session.ctx.get_opt(&path)?.is_some_and(|n| !n.is_null()) {
            session.ctx.run(call.toolkit, &path)?
        } else {
            warn!(path = %path, "service does not support the action");
            RunResult::empty(format!("service target does not support the action: {path}"))
        };
        results.push((name.clone(), result));
    }
    session.save(&call)?;

    if results.len() == 1 && call.opt_str("target").is_some_and(|t| !t.is_empty()) {
        if let Some((_, result)) = results.pop() {
            return Ok(ToolOutput::Result(result));
        }
    }
    let mut aggregate = RunResult::new(RunStatus::Ok).with_label(Some("service".to_string()));
    for (name, result) in results {
        aggregate.push_child(name, result);
    }
    Ok(ToolOutput::Result(aggregate.finish()))
}
