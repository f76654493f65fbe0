//! `runtime.*`: control flow inside runs.

use super::{output, qualify};
use crate::attr::{Attributes, Node};
use crate::config::{load_yaml, merge_into, LayerFile};
use crate::core::ToolOutput;
use crate::runnable::{execute_node, Condition};
use crate::tools::{ParamKind, ParamSpec, PluginDescriptor, ToolCall};
use anyhow::{anyhow, bail, Context as _};
use std::path::Path;
use tracing::{debug, info};

const NAMESPACE: &str = "runtime";

pub(super) fn plugins() -> Vec<PluginDescriptor> {
    vec![
        PluginDescriptor::tool(NAMESPACE, "runtime_nested", runtime_nested)
            .with_description("Run another target of the context")
            .with_param(ParamSpec::required("target", ParamKind::String, "Dotted path to run"))
            .binds_context(),
        PluginDescriptor::tool(NAMESPACE, "runtime_break", runtime_break)
            .with_description("Stop the running composite when the conditions hold")
            .with_param(ParamSpec::optional(
                "reason",
                ParamKind::String,
                "Why the run stops",
                "runtime break",
            ))
            .with_param(ParamSpec::optional(
                "conditions",
                ParamKind::List,
                "Conditions deciding the break; none means always",
                Vec::<Node>::new(),
            ))
            .with_param(ParamSpec::optional(
                "qualifier",
                ParamKind::String,
                "any, all or none",
                "all",
            ))
            .binds_context(),
        PluginDescriptor::tool(NAMESPACE, "runtime_exception", runtime_exception)
            .with_description("Fail the run")
            .with_param(ParamSpec::optional(
                "kind",
                ParamKind::String,
                "Error kind shown in the message",
                "RuntimeError",
            ))
            .with_param(ParamSpec::required("message", ParamKind::String, "Error message")),
        PluginDescriptor::tool(NAMESPACE, "runtime_match", runtime_match)
            .with_description("Run the target mapped from a context value")
            .with_param(ParamSpec::required("target", ParamKind::String, "Dotted path of the value to match"))
            .with_param(ParamSpec::required(
                "cases",
                ParamKind::Map,
                "Value to a path or an inline runnable",
            ))
            .with_param(ParamSpec::optional(
                "default",
                ParamKind::Any,
                "Used when no case matches",
                Node::Null,
            ))
            .binds_context(),
        PluginDescriptor::tool(NAMESPACE, "runtime_local", runtime_local)
            .with_description("Merge values into the local layer file")
            .with_param(ParamSpec::required("obj", ParamKind::Map, "Values to write to the local layer"))
            .with_param(ParamSpec::optional(
                "file",
                ParamKind::Path,
                "Layer file to write instead of the configured local file",
                Node::Null,
            )),
    ]
}

fn runtime_nested(mut call: ToolCall<'_>) -> anyhow::Result<ToolOutput> {
    let target = call.str_param("target")?;
    let toolkit = call.toolkit;
    let ctx = call.context()?;

    debug!(target, "nested run");
    Ok(ToolOutput::Result(ctx.run(toolkit, target)?))
}

fn runtime_break(mut call: ToolCall<'_>) -> anyhow::Result<ToolOutput> {
    let reason = call.str_param("reason")?;
    let qualifier = call.str_param("qualifier")?;
    let conditions = call.param("conditions").and_then(Node::as_list).unwrap_or_default();

    if conditions.is_empty() {
        info!(reason, "break");
        return Ok(ToolOutput::brk(reason));
    }

    let ctx = call.context()?;
    let mut snapshot = Vec::with_capacity(conditions.len());
    let mut outcomes = Vec::with_capacity(conditions.len());
    for node in conditions {
        let mut condition = Condition::from_node(node)?;
        condition.raise_exc = false;
        outcomes.push(condition.evaluate(&*ctx)?);
        snapshot.push(condition.to_node());
    }

    if qualify(qualifier, &outcomes)? {
        info!(reason, "break");
        Ok(ToolOutput::Break {
            reason: reason.to_string(),
            data: Node::List(snapshot),
        })
    } else {
        debug!(reason, "break conditions not met");
        Ok(output(false))
    }
}

fn runtime_exception(call: ToolCall<'_>) -> anyhow::Result<ToolOutput> {
    let kind = call.str_param("kind")?;
    let message = call.str_param("message")?;
    Err(anyhow!("{kind}: {message}"))
}

fn runtime_match(mut call: ToolCall<'_>) -> anyhow::Result<ToolOutput> {
    let target = call.str_param("target")?;
    let cases = call
        .param("cases")
        .and_then(Node::as_map)
        .ok_or_else(|| anyhow!("cases must be a map"))?;
    let fallback = call.param("default");
    let toolkit = call.toolkit;
    let ctx = call.context()?;

    let key = ctx.get(target)?.to_string();
    let Some(case) = cases.child(&key).filter(|c| !c.is_null()).or(fallback) else {
        let valid: Vec<&str> = cases.keys().collect();
        bail!("no case for '{key}' at {target}, valid: {}", valid.join(", "));
    };

    debug!(target, case = %key, "match");
    let result = match case {
        Node::Str(path) => ctx.run(toolkit, path)?,
        node => execute_node(&format!("runtime_match.{key}"), node, ctx, toolkit)?,
    };
    Ok(ToolOutput::Result(result))
}

/// Merges `obj` over the local layer file, creating it when missing, and
/// returns the file written.
fn runtime_local(call: ToolCall<'_>) -> anyhow::Result<ToolOutput> {
    let obj = call
        .param("obj")
        .ok_or_else(|| anyhow!("obj must be a map"))?
        .to_value();
    let settings = call.toolkit.settings();
    let path = match call.opt_str("file").filter(|f| !f.is_empty()) {
        Some(file) => settings.resolve(Path::new(file)),
        None => settings.layer_path(LayerFile::Local),
    };

    let mut layer = if path.is_file() {
        load_yaml(&path)?
    } else {
        serde_json::Value::Object(serde_json::Map::new())
    };
    merge_into(&mut layer, obj);

    let text = serde_yaml::to_string(&layer)?;
    std::fs::write(&path, text).with_context(|| format!("cannot write {}", path.display()))?;
    info!(path = %path.display(), "local layer written");
    Ok(output(Node::Str(path.to_string_lossy().into_owned())))
}

#[cfg(test)]
mod tests {
    use crate::attr::{Attributes, Node};
    use crate::core::RunStatus;
    use crate::errors::SosError;
    use crate::config::load_yaml;
    use crate::testing::{context_from, settings_in, test_toolkit, write_file, Recorder};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    const CONFIG: &str = r"
namespace:
  mode: fast
  stop: true
action:
  steps:
    first:
      tool: test.record
      params: {name: first}
    halt:
      tool: runtime.runtime_break
      params:
        reason: stop requested
        conditions:
          - {ctx_key: namespace.stop, valid: true}
    last:
      tool: test.record
      params: {name: last}
  pick:
    tool: runtime.runtime_match
    params:
      target: namespace.mode
      cases:
        fast: action.fast
        slow: {tool: test.record, params: {name: slow}}
  fast:
    tool: test.record
    params: {name: fast}
  nested:
    tool: runtime.runtime_nested
    params: {target: action.fast}
  boom:
    tool: runtime.runtime_exception
    params: {message: broken}
";

    #[test]
    fn test_break_stops_composite() {
        let recorder = Recorder::default();
        let toolkit = test_toolkit(&recorder);
        let mut ctx = context_from(CONFIG).unwrap();

        let result = ctx.run(&toolkit, "action.steps").unwrap();
        assert_eq!(recorder.calls(), vec!["first".to_string()]);
        let halt = result.child("halt").unwrap();
        assert_eq!(halt.status, RunStatus::Break);
        assert_eq!(halt.reason.as_deref(), Some("stop requested"));
        assert!(result.child("last").is_none());
    }

    #[test]
    fn test_break_passes_when_conditions_fail() {
        let recorder = Recorder::default();
        let toolkit = test_toolkit(&recorder);
        let mut ctx = context_from(CONFIG).unwrap();
        ctx.set("namespace.stop", Node::Bool(false), true).unwrap();

        ctx.run(&toolkit, "action.steps").unwrap();
        assert_eq!(recorder.calls(), vec!["first".to_string(), "last".to_string()]);
    }

    #[test]
    fn test_match_runs_path_and_inline_cases() {
        let recorder = Recorder::default();
        let toolkit = test_toolkit(&recorder);
        let mut ctx = context_from(CONFIG).unwrap();

        ctx.run(&toolkit, "action.pick").unwrap();
        ctx.set("namespace.mode", Node::from("slow"), true).unwrap();
        ctx.run(&toolkit, "action.pick").unwrap();
        assert_eq!(recorder.calls(), vec!["fast".to_string(), "slow".to_string()]);

        ctx.set("namespace.mode", Node::from("other"), true).unwrap();
        assert!(ctx.run(&toolkit, "action.pick").is_err());
    }

    #[test]
    fn test_nested_and_exception() {
        let recorder = Recorder::default();
        let toolkit = test_toolkit(&recorder);
        let mut ctx = context_from(CONFIG).unwrap();

        ctx.run(&toolkit, "action.nested").unwrap();
        assert_eq!(recorder.calls(), vec!["fast".to_string()]);

        let err = ctx.run(&toolkit, "action.boom").unwrap_err();
        assert!(matches!(err, SosError::ToolFailed { .. }));
        assert!(err.to_string().contains("RuntimeError: broken"));
    }

    #[test]
    fn test_local_layer_is_merged_and_written() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "sos-local.yaml", "namespace: {port: 8080, host: db}\n").unwrap();
        let toolkit = Recorder::default().toolkit(settings_in(dir.path()));
        let mut ctx = context_from(
            r"
action:
  local:
    tool: runtime.runtime_local
    params:
      obj: {namespace: {port: 9090}, meta: {profile: gpu}}
  other:
    tool: runtime.runtime_local
    params:
      obj: {namespace: {debug: true}}
      file: conf/override.yaml
",
        )
        .unwrap();

        let result = ctx.run(&toolkit, "action.local").unwrap();
        let local = dir.path().join("sos-local.yaml");
        assert_eq!(result.get("result"), Some(Node::from(local.to_string_lossy().into_owned())));
        assert_eq!(
            load_yaml(&local).unwrap(),
            json!({"namespace": {"port": 9090, "host": "db"}, "meta": {"profile": "gpu"}})
        );

        std::fs::create_dir_all(dir.path().join("conf")).unwrap();
        ctx.run(&toolkit, "action.other").unwrap();
        assert_eq!(
            load_yaml(&dir.path().join("conf/override.yaml")).unwrap(),
            json!({"namespace": {"debug": true}})
        );
    }
}
