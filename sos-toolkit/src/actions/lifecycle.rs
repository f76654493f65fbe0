//! Actions that move a system through its lifecycle.

use super::{context_file_param, layer_param, layer_source, target_param, target_path, Session, NAMESPACE};
use crate::attr::{Attributes, Node, WriteMode};
use crate::config::{ContextGenerator, GenerateOptions, LayerSource};
use crate::context::{LoadOptions, ON_CONTEXT_LOAD};
use crate::core::{RunResult, RunStatus, ToolOutput};
use crate::tools::{ParamKind, ParamSpec, PluginDescriptor, ToolCall};
use anyhow::bail;
use serde_json::json;
use std::path::Path;
use tracing::{info, warn};

pub(super) fn plugins() -> Vec<PluginDescriptor> {
    vec![
        with_layers(PluginDescriptor::action(NAMESPACE, "setup", setup))
            .with_description("Generate the system context")
            .with_param(context_file_param())
            .with_param(ParamSpec::optional(
                "overwrite",
                ParamKind::Bool,
                "Replace an existing context file",
                false,
            ))
            .with_param(ParamSpec::optional(
                "installed",
                ParamKind::Bool,
                "Value of meta.is_installed",
                false,
            ))
            .with_param(ParamSpec::optional("profile", ParamKind::String, "Profile to enable", Node::Null))
            .with_param(ParamSpec::optional(
                "persist",
                ParamKind::Bool,
                "Keep namespace and service from the existing context file",
                false,
            ))
            .with_param(ignore_version_param())
            .with_param(ParamSpec::optional(
                "test",
                ParamKind::Bool,
                "Generate and return the context without saving",
                false,
            ))
            .with_param(ParamSpec::optional(
                "run_setup",
                ParamKind::Bool,
                "Run action.sos_setup of the generated context",
                true,
            )),
        stage("build", "Build the system", build),
        stage("install", "Install the system", install),
        stage("up", "Start the system", up),
        stage("down", "Stop the system", down),
        stage("clean", "Clean the system and delete its context file", clean),
        stage("status", "Report the status of the system", status),
        stage("dev", "Prepare the system for development", dev),
        PluginDescriptor::action(NAMESPACE, "profile", profile)
            .with_description("Select the system profile")
            .with_param(ParamSpec::required("profile", ParamKind::String, "Profile to select"))
            .with_param(context_file_param()),
        PluginDescriptor::action(NAMESPACE, "commit", commit)
            .with_description("Commit system objects")
            .with_param(ParamSpec::optional(
                "target",
                ParamKind::String,
                "Child of action.sos_commit to run",
                DEFAULT_COMMIT,
            ))
            .with_param(context_file_param()),
        PluginDescriptor::action(NAMESPACE, "restart", restart)
            .with_description("Restart the system")
            .with_param(target_param("Restart target; none runs down, restart and up"))
            .with_param(context_file_param()),
        with_layers(PluginDescriptor::action(NAMESPACE, "update", update))
            .with_description("Replace one subtree of the context with a regenerated one")
            .with_param(ParamSpec::required("target", ParamKind::String, "Dotted path to replace"))
            .with_param(context_file_param())
            .with_param(ignore_version_param())
            .with_param(ParamSpec::optional(
                "action_update",
                ParamKind::Bool,
                "Run action.sos_update afterwards",
                true,
            )),
    ]
}

const DEFAULT_COMMIT: &str = "default";

fn stage(
    key: &str,
    description: &str,
    handler: fn(ToolCall<'_>) -> anyhow::Result<ToolOutput>,
) -> PluginDescriptor {
    PluginDescriptor::action(NAMESPACE, key, handler)
        .with_description(description)
        .with_param(target_param("Child of the action to run"))
        .with_param(context_file_param())
}

fn with_layers(descriptor: PluginDescriptor) -> PluginDescriptor {
    descriptor
        .with_param(layer_param("system_file", "System layer: a path, or false to skip"))
        .with_param(layer_param("local_file", "Local layer: a path, or false to skip"))
        .with_param(layer_param("user_file", "User layer: a path, or false to skip"))
        .with_param(layer_param("root_file", "Root layer: a path, or false to skip"))
}

fn ignore_version_param() -> ParamSpec {
    ParamSpec::optional(
        "ignore_version",
        ParamKind::Bool,
        "Log toolkit version mismatches instead of failing",
        false,
    )
}

fn layer_options(call: &ToolCall<'_>) -> anyhow::Result<GenerateOptions> {
    Ok(GenerateOptions::new()
        .with_system(layer_source(call, "system_file")?)
        .with_local(layer_source(call, "local_file")?)
        .with_user(layer_source(call, "user_file")?)
        .with_root(layer_source(call, "root_file")?)
        .ignore_version(call.bool_param("ignore_version")))
}

fn setup(call: ToolCall<'_>) -> anyhow::Result<ToolOutput> {
    let settings = call.toolkit.settings();
    let context_file = layer_source(&call, "context_file")?;
    let opts = layer_options(&call)?
        .with_context_file(context_file)
        .persist(call.bool_param("persist"));

    let mut ctx = ContextGenerator::new(settings).generate(&opts)?;
    if call.bool_param("test") {
        info!("setup test run, context not saved");
        return Ok(ToolOutput::Value(ctx.to_node()));
    }

    if let Some(file) = ctx.meta().context_file.path() {
        let file = settings.resolve(Path::new(file));
        if file.exists() && !call.bool_param("overwrite") {
            bail!("context file exists and overwrite is off: {}", file.display());
        }
    }

    ctx.run(call.toolkit, ON_CONTEXT_LOAD)?;
    let result = if call.bool_param("run_setup") {
        ctx.run(call.toolkit, "action.sos_setup")?
    } else {
        RunResult::new(RunStatus::Ok)
    };

    if let Some(profile) = call.opt_str("profile").filter(|p| !p.is_empty()) {
        ctx.meta_mut().profile = profile.to_string();
    }
    ctx.meta_mut().is_installed = call.bool_param("installed");
    let path = ctx.file_save(call.toolkit, None, false)?;
    info!(path = %path.display(), "system context generated");
    Ok(ToolOutput::Result(result))
}

/// Loads, runs `action.sos_<name>[.target]` and saves.
fn run_stage(call: &ToolCall<'_>, name: &str, opts: LoadOptions, mark_installed: bool) -> anyhow::Result<ToolOutput> {
    let mut session = Session::load(call, opts)?;
    let path = target_path(&format!("action.sos_{name}"), call.opt_str("target"));

    let result = session.ctx.run(call.toolkit, &path)?;
    if mark_installed {
        session.ctx.meta_mut().is_installed = true;
    }
    session.save(call)?;
    Ok(ToolOutput::Result(result))
}

fn build(call: ToolCall<'_>) -> anyhow::Result<ToolOutput> {
    run_stage(&call, "build", LoadOptions::new().with_install_state(false), true)
}

fn install(call: ToolCall<'_>) -> anyhow::Result<ToolOutput> {
    run_stage(&call, "install", LoadOptions::new().with_install_state(false), true)
}

fn up(call: ToolCall<'_>) -> anyhow::Result<ToolOutput> {
    run_stage(&call, "up", LoadOptions::new().with_install_state(true), false)
}

fn down(call: ToolCall<'_>) -> anyhow::Result<ToolOutput> {
    run_stage(&call, "down", LoadOptions::new().with_install_state(true), false)
}

fn status(call: ToolCall<'_>) -> anyhow::Result<ToolOutput> {
    run_stage(&call, "status", LoadOptions::new(), false)
}

fn dev(call: ToolCall<'_>) -> anyhow::Result<ToolOutput> {
    run_stage(&call, "dev", LoadOptions::new(), false)
}

fn profile(call: ToolCall<'_>) -> anyhow::Result<ToolOutput> {
    let profile = call.str_param("profile")?;
    let mut session = Session::load(&call, LoadOptions::new())?;

    let result = session.ctx.run(call.toolkit, &target_path("action.sos_profile", Some(profile)))?;
    session.ctx.meta_mut().profile = profile.to_string();
    session.save(&call)?;
    info!(profile, "profile selected");
    Ok(ToolOutput::Result(result))
}

fn commit(call: ToolCall<'_>) -> anyhow::Result<ToolOutput> {
    let target = call.opt_str("target").filter(|t| !t.is_empty()).unwrap_or(DEFAULT_COMMIT);
    let mut session = Session::load(&call, LoadOptions::new())?;

    let result = session.ctx.run(call.toolkit, &format!("action.sos_commit.{target}"))?;
    session.save(&call)?;
    Ok(ToolOutput::Result(result))
}

fn restart(call: ToolCall<'_>) -> anyhow::Result<ToolOutput> {
    let mut session = Session::load(&call, LoadOptions::new().with_install_state(true))?;

    let result = if let Some(target) = call.opt_str("target").filter(|t| !t.is_empty()) {
        session.ctx.run(call.toolkit, &format!("action.sos_restart.{target}"))?
    } else {
        let mut steps = vec![("down", "action.sos_down")];
        if session.ctx.has("action.sos_restart.default") {
            steps.push(("restart", "action.sos_restart.default"));
        }
        steps.push(("up", "action.sos_up"));

        let mut aggregate = RunResult::new(RunStatus::Ok).with_label(Some("restart".to_string()));
        for (key, path) in steps {
            let step = session.ctx.run(call.toolkit, path)?;
            let stop = step.is_break();
            aggregate.push_child(key, step);
            if stop {
                aggregate = aggregate.with_message(format!("break at restart.{key}"));
                break;
            }
        }
        aggregate.finish()
    };

    session.save(&call)?;
    Ok(ToolOutput::Result(result))
}

fn clean(call: ToolCall<'_>) -> anyhow::Result<ToolOutput> {
    let session = Session::load(&call, LoadOptions::new())?;
    let mut ctx = session.ctx;
    let result = ctx.run(call.toolkit, &target_path("action.sos_clean", call.opt_str("target")))?;

    let settings = call.toolkit.settings();
    let file = match &session.file {
        Some(file) => Some(settings.resolve(file)),
        None => ctx.meta().context_file.path().map(|p| settings.resolve(Path::new(p))),
    };
    if let Some(file) = file.filter(|f| f.exists()) {
        if settings.delete_enabled {
            std::fs::remove_file(&file)?;
            info!(path = %file.display(), "context file deleted");
        } else {
            warn!(target: "sos::test", path = %file.display(), "delete disabled, context file kept");
        }
    }
    Ok(ToolOutput::Result(result))
}

fn update(call: ToolCall<'_>) -> anyhow::Result<ToolOutput> {
    let target = call.str_param("target")?;
    if target == "namespace" || target.starts_with("namespace.") {
        bail!("namespace values cannot be updated, set them with the context action: {target}");
    }

    let mut session = Session::load(&call, LoadOptions::new().with_hooks(false))?;
    let namespace = Node::Map(session.ctx.namespace().clone()).to_value();
    let opts = layer_options(&call)?
        .with_context_file(LayerSource::Disabled)
        .with_runtime_config(json!({ "namespace": namespace }));
    let fresh = ContextGenerator::new(call.toolkit.settings()).generate(&opts)?;

    info!(path = target, "updating context");
    session.ctx.set_with(target, fresh.get(target)?, WriteMode::FORCE)?;

    let result = if call.bool_param("action_update") {
        session.ctx.run(call.toolkit, ON_CONTEXT_LOAD)?;
        session.ctx.run(call.toolkit, "action.sos_update")?
    } else {
        RunResult::new(RunStatus::Ok)
    };
    session.save(&call)?;
    Ok(ToolOutput::Result(result))
}
