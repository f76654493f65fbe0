//! The process-scope registry: four roots built once at startup from
//! plugin descriptors.

use super::{Handler, ParamSpec, Root, RootKind, Tool, ToolSchema};
use crate::attr::{AttrMap, Node};
use crate::config::Settings;
use crate::context::Context;
use crate::core::{RunResult, ToolOutput};
use crate::errors::{SosError, SosResult};
use anyhow::{anyhow, bail};
use std::sync::Arc;
use tracing::{debug, warn};

/// Everything a handler receives for one invocation.
pub struct ToolCall<'a> {
    /// Dotted path the tool was called through.
    pub path: &'a str,
    /// Validated parameters, defaults filled in.
    pub params: &'a AttrMap,
    /// The live context, for tools that bind it.
    pub ctx: Option<&'a mut Context>,
    /// The previous step's result.
    pub prior: Option<&'a RunResult>,
    /// The toolkit, for tools that run other targets.
    pub toolkit: &'a Toolkit,
}

impl<'a> ToolCall<'a> {
    /// Gets a parameter, treating null as absent.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&'a Node> {
        self.params.child(name).filter(|v| !v.is_null())
    }

    /// Gets a required string parameter.
    ///
    /// # Errors
    ///
    /// Fails if the parameter is absent or not a string.
    pub fn str_param(&self, name: &str) -> anyhow::Result<&'a str> {
        self.param(name)
            .and_then(Node::as_str)
            .ok_or_else(|| anyhow!("parameter '{name}' must be a string"))
    }

    /// Gets an optional string parameter.
    #[must_use]
    pub fn opt_str(&self, name: &str) -> Option<&'a str> {
        self.param(name).and_then(Node::as_str)
    }

    /// Gets a boolean parameter, false when absent.
    #[must_use]
    pub fn bool_param(&self, name: &str) -> bool {
        self.param(name).and_then(Node::as_bool).unwrap_or(false)
    }

    /// Returns the bound context.
    ///
    /// # Errors
    ///
    /// Fails for tools registered without `binds_context`.
    pub fn context(&mut self) -> anyhow::Result<&mut Context> {
        match self.ctx.as_deref_mut() {
            Some(ctx) => Ok(ctx),
            None => bail!("tool '{}' is not bound to the context", self.path),
        }
    }

    /// Returns the previous step's result.
    ///
    /// # Errors
    ///
    /// Fails when there is none.
    pub fn prior(&self) -> anyhow::Result<&'a RunResult> {
        self.prior
            .ok_or_else(|| anyhow!("tool '{}' has no prior result", self.path))
    }
}

/// A tool waiting to be registered.
#[derive(Clone)]
pub struct PluginDescriptor {
    /// Target root.
    pub root: RootKind,
    /// Repo namespace.
    pub namespace: String,
    /// Key inside the namespace.
    pub key: String,
    /// Help text.
    pub description: String,
    /// Declared parameters.
    pub params: Vec<ParamSpec>,
    /// Invoke bound to the live context.
    pub binds_context: bool,
    /// Require the previous step's result.
    pub binds_result: bool,
    /// Replace an existing registration.
    pub overwrite: bool,
    /// The callable.
    pub handler: Handler,
}

impl PluginDescriptor {
    /// Creates a descriptor for `namespace.key` in `root`.
    pub fn new(
        root: RootKind,
        namespace: impl Into<String>,
        key: impl Into<String>,
        handler: impl Fn(ToolCall<'_>) -> anyhow::Result<ToolOutput> + Send + Sync + 'static,
    ) -> Self {
        Self {
            root,
            namespace: namespace.into(),
            key: key.into(),
            description: String::new(),
            params: Vec::new(),
            binds_context: false,
            binds_result: false,
            overwrite: false,
            handler: Arc::new(handler),
        }
    }

    /// Creates a tool descriptor.
    pub fn tool(
        namespace: impl Into<String>,
        key: impl Into<String>,
        handler: impl Fn(ToolCall<'_>) -> anyhow::Result<ToolOutput> + Send + Sync + 'static,
    ) -> Self {
        Self::new(RootKind::Tool, namespace, key, handler)
    }

    /// Creates an action descriptor.
    pub fn action(
        namespace: impl Into<String>,
        key: impl Into<String>,
        handler: impl Fn(ToolCall<'_>) -> anyhow::Result<ToolOutput> + Send + Sync + 'static,
    ) -> Self {
        Self::new(RootKind::Action, namespace, key, handler)
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Adds a parameter.
    #[must_use]
    pub fn with_param(mut self, spec: ParamSpec) -> Self {
        self.params.push(spec);
        self
    }

    /// Binds the live context.
    #[must_use]
    pub const fn binds_context(mut self) -> Self {
        self.binds_context = true;
        self
    }

    /// Requires the previous result.
    #[must_use]
    pub const fn binds_result(mut self) -> Self {
        self.binds_result = true;
        self
    }

    /// Allows replacing an existing registration.
    #[must_use]
    pub const fn overwrite(mut self) -> Self {
        self.overwrite = true;
        self
    }

    /// Returns the dotted path.
    #[must_use]
    pub fn path(&self) -> String {
        format!("{}.{}", self.namespace, self.key)
    }

    fn into_tool(self) -> Tool {
        let schema = ToolSchema {
            params: self.params,
            binds_context: self.binds_context,
            binds_result: self.binds_result,
        };
        Tool::new(self.namespace, self.key, self.description, schema, self.handler)
    }
}

/// The four roots plus the settings they were built with.
#[derive(Debug)]
pub struct Toolkit {
    actions: Root,
    tools: Root,
    services: Root,
    hooks: Root,
    settings: Settings,
    registration_errors: Vec<SosError>,
}

impl Toolkit {
    /// Starts a builder.
    #[must_use]
    pub fn builder() -> ToolkitBuilder {
        ToolkitBuilder::new()
    }

    /// Returns a root.
    #[must_use]
    pub const fn root(&self, kind: RootKind) -> &Root {
        match kind {
            RootKind::Action => &self.actions,
            RootKind::Tool => &self.tools,
            RootKind::Service => &self.services,
            RootKind::Hook => &self.hooks,
        }
    }

    /// Resolves a tool path in the tool root.
    ///
    /// # Errors
    ///
    /// Returns `LookupError` for unregistered tools.
    pub fn tool(&self, path: &str) -> SosResult<&Tool> {
        self.tools.get(path)
    }

    /// Returns the settings.
    #[must_use]
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Returns the failures collected while registering plugins.
    #[must_use]
    pub fn registration_errors(&self) -> &[SosError] {
        &self.registration_errors
    }

    /// Runs an action from the action root.
    ///
    /// `name` is either a bare key in the `sos` namespace or a full
    /// `namespace.key` path.
    ///
    /// # Errors
    ///
    /// Returns `LookupError` for unknown actions, `ConfigurationError` for
    /// invalid parameters, and whatever the action itself fails with.
    pub fn run_action(&self, name: &str, params: &AttrMap) -> SosResult<RunResult> {
        let path = if name.contains('.') {
            name.to_string()
        } else {
            format!("sos.{name}")
        };
        let action = self.actions.get(&path)?;
        let params = action.schema().validate(&path, params)?;

        debug!(action = %path, "running action");
        let output = action.call(ToolCall {
            path: &path,
            params: &params,
            ctx: None,
            prior: None,
            toolkit: self,
        })?;
        Ok(RunResult::from_output(output, &path, &params).finish())
    }
}

/// Builds a [`Toolkit`] from plugin descriptors.
#[derive(Default)]
pub struct ToolkitBuilder {
    settings: Option<Settings>,
    plugins: Vec<PluginDescriptor>,
}

impl ToolkitBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the settings; defaults to [`Settings::from_env`].
    #[must_use]
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Adds one plugin.
    #[must_use]
    pub fn with_plugin(mut self, plugin: PluginDescriptor) -> Self {
        self.plugins.push(plugin);
        self
    }

    /// Adds plugins.
    #[must_use]
    pub fn with_plugins(mut self, plugins: impl IntoIterator<Item = PluginDescriptor>) -> Self {
        self.plugins.extend(plugins);
        self
    }

    /// Adds the built-in `context`, `runtime` and `filesystem` tools.
    #[must_use]
    pub fn with_core_tools(self) -> Self {
        self.with_plugins(super::builtin::plugins())
    }

    /// Adds the lifecycle actions.
    #[must_use]
    pub fn with_actions(self) -> Self {
        self.with_plugins(crate::actions::plugins())
    }

    /// Registers every plugin.
    ///
    /// A failing registration is logged and collected; the tool stays
    /// absent and the rest still load.
    #[must_use]
    pub fn build(self) -> Toolkit {
        let mut toolkit = Toolkit {
            actions: Root::new(RootKind::Action),
            tools: Root::new(RootKind::Tool),
            services: Root::new(RootKind::Service),
            hooks: Root::new(RootKind::Hook),
            settings: self.settings.unwrap_or_else(Settings::from_env),
            registration_errors: Vec::new(),
        };

        for plugin in self.plugins {
            let root = plugin.root;
            let path = plugin.path();
            let overwrite = plugin.overwrite;
            let target = match root {
                RootKind::Action => &mut toolkit.actions,
                RootKind::Tool => &mut toolkit.tools,
                RootKind::Service => &mut toolkit.services,
                RootKind::Hook => &mut toolkit.hooks,
            };
            match target.register(plugin.into_tool(), overwrite) {
                Ok(()) => debug!(root = %root, tool = %path, "registered"),
                Err(err) => {
                    warn!(root = %root, tool = %path, error = %err, "registration failed");
                    toolkit.registration_errors.push(err);
                }
            }
        }
        toolkit
    }
}
