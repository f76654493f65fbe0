//! Two-level registry: a root of named repos, each holding named tools.

use super::{ToolCall, ToolSchema};
use crate::attr::{validate_key, Node};
use crate::core::ToolOutput;
use crate::errors::{
    ConfigurationError, ExistsError, LookupError, ShadowError, SosError, SosResult,
};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// The callable bound into a tool.
pub type Handler = Arc<dyn Fn(ToolCall<'_>) -> anyhow::Result<ToolOutput> + Send + Sync>;

/// An immutable registry entry.
#[derive(Clone)]
pub struct Tool {
    namespace: String,
    key: String,
    description: String,
    schema: ToolSchema,
    handler: Handler,
}

impl Tool {
    /// Creates a new tool.
    #[must_use]
    pub fn new(
        namespace: impl Into<String>,
        key: impl Into<String>,
        description: impl Into<String>,
        schema: ToolSchema,
        handler: Handler,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            key: key.into(),
            description: description.into(),
            schema,
            handler,
        }
    }

    /// Returns the repo namespace.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns the key inside the namespace.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the dotted `namespace.key` path.
    #[must_use]
    pub fn path(&self) -> String {
        format!("{}.{}", self.namespace, self.key)
    }

    /// Returns the description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the parameter schema.
    #[must_use]
    pub const fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    /// Invokes the handler.
    ///
    /// # Errors
    ///
    /// Toolkit errors raised by the handler pass through unchanged; any
    /// other failure is wrapped as `ToolFailed`.
    pub fn call(&self, call: ToolCall<'_>) -> SosResult<ToolOutput> {
        let path = call.path.to_string();
        (self.handler)(call).map_err(|err| match err.downcast::<SosError>() {
            Ok(sos) => sos,
            Err(other) => SosError::tool_failed(path, other),
        })
    }
}

impl fmt::Debug for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tool")
            .field("path", &self.path())
            .field("description", &self.description)
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

/// A named collection of tools.
#[derive(Debug, Clone, Default)]
pub struct Repo {
    name: String,
    tools: BTreeMap<String, Tool>,
}

impl Repo {
    /// Creates an empty repo.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tools: BTreeMap::new(),
        }
    }

    /// Returns the repo name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Gets a tool by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Tool> {
        self.tools.get(key)
    }

    /// Iterates tools in key order.
    pub fn tools(&self) -> impl Iterator<Item = &Tool> {
        self.tools.values()
    }

    /// Returns the number of tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns true if the repo has no tools.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// An entry at the top level of a root.
#[derive(Debug, Clone)]
pub enum RootEntry {
    /// A namespace of tools.
    Repo(Repo),
    /// A plain attribute; namespaces cannot take its name.
    Value(Node),
}

/// Which of the four process-scope roots a registration targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RootKind {
    /// Lifecycle actions.
    Action,
    /// Tools invoked by runnables.
    Tool,
    /// Service tasks.
    Service,
    /// Hooks.
    Hook,
}

impl RootKind {
    /// Returns the root name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Action => "action",
            Self::Tool => "tool",
            Self::Service => "service",
            Self::Hook => "hook",
        }
    }
}

impl fmt::Display for RootKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registry of repos.
#[derive(Debug, Clone)]
pub struct Root {
    kind: RootKind,
    entries: BTreeMap<String, RootEntry>,
}

impl Root {
    /// Creates an empty root.
    #[must_use]
    pub fn new(kind: RootKind) -> Self {
        Self {
            kind,
            entries: BTreeMap::new(),
        }
    }

    /// Returns which root this is.
    #[must_use]
    pub const fn kind(&self) -> RootKind {
        self.kind
    }

    /// Registers a tool, creating its namespace on first use.
    ///
    /// # Errors
    ///
    /// - `ShadowError` if the namespace names a plain attribute
    /// - `ExistsError` if the key is taken and `overwrite` is false
    /// - `ShadowError` or `InvalidPathError` for invalid names
    /// - `ConfigurationError` if the schema does not check out
    pub fn register(&mut self, tool: Tool, overwrite: bool) -> SosResult<()> {
        validate_key(tool.namespace())?;
        validate_key(tool.key())?;
        tool.schema().check(&tool.path())?;

        let entry = self
            .entries
            .entry(tool.namespace().to_string())
            .or_insert_with(|| RootEntry::Repo(Repo::new(tool.namespace())));

        let repo = match entry {
            RootEntry::Repo(repo) => repo,
            RootEntry::Value(node) => {
                return Err(ShadowError::new(tool.namespace(), node.kind_name()).into())
            }
        };
        if repo.tools.contains_key(tool.key()) && !overwrite {
            return Err(ExistsError::new(tool.namespace(), tool.key()).into());
        }
        repo.tools.insert(tool.key().to_string(), tool);
        Ok(())
    }

    /// Stores a plain attribute at the top level.
    ///
    /// # Errors
    ///
    /// Returns `ShadowError` if a repo already has the name.
    pub fn insert_value(&mut self, name: &str, value: Node) -> SosResult<()> {
        validate_key(name)?;
        if let Some(RootEntry::Repo(_)) = self.entries.get(name) {
            return Err(ShadowError::new(name, "repo").into());
        }
        self.entries.insert(name.to_string(), RootEntry::Value(value));
        Ok(())
    }

    /// Resolves a `namespace.key` path to a tool.
    ///
    /// # Errors
    ///
    /// Returns `LookupError` if nothing is registered there and
    /// `ConfigurationError` for paths that are not two segments.
    pub fn get(&self, path: &str) -> SosResult<&Tool> {
        let Some((namespace, key)) = path.split_once('.') else {
            return Err(ConfigurationError::new(format!(
                "{} path '{path}' must be namespace.key",
                self.kind
            ))
            .into());
        };
        match self.entries.get(namespace) {
            Some(RootEntry::Repo(repo)) => repo.get(key).ok_or_else(|| LookupError::new(path).into()),
            _ => Err(LookupError::new(path).into()),
        }
    }

    /// Gets a repo by namespace.
    #[must_use]
    pub fn repo(&self, namespace: &str) -> Option<&Repo> {
        match self.entries.get(namespace) {
            Some(RootEntry::Repo(repo)) => Some(repo),
            _ => None,
        }
    }

    /// Iterates every registered tool.
    pub fn tools(&self) -> impl Iterator<Item = &Tool> {
        self.entries.values().flat_map(|entry| match entry {
            RootEntry::Repo(repo) => Some(repo.tools()),
            RootEntry::Value(_) => None,
        })
        .flatten()
    }

    /// Returns the number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools().count()
    }

    /// Returns true if no tool is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools().next().is_none()
    }
}
