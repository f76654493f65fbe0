//! The context aggregate.

use super::MetaConfig;
use crate::attr::{parse_path, AttrMap, Attributes, Node, WriteMode};
use crate::core::RunResult;
use crate::errors::{ConfigurationError, InvalidPathError, LookupError, ProtectionError, SosResult};
use crate::runnable::{execute_node, Composite};
use crate::tools::Toolkit;
use serde_json::{Map, Value};
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

/// The top-level sections of a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Meta,
    Namespace,
    Service,
    Action,
    Hook,
}

impl Section {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "meta" => Some(Self::Meta),
            "namespace" => Some(Self::Namespace),
            "service" => Some(Self::Service),
            "action" => Some(Self::Action),
            "hook" => Some(Self::Hook),
            _ => None,
        }
    }

    const fn name(self) -> &'static str {
        match self {
            Self::Meta => "meta",
            Self::Namespace => "namespace",
            Self::Service => "service",
            Self::Action => "action",
            Self::Hook => "hook",
        }
    }
}

/// The resolved state of one system.
///
/// `meta` and `namespace` are preserved and locked: they cannot be removed,
/// and replacing them wholesale needs a forced write. The transient target
/// and last result live only for the duration of a run and are never
/// serialized.
#[derive(Debug, Clone, PartialEq)]
pub struct Context {
    meta: MetaConfig,
    namespace: AttrMap,
    service: AttrMap,
    action: Composite,
    hook: Composite,
    target: Option<String>,
    last_result: Option<RunResult>,
}

impl Default for Context {
    fn default() -> Self {
        Self {
            meta: MetaConfig::default(),
            namespace: locked(AttrMap::new()),
            service: AttrMap::new(),
            action: Composite::new("action"),
            hook: Composite::new("hook"),
            target: None,
            last_result: None,
        }
    }
}

fn locked(map: AttrMap) -> AttrMap {
    map.with_preserve(true).with_locked(true)
}

fn section_map(label: &str, node: Option<Node>) -> SosResult<AttrMap> {
    match node {
        None | Some(Node::Null) => Ok(AttrMap::new()),
        Some(Node::Map(map)) => Ok(map),
        Some(other) => Err(ConfigurationError::new(format!(
            "context section '{label}' must be a map, found a {}",
            other.kind_name()
        ))
        .into()),
    }
}

impl Context {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Materializes a merged configuration tree.
    ///
    /// `action` and `hook` become composites. A service entry carrying its
    /// own `meta` is materialized recursively as a sub-context. The
    /// `overwrite` directive (dotted path to value) is then applied with
    /// forced writes, and the paths listed under `delete` are removed.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` for malformed sections and propagates
    /// failures from the directives.
    pub fn from_config(config: Value) -> SosResult<Self> {
        let mut root = section_map("root", Some(Node::from_value(config)))?;
        let overwrite = root.remove_child("overwrite");
        let delete = root.remove_child("delete");

        let meta = MetaConfig::from_attr_map(&section_map("meta", root.remove_child("meta"))?)?;
        let namespace = locked(section_map("namespace", root.remove_child("namespace"))?);

        let mut service = AttrMap::new();
        for (key, entry) in section_map("service", root.remove_child("service"))? {
            let entry = match entry {
                Node::Map(map) if map.contains_key("meta") => {
                    debug!(service = %key, "materializing service context");
                    Self::from_config(Node::Map(map).to_value())?.to_node()
                }
                other => other,
            };
            service.insert(key, entry);
        }

        let action = Composite::from_attr_map("action", section_map("action", root.remove_child("action"))?)?;
        let hook = Composite::from_attr_map("hook", section_map("hook", root.remove_child("hook"))?)?;

        for key in root.keys() {
            warn!(key, "ignoring unknown context section");
        }

        let mut ctx = Self {
            meta,
            namespace,
            service,
            action,
            hook,
            target: None,
            last_result: None,
        };
        ctx.apply_directives(overwrite, delete)?;
        Ok(ctx)
    }

    fn apply_directives(&mut self, overwrite: Option<Node>, delete: Option<Node>) -> SosResult<()> {
        for (path, value) in section_map("overwrite", overwrite)? {
            debug!(path = %path, "overwrite");
            self.set_with(&path, value, WriteMode::FORCE)?;
        }

        let paths = match delete {
            None | Some(Node::Null) => Vec::new(),
            Some(Node::List(items)) => items,
            Some(Node::Map(map)) if map.is_empty() => Vec::new(),
            Some(other) => {
                return Err(ConfigurationError::new(format!(
                    "delete must be a list of paths, found a {}",
                    other.kind_name()
                ))
                .into())
            }
        };
        for path in paths {
            let Some(path) = path.as_str() else {
                return Err(ConfigurationError::new(format!(
                    "delete entries must be paths, found a {}",
                    path.kind_name()
                ))
                .into());
            };
            info!(path, "delete");
            self.remove(path)?;
        }
        Ok(())
    }

    /// Returns the meta section.
    #[must_use]
    pub const fn meta(&self) -> &MetaConfig {
        &self.meta
    }

    /// Returns the meta section for editing.
    pub fn meta_mut(&mut self) -> &mut MetaConfig {
        &mut self.meta
    }

    /// Returns the namespace section.
    #[must_use]
    pub const fn namespace(&self) -> &AttrMap {
        &self.namespace
    }

    /// Returns the service section.
    #[must_use]
    pub const fn service(&self) -> &AttrMap {
        &self.service
    }

    /// Returns the action tree.
    #[must_use]
    pub const fn action(&self) -> &Composite {
        &self.action
    }

    /// Returns the hook tree.
    #[must_use]
    pub const fn hook(&self) -> &Composite {
        &self.hook
    }

    /// Returns the path recorded by the last composite that declared a
    /// target.
    #[must_use]
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    /// Records the transient target.
    pub fn set_target(&mut self, target: Option<String>) {
        self.target = target;
    }

    /// Returns the transient result of the previous step.
    #[must_use]
    pub const fn last_result(&self) -> Option<&RunResult> {
        self.last_result.as_ref()
    }

    /// Replaces the transient result.
    pub fn set_last_result(&mut self, result: Option<RunResult>) {
        self.last_result = result;
    }

    /// Takes the transient result out of the context.
    pub fn take_last_result(&mut self) -> Option<RunResult> {
        self.last_result.take()
    }

    /// Clears the transient target and result.
    pub fn clear_transient(&mut self) {
        self.target = None;
        self.last_result = None;
    }

    /// Returns the configuration form of the context.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let meta = serde_json::to_value(&self.meta)
            .unwrap_or_else(|_| Node::Map(self.meta.to_attr_map()).to_value());

        let mut out = Map::new();
        out.insert("meta".to_string(), meta);
        out.insert("namespace".to_string(), Node::Map(self.namespace.clone()).to_value());
        out.insert("service".to_string(), Node::Map(self.service.clone()).to_value());
        out.insert("action".to_string(), Node::Map(self.action.to_attr_map()).to_value());
        out.insert("hook".to_string(), Node::Map(self.hook.to_attr_map()).to_value());
        Value::Object(out)
    }

    /// Returns the context as a node, used for service sub-contexts.
    #[must_use]
    pub fn to_node(&self) -> Node {
        let mut map = AttrMap::new();
        for section in [
            Section::Meta,
            Section::Namespace,
            Section::Service,
            Section::Action,
            Section::Hook,
        ] {
            map.insert(section.name(), self.section_node(section));
        }
        Node::Map(map)
    }

    /// Runs the runnable, composite or map found at `path`.
    ///
    /// A missing target is not an error: the result is `empty` with a
    /// message naming the path.
    ///
    /// # Errors
    ///
    /// Returns `InvalidChildError` when `path` holds a scalar or a list, and
    /// propagates every failure of the run.
    pub fn run(&mut self, toolkit: &Toolkit, path: &str) -> SosResult<RunResult> {
        let run_id = Uuid::now_v7();
        let span = info_span!("run", %run_id, path);
        let _guard = span.enter();

        let node = match self.get_opt(path)? {
            None | Some(Node::Null) => {
                info!(path, "run target is none");
                let mut result = RunResult::empty(format!("run target is none: {path}"));
                result.run_id = Some(run_id);
                return Ok(result);
            }
            Some(node) => node,
        };

        info!(path, kind = node.kind_name(), "run");
        let mut result = execute_node(path, &node, self, toolkit)?;
        result.run_id = Some(run_id);
        Ok(result)
    }

    fn split(path: &str) -> SosResult<(Option<Section>, Option<&str>)> {
        parse_path(path)?;
        Ok(match path.split_once('.') {
            Some((head, rest)) => (Section::parse(head), Some(rest)),
            None => (Section::parse(path), None),
        })
    }

    fn section_of(path: &str) -> SosResult<(Section, Option<&str>)> {
        match Self::split(path)? {
            (Some(section), rest) => Ok((section, rest)),
            (None, _) => Err(InvalidPathError::new(path, "unknown context section").into()),
        }
    }

    fn section_node(&self, section: Section) -> Node {
        match section {
            Section::Meta => Node::Map(self.meta.to_attr_map()),
            Section::Namespace => Node::Map(self.namespace.clone()),
            Section::Service => Node::Map(self.service.clone()),
            Section::Action => Node::Composite(Box::new(self.action.clone())),
            Section::Hook => Node::Composite(Box::new(self.hook.clone())),
        }
    }

    fn take_section(&mut self, section: Section) -> Node {
        match section {
            Section::Meta => Node::Map(self.meta.to_attr_map()),
            Section::Namespace => Node::Map(std::mem::take(&mut self.namespace)),
            Section::Service => Node::Map(std::mem::take(&mut self.service)),
            Section::Action => Node::Composite(Box::new(std::mem::take(&mut self.action))),
            Section::Hook => Node::Composite(Box::new(std::mem::take(&mut self.hook))),
        }
    }

    fn put_section(&mut self, section: Section, node: Node) -> SosResult<()> {
        match (section, node) {
            (Section::Meta, Node::Map(map)) => self.meta = MetaConfig::from_attr_map(&map)?,
            (Section::Namespace, Node::Map(map)) => self.namespace = locked(map),
            (Section::Service, Node::Map(map)) => self.service = map,
            (Section::Action, Node::Composite(composite)) => self.action = *composite,
            (Section::Hook, Node::Composite(composite)) => self.hook = *composite,
            (Section::Action | Section::Hook, Node::Map(map)) => {
                let composite = Composite::from_attr_map(section.name(), map)?;
                match section {
                    Section::Action => self.action = composite,
                    _ => self.hook = composite,
                }
            }
            (section, other) => {
                return Err(ConfigurationError::new(format!(
                    "context section '{}' cannot hold a {}",
                    section.name(),
                    other.kind_name()
                ))
                .into())
            }
        }
        Ok(())
    }

    /// Runs `edit` against a one-section root map, then stores the section
    /// back.
    ///
    /// Edits below the section root keep its kind, so only a `whole`
    /// replacement can leave a node that no longer fits; that case keeps a
    /// backup to restore. `meta` is never taken out and needs none.
    fn edit_section<R>(
        &mut self,
        section: Section,
        whole: bool,
        edit: impl FnOnce(&mut AttrMap) -> SosResult<R>,
    ) -> SosResult<R> {
        let backup = (whole && section != Section::Meta).then(|| self.section_node(section));
        let mut root = AttrMap::new();
        root.insert(section.name(), self.take_section(section));

        let outcome = edit(&mut root);
        let node = root.remove_child(section.name()).unwrap_or(Node::Null);
        if let Err(err) = self.put_section(section, node) {
            if let Some(backup) = backup {
                self.put_section(section, backup)?;
            }
            return Err(err);
        }
        outcome
    }
}

impl Attributes for Context {
    fn get(&self, path: &str) -> SosResult<Node> {
        let (Some(section), rest) = Self::split(path)? else {
            return Err(LookupError::new(path).into());
        };
        let Some(rest) = rest else {
            return Ok(self.section_node(section));
        };
        match section {
            Section::Meta => self.meta.to_attr_map().get(rest),
            Section::Namespace => self.namespace.get(rest),
            Section::Service => self.service.get(rest),
            Section::Action => self.action.children.get(rest),
            Section::Hook => self.hook.children.get(rest),
        }
        .map_err(|err| if err.is_lookup() { LookupError::new(path).into() } else { err })
    }

    fn set_with(&mut self, path: &str, value: Node, mode: WriteMode) -> SosResult<()> {
        let (section, rest) = Self::section_of(path)?;
        self.edit_section(section, rest.is_none(), |root| root.set_with(path, value, mode))
    }

    fn remove(&mut self, path: &str) -> SosResult<Option<Node>> {
        let (section, rest) = Self::section_of(path)?;
        if rest.is_none() {
            return Err(ProtectionError::preserved(path).into());
        }
        self.edit_section(section, false, |root| Attributes::remove(root, path))
    }
}
