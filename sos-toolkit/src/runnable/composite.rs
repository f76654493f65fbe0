//! The composite executor: ordered trees of runnables.

use super::Runnable;
use crate::attr::{validate_key, AttrMap, Node};
use crate::context::Context;
use crate::core::RunResult;
use crate::errors::{ConfigurationError, InvalidChildError, SosResult};
use crate::tools::Toolkit;
use tracing::debug;

/// Key naming the path a composite redirects execution to.
pub const TARGET_KEY: &str = "__TARGET__";

/// An ordered map of child runnables and composites.
///
/// Action, hook and service trees are composites. Children run in
/// declaration order and iteration stops at the first break.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Composite {
    /// The key this composite was declared under.
    pub label: String,
    /// Skip every child.
    pub disabled: bool,
    /// Path recorded as the context's transient target when run.
    pub target: Option<String>,
    /// Children in declaration order.
    pub children: AttrMap,
}

impl Composite {
    /// Creates an empty composite.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    /// Appends a child.
    #[must_use]
    pub fn with_child(mut self, key: impl Into<String>, child: impl Into<Node>) -> Self {
        self.children.insert(key, child.into());
        self
    }

    /// Builds a composite from a configuration map, materializing nested
    /// maps into runnables and composites.
    ///
    /// # Errors
    ///
    /// Returns an error for reserved or malformed keys and for malformed
    /// nested runnables.
    pub fn from_attr_map(label: &str, map: AttrMap) -> SosResult<Self> {
        let mut composite = Self::new(label);

        for (key, node) in map {
            match key.as_str() {
                "disabled" => {
                    composite.disabled = match node {
                        Node::Null => false,
                        Node::Bool(b) => b,
                        other => {
                            return Err(ConfigurationError::new(format!(
                                "composite '{label}': disabled must be a bool, found a {}",
                                other.kind_name()
                            ))
                            .into())
                        }
                    };
                }
                TARGET_KEY => composite.target = node.as_str().map(str::to_string),
                _ => {
                    validate_key(&key)?;
                    let child = Node::materialize(&key, node)?;
                    composite.children.insert(key, child);
                }
            }
        }
        Ok(composite)
    }

    /// Converts the composite back to its configuration map.
    #[must_use]
    pub fn to_attr_map(&self) -> AttrMap {
        let mut map = AttrMap::new();
        if self.disabled {
            map.insert("disabled", Node::Bool(true));
        }
        if let Some(target) = &self.target {
            map.insert(TARGET_KEY, Node::from(target.as_str()));
        }
        for (key, child) in self.children.iter() {
            map.insert(key, child.clone());
        }
        map
    }

    /// Runs every child in order.
    ///
    /// The aggregate result holds each child's result under its key. A
    /// child break stops the iteration; the aggregate itself stays `ok`
    /// with a message naming the child that broke.
    ///
    /// # Errors
    ///
    /// Propagates the first child failure, including `InvalidChildError`
    /// for children that cannot run.
    pub fn invoke(&self, ctx: &mut Context, toolkit: &Toolkit) -> SosResult<RunResult> {
        let mut result = RunResult::default().with_label(Some(self.label.clone()));

        if self.disabled {
            debug!(label = %self.label, "not running: disabled");
            return Ok(RunResult::disabled(Some(self.label.clone())).finish());
        }
        if let Some(target) = &self.target {
            ctx.set_target(Some(target.clone()));
        }

        for (key, child) in self.children.iter() {
            debug!(label = %self.label, child = key, "running child");
            let child_label = format!("{}.{key}", self.label);
            let child_result = execute_node(&child_label, child, ctx, toolkit)?;
            let stop = child_result.is_break();
            result.push_child(key, child_result);

            if stop {
                debug!(label = %self.label, child = key, "break");
                result.message = Some(format!("break at {child_label}"));
                break;
            }
        }

        Ok(result.finish())
    }
}

/// Runs any executable node: a runnable, a composite, or a raw map
/// promoted to one of those.
///
/// # Errors
///
/// Returns `InvalidChildError` for scalars and lists, and propagates
/// failures from the node itself.
pub fn execute_node(
    label: &str,
    node: &Node,
    ctx: &mut Context,
    toolkit: &Toolkit,
) -> SosResult<RunResult> {
    match node {
        Node::Runnable(runnable) => runnable.invoke(ctx, toolkit),
        Node::Composite(composite) => composite.invoke(ctx, toolkit),
        Node::Map(map) if map.contains_key("tool") => {
            Runnable::from_attr_map(Some(leaf(label)), map)?.invoke(ctx, toolkit)
        }
        Node::Map(map) => Composite::from_attr_map(leaf(label), map.clone())?.invoke(ctx, toolkit),
        other => {
            let (parent, key) = label.rsplit_once('.').unwrap_or(("", label));
            Err(InvalidChildError::new(parent, key, other.kind_name()).into())
        }
    }
}

fn leaf(label: &str) -> &str {
    label.rsplit_once('.').map_or(label, |(_, key)| key)
}
