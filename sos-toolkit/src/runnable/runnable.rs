//! The runnable engine: one tool invocation with gating, mapping and
//! callback chaining.

use super::condition::conditions_from_node;
use super::resolvable::resolvables_from_node;
use super::{execute_node, Condition, Resolvable};
use crate::attr::{AttrMap, Node};
use crate::context::Context;
use crate::core::RunResult;
use crate::errors::{ConfigurationError, InvalidChildError, MissingResultError, SosResult};
use crate::tools::{ToolCall, Toolkit};
use tracing::{debug, error};

/// Keys a runnable's configuration map understands.
const FIELDS: &[&str] = &[
    "label",
    "tool",
    "disabled",
    "condition",
    "params",
    "context_map",
    "result_map",
    "callbacks",
];

/// A single named invocation of a registered tool.
#[derive(Debug, Clone, PartialEq)]
pub struct Runnable {
    /// Label for diagnostics and results.
    pub label: Option<String>,
    /// Dotted `namespace.key` path of the tool.
    pub tool: String,
    /// Skip without evaluating conditions.
    pub disabled: bool,
    /// Gates, evaluated in order with AND semantics.
    pub condition: Vec<Condition>,
    /// Literal parameters.
    pub params: AttrMap,
    /// Context to parameter mappings.
    pub context_map: Vec<Resolvable>,
    /// Result data to context mappings.
    pub result_map: Vec<Resolvable>,
    /// Follow-up runnables and composites.
    pub callbacks: Vec<Node>,
}

impl Runnable {
    /// Creates a runnable calling `tool` with no parameters.
    #[must_use]
    pub fn new(tool: impl Into<String>) -> Self {
        Self {
            label: None,
            tool: tool.into(),
            disabled: false,
            condition: Vec::new(),
            params: AttrMap::new(),
            context_map: Vec::new(),
            result_map: Vec::new(),
            callbacks: Vec::new(),
        }
    }

    /// Sets the label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Adds a literal parameter.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Node>) -> Self {
        self.params.insert(key, value.into());
        self
    }

    /// Adds a condition.
    #[must_use]
    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition.push(condition);
        self
    }

    /// Adds a context mapping.
    #[must_use]
    pub fn with_context_map(mut self, resolvable: Resolvable) -> Self {
        self.context_map.push(resolvable);
        self
    }

    /// Adds a result mapping.
    #[must_use]
    pub fn with_result_map(mut self, resolvable: Resolvable) -> Self {
        self.result_map.push(resolvable);
        self
    }

    /// Adds a callback.
    #[must_use]
    pub fn with_callback(mut self, callback: impl Into<Node>) -> Self {
        self.callbacks.push(callback.into());
        self
    }

    /// Disables the runnable.
    #[must_use]
    pub const fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    /// Builds a runnable from its configuration map.
    ///
    /// A `label` key in the map wins over the `label` argument, which is
    /// usually the key the runnable was declared under.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` for a missing tool or malformed fields
    /// and `InvalidChildError` for callbacks that are not maps.
    pub fn from_attr_map(label: Option<&str>, map: &AttrMap) -> SosResult<Self> {
        let tool = match map.child("tool") {
            Some(Node::Str(tool)) if !tool.is_empty() => tool.clone(),
            _ => {
                return Err(ConfigurationError::new(format!(
                    "runnable '{}' needs a tool path",
                    label.unwrap_or("unlabelled")
                ))
                .into())
            }
        };

        let label = map
            .child("label")
            .and_then(Node::as_str)
            .or(label)
            .map(str::to_string);
        let name = label.as_deref().unwrap_or(&tool).to_string();

        let disabled = match map.child("disabled") {
            None | Some(Node::Null) => false,
            Some(Node::Bool(b)) => *b,
            Some(other) => {
                return Err(ConfigurationError::new(format!(
                    "runnable '{name}': disabled must be a bool, found a {}",
                    other.kind_name()
                ))
                .into())
            }
        };

        let params = match map.child("params") {
            None | Some(Node::Null) => AttrMap::new(),
            Some(Node::Map(params)) => params.clone(),
            Some(other) => {
                return Err(ConfigurationError::new(format!(
                    "runnable '{name}': params must be a map, found a {}",
                    other.kind_name()
                ))
                .into())
            }
        };

        let callbacks = match map.child("callbacks") {
            None | Some(Node::Null) => Vec::new(),
            Some(Node::List(items)) => items
                .iter()
                .enumerate()
                .map(|(n, item)| materialize_callback(&name, n, item.clone()))
                .collect::<SosResult<_>>()?,
            Some(other) => return Err(InvalidChildError::new(&name, "callbacks", other.kind_name()).into()),
        };

        for key in map.keys().filter(|key| !FIELDS.contains(key)) {
            debug!(runnable = %name, key, "ignoring unknown runnable field");
        }

        Ok(Self {
            label,
            tool,
            disabled,
            condition: conditions_from_node(map.child("condition"))?,
            params,
            context_map: resolvables_from_node("context_map", map.child("context_map"))?,
            result_map: resolvables_from_node("result_map", map.child("result_map"))?,
            callbacks,
        })
    }

    /// Converts the runnable back to its configuration map.
    #[must_use]
    pub fn to_attr_map(&self) -> AttrMap {
        let mut map = AttrMap::new();
        if let Some(label) = &self.label {
            map.insert("label", Node::from(label.as_str()));
        }
        map.insert("tool", Node::from(self.tool.as_str()));
        if self.disabled {
            map.insert("disabled", Node::Bool(true));
        }
        if !self.condition.is_empty() {
            map.insert(
                "condition",
                Node::List(self.condition.iter().map(Condition::to_node).collect()),
            );
        }
        if !self.params.is_empty() {
            map.insert("params", Node::Map(self.params.clone()));
        }
        if !self.context_map.is_empty() {
            map.insert(
                "context_map",
                Node::List(self.context_map.iter().map(Resolvable::to_node).collect()),
            );
        }
        if !self.result_map.is_empty() {
            map.insert(
                "result_map",
                Node::List(self.result_map.iter().map(Resolvable::to_node).collect()),
            );
        }
        if !self.callbacks.is_empty() {
            map.insert(
                "callbacks",
                Node::List(self.callbacks.iter().map(|cb| Node::from_value(cb.to_value())).collect()),
            );
        }
        map
    }

    fn name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.tool)
    }

    /// Evaluates the conditions on a copy.
    ///
    /// Returns `None` when every condition holds, otherwise the snapshot of
    /// the conditions evaluated up to and including the failing one.
    ///
    /// # Errors
    ///
    /// Propagates `ConditionFailedError` from raising conditions.
    pub fn gate(&self, ctx: &Context) -> SosResult<Option<Vec<Condition>>> {
        let mut snapshot = Vec::with_capacity(self.condition.len());
        for condition in &self.condition {
            let mut condition = condition.clone();
            let passed = condition.evaluate(ctx)?;
            snapshot.push(condition);
            if !passed {
                return Ok(Some(snapshot));
            }
        }
        Ok(None)
    }

    /// Runs the runnable and its callback chain against `ctx`.
    ///
    /// The returned result is the primary tool's result with every
    /// callback result appended to its `chain`. A break anywhere ends the
    /// invocation and is returned as the result. The context's last-result
    /// slot is cleared on every exit.
    ///
    /// # Errors
    ///
    /// Any failure other than a break is logged and propagated.
    pub fn invoke(&self, ctx: &mut Context, toolkit: &Toolkit) -> SosResult<RunResult> {
        let outcome = self.invoke_chain(ctx, toolkit);
        ctx.set_last_result(None);

        if let Err(err) = &outcome {
            error!(
                label = self.name(),
                tool = %self.tool,
                kind = err.kind(),
                error = %err,
                "run failed"
            );
        }
        outcome
    }

    fn invoke_chain(&self, ctx: &mut Context, toolkit: &Toolkit) -> SosResult<RunResult> {
        if self.disabled {
            debug!(label = self.name(), "not running: disabled");
            return Ok(RunResult::disabled(self.label.clone()).finish());
        }
        if let Some(snapshot) = self.gate(ctx)? {
            debug!(label = self.name(), "not running: condition false");
            return Ok(RunResult::skipped(self.label.clone(), snapshot).finish());
        }

        let mut primary = self.call(ctx, toolkit)?;
        if primary.is_break() {
            return Ok(primary);
        }

        // Popped from the end: declared callbacks run last-declared first,
        // everything pushed later runs in its declared order.
        let mut stack = self.callbacks.clone();
        stack.extend(primary.callbacks.iter().rev().cloned());

        let owner = self.name().to_string();
        while let Some(callback) = stack.pop() {
            let link = match callback {
                Node::Runnable(runnable) => {
                    if runnable.disabled || runnable.gate(ctx)?.is_some() {
                        debug!(label = runnable.name(), "not running callback: not enabled");
                        continue;
                    }
                    let link = runnable.call(ctx, toolkit)?;
                    stack.extend(runnable.callbacks.iter().rev().cloned());
                    link
                }
                other => {
                    debug!(owner = %owner, kind = other.kind_name(), "running callback");
                    execute_node(&format!("callback::{owner}"), &other, ctx, toolkit)?
                }
            };

            if link.is_break() {
                return Ok(link);
            }
            stack.extend(link.callbacks.iter().rev().cloned());
            primary.push_chain(link);
        }

        Ok(primary.finish())
    }

    /// Maps parameters, calls the tool, normalizes its output and applies
    /// the result mappings. Neither gating nor callbacks happen here.
    fn call(&self, ctx: &mut Context, toolkit: &Toolkit) -> SosResult<RunResult> {
        let mut params = self.params.clone();
        for resolvable in &self.context_map {
            resolvable.resolve(&*ctx, Some(&mut params))?;
        }

        let tool = toolkit.tool(&self.tool)?;
        let prior = ctx.take_last_result();
        if tool.schema().binds_result && prior.is_none() {
            return Err(MissingResultError::new(&self.tool).into());
        }
        let params = tool.schema().validate(&self.tool, &params)?;

        debug!(label = self.name(), tool = %self.tool, "calling tool");
        let output = tool.call(ToolCall {
            path: &self.tool,
            params: &params,
            ctx: tool.schema().binds_context.then_some(&mut *ctx),
            prior: prior.as_ref(),
            toolkit,
        })?;

        let result = RunResult::from_output(output, &self.tool, &params)
            .with_label(self.label.clone())
            .finish();
        if result.is_break() {
            return Ok(result);
        }

        ctx.set_last_result(Some(result.clone()));
        for resolvable in &self.result_map {
            resolvable.resolve(&result.data, Some(&mut *ctx))?;
        }
        Ok(result)
    }
}

fn materialize_callback(owner: &str, n: usize, node: Node) -> SosResult<Node> {
    match node {
        Node::Map(_) => Node::materialize(&format!("{owner}.callbacks[{n}]"), node),
        Node::Runnable(_) | Node::Composite(_) => Ok(node),
        other => Err(InvalidChildError::new(owner, format!("callbacks[{n}]"), other.kind_name()).into()),
    }
}
