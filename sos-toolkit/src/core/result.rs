//! The result tree produced by runnables and composites.

use super::{RunStatus, ToolOutput};
use crate::attr::{AttrMap, Attributes, Node};
use crate::runnable::Condition;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fields of a returned map that belong to the result, not its data.
const LIFTED_FIELDS: &[&str] = &["callbacks", "message"];

/// The outcome of one runnable or composite invocation.
///
/// Composites aggregate their children's results in declaration order;
/// a runnable appends the results of its callback chain to `chain`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    /// How the invocation ended.
    pub status: RunStatus,

    /// Run identifier, set on the root of a `run` call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<Uuid>,

    /// Label of the runnable or composite.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Dotted path of the tool that produced this result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub called_tool: Option<String>,

    /// Parameters the tool was called with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub called_params: Option<AttrMap>,

    /// The tool's data.
    #[serde(default)]
    pub data: Node,

    /// Follow-up runnables emitted by the tool.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub callbacks: Vec<Node>,

    /// Snapshot of the conditions that gated the node off.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub condition: Vec<Condition>,

    /// Child results of a composite, in declaration order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<(String, RunResult)>,

    /// Results of the callback chain, in execution order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chain: Vec<RunResult>,

    /// Break reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Free-form message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// When the invocation started.
    pub started_at: DateTime<Utc>,

    /// When the invocation finished.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Default for RunResult {
    fn default() -> Self {
        Self::new(RunStatus::Ok)
    }
}

impl RunResult {
    /// Creates an empty result with the given status.
    #[must_use]
    pub fn new(status: RunStatus) -> Self {
        Self {
            status,
            run_id: None,
            label: None,
            called_tool: None,
            called_params: None,
            data: Node::Null,
            callbacks: Vec::new(),
            condition: Vec::new(),
            children: Vec::new(),
            chain: Vec::new(),
            reason: None,
            message: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Creates a successful result carrying data.
    #[must_use]
    pub fn ok(data: impl Into<Node>) -> Self {
        let mut result = Self::new(RunStatus::Ok);
        result.data = data.into();
        result
    }

    /// Creates a result for a disabled node.
    #[must_use]
    pub fn disabled(label: Option<String>) -> Self {
        Self::new(RunStatus::Disabled)
            .with_label(label)
            .with_message("not run - disabled")
    }

    /// Creates a result for a node gated off by its conditions.
    #[must_use]
    pub fn skipped(label: Option<String>, condition: Vec<Condition>) -> Self {
        let mut result = Self::new(RunStatus::Skipped)
            .with_label(label)
            .with_message("not run - condition false");
        result.condition = condition;
        result
    }

    /// Creates a control-flow break.
    #[must_use]
    pub fn broken(reason: impl Into<String>, data: Node) -> Self {
        let mut result = Self::new(RunStatus::Break);
        result.reason = Some(reason.into());
        result.data = data;
        result
    }

    /// Creates an empty result with a message.
    #[must_use]
    pub fn empty(message: impl Into<String>) -> Self {
        Self::new(RunStatus::Empty).with_message(message)
    }

    /// Normalizes a tool's output.
    ///
    /// Maps have their result fields lifted out and the remainder stored
    /// as data; any other value is wrapped as `{result: value}`.
    #[must_use]
    pub fn from_output(output: ToolOutput, tool: &str, params: &AttrMap) -> Self {
        let mut result = match output {
            ToolOutput::Empty => Self::new(RunStatus::Ok),
            ToolOutput::Result(result) => result,
            ToolOutput::Break { reason, data } => Self::broken(reason, data),
            ToolOutput::Value(Node::Map(map)) => Self::from_map(map),
            ToolOutput::Value(value) => {
                let mut data = AttrMap::new();
                data.insert("result", value);
                Self::ok(data)
            }
        };
        result.called_tool = Some(tool.to_string());
        result.called_params = Some(params.clone());
        result
    }

    fn from_map(map: AttrMap) -> Self {
        let mut result = Self::new(RunStatus::Ok);
        let mut data = AttrMap::new();
        for (key, value) in map {
            if !LIFTED_FIELDS.contains(&key.as_str()) {
                data.insert(key, value);
                continue;
            }
            match (key.as_str(), value) {
                ("callbacks", Node::List(items)) => result.callbacks = items,
                ("message", Node::Str(message)) if !message.is_empty() => {
                    result.message = Some(message);
                }
                _ => {}
            }
        }
        result.data = Node::Map(data);
        result
    }

    /// Sets the label.
    #[must_use]
    pub fn with_label(mut self, label: Option<String>) -> Self {
        self.label = label;
        self
    }

    /// Sets the message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Appends a composite child result.
    pub fn push_child(&mut self, key: impl Into<String>, child: Self) {
        self.children.push((key.into(), child));
    }

    /// Appends a callback result.
    pub fn push_chain(&mut self, link: Self) {
        self.chain.push(link);
    }

    /// Stamps the finish time.
    #[must_use]
    pub fn finish(mut self) -> Self {
        self.finished_at = Some(Utc::now());
        self
    }

    /// Returns true for a control-flow break.
    #[must_use]
    pub const fn is_break(&self) -> bool {
        self.status.is_break()
    }

    /// Gets a composite child result by key.
    #[must_use]
    pub fn child(&self, key: &str) -> Option<&Self> {
        self.children.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Resolves a dotted path inside the data.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<Node> {
        self.data.get(path).ok()
    }

    /// Returns the last result produced: the tail of the callback chain or
    /// this result itself.
    #[must_use]
    pub fn last(&self) -> &Self {
        self.chain.last().map_or(self, Self::last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> AttrMap {
        let mut params = AttrMap::new();
        params.insert("target", Node::from("a.b"));
        params
    }

    #[test]
    fn test_from_output_wraps_scalar() {
        let result = RunResult::from_output(ToolOutput::value(true), "context.ctx_has", &params());
        assert_eq!(result.status, RunStatus::Ok);
        assert_eq!(result.get("result"), Some(Node::Bool(true)));
        assert_eq!(result.called_tool.as_deref(), Some("context.ctx_has"));
    }

    #[test]
    fn test_from_output_lifts_result_fields() {
        let mut map = AttrMap::new();
        map.insert("path", Node::from("/tmp/x"));
        map.insert("message", Node::from("created"));
        map.insert("callbacks", Node::List(vec![Node::empty_map()]));

        let result = RunResult::from_output(ToolOutput::Value(Node::Map(map)), "fs.mk", &params());
        assert_eq!(result.message.as_deref(), Some("created"));
        assert_eq!(result.callbacks.len(), 1);
        assert_eq!(result.get("path"), Some(Node::from("/tmp/x")));
        assert!(result.get("message").is_none());
    }

    #[test]
    fn test_from_output_empty_and_break() {
        let result = RunResult::from_output(ToolOutput::Empty, "t.t", &AttrMap::new());
        assert!(result.data.is_null());

        let result = RunResult::from_output(ToolOutput::brk("stop"), "t.t", &AttrMap::new());
        assert!(result.is_break());
        assert_eq!(result.reason.as_deref(), Some("stop"));
    }

    #[test]
    fn test_children_and_last() {
        let mut parent = RunResult::new(RunStatus::Ok);
        parent.push_child("first", RunResult::ok(Node::Int(1)));

        let mut primary = RunResult::ok(Node::Int(2));
        primary.push_chain(RunResult::ok(Node::Int(3)));

        assert_eq!(parent.child("first").map(|r| r.data.clone()), Some(Node::Int(1)));
        assert_eq!(primary.last().data, Node::Int(3));
    }
}
