//! What a tool hands back to the engine.

use super::RunResult;
use crate::attr::Node;

/// The return value of a tool handler.
///
/// `Break` is the control-flow exit: it is not an error, it stops the
/// invocation and lets the enclosing composite stop iterating.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    /// No data.
    Empty,
    /// A plain value or map.
    Value(Node),
    /// A fully formed result.
    Result(RunResult),
    /// Terminate the current invocation.
    Break {
        /// Why the break happened.
        reason: String,
        /// Data carried out with the break.
        data: Node,
    },
}

impl ToolOutput {
    /// Creates a value output.
    #[must_use]
    pub fn value(value: impl Into<Node>) -> Self {
        Self::Value(value.into())
    }

    /// Creates a break with no data.
    #[must_use]
    pub fn brk(reason: impl Into<String>) -> Self {
        Self::Break {
            reason: reason.into(),
            data: Node::Null,
        }
    }

    /// Returns true for a break.
    #[must_use]
    pub const fn is_break(&self) -> bool {
        matches!(self, Self::Break { .. })
    }
}

impl From<Node> for ToolOutput {
    fn from(value: Node) -> Self {
        match value {
            Node::Null => Self::Empty,
            other => Self::Value(other),
        }
    }
}

impl From<RunResult> for ToolOutput {
    fn from(value: RunResult) -> Self {
        Self::Result(value)
    }
}
