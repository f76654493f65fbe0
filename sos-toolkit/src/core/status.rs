//! Run status enum.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a runnable or composite invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// The tool ran, or every child of a composite was visited.
    #[default]
    Ok,
    /// The node is disabled and was not run.
    Disabled,
    /// A condition gated the node off.
    Skipped,
    /// A control-flow break ended the invocation early.
    Break,
    /// Nothing was found to run.
    Empty,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Disabled => write!(f, "disabled"),
            Self::Skipped => write!(f, "skipped"),
            Self::Break => write!(f, "break"),
            Self::Empty => write!(f, "empty"),
        }
    }
}

impl RunStatus {
    /// Returns true if the node did not run its tool.
    #[must_use]
    pub const fn is_skip(&self) -> bool {
        matches!(self, Self::Disabled | Self::Skipped | Self::Empty)
    }

    /// Returns true for a control-flow break.
    #[must_use]
    pub const fn is_break(&self) -> bool {
        matches!(self, Self::Break)
    }
}
