//! Run results for the toolkit.
//!
//! This module contains:
//! - The run status enum
//! - The value a tool hands back to the engine
//! - The result tree produced by every runnable and composite

mod output;
mod result;
mod status;

pub use output::ToolOutput;
pub use result::RunResult;
pub use status::RunStatus;
