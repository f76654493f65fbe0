//! Runnables, composites and the expression objects they use.
//!
//! A [`Runnable`] invokes one registered tool against a
//! [`Context`](crate::context::Context): it evaluates its [`Condition`]s,
//! maps context values into parameters with [`Resolvable`]s, calls the
//! tool, maps the result back, and then drains its callback chain. A
//! [`Composite`] runs an ordered tree of those.

mod composite;
mod condition;
mod resolvable;
#[allow(clippy::module_inception)]
mod runnable;

#[cfg(test)]
mod runnable_tests;

pub use composite::{execute_node, Composite, TARGET_KEY};
pub use condition::{Comparison, Condition};
pub use resolvable::{format_placeholders, Resolvable};
pub use runnable::Runnable;
