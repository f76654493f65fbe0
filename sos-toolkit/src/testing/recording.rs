//! Tools that record their invocations.

use crate::attr::{AttrMap, Node};
use crate::config::Settings;
use crate::core::ToolOutput;
use crate::tools::{ParamKind, ParamSpec, PluginDescriptor, ToolCall, Toolkit};
use anyhow::anyhow;
use parking_lot::Mutex;
use std::sync::Arc;

/// Shared call log behind the `test.*` tools.
///
/// | tool | behavior |
/// |---|---|
/// | `test.record {name}` | logs `name`, returns it |
/// | `test.echo {value}` | logs `echo`, returns `value` as the tool output |
/// | `test.brk {reason}` | logs `brk`, breaks |
/// | `test.fail {message}` | logs `fail`, fails |
/// | `test.prior` | logs `prior`, returns the previous result's data |
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    calls: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the recorded names in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Returns the number of recorded calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Clears the log.
    pub fn reset(&self) {
        self.calls.lock().clear();
    }

    fn push(&self, name: impl Into<String>) {
        self.calls.lock().push(name.into());
    }

    /// Returns the `test.*` tool descriptors bound to this recorder.
    #[must_use]
    pub fn plugins(&self) -> Vec<PluginDescriptor> {
        let record = self.clone();
        let echo = self.clone();
        let brk = self.clone();
        let fail = self.clone();
        let prior = self.clone();

        vec![
            PluginDescriptor::tool("test", "record", move |call: ToolCall<'_>| {
                let name = call.str_param("name")?;
                record.push(name);
                let mut data = AttrMap::new();
                data.insert("result", Node::from(name));
                Ok(ToolOutput::Value(Node::Map(data)))
            })
            .with_description("Record a call")
            .with_param(ParamSpec::required("name", ParamKind::String, "Name to record")),
            PluginDescriptor::tool("test", "echo", move |call: ToolCall<'_>| {
                echo.push("echo");
                Ok(call.param("value").cloned().map_or(ToolOutput::Empty, ToolOutput::Value))
            })
            .with_description("Return the value as the tool output")
            .with_param(ParamSpec::optional("value", ParamKind::Any, "Output to return", Node::Null)),
            PluginDescriptor::tool("test", "brk", move |call: ToolCall<'_>| {
                brk.push("brk");
                Ok(ToolOutput::brk(call.str_param("reason")?))
            })
            .with_description("Break the running composite")
            .with_param(ParamSpec::optional("reason", ParamKind::String, "Break reason", "test break")),
            PluginDescriptor::tool("test", "fail", move |call: ToolCall<'_>| {
                fail.push("fail");
                Err(anyhow!("{}", call.str_param("message")?))
            })
            .with_description("Fail with a message")
            .with_param(ParamSpec::optional("message", ParamKind::String, "Error message", "test failure")),
            PluginDescriptor::tool("test", "prior", move |call: ToolCall<'_>| {
                prior.push("prior");
                let data = call.prior()?.data.clone();
                let mut out = AttrMap::new();
                out.insert("prior", data);
                Ok(ToolOutput::Value(Node::Map(out)))
            })
            .with_description("Return the previous result's data")
            .binds_result(),
        ]
    }

    /// Builds a toolkit with the core tools, the actions and this
    /// recorder's tools.
    #[must_use]
    pub fn toolkit(&self, settings: Settings) -> Toolkit {
        Toolkit::builder()
            .with_settings(settings)
            .with_core_tools()
            .with_actions()
            .with_plugins(self.plugins())
            .build()
    }
}
