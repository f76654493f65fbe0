#[cfg(test)]
mod tests {
    use crate::attr::{Attributes, Node};
    use crate::context::Context;
    use crate::core::RunStatus;
    use crate::runnable::{Composite, Condition, Runnable};
    use crate::testing::{context_from, test_toolkit, Recorder};
    use crate::tools::Toolkit;
    use pretty_assertions::assert_eq;

    const CONFIG: &str = r"
namespace:
  mode: dev
  who: ada
action:
  ordered:
    tool: test.record
    params: {name: main}
    callbacks:
      - {tool: test.record, params: {name: a}}
      - tool: test.record
        params: {name: b}
        callbacks:
          - {tool: test.record, params: {name: c}}
  emitted:
    tool: test.echo
    params:
      value:
        callbacks:
          - {tool: test.record, params: {name: from_tool}}
    callbacks:
      - {tool: test.record, params: {name: declared}}
  chain_break:
    tool: test.record
    params: {name: main}
    callbacks:
      - {tool: test.record, params: {name: never}}
      - {tool: test.brk, params: {reason: enough}}
  steps:
    first: {tool: test.record, params: {name: first}}
    halt: {tool: test.brk, params: {reason: halt}}
    last: {tool: test.record, params: {name: last}}
  gated:
    tool: test.record
    params: {name: gated}
    condition:
      - {ctx_key: namespace.who, valid: [ada, bob]}
      - {ctx_key: namespace.mode, valid: prod}
  strict:
    tool: test.record
    params: {name: strict}
    condition: {ctx_key: namespace.mode, valid: prod, raise_exc: true}
  inverse:
    tool: test.record
    params: {name: inverse}
    condition: {ctx_key: namespace.mode, valid: prod, is_inverse: true}
  orphan:
    tool: test.prior
  with_prior:
    tool: test.record
    params: {name: x}
    callbacks:
      - {tool: test.prior}
  mapped:
    tool: test.record
    context_map:
      - {data: namespace.who, result: name}
    result_map:
      - {data: result, result: namespace.greeted}
  off:
    tool: test.record
    params: {name: off}
    disabled: true
  off_group:
    disabled: true
    one: {tool: test.record, params: {name: one}}
  bad_group:
    one: {tool: test.record, params: {name: one}}
    two: 5
  targeted:
    __TARGET__: action.targeted
    one: {tool: test.record, params: {name: one}}
";

    fn setup() -> (Recorder, Toolkit, Context) {
        let recorder = Recorder::new();
        let toolkit = test_toolkit(&recorder);
        let ctx = context_from(CONFIG).unwrap();
        (recorder, toolkit, ctx)
    }

    fn calls(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| (*n).to_string()).collect()
    }

    #[test]
    fn test_callbacks_run_last_declared_first() {
        let (recorder, toolkit, mut ctx) = setup();

        let result = ctx.run(&toolkit, "action.ordered").unwrap();
        assert_eq!(recorder.calls(), calls(&["main", "b", "c", "a"]));
        assert_eq!(result.chain.len(), 3);
        assert_eq!(result.last().get("result"), Some(Node::from("a")));
    }

    #[test]
    fn test_tool_callbacks_run_before_declared() {
        let (recorder, toolkit, mut ctx) = setup();

        ctx.run(&toolkit, "action.emitted").unwrap();
        assert_eq!(recorder.calls(), calls(&["echo", "from_tool", "declared"]));
    }

    #[test]
    fn test_break_in_callback_chain() {
        let (recorder, toolkit, mut ctx) = setup();

        let result = ctx.run(&toolkit, "action.chain_break").unwrap();
        assert_eq!(recorder.calls(), calls(&["main", "brk"]));
        assert_eq!(result.status, RunStatus::Break);
        assert_eq!(result.reason.as_deref(), Some("enough"));
    }

    #[test]
    fn test_break_stops_composite() {
        let (recorder, toolkit, mut ctx) = setup();

        let result = ctx.run(&toolkit, "action.steps").unwrap();
        assert_eq!(recorder.calls(), calls(&["first", "brk"]));
        assert_eq!(result.status, RunStatus::Ok);
        assert_eq!(result.children.len(), 2);
        assert!(result.message.unwrap().ends_with("halt"));
    }

    #[test]
    fn test_gate_snapshots_conditions() {
        let (recorder, toolkit, mut ctx) = setup();

        let result = ctx.run(&toolkit, "action.gated").unwrap();
        assert_eq!(result.status, RunStatus::Skipped);
        assert!(recorder.calls().is_empty());
        assert_eq!(result.condition.len(), 2);
        assert_eq!(result.condition[0].result, Some(true));
        assert_eq!(result.condition[1].context_value, Node::from("dev"));
        assert_eq!(result.condition[1].result, Some(false));

        ctx.set("namespace.mode", Node::from("prod"), true).unwrap();
        ctx.run(&toolkit, "action.gated").unwrap();
        assert_eq!(recorder.calls(), calls(&["gated"]));
    }

    #[test]
    fn test_gate_does_not_mutate_declared_conditions() {
        let (_, toolkit, mut ctx) = setup();
        ctx.run(&toolkit, "action.gated").unwrap();

        let Node::Runnable(runnable) = ctx.get("action.gated").unwrap() else {
            panic!("expected a runnable");
        };
        assert!(runnable.condition.iter().all(|c| c.result.is_none()));
    }

    #[test]
    fn test_raising_and_inverse_conditions() {
        let (recorder, toolkit, mut ctx) = setup();

        let err = ctx.run(&toolkit, "action.strict").unwrap_err();
        assert_eq!(err.kind(), "ConditionFailedError");

        ctx.run(&toolkit, "action.inverse").unwrap();
        assert_eq!(recorder.calls(), calls(&["inverse"]));
    }

    #[test]
    fn test_prior_result() {
        let (_, toolkit, mut ctx) = setup();

        let err = ctx.run(&toolkit, "action.orphan").unwrap_err();
        assert_eq!(err.kind(), "MissingResultError");

        let result = ctx.run(&toolkit, "action.with_prior").unwrap();
        assert_eq!(result.chain[0].get("prior.result"), Some(Node::from("x")));
        assert!(ctx.last_result().is_none());
    }

    #[test]
    fn test_context_and_result_maps() {
        let (recorder, toolkit, mut ctx) = setup();

        ctx.run(&toolkit, "action.mapped").unwrap();
        assert_eq!(recorder.calls(), calls(&["ada"]));
        assert_eq!(ctx.get("namespace.greeted").unwrap(), Node::from("ada"));
    }

    #[test]
    fn test_disabled() {
        let (recorder, toolkit, mut ctx) = setup();

        assert_eq!(ctx.run(&toolkit, "action.off").unwrap().status, RunStatus::Disabled);
        assert_eq!(ctx.run(&toolkit, "action.off_group").unwrap().status, RunStatus::Disabled);
        assert!(recorder.calls().is_empty());
    }

    #[test]
    fn test_invalid_child() {
        let (recorder, toolkit, mut ctx) = setup();

        let err = ctx.run(&toolkit, "action.bad_group").unwrap_err();
        assert_eq!(err.kind(), "InvalidChildError");
        assert_eq!(recorder.calls(), calls(&["one"]));
    }

    #[test]
    fn test_composite_target_is_transient() {
        let (_, toolkit, mut ctx) = setup();

        ctx.run(&toolkit, "action.targeted").unwrap();
        assert_eq!(ctx.target(), Some("action.targeted"));
        ctx.clear_transient();
        assert!(ctx.target().is_none());
    }

    #[test]
    fn test_unknown_tool_is_lookup_error() {
        let (_, toolkit, mut ctx) = setup();
        ctx.set("action.ghost", Runnable::new("test.ghost").into(), false)
            .unwrap();

        assert_eq!(ctx.run(&toolkit, "action.ghost").unwrap_err().kind(), "LookupError");
    }

    #[test]
    fn test_builders_round_trip_through_config() {
        let runnable = Runnable::new("test.record")
            .with_label("greet")
            .with_param("name", "ada")
            .with_condition(Condition::new("namespace.mode", "dev"));
        let map = runnable.to_attr_map();
        let back = Runnable::from_attr_map(None, &map).unwrap();
        assert_eq!(back, runnable);

        let composite = Composite::new("group").with_child("greet", runnable);
        let back = Composite::from_attr_map("group", composite.to_attr_map()).unwrap();
        assert_eq!(back, composite);
    }

    #[test]
    fn test_runnable_needs_a_tool() {
        let map = match Node::from_value(serde_json::json!({"params": {"a": 1}})) {
            Node::Map(map) => map,
            _ => unreachable!(),
        };
        assert_eq!(Runnable::from_attr_map(Some("x"), &map).unwrap_err().kind(), "ConfigurationError");
    }
}
