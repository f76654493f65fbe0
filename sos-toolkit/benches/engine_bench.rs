//! Benchmarks for path access and runnable execution.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sos_toolkit::attr::{AttrMap, Attributes, Node};
use sos_toolkit::config::Settings;
use sos_toolkit::context::Context;
use sos_toolkit::testing::Recorder;

const SYSTEM: &str = r"
namespace:
  port: 8080
action:
  steps:
    first:
      tool: test.record
      params: {name: first}
      callbacks:
        - {tool: test.record, params: {name: callback}}
    second:
      tool: context.ctx_set
      params: {target: namespace.port, value: 9090, overwrite: true}
";

fn path_benchmark(c: &mut Criterion) {
    let mut map = AttrMap::new();
    for n in 0..50 {
        let _ = map.set(&format!("service.svc{n}.ports[2].host"), Node::from("localhost"), true);
    }

    c.bench_function("get_deep_path", |b| {
        b.iter(|| black_box(map.get(black_box("service.svc25.ports[2].host"))))
    });
    c.bench_function("set_deep_path", |b| {
        b.iter(|| {
            let mut copy = map.clone();
            black_box(copy.set("service.svc49.ports[2].host", Node::from("db"), true))
        })
    });
}

fn runnable_benchmark(c: &mut Criterion) {
    let recorder = Recorder::new();
    let toolkit = recorder.toolkit(Settings::default());
    let config: serde_json::Value = match serde_yaml::from_str(SYSTEM) {
        Ok(config) => config,
        Err(err) => panic!("invalid benchmark config: {err}"),
    };
    let ctx = match Context::from_config(config) {
        Ok(ctx) => ctx,
        Err(err) => panic!("invalid benchmark context: {err}"),
    };

    c.bench_function("run_composite", |b| {
        b.iter(|| {
            recorder.reset();
            let mut ctx = ctx.clone();
            black_box(ctx.run(&toolkit, "action.steps"))
        })
    });
}

criterion_group!(benches, path_benchmark, runnable_benchmark);
criterion_main!(benches);
