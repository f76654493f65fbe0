#[cfg(test)]
mod tests {
    use crate::attr::{AttrMap, Attributes, Node};
    use crate::context::{Context, LoadOptions};
    use crate::core::RunStatus;
    use crate::testing::{settings_in, write_file, Recorder};
    use crate::tools::Toolkit;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const SYSTEM: &str = r"
meta:
  sos_version: 1.0.0
  system_name: demo
namespace:
  greeting: hello
hook:
  on_context_load:
    tool: test.record
    params: {name: load}
action:
  sos_setup:
    tool: test.record
    params: {name: setup}
  sos_build:
    tool: test.record
    params: {name: build}
  sos_install:
    tool: test.record
    params: {name: install}
  sos_up:
    tool: test.record
    params: {name: up}
  sos_down:
    tool: test.record
    params: {name: down}
  sos_restart:
    default:
      tool: test.record
      params: {name: restart}
    db:
      tool: test.record
      params: {name: restart_db}
  sos_clean:
    tool: test.record
    params: {name: clean}
  sos_config:
    default:
      tool: test.record
      params: {name: config_default}
    tls:
      tool: test.record
      params: {name: config_tls}
  sos_update:
    tool: test.record
    params: {name: update}
  sos_status:
    tool: test.record
    params: {name: status}
  sos_dev:
    web:
      tool: test.record
      params: {name: dev_web}
  sos_profile:
    gpu:
      tool: test.record
      params: {name: profile_gpu}
  sos_commit:
    default:
      tool: test.record
      params: {name: commit_default}
    docs:
      tool: test.record
      params: {name: commit_docs}
";

    fn params(pairs: &[(&str, Node)]) -> AttrMap {
        pairs.iter().map(|(k, v)| ((*k).to_string(), v.clone())).collect()
    }

    fn system_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "sos-system.yaml", SYSTEM).unwrap();
        dir
    }

    fn toolkit(dir: &TempDir, recorder: &Recorder) -> Toolkit {
        recorder.toolkit(settings_in(dir.path()))
    }

    fn set_up(toolkit: &Toolkit, recorder: &Recorder) {
        toolkit.run_action("setup", &AttrMap::new()).unwrap();
        recorder.reset();
    }

    fn saved(toolkit: &Toolkit) -> Context {
        Context::file_load(toolkit, None, LoadOptions::new().with_hooks(false)).unwrap()
    }

    #[test]
    fn test_setup_generates_and_saves() {
        let dir = system_dir();
        let recorder = Recorder::new();
        let toolkit = toolkit(&dir, &recorder);

        let result = toolkit
            .run_action("setup", &params(&[("profile", Node::from("ci"))]))
            .unwrap();
        assert_eq!(recorder.calls(), vec!["load".to_string(), "setup".to_string()]);
        assert_eq!(result.status, RunStatus::Ok);
        assert!(dir.path().join("sos-context.yaml").is_file());

        let ctx = saved(&toolkit);
        assert_eq!(ctx.meta().profile, "ci");
        assert!(!ctx.meta().is_installed);
        assert_eq!(ctx.get("namespace.greeting").unwrap(), Node::from("hello"));
    }

    #[test]
    fn test_setup_refuses_existing_file_without_overwrite() {
        let dir = system_dir();
        let recorder = Recorder::new();
        let toolkit = toolkit(&dir, &recorder);
        set_up(&toolkit, &recorder);

        assert!(toolkit.run_action("setup", &AttrMap::new()).is_err());
        assert!(recorder.calls().is_empty());

        toolkit
            .run_action("setup", &params(&[("overwrite", Node::Bool(true))]))
            .unwrap();
        assert_eq!(recorder.call_count(), 2);
    }

    #[test]
    fn test_setup_test_mode_does_not_save() {
        let dir = system_dir();
        let recorder = Recorder::new();
        let toolkit = toolkit(&dir, &recorder);

        let result = toolkit
            .run_action("setup", &params(&[("test", Node::Bool(true))]))
            .unwrap();
        assert_eq!(result.get("meta.system_name"), Some(Node::from("demo")));
        assert!(!dir.path().join("sos-context.yaml").exists());
        assert!(recorder.calls().is_empty());
    }

    #[test]
    fn test_up_needs_install() {
        let dir = system_dir();
        let recorder = Recorder::new();
        let toolkit = toolkit(&dir, &recorder);
        set_up(&toolkit, &recorder);

        assert!(toolkit.run_action("up", &AttrMap::new()).is_err());
        assert!(recorder.calls().is_empty());

        toolkit.run_action("install", &AttrMap::new()).unwrap();
        assert!(saved(&toolkit).meta().is_installed);
        assert!(toolkit.run_action("build", &AttrMap::new()).is_err());

        toolkit.run_action("up", &AttrMap::new()).unwrap();
        toolkit.run_action("down", &AttrMap::new()).unwrap();
        assert_eq!(
            recorder.calls(),
            vec!["load", "install", "load", "up", "load", "down"]
                .into_iter()
                .map(String::from)
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_status_and_dev_need_no_install() {
        let dir = system_dir();
        let recorder = Recorder::new();
        let toolkit = toolkit(&dir, &recorder);
        set_up(&toolkit, &recorder);

        toolkit.run_action("status", &AttrMap::new()).unwrap();
        toolkit
            .run_action("dev", &params(&[("target", Node::from("web"))]))
            .unwrap();
        assert_eq!(
            recorder.calls(),
            vec!["load".to_string(), "status".to_string(), "load".to_string(), "dev_web".to_string()]
        );

        let result = toolkit
            .run_action("sos.dev", &params(&[("target", Node::from("db"))]))
            .unwrap();
        assert_eq!(result.status, RunStatus::Empty);
    }

    #[test]
    fn test_profile_runs_and_saves_the_profile() {
        let dir = system_dir();
        let recorder = Recorder::new();
        let toolkit = toolkit(&dir, &recorder);
        set_up(&toolkit, &recorder);

        toolkit
            .run_action("profile", &params(&[("profile", Node::from("gpu"))]))
            .unwrap();
        assert_eq!(recorder.calls(), vec!["load".to_string(), "profile_gpu".to_string()]);
        assert_eq!(saved(&toolkit).meta().profile, "gpu");

        assert!(toolkit.run_action("profile", &AttrMap::new()).is_err());
    }

    #[test]
    fn test_commit_defaults_to_default_target() {
        let dir = system_dir();
        let recorder = Recorder::new();
        let toolkit = toolkit(&dir, &recorder);
        set_up(&toolkit, &recorder);

        toolkit.run_action("commit", &AttrMap::new()).unwrap();
        toolkit
            .run_action("commit", &params(&[("target", Node::from("docs"))]))
            .unwrap();
        assert_eq!(
            recorder.calls(),
            vec![
                "load".to_string(),
                "commit_default".to_string(),
                "load".to_string(),
                "commit_docs".to_string()
            ]
        );
    }

    #[test]
    fn test_restart_runs_down_restart_up() {
        let dir = system_dir();
        let recorder = Recorder::new();
        let toolkit = toolkit(&dir, &recorder);
        set_up(&toolkit, &recorder);
        toolkit.run_action("install", &AttrMap::new()).unwrap();
        recorder.reset();

        let result = toolkit.run_action("restart", &AttrMap::new()).unwrap();
        assert_eq!(
            recorder.calls(),
            vec!["load", "down", "restart", "up"]
                .into_iter()
                .map(String::from)
                .collect::<Vec<_>>()
        );
        assert!(result.child("down").is_some());
        assert!(result.child("up").is_some());

        recorder.reset();
        toolkit
            .run_action("restart", &params(&[("target", Node::from("db"))]))
            .unwrap();
        assert_eq!(recorder.calls(), vec!["load".to_string(), "restart_db".to_string()]);
    }

    #[test]
    fn test_clean_keeps_file_unless_delete_enabled() {
        let dir = system_dir();
        let recorder = Recorder::new();
        let toolkit = toolkit(&dir, &recorder);
        set_up(&toolkit, &recorder);
        let file = dir.path().join("sos-context.yaml");

        toolkit.run_action("clean", &AttrMap::new()).unwrap();
        assert_eq!(recorder.calls(), vec!["load".to_string(), "clean".to_string()]);
        assert!(file.is_file());

        let deleting = recorder.toolkit(settings_in(dir.path()).with_delete_enabled(true));
        deleting.run_action("clean", &AttrMap::new()).unwrap();
        assert!(!file.exists());
    }

    #[test]
    fn test_update_replaces_subtree() {
        let dir = system_dir();
        let recorder = Recorder::new();
        let toolkit = toolkit(&dir, &recorder);
        set_up(&toolkit, &recorder);

        let changed = SYSTEM.replace("{name: build}", "{name: rebuilt}");
        write_file(dir.path(), "sos-system.yaml", &changed).unwrap();

        toolkit
            .run_action("update", &params(&[("target", Node::from("action.sos_build"))]))
            .unwrap();
        assert_eq!(recorder.calls(), vec!["load".to_string(), "update".to_string()]);

        recorder.reset();
        toolkit.run_action("build", &AttrMap::new()).unwrap();
        assert_eq!(recorder.calls(), vec!["load".to_string(), "rebuilt".to_string()]);
    }

    #[test]
    fn test_update_rejects_namespace() {
        let dir = system_dir();
        let recorder = Recorder::new();
        let toolkit = toolkit(&dir, &recorder);
        set_up(&toolkit, &recorder);

        let err = toolkit
            .run_action("update", &params(&[("target", Node::from("namespace.greeting"))]))
            .unwrap_err();
        assert!(err.to_string().contains("namespace"));
    }

    #[test]
    fn test_context_reads_and_writes() {
        let dir = system_dir();
        let recorder = Recorder::new();
        let toolkit = toolkit(&dir, &recorder);
        set_up(&toolkit, &recorder);

        let read = params(&[("target", Node::from("namespace.greeting"))]);
        let result = toolkit.run_action("context", &read).unwrap();
        assert_eq!(result.data, Node::from("hello"));

        let write = params(&[
            ("target", Node::from("namespace.greeting")),
            ("value", Node::from("hi")),
        ]);
        toolkit.run_action("context", &write).unwrap();
        assert_eq!(saved(&toolkit).get("namespace.greeting").unwrap(), Node::from("hi"));
    }

    #[test]
    fn test_config_and_action_targets() {
        let dir = system_dir();
        let recorder = Recorder::new();
        let toolkit = toolkit(&dir, &recorder);
        set_up(&toolkit, &recorder);

        toolkit.run_action("config", &AttrMap::new()).unwrap();
        toolkit
            .run_action("config", &params(&[("target", Node::from("tls"))]))
            .unwrap();
        toolkit
            .run_action("action", &params(&[("target", Node::from("action.sos_up"))]))
            .unwrap();
        assert_eq!(
            recorder.calls(),
            vec!["load", "config_default", "load", "config_tls", "load", "up"]
                .into_iter()
                .map(String::from)
                .collect::<Vec<_>>()
        );

        assert!(toolkit
            .run_action("config", &params(&[("target", Node::from("service.web"))]))
            .is_err());
    }

    #[test]
    fn test_service_runs_each_service_action() {
        let dir = TempDir::new().unwrap();
        write_file(
            dir.path(),
            "sos-context.yaml",
            r"
meta: {sos_version: 1.0.0, is_installed: true}
service:
  web:
    meta: {system_name: web}
    action:
      sos_up:
        tool: test.record
        params: {name: web_up}
  db:
    meta: {system_name: db}
    action: {}
",
        )
        .unwrap();
        let recorder = Recorder::new();
        let toolkit = toolkit(&dir, &recorder);

        let result = toolkit
            .run_action("service", &params(&[("action", Node::from("sos_up"))]))
            .unwrap();
        assert_eq!(recorder.calls(), vec!["web_up".to_string()]);
        assert_eq!(result.child("web").unwrap().status, RunStatus::Ok);
        assert_eq!(result.child("db").unwrap().status, RunStatus::Empty);

        recorder.reset();
        let single = toolkit
            .run_action(
                "service",
                &params(&[("target", Node::from("web")), ("action", Node::from("sos_up"))]),
            )
            .unwrap();
        assert!(single.children.is_empty());
        assert_eq!(recorder.calls(), vec!["web_up".to_string()]);
    }

    #[test]
    fn test_explicit_context_file() {
        let dir = system_dir();
        let recorder = Recorder::new();
        let toolkit = toolkit(&dir, &recorder);
        let custom = dir.path().join("custom.yaml");

        toolkit
            .run_action(
                "setup",
                &params(&[("context_file", Node::from(custom.to_string_lossy().as_ref()))]),
            )
            .unwrap();
        assert!(custom.is_file());
        assert!(!dir.path().join("sos-context.yaml").exists());

        recorder.reset();
        toolkit
            .run_action(
                "install",
                &params(&[("context_file", Node::from("custom.yaml"))]),
            )
            .unwrap();
        assert_eq!(recorder.calls(), vec!["load".to_string(), "install".to_string()]);
    }
}
