#[cfg(test)]
mod tests {
    use crate::config::{
        load_layer, ContextGenerator, GenerateOptions, LayerFile, LayerSource, Settings,
    };
    use crate::errors::SosError;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, body: &str) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, body).unwrap();
    }

    fn settings(dir: &TempDir) -> Settings {
        Settings::default()
            .with_system_path(dir.path())
            .with_toolkit_version("1.0.0")
    }

    fn layered_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "sos-root.yaml", "x: 1\nnamespace: {from_root: true}\n");
        write(dir.path(), "sos-user.yaml", "x: 2\n");
        write(
            dir.path(),
            "sos-system.yaml",
            "meta: {sos_version: v1.0.0, system_name: demo}\nx: 3\nnamespace: {y: 1}\n",
        );
        write(dir.path(), "sos-local.yaml", "x: 4\n");
        dir
    }

    #[test]
    fn test_layer_precedence() {
        let dir = layered_dir();
        let settings = settings(&dir);
        let value = ContextGenerator::new(&settings)
            .generate_value(&GenerateOptions::new())
            .unwrap();

        assert_eq!(value["x"], json!(4));
        assert_eq!(value["namespace"]["from_root"], json!(true));
        assert_eq!(value["meta"]["system_name"], json!("demo"));
        assert_eq!(value["service"], json!({}));
    }

    #[test]
    fn test_runtime_layer_beats_files() {
        let dir = layered_dir();
        let settings = settings(&dir);
        let opts = GenerateOptions::new()
            .with_runtime_config(json!({"x": 9}))
            .with_namespace("y", 7)
            .with_meta("profile", "ci");
        let value = ContextGenerator::new(&settings).generate_value(&opts).unwrap();

        assert_eq!(value["x"], json!(9));
        assert_eq!(value["namespace"]["y"], json!(7));
        assert_eq!(value["meta"]["profile"], json!("ci"));
    }

    #[test]
    fn test_persist_keeps_previous_namespace() {
        let dir = layered_dir();
        write(dir.path(), "sos-context.yaml", "namespace: {y: 5}\nx: 100\n");
        let settings = settings(&dir);
        let opts = GenerateOptions::new().persist(true);
        let value = ContextGenerator::new(&settings).generate_value(&opts).unwrap();

        assert_eq!(value["namespace"]["y"], json!(5));
        assert_eq!(value["x"], json!(4));
    }

    #[test]
    fn test_persist_without_context_file_fails() {
        let dir = layered_dir();
        let settings = settings(&dir);
        let err = ContextGenerator::new(&settings)
            .generate_value(&GenerateOptions::new().persist(true))
            .unwrap_err();
        assert_eq!(err.kind(), "ConfigurationError");
    }

    #[test]
    fn test_version_mismatch() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "sos-system.yaml", "meta: {sos_version: 2.0.0}\n");
        let settings = settings(&dir);
        let generator = ContextGenerator::new(&settings);

        let err = generator.generate_value(&GenerateOptions::new()).unwrap_err();
        assert!(matches!(err, SosError::VersionMismatch(_)));

        let value = generator
            .generate_value(&GenerateOptions::new().ignore_version(true))
            .unwrap();
        assert_eq!(value["meta"]["sos_version"], json!("2.0.0"));
    }

    #[test]
    fn test_missing_system_is_fatal_but_local_degrades() {
        let dir = TempDir::new().unwrap();
        let settings = settings(&dir);

        assert!(load_layer(&settings, LayerFile::System, &LayerSource::Default).is_err());
        let local = load_layer(&settings, LayerFile::Local, &LayerSource::Default).unwrap();
        assert_eq!(local.config, json!({}));
        assert!(local.file.is_none());

        let root = load_layer(&settings, LayerFile::Root, &LayerSource::Default).unwrap();
        assert!(root.file.is_none());
        assert!(load_layer(&settings, LayerFile::Root, &LayerSource::path("nope.yaml")).is_err());
    }

    #[test]
    fn test_non_map_layer_rejected() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "sos-system.yaml", "- a\n- b\n");
        let settings = settings(&dir);
        let err = ContextGenerator::new(&settings)
            .generate_value(&GenerateOptions::new())
            .unwrap_err();
        assert_eq!(err.kind(), "ConfigurationError");
    }

    #[test]
    fn test_meta_file_provenance() {
        let dir = layered_dir();
        let settings = settings(&dir);
        let opts = GenerateOptions::new().with_user(LayerSource::Disabled);
        let value = ContextGenerator::new(&settings).generate_value(&opts).unwrap();

        let system = dir.path().join("sos-system.yaml");
        assert_eq!(value["meta"]["system_file"], json!(system.to_string_lossy()));
        assert_eq!(value["meta"]["user_file"], Value::Null);
        assert_eq!(
            value["meta"]["context_file"],
            json!(dir.path().join("sos-context.yaml").to_string_lossy())
        );
        assert_eq!(value["meta"]["system_path"], json!(dir.path().to_string_lossy()));
    }

    #[test]
    fn test_context_file_disabled() {
        let dir = layered_dir();
        let settings = settings(&dir);
        let opts = GenerateOptions::new().with_context_file(LayerSource::Disabled);
        let value = ContextGenerator::new(&settings).generate_value(&opts).unwrap();
        assert_eq!(value["meta"]["context_file"], json!(false));
    }

    #[test]
    fn test_variables_and_runtime_update() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "sos-system.yaml",
            "meta: {system_name: web}\nnamespace: {image: '${meta.system_name}:${namespace.tag}', tag: latest}\n",
        );
        let settings = settings(&dir);
        let opts = GenerateOptions::new().with_runtime_update("namespace.tag", "v2");
        let value = ContextGenerator::new(&settings).generate_value(&opts).unwrap();
        assert_eq!(value["namespace"]["image"], json!("web:v2"));

        let raw = ContextGenerator::new(&settings)
            .generate_value(&GenerateOptions::new().resolve_variables(false))
            .unwrap();
        assert_eq!(
            raw["namespace"]["image"],
            json!("${meta.system_name}:${namespace.tag}")
        );
    }

    #[test]
    fn test_platform_override() {
        let dir = layered_dir();
        let settings = settings(&dir);
        let opts = GenerateOptions::new().with_meta("platform", "plan9");
        let value = ContextGenerator::new(&settings).generate_value(&opts).unwrap();
        assert_eq!(value["meta"]["platform"], json!("plan9"));
    }
}
