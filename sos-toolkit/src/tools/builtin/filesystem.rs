//! `filesystem.*`: paths and directories, relative to the system
//! directory.

use super::output;
use crate::attr::{AttrMap, Node};
use crate::core::ToolOutput;
use crate::tools::{ParamKind, ParamSpec, PluginDescriptor, ToolCall};
use anyhow::{bail, Context as _};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const NAMESPACE: &str = "filesystem";

pub(super) fn plugins() -> Vec<PluginDescriptor> {
    vec![
        PluginDescriptor::tool(NAMESPACE, "path_join", path_join)
            .with_description("Join path segments")
            .with_param(ParamSpec::required("parts", ParamKind::List, "Path segments in order")),
        PluginDescriptor::tool(NAMESPACE, "path_exists", path_exists)
            .with_description("Check whether a path exists")
            .with_param(ParamSpec::required("target", ParamKind::Path, "Path to check")),
        PluginDescriptor::tool(NAMESPACE, "directory_exists", directory_exists)
            .with_description("Check whether a directory exists")
            .with_param(ParamSpec::required("target", ParamKind::Path, "Directory to check")),
        PluginDescriptor::tool(NAMESPACE, "directory_list", directory_list)
            .with_description("List the entries of a directory")
            .with_param(ParamSpec::required("target", ParamKind::Path, "Directory to list")),
        PluginDescriptor::tool(NAMESPACE, "directory_create", directory_create)
            .with_description("Create a directory and its parents")
            .with_param(ParamSpec::required("target", ParamKind::Path, "Directory to create"))
            .with_param(ParamSpec::optional(
                "exist_ok",
                ParamKind::Bool,
                "Accept an existing directory",
                false,
            )),
        PluginDescriptor::tool(NAMESPACE, "directory_delete", directory_delete)
            .with_description("Delete a directory tree; only acts when deletes are enabled")
            .with_param(ParamSpec::required("target", ParamKind::Path, "Directory to delete"))
            .with_param(ParamSpec::optional(
                "ignore_errors",
                ParamKind::Bool,
                "Ignore a missing directory and failed deletes",
                false,
            )),
    ]
}

fn target(call: &ToolCall<'_>) -> anyhow::Result<PathBuf> {
    let target = call.str_param("target")?;
    Ok(call.toolkit.settings().resolve(Path::new(target)))
}

fn display(path: &Path) -> Node {
    Node::Str(path.to_string_lossy().into_owned())
}

fn path_join(call: ToolCall<'_>) -> anyhow::Result<ToolOutput> {
    let parts = call.param("parts").and_then(Node::as_list).unwrap_or_default();
    let mut joined = PathBuf::new();
    for part in parts {
        match part {
            Node::Str(part) => joined.push(part),
            other => bail!("path parts must be strings, found a {}", other.kind_name()),
        }
    }
    Ok(output(display(&joined)))
}

fn path_exists(call: ToolCall<'_>) -> anyhow::Result<ToolOutput> {
    Ok(output(target(&call)?.exists()))
}

fn directory_exists(call: ToolCall<'_>) -> anyhow::Result<ToolOutput> {
    Ok(output(target(&call)?.is_dir()))
}

/// Entry names, sorted, as `{list: [...]}`.
fn directory_list(call: ToolCall<'_>) -> anyhow::Result<ToolOutput> {
    let path = target(&call)?;
    let mut names = Vec::new();
    for entry in std::fs::read_dir(&path).with_context(|| format!("cannot list {}", path.display()))? {
        names.push(entry?.file_name().to_string_lossy().into_owned());
    }
    names.sort();

    let mut map = AttrMap::new();
    map.insert("list", Node::List(names.into_iter().map(Node::Str).collect()));
    Ok(ToolOutput::Value(Node::Map(map)))
}

fn directory_create(call: ToolCall<'_>) -> anyhow::Result<ToolOutput> {
    let path = target(&call)?;
    if path.exists() && !call.bool_param("exist_ok") {
        bail!("directory already exists: {}", path.display());
    }
    std::fs::create_dir_all(&path).with_context(|| format!("cannot create {}", path.display()))?;
    info!(path = %path.display(), "directory created");
    Ok(output(display(&path)))
}

fn directory_delete(call: ToolCall<'_>) -> anyhow::Result<ToolOutput> {
    let path = target(&call)?;
    let ignore_errors = call.bool_param("ignore_errors");

    if !path.is_dir() {
        if ignore_errors {
            return Ok(output(false));
        }
        bail!("not a directory: {}", path.display());
    }

    if !call.toolkit.settings().delete_enabled {
        warn!(target: "sos::test", path = %path.display(), "delete disabled, directory kept");
        return Ok(output(false));
    }

    info!(path = %path.display(), "deleting directory");
    match std::fs::remove_dir_all(&path) {
        Ok(()) => Ok(output(true)),
        Err(err) if ignore_errors => {
            warn!(path = %path.display(), error = %err, "delete failed");
            Ok(output(false))
        }
        Err(err) => Err(err).with_context(|| format!("cannot delete {}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use crate::attr::Node;
    use crate::testing::{context_from, settings_in, Recorder};
    use crate::tools::Toolkit;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const CONFIG: &str = r"
action:
  join:
    tool: filesystem.path_join
    params: {parts: [data, models, llama]}
  exists:
    tool: filesystem.directory_exists
    params: {target: data}
  create:
    tool: filesystem.directory_create
    params: {target: data/models, exist_ok: true}
  list:
    tool: filesystem.directory_list
    params: {target: data}
  delete:
    tool: filesystem.directory_delete
    params: {target: data}
";

    fn toolkit(dir: &TempDir, delete_enabled: bool) -> Toolkit {
        Recorder::default()
            .toolkit(settings_in(dir.path()).with_delete_enabled(delete_enabled))
    }

    #[test]
    fn test_join_create_and_exists() {
        let dir = TempDir::new().unwrap();
        let toolkit = toolkit(&dir, false);
        let mut ctx = context_from(CONFIG).unwrap();

        let joined = ctx.run(&toolkit, "action.join").unwrap();
        assert_eq!(joined.get("result"), Some(Node::from("data/models/llama")));

        let exists = ctx.run(&toolkit, "action.exists").unwrap();
        assert_eq!(exists.get("result"), Some(Node::Bool(false)));

        ctx.run(&toolkit, "action.create").unwrap();
        assert!(dir.path().join("data/models").is_dir());
        let exists = ctx.run(&toolkit, "action.exists").unwrap();
        assert_eq!(exists.get("result"), Some(Node::Bool(true)));
    }

    #[test]
    fn test_list_directory_entries() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("data/models")).unwrap();
        std::fs::write(dir.path().join("data/readme.md"), "docs").unwrap();
        let toolkit = toolkit(&dir, false);
        let mut ctx = context_from(CONFIG).unwrap();

        let listed = ctx.run(&toolkit, "action.list").unwrap();
        assert_eq!(
            listed.get("list"),
            Some(Node::List(vec![Node::from("models"), Node::from("readme.md")]))
        );

        std::fs::remove_dir_all(dir.path().join("data")).unwrap();
        assert!(ctx.run(&toolkit, "action.list").is_err());
    }

    #[test]
    fn test_delete_needs_delete_flag() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("data")).unwrap();
        let mut ctx = context_from(CONFIG).unwrap();

        ctx.run(&toolkit(&dir, false), "action.delete").unwrap();
        assert!(dir.path().join("data").is_dir());

        ctx.run(&toolkit(&dir, true), "action.delete").unwrap();
        assert!(!dir.path().join("data").exists());
    }
}
