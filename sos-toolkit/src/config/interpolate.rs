//! `${...}` variable interpolation over merged configuration trees.
//!
//! Two reference forms are understood:
//! - `${a.b[0].c}` reads another key of the same tree
//! - `${oc.env:VAR}` or `${oc.env:VAR,default}` reads the environment
//!
//! A string that is exactly one reference takes the referenced value,
//! type included. Otherwise each reference is spliced in as text.

use super::merge::lookup_path;
use crate::errors::{ConfigurationError, SosResult};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static REFERENCE: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"\$\{([^${}]+)\}"));

const ENV_PREFIX: &str = "oc.env:";
const MAX_PASSES: usize = 32;

fn reference_regex() -> SosResult<&'static Regex> {
    REFERENCE
        .as_ref()
        .map_err(|e| ConfigurationError::new(e.to_string()).into())
}

/// Resolves every reference in `root` in place.
///
/// References may point at values that contain references themselves;
/// passes repeat until nothing changes.
///
/// # Errors
///
/// Returns `ConfigurationError` for unknown keys, unset variables without
/// a default, maps spliced into text, and circular references.
pub fn resolve_tree(root: &mut Value, env: &dyn Fn(&str) -> Option<String>) -> SosResult<()> {
    for _ in 0..MAX_PASSES {
        let snapshot = root.clone();
        if !resolve_node(root, &snapshot, env)? {
            return Ok(());
        }
    }
    Err(ConfigurationError::new("interpolation does not converge; references are circular").into())
}

fn resolve_node(
    node: &mut Value,
    root: &Value,
    env: &dyn Fn(&str) -> Option<String>,
) -> SosResult<bool> {
    match node {
        Value::String(text) => match interpolate_str(text, root, env)? {
            Some(value) => {
                *node = value;
                Ok(true)
            }
            None => Ok(false),
        },
        Value::Array(items) => {
            let mut changed = false;
            for item in items {
                changed |= resolve_node(item, root, env)?;
            }
            Ok(changed)
        }
        Value::Object(map) => {
            let mut changed = false;
            for (_, value) in map.iter_mut() {
                changed |= resolve_node(value, root, env)?;
            }
            Ok(changed)
        }
        _ => Ok(false),
    }
}

/// Interpolates one string against `root`.
///
/// Returns `None` when the string holds no reference.
///
/// # Errors
///
/// See [`resolve_tree`].
pub fn interpolate_str(
    text: &str,
    root: &Value,
    env: &dyn Fn(&str) -> Option<String>,
) -> SosResult<Option<Value>> {
    let regex = reference_regex()?;

    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    let mut found = false;

    for caps in regex.captures_iter(text) {
        let (Some(whole), Some(expr)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        found = true;
        let value = reference(expr.as_str(), root, env)?;

        if whole.start() == 0 && whole.end() == text.len() {
            return Ok(Some(value));
        }
        out.push_str(&text[last..whole.start()]);
        out.push_str(&splice_text(expr.as_str(), &value)?);
        last = whole.end();
    }

    if !found {
        return Ok(None);
    }
    out.push_str(&text[last..]);
    Ok(Some(Value::String(out)))
}

fn reference(expr: &str, root: &Value, env: &dyn Fn(&str) -> Option<String>) -> SosResult<Value> {
    let expr = expr.trim();
    if let Some(rest) = expr.strip_prefix(ENV_PREFIX) {
        let (var, default) = match rest.split_once(',') {
            Some((var, default)) => (var.trim(), Some(default.trim())),
            None => (rest.trim(), None),
        };
        return env(var)
            .or_else(|| default.map(str::to_string))
            .map(Value::String)
            .ok_or_else(|| {
                ConfigurationError::new(format!("environment variable '{var}' is not set")).into()
            });
    }

    lookup_path(root, expr)
        .cloned()
        .ok_or_else(|| ConfigurationError::new(format!("interpolation key '{expr}' not found")).into())
}

fn splice_text(expr: &str, value: &Value) -> SosResult<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok("null".to_string()),
        Value::Array(_) | Value::Object(_) => Err(ConfigurationError::new(format!(
            "interpolation key '{expr}' is not a scalar and cannot be spliced into text"
        ))
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_full_reference_keeps_type() {
        let mut root = json!({"meta": {"port": 8080}, "namespace": {"port": "${meta.port}"}});
        resolve_tree(&mut root, &no_env).unwrap();
        assert_eq!(root["namespace"]["port"], json!(8080));
    }

    #[test]
    fn test_splice_and_chains() {
        let mut root = json!({
            "meta": {"system_path": "/srv/app", "name": "demo"},
            "namespace": {
                "data": "${meta.system_path}/data",
                "models": "${namespace.data}/models",
                "label": "${meta.name}-${meta.name}"
            }
        });
        resolve_tree(&mut root, &no_env).unwrap();

        assert_eq!(root["namespace"]["models"], json!("/srv/app/data/models"));
        assert_eq!(root["namespace"]["label"], json!("demo-demo"));
    }

    #[test]
    fn test_env_references() {
        let env = |var: &str| (var == "HOME").then(|| "/home/sos".to_string());
        let mut root = json!({
            "a": "${oc.env:HOME}/cache",
            "b": "${oc.env:MISSING,fallback}"
        });
        resolve_tree(&mut root, &env).unwrap();
        assert_eq!(root, json!({"a": "/home/sos/cache", "b": "fallback"}));

        let mut root = json!({"c": "${oc.env:MISSING}"});
        assert!(resolve_tree(&mut root, &env).is_err());
    }

    #[test]
    fn test_unresolvable_and_circular() {
        let mut root = json!({"a": "${nope.key}"});
        assert_eq!(resolve_tree(&mut root, &no_env).unwrap_err().kind(), "ConfigurationError");

        let mut root = json!({"a": "${b}", "b": "${a}"});
        assert!(resolve_tree(&mut root, &no_env).is_err());

        let mut root = json!({"m": {"x": 1}, "s": "prefix ${m}"});
        assert!(resolve_tree(&mut root, &no_env).is_err());
    }

    #[test]
    fn test_plain_strings_untouched() {
        assert_eq!(interpolate_str("no refs $ here {}", &json!({}), &no_env).unwrap(), None);
    }
}
