//! Declarative value extraction.
//!
//! A resolvable pulls one or more values out of a source tree, optionally
//! combines them, and writes the outcome to a target path. Runnables use
//! them for `context_map` (context into parameters) and `result_map`
//! (result data back into the context).

use crate::attr::{AttrMap, Attributes, Node};
use crate::errors::{ConfigurationError, SosResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z0-9_]+)\}"));

/// A value-extraction rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolvable {
    /// Label for diagnostics; marks list items as nested resolvables.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Path the resolved value is written to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,

    /// Source: a path string, a `{source, default}` map, or a list of items.
    pub data: Node,

    /// Fallback for a string source.
    #[serde(default, skip_serializing_if = "Node::is_null")]
    pub default: Node,

    /// Combine list items with `{name}` placeholders.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format_string: Option<String>,

    /// Combine list items as path components.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub path_join: bool,

    /// Combine list items into a list.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub to_list: bool,

    /// Keep a null lookup instead of falling back to the default.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub allow_none: bool,
}

impl Resolvable {
    /// Creates a resolvable reading `source` into `result`.
    #[must_use]
    pub fn new(source: impl Into<String>, result: impl Into<String>) -> Self {
        Self {
            label: None,
            result: Some(result.into()),
            data: Node::Str(source.into()),
            default: Node::Null,
            format_string: None,
            path_join: false,
            to_list: false,
            allow_none: false,
        }
    }

    /// Sets the default.
    #[must_use]
    pub fn with_default(mut self, default: impl Into<Node>) -> Self {
        self.default = default.into();
        self
    }

    /// Parses a resolvable from its configuration map.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` if the map is malformed.
    pub fn from_node(node: &Node) -> SosResult<Self> {
        let resolvable: Self = serde_json::from_value(node.to_value())
            .map_err(|e| ConfigurationError::new(format!("invalid resolvable: {e}")))?;
        match resolvable.data {
            Node::Str(_) | Node::Map(_) | Node::List(_) => Ok(resolvable),
            ref other => Err(ConfigurationError::new(format!(
                "resolvable data must be a path, a map or a list, found a {}",
                other.kind_name()
            ))
            .into()),
        }
    }

    /// Converts the resolvable back to its configuration map.
    #[must_use]
    pub fn to_node(&self) -> Node {
        serde_json::to_value(self).map_or(Node::Null, Node::from_value)
    }

    /// Resolves the value from `source` and writes it to `target` at
    /// `result`, overwriting whatever is there.
    ///
    /// # Errors
    ///
    /// Propagates lookup failures for sources without defaults and
    /// configuration errors for malformed items.
    pub fn resolve(
        &self,
        source: &dyn Attributes,
        target: Option<&mut dyn Attributes>,
    ) -> SosResult<Node> {
        let value = match &self.data {
            Node::Str(path) => {
                if self.default.is_null() {
                    source.get(path)?
                } else {
                    self.lookup(source, path, &self.default)
                }
            }
            Node::Map(entry) => match (entry.child("source"), entry.child("default")) {
                (None | Some(Node::Null), None | Some(Node::Null)) => {
                    return Err(self.config_error("no source or default provided"));
                }
                (None | Some(Node::Null), Some(default)) => default.clone(),
                (Some(source_path), default) => {
                    let source_path = self.source_path(source_path)?;
                    match default {
                        Some(default) if !default.is_null() => {
                            self.lookup(source, source_path, default)
                        }
                        _ => source.get(source_path)?,
                    }
                }
            },
            Node::List(items) => self.resolve_items(source, items)?,
            other => {
                return Err(self.config_error(&format!("invalid source type {}", other.kind_name())));
            }
        };

        if let (Some(result), Some(target)) = (&self.result, target) {
            target.set(result, value.clone(), true)?;
        }
        Ok(value)
    }

    fn resolve_items(&self, source: &dyn Attributes, items: &[Node]) -> SosResult<Node> {
        let mut objects = AttrMap::new();

        for (n, item) in items.iter().enumerate() {
            let Node::Map(entry) = item else {
                return Err(self.config_error(&format!("item {n} is a {}", item.kind_name())));
            };
            let index_key = n.to_string();
            let target_key = |key: &str| {
                entry
                    .child(key)
                    .and_then(Node::as_str)
                    .map_or_else(|| index_key.clone(), str::to_string)
            };

            let (key, value) = if entry.contains_key("label") {
                let mut nested = Self::from_node(item)?;
                nested.result = None;
                (target_key("result"), nested.resolve(source, None)?)
            } else {
                let default = entry.child("default").cloned().unwrap_or_default();
                match entry.child("source") {
                    None | Some(Node::Null) => (target_key("target"), default),
                    Some(source_path) => {
                        let source_path = self.source_path(source_path)?;
                        let value = if default.is_null() {
                            source.get(source_path)?
                        } else {
                            self.lookup(source, source_path, &default)
                        };
                        (target_key("target"), value)
                    }
                }
            };
            objects.insert(key, value);
        }

        if self.path_join {
            let joined: PathBuf = objects.iter().map(|(_, v)| v.to_string()).collect();
            Ok(Node::Str(joined.to_string_lossy().into_owned()))
        } else if let Some(template) = &self.format_string {
            Ok(Node::Str(format_placeholders(template, &objects)?))
        } else if self.to_list {
            Ok(Node::List(objects.into_iter().map(|(_, v)| v).collect()))
        } else {
            Ok(Node::Map(objects))
        }
    }

    /// Reads `path`, falling back to `default` when it is unset or null.
    fn lookup(&self, source: &dyn Attributes, path: &str, default: &Node) -> Node {
        let value = source.get_or(path, default.clone());
        if value.is_null() && !self.allow_none {
            default.clone()
        } else {
            value
        }
    }

    fn source_path<'a>(&self, node: &'a Node) -> SosResult<&'a str> {
        node.as_str()
            .ok_or_else(|| self.config_error("source must be a path string"))
    }

    fn config_error(&self, message: &str) -> crate::errors::SosError {
        ConfigurationError::new(format!(
            "{message} (resolvable: {})",
            self.label.as_deref().unwrap_or("unlabelled")
        ))
        .into()
    }
}

/// Substitutes `{name}` placeholders from `values`.
///
/// # Errors
///
/// Returns `ConfigurationError` for placeholders with no value.
pub fn format_placeholders(template: &str, values: &AttrMap) -> SosResult<String> {
    let pattern = PLACEHOLDER
        .as_ref()
        .map_err(|e| ConfigurationError::new(e.to_string()))?;

    let mut out = String::with_capacity(template.len());
    let mut last = 0;
    for caps in pattern.captures_iter(template) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let value = values.child(name.as_str()).ok_or_else(|| {
            ConfigurationError::new(format!("format string '{template}' has no value for '{}'", name.as_str()))
        })?;
        out.push_str(&template[last..whole.start()]);
        out.push_str(&value.to_string());
        last = whole.end();
    }
    out.push_str(&template[last..]);
    Ok(out)
}

/// Parses a `context_map`/`result_map` field.
pub(crate) fn resolvables_from_node(field: &str, node: Option<&Node>) -> SosResult<Vec<Resolvable>> {
    match node {
        None | Some(Node::Null) => Ok(Vec::new()),
        Some(Node::List(items)) => items.iter().map(Resolvable::from_node).collect(),
        Some(map @ Node::Map(_)) => Ok(vec![Resolvable::from_node(map)?]),
        Some(other) => Err(ConfigurationError::new(format!(
            "{field} must be a list, found a {}",
            other.kind_name()
        ))
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn source() -> AttrMap {
        match Node::from_value(json!({
            "meta": {"system_path": "/srv/app", "profile": "dev", "missing_value": null},
            "namespace": {"image": "ollama", "tag": "latest"}
        })) {
            Node::Map(map) => map,
            _ => unreachable!(),
        }
    }

    fn resolvable(value: serde_json::Value) -> Resolvable {
        Resolvable::from_node(&Node::from_value(value)).unwrap()
    }

    #[test]
    fn test_string_source_writes_result() {
        let mut params = AttrMap::new();
        let r = Resolvable::new("meta.profile", "profile");
        let value = r.resolve(&source(), Some(&mut params)).unwrap();

        assert_eq!(value, Node::from("dev"));
        assert_eq!(params.get("profile").unwrap(), Node::from("dev"));
    }

    #[test]
    fn test_string_source_missing_without_default_fails() {
        let r = Resolvable::new("meta.nope", "x");
        assert!(r.resolve(&source(), None).unwrap_err().is_lookup());
    }

    #[test]
    fn test_default_replaces_null_unless_allowed() {
        let r = Resolvable::new("meta.missing_value", "x").with_default("fallback");
        assert_eq!(r.resolve(&source(), None).unwrap(), Node::from("fallback"));

        let mut r = Resolvable::new("meta.missing_value", "x").with_default("fallback");
        r.allow_none = true;
        assert_eq!(r.resolve(&source(), None).unwrap(), Node::Null);
    }

    #[test]
    fn test_map_source() {
        let r = resolvable(json!({"data": {"source": "namespace.image"}}));
        assert_eq!(r.resolve(&source(), None).unwrap(), Node::from("ollama"));

        let r = resolvable(json!({"data": {"default": 7}}));
        assert_eq!(r.resolve(&source(), None).unwrap(), Node::Int(7));

        let r = resolvable(json!({"data": {}}));
        assert_eq!(r.resolve(&source(), None).unwrap_err().kind(), "ConfigurationError");
    }

    #[test]
    fn test_path_join_items() {
        let r = resolvable(json!({
            "data": [
                {"source": "meta.system_path"},
                {"default": "models"},
                {"source": "namespace.image"}
            ],
            "path_join": true
        }));
        assert_eq!(r.resolve(&source(), None).unwrap(), Node::from("/srv/app/models/ollama"));
    }

    #[test]
    fn test_format_string_items() {
        let r = resolvable(json!({
            "data": [
                {"source": "namespace.image", "target": "image"},
                {"source": "namespace.tag", "target": "tag"}
            ],
            "format_string": "{image}:{tag}"
        }));
        assert_eq!(r.resolve(&source(), None).unwrap(), Node::from("ollama:latest"));
    }

    #[test]
    fn test_to_list_and_map_items() {
        let r = resolvable(json!({
            "data": [{"source": "meta.profile"}, {"source": "nope", "default": "d"}],
            "to_list": true
        }));
        assert_eq!(
            r.resolve(&source(), None).unwrap(),
            Node::List(vec!["dev".into(), "d".into()])
        );

        let r = resolvable(json!({"data": [{"source": "meta.profile", "target": "p"}]}));
        let value = r.resolve(&source(), None).unwrap();
        assert_eq!(value.get("p").unwrap(), Node::from("dev"));
    }

    #[test]
    fn test_nested_resolvable_item() {
        let r = resolvable(json!({
            "data": [
                {"label": "inner", "result": "image", "data": "namespace.image"},
                {"default": "x", "target": "suffix"}
            ],
            "format_string": "{image}-{suffix}"
        }));
        assert_eq!(r.resolve(&source(), None).unwrap(), Node::from("ollama-x"));
    }

    #[test]
    fn test_format_placeholders_missing_value() {
        let values = AttrMap::new();
        assert!(format_placeholders("{nope}", &values).is_err());
        assert_eq!(format_placeholders("plain", &values).unwrap(), "plain");
    }
}
