//! Parameter schemas attached to tools at registration time.

use crate::attr::{validate_key, AttrMap, Node};
use crate::errors::{ConfigurationError, SosResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Type tag of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    /// A string.
    String,
    /// A boolean.
    Bool,
    /// An integer.
    Int,
    /// A float; integers are accepted and widened.
    Float,
    /// A list.
    List,
    /// A map.
    Map,
    /// A filesystem path, carried as a string.
    Path,
    /// Anything.
    #[default]
    Any,
}

impl ParamKind {
    /// Returns true if `node` is a valid value of this kind.
    #[must_use]
    pub const fn accepts(self, node: &Node) -> bool {
        matches!(
            (self, node),
            (Self::Any, _)
                | (Self::String | Self::Path, Node::Str(_))
                | (Self::Bool, Node::Bool(_))
                | (Self::Int, Node::Int(_))
                | (Self::Float, Node::Float(_) | Node::Int(_))
                | (Self::List, Node::List(_))
                | (Self::Map, Node::Map(_))
        )
    }

    /// Returns the tag name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::List => "list",
            Self::Map => "map",
            Self::Path => "path",
            Self::Any => "any",
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One declared parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    /// Parameter name.
    pub name: String,
    /// Help text; must not be empty.
    pub description: String,
    /// Type tag.
    pub kind: ParamKind,
    /// Default value. `None` makes the parameter required.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Node>,
}

impl ParamSpec {
    /// Creates a required parameter.
    #[must_use]
    pub fn required(name: impl Into<String>, kind: ParamKind, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            kind,
            default: None,
        }
    }

    /// Creates an optional parameter with a default.
    #[must_use]
    pub fn optional(
        name: impl Into<String>,
        kind: ParamKind,
        description: impl Into<String>,
        default: impl Into<Node>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            kind,
            default: Some(default.into()),
        }
    }

    /// Returns true if the parameter has no default.
    #[must_use]
    pub const fn is_required(&self) -> bool {
        self.default.is_none()
    }
}

/// The declared interface of a tool.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Keyword parameters in declaration order.
    pub params: Vec<ParamSpec>,
    /// The tool is invoked bound to the live context.
    pub binds_context: bool,
    /// The tool needs the previous step's result.
    pub binds_result: bool,
}

impl ToolSchema {
    /// Creates a schema from parameter specs.
    #[must_use]
    pub fn new(params: Vec<ParamSpec>) -> Self {
        Self {
            params,
            binds_context: false,
            binds_result: false,
        }
    }

    /// Gets a parameter spec by name.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Checks the schema itself at registration time.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` for undocumented or duplicate
    /// parameters, and for defaults that do not match their kind.
    pub fn check(&self, tool: &str) -> SosResult<()> {
        for (n, spec) in self.params.iter().enumerate() {
            validate_key(&spec.name)?;
            if spec.description.trim().is_empty() {
                return Err(ConfigurationError::new(format!(
                    "tool '{tool}': parameter '{}' has no description",
                    spec.name
                ))
                .into());
            }
            if self.params[..n].iter().any(|p| p.name == spec.name) {
                return Err(ConfigurationError::new(format!(
                    "tool '{tool}': parameter '{}' is declared twice",
                    spec.name
                ))
                .into());
            }
            if let Some(default) = &spec.default {
                if !default.is_null() && !spec.kind.accepts(default) {
                    return Err(ConfigurationError::new(format!(
                        "tool '{tool}': default of '{}' is a {}, expected {}",
                        spec.name,
                        default.kind_name(),
                        spec.kind
                    ))
                    .into());
                }
            }
        }
        Ok(())
    }

    /// Validates call parameters and fills in defaults.
    ///
    /// A null value counts as absent. The returned map follows the
    /// declaration order of the schema.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` for unknown parameters, missing
    /// required parameters and kind mismatches.
    #[allow(clippy::cast_precision_loss)]
    pub fn validate(&self, tool: &str, params: &AttrMap) -> SosResult<AttrMap> {
        if let Some(unknown) = params.keys().find(|key| self.param(key).is_none()) {
            return Err(ConfigurationError::new(format!(
                "tool '{tool}' got an unexpected parameter '{unknown}'"
            ))
            .into());
        }

        let mut validated = AttrMap::new();
        for spec in &self.params {
            let value = match params.child(&spec.name) {
                Some(value) if !value.is_null() => {
                    if !spec.kind.accepts(value) {
                        return Err(ConfigurationError::new(format!(
                            "tool '{tool}': parameter '{}' must be {}, found a {}",
                            spec.name,
                            spec.kind,
                            value.kind_name()
                        ))
                        .into());
                    }
                    match (spec.kind, value) {
                        (ParamKind::Float, Node::Int(i)) => Node::Float(*i as f64),
                        _ => value.clone(),
                    }
                }
                _ => match &spec.default {
                    Some(default) => default.clone(),
                    None => {
                        return Err(ConfigurationError::new(format!(
                            "tool '{tool}' is missing required parameter '{}'",
                            spec.name
                        ))
                        .into())
                    }
                },
            };
            validated.insert(spec.name.clone(), value);
        }
        Ok(validated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> ToolSchema {
        ToolSchema::new(vec![
            ParamSpec::required("target", ParamKind::String, "Context path"),
            ParamSpec::optional("overwrite", ParamKind::Bool, "Replace existing values", false),
            ParamSpec::optional("ratio", ParamKind::Float, "A ratio", Node::Null),
        ])
    }

    fn params(entries: &[(&str, Node)]) -> AttrMap {
        entries.iter().map(|(k, v)| ((*k).to_string(), v.clone())).collect()
    }

    #[test]
    fn test_validate_fills_defaults() {
        let validated = schema()
            .validate("context.ctx_set", &params(&[("target", "a.b".into())]))
            .unwrap();

        assert_eq!(validated.child("overwrite"), Some(&Node::Bool(false)));
        assert_eq!(validated.child("ratio"), Some(&Node::Null));
        assert_eq!(validated.keys().collect::<Vec<_>>(), vec!["target", "overwrite", "ratio"]);
    }

    #[test]
    fn test_validate_missing_required() {
        let err = schema().validate("t.t", &AttrMap::new()).unwrap_err();
        assert_eq!(err.kind(), "ConfigurationError");
        assert!(err.to_string().contains("target"));
    }

    #[test]
    fn test_validate_null_counts_as_absent() {
        let err = schema()
            .validate("t.t", &params(&[("target", Node::Null)]))
            .unwrap_err();
        assert!(err.to_string().contains("missing required"));
    }

    #[test]
    fn test_validate_kind_mismatch_and_unknown() {
        let err = schema()
            .validate("t.t", &params(&[("target", Node::Int(3))]))
            .unwrap_err();
        assert!(err.to_string().contains("must be string"));

        let err = schema()
            .validate("t.t", &params(&[("target", "x".into()), ("bogus", Node::Bool(true))]))
            .unwrap_err();
        assert!(err.to_string().contains("bogus"));
    }

    #[test]
    fn test_validate_widens_int_to_float() {
        let validated = schema()
            .validate("t.t", &params(&[("target", "x".into()), ("ratio", Node::Int(2))]))
            .unwrap();
        assert_eq!(validated.child("ratio"), Some(&Node::Float(2.0)));
    }

    #[test]
    fn test_check_rejects_undocumented_and_duplicates() {
        let undocumented = ToolSchema::new(vec![ParamSpec::required("x", ParamKind::Any, " ")]);
        assert!(undocumented.check("t.t").is_err());

        let duplicate = ToolSchema::new(vec![
            ParamSpec::required("x", ParamKind::Any, "first"),
            ParamSpec::required("x", ParamKind::Any, "second"),
        ]);
        assert!(duplicate.check("t.t").is_err());

        let bad_default = ToolSchema::new(vec![ParamSpec::optional("x", ParamKind::Bool, "flag", "yes")]);
        assert!(bad_default.check("t.t").is_err());

        assert!(schema().check("t.t").is_ok());
    }
}
