//! Declarative boolean gates evaluated against a context.

use crate::attr::{Attributes, Node};
use crate::errors::{ConditionFailedError, ConfigurationError, SosResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a condition compares the context value with its valid values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Comparison {
    /// Membership in the valid list.
    #[default]
    #[serde(rename = "in")]
    In,
    /// Equality with the valid value.
    #[serde(rename = "equal")]
    Equal,
    /// Reserved.
    #[serde(rename = "range")]
    Range,
    /// Reserved.
    #[serde(rename = "=")]
    Eq,
    /// Reserved.
    #[serde(rename = "<")]
    Lt,
    /// Reserved.
    #[serde(rename = ">")]
    Gt,
    /// Reserved.
    #[serde(rename = ">=")]
    Ge,
    /// Reserved.
    #[serde(rename = "<=")]
    Le,
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::In => "in",
            Self::Equal => "equal",
            Self::Range => "range",
            Self::Eq => "=",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Le => "<=",
        };
        write!(f, "{name}")
    }
}

/// A gate on a runnable.
///
/// `context_value` and `result` are filled in by [`Condition::evaluate`];
/// the engine evaluates a copy so the declared condition stays clean.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Label for diagnostics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Context path to read.
    pub ctx_key: String,

    /// Valid value(s): null, a scalar, or a list.
    #[serde(default)]
    pub valid: Node,

    /// Comparison kind.
    #[serde(default)]
    pub comparison: Comparison,

    /// Fail the invocation instead of skipping.
    #[serde(default)]
    pub raise_exc: bool,

    /// Invert the outcome.
    #[serde(default)]
    pub is_inverse: bool,

    /// The value read during the last evaluation.
    #[serde(default, skip_serializing_if = "Node::is_null")]
    pub context_value: Node,

    /// The raw comparison outcome of the last evaluation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<bool>,
}

impl Condition {
    /// Creates a membership condition on `ctx_key`.
    #[must_use]
    pub fn new(ctx_key: impl Into<String>, valid: impl Into<Node>) -> Self {
        Self {
            label: None,
            ctx_key: ctx_key.into(),
            valid: valid.into(),
            comparison: Comparison::In,
            raise_exc: false,
            is_inverse: false,
            context_value: Node::Null,
            result: None,
        }
    }

    /// Inverts the outcome.
    #[must_use]
    pub const fn inverse(mut self) -> Self {
        self.is_inverse = true;
        self
    }

    /// Fails instead of skipping.
    #[must_use]
    pub const fn raising(mut self) -> Self {
        self.raise_exc = true;
        self
    }

    /// Parses a condition from its configuration map.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` for malformed fields or unknown
    /// comparison kinds.
    pub fn from_node(node: &Node) -> SosResult<Self> {
        serde_json::from_value(node.to_value())
            .map_err(|e| ConfigurationError::new(format!("invalid condition: {e}")).into())
    }

    /// Converts the condition back to its configuration map.
    #[must_use]
    pub fn to_node(&self) -> Node {
        serde_json::to_value(self).map_or(Node::Null, Node::from_value)
    }

    /// Evaluates the condition against `source`.
    ///
    /// When `valid` is null or contains null, a missing or null value
    /// passes and a present value must be listed. Otherwise the value must
    /// be a member of the list or equal the scalar.
    ///
    /// # Errors
    ///
    /// Returns `ConditionFailedError` when the outcome is false and
    /// `raise_exc` is set, or `ConfigurationError` for reserved comparisons.
    pub fn evaluate(&mut self, source: &dyn Attributes) -> SosResult<bool> {
        if !matches!(self.comparison, Comparison::In | Comparison::Equal) {
            return Err(ConfigurationError::new(format!(
                "comparison '{}' is not implemented",
                self.comparison
            ))
            .into());
        }

        let value = source.get_or(&self.ctx_key, Node::Null);
        let raw = match &self.valid {
            Node::Null => value.is_null(),
            Node::List(items) if items.contains(&Node::Null) => {
                value.is_null() || items.contains(&value)
            }
            Node::List(items) => items.contains(&value),
            other => &value == other,
        };

        self.context_value = value;
        self.result = Some(raw);

        let passed = raw != self.is_inverse;
        if !passed && self.raise_exc {
            return Err(ConditionFailedError::new(
                self.label.clone(),
                &self.ctx_key,
                self.context_value.to_string(),
            )
            .into());
        }
        Ok(passed)
    }
}

/// Parses the `condition` field of a runnable: one map or a list of maps.
pub(crate) fn conditions_from_node(node: Option<&Node>) -> SosResult<Vec<Condition>> {
    match node {
        None | Some(Node::Null) => Ok(Vec::new()),
        Some(map @ Node::Map(_)) => Ok(vec![Condition::from_node(map)?]),
        Some(Node::List(items)) => items.iter().map(Condition::from_node).collect(),
        Some(other) => Err(ConfigurationError::new(format!(
            "condition must be a map or a list, found a {}",
            other.kind_name()
        ))
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attr::AttrMap;

    fn source() -> AttrMap {
        let mut map = AttrMap::new();
        map.set("meta.profile", Node::from("dev"), false).unwrap();
        map.set("meta.empty", Node::Null, false).unwrap();
        map
    }

    #[test]
    fn test_membership() {
        let mut cond = Condition::new("meta.profile", Node::List(vec!["dev".into(), "prod".into()]));
        assert!(cond.evaluate(&source()).unwrap());
        assert_eq!(cond.context_value, Node::from("dev"));
        assert_eq!(cond.result, Some(true));

        let mut cond = Condition::new("meta.profile", Node::List(vec!["prod".into()]));
        assert!(!cond.evaluate(&source()).unwrap());
    }

    #[test]
    fn test_equality_with_scalar() {
        let mut cond = Condition::new("meta.profile", "dev");
        cond.comparison = Comparison::Equal;
        assert!(cond.evaluate(&source()).unwrap());
    }

    #[test]
    fn test_null_valid_passes_only_when_unset() {
        let mut cond = Condition::new("meta.missing", Node::Null);
        assert!(cond.evaluate(&source()).unwrap());

        let mut cond = Condition::new("meta.empty", Node::Null);
        assert!(cond.evaluate(&source()).unwrap());

        let mut cond = Condition::new("meta.profile", Node::Null);
        assert!(!cond.evaluate(&source()).unwrap());
    }

    #[test]
    fn test_list_with_null_accepts_unset_or_listed() {
        let valid = Node::List(vec![Node::Null, "dev".into()]);
        assert!(Condition::new("meta.missing", valid.clone()).evaluate(&source()).unwrap());
        assert!(Condition::new("meta.profile", valid).evaluate(&source()).unwrap());

        let valid = Node::List(vec![Node::Null, "prod".into()]);
        assert!(!Condition::new("meta.profile", valid).evaluate(&source()).unwrap());
    }

    #[test]
    fn test_inverse() {
        let mut cond = Condition::new("meta.profile", "dev").inverse();
        assert!(!cond.evaluate(&source()).unwrap());

        let mut cond = Condition::new("meta.profile", "prod").inverse();
        assert!(cond.evaluate(&source()).unwrap());
    }

    #[test]
    fn test_raise_on_failure() {
        let mut cond = Condition::new("meta.profile", "prod").raising();
        let err = cond.evaluate(&source()).unwrap_err();
        assert_eq!(err.kind(), "ConditionFailedError");
    }

    #[test]
    fn test_reserved_comparison_is_configuration_error() {
        let mut cond = Condition::new("meta.profile", "dev");
        cond.comparison = Comparison::Ge;
        assert_eq!(cond.evaluate(&source()).unwrap_err().kind(), "ConfigurationError");
    }

    #[test]
    fn test_from_node() {
        let node = Node::from_value(serde_json::json!({
            "ctx_key": "meta.profile",
            "valid": ["dev"],
            "comparison": "in",
            "is_inverse": true
        }));
        let cond = Condition::from_node(&node).unwrap();
        assert!(cond.is_inverse);
        assert!(!cond.raise_exc);

        let bad = Node::from_value(serde_json::json!({"ctx_key": "a", "comparison": "~"}));
        assert!(Condition::from_node(&bad).is_err());
    }
}
