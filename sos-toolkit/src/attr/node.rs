//! The attribute node variant.

use super::AttrMap;
use crate::errors::SosResult;
use crate::runnable::{Composite, Runnable};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A value in the attribute model.
///
/// Scalars, lists and maps come straight from configuration; `Runnable`
/// and `Composite` are the executable shapes materialized from the
/// `action`, `hook` and service trees.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Node {
    /// Explicit null.
    #[default]
    Null,
    /// Boolean scalar.
    Bool(bool),
    /// Integer scalar.
    Int(i64),
    /// Float scalar.
    Float(f64),
    /// String scalar (paths are strings too).
    Str(String),
    /// Ordered list.
    List(Vec<Node>),
    /// Named map of nodes.
    Map(AttrMap),
    /// A single tool invocation.
    Runnable(Box<Runnable>),
    /// An ordered tree of runnables.
    Composite(Box<Composite>),
}

impl Node {
    /// Creates an empty map node.
    #[must_use]
    pub fn empty_map() -> Self {
        Self::Map(AttrMap::new())
    }

    /// Returns a short name for the node's variant.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Runnable(_) => "runnable",
            Self::Composite(_) => "composite",
        }
    }

    /// Returns true for placeholders a write may fill without `overwrite`.
    #[must_use]
    pub fn is_vacant(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Map(map) => map.is_empty(),
            Self::List(items) => items.is_empty(),
            _ => false,
        }
    }

    /// Returns true for `Null`.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the string if this is a string node.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the bool if this is a bool node.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the integer if this is an int node.
    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the map if this is a map node.
    #[must_use]
    pub const fn as_map(&self) -> Option<&AttrMap> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Returns the list if this is a list node.
    #[must_use]
    pub fn as_list(&self) -> Option<&[Node]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Builds a plain node tree from a JSON value.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => n
                .as_i64()
                .map_or_else(|| Self::Float(n.as_f64().unwrap_or(f64::NAN)), Self::Int),
            Value::String(s) => Self::Str(s),
            Value::Array(items) => Self::List(items.into_iter().map(Self::from_value).collect()),
            Value::Object(map) => Self::Map(
                map.into_iter()
                    .map(|(k, v)| (k, Self::from_value(v)))
                    .collect(),
            ),
        }
    }

    /// Converts the node back into its configuration form.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(i) => Value::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f).map_or(Value::Null, Value::Number),
            Self::Str(s) => Value::String(s.clone()),
            Self::List(items) => Value::Array(items.iter().map(Self::to_value).collect()),
            Self::Map(map) => map_to_value(map),
            Self::Runnable(runnable) => map_to_value(&runnable.to_attr_map()),
            Self::Composite(composite) => map_to_value(&composite.to_attr_map()),
        }
    }

    /// Promotes raw maps into executable nodes.
    ///
    /// A map with a `tool` key becomes a [`Runnable`]; any other map becomes
    /// a [`Composite`] whose children are materialized recursively. Scalars
    /// and lists are returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if a runnable map is malformed.
    pub fn materialize(label: &str, node: Self) -> SosResult<Self> {
        match node {
            Self::Map(map) if map.contains_key("tool") => {
                Ok(Self::Runnable(Box::new(Runnable::from_attr_map(Some(label), &map)?)))
            }
            Self::Map(map) => Ok(Self::Composite(Box::new(Composite::from_attr_map(label, map)?))),
            other => Ok(other),
        }
    }
}

pub(super) fn map_to_value(map: &AttrMap) -> Value {
    Value::Object(
        map.iter()
            .map(|(k, v)| (k.to_string(), v.to_value()))
            .collect(),
    )
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Str(s) => write!(f, "{s}"),
            other => write!(f, "{}", other.to_value()),
        }
    }
}

impl From<&str> for Node {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for Node {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<bool> for Node {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Node {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Node {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<AttrMap> for Node {
    fn from(value: AttrMap) -> Self {
        Self::Map(value)
    }
}

impl From<Vec<Node>> for Node {
    fn from(value: Vec<Node>) -> Self {
        Self::List(value)
    }
}

impl From<Runnable> for Node {
    fn from(value: Runnable) -> Self {
        Self::Runnable(Box::new(value))
    }
}

impl From<Composite> for Node {
    fn from(value: Composite) -> Self {
        Self::Composite(Box::new(value))
    }
}

impl From<Value> for Node {
    fn from(value: Value) -> Self {
        Self::from_value(value)
    }
}

impl Serialize for Node {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Self::from_value)
    }
}
