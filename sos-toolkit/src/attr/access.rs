//! Dotted-path resolution over attribute maps.

use super::path::{check_list_growth, parse_path, PathSegment};
use super::{AttrMap, Node};
use crate::errors::{
    ConflictError, InvalidPathError, LookupError, ProtectionError, SosError, SosResult,
};
use crate::runnable::{Composite, Runnable};

/// How a write treats an occupied key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteMode {
    /// Replace an existing non-vacant value.
    pub overwrite: bool,
    /// Also replace locked maps.
    pub force: bool,
}

impl WriteMode {
    /// Fails on occupied keys.
    pub const STRICT: Self = Self {
        overwrite: false,
        force: false,
    };
    /// Replaces occupied keys, except locked maps.
    pub const OVERWRITE: Self = Self {
        overwrite: true,
        force: false,
    };
    /// Replaces anything.
    pub const FORCE: Self = Self {
        overwrite: true,
        force: true,
    };

    /// Picks strict or overwrite from a flag.
    #[must_use]
    pub const fn from_overwrite(overwrite: bool) -> Self {
        if overwrite {
            Self::OVERWRITE
        } else {
            Self::STRICT
        }
    }
}

/// Dotted-path access to a tree of attribute nodes.
pub trait Attributes {
    /// Resolves `path` to a copy of the node stored there.
    ///
    /// # Errors
    ///
    /// Returns `LookupError` if the path is not set, or another error if the
    /// path is malformed or steps through a scalar.
    fn get(&self, path: &str) -> SosResult<Node>;

    /// Writes `value` at `path`, creating intermediate maps and list slots.
    ///
    /// # Errors
    ///
    /// Returns `ConflictError` if the key is occupied and the mode forbids
    /// replacing it.
    fn set_with(&mut self, path: &str, value: Node, mode: WriteMode) -> SosResult<()>;

    /// Removes the node at `path`, returning it if it existed.
    ///
    /// Only the last segment is optional: a missing leaf key or list index
    /// yields `Ok(None)`, while a missing parent is a `LookupError`, the
    /// same as [`Attributes::get`] on that parent.
    ///
    /// # Errors
    ///
    /// Returns `ProtectionError` for preserved nodes and `LookupError` for
    /// a missing parent.
    fn remove(&mut self, path: &str) -> SosResult<Option<Node>>;

    /// Writes `value` at `path`.
    ///
    /// # Errors
    ///
    /// See [`Attributes::set_with`].
    fn set(&mut self, path: &str, value: Node, overwrite: bool) -> SosResult<()> {
        self.set_with(path, value, WriteMode::from_overwrite(overwrite))
    }

    /// Resolves `path`, returning `default` on any failure.
    ///
    /// Every error is swallowed here, not only missing paths; use
    /// [`Attributes::get_opt`] to see malformed paths.
    fn get_or(&self, path: &str, default: Node) -> Node {
        self.get(path).unwrap_or(default)
    }

    /// Resolves `path`, mapping only a missing path to `None`.
    ///
    /// # Errors
    ///
    /// Propagates every error other than `LookupError`.
    fn get_opt(&self, path: &str) -> SosResult<Option<Node>> {
        match self.get(path) {
            Ok(node) => Ok(Some(node)),
            Err(err) if err.is_lookup() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Returns true if `path` resolves.
    fn has(&self, path: &str) -> bool {
        self.get(path).is_ok()
    }
}

impl Attributes for AttrMap {
    fn get(&self, path: &str) -> SosResult<Node> {
        let segments = parse_path(path)?;
        get_in(self, &segments, path)
    }

    fn set_with(&mut self, path: &str, value: Node, mode: WriteMode) -> SosResult<()> {
        let segments = parse_path(path)?;
        set_in(self, &segments, value, mode, path)
    }

    fn remove(&mut self, path: &str) -> SosResult<Option<Node>> {
        let segments = parse_path(path)?;
        remove_in(self, &segments, path)
    }
}

impl Attributes for Node {
    fn get(&self, path: &str) -> SosResult<Node> {
        match self {
            Self::Map(map) => Attributes::get(map, path),
            Self::Runnable(_) | Self::Composite(_) => {
                let segments = parse_path(path)?;
                get_in(&executable_map(self).unwrap_or_default(), &segments, path)
            }
            Self::Null => Err(LookupError::new(path).into()),
            other => Err(step_error(path, other)),
        }
    }

    fn set_with(&mut self, path: &str, value: Node, mode: WriteMode) -> SosResult<()> {
        if self.is_null() {
            *self = Self::empty_map();
        }
        match self {
            Self::Map(map) => map.set_with(path, value, mode),
            Self::Runnable(_) | Self::Composite(_) => {
                let segments = parse_path(path)?;
                with_executable(self, |map| set_in(map, &segments, value, mode, path))
            }
            other => Err(step_error(path, other)),
        }
    }

    fn remove(&mut self, path: &str) -> SosResult<Option<Node>> {
        match self {
            Self::Map(map) => Attributes::remove(map, path),
            Self::Runnable(_) | Self::Composite(_) => {
                let segments = parse_path(path)?;
                with_executable(self, |map| remove_in(map, &segments, path))
            }
            Self::Null => Ok(None),
            other => Err(step_error(path, other)),
        }
    }
}

fn step_error(path: &str, node: &Node) -> SosError {
    InvalidPathError::new(path, format!("cannot step into a {} value", node.kind_name())).into()
}

fn executable_map(node: &Node) -> Option<AttrMap> {
    match node {
        Node::Runnable(runnable) => Some(runnable.to_attr_map()),
        Node::Composite(composite) => Some(composite.to_attr_map()),
        _ => None,
    }
}

/// Edits a runnable or composite through its configuration map, then
/// rebuilds it.
fn with_executable<R>(
    node: &mut Node,
    edit: impl FnOnce(&mut AttrMap) -> SosResult<R>,
) -> SosResult<R> {
    let Some(mut map) = executable_map(node) else {
        return Err(step_error("", node));
    };
    let out = edit(&mut map)?;
    *node = match node {
        Node::Runnable(runnable) => {
            Node::Runnable(Box::new(Runnable::from_attr_map(runnable.label.as_deref(), &map)?))
        }
        Node::Composite(composite) => {
            let label = composite.label.clone();
            Node::Composite(Box::new(Composite::from_attr_map(&label, map)?))
        }
        _ => return Err(step_error("", node)),
    };
    Ok(out)
}

/// Resolves `segments` inside `map`.
pub(crate) fn get_in(map: &AttrMap, segments: &[PathSegment], path: &str) -> SosResult<Node> {
    let Some((segment, rest)) = segments.split_first() else {
        return Err(InvalidPathError::new(path, "empty path").into());
    };

    let node = map.child(&segment.key).ok_or_else(|| LookupError::new(path))?;
    let node = match segment.index {
        Some(index) => match node {
            Node::List(items) => items.get(index).ok_or_else(|| LookupError::new(path))?,
            Node::Null => return Err(LookupError::new(path).into()),
            other => {
                return Err(InvalidPathError::new(
                    path,
                    format!("'{}' is a {}, not a list", segment.key, other.kind_name()),
                )
                .into())
            }
        },
        None => node,
    };

    if rest.is_empty() {
        return Ok(node.clone());
    }

    match node {
        Node::Map(inner) => get_in(inner, rest, path),
        Node::Runnable(_) | Node::Composite(_) => {
            get_in(&executable_map(node).unwrap_or_default(), rest, path)
        }
        Node::Null => Err(LookupError::new(path).into()),
        other => Err(step_error(path, other)),
    }
}

/// Writes `value` at `segments` inside `map`.
pub(crate) fn set_in(
    map: &mut AttrMap,
    segments: &[PathSegment],
    value: Node,
    mode: WriteMode,
    path: &str,
) -> SosResult<()> {
    let Some((segment, rest)) = segments.split_first() else {
        return Err(InvalidPathError::new(path, "empty path").into());
    };

    if rest.is_empty() {
        return match segment.index {
            None => {
                if let Some(existing) = map.child(&segment.key) {
                    check_replace(existing, mode, path)?;
                }
                map.insert(segment.key.clone(), value);
                Ok(())
            }
            Some(index) => {
                let slot = list_slot(map, segment, index, path)?;
                check_replace(slot, mode, path)?;
                *slot = value;
                Ok(())
            }
        };
    }

    let child = match segment.index {
        None => {
            let needs_map = map.child(&segment.key).map_or(true, Node::is_null);
            if needs_map {
                map.insert(segment.key.clone(), Node::empty_map());
            }
            map.child_mut(&segment.key)
                .ok_or_else(|| LookupError::new(path))?
        }
        Some(index) => {
            let slot = list_slot(map, segment, index, path)?;
            if slot.is_null() {
                *slot = Node::empty_map();
            }
            slot
        }
    };

    match child {
        Node::Map(inner) => set_in(inner, rest, value, mode, path),
        Node::Runnable(_) | Node::Composite(_) => {
            with_executable(child, |inner| set_in(inner, rest, value, mode, path))
        }
        other => Err(step_error(path, other)),
    }
}

fn check_replace(existing: &Node, mode: WriteMode, path: &str) -> SosResult<()> {
    if existing.is_vacant() {
        return Ok(());
    }
    if !mode.overwrite {
        return Err(ConflictError::new(path).into());
    }
    if let Node::Map(inner) = existing {
        if inner.is_locked() && !mode.force {
            return Err(ProtectionError::locked(path).into());
        }
    }
    Ok(())
}

/// Returns the list slot at `index`, growing the list with empty maps.
fn list_slot<'a>(
    map: &'a mut AttrMap,
    segment: &PathSegment,
    index: usize,
    path: &str,
) -> SosResult<&'a mut Node> {
    let len = match map.child(&segment.key) {
        Some(Node::List(items)) => items.len(),
        _ => 0,
    };
    check_list_growth(path, len, index)?;

    let needs_list = map.child(&segment.key).map_or(true, Node::is_vacant);
    if needs_list {
        map.insert(segment.key.clone(), Node::List(Vec::new()));
    }

    match map.child_mut(&segment.key) {
        Some(Node::List(items)) => {
            while items.len() <= index {
                items.push(Node::empty_map());
            }
            items.get_mut(index).ok_or_else(|| LookupError::new(path).into())
        }
        Some(other) => Err(InvalidPathError::new(
            path,
            format!("'{}' is a {}, not a list", segment.key, other.kind_name()),
        )
        .into()),
        None => Err(LookupError::new(path).into()),
    }
}

/// Removes the node at `segments` inside `map`.
pub(crate) fn remove_in(
    map: &mut AttrMap,
    segments: &[PathSegment],
    path: &str,
) -> SosResult<Option<Node>> {
    let Some((segment, rest)) = segments.split_first() else {
        return Err(InvalidPathError::new(path, "empty path").into());
    };

    if rest.is_empty() {
        return match segment.index {
            None => {
                match map.child(&segment.key) {
                    None => return Ok(None),
                    Some(Node::Map(inner)) if inner.is_preserved() => {
                        return Err(ProtectionError::preserved(path).into())
                    }
                    Some(_) => {}
                }
                Ok(map.remove_child(&segment.key))
            }
            Some(index) => match map.child_mut(&segment.key) {
                Some(Node::List(items)) if index < items.len() => Ok(Some(items.remove(index))),
                Some(Node::List(_)) | None => Ok(None),
                Some(other) => Err(step_error(path, other)),
            },
        };
    }

    let child = match map.child_mut(&segment.key) {
        Some(node) => node,
        None => return Err(LookupError::new(path).into()),
    };
    let child = match segment.index {
        Some(index) => match child {
            Node::List(items) => items
                .get_mut(index)
                .ok_or_else(|| SosError::from(LookupError::new(path)))?,
            other => return Err(step_error(path, other)),
        },
        None => child,
    };

    match child {
        Node::Map(inner) => remove_in(inner, rest, path),
        Node::Runnable(_) | Node::Composite(_) => {
            with_executable(child, |inner| remove_in(inner, rest, path))
        }
        Node::Null => Err(LookupError::new(path).into()),
        other => Err(step_error(path, other)),
    }
}
