//! The hierarchical attribute model.
//!
//! This module provides:
//! - [`Node`], the value variant every configuration tree is built from
//! - [`AttrMap`], an insertion-ordered map with preserve/lock flags
//! - [`Attributes`], dotted-path `get`/`set`/`remove`/`has` with `name[N]`
//!   list addressing

mod access;
mod map;
mod node;
mod path;

pub(crate) use access::{get_in, remove_in, set_in};
pub(crate) use path::check_list_growth;
pub use access::{Attributes, WriteMode};
pub use map::AttrMap;
pub use node::Node;
pub use path::{join_path, parse_path, validate_key, PathSegment, MAX_LIST_GROWTH, RESERVED_NAMES};
