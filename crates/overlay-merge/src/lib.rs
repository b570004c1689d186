//! Configuration document merging.
//!
//! A [`ConfigNode`] is a mapping document. [`merge`] layers overlays on top of
//! a base document:
//! - Mappings: deep-merge by key (recursive)
//! - Sequences: CONCATENATE (overlay items appended)
//! - Scalars: override (last wins)
//! - Mapping against anything else: [`TypeConflictError`]

mod merge;
mod node;

pub use merge::{merge, merge_value, MergeResult, TypeConflictError};
pub use node::{ConfigNode, KeyPath, NodeError, ValueKind};
