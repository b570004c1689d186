//! Overlay merge logic
//!
//! Merge semantics:
//! - Mappings: deep-merge by key (recursive)
//! - Sequences: CONCATENATE (overlay items appended)
//! - Scalars: override (overlay wins)
//! - Null: a scalar; overrides scalars and sequences
//! - Mapping vs non-mapping: conflict, never resolved silently

use serde_json::{Map, Value};

use crate::node::{ConfigNode, KeyPath, ValueKind};

/// Result of merging a base document with its overlays
pub type MergeResult = Result<ConfigNode, TypeConflictError>;

/// A key holds a mapping in one input and a scalar or sequence in another.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("type conflict at `{path}`: {existing} cannot be merged with {incoming} from overlay {overlay}")]
pub struct TypeConflictError {
    /// Path of the conflicting key
    pub path: KeyPath,
    /// Kind accumulated from the base and earlier overlays
    pub existing: ValueKind,
    /// Kind supplied by the overlay
    pub incoming: ValueKind,
    /// Zero-based index of the overlay that introduced the conflict
    pub overlay: usize,
}

/// Merge `overlays` onto `base`, left to right.
///
/// Inputs are borrowed and never modified; the result is a new document.
pub fn merge(base: &ConfigNode, overlays: &[ConfigNode]) -> MergeResult {
    let mut path = KeyPath::root();
    let mut merged = base.as_map().clone();

    for (index, overlay) in overlays.iter().enumerate() {
        merged = merge_maps(merged, overlay.as_map(), &mut path, index)?;
    }

    Ok(ConfigNode::from_map(merged))
}

/// Merge two bare values with the same rules as [`merge`].
///
/// Conflicts report overlay index 0.
pub fn merge_value(base: Value, overlay: &Value) -> Result<Value, TypeConflictError> {
    merge_at(base, overlay, &mut KeyPath::root(), 0)
}

fn merge_maps(
    mut base: Map<String, Value>,
    overlay: &Map<String, Value>,
    path: &mut KeyPath,
    index: usize,
) -> Result<Map<String, Value>, TypeConflictError> {
    for (key, overlay_value) in overlay {
        let merged = match base.remove(key) {
            Some(base_value) => {
                path.push(key.as_str());
                let merged = merge_at(base_value, overlay_value, path, index);
                path.pop();
                merged?
            }
            None => overlay_value.clone(),
        };
        base.insert(key.clone(), merged);
    }
    Ok(base)
}

fn merge_at(
    base: Value,
    overlay: &Value,
    path: &mut KeyPath,
    index: usize,
) -> Result<Value, TypeConflictError> {
    match (base, overlay) {
        // Both mappings: deep merge
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            Ok(Value::Object(merge_maps(base_map, overlay_map, path, index)?))
        }

        // Exactly one mapping: ambiguous
        (base, overlay) if base.is_object() || overlay.is_object() => {
            Err(TypeConflictError {
                path: path.clone(),
                existing: ValueKind::of(&base),
                incoming: ValueKind::of(overlay),
                overlay: index,
            })
        }

        // Sequences: concatenate in input order
        (Value::Array(mut items), Value::Array(extra)) => {
            items.extend(extra.iter().cloned());
            Ok(Value::Array(items))
        }

        // Scalars and sequence/scalar mixes: overlay wins
        (_, overlay) => Ok(overlay.clone()),
    }
}
