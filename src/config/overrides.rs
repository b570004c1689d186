//! Command-line overrides (`--set key.path=value`)
//!
//! Each assignment becomes its own overlay document, applied after the
//! profile overlay in command-line order.

use overlay_merge::ConfigNode;
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use super::error::ConfigError;

/// One `key.path=value` assignment
#[derive(Debug, Clone, PartialEq)]
pub struct Override {
    /// Non-empty, non-numeric key segments
    pub path: Vec<String>,
    pub value: Value,
}

impl Override {
    /// Build the overlay document, nesting the value under each path segment
    pub fn to_node(&self) -> ConfigNode {
        let Some((top, rest)) = self.path.split_first() else {
            return ConfigNode::new();
        };

        let nested = rest.iter().rev().fold(self.value.clone(), |inner, key| {
            let mut map = Map::new();
            map.insert(key.clone(), inner);
            Value::Object(map)
        });

        let mut node = ConfigNode::new();
        node.insert(top.clone(), nested);
        node
    }

    pub fn key(&self) -> String {
        self.path.join(".")
    }
}

impl FromStr for Override {
    type Err = ConfigError;

    /// The value is parsed as JSON when it is valid JSON, otherwise kept as
    /// a plain string.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (key, raw) = s
            .split_once('=')
            .ok_or_else(|| ConfigError::InvalidOverride(s.to_string()))?;

        let path: Vec<String> = key.trim().split('.').map(str::to_string).collect();
        if path.iter().any(|segment| segment.is_empty()) {
            return Err(ConfigError::InvalidOverride(s.to_string()));
        }
        // An all-digit segment would build a mapping keyed "0", which then
        // conflicts with the sequence it was meant to index.
        if let Some(index) = path.iter().find(|segment| segment.bytes().all(|b| b.is_ascii_digit())) {
            return Err(ConfigError::IndexedOverride(s.to_string(), index.clone()));
        }

        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));

        Ok(Self { path, value })
    }
}

impl fmt::Display for Override {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key(), self.value)
    }
}

/// Parse every assignment, failing on the first malformed one
pub fn parse_overrides<S: AsRef<str>>(items: &[S]) -> Result<Vec<Override>, ConfigError> {
    items.iter().map(|item| item.as_ref().parse()).collect()
}
