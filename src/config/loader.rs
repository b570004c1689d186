//! Configuration document loading
//!
//! Documents are TOML, JSON or YAML files whose top level is a mapping.
//! Each load records the SHA-256 digest of the raw file bytes.

use overlay_merge::ConfigNode;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

use super::error::ConfigError;

/// On-disk document format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Toml,
    Json,
    Yaml,
}

impl DocumentFormat {
    /// Extensions tried during discovery, in order
    pub const EXTENSIONS: &'static [&'static str] = &["toml", "json", "yaml", "yml"];

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

/// A parsed document with provenance
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub node: ConfigNode,
    pub path: PathBuf,
    /// SHA-256 hex digest of the raw file bytes
    pub digest: String,
}

/// Load and parse a document, choosing the format from its extension
pub fn load_document(path: &Path) -> Result<LoadedDocument, ConfigError> {
    let format =
        DocumentFormat::from_path(path).ok_or_else(|| ConfigError::UnsupportedFormat(path.to_path_buf()))?;

    let bytes = fs::read(path)
        .map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;
    let digest = sha256_hex(&bytes);

    let contents = String::from_utf8(bytes)
        .map_err(|e| ConfigError::ParseError(format!("{}: invalid UTF-8: {}", path.display(), e)))?;

    let node = parse_document(&contents, format, &path.display().to_string())?;
    tracing::debug!(path = %path.display(), keys = node.len(), %digest, "loaded document");

    Ok(LoadedDocument {
        node,
        path: path.to_path_buf(),
        digest,
    })
}

/// Parse document text. `origin` names the document in error messages.
pub fn parse_document(
    contents: &str,
    format: DocumentFormat,
    origin: &str,
) -> Result<ConfigNode, ConfigError> {
    let value = match format {
        DocumentFormat::Toml => {
            let toml_value: toml::Value = toml::from_str(contents)
                .map_err(|e| ConfigError::ParseError(format!("{}: TOML parse error: {}", origin, e)))?;
            toml_to_json(toml_value, "")
                .map_err(|e| ConfigError::ParseError(format!("{}: {}", origin, e)))?
        }
        DocumentFormat::Json => serde_json::from_str(contents)
            .map_err(|e| ConfigError::ParseError(format!("{}: JSON parse error: {}", origin, e)))?,
        DocumentFormat::Yaml => {
            let yaml_value: serde_yaml::Value = serde_yaml::from_str(contents)
                .map_err(|e| ConfigError::ParseError(format!("{}: YAML parse error: {}", origin, e)))?;
            yaml_to_json(yaml_value, "")
                .map_err(|e| ConfigError::ParseError(format!("{}: {}", origin, e)))?
        }
    };

    ConfigNode::from_value(value).map_err(|source| ConfigError::NotAMapping {
        path: origin.to_string(),
        source,
    })
}

/// Find `<dir>/<stem>.<ext>` for the first extension in
/// [`DocumentFormat::EXTENSIONS`] that exists.
pub fn discover(dir: &Path, stem: &str) -> Option<PathBuf> {
    DocumentFormat::EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{}.{}", stem, ext)))
        .find(|candidate| candidate.is_file())
}

pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn child_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", parent, key)
    }
}

/// JSON has no NaN or infinity, so a non-finite float is an error
fn float_to_json(f: f64, path: &str) -> Result<Value, String> {
    serde_json::Number::from_f64(f)
        .map(Value::Number)
        .ok_or_else(|| format!("non-finite number {} at `{}`", f, path))
}

/// Convert TOML Value to JSON Value
fn toml_to_json(toml: toml::Value, path: &str) -> Result<Value, String> {
    Ok(match toml {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::Number(i.into()),
        toml::Value::Float(f) => float_to_json(f, path)?,
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(arr) => Value::Array(
            arr.into_iter()
                .enumerate()
                .map(|(i, v)| toml_to_json(v, &child_path(path, &i.to_string())))
                .collect::<Result<_, _>>()?,
        ),
        toml::Value::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(k, v)| {
                    let value = toml_to_json(v, &child_path(path, &k))?;
                    Ok((k, value))
                })
                .collect::<Result<_, String>>()?,
        ),
    })
}

/// Convert YAML Value to JSON Value. Scalar keys are stringified; tags are
/// dropped.
fn yaml_to_json(yaml: serde_yaml::Value, path: &str) -> Result<Value, String> {
    use serde_yaml::Value as Yaml;

    Ok(match yaml {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(b),
        Yaml::Number(n) => {
            if let Some(u) = n.as_u64() {
                Value::from(u)
            } else if let Some(i) = n.as_i64() {
                Value::from(i)
            } else {
                float_to_json(n.as_f64().unwrap_or(f64::NAN), path)?
            }
        }
        Yaml::String(s) => Value::String(s),
        Yaml::Sequence(seq) => Value::Array(
            seq.into_iter()
                .enumerate()
                .map(|(i, v)| yaml_to_json(v, &child_path(path, &i.to_string())))
                .collect::<Result<_, _>>()?,
        ),
        Yaml::Mapping(mapping) => Value::Object(
            mapping
                .into_iter()
                .map(|(k, v)| {
                    let key = match k {
                        Yaml::String(s) => s,
                        Yaml::Number(n) => n.to_string(),
                        Yaml::Bool(b) => b.to_string(),
                        other => {
                            return Err(format!(
                                "unsupported mapping key {:?} under `{}`",
                                other, path
                            ))
                        }
                    };
                    let value = yaml_to_json(v, &child_path(path, &key))?;
                    Ok((key, value))
                })
                .collect::<Result<_, String>>()?,
        ),
        Yaml::Tagged(tagged) => yaml_to_json(tagged.value, path)?,
    })
}
