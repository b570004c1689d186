//! Built-in documents
//!
//! The presets carry the stock bundler configuration: a shared base plus one
//! overlay per profile. They are used when no configuration directory is
//! given, and `init` writes them out as a starting point.

use overlay_merge::ConfigNode;
use std::fs;
use std::path::{Path, PathBuf};

use super::error::ConfigError;
use super::loader::{parse_document, sha256_hex, DocumentFormat};
use super::profile::Profile;

/// File stem of the base document
pub const BASE_STEM: &str = "base";

const BASE: &str = include_str!("../../presets/base.toml");
const DEVELOPMENT: &str = include_str!("../../presets/development.toml");
const PRODUCTION: &str = include_str!("../../presets/production.toml");

/// An embedded TOML document
#[derive(Debug, Clone, Copy)]
pub struct Preset {
    pub name: &'static str,
    pub contents: &'static str,
}

impl Preset {
    pub fn file_name(&self) -> String {
        format!("{}.toml", self.name)
    }

    pub fn parse(&self) -> Result<ConfigNode, ConfigError> {
        parse_document(self.contents, DocumentFormat::Toml, &format!("preset:{}", self.name))
    }

    /// SHA-256 hex digest of the embedded bytes
    pub fn digest(&self) -> String {
        sha256_hex(self.contents.as_bytes())
    }
}

pub fn base() -> Preset {
    Preset {
        name: BASE_STEM,
        contents: BASE,
    }
}

pub fn overlay(profile: Profile) -> Preset {
    let contents = match profile {
        Profile::Development => DEVELOPMENT,
        Profile::Production => PRODUCTION,
    };
    Preset {
        name: profile.overlay_stem(),
        contents,
    }
}

pub fn all() -> [Preset; 3] {
    [
        base(),
        overlay(Profile::Development),
        overlay(Profile::Production),
    ]
}

/// Write every preset into `dir` as TOML.
///
/// Without `force`, nothing is written if any target file already exists.
pub fn write_presets(dir: &Path, force: bool) -> Result<Vec<PathBuf>, ConfigError> {
    let targets: Vec<(PathBuf, Preset)> = all()
        .into_iter()
        .map(|preset| (dir.join(preset.file_name()), preset))
        .collect();

    if !force {
        if let Some((path, _)) = targets.iter().find(|(path, _)| path.exists()) {
            return Err(ConfigError::AlreadyExists(path.clone()));
        }
    }

    fs::create_dir_all(dir)
        .map_err(|e| ConfigError::IoError(format!("{}: {}", dir.display(), e)))?;

    let mut written = Vec::with_capacity(targets.len());
    for (path, preset) in targets {
        fs::write(&path, preset.contents)
            .map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;
        tracing::debug!(path = %path.display(), "wrote preset");
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_presets_parse() {
        for preset in all() {
            let node = preset.parse().unwrap();
            assert!(!node.is_empty(), "{} is empty", preset.name);
        }
    }

    #[test]
    fn test_base_preset_contents() {
        let node = base().parse().unwrap();

        assert_eq!(node.lookup("entry.index"), Some(&json!("./src/index.js")));
        assert_eq!(node.lookup("output.filename"), Some(&json!("[name].[hash:7].js")));
        assert_eq!(node.lookup("resolve.alias.@"), Some(&json!("src")));
        assert_eq!(node.lookup("module.rules.4.use.options.limit"), Some(&json!(1024)));
        assert_eq!(
            node.lookup("optimization.splitChunks.cacheGroups.commons.name"),
            Some(&json!("common"))
        );
        assert_eq!(node.lookup("plugins").and_then(|p| p.as_array()).map(Vec::len), Some(4));
    }

    #[test]
    fn test_overlay_presets() {
        let dev = overlay(Profile::Development).parse().unwrap();
        assert_eq!(dev.lookup("devServer.port"), Some(&json!(8080)));
        assert_eq!(dev.lookup("output.publicPath"), Some(&json!("/")));

        let prod = overlay(Profile::Production).parse().unwrap();
        assert_eq!(prod.lookup("output.publicPath"), Some(&json!("./")));
        assert!(prod.get("devServer").is_none());
    }

    #[test]
    fn test_write_presets() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("build");

        let written = write_presets(&dir, false).unwrap();
        assert_eq!(written.len(), 3);
        assert!(dir.join("base.toml").is_file());
        assert!(dir.join("development.toml").is_file());
        assert!(dir.join("production.toml").is_file());
        assert_eq!(fs::read_to_string(dir.join("base.toml")).unwrap(), base().contents);
    }

    #[test]
    fn test_write_presets_refuses_overwrite() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("production.toml"), "custom = true\n").unwrap();

        let err = write_presets(tmp.path(), false).unwrap_err();
        assert!(matches!(err, ConfigError::AlreadyExists(_)));
        // nothing written
        assert!(!tmp.path().join("base.toml").exists());

        write_presets(tmp.path(), true).unwrap();
        assert_eq!(
            fs::read_to_string(tmp.path().join("production.toml")).unwrap(),
            overlay(Profile::Production).contents
        );
    }
}
