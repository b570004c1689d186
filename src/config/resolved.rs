//! Resolved configuration with full provenance
//!
//! The resolved_config captures the merged configuration plus
//! information about where each layer came from.

use chrono::{DateTime, Utc};
use overlay_merge::{merge, ConfigNode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::error::ConfigError;
use super::loader::{discover, load_document, sha256_hex};
use super::overrides::Override;
use super::presets::{self, BASE_STEM};
use super::profile::Profile;
use super::rewrite::{apply_thread_pool, default_parallelism, join_normalized, resolve_paths};

/// Schema version for resolved_config
pub const SCHEMA_VERSION: u32 = 1;

/// Schema identifier
pub const SCHEMA_ID: &str = "bundle-overlay/resolved_config@1";

/// Origin of a configuration layer
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOrigin {
    Preset,
    Base,
    Overlay,
    Cli,
}

/// A contributing layer with provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSource {
    /// Origin of this layer
    pub origin: ConfigOrigin,

    /// Document name (`base`, `production`) or the CLI argument
    pub label: String,

    /// File path (None for presets and CLI)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// SHA-256 digest of the raw document bytes (None for CLI)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

/// Inputs to a resolution
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Directory holding `base.*` and the profile overlays; presets if None
    pub config_dir: Option<PathBuf>,
    pub profile: Profile,
    pub overrides: Vec<Override>,
    /// Thread pool size; one per CPU when None
    pub parallelism: Option<usize>,
    /// Project root for relative paths; the parent of `config_dir`, else
    /// the working directory, when None
    pub root: Option<PathBuf>,
}

impl ResolveOptions {
    pub fn new(profile: Profile) -> Self {
        Self {
            config_dir: None,
            profile,
            overrides: Vec::new(),
            parallelism: None,
            root: None,
        }
    }

    pub fn with_config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config_dir = Some(dir.into());
        self
    }

    pub fn with_overrides(mut self, overrides: Vec<Override>) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_parallelism(mut self, jobs: usize) -> Self {
        self.parallelism = Some(jobs);
        self
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Absolute project root
    pub fn project_root(&self) -> Result<PathBuf, ConfigError> {
        let cwd = std::env::current_dir()
            .map_err(|e| ConfigError::IoError(format!("current directory: {}", e)))?;
        let root = match (&self.root, &self.config_dir) {
            (Some(root), _) => join_normalized(&cwd, root),
            (None, Some(dir)) => {
                let dir = join_normalized(&cwd, dir);
                dir.parent().map(Path::to_path_buf).unwrap_or(dir)
            }
            (None, None) => cwd,
        };
        Ok(root)
    }
}

/// Resolved configuration with full provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedConfig {
    /// Schema version
    pub schema_version: u32,

    /// Schema identifier
    pub schema_id: String,

    /// When this config was computed
    pub created_at: DateTime<Utc>,

    /// Profile whose overlay was applied
    pub profile: Profile,

    /// Absolute project root that relative paths were joined onto
    pub root: String,

    /// Thread pool size handed to the loader pool plugin
    pub parallelism: usize,

    /// The merged configuration object
    pub config: ConfigNode,

    /// SHA-256 of the canonical (RFC 8785) JSON of `config`
    pub config_digest: String,

    /// Contributing layers in precedence order
    pub sources: Vec<ConfigSource>,
}

/// Base document, overlays in order, and one source per document
struct Layers {
    base: ConfigNode,
    overlays: Vec<ConfigNode>,
    sources: Vec<ConfigSource>,
}

impl ResolvedConfig {
    /// Load every layer and merge them: base, profile overlay, then each
    /// override in order. Paths are then made absolute and the thread pool
    /// size is filled in.
    pub fn resolve(options: &ResolveOptions) -> Result<Self, ConfigError> {
        let Layers {
            base,
            overlays,
            mut sources,
        } = Self::collect_layers(options)?;

        let config = merge(&base, &overlays)?;

        let root = options.project_root()?;
        let (config, rewritten) = resolve_paths(config, &root);
        tracing::debug!(root = %root.display(), paths = rewritten.len(), "paths resolved");

        let parallelism = options.parallelism.unwrap_or_else(default_parallelism);
        let (config, pools) = apply_thread_pool(config, parallelism, options.parallelism.is_some());
        tracing::debug!(threads = parallelism, plugins = pools, "thread pool sized");
        if let Some(jobs) = options.parallelism {
            sources.push(ConfigSource {
                origin: ConfigOrigin::Cli,
                label: format!("--jobs {}", jobs),
                path: None,
                digest: None,
            });
        }

        let config_digest = Self::compute_digest(&config)?;

        tracing::debug!(
            profile = %options.profile,
            layers = sources.len(),
            digest = %config_digest,
            "configuration resolved"
        );

        Ok(Self {
            schema_version: SCHEMA_VERSION,
            schema_id: SCHEMA_ID.to_string(),
            created_at: Utc::now(),
            profile: options.profile,
            root: root.to_string_lossy().to_string(),
            parallelism,
            config,
            config_digest,
            sources,
        })
    }

    fn collect_layers(options: &ResolveOptions) -> Result<Layers, ConfigError> {
        let mut overlays = Vec::new();
        let mut sources = Vec::new();

        // Layers 1 and 2: base and profile overlay
        let base = match &options.config_dir {
            Some(dir) => {
                let base_path =
                    discover(dir, BASE_STEM).ok_or_else(|| ConfigError::MissingBase(dir.clone()))?;
                let base = load_document(&base_path)?;
                sources.push(ConfigSource {
                    origin: ConfigOrigin::Base,
                    label: BASE_STEM.to_string(),
                    path: Some(base.path.to_string_lossy().to_string()),
                    digest: Some(base.digest),
                });

                let stem = options.profile.overlay_stem();
                match discover(dir, stem) {
                    Some(path) => {
                        let overlay = load_document(&path)?;
                        overlays.push(overlay.node);
                        sources.push(ConfigSource {
                            origin: ConfigOrigin::Overlay,
                            label: stem.to_string(),
                            path: Some(overlay.path.to_string_lossy().to_string()),
                            digest: Some(overlay.digest),
                        });
                    }
                    None => tracing::warn!(
                        dir = %dir.display(),
                        profile = %options.profile,
                        "no overlay document for profile, using base only"
                    ),
                }

                base.node
            }
            None => {
                let mut preset_layers = Vec::with_capacity(2);
                for preset in [presets::base(), presets::overlay(options.profile)] {
                    preset_layers.push(preset.parse()?);
                    sources.push(ConfigSource {
                        origin: ConfigOrigin::Preset,
                        label: preset.name.to_string(),
                        path: None,
                        digest: Some(preset.digest()),
                    });
                }
                let base = preset_layers.remove(0);
                overlays.extend(preset_layers);
                base
            }
        };

        // Layer 3: overrides, one overlay each
        for item in &options.overrides {
            overlays.push(item.to_node());
            sources.push(ConfigSource {
                origin: ConfigOrigin::Cli,
                label: format!("--set {}", item),
                path: None,
                digest: None,
            });
        }

        Ok(Layers {
            base,
            overlays,
            sources,
        })
    }

    /// SHA-256 hex digest of the JCS (RFC 8785) serialization of `config`
    pub fn compute_digest(config: &ConfigNode) -> Result<String, ConfigError> {
        let jcs_bytes = serde_json_canonicalizer::to_vec(config)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;
        Ok(sha256_hex(&jcs_bytes))
    }

    /// Serialize the whole envelope to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Serialize only the merged configuration to JSON
    pub fn config_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.config)
    }

    /// Write to file, envelope or bare config
    pub fn write_to_file(&self, path: &Path, envelope: bool) -> io::Result<()> {
        let json = if envelope {
            self.to_json()
        } else {
            self.config_json()
        }
        .map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("JSON serialization failed: {}", e),
            )
        })?;
        fs::write(path, json)
    }

    /// Get a config value by path (dot-separated)
    pub fn get(&self, path: &str) -> Option<&Value> {
        self.config.lookup(path)
    }

    /// Get a config value as u64
    pub fn get_u64(&self, path: &str) -> Option<u64> {
        self.get(path).and_then(|v| v.as_u64())
    }

    /// Get a config value as string
    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(|v| v.as_str())
    }

    /// Get a config value as bool
    pub fn get_bool(&self, path: &str) -> Option<bool> {
        self.get(path).and_then(|v| v.as_bool())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::overrides::parse_overrides;
    use serde_json::json;
    use tempfile::TempDir;

    fn plugin_names(config: &ResolvedConfig) -> Vec<String> {
        config
            .get("plugins")
            .and_then(|p| p.as_array())
            .map(|plugins| {
                plugins
                    .iter()
                    .filter_map(|p| p.get("name").and_then(|n| n.as_str()))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    #[test]
    fn test_resolve_development_presets() {
        let config = ResolvedConfig::resolve(&ResolveOptions::new(Profile::Development)).unwrap();

        assert_eq!(config.schema_version, SCHEMA_VERSION);
        assert_eq!(config.profile, Profile::Development);
        assert_eq!(config.get_u64("devServer.port"), Some(8080));
        assert_eq!(config.get_bool("devServer.hot"), Some(true));
        assert_eq!(config.get_str("output.publicPath"), Some("/"));
        // base keys survive the overlay, made absolute under the root
        let root = std::env::current_dir().unwrap();
        let output_path = Path::new(config.get_str("output.path").unwrap());
        assert!(output_path.is_absolute());
        assert_eq!(output_path, root.join("dist"));
        assert_eq!(config.root, root.to_string_lossy());
        assert_eq!(
            plugin_names(&config),
            vec![
                "HappyPack",
                "MiniCssExtractPlugin",
                "ProgressBarPlugin",
                "BundleAnalyzerPlugin",
                "HtmlWebpackPlugin",
                "HotModuleReplacementPlugin",
                "NamedModulesPlugin",
            ]
        );
    }

    #[test]
    fn test_resolve_production_presets() {
        let config = ResolvedConfig::resolve(&ResolveOptions::new(Profile::Production)).unwrap();

        assert_eq!(config.get_str("output.publicPath"), Some("./"));
        assert!(config.get("devServer").is_none());
        assert_eq!(plugin_names(&config).len(), 11);
        assert_eq!(plugin_names(&config).last().map(String::as_str), Some("DllReferencePlugin"));
    }

    #[test]
    fn test_sources_tracked_for_presets() {
        let config = ResolvedConfig::resolve(&ResolveOptions::new(Profile::Production)).unwrap();

        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.sources[0].origin, ConfigOrigin::Preset);
        assert_eq!(config.sources[0].label, "base");
        assert_eq!(config.sources[1].label, "production");
        assert_eq!(
            config.sources[1].digest.as_deref(),
            Some(presets::overlay(Profile::Production).digest().as_str())
        );
    }

    #[test]
    fn test_overrides_and_jobs_apply_last() {
        let overrides =
            parse_overrides(&["devServer.port=3000", r#"plugins=[{"name":"Extra"}]"#]).unwrap();
        let options = ResolveOptions::new(Profile::Development)
            .with_overrides(overrides)
            .with_parallelism(4);
        let config = ResolvedConfig::resolve(&options).unwrap();

        assert_eq!(config.get_u64("devServer.port"), Some(3000));
        assert_eq!(config.get_u64("plugins.0.options.threads"), Some(4));
        assert_eq!(config.parallelism, 4);
        assert!(config.get("parallelism").is_none());
        assert_eq!(plugin_names(&config).last().map(String::as_str), Some("Extra"));

        let origins: Vec<ConfigOrigin> = config.sources.iter().map(|s| s.origin).collect();
        assert_eq!(
            origins,
            vec![
                ConfigOrigin::Preset,
                ConfigOrigin::Preset,
                ConfigOrigin::Cli,
                ConfigOrigin::Cli,
                ConfigOrigin::Cli,
            ]
        );
        assert_eq!(config.sources[2].label, "--set devServer.port=3000");
        assert_eq!(config.sources[4].label, "--jobs 4");
    }

    #[test]
    fn test_thread_pool_defaults_to_available_cpus() {
        let config = ResolvedConfig::resolve(&ResolveOptions::new(Profile::Production)).unwrap();
        let cpus = std::thread::available_parallelism().unwrap().get();

        assert_eq!(config.get_str("plugins.0.name"), Some("HappyPack"));
        assert_eq!(config.get_u64("plugins.0.options.threads"), Some(cpus as u64));
        assert_eq!(config.parallelism, cpus);
        assert_eq!(config.sources.len(), 2);
    }

    #[test]
    fn test_declared_threads_kept_without_jobs() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("base.toml"),
            "[[plugins]]\nname = \"HappyPack\"\noptions = { id = \"js\", threads = 2 }\n",
        )
        .unwrap();

        let options = ResolveOptions::new(Profile::Development).with_config_dir(tmp.path());
        let config = ResolvedConfig::resolve(&options).unwrap();
        assert_eq!(config.get_u64("plugins.0.options.threads"), Some(2));

        let config = ResolvedConfig::resolve(&options.with_parallelism(3)).unwrap();
        assert_eq!(config.get_u64("plugins.0.options.threads"), Some(3));
    }

    #[test]
    fn test_paths_resolve_against_root() {
        let options = ResolveOptions::new(Profile::Production).with_root("/srv/app");
        let config = ResolvedConfig::resolve(&options).unwrap();

        assert_eq!(config.root, "/srv/app");
        assert_eq!(config.get_str("context"), Some("/srv/app"));
        assert_eq!(config.get_str("output.path"), Some("/srv/app/dist"));
        assert_eq!(config.get_str("resolve.alias.@"), Some("/srv/app/src"));
        assert_eq!(config.get_str("module.rules.0.include.0"), Some("/srv/app/src"));
        assert_eq!(
            config.get_str("plugins.10.options.manifest"),
            Some("/srv/app/dist/manifest.json")
        );
    }

    #[test]
    fn test_root_defaults_to_config_dir_parent() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("build");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("base.toml"), "[output]\npath = \"dist\"\n").unwrap();
        fs::write(dir.join("development.toml"), "[devServer]\ncontentBase = \"../public\"\n").unwrap();

        let options = ResolveOptions::new(Profile::Development).with_config_dir(&dir);
        let config = ResolvedConfig::resolve(&options).unwrap();

        let output_path = tmp.path().join("dist");
        assert_eq!(config.get_str("output.path"), Some(output_path.to_str().unwrap()));
        let content_base = tmp.path().parent().unwrap().join("public");
        assert_eq!(config.get_str("devServer.contentBase"), Some(content_base.to_str().unwrap()));
    }

    #[test]
    fn test_override_conflict_aborts() {
        let overrides = parse_overrides(&["devServer=off"]).unwrap();
        let options = ResolveOptions::new(Profile::Development).with_overrides(overrides);

        let err = ResolvedConfig::resolve(&options).unwrap_err();
        match err {
            ConfigError::Conflict(conflict) => {
                assert_eq!(conflict.path.to_string(), "devServer");
                assert_eq!(conflict.overlay, 1);
            }
            other => panic!("expected conflict, got {other}"),
        }
    }

    #[test]
    fn test_resolve_from_directory() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("base.toml"),
            "plugins = [\"X\"]\n[devServer]\nport = 8080\nhot = false\n",
        )
        .unwrap();
        fs::write(
            tmp.path().join("development.json"),
            r#"{"plugins": ["Y"], "devServer": {"hot": true}}"#,
        )
        .unwrap();

        let options = ResolveOptions::new(Profile::Development).with_config_dir(tmp.path());
        let config = ResolvedConfig::resolve(&options).unwrap();

        assert_eq!(
            config.config.clone().into_value(),
            json!({"plugins": ["X", "Y"], "devServer": {"port": 8080, "hot": true}})
        );
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.sources[0].origin, ConfigOrigin::Base);
        assert_eq!(config.sources[1].origin, ConfigOrigin::Overlay);
        assert!(config.sources[1].path.as_deref().unwrap().ends_with("development.json"));
    }

    #[test]
    fn test_missing_overlay_uses_base() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("base.yaml"), "devtool: false\n").unwrap();

        let options = ResolveOptions::new(Profile::Production).with_config_dir(tmp.path());
        let config = ResolvedConfig::resolve(&options).unwrap();

        assert_eq!(config.get_bool("devtool"), Some(false));
        assert_eq!(config.sources.len(), 1);
    }

    #[test]
    fn test_missing_base_fails() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("production.toml"), "a = 1\n").unwrap();

        let options = ResolveOptions::new(Profile::Production).with_config_dir(tmp.path());
        assert!(matches!(
            ResolvedConfig::resolve(&options),
            Err(ConfigError::MissingBase(_))
        ));
    }

    #[test]
    fn test_digest_is_order_independent() {
        let a = ConfigNode::from_value(json!({"a": 1, "b": {"c": [1, 2]}})).unwrap();
        let b = ConfigNode::from_value(json!({"b": {"c": [1, 2]}, "a": 1})).unwrap();
        let c = ConfigNode::from_value(json!({"a": 1, "b": {"c": [2, 1]}})).unwrap();

        let digest_a = ResolvedConfig::compute_digest(&a).unwrap();
        assert_eq!(digest_a, ResolvedConfig::compute_digest(&b).unwrap());
        assert_ne!(digest_a, ResolvedConfig::compute_digest(&c).unwrap());
    }

    #[test]
    fn test_write_to_file() {
        let tmp = TempDir::new().unwrap();
        let config = ResolvedConfig::resolve(&ResolveOptions::new(Profile::Development)).unwrap();

        let bare = tmp.path().join("config.json");
        config.write_to_file(&bare, false).unwrap();
        let value: Value = serde_json::from_str(&fs::read_to_string(&bare).unwrap()).unwrap();
        assert_eq!(value["devServer"]["port"], 8080);

        let envelope = tmp.path().join("envelope.json");
        config.write_to_file(&envelope, true).unwrap();
        let value: Value = serde_json::from_str(&fs::read_to_string(&envelope).unwrap()).unwrap();
        assert_eq!(value["schema_id"], SCHEMA_ID);
        assert_eq!(value["profile"], "development");
        assert_eq!(value["config"]["devServer"]["port"], 8080);
        assert_eq!(value["config_digest"], config.config_digest.as_str());
    }
}
