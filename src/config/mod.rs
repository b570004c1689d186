//! Configuration resolution
//!
//! Resolves the bundler configuration from ordered layers:
//! 1. Base document (`base.*` or the built-in preset)
//! 2. Profile overlay (`development.*` / `production.*`)
//! 3. `--set` overrides, in command-line order
//!
//! The merged document then has its paths joined onto the project root and
//! its thread pool sized from `--jobs` or the CPU count.

mod error;
mod loader;
mod overrides;
mod presets;
mod profile;
mod resolved;
mod rewrite;

pub use error::ConfigError;
pub use loader::{discover, load_document, parse_document, DocumentFormat, LoadedDocument};
pub use overrides::{parse_overrides, Override};
pub use presets::{write_presets, Preset, BASE_STEM};
pub use profile::{Profile, MODE_ENV_VAR};
pub use resolved::{
    ConfigOrigin, ConfigSource, ResolveOptions, ResolvedConfig, SCHEMA_ID, SCHEMA_VERSION,
};
pub use rewrite::{
    apply_thread_pool, default_parallelism, join_normalized, resolve_paths, PATH_KEYS,
    THREADS_KEY, THREAD_POOL_PLUGIN,
};

/// Built-in preset accessors
pub mod preset {
    pub use super::presets::{all, base, overlay};
}
