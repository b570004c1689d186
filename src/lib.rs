//! bundle-overlay - bundler configuration resolver
//!
//! This crate resolves the configuration handed to an external module
//! bundler by merging a shared base document with a development or
//! production overlay. The bundler directives themselves (entry points,
//! loader chains, plugin options) are opaque data.

pub mod config;
pub mod logging;

pub use config::{ConfigError, Profile, ResolveOptions, ResolvedConfig};
pub use overlay_merge::{merge, ConfigNode, KeyPath, MergeResult, TypeConflictError, ValueKind};
