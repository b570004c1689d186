//! Post-merge rewrites
//!
//! Two values cannot be expressed as static document data: absolute paths
//! under the project root, and the thread pool size handed to the loader
//! pool plugin. Both are applied to the merged document.

use overlay_merge::ConfigNode;
use serde_json::{Map, Value};
use std::num::NonZeroUsize;
use std::path::{Component, Path, PathBuf};

/// Keys whose string value is a path relative to the project root
pub const PATH_KEYS: &[&str] = &["context", "output.path", "devServer.contentBase"];

/// Path-valued keys inside a plugin's `options`
const PLUGIN_PATH_OPTIONS: &[&str] = &["template", "context", "manifest", "root"];

/// Plugin whose `options.threads` receives the worker count
pub const THREAD_POOL_PLUGIN: &str = "HappyPack";

pub const THREADS_KEY: &str = "threads";

/// Worker count used when none is given: one per available CPU
pub fn default_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

/// Join every path-valued entry onto `root`.
///
/// Rewritten: [`PATH_KEYS`], each `resolve.alias` target, each
/// `module.rules[].include` entry, and plugin options naming files
/// (`template`, `context`, `manifest`, `root`, `patterns[].from`/`to`).
/// Absolute values are kept as they are. Returns the rewritten key paths.
pub fn resolve_paths(config: ConfigNode, root: &Path) -> (ConfigNode, Vec<String>) {
    let mut map = config.into_map();
    let mut rewritten = Vec::new();

    for key in PATH_KEYS {
        if let Some(value) = value_at_mut(&mut map, key) {
            rewrite_path(value, root, key, &mut rewritten);
        }
    }

    if let Some(Value::Object(aliases)) = value_at_mut(&mut map, "resolve.alias") {
        for (name, target) in aliases.iter_mut() {
            rewrite_path(target, root, &format!("resolve.alias.{}", name), &mut rewritten);
        }
    }

    if let Some(Value::Array(rules)) = value_at_mut(&mut map, "module.rules") {
        for (i, rule) in rules.iter_mut().enumerate() {
            if let Some(include) = rule.get_mut("include") {
                rewrite_path(include, root, &format!("module.rules.{}.include", i), &mut rewritten);
            }
        }
    }

    if let Some(Value::Array(plugins)) = map.get_mut("plugins") {
        for (i, plugin) in plugins.iter_mut().enumerate() {
            let Some(Value::Object(options)) = plugin.get_mut("options") else {
                continue;
            };
            let prefix = format!("plugins.{}.options", i);
            for key in PLUGIN_PATH_OPTIONS {
                if let Some(value) = options.get_mut(*key) {
                    rewrite_path(value, root, &format!("{}.{}", prefix, key), &mut rewritten);
                }
            }
            if let Some(Value::Array(patterns)) = options.get_mut("patterns") {
                for (j, pattern) in patterns.iter_mut().enumerate() {
                    for key in ["from", "to"] {
                        if let Some(value) = pattern.get_mut(key) {
                            let at = format!("{}.patterns.{}.{}", prefix, j, key);
                            rewrite_path(value, root, &at, &mut rewritten);
                        }
                    }
                }
            }
        }
    }

    (ConfigNode::from_map(map), rewritten)
}

/// Set `options.threads` on every thread pool plugin.
///
/// An explicit count always wins; the detected default only fills a
/// missing value. Returns how many plugins were updated.
pub fn apply_thread_pool(config: ConfigNode, jobs: usize, explicit: bool) -> (ConfigNode, usize) {
    let mut map = config.into_map();
    let mut updated = 0;

    if let Some(Value::Array(plugins)) = map.get_mut("plugins") {
        for plugin in plugins.iter_mut() {
            let Value::Object(plugin) = plugin else {
                continue;
            };
            if plugin.get("name").and_then(Value::as_str) != Some(THREAD_POOL_PLUGIN) {
                continue;
            }
            let options = plugin
                .entry("options")
                .or_insert_with(|| Value::Object(Map::new()));
            let Value::Object(options) = options else {
                continue;
            };
            if explicit || !options.contains_key(THREADS_KEY) {
                options.insert(THREADS_KEY.to_string(), Value::from(jobs));
                updated += 1;
            }
        }
    }

    (ConfigNode::from_map(map), updated)
}

/// Lexically normalize `root.join(path)`, dropping `.` and folding `..`.
pub fn join_normalized(root: &Path, path: impl AsRef<Path>) -> PathBuf {
    let mut out = PathBuf::new();
    for component in root.join(path).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

fn value_at_mut<'a>(map: &'a mut Map<String, Value>, path: &str) -> Option<&'a mut Value> {
    let mut segments = path.split('.');
    let mut current = map.get_mut(segments.next()?)?;
    for segment in segments {
        current = current.as_object_mut()?.get_mut(segment)?;
    }
    Some(current)
}

/// Rewrite a string, or each string in a sequence
fn rewrite_path(value: &mut Value, root: &Path, at: &str, rewritten: &mut Vec<String>) {
    match value {
        Value::String(s) if !Path::new(s.as_str()).is_absolute() => {
            *s = join_normalized(root, s.as_str()).to_string_lossy().to_string();
            rewritten.push(at.to_string());
        }
        Value::Array(items) => {
            for (i, item) in items.iter_mut().enumerate() {
                rewrite_path(item, root, &format!("{}.{}", at, i), rewritten);
            }
        }
        _ => {}
    }
}
