//! bundle-overlay CLI
//!
//! Entry point for the `bundle-overlay` command-line tool.

use bundle_overlay::config::{
    parse_overrides, write_presets, ConfigError, Profile, ResolveOptions, ResolvedConfig,
};
use bundle_overlay::logging;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "bundle-overlay")]
#[command(about = "Resolve bundler configuration from a base and per-environment overlays", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging (sets log level to DEBUG)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge the layers and print the resolved configuration
    Resolve {
        #[command(flatten)]
        layers: LayerArgs,

        /// Write to this file instead of stdout
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Emit the provenance envelope instead of the bare configuration
        #[arg(long)]
        envelope: bool,
    },

    /// Print one value of the resolved configuration
    Get {
        /// Dotted key path (e.g. devServer.port, plugins.0.name)
        path: String,

        #[command(flatten)]
        layers: LayerArgs,
    },

    /// Resolve every profile and report whether the documents merge cleanly
    Verify {
        /// Directory holding base.* and the profile overlays (default: built-in presets)
        #[arg(long, short = 'd')]
        dir: Option<PathBuf>,

        /// Project root for relative paths (default: parent of --dir, else the working directory)
        #[arg(long)]
        root: Option<PathBuf>,
    },

    /// Write the built-in presets into a directory
    Init {
        /// Target directory
        dir: PathBuf,

        /// Overwrite existing documents
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args)]
struct LayerArgs {
    /// Directory holding base.* and the profile overlays (default: built-in presets)
    #[arg(long, short = 'd')]
    dir: Option<PathBuf>,

    /// Build profile (default: read from NODE_ENV)
    #[arg(long, short = 'm', value_enum)]
    mode: Option<Profile>,

    /// Override a value, KEY.PATH=VALUE (repeatable; VALUE is JSON or a string)
    #[arg(long = "set", short = 's', value_name = "KEY=VALUE")]
    set: Vec<String>,

    /// Thread pool size for the HappyPack plugin (default: available CPUs)
    #[arg(long, short = 'j')]
    jobs: Option<usize>,

    /// Project root for relative paths (default: parent of --dir, else the working directory)
    #[arg(long)]
    root: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match cli.command {
        Commands::Resolve {
            layers,
            output,
            envelope,
        } => {
            run_resolve(layers, output, envelope);
        }
        Commands::Get { path, layers } => {
            run_get(&path, layers);
        }
        Commands::Verify { dir, root } => {
            run_verify(dir, root);
        }
        Commands::Init { dir, force } => {
            run_init(dir, force);
        }
    }
}

/// Decide the profile and build resolve options at the process boundary
fn resolve_options(layers: LayerArgs) -> Result<ResolveOptions, ConfigError> {
    let profile = layers.mode.unwrap_or_else(Profile::from_env);
    let overrides = parse_overrides(layers.set.as_slice())?;
    let mut options = ResolveOptions::new(profile).with_overrides(overrides);
    if let Some(dir) = layers.dir {
        options = options.with_config_dir(dir);
    }
    if let Some(jobs) = layers.jobs {
        options = options.with_parallelism(jobs);
    }
    if let Some(root) = layers.root {
        options = options.with_root(root);
    }
    Ok(options)
}

fn resolve_or_exit(layers: LayerArgs) -> ResolvedConfig {
    match resolve_options(layers).and_then(|options| ResolvedConfig::resolve(&options)) {
        Ok(config) => config,
        Err(e) => exit_with(e),
    }
}

fn exit_with(error: ConfigError) -> ! {
    eprintln!("Error: {}", error);
    process::exit(error.exit_code());
}

fn run_resolve(layers: LayerArgs, output: Option<PathBuf>, envelope: bool) {
    let resolved = resolve_or_exit(layers);

    if let Some(path) = output {
        if let Err(e) = resolved.write_to_file(&path, envelope) {
            eprintln!("Error writing {}: {}", path.display(), e);
            process::exit(1);
        }
        eprintln!("Wrote {} configuration to {}", resolved.profile, path.display());
        return;
    }

    let json = if envelope {
        resolved.to_json()
    } else {
        resolved.config_json()
    };
    match json {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error serializing output: {}", e);
            process::exit(1);
        }
    }
}

fn run_get(path: &str, layers: LayerArgs) {
    let resolved = resolve_or_exit(layers);

    let Some(value) = resolved.get(path) else {
        eprintln!("Key '{}' not found in {} configuration", path, resolved.profile);
        process::exit(1);
    };

    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error serializing output: {}", e);
            process::exit(1);
        }
    }
}

fn run_verify(dir: Option<PathBuf>, root: Option<PathBuf>) {
    let mut failure: Option<ConfigError> = None;

    for profile in Profile::ALL {
        let mut options = ResolveOptions::new(profile);
        if let Some(ref dir) = dir {
            options = options.with_config_dir(dir.clone());
        }
        if let Some(ref root) = root {
            options = options.with_root(root.clone());
        }

        match ResolvedConfig::resolve(&options) {
            Ok(resolved) => {
                println!(
                    "{}: ok ({} sources, {} top-level keys, digest {})",
                    profile,
                    resolved.sources.len(),
                    resolved.config.len(),
                    resolved.config_digest
                );
            }
            Err(e) => {
                println!("{}: FAILED: {}", profile, e);
                failure.get_or_insert(e);
            }
        }
    }

    if let Some(e) = failure {
        process::exit(e.exit_code());
    }
}

fn run_init(dir: PathBuf, force: bool) {
    match write_presets(&dir, force) {
        Ok(written) => {
            for path in written {
                println!("Created {}", path.display());
            }
        }
        Err(e) => exit_with(e),
    }
}
