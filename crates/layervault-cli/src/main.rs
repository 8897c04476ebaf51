//! layervault CLI
//!
//! Command-line interface for layervault - inspect, compare, copy and back
//! up geospatial vector layers.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use layervault_core::{Config, CopyOptions, DriverRegistry};

mod commands;
mod output;

use commands::import::ImportFlags;
use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "layervault")]
#[command(about = "layervault - vector layer introspection, copying and portal backups")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file to use instead of the default location
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List layers of a source with their full schema
    #[command(alias = "ls")]
    Layers {
        /// GeoPackage path or connection descriptor
        source: String,
    },
    /// Compare the schemas of two layers
    Compare {
        source_a: String,
        layer_a: String,
        source_b: String,
        layer_b: String,
        /// Compare field names case-insensitively
        #[arg(long)]
        ignore_case: bool,
        /// Exit with an error when the schemas differ
        #[arg(long)]
        strict: bool,
    },
    /// Copy a layer into another source
    Copy {
        source: String,
        layer: String,
        /// Destination source; a missing .gpkg file is created
        destination: String,
        /// Name of the layer in the destination
        #[arg(long)]
        name: Option<String>,
        /// Fail instead of replacing an existing layer
        #[arg(long)]
        no_overwrite: bool,
        /// Let the destination sanitize layer and field names
        #[arg(long)]
        launder: bool,
    },
    /// Import a package layer into the datastore with ogr2ogr
    Import {
        package: PathBuf,
        layer: String,
        /// Target schema instead of the configured one
        #[arg(long)]
        schema: Option<String>,
        #[arg(long)]
        no_overwrite: bool,
        #[arg(long)]
        append: bool,
        #[arg(long)]
        update: bool,
        #[arg(long)]
        no_skip_failures: bool,
        /// Register the imported layer in the layer catalog
        #[arg(long)]
        register: bool,
        /// JSON layer catalog (overrides catalog_path)
        #[arg(long, value_name = "FILE", requires = "register")]
        catalog: Option<PathBuf>,
    },
    /// Back up every registered layer into a GeoPackage archive
    Backup {
        /// Directory for the archive (a new one under downloads_dir by default)
        #[arg(long, value_name = "DIR")]
        dest: Option<PathBuf>,
        /// JSON layer catalog (overrides catalog_path)
        #[arg(long, value_name = "FILE")]
        catalog: Option<PathBuf>,
        /// Live source instead of the configured datastore
        #[arg(long)]
        source: Option<String>,
    },
    /// Show configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    let config_path = cli.config.clone().unwrap_or_else(Config::config_file_path);
    let config = Config::load_from_path(&config_path).context("Failed to load configuration")?;
    debug!(path = %config_path.display(), "Loaded configuration");
    let registry = DriverRegistry::default();

    match cli.command {
        Commands::Layers { source } => commands::layers::list(&registry, &source, &output),
        Commands::Compare {
            source_a,
            layer_a,
            source_b,
            layer_b,
            ignore_case,
            strict,
        } => commands::compare::compare(
            &registry,
            (source_a.as_str(), layer_a.as_str()),
            (source_b.as_str(), layer_b.as_str()),
            ignore_case,
            strict,
            &output,
        ),
        Commands::Copy {
            source,
            layer,
            destination,
            name,
            no_overwrite,
            launder,
        } => {
            let options = CopyOptions {
                overwrite: !no_overwrite,
                launder,
                target_name: name,
                ..Default::default()
            };
            commands::copy::copy(&registry, &source, &layer, &destination, options, &output)
        }
        Commands::Import {
            package,
            layer,
            schema,
            no_overwrite,
            append,
            update,
            no_skip_failures,
            register,
            catalog,
        } => {
            let flags = ImportFlags {
                no_overwrite,
                append,
                update,
                no_skip_failures,
            };
            commands::import::import(
                &registry,
                &config,
                &package,
                &layer,
                schema.as_deref(),
                flags,
                register,
                catalog,
                &output,
            )
        }
        Commands::Backup {
            dest,
            catalog,
            source,
        } => commands::backup::backup(
            &registry,
            &config,
            dest.as_deref(),
            catalog,
            source.as_deref(),
            &output,
        ),
        Commands::Config { command } => match command {
            Some(ConfigCommands::Show) | None => {
                commands::config::show(&config, &config_path, &output)
            }
        },
    }
}

/// Log to stderr; RUST_LOG wins over the default level
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "layervault_core={},layervault={}",
            default_level, default_level
        ))
    });

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
