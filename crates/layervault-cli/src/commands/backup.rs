//! Backup command handler

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Result};

use layervault_core::{BackupOrchestrator, BackupOutcome, Config, DriverRegistry, JsonCatalog};

use crate::output::Output;

/// Back up every registered layer into a new archive
///
/// `source` replaces the configured datastore as the live source.
pub fn backup(
    registry: &DriverRegistry,
    config: &Config,
    destination: Option<&Path>,
    catalog_path: Option<PathBuf>,
    source: Option<&str>,
    output: &Output,
) -> Result<()> {
    let catalog_path = match catalog_path.or_else(|| config.catalog_path.clone()) {
        Some(path) => path,
        None => bail!(
            "No layer catalog configured.\n\
             Pass --catalog <FILE> or set catalog_path in the config file."
        ),
    };
    let catalog = JsonCatalog::new(catalog_path);

    let orchestrator = match source {
        Some(location) => {
            BackupOrchestrator::new(registry.clone(), location, config.downloads_dir.clone())
        }
        None => BackupOrchestrator::from_config(registry.clone(), config),
    };

    let outcome = orchestrator.run(&catalog, destination);
    output.print_backup(&outcome)?;

    match outcome {
        BackupOutcome::Failed(failure) => Err(anyhow!(failure.to_string())),
        _ => Ok(()),
    }
}
