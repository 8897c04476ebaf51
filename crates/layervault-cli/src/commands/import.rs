//! Import command handler

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use layervault_core::{Config, DriverRegistry, ImportOptions, JsonCatalog, Ogr2Ogr, Package};

use crate::output::Output;

/// Flags given on the command line, applied over the configured defaults
#[derive(Debug, Clone, Copy, Default)]
pub struct ImportFlags {
    pub no_overwrite: bool,
    pub append: bool,
    pub update: bool,
    pub no_skip_failures: bool,
}

impl ImportFlags {
    pub fn apply(&self, mut options: ImportOptions) -> ImportOptions {
        if self.no_overwrite {
            options.overwrite = false;
        }
        if self.append {
            options.append = true;
        }
        if self.update {
            options.update = true;
        }
        if self.no_skip_failures {
            options.skip_failures = false;
        }
        options
    }
}

/// Load a package layer into the configured datastore with ogr2ogr
///
/// With `register` the layer is then recorded in the layer catalog.
pub fn import(
    registry: &DriverRegistry,
    config: &Config,
    package: &Path,
    layer: &str,
    schema: Option<&str>,
    flags: ImportFlags,
    register: bool,
    catalog_path: Option<PathBuf>,
    output: &Output,
) -> Result<()> {
    let catalog = match (register, catalog_path.or_else(|| config.catalog_path.clone())) {
        (false, _) => None,
        (true, Some(path)) => Some(JsonCatalog::new(path)),
        (true, None) => bail!(
            "No layer catalog configured.\n\
             Pass --catalog <FILE> or set catalog_path in the config file."
        ),
    };

    let package = Package::open(registry, package)
        .with_context(|| format!("Failed to open package {}", package.display()))?;

    let runner = Ogr2Ogr::new(&config.ogr2ogr_path);
    let destination = config.connection_descriptor(None, schema);
    let options = flags.apply(config.import);

    package.layer_to_source_cmd(layer, &runner, &destination, &options)?;

    output.success(&format!(
        "Imported '{}' into {}",
        layer,
        destination.redacted()
    ));

    if let Some(mut catalog) = catalog {
        let created = package
            .register_layer(layer, &mut catalog, &config.datastore.name, None)
            .context("Failed to register layer")?;
        if created {
            output.success(&format!("Registered '{}' in {}", layer, catalog.path().display()));
        } else {
            output.success(&format!("'{}' is already registered", layer));
        }
    }
    Ok(())
}
