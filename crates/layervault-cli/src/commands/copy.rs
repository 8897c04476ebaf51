//! Copy command handler

use std::path::Path;

use anyhow::{Context, Result};

use layervault_core::driver::gpkg;
use layervault_core::{copier, with_source, AccessMode, CopyOptions, DriverRegistry, SourceHandle};

use crate::output::Output;

/// Copy one layer into another source
///
/// A GeoPackage destination that does not exist yet is created first.
pub fn copy(
    registry: &DriverRegistry,
    location: &str,
    layer: &str,
    destination: &str,
    options: CopyOptions,
    output: &Output,
) -> Result<()> {
    let source = SourceHandle::open(registry, location, AccessMode::ReadOnly)?;

    if is_new_geopackage(destination) {
        SourceHandle::create(registry, "GPKG", destination)?
            .close()
            .with_context(|| format!("Failed to create {}", destination))?;
    }

    let created = with_source(registry, destination, AccessMode::Update, |dest| {
        let view = copier::copy_by_name(&source, layer, dest, &options)?;
        Ok(view.name().to_string())
    })?;

    output.success(&format!("Copied '{}' to '{}' as '{}'", layer, destination, created));
    Ok(())
}

fn is_new_geopackage(location: &str) -> bool {
    let path = Path::new(location);
    !path.exists()
        && path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case(gpkg::EXTENSION))
            .unwrap_or(false)
}
