//! Layers command handler

use anyhow::{Context, Result};

use layervault_core::{catalog, with_source, AccessMode, DriverRegistry};

use crate::output::Output;

/// List the layers of a source with their full schema
pub fn list(registry: &DriverRegistry, location: &str, output: &Output) -> Result<()> {
    let layers = with_source(registry, location, AccessMode::ReadOnly, |source| {
        catalog::read_schema(source)
    })
    .context("Failed to read layers")?;

    output.print_layers(&layers)
}
