//! Compare command handler

use anyhow::Result;

use layervault_core::{catalog, schema, AccessMode, DriverRegistry, Error, SourceHandle};

use crate::output::Output;

/// Compare the full schemas of two layers
pub fn compare(
    registry: &DriverRegistry,
    (location_a, layer_a): (&str, &str),
    (location_b, layer_b): (&str, &str),
    ignore_case: bool,
    strict: bool,
    output: &Output,
) -> Result<()> {
    let source_a = SourceHandle::open(registry, location_a, AccessMode::ReadOnly)?;
    let source_b = SourceHandle::open(registry, location_b, AccessMode::ReadOnly)?;

    let a = catalog::get_layer(&source_a, layer_a)?
        .ok_or_else(|| Error::layer_not_found(layer_a, location_a))?;
    let b = catalog::get_layer(&source_b, layer_b)?
        .ok_or_else(|| Error::layer_not_found(layer_b, location_b))?;

    let report = schema::compare(&a, &b, ignore_case);
    output.print_report(&report)?;

    if strict {
        report.ensure_compatible(layer_a, layer_b)?;
    }
    Ok(())
}
