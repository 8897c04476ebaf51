//! Layer copying between sources
//!
//! The native path: read a layer's definition and features through one
//! source and recreate them in another. The destination must be opened for
//! update; nothing is flushed here, the caller decides when writes become
//! durable.
//!
//! [`export_layers`] builds a fresh GeoPackage from a (usually database)
//! source, which is how backups move layer data into an archive.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::catalog::{self, STYLES_TABLE};
use crate::driver::{gpkg, CreateLayerOptions, DriverRegistry};
use crate::error::{Error, Result};
use crate::layer::LayerView;
use crate::source::SourceHandle;

/// How a layer lands in the destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyOptions {
    /// Replace a destination layer of the same name
    pub overwrite: bool,
    /// Create a session-scoped layer where the destination supports it
    pub temporary: bool,
    /// Let the destination sanitize layer and field names
    pub launder: bool,
    /// Name to create instead of the source layer's name
    pub target_name: Option<String>,
}

impl Default for CopyOptions {
    fn default() -> Self {
        Self {
            overwrite: true,
            temporary: false,
            launder: false,
            target_name: None,
        }
    }
}

impl CopyOptions {
    fn create_options(&self) -> CreateLayerOptions {
        CreateLayerOptions {
            overwrite: self.overwrite,
            temporary: self.temporary,
            launder: self.launder,
        }
    }
}

/// Copy a layer's schema and features into `destination`
///
/// Returns a view of the newly created layer. The source layer is never
/// modified.
pub fn copy<'d>(
    layer: &LayerView<'_>,
    destination: &'d mut SourceHandle,
    options: &CopyOptions,
) -> Result<LayerView<'d>> {
    if !destination.is_writable() {
        return Err(Error::ReadOnly {
            location: destination.display_location().to_string(),
        });
    }

    let mut definition = layer.definition().clone();
    if let Some(target) = &options.target_name {
        definition.name = target.clone();
    }

    let features = layer
        .features()
        .map_err(|e| copy_failure(layer.name(), e))?;

    let created = destination
        .source_mut()
        .create_layer(&definition, options.create_options())
        .map_err(|e| copy_failure(layer.name(), e))?;

    let written = destination
        .source_mut()
        .write_features(&created.name, &features)
        .map_err(|e| copy_failure(layer.name(), e))?;

    debug!(
        layer = layer.name(),
        target = %created.name,
        features = written,
        destination = destination.display_location(),
        "Copied layer"
    );

    let destination: &'d SourceHandle = destination;
    let definition = destination
        .source()
        .layer_definition(&created.name)?
        .unwrap_or(created);
    Ok(LayerView::new(destination, definition))
}

/// Copy the layer named `name` from `source` into `destination`
///
/// Fails with `LayerNotFound` before touching the destination when the
/// source has no such layer.
pub fn copy_by_name<'d>(
    source: &SourceHandle,
    name: &str,
    destination: &'d mut SourceHandle,
    options: &CopyOptions,
) -> Result<LayerView<'d>> {
    let layer = catalog::get_layer(source, name)?
        .ok_or_else(|| Error::LayerNotFound {
            layer: name.to_string(),
            location: source.display_location().to_string(),
        })?;
    copy(&layer, destination, options)
}

/// Create a GeoPackage at `archive_path` holding layers of `source`
///
/// `.gpkg` is appended when missing. With `filter` set only the named
/// layers are copied (an empty filter copies nothing); otherwise every
/// enumerable layer is. The archive is flushed and closed before
/// returning its path.
pub fn export_layers(
    registry: &DriverRegistry,
    source: &SourceHandle,
    archive_path: &Path,
    filter: Option<&[String]>,
) -> Result<PathBuf> {
    let archive_path = with_gpkg_extension(archive_path);
    let location = archive_path.to_string_lossy().into_owned();

    let mut archive = SourceHandle::create(registry, "GPKG", &location)?;
    let options = CopyOptions::default();

    let mut copied = 0usize;
    for layer in catalog::list_layers(source)? {
        let selected = match filter {
            Some(names) => names.iter().any(|n| n == layer.name()),
            None => true,
        };
        if !selected || layer.name() == STYLES_TABLE {
            continue;
        }
        copy(&layer, &mut archive, &options)?;
        copied += 1;
    }

    archive.close()?;
    info!(
        archive = %archive_path.display(),
        layers = copied,
        "Exported layers to GeoPackage"
    );
    Ok(archive_path)
}

fn with_gpkg_extension(path: &Path) -> PathBuf {
    let has_extension = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case(gpkg::EXTENSION))
        .unwrap_or(false);
    if has_extension {
        path.to_path_buf()
    } else {
        let mut name = path.as_os_str().to_os_string();
        name.push(".");
        name.push(gpkg::EXTENSION);
        PathBuf::from(name)
    }
}

fn copy_failure(layer: &str, error: Error) -> Error {
    match error {
        Error::LayerExists { .. }
        | Error::ReadOnly { .. }
        | Error::LayerNotFound { .. }
        | Error::CopyFailure { .. } => error,
        other => Error::CopyFailure {
            layer: layer.to_string(),
            reason: other.to_string(),
        },
    }
}
