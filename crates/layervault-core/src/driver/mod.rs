//! Native vector driver contract
//!
//! The core never talks to a storage format directly. It goes through a
//! [`Driver`] that opens or creates a [`DataSource`], and a source exposes
//! layers as definitions plus feature rows.
//!
//! ## Drivers
//!
//! - `gpkg`: GeoPackage files, over SQLite
//! - `memory`: registered in-process stores (tests, embedders, stand-in
//!   for database-backed sources)
//!
//! Database drivers (PostGIS) live outside this crate and plug into a
//! [`DriverRegistry`] through the same traits.

pub mod gpkg;
pub mod memory;

use std::sync::Arc;

use tracing::debug;

use crate::connection::redact_location;
use crate::error::{Error, Result};
use crate::models::{Feature, LayerDefinition};

pub use gpkg::GpkgDriver;
pub use memory::{MemoryDriver, MemoryStore};

/// How a source is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    Update,
}

impl AccessMode {
    pub fn is_writable(&self) -> bool {
        matches!(self, AccessMode::Update)
    }
}

/// Options applied when a layer is created in a destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CreateLayerOptions {
    /// Replace a layer of the same name
    pub overwrite: bool,
    /// Ask for a session-scoped layer where the format supports it
    pub temporary: bool,
    /// Let the destination sanitize layer and field names
    pub launder: bool,
}

/// A storage format that can open and create sources
pub trait Driver: Send + Sync {
    /// Short driver name (e.g. `GPKG`)
    fn name(&self) -> &'static str;

    /// Whether this driver recognises the location
    fn can_open(&self, location: &str) -> bool;

    /// Open an existing source
    fn open(&self, location: &str, mode: AccessMode) -> Result<Box<dyn DataSource>>;

    /// Create a new, empty, writable source; fails if it already exists
    fn create(&self, location: &str) -> Result<Box<dyn DataSource>>;
}

/// An opened collection of layers
///
/// Writes are pending until [`DataSource::flush`]; dropping a source
/// without flushing releases it and may discard pending writes.
pub trait DataSource {
    /// Location the source was opened from
    fn location(&self) -> &str;

    /// Name of the driver that opened it
    fn driver_name(&self) -> &'static str;

    fn is_writable(&self) -> bool;

    /// Layer names in source-native order
    fn layer_names(&self) -> Result<Vec<String>>;

    /// Definition of a layer, or `None` when absent
    fn layer_definition(&self, name: &str) -> Result<Option<LayerDefinition>>;

    /// Total number of features in a layer
    fn feature_count(&self, name: &str) -> Result<u64>;

    /// All features of a layer, aligned with its definition
    fn read_features(&self, name: &str) -> Result<Vec<Feature>>;

    /// Create a layer and return the definition actually created
    ///
    /// Names in the returned definition may differ from the request when
    /// laundering is enabled.
    fn create_layer(
        &mut self,
        definition: &LayerDefinition,
        options: CreateLayerOptions,
    ) -> Result<LayerDefinition>;

    /// Append features to an existing layer, returning how many were written
    fn write_features(&mut self, name: &str, features: &[Feature]) -> Result<usize>;

    /// Remove a layer, returning whether it existed
    fn delete_layer(&mut self, name: &str) -> Result<bool>;

    /// Make pending writes durable
    fn flush(&mut self) -> Result<()>;
}

/// Ordered set of drivers used to resolve locations
#[derive(Clone)]
pub struct DriverRegistry {
    drivers: Vec<Arc<dyn Driver>>,
}

impl DriverRegistry {
    /// A registry with no drivers
    pub fn empty() -> Self {
        Self {
            drivers: Vec::new(),
        }
    }

    /// Register a driver; earlier registrations win on ambiguous locations
    pub fn register(&mut self, driver: Arc<dyn Driver>) {
        debug!(driver = driver.name(), "Registering vector driver");
        self.drivers.push(driver);
    }

    pub fn with_driver(mut self, driver: Arc<dyn Driver>) -> Self {
        self.register(driver);
        self
    }

    /// Names of registered drivers, in resolution order
    pub fn driver_names(&self) -> Vec<&'static str> {
        self.drivers.iter().map(|d| d.name()).collect()
    }

    /// Look up a driver by name (case-insensitive)
    pub fn driver(&self, name: &str) -> Option<Arc<dyn Driver>> {
        self.drivers
            .iter()
            .find(|d| d.name().eq_ignore_ascii_case(name))
            .cloned()
    }

    /// Find the driver that accepts a location
    pub fn resolve(&self, location: &str) -> Result<Arc<dyn Driver>> {
        self.drivers
            .iter()
            .find(|d| d.can_open(location))
            .cloned()
            .ok_or_else(|| Error::source_open(location, "no registered driver accepts this location"))
    }

    /// Open a location with the first driver that accepts it
    pub fn open(&self, location: &str, mode: AccessMode) -> Result<Box<dyn DataSource>> {
        let driver = self.resolve(location)?;
        debug!(
            driver = driver.name(),
            location = %redact_location(location),
            writable = mode.is_writable(),
            "Opening source"
        );
        driver.open(location, mode)
    }

    /// Create a new source with the named driver
    pub fn create(&self, driver_name: &str, location: &str) -> Result<Box<dyn DataSource>> {
        let driver = self
            .driver(driver_name)
            .ok_or_else(|| Error::source_open(location, format!("driver '{}' is not registered", driver_name)))?;
        debug!(
            driver = driver.name(),
            location = %redact_location(location),
            "Creating source"
        );
        driver.create(location)
    }
}

impl std::fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("drivers", &self.driver_names())
            .finish()
    }
}

impl Default for DriverRegistry {
    /// The file drivers shipped with this crate
    fn default() -> Self {
        Self::empty().with_driver(Arc::new(GpkgDriver))
    }
}

/// Sanitize a layer or field name the way laundering destinations do
///
/// Lower-cases ASCII and replaces anything outside `[a-z0-9_]` with `_`.
pub fn launder_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_alphanumeric() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Apply laundering to a whole definition
pub(crate) fn launder_definition(definition: &LayerDefinition) -> LayerDefinition {
    let mut laundered = definition.clone();
    laundered.name = launder_name(&definition.name);
    for field in &mut laundered.fields {
        field.name = launder_name(&field.name);
    }
    for geometry in &mut laundered.geometry_fields {
        geometry.name = launder_name(&geometry.name);
    }
    laundered
}
