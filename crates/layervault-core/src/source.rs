//! Scoped ownership of an opened source
//!
//! A [`SourceHandle`] owns one driver-level source. Dropping the handle
//! always releases it; flushing is an explicit step. [`with_source`] wraps
//! the usual pattern: run a block, flush only if the block succeeded, and
//! release in every case.
//!
//! ```ignore
//! let names = with_source(&registry, "package.gpkg", AccessMode::ReadOnly, |source| {
//!     catalog::layer_names(source)
//! })?;
//! ```

use tracing::debug;

use crate::connection::redact_location;
use crate::driver::{AccessMode, DataSource, DriverRegistry};
use crate::error::Result;

/// An opened source, released on drop
pub struct SourceHandle {
    inner: Box<dyn DataSource>,
    location: String,
}

impl SourceHandle {
    /// Open an existing source through the registry
    pub fn open(registry: &DriverRegistry, location: &str, mode: AccessMode) -> Result<Self> {
        let inner = registry.open(location, mode)?;
        Ok(Self::from_source(inner))
    }

    /// Create a new source with the named driver
    pub fn create(registry: &DriverRegistry, driver: &str, location: &str) -> Result<Self> {
        let inner = registry.create(driver, location)?;
        Ok(Self::from_source(inner))
    }

    /// Take ownership of a source opened elsewhere
    pub fn from_source(inner: Box<dyn DataSource>) -> Self {
        let location = redact_location(inner.location());
        Self { inner, location }
    }

    /// Location with credentials redacted, safe for logs
    pub fn display_location(&self) -> &str {
        &self.location
    }

    pub fn driver_name(&self) -> &'static str {
        self.inner.driver_name()
    }

    pub fn is_writable(&self) -> bool {
        self.inner.is_writable()
    }

    /// Make pending writes durable
    pub fn flush(&mut self) -> Result<()> {
        debug!(location = %self.location, "Flushing source");
        self.inner.flush()
    }

    /// Flush, then release
    pub fn close(mut self) -> Result<()> {
        self.flush()
    }

    pub(crate) fn source(&self) -> &dyn DataSource {
        self.inner.as_ref()
    }

    pub(crate) fn source_mut(&mut self) -> &mut dyn DataSource {
        self.inner.as_mut()
    }
}

impl Drop for SourceHandle {
    fn drop(&mut self) {
        debug!(location = %self.location, "Releasing source");
    }
}

impl std::fmt::Debug for SourceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceHandle")
            .field("driver", &self.inner.driver_name())
            .field("location", &self.location)
            .field("writable", &self.inner.is_writable())
            .finish()
    }
}

/// Open a source, run `f`, flush on success, release always
///
/// When `f` fails the handle is released without flushing, so pending
/// writes are not guaranteed to reach the store.
pub fn with_source<T, F>(
    registry: &DriverRegistry,
    location: &str,
    mode: AccessMode,
    f: F,
) -> Result<T>
where
    F: FnOnce(&mut SourceHandle) -> Result<T>,
{
    let mut handle = SourceHandle::open(registry, location, mode)?;
    let value = f(&mut handle)?;
    handle.flush()?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{MemoryDriver, MemoryStore};
    use crate::error::Error;
    use crate::models::LayerDefinition;
    use std::sync::Arc;

    const LOCATION: &str = "PG: host=localhost port=5432 dbname=gis active_schema=public user=geo password=pw";

    fn setup() -> (MemoryDriver, DriverRegistry) {
        let driver = MemoryDriver::new();
        driver.insert(
            LOCATION,
            MemoryStore::new().with_layer(LayerDefinition::new("roads"), Vec::new()),
        );
        let registry = DriverRegistry::default().with_driver(Arc::new(driver.clone()));
        (driver, registry)
    }

    #[test]
    fn test_open_and_redacted_location() {
        let (_, registry) = setup();
        let handle = SourceHandle::open(&registry, LOCATION, AccessMode::ReadOnly).unwrap();

        assert_eq!(handle.driver_name(), "Memory");
        assert!(!handle.is_writable());
        assert!(!handle.display_location().contains("password=pw"));
        assert!(!format!("{:?}", handle).contains("password=pw"));
    }

    #[test]
    fn test_open_failure() {
        let registry = DriverRegistry::default();
        let err = SourceHandle::open(&registry, "/missing.gpkg", AccessMode::ReadOnly).unwrap_err();
        assert!(matches!(err, Error::SourceOpen { .. }));
    }

    #[test]
    fn test_with_source_flushes_on_success() {
        let (driver, registry) = setup();

        with_source(&registry, LOCATION, AccessMode::Update, |handle| {
            handle.source_mut().delete_layer("roads")
        })
        .unwrap();

        assert!(driver.snapshot(LOCATION).unwrap().layer("roads").is_none());
    }

    #[test]
    fn test_with_source_releases_without_flush_on_error() {
        let (driver, registry) = setup();

        let result: Result<()> = with_source(&registry, LOCATION, AccessMode::Update, |handle| {
            handle.source_mut().delete_layer("roads")?;
            Err(Error::Catalog("boom".to_string()))
        });

        assert!(result.is_err());
        assert!(driver.snapshot(LOCATION).unwrap().layer("roads").is_some());
    }

    #[test]
    fn test_close_flushes() {
        let (driver, registry) = setup();
        let mut handle = SourceHandle::open(&registry, LOCATION, AccessMode::Update).unwrap();
        handle.source_mut().delete_layer("roads").unwrap();
        handle.close().unwrap();

        assert!(driver.snapshot(LOCATION).unwrap().layer("roads").is_none());
    }
}
