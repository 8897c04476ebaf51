//! Uploaded layer packages
//!
//! A [`Package`] is a GeoPackage file opened read-only for as long as the
//! value lives. It answers catalog questions about its own layers, checks
//! them against live layers, and loads them into a database either
//! natively or through `ogr2ogr`.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::catalog;
use crate::connection::ConnectionDescriptor;
use crate::copier::{self, CopyOptions};
use crate::driver::{AccessMode, DriverRegistry};
use crate::error::{Error, Result};
use crate::layer::LayerView;
use crate::models::{Feature, SchemaField};
use crate::ogr2ogr::{ImportOptions, Ogr2Ogr};
use crate::portal::{CatalogEntry, LayerRegistration, PortalCatalog};
use crate::publish::DEFAULT_WORKSPACE;
use crate::schema::{self, SchemaDiffReport};
use crate::source::{with_source, SourceHandle};

/// A package file and its open source
#[derive(Debug)]
pub struct Package {
    path: PathBuf,
    registry: DriverRegistry,
    source: SourceHandle,
}

impl Package {
    /// Open the package at `path` read-only
    pub fn open(registry: &DriverRegistry, path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let source = SourceHandle::open(registry, &path.to_string_lossy(), AccessMode::ReadOnly)?;
        Ok(Self {
            path,
            registry: registry.clone(),
            source,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn source(&self) -> &SourceHandle {
        &self.source
    }

    pub fn layers(&self) -> Result<Vec<LayerView<'_>>> {
        catalog::list_layers(&self.source)
    }

    pub fn layer_names(&self) -> Result<Vec<String>> {
        catalog::layer_names(&self.source)
    }

    pub fn layer_exists(&self, name: &str) -> Result<bool> {
        catalog::layer_exists(&self.source, name)
    }

    pub fn get_layer(&self, name: &str) -> Result<Option<LayerView<'_>>> {
        catalog::get_layer(&self.source, name)
    }

    pub fn read_schema(&self) -> Result<Vec<(String, Vec<SchemaField>)>> {
        catalog::read_schema(&self.source)
    }

    /// Features of every layer, keyed by layer name
    pub fn features(&self) -> Result<Vec<(String, Vec<Feature>)>> {
        self.layers()?
            .into_iter()
            .map(|layer| Ok((layer.name().to_string(), layer.features()?)))
            .collect()
    }

    /// Compare package layer `name` with the live layer behind `alternate`
    ///
    /// `alternate` is the portal's `workspace:table` name; the table is
    /// looked up in the source at `live_location`.
    pub fn check_schema(
        &self,
        name: &str,
        live_location: &str,
        alternate: &str,
        ignore_case: bool,
    ) -> Result<SchemaDiffReport> {
        let layer = self
            .get_layer(name)?
            .ok_or_else(|| Error::layer_not_found(name, self.source.display_location()))?;

        let live = SourceHandle::open(&self.registry, live_location, AccessMode::ReadOnly)?;
        let table = CatalogEntry::new(alternate).table_name().to_string();
        let live_layer = catalog::get_layer(&live, &table)?
            .ok_or_else(|| Error::layer_not_found(alternate, live_location))?;

        Ok(schema::compare(&layer, &live_layer, ignore_case))
    }

    /// Copy a package layer natively into the source at `destination`
    ///
    /// The destination is opened for update and flushed once the copy
    /// succeeded. Returns the name of the created layer.
    pub fn layer_to_source(
        &self,
        name: &str,
        destination: &str,
        options: &CopyOptions,
    ) -> Result<String> {
        with_source(&self.registry, destination, AccessMode::Update, |dest| {
            let created = copier::copy_by_name(&self.source, name, dest, options)?;
            Ok(created.name().to_string())
        })
    }

    /// Load a package layer into the database with `ogr2ogr`
    pub fn layer_to_source_cmd(
        &self,
        name: &str,
        runner: &Ogr2Ogr,
        destination: &ConnectionDescriptor,
        options: &ImportOptions,
    ) -> Result<()> {
        if !self.layer_exists(name)? {
            return Err(Error::layer_not_found(name, self.source.display_location()));
        }
        runner.import(&self.path, destination, name, options)?;
        info!(layer = name, package = %self.path.display(), "Imported package layer");
        Ok(())
    }

    /// Register an imported package layer in the portal catalog
    ///
    /// The layer is recorded under the default workspace, backed by the
    /// datastore `store`. Returns whether a new record was created.
    pub fn register_layer(
        &self,
        name: &str,
        catalog: &mut dyn PortalCatalog,
        store: &str,
        owner: Option<String>,
    ) -> Result<bool> {
        let layer = self
            .get_layer(name)?
            .ok_or_else(|| Error::layer_not_found(name, self.source.display_location()))?;
        let registration = LayerRegistration::from_layer(&layer, store, DEFAULT_WORKSPACE, owner);

        debug!(
            alternate = %registration.alternate(),
            request = ?registration.feature_type_request(),
            "Registering package layer"
        );
        catalog.register_layer(registration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{MemoryDriver, MemoryStore};
    use crate::models::{FieldType, GeometryType, LayerDefinition};
    use std::sync::Arc;
    use tempfile::TempDir;

    const LIVE: &str = "mem://live";

    struct Fixture {
        _temp_dir: TempDir,
        driver: MemoryDriver,
        registry: DriverRegistry,
        package_path: PathBuf,
    }

    fn fixture() -> Fixture {
        let temp_dir = TempDir::new().unwrap();
        let driver = MemoryDriver::new();
        driver.insert(
            LIVE,
            MemoryStore::new().with_layer(
                LayerDefinition::new("roads")
                    .with_field("ID", FieldType::Integer, 0)
                    .with_field("name", FieldType::String, 50)
                    .with_geometry("geom", GeometryType::LineString),
                Vec::new(),
            ),
        );
        driver.insert(
            "mem://upload",
            MemoryStore::new().with_layer(
                LayerDefinition::new("roads")
                    .with_field("id", FieldType::Integer, 0)
                    .with_field("name", FieldType::String, 50)
                    .with_geometry("geom", GeometryType::LineString),
                vec![Feature::new(vec![1i64.into(), "Main".into()]).with_fid(1)],
            ),
        );
        let registry = DriverRegistry::default().with_driver(Arc::new(driver.clone()));

        let upload = SourceHandle::open(&registry, "mem://upload", AccessMode::ReadOnly).unwrap();
        let package_path = copier::export_layers(
            &registry,
            &upload,
            &temp_dir.path().join("package.gpkg"),
            None,
        )
        .unwrap();

        Fixture {
            _temp_dir: temp_dir,
            driver,
            registry,
            package_path,
        }
    }

    #[test]
    fn test_open_and_enumerate() {
        let f = fixture();
        let package = Package::open(&f.registry, &f.package_path).unwrap();

        assert_eq!(package.layer_names().unwrap(), vec!["roads"]);
        assert!(package.layer_exists("roads").unwrap());
        assert!(package.get_layer("lakes").unwrap().is_none());

        let schema = package.read_schema().unwrap();
        assert_eq!(schema[0].0, "roads");
        assert_eq!(schema[0].1.len(), 3);

        let features = package.features().unwrap();
        assert_eq!(features[0].1.len(), 1);
    }

    #[test]
    fn test_open_missing_package() {
        let registry = DriverRegistry::default();
        let err = Package::open(&registry, "/nonexistent/package.gpkg").unwrap_err();
        assert!(matches!(err, Error::SourceOpen { .. }));
    }

    #[test]
    fn test_check_schema() {
        let f = fixture();
        let package = Package::open(&f.registry, &f.package_path).unwrap();

        let report = package.check_schema("roads", LIVE, "geonode:roads", false).unwrap();
        assert!(!report.compatible);
        assert_eq!(report.new_fields, vec![SchemaField::attribute("id", FieldType::Integer, 0)]);
        assert_eq!(report.deleted_fields, vec![SchemaField::attribute("ID", FieldType::Integer, 0)]);

        let report = package.check_schema("roads", LIVE, "geonode:roads", true).unwrap();
        assert!(report.compatible);
    }

    #[test]
    fn test_check_schema_missing_layers() {
        let f = fixture();
        let package = Package::open(&f.registry, &f.package_path).unwrap();

        let err = package.check_schema("lakes", LIVE, "geonode:roads", false).unwrap_err();
        assert!(matches!(err, Error::LayerNotFound { ref layer, .. } if layer == "lakes"));

        let err = package.check_schema("roads", LIVE, "geonode:lakes", false).unwrap_err();
        assert!(matches!(err, Error::LayerNotFound { ref location, .. } if location == LIVE));
    }

    #[test]
    fn test_layer_to_source() {
        let f = fixture();
        let package = Package::open(&f.registry, &f.package_path).unwrap();

        let options = CopyOptions {
            target_name: Some("roads_upload".to_string()),
            ..Default::default()
        };
        let created = package.layer_to_source("roads", LIVE, &options).unwrap();
        assert_eq!(created, "roads_upload");

        let live = f.driver.snapshot(LIVE).unwrap();
        assert_eq!(live.layer("roads_upload").unwrap().features.len(), 1);
    }

    #[test]
    fn test_layer_to_source_missing_layer() {
        let f = fixture();
        let package = Package::open(&f.registry, &f.package_path).unwrap();

        let err = package
            .layer_to_source("lakes", LIVE, &CopyOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::LayerNotFound { .. }));
        assert_eq!(f.driver.snapshot(LIVE).unwrap().layer_names(), vec!["roads"]);
    }

    #[test]
    fn test_layer_to_source_cmd_checks_layer_first() {
        let f = fixture();
        let package = Package::open(&f.registry, &f.package_path).unwrap();
        let runner = Ogr2Ogr::new("/nonexistent/bin/ogr2ogr");
        let destination = ConnectionDescriptor::new("gis");

        let err = package
            .layer_to_source_cmd("lakes", &runner, &destination, &ImportOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::LayerNotFound { .. }));

        let err = package
            .layer_to_source_cmd("roads", &runner, &destination, &ImportOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::CopyFailure { .. }));
    }

    #[test]
    fn test_register_layer() {
        let f = fixture();
        let package = Package::open(&f.registry, &f.package_path).unwrap();
        let mut catalog = crate::portal::StaticCatalog::default();

        assert!(package.register_layer("roads", &mut catalog, "gis", None).unwrap());
        assert!(!package.register_layer("roads", &mut catalog, "gis", None).unwrap());

        let entries = catalog.registered_layers().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].alternate, "geonode:roads");
        assert_eq!(entries[0].geometry_attribute.as_deref(), Some("geom"));
        assert_eq!(entries[0].store.as_deref(), Some("gis"));

        let err = package.register_layer("lakes", &mut catalog, "gis", None).unwrap_err();
        assert!(matches!(err, Error::LayerNotFound { .. }));
    }
}
