//! layervault Core Library
//!
//! Introspection, schema comparison, copying and backup of geospatial
//! vector layers held in GeoPackage files and spatial databases, for a
//! portal that keeps its own registry of published layers.
//!
//! # Architecture
//!
//! - **Drivers**: a [`DriverRegistry`] resolves locations to sources; the
//!   GeoPackage driver ships here, database drivers plug in through the
//!   same [`Driver`]/[`DataSource`] traits
//! - **Sources**: a [`SourceHandle`] owns one opened source; flushing is an
//!   explicit step, release happens on drop
//! - **Backups**: a [`BackupOrchestrator`] archives every registered layer
//!   into a GeoPackage and reports a typed [`BackupOutcome`]
//!
//! # Quick Start
//!
//! ```text
//! let registry = DriverRegistry::default();
//! let source = SourceHandle::open(&registry, "package.gpkg", AccessMode::ReadOnly)?;
//!
//! for layer in catalog::list_layers(&source)? {
//!     println!("{}: {} fields", layer.name(), layer.full_schema().len());
//! }
//! ```
//!
//! # Modules
//!
//! - `driver`: driver contract, registry, GeoPackage and in-memory drivers
//! - `source`: scoped source ownership
//! - `catalog`: layer enumeration
//! - `schema`: schema comparison
//! - `copier`: native layer copy and GeoPackage export
//! - `ogr2ogr`: import through the external converter
//! - `styles`: style table inside archives
//! - `portal`: the portal's layer registry
//! - `publish`: map-server request bodies and endpoints
//! - `backup`: portal backups
//! - `package`: uploaded package files
//! - `config`: application configuration

pub mod backup;
pub mod catalog;
pub mod config;
pub mod connection;
pub mod copier;
pub mod driver;
pub mod error;
pub mod layer;
pub mod models;
pub mod ogr2ogr;
pub mod package;
pub mod portal;
pub mod publish;
pub mod schema;
pub mod source;
pub mod styles;

pub use backup::{BackupFailure, BackupOrchestrator, BackupOutcome, BackupReport, BackupStage};
pub use config::Config;
pub use connection::ConnectionDescriptor;
pub use copier::CopyOptions;
pub use driver::{AccessMode, DataSource, Driver, DriverRegistry, GpkgDriver, MemoryDriver, MemoryStore};
pub use error::{Error, Result};
pub use layer::LayerView;
pub use models::{Feature, FieldType, FieldValue, GeometryType, LayerDefinition, SchemaField};
pub use ogr2ogr::{ImportOptions, Ogr2Ogr};
pub use package::Package;
pub use portal::{CatalogEntry, JsonCatalog, PortalCatalog, StaticCatalog};
pub use schema::SchemaDiffReport;
pub use source::{with_source, SourceHandle};
