//! External layer catalog
//!
//! The portal keeps its own registry of published layers, independent of
//! what physically exists in any source. Backups read it to decide which
//! layers to archive; imports write to it to register new layers.
//!
//! The host application owns the real registry. [`JsonCatalog`] is a
//! file-backed implementation for standalone use and [`StaticCatalog`] an
//! in-memory one for embedders and tests.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::layer::LayerView;
use crate::models::Extent;
use crate::publish::{self, FeatureTypeRequest, MapServerEndpoints};

/// Named style body attached to a registered layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleRef {
    pub name: String,
    #[serde(default)]
    pub body: Option<String>,
}

impl StyleRef {
    pub fn new(name: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            body: Some(body.into()),
        }
    }
}

/// One layer registered in the portal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Qualified name, `workspace:table`
    pub alternate: String,
    #[serde(default)]
    pub geometry_attribute: Option<String>,
    #[serde(default)]
    pub default_style: Option<StyleRef>,
    #[serde(default)]
    pub store: Option<String>,
    #[serde(default)]
    pub extent: Option<Extent>,
    #[serde(default)]
    pub owner: Option<String>,
}

impl CatalogEntry {
    pub fn new(alternate: impl Into<String>) -> Self {
        Self {
            alternate: alternate.into(),
            geometry_attribute: None,
            default_style: None,
            store: None,
            extent: None,
            owner: None,
        }
    }

    pub fn with_geometry_attribute(mut self, name: impl Into<String>) -> Self {
        self.geometry_attribute = Some(name.into());
        self
    }

    pub fn with_style(mut self, style: StyleRef) -> Self {
        self.default_style = Some(style);
        self
    }

    /// Table name inside the datastore: the last `:` segment of the alternate
    pub fn table_name(&self) -> &str {
        self.alternate.rsplit(':').next().unwrap_or(&self.alternate)
    }
}

/// Everything needed to register a layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerRegistration {
    pub name: String,
    pub store: String,
    pub workspace: String,
    pub bbox: Option<Extent>,
    pub owner: Option<String>,
    pub geometry_attribute: Option<String>,
}

impl LayerRegistration {
    /// Registration details taken from a live layer
    pub fn from_layer(
        layer: &LayerView<'_>,
        store: impl Into<String>,
        workspace: impl Into<String>,
        owner: Option<String>,
    ) -> Self {
        Self {
            name: layer.name().to_string(),
            store: store.into(),
            workspace: workspace.into(),
            bbox: layer.extent(),
            owner,
            geometry_attribute: layer.geometry_attribute().map(str::to_string),
        }
    }

    pub fn alternate(&self) -> String {
        publish::qualified_name(&self.workspace, &self.name)
    }

    /// Map-server request publishing the table under its own name
    pub fn feature_type_request(&self) -> FeatureTypeRequest {
        FeatureTypeRequest::new(&self.name, &self.name)
    }

    /// Endpoints for publishing this layer on the map server at `base_url`
    pub fn endpoints(&self, base_url: &str) -> MapServerEndpoints {
        MapServerEndpoints::new(base_url, &self.workspace, &self.store)
    }

    fn into_entry(self) -> CatalogEntry {
        CatalogEntry {
            alternate: self.alternate(),
            geometry_attribute: self.geometry_attribute,
            default_style: None,
            store: Some(self.store),
            extent: self.bbox,
            owner: self.owner,
        }
    }
}

/// Read/write contract of the portal's layer registry
pub trait PortalCatalog {
    /// Every registered layer with its geometry attribute and default style
    fn registered_layers(&self) -> Result<Vec<CatalogEntry>>;

    /// Register a layer unless one with the same alternate exists
    ///
    /// Returns whether a new record was created.
    fn register_layer(&mut self, registration: LayerRegistration) -> Result<bool>;
}

/// In-memory catalog
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    entries: Vec<CatalogEntry>,
}

impl StaticCatalog {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }
}

impl PortalCatalog for StaticCatalog {
    fn registered_layers(&self) -> Result<Vec<CatalogEntry>> {
        Ok(self.entries.clone())
    }

    fn register_layer(&mut self, registration: LayerRegistration) -> Result<bool> {
        Ok(insert_if_absent(&mut self.entries, registration))
    }
}

/// Catalog persisted as a JSON array of entries
///
/// A missing file reads as an empty catalog. Writes replace the file
/// atomically.
#[derive(Debug, Clone)]
pub struct JsonCatalog {
    path: PathBuf,
}

impl JsonCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Vec<CatalogEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)?;
        serde_json::from_str(&content).map_err(|e| {
            Error::Catalog(format!("failed to parse {}: {}", self.path.display(), e))
        })
    }

    fn save(&self, entries: &[CatalogEntry]) -> Result<()> {
        let content = serde_json::to_vec_pretty(entries)
            .map_err(|e| Error::Catalog(format!("failed to serialize catalog: {}", e)))?;
        atomic_write(&self.path, &content)
    }
}

impl PortalCatalog for JsonCatalog {
    fn registered_layers(&self) -> Result<Vec<CatalogEntry>> {
        self.load()
    }

    fn register_layer(&mut self, registration: LayerRegistration) -> Result<bool> {
        let mut entries = self.load()?;
        if !insert_if_absent(&mut entries, registration) {
            return Ok(false);
        }
        self.save(&entries)?;
        Ok(true)
    }
}

fn insert_if_absent(entries: &mut Vec<CatalogEntry>, registration: LayerRegistration) -> bool {
    let alternate = registration.alternate();
    if entries.iter().any(|e| e.alternate == alternate) {
        debug!(alternate = %alternate, "Layer already registered");
        return false;
    }
    debug!(alternate = %alternate, "Registering layer");
    entries.push(registration.into_entry());
    true
}

/// Write to a sibling temp file, sync, then rename over the target
fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let temp_path = path.with_extension("tmp");
    let mut file = File::create(&temp_path)?;
    file.write_all(data)?;
    file.sync_all()?;

    fs::rename(&temp_path, path)?;
    Ok(())
}
