//! In-process driver
//!
//! Serves sources registered by location string. Every open works on a
//! copy of the registered store; `flush` publishes the copy back, minus
//! temporary layers. Dropping an unflushed source discards its changes,
//! the same contract the file drivers honour.
//!
//! Used to stand in for database-backed sources in tests and by embedders
//! that already hold layers in memory.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{launder_definition, AccessMode, CreateLayerOptions, DataSource, Driver};
use crate::error::{Error, Result};
use crate::models::{Feature, LayerDefinition};

const DRIVER_NAME: &str = "Memory";

/// One layer held in memory
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryLayer {
    pub definition: LayerDefinition,
    pub features: Vec<Feature>,
    pub temporary: bool,
}

/// An ordered collection of layers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryStore {
    layers: Vec<MemoryLayer>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a layer with its features, replacing one of the same name
    pub fn with_layer(mut self, definition: LayerDefinition, features: Vec<Feature>) -> Self {
        self.layers.retain(|l| l.definition.name != definition.name);
        self.layers.push(MemoryLayer {
            definition,
            features,
            temporary: false,
        });
        self
    }

    pub fn layer(&self, name: &str) -> Option<&MemoryLayer> {
        self.layers.iter().find(|l| l.definition.name == name)
    }

    pub fn layer_names(&self) -> Vec<String> {
        self.layers.iter().map(|l| l.definition.name.clone()).collect()
    }
}

/// Driver over a shared map of registered stores
#[derive(Debug, Clone, Default)]
pub struct MemoryDriver {
    stores: Arc<Mutex<BTreeMap<String, MemoryStore>>>,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the store served at `location`
    pub fn insert(&self, location: impl Into<String>, store: MemoryStore) {
        self.lock().insert(location.into(), store);
    }

    /// Snapshot of the store currently published at `location`
    pub fn snapshot(&self, location: &str) -> Option<MemoryStore> {
        self.lock().get(location).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, MemoryStore>> {
        // A panic while holding the lock leaves the map itself intact.
        self.stores.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Driver for MemoryDriver {
    fn name(&self) -> &'static str {
        DRIVER_NAME
    }

    fn can_open(&self, location: &str) -> bool {
        self.lock().contains_key(location)
    }

    fn open(&self, location: &str, mode: AccessMode) -> Result<Box<dyn DataSource>> {
        let working = self
            .lock()
            .get(location)
            .cloned()
            .ok_or_else(|| Error::source_open(location, "no store registered at this location"))?;

        Ok(Box::new(MemorySource {
            stores: Arc::clone(&self.stores),
            location: location.to_string(),
            writable: mode.is_writable(),
            working,
        }))
    }

    fn create(&self, location: &str) -> Result<Box<dyn DataSource>> {
        let mut stores = self.lock();
        if stores.contains_key(location) {
            return Err(Error::source_open(location, "a store already exists at this location"));
        }
        stores.insert(location.to_string(), MemoryStore::new());

        Ok(Box::new(MemorySource {
            stores: Arc::clone(&self.stores),
            location: location.to_string(),
            writable: true,
            working: MemoryStore::new(),
        }))
    }
}

/// An opened in-memory source
pub struct MemorySource {
    stores: Arc<Mutex<BTreeMap<String, MemoryStore>>>,
    location: String,
    writable: bool,
    working: MemoryStore,
}

impl MemorySource {
    fn ensure_writable(&self) -> Result<()> {
        if self.writable {
            Ok(())
        } else {
            Err(Error::read_only(&self.location))
        }
    }

    fn layer_mut(&mut self, name: &str) -> Option<&mut MemoryLayer> {
        self.working
            .layers
            .iter_mut()
            .find(|l| l.definition.name == name)
    }
}

impl DataSource for MemorySource {
    fn location(&self) -> &str {
        &self.location
    }

    fn driver_name(&self) -> &'static str {
        DRIVER_NAME
    }

    fn is_writable(&self) -> bool {
        self.writable
    }

    fn layer_names(&self) -> Result<Vec<String>> {
        Ok(self.working.layer_names())
    }

    fn layer_definition(&self, name: &str) -> Result<Option<LayerDefinition>> {
        Ok(self.working.layer(name).map(|l| l.definition.clone()))
    }

    fn feature_count(&self, name: &str) -> Result<u64> {
        self.working
            .layer(name)
            .map(|l| l.features.len() as u64)
            .ok_or_else(|| Error::layer_not_found(name, &self.location))
    }

    fn read_features(&self, name: &str) -> Result<Vec<Feature>> {
        self.working
            .layer(name)
            .map(|l| l.features.clone())
            .ok_or_else(|| Error::layer_not_found(name, &self.location))
    }

    fn create_layer(
        &mut self,
        definition: &LayerDefinition,
        options: CreateLayerOptions,
    ) -> Result<LayerDefinition> {
        self.ensure_writable()?;

        let definition = if options.launder {
            launder_definition(definition)
        } else {
            definition.clone()
        };

        if self.working.layer(&definition.name).is_some() {
            if !options.overwrite {
                return Err(Error::LayerExists {
                    layer: definition.name.clone(),
                    location: self.location.clone(),
                });
            }
            self.delete_layer(&definition.name)?;
        }

        self.working.layers.push(MemoryLayer {
            definition: definition.clone(),
            features: Vec::new(),
            temporary: options.temporary,
        });
        Ok(definition)
    }

    fn write_features(&mut self, name: &str, features: &[Feature]) -> Result<usize> {
        self.ensure_writable()?;

        let location = self.location.clone();
        let layer = self
            .layer_mut(name)
            .ok_or_else(|| Error::layer_not_found(name, &location))?;

        let field_count = layer.definition.fields.len();
        if let Some(bad) = features.iter().find(|f| f.values.len() != field_count) {
            return Err(Error::CopyFailure {
                layer: name.to_string(),
                reason: format!(
                    "feature has {} values but the layer has {} fields",
                    bad.values.len(),
                    field_count
                ),
            });
        }

        let mut next_fid = layer.features.iter().filter_map(|f| f.fid).max().unwrap_or(0) + 1;
        for feature in features {
            let mut feature = feature.clone();
            if feature.fid.is_none() {
                feature.fid = Some(next_fid);
                next_fid += 1;
            }
            layer.features.push(feature);
        }
        Ok(features.len())
    }

    fn delete_layer(&mut self, name: &str) -> Result<bool> {
        self.ensure_writable()?;

        let before = self.working.layers.len();
        self.working.layers.retain(|l| l.definition.name != name);
        Ok(self.working.layers.len() != before)
    }

    fn flush(&mut self) -> Result<()> {
        if !self.writable {
            return Ok(());
        }

        let published = MemoryStore {
            layers: self
                .working
                .layers
                .iter()
                .filter(|l| !l.temporary)
                .cloned()
                .collect(),
        };
        self.stores
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(self.location.clone(), published);
        Ok(())
    }
}
