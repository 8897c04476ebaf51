//! Layer enumeration
//!
//! Every call re-queries the source; nothing is cached. The reserved
//! style table is filtered out here, at the enumeration boundary, so no
//! caller ever sees it as a layer.

use crate::error::Result;
use crate::layer::LayerView;
use crate::models::SchemaField;
use crate::source::SourceHandle;

/// Name of the table that stores layer styles inside an archive
pub const STYLES_TABLE: &str = "layer_styles";

/// All layers of a source in source-native order, minus the style table
pub fn list_layers(source: &SourceHandle) -> Result<Vec<LayerView<'_>>> {
    let mut layers = Vec::new();
    for name in layer_names(source)? {
        if let Some(definition) = source.source().layer_definition(&name)? {
            layers.push(LayerView::new(source, definition));
        }
    }
    Ok(layers)
}

/// Names of all layers, minus the style table
pub fn layer_names(source: &SourceHandle) -> Result<Vec<String>> {
    Ok(source
        .source()
        .layer_names()?
        .into_iter()
        .filter(|name| name != STYLES_TABLE)
        .collect())
}

/// Whether an enumerable layer with exactly this name exists
pub fn layer_exists(source: &SourceHandle, name: &str) -> Result<bool> {
    Ok(name != STYLES_TABLE && source.source().layer_definition(name)?.is_some())
}

/// A view of the named layer, or `None` when it does not exist
pub fn get_layer<'a>(source: &'a SourceHandle, name: &str) -> Result<Option<LayerView<'a>>> {
    if name == STYLES_TABLE {
        return Ok(None);
    }
    Ok(source
        .source()
        .layer_definition(name)?
        .map(|definition| LayerView::new(source, definition)))
}

/// Full schema of every layer, keyed by layer name
pub fn read_schema(source: &SourceHandle) -> Result<Vec<(String, Vec<SchemaField>)>> {
    Ok(list_layers(source)?
        .into_iter()
        .map(|layer| (layer.name().to_string(), layer.full_schema()))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{AccessMode, DriverRegistry, MemoryDriver, MemoryStore};
    use crate::models::{FieldType, GeometryType, LayerDefinition};
    use std::sync::Arc;

    const LOCATION: &str = "mem://portal";

    fn open() -> SourceHandle {
        let driver = MemoryDriver::new();
        driver.insert(
            LOCATION,
            MemoryStore::new()
                .with_layer(
                    LayerDefinition::new("roads")
                        .with_field("name", FieldType::String, 50)
                        .with_geometry("geom", GeometryType::LineString),
                    Vec::new(),
                )
                .with_layer(
                    LayerDefinition::new(STYLES_TABLE).with_field("style_name", FieldType::String, 0),
                    Vec::new(),
                )
                .with_layer(
                    LayerDefinition::new("parcels").with_geometry("geom", GeometryType::Polygon),
                    Vec::new(),
                ),
        );
        let registry = DriverRegistry::empty().with_driver(Arc::new(driver));
        SourceHandle::open(&registry, LOCATION, AccessMode::ReadOnly).unwrap()
    }

    #[test]
    fn test_list_layers_skips_style_table() {
        let source = open();
        let names: Vec<String> = list_layers(&source)
            .unwrap()
            .iter()
            .map(|l| l.name().to_string())
            .collect();
        assert_eq!(names, vec!["roads".to_string(), "parcels".to_string()]);
        assert_eq!(layer_names(&source).unwrap(), names);
    }

    #[test]
    fn test_layer_exists_matches_listing() {
        let source = open();
        let names = layer_names(&source).unwrap();

        for candidate in ["roads", "parcels", STYLES_TABLE, "lakes", "Roads"] {
            assert_eq!(
                layer_exists(&source, candidate).unwrap(),
                names.iter().any(|n| n == candidate),
                "mismatch for {}",
                candidate
            );
        }
    }

    #[test]
    fn test_get_layer() {
        let source = open();

        let roads = get_layer(&source, "roads").unwrap().unwrap();
        assert_eq!(roads.geometry_attribute(), Some("geom"));
        assert_eq!(roads.full_schema().len(), 2);

        assert!(get_layer(&source, "lakes").unwrap().is_none());
        assert!(get_layer(&source, STYLES_TABLE).unwrap().is_none());
    }

    #[test]
    fn test_read_schema() {
        let source = open();
        let schema = read_schema(&source).unwrap();

        assert_eq!(schema.len(), 2);
        assert_eq!(schema[0].0, "roads");
        assert_eq!(schema[0].1[0].name, "name");
        assert_eq!(schema[1].1[0].name, "geom");
    }
}
