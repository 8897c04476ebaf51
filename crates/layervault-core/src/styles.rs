//! Style table inside an archive
//!
//! Styles travel with the layers as rows of the reserved
//! [`STYLES_TABLE`](crate::catalog::STYLES_TABLE) attribute table:
//! `(layer_name, geometry_attribute, style_name, style_body, use_as_default, update_time)`.
//! The table is written through the source directly; the catalog hides it
//! from layer enumeration.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::STYLES_TABLE;
use crate::driver::CreateLayerOptions;
use crate::error::{Error, Result};
use crate::models::{Feature, FieldType, FieldValue, LayerDefinition};
use crate::source::SourceHandle;

/// One stored style
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleRecord {
    pub layer_name: String,
    pub geometry_attribute: String,
    pub style_name: String,
    pub style_body: String,
    pub use_as_default: bool,
}

impl StyleRecord {
    pub fn new(
        layer_name: impl Into<String>,
        geometry_attribute: impl Into<String>,
        style_name: impl Into<String>,
        style_body: impl Into<String>,
    ) -> Self {
        Self {
            layer_name: layer_name.into(),
            geometry_attribute: geometry_attribute.into(),
            style_name: style_name.into(),
            style_body: style_body.into(),
            use_as_default: false,
        }
    }

    pub fn as_default(mut self) -> Self {
        self.use_as_default = true;
        self
    }
}

/// Structure of the style table
pub fn table_definition() -> LayerDefinition {
    LayerDefinition::new(STYLES_TABLE)
        .with_field("layer_name", FieldType::String, 0)
        .with_field("geometry_attribute", FieldType::String, 0)
        .with_field("style_name", FieldType::String, 0)
        .with_field("style_body", FieldType::String, 0)
        .with_field("use_as_default", FieldType::Boolean, 0)
        .with_field("update_time", FieldType::DateTime, 0)
}

/// Whether the source carries a style table
pub fn has_table(source: &SourceHandle) -> Result<bool> {
    Ok(source.source().layer_definition(STYLES_TABLE)?.is_some())
}

/// Create the style table unless it already exists
pub fn create_table(source: &mut SourceHandle) -> Result<()> {
    if has_table(source)? {
        return Ok(());
    }
    source
        .source_mut()
        .create_layer(&table_definition(), CreateLayerOptions::default())?;
    debug!(location = source.display_location(), "Created style table");
    Ok(())
}

/// Append one style row
pub fn add_style(source: &mut SourceHandle, style: &StyleRecord) -> Result<()> {
    add_styles(source, std::slice::from_ref(style)).map(|_| ())
}

/// Append style rows, returning how many were written
pub fn add_styles(source: &mut SourceHandle, styles: &[StyleRecord]) -> Result<usize> {
    if !has_table(source)? {
        return Err(Error::layer_not_found(STYLES_TABLE, source.display_location()));
    }

    let now = Utc::now().to_rfc3339();
    let rows: Vec<Feature> = styles
        .iter()
        .map(|style| {
            Feature::new(vec![
                style.layer_name.as_str().into(),
                style.geometry_attribute.as_str().into(),
                style.style_name.as_str().into(),
                style.style_body.as_str().into(),
                style.use_as_default.into(),
                now.as_str().into(),
            ])
        })
        .collect();

    source.source_mut().write_features(STYLES_TABLE, &rows)
}

/// All stored styles, in insertion order
pub fn read_styles(source: &SourceHandle) -> Result<Vec<StyleRecord>> {
    if !has_table(source)? {
        return Ok(Vec::new());
    }

    let rows = source.source().read_features(STYLES_TABLE)?;
    Ok(rows
        .into_iter()
        .map(|row| {
            let text = |i: usize| match row.values.get(i) {
                Some(FieldValue::Text(t)) => t.clone(),
                _ => String::new(),
            };
            StyleRecord {
                layer_name: text(0),
                geometry_attribute: text(1),
                style_name: text(2),
                style_body: text(3),
                use_as_default: matches!(row.values.get(4), Some(FieldValue::Integer(v)) if *v != 0),
            }
        })
        .collect())
}

/// The default style stored for a layer, if any
pub fn default_style(source: &SourceHandle, layer_name: &str) -> Result<Option<StyleRecord>> {
    Ok(read_styles(source)?
        .into_iter()
        .find(|s| s.layer_name == layer_name && s.use_as_default))
}
