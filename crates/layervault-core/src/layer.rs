//! Read-only view of one layer
//!
//! A [`LayerView`] borrows its [`SourceHandle`], so it cannot outlive the
//! source it was read from. The definition is captured when the view is
//! created; features are read from the source on demand.

use crate::error::Result;
use crate::models::{Extent, Feature, FieldDefinition, GeometryField, LayerDefinition, SchemaField, SpatialRef};
use crate::source::SourceHandle;

/// A layer inside an opened source
#[derive(Debug, Clone)]
pub struct LayerView<'a> {
    source: &'a SourceHandle,
    definition: LayerDefinition,
}

impl<'a> LayerView<'a> {
    pub(crate) fn new(source: &'a SourceHandle, definition: LayerDefinition) -> Self {
        Self { source, definition }
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    /// Attribute fields in source order
    pub fn fields(&self) -> &[FieldDefinition] {
        &self.definition.fields
    }

    pub fn geometry_fields(&self) -> &[GeometryField] {
        &self.definition.geometry_fields
    }

    /// Attribute tuples, without geometry
    pub fn schema(&self) -> Vec<SchemaField> {
        self.definition
            .fields
            .iter()
            .map(|f| SchemaField::attribute(f.name.clone(), f.field_type, f.width))
            .collect()
    }

    /// Geometry tuples only
    pub fn geometry_schema(&self) -> Vec<SchemaField> {
        self.definition
            .geometry_fields
            .iter()
            .map(|g| SchemaField::geometry(g.name.clone(), g.geometry_type))
            .collect()
    }

    /// Attribute tuples followed by geometry tuples
    pub fn full_schema(&self) -> Vec<SchemaField> {
        self.definition.full_schema()
    }

    /// Name of the first geometry field, if any
    pub fn geometry_attribute(&self) -> Option<&str> {
        self.definition.geometry_fields.first().map(|g| g.name.as_str())
    }

    pub fn extent(&self) -> Option<Extent> {
        self.definition.extent
    }

    pub fn srs(&self) -> Option<&SpatialRef> {
        self.definition.srs.as_ref()
    }

    pub fn definition(&self) -> &LayerDefinition {
        &self.definition
    }

    pub fn feature_count(&self) -> Result<u64> {
        self.source.source().feature_count(self.name())
    }

    pub fn features(&self) -> Result<Vec<Feature>> {
        self.source.source().read_features(self.name())
    }

    /// The source this layer was read from
    pub fn source(&self) -> &'a SourceHandle {
        self.source
    }
}
