//! Data models for vector layers
//!
//! Defines layer definitions (attribute and geometry fields), the flat
//! schema tuples used for comparison, and the feature rows moved between
//! sources. Geometry payloads stay opaque encoded blobs.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Attribute field type, named the way the native driver names them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    Integer,
    Integer64,
    Real,
    String,
    Date,
    DateTime,
    Binary,
    Boolean,
}

impl FieldType {
    /// Map a SQL declared column type to a field type and width
    ///
    /// `TEXT(50)` becomes `(String, 50)`; unknown declarations fall back to
    /// `String` so a source with exotic columns can still be listed.
    pub fn from_declared(declared: &str) -> (FieldType, u32) {
        let upper = declared.trim().to_ascii_uppercase();
        let (base, width) = match upper.split_once('(') {
            Some((base, rest)) => {
                let width = rest.trim_end_matches(')').trim().parse().unwrap_or(0);
                (base.trim().to_string(), width)
            }
            None => (upper, 0),
        };

        let field_type = match base.as_str() {
            "BOOLEAN" => FieldType::Boolean,
            "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" => FieldType::Integer,
            "INTEGER" | "BIGINT" => FieldType::Integer64,
            "FLOAT" | "DOUBLE" | "REAL" | "NUMERIC" => FieldType::Real,
            "DATE" => FieldType::Date,
            "DATETIME" | "TIMESTAMP" => FieldType::DateTime,
            "BLOB" => FieldType::Binary,
            _ => FieldType::String,
        };
        (field_type, width)
    }

    /// SQL declared type for a column of this type, carrying the width
    pub fn declared(&self, width: u32) -> String {
        let base = match self {
            FieldType::Integer => "MEDIUMINT",
            FieldType::Integer64 => "INTEGER",
            FieldType::Real => "REAL",
            FieldType::String => "TEXT",
            FieldType::Date => "DATE",
            FieldType::DateTime => "DATETIME",
            FieldType::Binary => "BLOB",
            FieldType::Boolean => "BOOLEAN",
        };
        if width > 0 {
            format!("{}({})", base, width)
        } else {
            base.to_string()
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::Integer => "Integer",
            FieldType::Integer64 => "Integer64",
            FieldType::Real => "Real",
            FieldType::String => "String",
            FieldType::Date => "Date",
            FieldType::DateTime => "DateTime",
            FieldType::Binary => "Binary",
            FieldType::Boolean => "Boolean",
        };
        f.write_str(name)
    }
}

/// Geometry type of a geometry field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeometryType {
    Geometry,
    Point,
    LineString,
    Polygon,
    MultiPoint,
    MultiLineString,
    MultiPolygon,
    GeometryCollection,
}

impl GeometryType {
    /// Parse a GeoPackage `geometry_type_name`; unknown names map to `Geometry`
    pub fn from_name(name: &str) -> GeometryType {
        match name.trim().to_ascii_uppercase().as_str() {
            "POINT" => GeometryType::Point,
            "LINESTRING" => GeometryType::LineString,
            "POLYGON" => GeometryType::Polygon,
            "MULTIPOINT" => GeometryType::MultiPoint,
            "MULTILINESTRING" => GeometryType::MultiLineString,
            "MULTIPOLYGON" => GeometryType::MultiPolygon,
            "GEOMETRYCOLLECTION" => GeometryType::GeometryCollection,
            _ => GeometryType::Geometry,
        }
    }

    /// Upper-case name as stored in `gpkg_geometry_columns`
    pub fn gpkg_name(&self) -> &'static str {
        match self {
            GeometryType::Geometry => "GEOMETRY",
            GeometryType::Point => "POINT",
            GeometryType::LineString => "LINESTRING",
            GeometryType::Polygon => "POLYGON",
            GeometryType::MultiPoint => "MULTIPOINT",
            GeometryType::MultiLineString => "MULTILINESTRING",
            GeometryType::MultiPolygon => "MULTIPOLYGON",
            GeometryType::GeometryCollection => "GEOMETRYCOLLECTION",
        }
    }
}

impl fmt::Display for GeometryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GeometryType::Geometry => "Unknown (any)",
            GeometryType::Point => "Point",
            GeometryType::LineString => "Line String",
            GeometryType::Polygon => "Polygon",
            GeometryType::MultiPoint => "Multi Point",
            GeometryType::MultiLineString => "Multi Line String",
            GeometryType::MultiPolygon => "Multi Polygon",
            GeometryType::GeometryCollection => "Geometry Collection",
        };
        f.write_str(name)
    }
}

/// An attribute field of a layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    pub field_type: FieldType,
    pub width: u32,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, field_type: FieldType, width: u32) -> Self {
        Self {
            name: name.into(),
            field_type,
            width,
        }
    }
}

/// A geometry field of a layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeometryField {
    pub name: String,
    pub geometry_type: GeometryType,
}

impl GeometryField {
    pub fn new(name: impl Into<String>, geometry_type: GeometryType) -> Self {
        Self {
            name: name.into(),
            geometry_type,
        }
    }
}

/// Type element of a schema tuple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SchemaType {
    Field(FieldType),
    Geometry(GeometryType),
}

impl fmt::Display for SchemaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaType::Field(t) => t.fmt(f),
            SchemaType::Geometry(t) => t.fmt(f),
        }
    }
}

/// One `(name, type, width)` tuple of a full schema
///
/// Geometry fields always carry width 0.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemaField {
    pub name: String,
    pub field_type: SchemaType,
    pub width: u32,
}

impl SchemaField {
    pub fn attribute(name: impl Into<String>, field_type: FieldType, width: u32) -> Self {
        Self {
            name: name.into(),
            field_type: SchemaType::Field(field_type),
            width,
        }
    }

    pub fn geometry(name: impl Into<String>, geometry_type: GeometryType) -> Self {
        Self {
            name: name.into(),
            field_type: SchemaType::Geometry(geometry_type),
            width: 0,
        }
    }
}

impl fmt::Display for SchemaField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.name, self.field_type, self.width)
    }
}

/// Bounding box of a layer in its own spatial reference
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

/// Spatial reference system as recorded in the source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpatialRef {
    pub srs_id: i64,
    pub name: String,
    pub organization: String,
    pub organization_id: i64,
    pub definition: String,
}

impl SpatialRef {
    /// EPSG:4326, present in every GeoPackage
    pub fn wgs84() -> Self {
        Self {
            srs_id: 4326,
            name: "WGS 84 geodetic".to_string(),
            organization: "EPSG".to_string(),
            organization_id: 4326,
            definition: "GEOGCS[\"WGS 84\",DATUM[\"WGS_1984\",SPHEROID[\"WGS 84\",6378137,298.257223563,AUTHORITY[\"EPSG\",\"7030\"]],AUTHORITY[\"EPSG\",\"6326\"]],PRIMEM[\"Greenwich\",0,AUTHORITY[\"EPSG\",\"8901\"]],UNIT[\"degree\",0.0174532925199433,AUTHORITY[\"EPSG\",\"9122\"]],AUTHORITY[\"EPSG\",\"4326\"]]".to_string(),
        }
    }
}

/// Everything needed to recreate a layer's structure elsewhere
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerDefinition {
    pub name: String,
    pub fields: Vec<FieldDefinition>,
    pub geometry_fields: Vec<GeometryField>,
    pub extent: Option<Extent>,
    pub srs: Option<SpatialRef>,
}

impl LayerDefinition {
    /// A layer with no fields yet
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            geometry_fields: Vec::new(),
            extent: None,
            srs: None,
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, field_type: FieldType, width: u32) -> Self {
        self.fields.push(FieldDefinition::new(name, field_type, width));
        self
    }

    pub fn with_geometry(mut self, name: impl Into<String>, geometry_type: GeometryType) -> Self {
        self.geometry_fields.push(GeometryField::new(name, geometry_type));
        self
    }

    /// Attribute fields followed by geometry fields, as schema tuples
    pub fn full_schema(&self) -> Vec<SchemaField> {
        self.fields
            .iter()
            .map(|f| SchemaField::attribute(f.name.clone(), f.field_type, f.width))
            .chain(
                self.geometry_fields
                    .iter()
                    .map(|g| SchemaField::geometry(g.name.clone(), g.geometry_type)),
            )
            .collect()
    }

    /// Whether this is a plain attribute table without geometry
    pub fn is_attribute_table(&self) -> bool {
        self.geometry_fields.is_empty()
    }
}

/// An attribute value of a feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Integer(i64::from(value))
    }
}

/// One feature row, positionally aligned with its layer definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    /// Feature id; `None` lets the destination assign one
    pub fid: Option<i64>,
    /// One encoded geometry per geometry field
    pub geometries: Vec<Option<Vec<u8>>>,
    /// One value per attribute field
    pub values: Vec<FieldValue>,
}

impl Feature {
    pub fn new(values: Vec<FieldValue>) -> Self {
        Self {
            fid: None,
            geometries: Vec::new(),
            values,
        }
    }

    pub fn with_fid(mut self, fid: i64) -> Self {
        self.fid = Some(fid);
        self
    }

    pub fn with_geometry(mut self, geometry: Option<Vec<u8>>) -> Self {
        self.geometries.push(geometry);
        self
    }
}
