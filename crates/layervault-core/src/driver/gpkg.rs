//! GeoPackage driver
//!
//! A GeoPackage is a SQLite database with three metadata tables:
//!
//! - `gpkg_spatial_ref_sys` - spatial reference systems
//! - `gpkg_contents` - one row per layer (`features` or `attributes`)
//! - `gpkg_geometry_columns` - the geometry column of each feature layer
//!
//! Writable sources keep a transaction open; `flush` commits it. Closing a
//! source without flushing rolls pending writes back.

use std::path::Path;

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OpenFlags, OptionalExtension};
use tracing::{debug, warn};

use super::{launder_definition, AccessMode, CreateLayerOptions, DataSource, Driver};
use crate::connection::is_database_location;
use crate::error::{Error, Result};
use crate::models::{
    Extent, Feature, FieldDefinition, FieldType, FieldValue, GeometryField, GeometryType,
    LayerDefinition, SpatialRef,
};

/// `application_id` of a GeoPackage ("GPKG")
pub const APPLICATION_ID: i32 = 0x4750_4B47;

/// `user_version` for GeoPackage 1.3
pub const USER_VERSION: i32 = 10300;

/// File extension of GeoPackage files
pub const EXTENSION: &str = "gpkg";

const DRIVER_NAME: &str = "GPKG";

/// Initialize the GeoPackage metadata tables and default SRS rows
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(&format!(
        "PRAGMA application_id = {}; PRAGMA user_version = {};",
        APPLICATION_ID, USER_VERSION
    ))?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS gpkg_spatial_ref_sys (
            srs_name TEXT NOT NULL,
            srs_id INTEGER NOT NULL PRIMARY KEY,
            organization TEXT NOT NULL,
            organization_coordsys_id INTEGER NOT NULL,
            definition TEXT NOT NULL,
            description TEXT
        );

        CREATE TABLE IF NOT EXISTS gpkg_contents (
            table_name TEXT NOT NULL PRIMARY KEY,
            data_type TEXT NOT NULL,
            identifier TEXT UNIQUE,
            description TEXT DEFAULT '',
            last_change DATETIME NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now')),
            min_x DOUBLE,
            min_y DOUBLE,
            max_x DOUBLE,
            max_y DOUBLE,
            srs_id INTEGER,
            CONSTRAINT fk_gc_r_srs_id FOREIGN KEY (srs_id) REFERENCES gpkg_spatial_ref_sys(srs_id)
        );

        CREATE TABLE IF NOT EXISTS gpkg_geometry_columns (
            table_name TEXT NOT NULL,
            column_name TEXT NOT NULL,
            geometry_type_name TEXT NOT NULL,
            srs_id INTEGER NOT NULL,
            z TINYINT NOT NULL,
            m TINYINT NOT NULL,
            CONSTRAINT pk_geom_cols PRIMARY KEY (table_name, column_name),
            CONSTRAINT uk_gc_table_name UNIQUE (table_name),
            CONSTRAINT fk_gc_tn FOREIGN KEY (table_name) REFERENCES gpkg_contents(table_name),
            CONSTRAINT fk_gc_srs FOREIGN KEY (srs_id) REFERENCES gpkg_spatial_ref_sys(srs_id)
        );

        INSERT OR IGNORE INTO gpkg_spatial_ref_sys
            (srs_name, srs_id, organization, organization_coordsys_id, definition, description)
        VALUES
            ('Undefined cartesian SRS', -1, 'NONE', -1, 'undefined', 'undefined cartesian coordinate reference system'),
            ('Undefined geographic SRS', 0, 'NONE', 0, 'undefined', 'undefined geographic coordinate reference system');
        "#,
    )?;

    insert_srs(conn, &SpatialRef::wgs84())?;
    Ok(())
}

/// Check whether a database carries the GeoPackage metadata tables
pub fn is_geopackage(conn: &Connection) -> bool {
    conn.prepare(
        "SELECT 1 FROM sqlite_master WHERE type='table' AND name IN ('gpkg_contents', 'gpkg_geometry_columns')",
    )
    .and_then(|mut stmt| {
        let mut rows = stmt.query([])?;
        let mut count = 0;
        while rows.next()?.is_some() {
            count += 1;
        }
        Ok(count == 2)
    })
    .unwrap_or(false)
}

fn insert_srs(conn: &Connection, srs: &SpatialRef) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO gpkg_spatial_ref_sys
            (srs_name, srs_id, organization, organization_coordsys_id, definition)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            srs.name,
            srs.srs_id,
            srs.organization,
            srs.organization_id,
            srs.definition
        ],
    )?;
    Ok(())
}

/// Quote an SQL identifier
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Driver for GeoPackage files
#[derive(Debug, Clone, Copy, Default)]
pub struct GpkgDriver;

impl Driver for GpkgDriver {
    fn name(&self) -> &'static str {
        DRIVER_NAME
    }

    fn can_open(&self, location: &str) -> bool {
        !is_database_location(location)
            && Path::new(location)
                .extension()
                .map(|ext| ext.eq_ignore_ascii_case(EXTENSION))
                .unwrap_or(false)
    }

    fn open(&self, location: &str, mode: AccessMode) -> Result<Box<dyn DataSource>> {
        let path = Path::new(location);
        if !path.is_file() {
            return Err(Error::source_open(location, "file does not exist"));
        }

        let flags = match mode {
            AccessMode::ReadOnly => OpenFlags::SQLITE_OPEN_READ_ONLY,
            AccessMode::Update => OpenFlags::SQLITE_OPEN_READ_WRITE,
        } | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let conn = Connection::open_with_flags(path, flags)
            .map_err(|e| Error::source_open(location, e.to_string()))?;

        if !is_geopackage(&conn) {
            return Err(Error::source_open(location, "not a GeoPackage"));
        }

        Ok(Box::new(GpkgSource::new(conn, location, mode.is_writable())?))
    }

    fn create(&self, location: &str) -> Result<Box<dyn DataSource>> {
        let path = Path::new(location);
        if path.exists() {
            return Err(Error::source_open(location, "file already exists"));
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| Error::source_open(location, e.to_string()))?;

        init_schema(&conn).map_err(|e| Error::source_open(location, e.to_string()))?;

        Ok(Box::new(GpkgSource::new(conn, location, true)?))
    }
}

/// An opened GeoPackage
pub struct GpkgSource {
    conn: Connection,
    location: String,
    writable: bool,
}

impl GpkgSource {
    fn new(conn: Connection, location: &str, writable: bool) -> Result<Self> {
        if writable {
            conn.execute_batch("BEGIN")?;
        }
        Ok(Self {
            conn,
            location: location.to_string(),
            writable,
        })
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.writable {
            Ok(())
        } else {
            Err(Error::read_only(&self.location))
        }
    }

    fn has_layer(&self, name: &str) -> Result<bool> {
        let exists = self
            .conn
            .prepare("SELECT 1 FROM gpkg_contents WHERE table_name = ?1")?
            .exists(params![name])?;
        Ok(exists)
    }

    /// Name of the integer primary key column, if the table declares one
    fn primary_key(&self, name: &str) -> Result<Option<String>> {
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({})", quote_ident(name)))?;
        let columns = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(5)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(columns
            .into_iter()
            .find(|(_, declared, pk)| *pk > 0 && declared.eq_ignore_ascii_case("INTEGER"))
            .map(|(column, _, _)| column))
    }

    fn spatial_ref(&self, srs_id: i64) -> Result<Option<SpatialRef>> {
        let srs = self
            .conn
            .query_row(
                "SELECT srs_name, organization, organization_coordsys_id, definition
                 FROM gpkg_spatial_ref_sys WHERE srs_id = ?1",
                params![srs_id],
                |row| {
                    Ok(SpatialRef {
                        srs_id,
                        name: row.get(0)?,
                        organization: row.get(1)?,
                        organization_id: row.get(2)?,
                        definition: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(srs)
    }
}

impl DataSource for GpkgSource {
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
        let mut stmt = self.conn.prepare(
            "SELECT table_name FROM gpkg_contents
             WHERE data_type IN ('features', 'attributes')
             ORDER BY rowid",
        )?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(names)
    }

    fn layer_definition(&self, name: &str) -> Result<Option<LayerDefinition>> {
        let contents = self
            .conn
            .query_row(
                "SELECT min_x, min_y, max_x, max_y, srs_id FROM gpkg_contents
                 WHERE table_name = ?1 AND data_type IN ('features', 'attributes')",
                params![name],
                |row| {
                    Ok((
                        row.get::<_, Option<f64>>(0)?,
                        row.get::<_, Option<f64>>(1)?,
                        row.get::<_, Option<f64>>(2)?,
                        row.get::<_, Option<f64>>(3)?,
                        row.get::<_, Option<i64>>(4)?,
                    ))
                },
            )
            .optional()?;

        let Some((min_x, min_y, max_x, max_y, srs_id)) = contents else {
            return Ok(None);
        };

        let mut stmt = self.conn.prepare(
            "SELECT column_name, geometry_type_name FROM gpkg_geometry_columns WHERE table_name = ?1",
        )?;
        let geometry_fields = stmt
            .query_map(params![name], |row| {
                let type_name: String = row.get(1)?;
                Ok(GeometryField::new(
                    row.get::<_, String>(0)?,
                    GeometryType::from_name(&type_name),
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({})", quote_ident(name)))?;
        let columns = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(5)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let fields = columns
            .into_iter()
            .filter(|(column, declared, pk)| {
                let is_fid = *pk > 0 && declared.eq_ignore_ascii_case("INTEGER");
                let is_geometry = geometry_fields.iter().any(|g| &g.name == column);
                !is_fid && !is_geometry
            })
            .map(|(column, declared, _)| {
                let (field_type, width) = FieldType::from_declared(&declared);
                FieldDefinition::new(column, field_type, width)
            })
            .collect();

        let extent = match (min_x, min_y, max_x, max_y) {
            (Some(min_x), Some(min_y), Some(max_x), Some(max_y)) => Some(Extent {
                min_x,
                min_y,
                max_x,
                max_y,
            }),
            _ => None,
        };

        let srs = match srs_id {
            Some(id) => self.spatial_ref(id)?,
            None => None,
        };

        Ok(Some(LayerDefinition {
            name: name.to_string(),
            fields,
            geometry_fields,
            extent,
            srs,
        }))
    }

    fn feature_count(&self, name: &str) -> Result<u64> {
        if !self.has_layer(name)? {
            return Err(Error::layer_not_found(name, &self.location));
        }
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", quote_ident(name)),
            [],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    fn read_features(&self, name: &str) -> Result<Vec<Feature>> {
        let definition = self
            .layer_definition(name)?
            .ok_or_else(|| Error::layer_not_found(name, &self.location))?;
        let fid_column = self
            .primary_key(name)?
            .unwrap_or_else(|| "rowid".to_string());

        let geometry_count = definition.geometry_fields.len();
        let columns: Vec<String> = std::iter::once(quote_ident(&fid_column))
            .chain(definition.geometry_fields.iter().map(|g| quote_ident(&g.name)))
            .chain(definition.fields.iter().map(|f| quote_ident(&f.name)))
            .collect();

        let sql = format!(
            "SELECT {} FROM {} ORDER BY 1",
            columns.join(", "),
            quote_ident(name)
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let features = stmt
            .query_map([], |row| {
                let fid: Option<i64> = row.get(0)?;
                let mut geometries = Vec::with_capacity(geometry_count);
                for i in 0..geometry_count {
                    geometries.push(row.get::<_, Option<Vec<u8>>>(1 + i)?);
                }
                let mut values = Vec::with_capacity(definition.fields.len());
                for i in 0..definition.fields.len() {
                    values.push(field_value(row.get::<_, Value>(1 + geometry_count + i)?));
                }
                Ok(Feature {
                    fid,
                    geometries,
                    values,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(features)
    }

    fn create_layer(
        &mut self,
        definition: &LayerDefinition,
        options: CreateLayerOptions,
    ) -> Result<LayerDefinition> {
        self.ensure_writable()?;

        let mut definition = if options.launder {
            launder_definition(definition)
        } else {
            definition.clone()
        };

        // One geometry column per table; extra ones are dropped, the first is kept.
        if definition.geometry_fields.len() > 1 {
            let dropped: Vec<String> = definition
                .geometry_fields
                .drain(1..)
                .map(|g| g.name)
                .collect();
            warn!(
                layer = %definition.name,
                dropped = ?dropped,
                "GeoPackage keeps only the first geometry field"
            );
        }

        if options.temporary {
            debug!(layer = %definition.name, "GeoPackage has no temporary layers, creating a regular table");
        }

        if self.has_layer(&definition.name)? {
            if !options.overwrite {
                return Err(Error::LayerExists {
                    layer: definition.name.clone(),
                    location: self.location.clone(),
                });
            }
            self.delete_layer(&definition.name)?;
        }

        let mut columns = vec!["\"fid\" INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL".to_string()];
        for geometry in &definition.geometry_fields {
            columns.push(format!(
                "{} {}",
                quote_ident(&geometry.name),
                geometry.geometry_type.gpkg_name()
            ));
        }
        for field in &definition.fields {
            columns.push(format!(
                "{} {}",
                quote_ident(&field.name),
                field.field_type.declared(field.width)
            ));
        }

        self.conn.execute_batch(&format!(
            "CREATE TABLE {} ({});",
            quote_ident(&definition.name),
            columns.join(", ")
        ))?;

        let srs_id = match (&definition.srs, definition.is_attribute_table()) {
            (_, true) => None,
            (Some(srs), false) => {
                insert_srs(&self.conn, srs)?;
                Some(srs.srs_id)
            }
            (None, false) => Some(-1),
        };

        let data_type = if definition.is_attribute_table() {
            "attributes"
        } else {
            "features"
        };
        let extent = definition.extent;
        self.conn.execute(
            "INSERT INTO gpkg_contents
                (table_name, data_type, identifier, min_x, min_y, max_x, max_y, srs_id)
             VALUES (?1, ?2, ?1, ?3, ?4, ?5, ?6, ?7)",
            params![
                definition.name,
                data_type,
                extent.map(|e| e.min_x),
                extent.map(|e| e.min_y),
                extent.map(|e| e.max_x),
                extent.map(|e| e.max_y),
                srs_id
            ],
        )?;

        for geometry in &definition.geometry_fields {
            self.conn.execute(
                "INSERT INTO gpkg_geometry_columns
                    (table_name, column_name, geometry_type_name, srs_id, z, m)
                 VALUES (?1, ?2, ?3, ?4, 0, 0)",
                params![
                    definition.name,
                    geometry.name,
                    geometry.geometry_type.gpkg_name(),
                    srs_id.unwrap_or(-1)
                ],
            )?;
        }

        debug!(layer = %definition.name, data_type, "Created GeoPackage layer");
        Ok(definition)
    }

    fn write_features(&mut self, name: &str, features: &[Feature]) -> Result<usize> {
        self.ensure_writable()?;

        let definition = self
            .layer_definition(name)?
            .ok_or_else(|| Error::layer_not_found(name, &self.location))?;
        let fid_column = self
            .primary_key(name)?
            .unwrap_or_else(|| "rowid".to_string());

        let columns: Vec<String> = std::iter::once(quote_ident(&fid_column))
            .chain(definition.geometry_fields.iter().map(|g| quote_ident(&g.name)))
            .chain(definition.fields.iter().map(|f| quote_ident(&f.name)))
            .collect();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();

        let mut stmt = self.conn.prepare(&format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(name),
            columns.join(", "),
            placeholders.join(", ")
        ))?;

        for feature in features {
            if feature.values.len() != definition.fields.len() {
                return Err(Error::CopyFailure {
                    layer: name.to_string(),
                    reason: format!(
                        "feature has {} values but the layer has {} fields",
                        feature.values.len(),
                        definition.fields.len()
                    ),
                });
            }

            let mut row: Vec<Value> = Vec::with_capacity(columns.len());
            row.push(feature.fid.map(Value::Integer).unwrap_or(Value::Null));
            for i in 0..definition.geometry_fields.len() {
                row.push(match feature.geometries.get(i) {
                    Some(Some(blob)) => Value::Blob(blob.clone()),
                    _ => Value::Null,
                });
            }
            row.extend(feature.values.iter().map(sql_value));

            stmt.execute(params_from_iter(row.iter()))?;
        }

        Ok(features.len())
    }

    fn delete_layer(&mut self, name: &str) -> Result<bool> {
        self.ensure_writable()?;

        if !self.has_layer(name)? {
            return Ok(false);
        }

        self.conn
            .execute_batch(&format!("DROP TABLE IF EXISTS {};", quote_ident(name)))?;
        self.conn.execute(
            "DELETE FROM gpkg_geometry_columns WHERE table_name = ?1",
            params![name],
        )?;
        self.conn
            .execute("DELETE FROM gpkg_contents WHERE table_name = ?1", params![name])?;

        debug!(layer = name, "Deleted GeoPackage layer");
        Ok(true)
    }

    fn flush(&mut self) -> Result<()> {
        if self.writable && !self.conn.is_autocommit() {
            self.conn.execute_batch("COMMIT; BEGIN;")?;
        }
        Ok(())
    }
}

fn field_value(value: Value) -> FieldValue {
    match value {
        Value::Null => FieldValue::Null,
        Value::Integer(i) => FieldValue::Integer(i),
        Value::Real(r) => FieldValue::Real(r),
        Value::Text(t) => FieldValue::Text(t),
        Value::Blob(b) => FieldValue::Blob(b),
    }
}

fn sql_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::Null => Value::Null,
        FieldValue::Integer(i) => Value::Integer(*i),
        FieldValue::Real(r) => Value::Real(*r),
        FieldValue::Text(t) => Value::Text(t.clone()),
        FieldValue::Blob(b) => Value::Blob(b.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn roads() -> LayerDefinition {
        let mut def = LayerDefinition::new("roads")
            .with_field("name", FieldType::String, 50)
            .with_field("lanes", FieldType::Integer, 0)
            .with_geometry("geom", GeometryType::LineString);
        def.extent = Some(Extent {
            min_x: 0.0,
            min_y: 1.0,
            max_x: 10.0,
            max_y: 11.0,
        });
        def.srs = Some(SpatialRef::wgs84());
        def
    }

    fn create(temp_dir: &TempDir, file: &str) -> (String, Box<dyn DataSource>) {
        let path = temp_dir.path().join(file).to_string_lossy().into_owned();
        let source = GpkgDriver.create(&path).unwrap();
        (path, source)
    }

    #[test]
    fn test_init_schema() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(!is_geopackage(&conn));

        init_schema(&conn).unwrap();
        assert!(is_geopackage(&conn));

        let app_id: i32 = conn
            .query_row("PRAGMA application_id", [], |row| row.get(0))
            .unwrap();
        assert_eq!(app_id, APPLICATION_ID);

        let srs_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM gpkg_spatial_ref_sys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(srs_count, 3);
    }

    #[test]
    fn test_can_open() {
        assert!(GpkgDriver.can_open("/data/package.gpkg"));
        assert!(GpkgDriver.can_open("/data/PACKAGE.GPKG"));
        assert!(!GpkgDriver.can_open("/data/package.shp"));
        assert!(!GpkgDriver.can_open("PG: dbname=x.gpkg"));
    }

    #[test]
    fn test_open_missing_file() {
        let err = GpkgDriver
            .open("/nonexistent/package.gpkg", AccessMode::ReadOnly)
            .err()
            .unwrap();
        assert!(matches!(err, Error::SourceOpen { .. }));
    }

    #[test]
    fn test_open_plain_sqlite_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("plain.gpkg");
        Connection::open(&path)
            .unwrap()
            .execute_batch("CREATE TABLE t (x INTEGER);")
            .unwrap();

        let err = GpkgDriver
            .open(path.to_str().unwrap(), AccessMode::ReadOnly)
            .err()
            .unwrap();
        assert!(err.to_string().contains("not a GeoPackage"));
    }

    #[test]
    fn test_create_refuses_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let (path, mut source) = create(&temp_dir, "a.gpkg");
        source.flush().unwrap();
        drop(source);

        assert!(matches!(GpkgDriver.create(&path), Err(Error::SourceOpen { .. })));
    }

    #[test]
    fn test_create_layer_and_read_definition() {
        let temp_dir = TempDir::new().unwrap();
        let (_, mut source) = create(&temp_dir, "a.gpkg");

        source.create_layer(&roads(), CreateLayerOptions::default()).unwrap();

        assert_eq!(source.layer_names().unwrap(), vec!["roads".to_string()]);
        let def = source.layer_definition("roads").unwrap().unwrap();
        assert_eq!(def.full_schema(), roads().full_schema());
        assert_eq!(def.extent, roads().extent);
        assert_eq!(def.srs.unwrap().srs_id, 4326);
        assert!(source.layer_definition("missing").unwrap().is_none());
    }

    #[test]
    fn test_write_and_read_features() {
        let temp_dir = TempDir::new().unwrap();
        let (_, mut source) = create(&temp_dir, "a.gpkg");
        source.create_layer(&roads(), CreateLayerOptions::default()).unwrap();

        let features = vec![
            Feature::new(vec!["Main St".into(), FieldValue::Integer(2)])
                .with_fid(7)
                .with_geometry(Some(vec![1, 2, 3])),
            Feature::new(vec![FieldValue::Null, FieldValue::Integer(4)]).with_geometry(None),
        ];
        assert_eq!(source.write_features("roads", &features).unwrap(), 2);

        let read = source.read_features("roads").unwrap();
        assert_eq!(read.len(), 2);
        assert_eq!(read[0].fid, Some(7));
        assert_eq!(read[0].geometries, vec![Some(vec![1, 2, 3])]);
        assert_eq!(read[0].values[0], FieldValue::Text("Main St".to_string()));
        assert_eq!(read[1].geometries, vec![None]);
        assert_eq!(source.feature_count("roads").unwrap(), 2);
    }

    #[test]
    fn test_create_layer_keeps_first_geometry_field() {
        let temp_dir = TempDir::new().unwrap();
        let (_, mut source) = create(&temp_dir, "a.gpkg");
        let sites = LayerDefinition::new("sites")
            .with_field("label", FieldType::String, 0)
            .with_geometry("pt", GeometryType::Point)
            .with_geometry("area", GeometryType::Polygon);

        let created = source.create_layer(&sites, CreateLayerOptions::default()).unwrap();
        assert_eq!(created.geometry_fields.len(), 1);
        assert_eq!(created.geometry_fields[0].name, "pt");

        let feature = Feature::new(vec!["a".into()])
            .with_geometry(Some(vec![1]))
            .with_geometry(Some(vec![2]));
        source.write_features("sites", &[feature]).unwrap();

        let def = source.layer_definition("sites").unwrap().unwrap();
        assert_eq!(def.geometry_fields, vec![GeometryField::new("pt", GeometryType::Point)]);
        let read = source.read_features("sites").unwrap();
        assert_eq!(read[0].geometries, vec![Some(vec![1])]);
    }

    #[test]
    fn test_field_widths_survive_create() {
        let temp_dir = TempDir::new().unwrap();
        let (_, mut source) = create(&temp_dir, "a.gpkg");
        let def = LayerDefinition::new("t")
            .with_field("id", FieldType::Integer, 10)
            .with_field("v", FieldType::Real, 8)
            .with_field("big", FieldType::Integer64, 0)
            .with_geometry("geom", GeometryType::Point);

        source.create_layer(&def, CreateLayerOptions::default()).unwrap();
        let read = source.layer_definition("t").unwrap().unwrap();
        assert_eq!(read.full_schema(), def.full_schema());
    }

    #[test]
    fn test_write_rejects_misaligned_feature() {
        let temp_dir = TempDir::new().unwrap();
        let (_, mut source) = create(&temp_dir, "a.gpkg");
        source.create_layer(&roads(), CreateLayerOptions::default()).unwrap();

        let err = source
            .write_features("roads", &[Feature::new(vec!["only one".into()])])
            .unwrap_err();
        assert!(matches!(err, Error::CopyFailure { .. }));
    }

    #[test]
    fn test_create_existing_layer_requires_overwrite() {
        let temp_dir = TempDir::new().unwrap();
        let (_, mut source) = create(&temp_dir, "a.gpkg");
        source.create_layer(&roads(), CreateLayerOptions::default()).unwrap();

        let err = source
            .create_layer(&roads(), CreateLayerOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::LayerExists { .. }));

        let options = CreateLayerOptions {
            overwrite: true,
            ..Default::default()
        };
        source.create_layer(&roads(), options).unwrap();
        assert_eq!(source.layer_names().unwrap().len(), 1);
    }

    #[test]
    fn test_launder_on_create() {
        let temp_dir = TempDir::new().unwrap();
        let (_, mut source) = create(&temp_dir, "a.gpkg");

        let def = LayerDefinition::new("Road Network")
            .with_field("Street-Name", FieldType::String, 0)
            .with_geometry("geom", GeometryType::LineString);
        let options = CreateLayerOptions {
            launder: true,
            ..Default::default()
        };
        let created = source.create_layer(&def, options).unwrap();

        assert_eq!(created.name, "road_network");
        assert_eq!(created.fields[0].name, "street_name");
        assert!(source.layer_definition("road_network").unwrap().is_some());
    }

    #[test]
    fn test_attribute_table() {
        let temp_dir = TempDir::new().unwrap();
        let (_, mut source) = create(&temp_dir, "a.gpkg");

        let def = LayerDefinition::new("lookup").with_field("code", FieldType::String, 0);
        source.create_layer(&def, CreateLayerOptions::default()).unwrap();

        let read = source.layer_definition("lookup").unwrap().unwrap();
        assert!(read.is_attribute_table());
        assert!(read.srs.is_none());
    }

    #[test]
    fn test_unflushed_writes_are_discarded() {
        let temp_dir = TempDir::new().unwrap();
        let (path, mut source) = create(&temp_dir, "a.gpkg");
        source.flush().unwrap();
        source.create_layer(&roads(), CreateLayerOptions::default()).unwrap();
        drop(source);

        let reopened = GpkgDriver.open(&path, AccessMode::ReadOnly).unwrap();
        assert!(reopened.layer_names().unwrap().is_empty());
    }

    #[test]
    fn test_flushed_writes_persist() {
        let temp_dir = TempDir::new().unwrap();
        let (path, mut source) = create(&temp_dir, "a.gpkg");
        source.create_layer(&roads(), CreateLayerOptions::default()).unwrap();
        source.flush().unwrap();
        drop(source);

        let reopened = GpkgDriver.open(&path, AccessMode::ReadOnly).unwrap();
        assert_eq!(reopened.layer_names().unwrap(), vec!["roads".to_string()]);
    }

    #[test]
    fn test_read_only_rejects_writes() {
        let temp_dir = TempDir::new().unwrap();
        let (path, mut source) = create(&temp_dir, "a.gpkg");
        source.flush().unwrap();
        drop(source);

        let mut reopened = GpkgDriver.open(&path, AccessMode::ReadOnly).unwrap();
        assert!(!reopened.is_writable());
        assert!(matches!(
            reopened.create_layer(&roads(), CreateLayerOptions::default()),
            Err(Error::ReadOnly { .. })
        ));
        assert!(matches!(reopened.delete_layer("roads"), Err(Error::ReadOnly { .. })));
    }

    #[test]
    fn test_delete_layer() {
        let temp_dir = TempDir::new().unwrap();
        let (_, mut source) = create(&temp_dir, "a.gpkg");
        source.create_layer(&roads(), CreateLayerOptions::default()).unwrap();

        assert!(source.delete_layer("roads").unwrap());
        assert!(!source.delete_layer("roads").unwrap());
        assert!(source.layer_names().unwrap().is_empty());
    }
}
