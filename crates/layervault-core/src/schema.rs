//! Schema comparison
//!
//! Two full schemas are compatible when, after optional lower-casing of
//! field names and a stable ascending sort by name, they are equal tuple
//! for tuple. The comparison only reports; [`SchemaDiffReport::ensure_compatible`]
//! is there for callers that want a hard failure.

use serde::Serialize;

use crate::error::{Error, Result};
use crate::layer::LayerView;
use crate::models::SchemaField;

/// Outcome of comparing two full schemas
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaDiffReport {
    pub compatible: bool,
    /// Tuples in the first schema that the second lacks, sorted by name
    pub new_fields: Vec<SchemaField>,
    /// Tuples in the second schema that the first lacks, sorted by name
    pub deleted_fields: Vec<SchemaField>,
}

impl SchemaDiffReport {
    /// Fail with `SchemaIncompatible` unless the schemas matched
    pub fn ensure_compatible(&self, left: &str, right: &str) -> Result<()> {
        if self.compatible {
            return Ok(());
        }
        Err(Error::SchemaIncompatible {
            left: left.to_string(),
            right: right.to_string(),
            new_fields: self.new_fields.len(),
            deleted_fields: self.deleted_fields.len(),
        })
    }
}

/// Compare the full schemas of two layers
pub fn compare(layer_a: &LayerView<'_>, layer_b: &LayerView<'_>, ignore_case: bool) -> SchemaDiffReport {
    compare_schemas(&layer_a.full_schema(), &layer_b.full_schema(), ignore_case)
}

/// Compare two full schemas given as tuples
pub fn compare_schemas(
    schema_a: &[SchemaField],
    schema_b: &[SchemaField],
    ignore_case: bool,
) -> SchemaDiffReport {
    let a = normalized(schema_a, ignore_case);
    let b = normalized(schema_b, ignore_case);

    let new_fields = sorted_by_name(a.iter().filter(|f| !b.contains(f)).cloned().collect());
    let deleted_fields = sorted_by_name(b.iter().filter(|f| !a.contains(f)).cloned().collect());

    SchemaDiffReport {
        compatible: a == b,
        new_fields,
        deleted_fields,
    }
}

fn normalized(schema: &[SchemaField], ignore_case: bool) -> Vec<SchemaField> {
    let fields = schema
        .iter()
        .map(|field| {
            let mut field = field.clone();
            if ignore_case {
                field.name = field.name.to_lowercase();
            }
            field
        })
        .collect();
    sorted_by_name(fields)
}

fn sorted_by_name(mut fields: Vec<SchemaField>) -> Vec<SchemaField> {
    // stable: equal names keep their original relative order
    fields.sort_by(|x, y| x.name.cmp(&y.name));
    fields
}
