//! Error handling
//!
//! Typed errors for source, layer, copy and backup operations, with
//! descriptive messages and recovery suggestions.
//!
//! Locations that carry credentials are redacted before they are stored in
//! an error, so every `Display` here is safe to log.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::connection::redact_location;

/// Errors that can occur while working with vector sources
#[derive(Error, Debug)]
pub enum Error {
    /// A source could not be opened or created
    #[error("Cannot open source '{location}': {reason}")]
    SourceOpen { location: String, reason: String },

    /// A named layer is absent from a source
    #[error("Layer '{layer}' not found in source '{location}'")]
    LayerNotFound { layer: String, location: String },

    /// A layer already exists and overwriting was not requested
    #[error("Layer '{layer}' already exists in source '{location}'")]
    LayerExists { layer: String, location: String },

    /// Two layers' schemas differ (raised only by callers that opt in)
    #[error("Schema of '{left}' is incompatible with '{right}': {new_fields} new, {deleted_fields} deleted field(s)")]
    SchemaIncompatible {
        left: String,
        right: String,
        new_fields: usize,
        deleted_fields: usize,
    },

    /// The backup destination cannot be used
    #[error("Backup aborted: destination '{path}' {reason}")]
    BackupAborted { path: PathBuf, reason: String },

    /// A layer copy (native or external process) did not complete
    #[error("Copy of layer '{layer}' failed: {reason}")]
    CopyFailure { layer: String, reason: String },

    /// A write was attempted on a source opened read-only
    #[error("Source '{location}' is opened read-only")]
    ReadOnly { location: String },

    /// A connection descriptor could not be parsed
    #[error("Invalid connection descriptor: {0}")]
    InvalidConnection(String),

    /// The external layer catalog could not be read or written
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// SQLite error from the GeoPackage driver
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Generic I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Build a `SourceOpen` error, redacting credentials in the location
    pub fn source_open(location: &str, reason: impl Into<String>) -> Self {
        Error::SourceOpen {
            location: redact_location(location),
            reason: reason.into(),
        }
    }

    /// Build a `LayerNotFound` error, redacting credentials in the location
    pub fn layer_not_found(layer: impl Into<String>, location: &str) -> Self {
        Error::LayerNotFound {
            layer: layer.into(),
            location: redact_location(location),
        }
    }

    /// Build a `ReadOnly` error, redacting credentials in the location
    pub fn read_only(location: &str) -> Self {
        Error::ReadOnly {
            location: redact_location(location),
        }
    }

    /// Check if this error is worth retrying after the caller fixes something
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::SourceOpen { .. }
                | Error::LayerExists { .. }
                | Error::BackupAborted { .. }
                | Error::ReadOnly { .. }
        )
    }

    /// Get a recovery suggestion for this error
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            Error::SourceOpen { .. } => {
                Some("Check that the file exists, or that the database is reachable and the credentials are correct.")
            }
            Error::LayerExists { .. } => {
                Some("Enable overwrite or choose a different target layer name.")
            }
            Error::BackupAborted { .. } => {
                Some("Make sure the destination is an existing directory you have write permission for.")
            }
            Error::ReadOnly { .. } => Some("Open the source in update mode before writing to it."),
            Error::InvalidConnection(_) => {
                Some("Use the form 'PG: host=.. port=.. dbname=.. active_schema=.. user=.. password=..'.")
            }
            _ => None,
        }
    }
}

/// Result type for layervault operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_open_redacts_password() {
        let err = Error::source_open(
            "PG: host=db port=5432 dbname=gis active_schema=public user=geo password=hunter2",
            "connection refused",
        );

        let msg = err.to_string();
        assert!(msg.contains("host=db"));
        assert!(msg.contains("connection refused"));
        assert!(!msg.contains("hunter2"));
        assert!(err.is_recoverable());
        assert!(err.recovery_suggestion().is_some());
    }

    #[test]
    fn test_layer_not_found_display() {
        let err = Error::layer_not_found("roads", "/data/package.gpkg");

        let msg = err.to_string();
        assert!(msg.contains("roads"));
        assert!(msg.contains("/data/package.gpkg"));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_backup_aborted_display() {
        let err = Error::BackupAborted {
            path: PathBuf::from("/readonly"),
            reason: "is not writable".to_string(),
        };

        let msg = err.to_string();
        assert!(msg.contains("/readonly"));
        assert!(msg.contains("not writable"));
        assert!(err.recovery_suggestion().is_some());
    }

    #[test]
    fn test_schema_incompatible_counts() {
        let err = Error::SchemaIncompatible {
            left: "a".to_string(),
            right: "b".to_string(),
            new_fields: 2,
            deleted_fields: 1,
        };

        let msg = err.to_string();
        assert!(msg.contains("2 new"));
        assert!(msg.contains("1 deleted"));
    }

    #[test]
    fn test_io_conversion() {
        let err: Error = io::Error::new(io::ErrorKind::Other, "boom").into();
        assert!(matches!(err, Error::Io(_)));
    }
}
