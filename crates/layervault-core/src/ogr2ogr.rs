//! Bulk layer import through the `ogr2ogr` executable
//!
//! An alternative to the native copier: hand a package file and a layer
//! name to the external converter and let it load the layer into the
//! database. The program is started with an argument vector, never through
//! a shell, so layer names and descriptors are passed verbatim.
//!
//! Only process-level success is reported. A non-zero exit status or
//! anything written to stderr counts as failure; there is no per-feature
//! detail.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::connection::ConnectionDescriptor;
use crate::error::{Error, Result};

/// Output format name the converter uses for PostGIS
pub const POSTGRES_FORMAT: &str = "PostgreSQL";

/// Flags passed to the converter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportOptions {
    #[serde(default = "default_true")]
    pub overwrite: bool,
    #[serde(default)]
    pub update: bool,
    #[serde(default)]
    pub append: bool,
    #[serde(default = "default_true")]
    pub skip_failures: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            overwrite: true,
            update: false,
            append: false,
            skip_failures: true,
        }
    }
}

/// Invoker for the external converter
#[derive(Debug, Clone)]
pub struct Ogr2Ogr {
    program: PathBuf,
}

impl Default for Ogr2Ogr {
    fn default() -> Self {
        Self::new("ogr2ogr")
    }
}

impl Ogr2Ogr {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Arguments for loading `layer` from `package` into the database
    pub fn import_args(
        &self,
        package: &Path,
        destination: &ConnectionDescriptor,
        layer: &str,
        options: &ImportOptions,
    ) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::new();
        if options.overwrite {
            args.push("-overwrite".into());
        }
        if options.update {
            args.push("-update".into());
        }
        if options.append {
            args.push("-append".into());
        }
        args.push("-f".into());
        args.push(POSTGRES_FORMAT.into());
        args.push(destination.to_string().into());
        args.push(package.as_os_str().to_os_string());
        if options.skip_failures {
            args.push("-skipfailures".into());
        }
        args.push(layer.into());
        args
    }

    /// Run the import and wait for the process to exit
    pub fn import(
        &self,
        package: &Path,
        destination: &ConnectionDescriptor,
        layer: &str,
        options: &ImportOptions,
    ) -> Result<()> {
        let args = self.import_args(package, destination, layer, options);
        debug!(
            program = %self.program.display(),
            package = %package.display(),
            destination = %destination.redacted(),
            layer,
            ?options,
            "Running ogr2ogr"
        );

        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .map_err(|e| Error::CopyFailure {
                layer: layer.to_string(),
                reason: format!("failed to start '{}': {}", self.program.display(), e),
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() || !stderr.trim().is_empty() {
            let detail = if stderr.trim().is_empty() {
                format!("exited with {}", output.status)
            } else {
                scrub(stderr.trim(), destination)
            };
            return Err(Error::CopyFailure {
                layer: layer.to_string(),
                reason: detail,
            });
        }

        info!(layer, "Layer added successfully");
        Ok(())
    }
}

/// Strip the password from converter output that echoes the descriptor
fn scrub(text: &str, destination: &ConnectionDescriptor) -> String {
    match destination.password.as_deref() {
        Some(password) if !password.is_empty() => text.replace(password, "***"),
        _ => text.to_string(),
    }
}
