//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use anyhow::Result;
use serde::Serialize;

use layervault_core::{BackupOutcome, SchemaDiffReport, SchemaField};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn json<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }

    /// Print layers with their full schema
    pub fn print_layers(&self, layers: &[(String, Vec<SchemaField>)]) -> Result<()> {
        match self.format {
            OutputFormat::Human => {
                if layers.is_empty() {
                    println!("No layers found.");
                    return Ok(());
                }
                for (name, schema) in layers {
                    println!("{}", name);
                    for field in schema {
                        println!("  {}", field);
                    }
                }
                println!("\n{} layer(s)", layers.len());
            }
            OutputFormat::Json => {
                let json_layers: Vec<_> = layers
                    .iter()
                    .map(|(name, schema)| serde_json::json!({"name": name, "schema": schema}))
                    .collect();
                self.json(&json_layers)?;
            }
            OutputFormat::Quiet => {
                for (name, _) in layers {
                    println!("{}", name);
                }
            }
        }
        Ok(())
    }

    /// Print a schema comparison
    pub fn print_report(&self, report: &SchemaDiffReport) -> Result<()> {
        match self.format {
            OutputFormat::Human => {
                println!(
                    "Compatible: {}",
                    if report.compatible { "yes" } else { "no" }
                );
                print_fields("New fields", &report.new_fields);
                print_fields("Deleted fields", &report.deleted_fields);
            }
            OutputFormat::Json => self.json(report)?,
            OutputFormat::Quiet => println!("{}", report.compatible),
        }
        Ok(())
    }

    /// Print the outcome of a backup run
    pub fn print_backup(&self, outcome: &BackupOutcome) -> Result<()> {
        match self.format {
            OutputFormat::Human => match outcome {
                BackupOutcome::Completed(report) => {
                    println!("✓ Backup written to {}", report.archive_path.display());
                    println!("  Layers: {}", report.layers.join(", "));
                    println!("  Styles: {}", report.styles_written);
                    if !report.skipped.is_empty() {
                        println!("  Skipped (not in source): {}", report.skipped.join(", "));
                    }
                }
                BackupOutcome::NothingToBackUp { skipped } => {
                    println!("Nothing to back up.");
                    if !skipped.is_empty() {
                        println!("  Skipped (not in source): {}", skipped.join(", "));
                    }
                }
                BackupOutcome::Failed(failure) => {
                    eprintln!("✗ {}", failure);
                    if let Some(path) = &failure.archive_path {
                        eprintln!("  Incomplete archive left at {}", path.display());
                    }
                }
            },
            OutputFormat::Json => self.json(outcome)?,
            OutputFormat::Quiet => {
                if let Some(path) = outcome.archive_path() {
                    println!("{}", path.display());
                }
            }
        }
        Ok(())
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }
}

fn print_fields(label: &str, fields: &[SchemaField]) {
    if fields.is_empty() {
        return;
    }
    println!("{}:", label);
    for field in fields {
        println!("  {}", field);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_flags() {
        assert_eq!(OutputFormat::from_flags(false, false), OutputFormat::Human);
        assert_eq!(OutputFormat::from_flags(true, false), OutputFormat::Json);
        assert_eq!(OutputFormat::from_flags(false, true), OutputFormat::Quiet);
        // Quiet takes precedence
        assert_eq!(OutputFormat::from_flags(true, true), OutputFormat::Quiet);
    }
}
