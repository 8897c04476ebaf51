//! Config command handlers

use std::path::Path;

use anyhow::Result;

use layervault_core::Config;

use crate::output::{Output, OutputFormat};

/// Show current configuration, password masked
pub fn show(config: &Config, config_path: &Path, output: &Output) -> Result<()> {
    let config = config.redacted();

    match output.format {
        OutputFormat::Json => output.json(&config)?,
        OutputFormat::Quiet => {
            println!("{}", config_path.display());
        }
        OutputFormat::Human => {
            let store = &config.datastore;
            println!("Configuration:");
            println!("  downloads_dir: {}", config.downloads_dir.display());
            println!("  ogr2ogr_path:  {}", config.ogr2ogr_path.display());
            println!(
                "  catalog_path:  {}",
                config
                    .catalog_path
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(not set)".to_string())
            );
            println!();
            println!("Datastore:");
            println!("  {}", config.connection_descriptor(None, None).redacted());
            println!("  user:     {}", store.user.as_deref().unwrap_or("(not set)"));
            println!(
                "  password: {}",
                if store.password.is_some() { "(set)" } else { "(not set)" }
            );
            println!();
            println!("Import defaults:");
            println!("  overwrite:     {}", config.import.overwrite);
            println!("  append:        {}", config.import.append);
            println!("  update:        {}", config.import.update);
            println!("  skip_failures: {}", config.import.skip_failures);
            println!();
            println!("Config file: {}", config_path.display());
        }
    }

    Ok(())
}
