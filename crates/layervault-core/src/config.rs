//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/layervault/config.toml)
//! 3. Environment variables (LAYERVAULT_* prefix)
//!
//! Environment variables take precedence over config file values.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::connection::{ConnectionDescriptor, DEFAULT_PORT};
use crate::ogr2ogr::ImportOptions;

/// Environment variable prefix
const ENV_PREFIX: &str = "LAYERVAULT";

/// Connection settings for the portal's database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatastoreConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Database name
    #[serde(default = "default_database")]
    pub name: String,

    /// Active schema
    #[serde(default = "default_schema")]
    pub schema: String,

    #[serde(default)]
    pub user: Option<String>,

    #[serde(default)]
    pub password: Option<String>,
}

impl Default for DatastoreConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            name: default_database(),
            schema: default_schema(),
            user: None,
            password: None,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base directory for backups run without an explicit destination
    #[serde(default = "default_downloads_dir")]
    pub downloads_dir: PathBuf,

    #[serde(default)]
    pub datastore: DatastoreConfig,

    /// Path or name of the ogr2ogr executable
    #[serde(default = "default_ogr2ogr")]
    pub ogr2ogr_path: PathBuf,

    /// Default flags for ogr2ogr imports
    #[serde(default)]
    pub import: ImportOptions,

    /// JSON file holding the portal's layer catalog (optional)
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            downloads_dir: default_downloads_dir(),
            datastore: DatastoreConfig::default(),
            ogr2ogr_path: default_ogr2ogr(),
            import: ImportOptions::default(),
            catalog_path: None,
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (LAYERVAULT_DB_HOST, LAYERVAULT_DB_PASSWORD, ...)
    /// 2. Config file (~/.config/layervault/config.toml or LAYERVAULT_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Some(val) = env_var("DOWNLOADS_DIR") {
            self.downloads_dir = PathBuf::from(val);
        }
        if let Some(val) = env_var("DB_HOST") {
            self.datastore.host = val;
        }
        if let Some(val) = env_var("DB_PORT") {
            match val.parse() {
                Ok(port) => self.datastore.port = port,
                Err(_) => warn!(value = %val, "Ignoring invalid {}_DB_PORT", ENV_PREFIX),
            }
        }
        if let Some(val) = env_var("DB_NAME") {
            self.datastore.name = val;
        }
        if let Some(val) = env_var("DB_SCHEMA") {
            self.datastore.schema = val;
        }
        // Empty string clears the optional values
        if let Some(val) = env_var("DB_USER") {
            self.datastore.user = if val.is_empty() { None } else { Some(val) };
        }
        if let Some(val) = env_var("DB_PASSWORD") {
            self.datastore.password = if val.is_empty() { None } else { Some(val) };
        }
        if let Some(val) = env_var("OGR2OGR") {
            self.ogr2ogr_path = PathBuf::from(val);
        }
        if let Some(val) = env_var("CATALOG") {
            self.catalog_path = if val.is_empty() {
                None
            } else {
                Some(PathBuf::from(val))
            };
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_file_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with LAYERVAULT_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Some(path) = env_var("CONFIG") {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("layervault")
            .join("config.toml")
    }

    /// Descriptor for the configured datastore
    ///
    /// `database` and `schema` replace the configured name and schema when
    /// given.
    pub fn connection_descriptor(
        &self,
        database: Option<&str>,
        schema: Option<&str>,
    ) -> ConnectionDescriptor {
        let store = &self.datastore;
        let mut descriptor = ConnectionDescriptor::new(database.unwrap_or(&store.name))
            .with_host(store.host.clone(), store.port)
            .with_schema(schema.unwrap_or(&store.schema));
        descriptor.user = store.user.clone();
        descriptor.password = store.password.clone();
        descriptor
    }

    /// A copy safe to print: the datastore password is masked
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.datastore.password.is_some() {
            config.datastore.password = Some("***".to_string());
        }
        config
    }
}

fn env_var(suffix: &str) -> Option<String> {
    std::env::var(format!("{}_{}", ENV_PREFIX, suffix)).ok()
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_database() -> String {
    "gis".to_string()
}

fn default_schema() -> String {
    "public".to_string()
}

fn default_ogr2ogr() -> PathBuf {
    PathBuf::from("ogr2ogr")
}

/// Get the default downloads directory
fn default_downloads_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("layervault")
        .join("downloads")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to serialize tests that touch environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Guard that locks env access and saves/restores env vars
    struct EnvGuard<'a> {
        _lock: std::sync::MutexGuard<'a, ()>,
        saved: Vec<(String, Option<String>)>,
    }

    impl<'a> EnvGuard<'a> {
        fn new(vars: &[&str]) -> Self {
            let lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
            let saved = vars
                .iter()
                .map(|&name| (name.to_string(), env::var(name).ok()))
                .collect();
            for name in vars {
                env::remove_var(name);
            }
            Self { _lock: lock, saved }
        }
    }

    impl Drop for EnvGuard<'_> {
        fn drop(&mut self) {
            for (name, value) in &self.saved {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    const ENV_VARS: &[&str] = &[
        "LAYERVAULT_DOWNLOADS_DIR",
        "LAYERVAULT_DB_HOST",
        "LAYERVAULT_DB_PORT",
        "LAYERVAULT_DB_NAME",
        "LAYERVAULT_DB_SCHEMA",
        "LAYERVAULT_DB_USER",
        "LAYERVAULT_DB_PASSWORD",
        "LAYERVAULT_OGR2OGR",
        "LAYERVAULT_CATALOG",
    ];

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.downloads_dir.ends_with("downloads"));
        assert_eq!(config.datastore.host, "localhost");
        assert_eq!(config.datastore.port, 5432);
        assert_eq!(config.datastore.schema, "public");
        assert_eq!(config.ogr2ogr_path, PathBuf::from("ogr2ogr"));
        assert!(config.import.overwrite);
        assert!(config.import.skip_failures);
        assert!(config.catalog_path.is_none());
    }

    #[test]
    fn test_env_override_datastore() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();

        env::set_var("LAYERVAULT_DB_HOST", "db.internal");
        env::set_var("LAYERVAULT_DB_PORT", "6543");
        env::set_var("LAYERVAULT_DB_NAME", "portal");
        env::set_var("LAYERVAULT_DB_USER", "geo");
        env::set_var("LAYERVAULT_DB_PASSWORD", "secret");
        config.apply_env_overrides();

        assert_eq!(config.datastore.host, "db.internal");
        assert_eq!(config.datastore.port, 6543);
        assert_eq!(config.datastore.name, "portal");
        assert_eq!(config.datastore.user.as_deref(), Some("geo"));
        assert_eq!(config.datastore.password.as_deref(), Some("secret"));

        // Empty string clears it
        env::set_var("LAYERVAULT_DB_PASSWORD", "");
        config.apply_env_overrides();
        assert!(config.datastore.password.is_none());
    }

    #[test]
    fn test_env_override_invalid_port_is_ignored() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("LAYERVAULT_DB_PORT", "not-a-port");
        config.apply_env_overrides();
        assert_eq!(config.datastore.port, 5432);
    }

    #[test]
    fn test_env_override_paths() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("LAYERVAULT_DOWNLOADS_DIR", "/tmp/layervault-test");
        env::set_var("LAYERVAULT_OGR2OGR", "/opt/gdal/bin/ogr2ogr");
        env::set_var("LAYERVAULT_CATALOG", "/tmp/catalog.json");
        config.apply_env_overrides();

        assert_eq!(config.downloads_dir, PathBuf::from("/tmp/layervault-test"));
        assert_eq!(config.ogr2ogr_path, PathBuf::from("/opt/gdal/bin/ogr2ogr"));
        assert_eq!(config.catalog_path, Some(PathBuf::from("/tmp/catalog.json")));
    }

    #[test]
    fn test_load_from_str() {
        let _guard = EnvGuard::new(ENV_VARS);

        let toml = r#"
            downloads_dir = "/custom/downloads"
            catalog_path = "/custom/catalog.json"

            [datastore]
            host = "db"
            name = "portal"
            user = "geo"

            [import]
            overwrite = false
            append = true
        "#;

        let config = Config::load_from_str(toml).unwrap();
        assert_eq!(config.downloads_dir, PathBuf::from("/custom/downloads"));
        assert_eq!(config.datastore.host, "db");
        assert_eq!(config.datastore.port, 5432);
        assert_eq!(config.datastore.schema, "public");
        assert!(!config.import.overwrite);
        assert!(config.import.append);
        assert!(config.import.skip_failures);
    }

    #[test]
    fn test_load_from_path_missing_file() {
        let _guard = EnvGuard::new(ENV_VARS);

        let config = Config::load_from_path(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.datastore, DatastoreConfig::default());
    }

    #[test]
    fn test_connection_descriptor_overrides() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        config.datastore.user = Some("geo".to_string());
        config.datastore.password = Some("pw".to_string());

        let descriptor = config.connection_descriptor(None, None);
        assert_eq!(descriptor.dbname, "gis");
        assert_eq!(descriptor.active_schema.as_deref(), Some("public"));
        assert_eq!(descriptor.password.as_deref(), Some("pw"));

        let descriptor = config.connection_descriptor(Some("other"), Some("staging"));
        assert_eq!(descriptor.dbname, "other");
        assert_eq!(descriptor.active_schema.as_deref(), Some("staging"));
    }

    #[test]
    fn test_redacted_masks_password() {
        let mut config = Config::default();
        config.datastore.password = Some("secret".to_string());

        let shown = toml::to_string_pretty(&config.redacted()).unwrap();
        assert!(!shown.contains("secret"));
        assert!(shown.contains("***"));
    }
}
