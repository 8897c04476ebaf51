//! Database connection descriptors
//!
//! A descriptor is the single string the native driver opens and the
//! external conversion executable receives as its destination:
//!
//! ```text
//! PG: host=localhost port=5432 dbname=gis active_schema=public user=geo password=secret
//! ```
//!
//! Tokens are always rendered in that order. Anything written to logs or
//! errors goes through [`ConnectionDescriptor::redacted`] or
//! [`redact_location`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Prefix the native driver uses to recognise database locations
pub const PG_PREFIX: &str = "PG:";

/// Default PostgreSQL port
pub const DEFAULT_PORT: u16 = 5432;

const REDACTED: &str = "***";

/// Connection parameters for a database-backed source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionDescriptor {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub active_schema: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl ConnectionDescriptor {
    /// Create a descriptor for `dbname` on localhost with default port
    pub fn new(dbname: impl Into<String>) -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            dbname: dbname.into(),
            active_schema: None,
            user: None,
            password: None,
        }
    }

    pub fn with_host(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = host.into();
        self.port = port;
        self
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.active_schema = Some(schema.into());
        self
    }

    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self.password = Some(password.into());
        self
    }

    /// Render with the password replaced, for logs and error messages
    pub fn redacted(&self) -> String {
        self.render(true)
    }

    fn render(&self, redact: bool) -> String {
        let password = match &self.password {
            Some(_) if redact => REDACTED,
            Some(pw) => pw.as_str(),
            None => "",
        };
        format!(
            "{} host={} port={} dbname={} active_schema={} user={} password={}",
            PG_PREFIX,
            self.host,
            self.port,
            self.dbname,
            self.active_schema.as_deref().unwrap_or(""),
            self.user.as_deref().unwrap_or(""),
            password
        )
    }
}

impl fmt::Display for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(false))
    }
}

impl FromStr for ConnectionDescriptor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s.trim();
        let body = body.strip_prefix(PG_PREFIX).unwrap_or(body);

        let mut descriptor = ConnectionDescriptor::new("");
        let mut has_dbname = false;

        for token in body.split_whitespace() {
            let (key, value) = token.split_once('=').ok_or_else(|| {
                Error::InvalidConnection(format!("expected key=value, got '{}'", redact_token(token)))
            })?;
            let value = if value.is_empty() {
                None
            } else {
                Some(value.to_string())
            };

            match key {
                "host" => descriptor.host = value.unwrap_or_else(|| "localhost".to_string()),
                "port" => {
                    descriptor.port = match value {
                        Some(v) => v.parse().map_err(|_| {
                            Error::InvalidConnection(format!("invalid port '{}'", v))
                        })?,
                        None => DEFAULT_PORT,
                    }
                }
                "dbname" => {
                    has_dbname = value.is_some();
                    descriptor.dbname = value.unwrap_or_default();
                }
                "active_schema" => descriptor.active_schema = value,
                "user" => descriptor.user = value,
                "password" => descriptor.password = value,
                other => {
                    return Err(Error::InvalidConnection(format!("unknown key '{}'", other)));
                }
            }
        }

        if !has_dbname {
            return Err(Error::InvalidConnection("dbname is required".to_string()));
        }

        Ok(descriptor)
    }
}

/// Check whether a location string addresses a database rather than a file
pub fn is_database_location(location: &str) -> bool {
    location.trim_start().starts_with(PG_PREFIX)
}

/// Redact any `password=` token in a location string
///
/// File paths pass through unchanged.
pub fn redact_location(location: &str) -> String {
    if !location.contains("password=") {
        return location.to_string();
    }
    location
        .split(' ')
        .map(redact_token)
        .collect::<Vec<_>>()
        .join(" ")
}

fn redact_token(token: &str) -> String {
    match token.strip_prefix("password=") {
        Some(pw) if !pw.is_empty() => format!("password={}", REDACTED),
        _ => token.to_string(),
    }
}
