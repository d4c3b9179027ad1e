use std::collections::HashMap;
use std::path::Path;

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use url::Url;

use crate::schema::is_valid_identifier;
use crate::service::{DEFAULT_PROTECTED_TABLES, DEFAULT_SCHEMA, DEFAULT_SYSTEM_COLUMNS};

pub const DEFAULT_CONFIG_PATH: &str = "schema-manager.toml";
/// Environment overrides look like `SCHEMA_MANAGER__CATALOG__DSN`
pub const ENV_PREFIX: &str = "SCHEMA_MANAGER";
const ENV_SEPARATOR: &str = "__";

#[derive(Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct SchemaManagerConfig {
    pub catalog: Catalog,
    pub auth: Auth,
    #[serde(default)]
    pub frontend: Frontend,
    #[serde(default)]
    pub schema: SchemaSettings,
    #[serde(default)]
    pub misc: Misc,
}

#[derive(Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Catalog {
    Postgres(Postgres),
}

#[derive(Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct Postgres {
    pub dsn: String,
    #[serde(default = "default_schema")]
    pub schema: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_schema() -> String {
    DEFAULT_SCHEMA.to_string()
}

fn default_max_connections() -> u32 {
    16
}

#[derive(Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Auth {
    /// Verify user access tokens against a GoTrue-compatible auth API
    #[serde(rename = "gotrue")]
    GoTrue(GoTrue),
    /// A single shared secret
    Password(Password),
}

#[derive(Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct GoTrue {
    pub url: String,
    pub anon_key: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    10
}

#[derive(Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct Password {
    pub sha256_hash: String,
}

#[derive(Deserialize, Debug, PartialEq, Eq, Default, Clone)]
pub struct Frontend {
    #[serde(default)]
    pub http: HttpFrontend,
}

#[derive(Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(default)]
pub struct HttpFrontend {
    pub bind_host: String,
    pub bind_port: u16,
}

impl Default for HttpFrontend {
    fn default() -> Self {
        Self {
            bind_host: "127.0.0.1".to_string(),
            bind_port: 8080,
        }
    }
}

#[derive(Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(default)]
pub struct SchemaSettings {
    pub protected_tables: Vec<String>,
    pub system_columns: Vec<String>,
}

impl Default for SchemaSettings {
    fn default() -> Self {
        Self {
            protected_tables: DEFAULT_PROTECTED_TABLES.iter().map(|t| t.to_string()).collect(),
            system_columns: DEFAULT_SYSTEM_COLUMNS.iter().map(|c| c.to_string()).collect(),
        }
    }
}

#[derive(Deserialize, Debug, PartialEq, Eq, Default, Clone)]
#[serde(default)]
pub struct Misc {
    pub json_logs: bool,
    pub metrics: Option<Metrics>,
}

#[derive(Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(default)]
pub struct Metrics {
    pub host: String,
    pub port: u16,
}

impl Default for Metrics {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9090,
        }
    }
}

fn check_identifier(kind: &str, name: &str) -> Result<(), ConfigError> {
    if is_valid_identifier(name) {
        Ok(())
    } else {
        Err(ConfigError::Message(format!(
            "Invalid {kind} {name:?}: use lowercase letters, numbers, and underscores only"
        )))
    }
}

pub fn validate_config(config: SchemaManagerConfig) -> Result<SchemaManagerConfig, ConfigError> {
    let Catalog::Postgres(Postgres { ref schema, .. }) = config.catalog;
    check_identifier("schema name", schema)?;

    for table in &config.schema.protected_tables {
        check_identifier("protected table", table)?;
    }
    for column in &config.schema.system_columns {
        check_identifier("system column", column)?;
    }

    match &config.auth {
        Auth::GoTrue(GoTrue { url, .. }) => {
            Url::parse(url).map_err(|e| {
                ConfigError::Message(format!("Invalid auth URL {url:?}: {e}"))
            })?;
        }
        Auth::Password(Password { sha256_hash }) => {
            if sha256_hash.len() != 64
                || !sha256_hash.chars().all(|c| c.is_ascii_hexdigit())
            {
                return Err(ConfigError::Message(
                    "auth.sha256_hash must be a hex-encoded SHA-256 digest (64 characters)"
                        .to_string(),
                ));
            }
        }
    }

    Ok(config)
}

pub fn load_config(path: &Path) -> Result<SchemaManagerConfig, ConfigError> {
    load_config_with_env(path, None)
}

/// Like [`load_config`], but reading overrides from `env_vars` instead of the
/// process environment when given
pub fn load_config_with_env(
    path: &Path,
    env_vars: Option<HashMap<String, String>>,
) -> Result<SchemaManagerConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::from(path))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator(ENV_SEPARATOR)
                .try_parsing(true)
                .source(env_vars),
        );

    config.build()?.try_deserialize().and_then(validate_config)
}

// Load a config from a string (to test our structs are defined correctly)
pub fn load_config_from_string(
    config_str: &str,
    skip_validation: bool,
) -> Result<SchemaManagerConfig, ConfigError> {
    let config =
        Config::builder().add_source(File::from_str(config_str, FileFormat::Toml));

    if skip_validation {
        config.build()?.try_deserialize()
    } else {
        config.build()?.try_deserialize().and_then(validate_config)
    }
}
