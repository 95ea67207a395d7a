use std::path::Path;

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use sha2::{Digest, Sha256};

pub const ENV_PREFIX: &str = "GRIDATLAS";
pub const DEFAULT_WORKSPACE: &str = "PyPSAEarthDashboard";
pub const DEFAULT_SRID: i32 = 4326;

#[derive(Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct GridAtlasConfig {
    pub database: Database,
    pub geoserver: GeoServer,
    #[serde(default)]
    pub uploads: Uploads,
    #[serde(default)]
    pub frontend: Frontend,
    #[serde(default)]
    pub misc: Misc,
}

/// Connection settings for the spatial database. `dsn` is what this process
/// connects with; the discrete fields are handed to GeoServer so that it can
/// reach the same database from its own network position.
#[derive(Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct Database {
    pub dsn: String,
    pub host: String,
    #[serde(default = "default_pg_port")]
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: String,
    #[serde(default = "default_schema")]
    pub schema: String,
}

#[derive(Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct GeoServer {
    pub url: String,
    pub username: String,
    pub password: String,
    #[serde(default = "default_workspace")]
    pub workspace: String,
}

#[derive(Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(default)]
pub struct Uploads {
    pub media_dir: String,
}

impl Default for Uploads {
    fn default() -> Self {
        Self {
            media_dir: "./media".to_string(),
        }
    }
}

fn default_pg_port() -> u16 {
    5432
}

fn default_schema() -> String {
    "public".to_string()
}

fn default_workspace() -> String {
    DEFAULT_WORKSPACE.to_string()
}

#[derive(Deserialize, Debug, PartialEq, Eq, Default, Clone)]
pub struct Frontend {
    #[serde(default)]
    pub http: HttpFrontend,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum AccessSettings {
    Any,
    Off,
    Password { sha256_hash: String },
}

pub fn str_to_hex_hash(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input);
    hex::encode(hasher.finalize())
}

// "any" / "off" / a SHA-256 hex digest of the password
impl<'de> Deserialize<'de> for AccessSettings {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Ok(match value.as_str() {
            "any" => AccessSettings::Any,
            "off" => AccessSettings::Off,
            _ => AccessSettings::Password {
                sha256_hash: value.to_lowercase(),
            },
        })
    }
}

#[derive(Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(default)]
pub struct HttpFrontend {
    pub bind_host: String,
    pub bind_port: u16,
    pub write_access: AccessSettings,
    pub upload_data_max_length: u64,
}

impl Default for HttpFrontend {
    fn default() -> Self {
        Self {
            bind_host: "127.0.0.1".to_string(),
            bind_port: 8000,
            write_access: AccessSettings::Any,
            upload_data_max_length: 256 * 1024 * 1024,
        }
    }
}

#[derive(Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(default)]
pub struct Misc {
    pub srid: i32,
    pub cleanup_catalog_on_delete: bool,
}

impl Default for Misc {
    fn default() -> Self {
        Self {
            srid: DEFAULT_SRID,
            cleanup_catalog_on_delete: false,
        }
    }
}

pub fn validate_config(config: GridAtlasConfig) -> Result<GridAtlasConfig, ConfigError> {
    if let Err(e) = url::Url::parse(&config.geoserver.url) {
        return Err(ConfigError::Message(format!(
            "Invalid GeoServer URL {:?}: {e}",
            config.geoserver.url
        )));
    }

    if config.geoserver.workspace.trim().is_empty() {
        return Err(ConfigError::Message(
            "The GeoServer workspace name can't be empty".to_string(),
        ));
    }

    if config.database.schema.trim().is_empty() {
        return Err(ConfigError::Message(
            "The database schema name can't be empty".to_string(),
        ));
    }

    Ok(config)
}

pub fn load_config(path: &Path) -> Result<GridAtlasConfig, ConfigError> {
    let path = path.to_str().ok_or_else(|| {
        ConfigError::Message(format!("Config path {path:?} is not valid UTF-8"))
    })?;

    let config = Config::builder()
        .add_source(File::with_name(path))
        .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    config.build()?.try_deserialize().and_then(validate_config)
}

// Load a config from a string (to test our structs are defined correctly)
pub fn load_config_from_string(
    config_str: &str,
    skip_validation: bool,
) -> Result<GridAtlasConfig, ConfigError> {
    let config =
        Config::builder().add_source(File::from_str(config_str, FileFormat::Toml));

    if skip_validation {
        config.build()?.try_deserialize()
    } else {
        config.build()?.try_deserialize().and_then(validate_config)
    }
}
