//! Handles the application settings via a config file and environment variables.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;
use url::Url;

/// Contains the application settings.
///
/// The application settings are set with a TOML config file. Settings specified in the config file
/// can be overwritten by environment variables. To do so, set an environment variable
/// with the prefix `CONCERT_SIGNUP` followed by the field names you want to set. Nested fields are separated by a double underscore `__`.
/// ```sh
/// CONCERT_SIGNUP_<field>__<field-of-field>...
/// ```
/// # Example
///
/// set the `http.port` field:
/// ```sh
/// CONCERT_SIGNUP_HTTP__PORT=8080
/// ```
///
/// # Note
/// Fields set via environment variables do not affect the underlying config file.
#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub http: Http,
    pub identity: Identity,
    pub booking: Booking,
    #[serde(default)]
    pub store: Store,
}

impl Settings {
    /// Creates a new Settings instance from the provided TOML file.
    /// Specific fields can be set or overwritten with environment variables (See struct level docs for more details).
    pub fn load(file_name: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name(file_name))
            .add_source(Environment::with_prefix("CONCERT_SIGNUP").separator("__"))
            .build()?
            .try_deserialize()
    }
}

#[derive(Debug, Deserialize)]
pub struct Http {
    #[serde(default = "default_http_port")]
    pub port: u16,
    #[serde(default)]
    pub cors: Cors,
}

impl Default for Http {
    fn default() -> Self {
        Self {
            port: default_http_port(),
            cors: Cors::default(),
        }
    }
}

/// Settings for CORS (Cross Origin Resource Sharing)
#[derive(Default, Clone, Debug, Deserialize)]
pub struct Cors {
    #[serde(default)]
    pub allowed_origin: Vec<String>,
}

/// The identity service which resolves bearer credentials to user profiles
#[derive(Debug, Deserialize)]
pub struct Identity {
    pub base_url: Url,
}

/// The booking service which keeps the paid reservations
#[derive(Debug, Deserialize)]
pub struct Booking {
    pub base_url: Url,
}

/// Location of the file backed participation ledger
#[derive(Debug, Deserialize)]
pub struct Store {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for Store {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

fn default_http_port() -> u16 {
    8000
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}
