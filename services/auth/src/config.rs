//! Service settings loaded from the environment

use config::{Config, ConfigError, Environment};
use serde::Deserialize;

/// Which persistence backend the service runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Service configuration
///
/// # Environment Variables
/// - `BIND_ADDRESS`: listen address (default: "0.0.0.0:3000")
/// - `STORAGE`: `postgres` or `memory` (default: postgres)
/// - `SECRET_KEY`: HS256 signing secret for access tokens (required)
/// - `ACCESS_TOKEN_EXPIRY`: access token lifetime in seconds (default: 900)
/// - `ADMIN_ROLES`: comma separated roles guarding `/admin` (default: "admin")
/// - `LOG_FORMAT`: `text` or `json` (default: text)
/// - `BOOTSTRAP_ADMIN_ROLE`: create the admin roles at start-up (default: true)
/// - `BOOTSTRAP_ADMIN_USER`: username or email granted every admin role at
///   start-up (default: unset)
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default)]
    pub storage: StorageBackend,
    pub secret_key: String,
    #[serde(default = "default_access_token_expiry")]
    pub access_token_expiry: u64,
    #[serde(default = "default_admin_roles")]
    pub admin_roles: Vec<String>,
    #[serde(default)]
    pub log_format: LogFormat,
    #[serde(default = "default_bootstrap_admin_role")]
    pub bootstrap_admin_role: bool,
    #[serde(default)]
    pub bootstrap_admin_user: Option<String>,
}

fn default_bind_address() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_access_token_expiry() -> u64 {
    900 // 15 minutes
}

fn default_admin_roles() -> Vec<String> {
    vec!["admin".to_string()]
}

fn default_bootstrap_admin_role() -> bool {
    true
}

impl Settings {
    /// Load settings from the process environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_environment(Environment::default())
    }

    fn from_environment(environment: Environment) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(
                environment
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("admin_roles"),
            )
            .build()?
            .try_deserialize()
    }
}
