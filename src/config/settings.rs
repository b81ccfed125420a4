//! Application settings loaded from config.toml
//!
//! The file is optional: a missing file yields [`AppConfig::default`]. Secrets such as
//! `JWT_SECRET` are read from the environment at the point of use and never live here.

use crate::entities::Role;
use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Default, Deserialize)]
pub struct AppConfig {
    /// Token issuing settings
    #[serde(default)]
    pub auth: AuthConfig,
    /// Users created on first run if their email is not registered yet
    #[serde(default)]
    pub seed_users: Vec<SeedUser>,
}

/// Bearer token settings
#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// Lifetime of an issued token in minutes
    #[serde(default = "default_token_ttl_minutes")]
    pub token_ttl_minutes: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_ttl_minutes: default_token_ttl_minutes(),
        }
    }
}

const fn default_token_ttl_minutes() -> i64 {
    60
}

/// A user account to provision at startup
#[derive(Debug, Deserialize, Clone)]
pub struct SeedUser {
    /// Display name
    pub name: String,
    /// Login email
    pub email: String,
    /// Initial password, hashed before it is stored
    pub password: String,
    /// Role; defaults to accountant
    #[serde(default = "default_role")]
    pub role: Role,
}

const fn default_role() -> Role {
    Role::Accountant
}

/// Loads settings from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file exists but cannot be read
/// - The TOML syntax is invalid
/// - A field has the wrong type (e.g. an unknown role)
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path_ref = path.as_ref();
    if !path_ref.exists() {
        tracing::info!("No config file at {:?}, using defaults", path_ref);
        return Ok(AppConfig::default());
    }

    tracing::debug!("Attempting to load configuration from: {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {path_ref:?}: {e}"),
    })?;

    parse_config(&contents)
}

/// Parses settings from TOML text
pub fn parse_config(contents: &str) -> Result<AppConfig> {
    toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })
}

/// Loads settings from the default location (./config.toml)
pub fn load_default_config() -> Result<AppConfig> {
    load_config("config.toml")
}
