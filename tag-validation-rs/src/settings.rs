//! Settings for building a [`Validation`](crate::Validation)
//!
//! Values come from an optional settings file and `VALIDATION__*`
//! environment variables (after `.env` is read), e.g.
//! `VALIDATION__LOCALE=en` or `VALIDATION__DATABASE_URL=postgres://...`.

use std::path::PathBuf;

use ::config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::errors::{ValidationError, ValidationResult};

/// Default locale for translated messages
pub const DEFAULT_LOCALE: &str = "fa";

/// Locale consulted when the main one has no message
pub const DEFAULT_FALLBACK_LOCALE: &str = "en";

/// Default size of the PostgreSQL pool
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationSettings {
    pub locale: String,
    pub fallback_locale: String,
    /// PostgreSQL URL for `exists`/`uq`; unset means an in-memory lookup
    pub database_url: Option<String>,
    pub max_connections: u32,
    /// Directory of `*.toml` translation tables
    pub translations_dir: Option<PathBuf>,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            locale: DEFAULT_LOCALE.to_string(),
            fallback_locale: DEFAULT_FALLBACK_LOCALE.to_string(),
            database_url: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            translations_dir: None,
        }
    }
}

impl ValidationSettings {
    /// Read `.env`, then the environment
    pub fn from_env() -> ValidationResult<Self> {
        dotenv::dotenv().ok();
        Self::load(None)
    }

    /// Load from an optional file, overridden by the environment
    pub fn load(path: Option<&str>) -> ValidationResult<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path).required(false));
        }

        builder
            .add_source(Environment::with_prefix("VALIDATION").separator("__"))
            .build()
            .and_then(|cfg| cfg.try_deserialize::<ValidationSettings>())
            .map_err(|e| ValidationError::Config(e.to_string()))
    }
}
