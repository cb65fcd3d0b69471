//! Runtime configuration from the environment.

use std::path::PathBuf;

use anyhow::Result;

use crate::utils::get_database_path;

/// Default title of the category template note.
pub const DEFAULT_TEMPLATE_TITLE: &str = "Tea Summary Template";
/// Default title of the reserve report note.
pub const DEFAULT_RESERVE_TITLE: &str = "Tea Reserve";
/// Default title of the purchase report note.
pub const DEFAULT_PURCHASE_TITLE: &str = "Tea Purchase";
/// Default title prefix of the yearly consumption notes.
pub const DEFAULT_CONSUMPTION_PREFIX: &str = "Tea Consumption";
/// Default drift, in grams, before a new remaining annotation is written.
pub const DEFAULT_TOLERANCE: f64 = 1.0;
/// Default log filter.
pub const DEFAULT_LOG_FILTER: &str = "warn";

/// Note titles and thresholds used by the report engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub template_title: String,
    pub reserve_title: String,
    pub purchase_title: String,
    pub consumption_prefix: String,
    pub tolerance: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            template_title: DEFAULT_TEMPLATE_TITLE.to_string(),
            reserve_title: DEFAULT_RESERVE_TITLE.to_string(),
            purchase_title: DEFAULT_PURCHASE_TITLE.to_string(),
            consumption_prefix: DEFAULT_CONSUMPTION_PREFIX.to_string(),
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

impl EngineConfig {
    /// Parses configuration from environment variables.
    ///
    /// Falls back to defaults when env vars are not set or invalid.
    ///
    /// # Environment Variables
    ///
    /// - `STEEP_TEMPLATE_TITLE` (default `Tea Summary Template`)
    /// - `STEEP_RESERVE_TITLE` (default `Tea Reserve`)
    /// - `STEEP_PURCHASE_TITLE` (default `Tea Purchase`)
    /// - `STEEP_CONSUMPTION_PREFIX` (default `Tea Consumption`)
    /// - `STEEP_TOLERANCE` (grams, non-negative, default 1.0)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let tolerance = std::env::var("STEEP_TOLERANCE")
            .ok()
            .and_then(|s| s.trim().parse::<f64>().ok())
            .filter(|t| t.is_finite() && *t >= 0.0)
            .unwrap_or(defaults.tolerance);

        Self {
            template_title: env_string("STEEP_TEMPLATE_TITLE").unwrap_or(defaults.template_title),
            reserve_title: env_string("STEEP_RESERVE_TITLE").unwrap_or(defaults.reserve_title),
            purchase_title: env_string("STEEP_PURCHASE_TITLE").unwrap_or(defaults.purchase_title),
            consumption_prefix: env_string("STEEP_CONSUMPTION_PREFIX")
                .unwrap_or(defaults.consumption_prefix),
            tolerance,
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// SQLite database file.
    pub database_path: PathBuf,
    /// `tracing` filter directive.
    pub log_filter: String,
    pub engine: EngineConfig,
}

impl Config {
    /// Loads `.env` if present, then reads the environment.
    ///
    /// - `STEEP_DB` (default `{data_dir}/steep/notes.db`)
    /// - `STEEP_LOG` (default `warn`)
    /// - the [`EngineConfig`] variables
    ///
    /// # Errors
    ///
    /// Returns an error if `STEEP_DB` is unset and the platform data directory
    /// cannot be determined.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let database_path = match env_string("STEEP_DB") {
            Some(path) => PathBuf::from(path),
            None => get_database_path()?,
        };

        Ok(Self {
            database_path,
            log_filter: env_string("STEEP_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
            engine: EngineConfig::from_env(),
        })
    }
}
