// src/config.rs
use anyhow::{Context, Result};
use log::{info, warn};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 3030;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub rate_engine_url: String,
    /// No timeout is applied to engine calls when unset.
    pub rate_engine_timeout: Option<Duration>,
    /// Falls back to the built-in catalog when unset.
    pub catalog_csv: Option<PathBuf>,
    /// SQLite URL for cached calculations and plans; in-memory when unset.
    pub database_url: Option<String>,
}

impl AppConfig {
    /// Reads the process environment. Call `dotenv().ok()` first to pick up a `.env` file.
    pub fn from_env() -> Result<Self> {
        let port = match env::var("PORT") {
            Ok(raw) => raw
                .trim()
                .parse::<u16>()
                .with_context(|| format!("PORT must be a number, got {:?}", raw))?,
            Err(_) => {
                warn!("$PORT not set, defaulting to {}", DEFAULT_PORT);
                DEFAULT_PORT
            }
        };

        let rate_engine_url = rate_engine_url()?;

        let rate_engine_timeout = match env::var("RATE_ENGINE_TIMEOUT_SECS") {
            Ok(raw) => {
                let secs = raw
                    .trim()
                    .parse::<u64>()
                    .with_context(|| format!("RATE_ENGINE_TIMEOUT_SECS must be a number, got {:?}", raw))?;
                Some(Duration::from_secs(secs))
            }
            Err(_) => None,
        };

        let catalog_csv = env::var("INSTRUMENT_CATALOG_CSV")
            .ok()
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);

        let database_url = env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        info!(
            "Configuration loaded: port {}, rate engine {}, timeout {:?}, catalog {:?}, database {:?}",
            port, rate_engine_url, rate_engine_timeout, catalog_csv, database_url
        );

        Ok(AppConfig {
            port,
            rate_engine_url,
            rate_engine_timeout,
            catalog_csv,
            database_url,
        })
    }
}

pub fn rate_engine_url() -> Result<String> {
    env::var("RATE_ENGINE_URL").context("RATE_ENGINE_URL must be set")
}
