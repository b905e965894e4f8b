//! Configuration loaded from environment variables.

use std::env;

use anyhow::{Context, Result};
use chrono::FixedOffset;

use crate::bag::BagContext;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Database URL (`postgres://…` or `sqlite:…`). Only needed to execute queries.
    pub database_url: Option<String>,

    /// Maximum database connections in pool (default: 5).
    pub database_max_connections: u32,

    /// Fixed "now" as a unix timestamp, overriding the system clock.
    pub simulated_time: Option<i64>,

    /// Offset from UTC in seconds used for calendar-day filters (default: 0).
    pub utc_offset: i32,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_URL").ok().filter(|url| !url.is_empty());

        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .context("DATABASE_MAX_CONNECTIONS must be a valid u32")?;

        let simulated_time = match env::var("SEMINARS_SIMULATED_TIME") {
            Ok(value) => Some(
                value
                    .parse()
                    .context("SEMINARS_SIMULATED_TIME must be a unix timestamp")?,
            ),
            Err(_) => None,
        };

        let utc_offset = env::var("SEMINARS_UTC_OFFSET")
            .unwrap_or_else(|_| "0".to_string())
            .parse()
            .context("SEMINARS_UTC_OFFSET must be a number of seconds")?;

        Ok(Self {
            database_url,
            database_max_connections,
            simulated_time,
            utc_offset,
        })
    }

    /// Build the per-request bag context: current instant and local timezone.
    pub fn bag_context(&self) -> Result<BagContext> {
        let timezone = FixedOffset::east_opt(self.utc_offset)
            .context("SEMINARS_UTC_OFFSET is outside the valid range")?;
        let now = self
            .simulated_time
            .unwrap_or_else(|| chrono::Utc::now().timestamp());
        Ok(BagContext::new(now, timezone))
    }
}
