use anyhow::{anyhow, Result};
use chrono::Duration;
use std::env;
use std::path::PathBuf;

use crate::engine::{EngineSettings, DEFAULT_AUTO_BAN_HOURS, DEFAULT_WARN_LIMIT};
use crate::utils::validation::MAX_BAN_DAYS;

/// Auto-bans are held to the same ceiling as a `/ban` duration.
pub const MAX_AUTO_BAN_HOURS: i64 = MAX_BAN_DAYS * 24;

#[derive(Debug, Clone)]
pub struct Config {
    pub telegram_bot_token: String,
    pub creator_id: i64,
    pub data_dir: PathBuf,
    pub http_port: u16,
    pub warn_limit: u32,
    pub auto_ban_hours: i64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let token = env::var("TELEGRAM_BOT_TOKEN")
            .map_err(|_| anyhow!("TELEGRAM_BOT_TOKEN must be set"))?;

        if token.trim().is_empty() {
            return Err(anyhow!("TELEGRAM_BOT_TOKEN must be set"));
        }

        let creator_id: i64 = env::var("CREATOR_ID")
            .map_err(|_| anyhow!("CREATOR_ID must be set"))?
            .trim()
            .parse()
            .map_err(|_| anyhow!("Invalid CREATOR_ID"))?;
        if creator_id == 0 {
            return Err(anyhow!("Invalid CREATOR_ID"));
        }

        let data_dir = env::var("DATA_DIR")
            .ok()
            .filter(|dir| !dir.trim().is_empty())
            .unwrap_or_else(|| "./data".to_string());

        let port_str = env::var("HTTP_PORT")
            .unwrap_or_else(|_| "3000".to_string());
        let http_port = port_str.trim()
            .parse()
            .map_err(|_| anyhow!("Invalid HTTP_PORT"))?;

        let warn_limit: u32 = match env::var("WARN_LIMIT") {
            Ok(value) => value.trim().parse().map_err(|_| anyhow!("Invalid WARN_LIMIT"))?,
            Err(_) => DEFAULT_WARN_LIMIT,
        };
        if warn_limit == 0 {
            return Err(anyhow!("WARN_LIMIT must be at least 1"));
        }

        let auto_ban_hours: i64 = match env::var("AUTO_BAN_HOURS") {
            Ok(value) => value.trim().parse().map_err(|_| anyhow!("Invalid AUTO_BAN_HOURS"))?,
            Err(_) => DEFAULT_AUTO_BAN_HOURS,
        };
        if auto_ban_hours < 1 {
            return Err(anyhow!("AUTO_BAN_HOURS must be at least 1"));
        }
        if auto_ban_hours > MAX_AUTO_BAN_HOURS {
            return Err(anyhow!("AUTO_BAN_HOURS cannot exceed {}", MAX_AUTO_BAN_HOURS));
        }

        Ok(Config {
            telegram_bot_token: token,
            creator_id,
            data_dir: PathBuf::from(data_dir),
            http_port,
            warn_limit,
            auto_ban_hours,
        })
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            creator: self.creator_id,
            data_dir: self.data_dir.clone(),
            warn_limit: self.warn_limit,
            auto_ban_duration: Duration::hours(self.auto_ban_hours.clamp(1, MAX_AUTO_BAN_HOURS)),
        }
    }
}
