//! Application configuration loaded from environment variables.

use std::time::Duration;

use crate::errors::{FunnelError, Result};
use crate::i18n::Language;

pub const DEFAULT_LEAD_API_URL: &str = "http://localhost:3001";
pub const DEFAULT_IP_LOOKUP_URL: &str = "https://api.ipify.org?format=json";

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the lead endpoint (`POST {lead_api_url}/api/lead`)
    pub lead_api_url: String,
    /// SQLite database holding the local analytics event log
    pub database_url: String,
    /// Language used for questions and validation messages
    pub language: Language,
    /// Delay between entering the confirmation step and clearing the answers
    pub reset_delay: Duration,
    /// Timeout applied to every outbound HTTP request
    pub http_timeout: Duration,
    /// Public IP lookup endpoint queried once at startup
    pub ip_lookup_url: String,
    /// Also POST analytics events to the lead API, not just the local log
    pub analytics_remote: bool,
    /// Page URL reported with every event; its query string carries the UTM parameters
    pub page_url: String,
    pub referrer: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup. Unset and empty keys
    /// fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| -> String {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        Ok(Config {
            lead_api_url: var("LEAD_API_URL", DEFAULT_LEAD_API_URL)
                .trim_end_matches('/')
                .to_string(),
            database_url: var("DATABASE_URL", "sqlite:./analytics_events.db"),
            language: var("FUNNEL_LANGUAGE", "ru").parse()?,
            reset_delay: Duration::from_millis(
                var("RESET_DELAY_MS", "500")
                    .parse()
                    .map_err(|_| FunnelError::Config("Invalid RESET_DELAY_MS".to_string()))?,
            ),
            http_timeout: Duration::from_secs(
                var("HTTP_TIMEOUT_SECS", "30")
                    .parse()
                    .map_err(|_| FunnelError::Config("Invalid HTTP_TIMEOUT_SECS".to_string()))?,
            ),
            ip_lookup_url: var("IP_LOOKUP_URL", DEFAULT_IP_LOOKUP_URL),
            analytics_remote: parse_bool("ANALYTICS_REMOTE", &var("ANALYTICS_REMOTE", "false"))?,
            page_url: var("PAGE_URL", "http://localhost:5173/quiz"),
            referrer: var("REFERRER", ""),
        })
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(FunnelError::Config(format!("Invalid {key}: {raw}"))),
    }
}
