//! Configuration loading from TOML with environment variable overrides.
//!
//! Reads `config.toml` into strongly-typed structs. Every field has a
//! default, so a missing file or a partial one is fine. Selected values can
//! then be overridden from the environment (`MAX_STAKE`, `MIN_ODDS`, ...).
//! Credentials are referenced by env-var name and resolved at runtime.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

use crate::exchange::Credentials;
use crate::strategy::ValueConfig;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub betting: BettingConfig,
    pub strategy: StrategyConfig,
    pub storage: StorageConfig,
    pub agent: AgentConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub auth_endpoint: String,
    pub username_env: String,
    pub password_env: String,
    /// Assumed token lifetime when the auth response omits `expires_in`.
    pub token_lifetime_secs: u64,
    /// Pause between consecutive market requests.
    pub request_delay_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://afde-apim-alpha-backoffice-prod-westeurope-bvc2d9ccamfjhkhg.z03.azurefd.net"
                .to_string(),
            auth_endpoint: "/backoffice/connect/token".to_string(),
            username_env: "API_USERNAME".to_string(),
            password_env: "API_PASSWORD".to_string(),
            token_lifetime_secs: 3600,
            request_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BettingConfig {
    pub max_stake: Decimal,
    pub min_odds: Decimal,
    pub max_daily_loss: Decimal,
    /// Log bets instead of placing them.
    pub dry_run: bool,
}

impl Default for BettingConfig {
    fn default() -> Self {
        Self {
            max_stake: dec!(100),
            min_odds: dec!(1.5),
            max_daily_loss: dec!(500),
            dry_run: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StrategyConfig {
    pub min_value: Decimal,
    pub confidence_threshold: Decimal,
    pub stake_multiplier: Decimal,
    /// JSON file of `{match_id: {selection: probability}}`.
    pub estimates_path: Option<PathBuf>,
    /// Restrict match fetching to one sport.
    pub sport_id: Option<i64>,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            min_value: dec!(0.05),
            confidence_threshold: dec!(0.7),
            stake_multiplier: dec!(10),
            estimates_path: None,
            sport_id: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub responses_dir: PathBuf,
    /// Archive every raw API response.
    pub save_responses: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            responses_dir: PathBuf::from("api_responses"),
            save_responses: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AgentConfig {
    pub name: String,
    /// Check candidate endpoints before the run.
    pub explore_endpoints: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "sharpxch-bot".to_string(),
            explore_endpoints: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file, falling back to defaults when
    /// the file does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_env_overrides_with(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`, which maps a variable name to its value.
    pub fn apply_env_overrides_with(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = lookup("API_BASE_URL") {
            self.api.base_url = url;
        }
        if let Some(endpoint) = lookup("AUTH_ENDPOINT") {
            self.api.auth_endpoint = endpoint;
        }
        if let Some(secs) = lookup("TOKEN_LIFETIME_SECS") {
            self.api.token_lifetime_secs = secs
                .trim()
                .parse()
                .with_context(|| format!("Invalid TOKEN_LIFETIME_SECS: {secs}"))?;
        }

        let decimals = [
            ("MAX_STAKE", &mut self.betting.max_stake),
            ("MIN_ODDS", &mut self.betting.min_odds),
            ("MAX_DAILY_LOSS", &mut self.betting.max_daily_loss),
            ("MIN_VALUE", &mut self.strategy.min_value),
            ("CONFIDENCE_THRESHOLD", &mut self.strategy.confidence_threshold),
            ("STAKE_MULTIPLIER", &mut self.strategy.stake_multiplier),
        ];
        for (key, slot) in decimals {
            if let Some(raw) = lookup(key) {
                *slot = Decimal::from_str(raw.trim())
                    .with_context(|| format!("Invalid {key}: {raw}"))?;
                info!(key, value = %slot, "Config override from environment");
            }
        }
        Ok(())
    }

    pub fn value_config(&self) -> ValueConfig {
        ValueConfig {
            min_value: self.strategy.min_value,
            min_odds: self.betting.min_odds,
            confidence_threshold: self.strategy.confidence_threshold,
            max_stake: self.betting.max_stake,
            stake_multiplier: self.strategy.stake_multiplier,
        }
    }

    pub fn token_lifetime(&self) -> Duration {
        Duration::from_secs(self.api.token_lifetime_secs)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.api.request_delay_ms)
    }

    /// Credentials from the env vars named in `[api]`.
    pub fn credentials(&self) -> Result<Credentials> {
        Ok(Credentials::new(
            Self::resolve_env(&self.api.username_env)?,
            Self::resolve_env(&self.api.password_env)?,
        ))
    }

    /// Resolve an environment variable name to its value.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }
}
