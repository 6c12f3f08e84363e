//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! The administrator identity may be referenced by env-var name in the
//! config and resolved at runtime via `std::env::var`.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;

use crate::engine::LotterySettings;
use crate::types::AccountId;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub lottery: LotteryConfig,
    pub server: ServerConfig,
    pub keeper: KeeperConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LotteryConfig {
    pub token_name: String,
    pub token_symbol: String,
    pub purchase_ratio: u64,
    pub bet_price: u64,
    pub bet_fee: u64,
    /// Administrator account id. Ignored when `admin_env` is set.
    #[serde(default)]
    pub admin: Option<String>,
    /// Name of an environment variable holding the administrator account id.
    #[serde(default)]
    pub admin_env: Option<String>,
    /// Use a fixed entropy value instead of the history hash. Demo only.
    #[serde(default)]
    pub fixed_entropy: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub enabled: bool,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KeeperConfig {
    pub enabled: bool,
    pub interval_secs: u64,
    pub closer: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub state_file: String,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::parse(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Parse and validate configuration from TOML text.
    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve an environment variable name to its value.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }

    fn validate(&self) -> Result<()> {
        if self.lottery.purchase_ratio == 0 {
            bail!("lottery.purchase_ratio must be greater than 0");
        }
        if self.lottery.admin.is_none() && self.lottery.admin_env.is_none() {
            bail!("one of lottery.admin or lottery.admin_env must be set");
        }
        if self.keeper.enabled && self.keeper.interval_secs == 0 {
            bail!("keeper.interval_secs must be greater than 0");
        }
        if self.keeper.closer.trim().is_empty() {
            bail!("keeper.closer must not be empty");
        }
        Ok(())
    }
}

impl LotteryConfig {
    pub fn settings(&self) -> LotterySettings {
        LotterySettings {
            purchase_ratio: self.purchase_ratio,
            bet_price: self.bet_price,
            bet_fee: self.bet_fee,
        }
    }

    /// The administrator account, read from the environment when
    /// `admin_env` is configured.
    pub fn admin_account(&self) -> Result<AccountId> {
        let id = match (&self.admin_env, &self.admin) {
            (Some(env), _) => AppConfig::resolve_env(env)?,
            (None, Some(id)) => id.clone(),
            (None, None) => bail!("no administrator configured"),
        };
        let account = AccountId::from(id);
        if account.is_empty() {
            bail!("administrator account id is empty");
        }
        Ok(account)
    }

    /// Fields where this config disagrees with a restored lottery. Saved
    /// state wins on restore, so these edits have no effect.
    pub fn drift_from(&self, settings: &LotterySettings, admin: &AccountId) -> Vec<String> {
        let wanted = self.settings();
        let mut drift = Vec::new();
        if wanted.purchase_ratio != settings.purchase_ratio {
            drift.push(format!(
                "purchase_ratio: config {} saved {}",
                wanted.purchase_ratio, settings.purchase_ratio
            ));
        }
        if wanted.bet_price != settings.bet_price {
            drift.push(format!("bet_price: config {} saved {}", wanted.bet_price, settings.bet_price));
        }
        if wanted.bet_fee != settings.bet_fee {
            drift.push(format!("bet_fee: config {} saved {}", wanted.bet_fee, settings.bet_fee));
        }
        match self.admin_account() {
            Ok(configured) if &configured != admin => {
                drift.push(format!("admin: config {configured} saved {admin}"));
            }
            Ok(_) => {}
            Err(e) => drift.push(format!("admin: {e}")),
        }
        drift
    }
}
