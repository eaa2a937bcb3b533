// src/config.rs

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// Entry name under `plugins.entries` in the user configuration document.
pub const PLUGIN_ID: &str = "decom-trading";

pub const DEFAULT_BASE_URL: &str = "https://agent02.decom.dev";
pub const DEFAULT_TRADING_BOT_URL: &str = "https://trading-bot.decom.dev";
pub const DEFAULT_BACKTEST_ENGINE_URL: &str = "https://backtest.decom.dev";
pub const DEFAULT_WALLET_AGENT_URL: &str = "https://wallet-agent.decom.dev";
pub const DEFAULT_SETTLEMENT_ENGINE_URL: &str = "https://settlement.decom.dev";
pub const DEFAULT_PORT: u16 = 8080;

/// Environment variable holding the persisted key in env-style stores.
pub const PRIVATE_KEY_ENV: &str = "DECOM_NOSTR_PRIVATE_KEY";

/// Raw plugin options as they appear in a configuration document or the
/// environment. Every field is optional; `Config::resolve` fills defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginSettings {
    pub base_url: Option<String>,
    pub trading_bot_url: Option<String>,
    pub backtest_engine_url: Option<String>,
    pub wallet_agent_url: Option<String>,
    pub settlement_engine_url: Option<String>,
    pub nostr_private_key: Option<String>,
    pub live_trading: Option<bool>,
    pub simulation_config: Option<bool>,
}

impl PluginSettings {
    /// Reads plugin options from a configuration document.
    ///
    /// Two shapes are accepted:
    /// - the legacy flat object: `{ "baseUrl": ..., "nostrPrivateKey": ... }`
    /// - the plugin-scoped object: `{ "plugins": { "entries": { "<id>": { "config": {...} } } } }`
    ///
    /// A document with a `plugins` key but no entry for `plugin_id` yields
    /// empty settings rather than falling back to the top level.
    pub fn from_document(doc: &Value, plugin_id: &str) -> Result<Self> {
        if !doc.is_object() {
            return Err(anyhow!("plugin configuration must be a JSON object"));
        }

        if let Some(plugins) = doc.get("plugins") {
            let entry = plugins
                .get("entries")
                .and_then(|entries| entries.get(plugin_id))
                .and_then(|entry| entry.get("config"));
            return match entry {
                Some(config) => serde_json::from_value(config.clone())
                    .with_context(|| format!("invalid config for plugin entry '{}'", plugin_id)),
                None => Ok(Self::default()),
            };
        }

        debug!("Reading legacy flat plugin configuration");
        serde_json::from_value(doc.clone()).context("invalid flat plugin configuration")
    }

    /// Reads `DECOM_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            base_url: env::var("DECOM_BASE_URL").ok(),
            trading_bot_url: env::var("DECOM_TRADING_BOT_URL").ok(),
            backtest_engine_url: env::var("DECOM_BACKTEST_ENGINE_URL").ok(),
            wallet_agent_url: env::var("DECOM_WALLET_AGENT_URL").ok(),
            settlement_engine_url: env::var("DECOM_SETTLEMENT_ENGINE_URL").ok(),
            nostr_private_key: env::var(PRIVATE_KEY_ENV).ok(),
            live_trading: env_flag("DECOM_LIVE_TRADING")?,
            simulation_config: env_flag("DECOM_SIMULATION_CONFIG")?,
        })
    }

    /// Fields set in `other` take precedence.
    pub fn merge(self, other: PluginSettings) -> PluginSettings {
        PluginSettings {
            base_url: other.base_url.or(self.base_url),
            trading_bot_url: other.trading_bot_url.or(self.trading_bot_url),
            backtest_engine_url: other.backtest_engine_url.or(self.backtest_engine_url),
            wallet_agent_url: other.wallet_agent_url.or(self.wallet_agent_url),
            settlement_engine_url: other.settlement_engine_url.or(self.settlement_engine_url),
            nostr_private_key: other.nostr_private_key.or(self.nostr_private_key),
            live_trading: other.live_trading.or(self.live_trading),
            simulation_config: other.simulation_config.or(self.simulation_config),
        }
    }
}

fn env_flag(name: &str) -> Result<Option<bool>> {
    match env::var(name) {
        Ok(raw) => match raw.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            other => Err(anyhow!("{} must be a boolean, got '{}'", name, other)),
        },
        Err(_) => Ok(None),
    }
}

/// Feature switches that replace the per-revision plugin copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Live agents plus the custody/settlement onboarding tools.
    pub live_trading: bool,
    /// Backtests may carry a `simulation` block.
    pub simulation_config: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            live_trading: true,
            simulation_config: true,
        }
    }
}

/// Where `generate_key` persists a freshly generated key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStoreFormat {
    /// `DECOM_NOSTR_PRIVATE_KEY=<hex>` line in an env file.
    EnvFile,
    /// `plugins.entries.<id>.config.nostrPrivateKey` in a JSON document.
    JsonConfig,
}

impl KeyStoreFormat {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_lowercase().as_str() {
            "env" | "dotenv" => Ok(Self::EnvFile),
            "json" => Ok(Self::JsonConfig),
            other => Err(anyhow!("DECOM_KEY_STORE must be 'env' or 'json', got '{}'", other)),
        }
    }
}

/// Resolved configuration, built once at startup and shared read-only.
#[derive(Clone, Debug)]
pub struct Config {
    // Server settings
    pub port: u16,

    // Remote services
    pub base_url: String,
    pub trading_bot_url: String,
    pub backtest_engine_url: String,
    pub wallet_agent_url: String,
    pub settlement_engine_url: String,

    // Identity
    pub nostr_private_key: Option<Arc<SecretString>>,
    pub key_store_path: PathBuf,
    pub key_store_format: KeyStoreFormat,

    pub capabilities: Capabilities,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            base_url: DEFAULT_BASE_URL.to_string(),
            trading_bot_url: DEFAULT_TRADING_BOT_URL.to_string(),
            backtest_engine_url: DEFAULT_BACKTEST_ENGINE_URL.to_string(),
            wallet_agent_url: DEFAULT_WALLET_AGENT_URL.to_string(),
            settlement_engine_url: DEFAULT_SETTLEMENT_ENGINE_URL.to_string(),
            nostr_private_key: None,
            key_store_path: default_config_path(),
            key_store_format: KeyStoreFormat::JsonConfig,
            capabilities: Capabilities::default(),
        }
    }
}

impl Config {
    /// Applies defaults to raw settings and normalizes the endpoint URLs.
    pub fn resolve(settings: PluginSettings) -> Result<Self> {
        let defaults = Config::default();
        let capabilities = Capabilities {
            live_trading: settings
                .live_trading
                .unwrap_or(defaults.capabilities.live_trading),
            simulation_config: settings
                .simulation_config
                .unwrap_or(defaults.capabilities.simulation_config),
        };

        let nostr_private_key = settings
            .nostr_private_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .map(|k| Arc::new(SecretString::new(k)));

        Ok(Config {
            base_url: endpoint(settings.base_url, DEFAULT_BASE_URL, "baseUrl")?,
            trading_bot_url: endpoint(
                settings.trading_bot_url,
                DEFAULT_TRADING_BOT_URL,
                "tradingBotUrl",
            )?,
            backtest_engine_url: endpoint(
                settings.backtest_engine_url,
                DEFAULT_BACKTEST_ENGINE_URL,
                "backtestEngineUrl",
            )?,
            wallet_agent_url: endpoint(
                settings.wallet_agent_url,
                DEFAULT_WALLET_AGENT_URL,
                "walletAgentUrl",
            )?,
            settlement_engine_url: endpoint(
                settings.settlement_engine_url,
                DEFAULT_SETTLEMENT_ENGINE_URL,
                "settlementEngineUrl",
            )?,
            nostr_private_key,
            capabilities,
            ..defaults
        })
    }

    /// Loads configuration from the user config document and environment.
    pub fn from_env() -> Result<Self> {
        // Load variables from the .env file into the environment
        dotenvy::dotenv().ok();
        if let Some(user_env) = default_env_path().filter(|p| p.exists()) {
            dotenvy::from_path(&user_env).ok();
        }

        let config_path = env::var("DECOM_CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_config_path());

        let file_settings = if config_path.exists() {
            let raw = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read {}", config_path.display()))?;
            let doc: Value = serde_json::from_str(&raw)
                .with_context(|| format!("Invalid JSON in {}", config_path.display()))?;
            PluginSettings::from_document(&doc, PLUGIN_ID)?
        } else {
            debug!("No config document at {}", config_path.display());
            PluginSettings::default()
        };

        let settings = file_settings.merge(PluginSettings::from_env()?);
        let mut config = Config::resolve(settings)?;

        config.port = env::var("PORT")
            .unwrap_or_else(|_| DEFAULT_PORT.to_string())
            .parse()
            .context("PORT must be a valid number")?;

        config.key_store_format = match env::var("DECOM_KEY_STORE") {
            Ok(raw) => KeyStoreFormat::parse(&raw)?,
            Err(_) => KeyStoreFormat::JsonConfig,
        };
        config.key_store_path = match config.key_store_format {
            KeyStoreFormat::JsonConfig => config_path,
            KeyStoreFormat::EnvFile => default_env_path()
                .ok_or_else(|| anyhow!("Could not determine home directory for key storage"))?,
        };

        if config.nostr_private_key.is_none() {
            warn!("No nostrPrivateKey configured; authenticated tools will fail until one is set");
        }

        Ok(config)
    }

    /// Returns the configured private key, if any, without exposing it in logs.
    pub fn private_key(&self) -> Option<&SecretString> {
        self.nostr_private_key.as_deref()
    }
}

fn endpoint(value: Option<String>, default: &str, field: &str) -> Result<String> {
    let raw = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string());
    url::Url::parse(&raw).with_context(|| format!("{} is not a valid URL: '{}'", field, raw))?;
    Ok(raw.trim_end_matches('/').to_string())
}

fn decom_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".decom"))
}

/// `~/.decom/config.json`
pub fn default_config_path() -> PathBuf {
    decom_dir()
        .unwrap_or_else(|| Path::new(".").join(".decom"))
        .join("config.json")
}

/// `~/.decom/.env`
pub fn default_env_path() -> Option<PathBuf> {
    decom_dir().map(|dir| dir.join(".env"))
}
