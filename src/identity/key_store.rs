//! At-most-once persistence of the identity key.
//!
//! A stored key is never overwritten. Writes are guarded by an existence
//! check rather than a lock: two concurrent generators may both see an empty
//! store, in which case whichever write lands last is what later loads see.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use secrecy::ExposeSecret;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::info;

use super::keypair::Keypair;
use crate::config::{Config, KeyStoreFormat, PluginSettings, PLUGIN_ID, PRIVATE_KEY_ENV};
use crate::error::ToolResult;

#[derive(Debug, Clone)]
pub struct KeyStore {
    path: PathBuf,
    format: KeyStoreFormat,
}

impl KeyStore {
    pub fn new(path: PathBuf, format: KeyStoreFormat) -> Self {
        Self { path, format }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.key_store_path.clone(), config.key_store_format)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the stored private key, if one has been written.
    pub fn read_key(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;

        match self.format {
            KeyStoreFormat::EnvFile => Ok(env_file_key(&content)),
            KeyStoreFormat::JsonConfig => {
                if content.trim().is_empty() {
                    return Ok(None);
                }
                let doc: Value = serde_json::from_str(&content)
                    .with_context(|| format!("Invalid JSON in {}", self.path.display()))?;
                let settings = PluginSettings::from_document(&doc, PLUGIN_ID)?;
                Ok(settings.nostr_private_key.filter(|k| !k.trim().is_empty()))
            }
        }
    }

    /// Writes `private_key` unless a key is already stored.
    /// Returns whether a write happened.
    pub fn store_if_absent(&self, private_key: &str) -> Result<bool> {
        if self.read_key()?.is_some() {
            return Ok(false);
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).context("Failed to create key storage directory")?;
        }

        let content = match self.format {
            KeyStoreFormat::EnvFile => {
                let mut existing = if self.path.exists() {
                    fs::read_to_string(&self.path).context("Failed to read env file")?
                } else {
                    String::new()
                };
                if !existing.is_empty() && !existing.ends_with('\n') {
                    existing.push('\n');
                }
                existing.push_str(&format!("{}={}\n", PRIVATE_KEY_ENV, private_key));
                existing
            }
            KeyStoreFormat::JsonConfig => {
                let doc = if self.path.exists() {
                    let raw = fs::read_to_string(&self.path).context("Failed to read config document")?;
                    if raw.trim().is_empty() {
                        json!({})
                    } else {
                        serde_json::from_str(&raw).context("Invalid config document")?
                    }
                } else {
                    json!({})
                };
                to_pretty_json(&with_plugin_key(doc, private_key)?)?
            }
        };

        write_atomic(&self.path, &content)?;
        info!("Persisted identity key to {}", self.path.display());
        Ok(true)
    }
}

fn env_file_key(content: &str) -> Option<String> {
    content.lines().find_map(|line| {
        let line = line.trim();
        let line = line.strip_prefix("export ").unwrap_or(line);
        let (name, value) = line.split_once('=')?;
        if name.trim() != PRIVATE_KEY_ENV {
            return None;
        }
        let value = value.trim().trim_matches('"').trim_matches('\'');
        (!value.is_empty()).then(|| value.to_string())
    })
}

/// Inserts the key under `plugins.entries.<id>.config`, or at the top level
/// when the document uses the legacy flat shape.
fn with_plugin_key(mut doc: Value, private_key: &str) -> Result<Value> {
    let root = doc
        .as_object_mut()
        .ok_or_else(|| anyhow!("config document must be a JSON object"))?;

    let flat = !root.is_empty() && !root.contains_key("plugins");
    if flat {
        root.insert("nostrPrivateKey".into(), Value::String(private_key.to_string()));
        return Ok(doc);
    }

    let config = object_at(root, "plugins")?;
    let config = object_at(config, "entries")?;
    let config = object_at(config, PLUGIN_ID)?;
    let config = object_at(config, "config")?;
    config.insert("nostrPrivateKey".into(), Value::String(private_key.to_string()));
    Ok(doc)
}

fn object_at<'a>(parent: &'a mut Map<String, Value>, key: &str) -> Result<&'a mut Map<String, Value>> {
    parent
        .entry(key.to_string())
        .or_insert_with(|| json!({}))
        .as_object_mut()
        .ok_or_else(|| anyhow!("'{}' in config document is not an object", key))
}

fn to_pretty_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("Failed to serialize config document")
}

fn write_atomic(path: &Path, content: &str) -> Result<()> {
    // Create a temporary file for atomic write
    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, content).context("Failed to write key storage file")?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&temp_path, fs::Permissions::from_mode(0o600))
            .context("Failed to restrict key storage permissions")?;
    }

    fs::rename(&temp_path, path)
        .or_else(|_| {
            // If rename fails (e.g., cross-device), try copy + remove
            fs::copy(&temp_path, path)?;
            fs::remove_file(&temp_path)?;
            Ok::<(), std::io::Error>(())
        })
        .context("Failed to finalize key storage file")
}

/// Where an identity returned by [`generate_or_load`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KeySource {
    Configured,
    Stored,
    Generated,
}

#[derive(Debug, Clone)]
pub struct IdentityOutcome {
    pub keypair: Keypair,
    pub source: KeySource,
    /// True only when this call wrote the key to the store.
    pub persisted: bool,
}

/// Returns the configured key, else the stored key, else a freshly
/// generated one (written to the store when `persist` is set).
pub fn generate_or_load(config: &Config, store: &KeyStore, persist: bool) -> ToolResult<IdentityOutcome> {
    if let Some(secret) = config.private_key() {
        return Ok(IdentityOutcome {
            keypair: Keypair::from_secret(secret.expose_secret())?,
            source: KeySource::Configured,
            persisted: false,
        });
    }

    if let Some(stored) = store.read_key()? {
        return Ok(IdentityOutcome {
            keypair: Keypair::from_secret(&stored)?,
            source: KeySource::Stored,
            persisted: false,
        });
    }

    let keypair = Keypair::generate()?;
    let persisted = if persist {
        store.store_if_absent(keypair.private_key_hex().as_str())?
    } else {
        false
    };
    info!(npub = keypair.npub(), persisted, "Generated new identity key");

    Ok(IdentityOutcome {
        keypair,
        source: KeySource::Generated,
        persisted,
    })
}
