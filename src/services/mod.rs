//! HTTP clients for the remote trading services.
//!
//! Each submodule owns one service surface; they all go through
//! [`client::ServiceClient`] so transport and error mapping stay in one place.

pub mod agents;
pub mod backtest;
pub mod client;
pub mod custody;
pub mod market;
pub mod onboarding;
pub mod settlement;
pub mod wallets;
pub mod whitelist;

use serde_json::Value;

pub use client::ServiceClient;

/// Wallet listings arrive either as a bare array or wrapped in an object.
pub(crate) fn wallet_entries(listing: &Value) -> Vec<&Value> {
    let items = match listing {
        Value::Array(items) => Some(items),
        Value::Object(map) => ["wallets", "data", "items"]
            .iter()
            .find_map(|k| map.get(*k).and_then(Value::as_array)),
        _ => None,
    };
    items.map(|items| items.iter().collect()).unwrap_or_default()
}

pub(crate) fn entry_address(entry: &Value) -> Option<&str> {
    ["address", "wallet_address", "walletAddress"]
        .iter()
        .find_map(|k| entry.get(*k).and_then(Value::as_str))
}

pub(crate) fn entry_id(entry: &Value) -> Option<Value> {
    ["id", "walletId", "wallet_id"]
        .iter()
        .find_map(|k| entry.get(*k).filter(|v| !v.is_null()))
        .cloned()
}
