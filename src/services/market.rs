// src/services/market.rs

use serde::Deserialize;
use serde_json::{Number, Value};
use validator::{Validate, ValidationError};

use super::client::{endpoint, ServiceClient};
use crate::error::ToolResult;
use crate::identity::Auth;
use crate::utils::number_param;

/// Candle resolutions the market data service accepts.
pub const RESOLUTIONS: &[&str] = &["1", "5", "15", "30", "60", "240", "1D"];
pub const DEFAULT_RESOLUTION: &str = "60";

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct OhlcQuery {
    #[validate(length(min = 1, message = "symbol must not be empty"))]
    pub symbol: String,
    /// Start timestamp (Unix seconds)
    pub from: Option<Number>,
    /// End timestamp (Unix seconds)
    pub to: Option<Number>,
    #[validate(custom = "validate_resolution")]
    pub resolution: Option<String>,
}

fn validate_resolution(resolution: &str) -> Result<(), ValidationError> {
    if RESOLUTIONS.contains(&resolution) {
        Ok(())
    } else {
        let mut err = ValidationError::new("resolution");
        err.message = Some(format!("resolution must be one of {}", RESOLUTIONS.join(", ")).into());
        Err(err)
    }
}

impl OhlcQuery {
    /// Query pairs in the order the service documents them. Unset fields are
    /// omitted rather than defaulted.
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![("symbol", self.symbol.clone())];
        if let Some(from) = &self.from {
            query.push(("from", number_param(from)));
        }
        if let Some(to) = &self.to {
            query.push(("to", number_param(to)));
        }
        if let Some(resolution) = self.resolution.as_ref().filter(|r| !r.is_empty()) {
            query.push(("resolution", resolution.clone()));
        }
        query
    }
}

pub async fn token_prices(client: &ServiceClient, base_url: &str) -> ToolResult<Value> {
    client
        .get("token-prices", &endpoint(base_url, "/api/token-prices"), &[], &Auth::None)
        .await
}

pub async fn ohlc(client: &ServiceClient, base_url: &str, query: &OhlcQuery) -> ToolResult<Value> {
    client
        .get("ohlc", &endpoint(base_url, "/api/ohlc"), &query.to_query(), &Auth::None)
        .await
}

pub async fn trading_pairs(client: &ServiceClient, base_url: &str) -> ToolResult<Value> {
    client
        .get("trading-pairs", &endpoint(base_url, "/api/trading-pairs"), &[], &Auth::None)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::parse_params;
    use serde_json::json;

    #[test]
    fn query_omits_unset_fields() {
        let q: OhlcQuery = parse_params(json!({"symbol": "ETH/USDC"})).unwrap();
        assert_eq!(q.to_query(), vec![("symbol", "ETH/USDC".to_string())]);

        let q: OhlcQuery =
            parse_params(json!({"symbol": "ETH/USDC", "from": 10, "to": 20, "resolution": "1D"})).unwrap();
        let keys: Vec<_> = q.to_query().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["symbol", "from", "to", "resolution"]);
    }

    #[test]
    fn fractional_timestamps_are_accepted() {
        let q: OhlcQuery =
            parse_params(json!({"symbol": "BTC/USDC", "from": 1700000000.0, "to": 1700003600.5})).unwrap();
        assert_eq!(
            q.to_query(),
            vec![
                ("symbol", "BTC/USDC".to_string()),
                ("from", "1700000000".to_string()),
                ("to", "1700003600.5".to_string()),
            ]
        );
    }

    #[test]
    fn unknown_resolution_is_rejected() {
        let err = parse_params::<OhlcQuery>(json!({"symbol": "BTC/USDC", "resolution": "7"})).unwrap_err();
        assert!(err.to_string().contains("resolution"));
    }

    #[test]
    fn symbol_is_required() {
        assert!(parse_params::<OhlcQuery>(json!({"resolution": "15"})).is_err());
        assert!(parse_params::<OhlcQuery>(json!({"symbol": ""})).is_err());
    }
}
