// src/tools/market.rs

use std::sync::Arc;

use serde_json::{json, Value};

use super::NoParams;
use crate::error::ToolResult;
use crate::mcp::registry::{ToolContext, ToolRegistry};
use crate::services::market::{self, OhlcQuery, DEFAULT_RESOLUTION, RESOLUTIONS};
use crate::utils::parse_params;

pub fn register(registry: &mut ToolRegistry) {
    registry.register(
        "get_token_prices",
        "Get current live prices of all tokens",
        super::empty_schema(),
        get_token_prices,
    );
    registry.register(
        "get_ohlc",
        "Get OHLC candle data for a specific symbol",
        json!({
            "type": "object",
            "properties": {
                "symbol": {"type": "string", "description": "Trading pair, e.g. \"BTC/USDC\""},
                "from": {"type": "number", "description": "Start timestamp (Unix seconds)"},
                "to": {"type": "number", "description": "End timestamp (Unix seconds)"},
                "resolution": {
                    "type": "string",
                    "enum": RESOLUTIONS,
                    "default": DEFAULT_RESOLUTION,
                    "description": "Candle resolution"
                }
            },
            "required": ["symbol"],
            "additionalProperties": false
        }),
        get_ohlc,
    );
    registry.register(
        "get_trading_pairs",
        "List the trading pairs supported by the exchange",
        super::empty_schema(),
        get_trading_pairs,
    );
}

async fn get_token_prices(ctx: Arc<ToolContext>, _call_id: String, args: Value) -> ToolResult<Value> {
    parse_params::<NoParams>(args)?;
    market::token_prices(&ctx.client, &ctx.config.base_url).await
}

async fn get_ohlc(ctx: Arc<ToolContext>, _call_id: String, args: Value) -> ToolResult<Value> {
    let query: OhlcQuery = parse_params(args)?;
    market::ohlc(&ctx.client, &ctx.config.base_url, &query).await
}

async fn get_trading_pairs(ctx: Arc<ToolContext>, _call_id: String, args: Value) -> ToolResult<Value> {
    parse_params::<NoParams>(args)?;
    market::trading_pairs(&ctx.client, &ctx.config.base_url).await
}
