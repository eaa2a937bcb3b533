// src/tools/backtest.rs

use std::sync::Arc;

use serde_json::{json, Value};

use super::{agent_id_schema, strategy_schema};
use crate::config::Capabilities;
use crate::error::{ToolError, ToolResult};
use crate::mcp::registry::{ToolContext, ToolRegistry};
use crate::services::backtest::{self, BacktestJobRequest, SubmitBacktestRequest};
use crate::services::market::RESOLUTIONS;
use crate::utils::parse_params;

pub fn register(registry: &mut ToolRegistry, capabilities: Capabilities) {
    let mut properties = json!({
        "agentId": agent_id_schema(),
        "name": {"type": "string", "minLength": 1, "maxLength": 64},
        "symbol": {"type": "string", "description": "Trading pair, e.g. \"BTC/USDC\""},
        "initialCapital": {"type": "number", "exclusiveMinimum": 0},
        "from": {"type": "number", "description": "Start timestamp (Unix seconds)"},
        "to": {"type": "number", "description": "End timestamp (Unix seconds)"},
        "resolution": {"type": "string", "enum": RESOLUTIONS},
        "strategy": strategy_schema()
    });
    if capabilities.simulation_config {
        properties["simulation"] = json!({
            "type": "object",
            "description": "Execution simulation settings such as fees, slippage and latency"
        });
    }

    registry.register(
        "submit_backtest",
        "Run a strategy backtest for an agent. Returns a job id to poll.",
        json!({
            "type": "object",
            "properties": properties,
            "required": ["agentId", "name", "symbol", "initialCapital", "strategy"],
            "additionalProperties": false
        }),
        submit_backtest,
    );

    let job_schema = json!({
        "type": "object",
        "properties": {
            "jobId": {"type": "string", "description": "Id returned by submit_backtest"}
        },
        "required": ["jobId"],
        "additionalProperties": false
    });
    registry.register(
        "get_backtest_status",
        "Get the progress of a backtest job",
        job_schema.clone(),
        get_backtest_status,
    );
    registry.register(
        "get_backtest_result",
        "Get the metrics and trades of a finished backtest job",
        job_schema,
        get_backtest_result,
    );
}

async fn submit_backtest(ctx: Arc<ToolContext>, _call_id: String, args: Value) -> ToolResult<Value> {
    let req: SubmitBacktestRequest = parse_params(args)?;
    if req.simulation.is_some() && !ctx.config.capabilities.simulation_config {
        return Err(ToolError::invalid("simulation settings are not enabled"));
    }
    let keypair = ctx.keypair()?;
    backtest::submit(&ctx.client, &ctx.config.backtest_engine_url, &keypair, &req).await
}

async fn get_backtest_status(ctx: Arc<ToolContext>, _call_id: String, args: Value) -> ToolResult<Value> {
    let req: BacktestJobRequest = parse_params(args)?;
    backtest::status(&ctx.client, &ctx.config.backtest_engine_url, &req.job_id).await
}

async fn get_backtest_result(ctx: Arc<ToolContext>, _call_id: String, args: Value) -> ToolResult<Value> {
    let req: BacktestJobRequest = parse_params(args)?;
    backtest::result(&ctx.client, &ctx.config.backtest_engine_url, &req.job_id).await
}
