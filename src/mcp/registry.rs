//! Tool registration and execution.
//!
//! A tool is a name, a JSON schema advertised through `tools/list`, and an
//! async handler. Handlers receive the shared [`ToolContext`], the call id
//! of the request and the raw arguments; their JSON result is returned to the caller as a single text
//! content item.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info_span, warn, Instrument};

use crate::config::Config;
use crate::error::{ToolError, ToolResult};
use crate::identity::{load_keypair, KeyStore, Keypair};
use crate::services::ServiceClient;

/// Read-only state shared by every tool invocation.
#[derive(Debug)]
pub struct ToolContext {
    pub config: Config,
    pub client: ServiceClient,
    pub key_store: KeyStore,
}

impl ToolContext {
    pub fn new(config: Config) -> Self {
        let key_store = KeyStore::from_config(&config);
        Self {
            config,
            client: ServiceClient::new(),
            key_store,
        }
    }

    /// The configured signing identity, or `MissingCredential`.
    pub fn keypair(&self) -> ToolResult<Keypair> {
        load_keypair(&self.config)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    Text { text: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolOutput {
    pub content: Vec<ToolContent>,
}

impl ToolOutput {
    pub fn json(value: &Value) -> Self {
        Self {
            content: vec![ToolContent::Text {
                text: value.to_string(),
            }],
        }
    }

    /// Text of the first content item.
    pub fn text(&self) -> &str {
        match self.content.first() {
            Some(ToolContent::Text { text }) => text,
            None => "",
        }
    }
}

type Handler =
    Arc<dyn Fn(Arc<ToolContext>, String, Value) -> BoxFuture<'static, ToolResult<Value>> + Send + Sync>;

struct RegisteredTool {
    definition: ToolDefinition,
    handler: Handler,
}

pub struct ToolRegistry {
    ctx: Arc<ToolContext>,
    tools: Vec<RegisteredTool>,
}

impl ToolRegistry {
    pub fn new(ctx: ToolContext) -> Self {
        Self {
            ctx: Arc::new(ctx),
            tools: Vec::new(),
        }
    }

    pub fn context(&self) -> &ToolContext {
        &self.ctx
    }

    /// Registers a tool. A later registration under the same name replaces
    /// the earlier one.
    pub fn register<F, Fut>(&mut self, name: &str, description: &str, input_schema: Value, handler: F)
    where
        F: Fn(Arc<ToolContext>, String, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ToolResult<Value>> + Send + 'static,
    {
        let handler: Handler = Arc::new(move |ctx, call_id, args| Box::pin(handler(ctx, call_id, args)));
        let tool = RegisteredTool {
            definition: ToolDefinition {
                name: name.to_string(),
                description: description.to_string(),
                input_schema,
            },
            handler,
        };

        match self.tools.iter_mut().find(|t| t.definition.name == name) {
            Some(existing) => {
                warn!(tool = name, "Tool registered twice, replacing");
                *existing = tool;
            }
            None => self.tools.push(tool),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.iter().any(|t| t.definition.name == name)
    }

    /// Definitions in registration order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition.clone()).collect()
    }

    pub async fn call(&self, call_id: &str, name: &str, args: Value) -> ToolResult<ToolOutput> {
        let tool = self
            .tools
            .iter()
            .find(|t| t.definition.name == name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;

        let span = info_span!("tool", name, call_id);
        let handler = Arc::clone(&tool.handler);
        let ctx = Arc::clone(&self.ctx);
        async move {
            debug!("Executing tool");
            let value = handler(ctx, call_id.to_string(), args).await?;
            Ok(ToolOutput::json(&value))
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new(ToolContext::new(Config::default()));
        registry.register(
            "echo",
            "Echo the arguments",
            json!({"type": "object"}),
            |_ctx, _call_id, args| async move { Ok(args) },
        );
        registry.register(
            "whoami",
            "Report the call id",
            json!({"type": "object"}),
            |_ctx, call_id, _args| async move { Ok(json!({ "callId": call_id })) },
        );
        registry
    }

    #[tokio::test]
    async fn call_wraps_result_as_json_text() {
        let out = registry().call("1", "echo", json!({"a": [1, 2]})).await.unwrap();
        assert_eq!(out.text(), r#"{"a":[1,2]}"#);
        assert_eq!(
            serde_json::to_value(&out).unwrap(),
            json!({"content": [{"type": "text", "text": "{\"a\":[1,2]}"}]})
        );
    }

    #[tokio::test]
    async fn handler_receives_the_call_id() {
        let out = registry().call("req-7", "whoami", json!({})).await.unwrap();
        assert_eq!(out.text(), r#"{"callId":"req-7"}"#);
    }

    #[tokio::test]
    async fn unknown_tool_is_reported() {
        let err = registry().call("1", "nope", json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::UnknownTool(name) if name == "nope"));
    }

    #[test]
    fn duplicate_registration_replaces() {
        let mut registry = registry();
        registry.register("echo", "Second", json!({}), |_ctx, _call_id, _args| async { Ok(Value::Null) });
        let defs = registry.definitions();
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0].description, "Second");
    }
}
