//! Single-attempt HTTP client used by every remote service module.
//!
//! Each call issues exactly one request. Any non-2xx response becomes a
//! `ToolError::Remote` carrying the status and the response body text; a
//! successful response is parsed as JSON. There are no retries.

use reqwest::{Client, Method};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{ToolError, ToolResult};
use crate::identity::Auth;

#[derive(Debug, Clone, Default)]
pub struct ServiceClient {
    http: Client,
}

impl ServiceClient {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
        }
    }

    pub fn with_client(http: Client) -> Self {
        Self { http }
    }

    /// `GET url?query` with the given authentication.
    pub async fn get(
        &self,
        operation: &'static str,
        url: &str,
        query: &[(&str, String)],
        auth: &Auth,
    ) -> ToolResult<Value> {
        let request = self.http.get(url).query(query);
        self.execute(operation, Method::GET, url, auth.apply(request))
            .await
    }

    /// Sends `body` as JSON (if any) with the given method and authentication.
    pub async fn send(
        &self,
        operation: &'static str,
        method: Method,
        url: &str,
        auth: &Auth,
        body: Option<&Value>,
    ) -> ToolResult<Value> {
        let mut request = self.http.request(method.clone(), url);
        if let Some(body) = body {
            request = request.json(body);
        }
        self.execute(operation, method, url, auth.apply(request))
            .await
    }

    pub async fn post(
        &self,
        operation: &'static str,
        url: &str,
        auth: &Auth,
        body: &Value,
    ) -> ToolResult<Value> {
        self.send(operation, Method::POST, url, auth, Some(body)).await
    }

    async fn execute(
        &self,
        operation: &'static str,
        method: Method,
        url: &str,
        request: reqwest::RequestBuilder,
    ) -> ToolResult<Value> {
        debug!(%method, url, operation, "Sending request");

        let resp = request
            .send()
            .await
            .map_err(|source| ToolError::Transport { operation, source })?;
        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|source| ToolError::Transport { operation, source })?;

        if !status.is_success() {
            warn!(%status, operation, "Remote call failed");
            return Err(ToolError::Remote {
                operation,
                status,
                body: text,
            });
        }

        debug!(%status, operation, "Remote call succeeded");
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|source| ToolError::Decode { operation, source })
    }
}

/// Joins a base URL and a path that starts with `/`.
pub fn endpoint(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[tokio::test]
    async fn non_success_status_carries_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/boom")
            .with_status(503)
            .with_body("upstream unavailable")
            .expect(1)
            .create_async()
            .await;

        let client = ServiceClient::new();
        let err = client
            .get("probe", &endpoint(&server.url(), "/boom"), &[], &Auth::None)
            .await
            .unwrap_err();

        mock.assert_async().await;
        match err {
            ToolError::Remote { status, body, operation } => {
                assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
                assert_eq!(body, "upstream unavailable");
                assert_eq!(operation, "probe");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_success_body_is_null() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("DELETE", "/thing")
            .with_status(204)
            .create_async()
            .await;

        let value = ServiceClient::new()
            .send(
                "delete",
                Method::DELETE,
                &endpoint(&server.url(), "/thing"),
                &Auth::None,
                None,
            )
            .await
            .unwrap();
        assert!(value.is_null());
    }

    #[tokio::test]
    async fn signed_auth_sets_headers() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/signed")
            .match_header("x-public-key", "pk")
            .match_header("x-signature", "sig")
            .with_status(200)
            .with_body(r#"{"ok":true}"#)
            .create_async()
            .await;

        let auth = Auth::Signed {
            public_key: "pk".into(),
            signature: "sig".into(),
        };
        let value = ServiceClient::new()
            .post(
                "signed",
                &endpoint(&server.url(), "/signed"),
                &auth,
                &serde_json::json!({}),
            )
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(value["ok"], true);
    }

    #[test]
    fn endpoint_joins_without_double_slash() {
        assert_eq!(endpoint("http://a/", "/api/x"), "http://a/api/x");
        assert_eq!(endpoint("http://a", "/api/x"), "http://a/api/x");
    }
}
