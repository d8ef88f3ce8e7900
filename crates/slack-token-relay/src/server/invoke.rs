//! Invocation adapter for function runtimes.
//!
//! Reads one JSON request event per line on stdin and writes one JSON
//! response event per line on stdout.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use super::{Endpoint, RelayResponse, dispatch};
use crate::relay::Relay;

/// Request event.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationRequest {
    #[serde(default = "default_method")]
    pub http_method: String,
    pub path: String,
    #[serde(default)]
    pub query_string_parameters: Option<HashMap<String, String>>,
}

fn default_method() -> String {
    "GET".to_string()
}

/// Response event.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl From<RelayResponse> for InvocationResponse {
    fn from(response: RelayResponse) -> Self {
        let headers =
            response.headers().into_iter().map(|(name, value)| (name.to_string(), value)).collect();
        Self { status_code: response.status.as_u16(), headers, body: response.body }
    }
}

impl InvocationResponse {
    fn error(status: StatusCode, error: &str, message: impl Into<String>) -> Self {
        RelayResponse::json(
            status,
            &serde_json::json!({
                "error": error,
                "message": message.into()
            }),
        )
        .into()
    }
}

/// Handle one decoded request event.
pub async fn handle_invocation(relay: &Relay, request: &InvocationRequest) -> InvocationResponse {
    if !request.http_method.eq_ignore_ascii_case("GET") {
        return RelayResponse::method_not_allowed(&request.http_method).into();
    }

    let Some((endpoint, prefix)) = Endpoint::resolve(&request.path) else {
        return RelayResponse::not_found().into();
    };

    let empty = HashMap::new();
    let query = request.query_string_parameters.as_ref().unwrap_or(&empty);

    tracing::debug!(?endpoint, "Handling invocation");
    dispatch(relay, endpoint, prefix, query).await.into()
}

/// Decode and handle one raw event line.
///
/// The handler runs on its own task so a panic becomes a 500 response
/// instead of ending the loop.
pub async fn handle_line(relay: &Arc<Relay>, line: &str) -> InvocationResponse {
    let request: InvocationRequest = match serde_json::from_str(line) {
        Ok(req) => req,
        Err(e) => {
            tracing::warn!(error = %e, "Malformed invocation event");
            return InvocationResponse::error(
                StatusCode::BAD_REQUEST,
                "invalid_event",
                format!("Parse error: {e}"),
            );
        }
    };

    let relay = Arc::clone(relay);
    match tokio::spawn(async move { handle_invocation(&relay, &request).await }).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, "Invocation handler failed");
            InvocationResponse::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "invocation handler failed",
            )
        }
    }
}

/// Serve invocation events over stdio until stdin closes.
pub async fn run_stdio(relay: Arc<Relay>) -> anyhow::Result<()> {
    let stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();
    let mut reader = BufReader::new(stdin);
    let mut line = String::new();

    tracing::info!("Invocation adapter ready, waiting for events...");

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;

        if bytes_read == 0 {
            // EOF
            tracing::info!("Stdin closed, shutting down");
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let response = handle_line(&relay, trimmed).await;

        let response_json = serde_json::to_string(&response)?;
        stdout.write_all(response_json.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::config::Config;

    fn relay() -> Arc<Relay> {
        Arc::new(Relay::from_config(Config::for_testing("http://127.0.0.1:9")).unwrap())
    }

    #[tokio::test]
    async fn test_start_event_redirects() {
        let relay = relay();
        let line = json!({
            "httpMethod": "GET",
            "path": "/api/auth/start",
            "queryStringParameters": {"user_id": "u1"}
        })
        .to_string();

        let response = handle_line(&relay, &line).await;
        assert_eq!(response.status_code, 302);
        assert!(response.headers["Location"].starts_with("http://127.0.0.1:9/oauth/v2/authorize?"));
        assert_eq!(response.headers["Cache-Control"], "no-store");
    }

    #[tokio::test]
    async fn test_malformed_event() {
        let response = handle_line(&relay(), "{not json").await;
        assert_eq!(response.status_code, 400);
        assert!(response.body.contains("invalid_event"));
    }

    #[tokio::test]
    async fn test_post_rejected() {
        let line = json!({"httpMethod": "POST", "path": "/health"}).to_string();
        let response = handle_line(&relay(), &line).await;
        assert_eq!(response.status_code, 405);
    }

    #[tokio::test]
    async fn test_unknown_path() {
        let line = json!({"path": "/api/tokens"}).to_string();
        let response = handle_line(&relay(), &line).await;
        assert_eq!(response.status_code, 404);
    }

    #[tokio::test]
    async fn test_home_form_keeps_prefix() {
        let line = json!({"path": "/api"}).to_string();
        let response = handle_line(&relay(), &line).await;
        assert_eq!(response.status_code, 200);
        assert!(response.body.contains(r#"action="/api/auth/start""#));
    }

    #[tokio::test]
    async fn test_health_reports_invocation_mode() {
        let mut config = Config::for_testing("http://127.0.0.1:9");
        config.mode = crate::config::Mode::Invocation;
        let relay = Arc::new(Relay::from_config(config).unwrap());

        let response = handle_line(&relay, &json!({"path": "/health"}).to_string()).await;
        assert_eq!(response.status_code, 200);
        let body: serde_json::Value = serde_json::from_str(&response.body).unwrap();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["mode"], "invocation");
        assert!(body["uptime"].as_f64().is_some());
        assert!(body["timestamp"].is_string());
    }
}
