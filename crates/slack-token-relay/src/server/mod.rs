//! Relay server.
//!
//! Two transports drive one [`Relay`]:
//! - HTTP listener (axum) for long-running deployments
//! - Line-delimited JSON invocations on stdin/stdout for function runtimes
//!
//! Both resolve a request path to an [`Endpoint`] and call [`dispatch`], so
//! routing and rendering exist once.

pub mod invoke;
pub mod transport;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::StatusCode;
use serde::Serialize;

use crate::error::{RelayError, RenderError};
use crate::relay::{Authorized, CallbackParams, Relay, StartParams};
use crate::render;
use crate::state::start_sweep_task;

/// Optional path prefix used by the function-runtime deployment.
pub const API_PREFIX: &str = "/api";

/// Relay operations reachable over a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Home,
    Start,
    Callback,
    Health,
    Info,
}

impl Endpoint {
    /// Resolve a request path, tolerating the `/api` prefix.
    ///
    /// Returns the endpoint and the prefix that was present.
    #[must_use]
    pub fn resolve(path: &str) -> Option<(Self, &'static str)> {
        let (rest, prefix) = match path.strip_prefix(API_PREFIX) {
            Some(rest) if rest.is_empty() || rest.starts_with('/') => (rest, API_PREFIX),
            _ => (path, ""),
        };
        let rest = if rest.len() > 1 { rest.trim_end_matches('/') } else { rest };

        let endpoint = match rest {
            "" | "/" => Self::Home,
            "/auth/start" => Self::Start,
            "/auth/callback" => Self::Callback,
            "/health" => Self::Health,
            "/info" => Self::Info,
            _ => return None,
        };
        Some((endpoint, prefix))
    }
}

/// Transport-neutral response.
#[derive(Debug, Clone)]
pub struct RelayResponse {
    pub status: StatusCode,
    pub content_type: &'static str,
    pub location: Option<String>,
    pub no_store: bool,
    pub body: String,
}

impl RelayResponse {
    #[must_use]
    pub fn html(status: StatusCode, body: String) -> Self {
        Self { status, content_type: "text/html; charset=utf-8", location: None, no_store: false, body }
    }

    #[must_use]
    pub fn text(status: StatusCode, body: String) -> Self {
        Self { status, content_type: "text/plain; charset=utf-8", location: None, no_store: false, body }
    }

    /// Serialize `value`; a serialization failure becomes a 500 JSON error.
    #[must_use]
    pub fn json(status: StatusCode, value: &impl Serialize) -> Self {
        match serde_json::to_string(value) {
            Ok(body) => Self::json_body(status, body),
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize JSON response");
                Self::json_body(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    serde_json::json!({"status": "error", "error": "serialization_failed"}).to_string(),
                )
            }
        }
    }

    fn json_body(status: StatusCode, body: String) -> Self {
        Self { status, content_type: "application/json", location: None, no_store: false, body }
    }

    #[must_use]
    pub fn redirect(location: String) -> Self {
        Self {
            status: StatusCode::FOUND,
            content_type: "text/plain; charset=utf-8",
            location: Some(location),
            no_store: true,
            body: String::new(),
        }
    }

    #[must_use]
    pub fn not_found() -> Self {
        Self::json(StatusCode::NOT_FOUND, &serde_json::json!({"error": "not_found"}))
    }

    #[must_use]
    pub fn method_not_allowed(method: &str) -> Self {
        Self::json(
            StatusCode::METHOD_NOT_ALLOWED,
            &serde_json::json!({
                "error": "method_not_allowed",
                "message": format!("{method} is not supported")
            }),
        )
    }

    /// Mark the response as uncacheable.
    #[must_use]
    pub const fn no_store(mut self) -> Self {
        self.no_store = true;
        self
    }

    /// Header pairs every transport must emit.
    #[must_use]
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = vec![("Content-Type", self.content_type.to_string())];
        if let Some(ref location) = self.location {
            headers.push(("Location", location.clone()));
        }
        if self.no_store {
            headers.push(("Cache-Control", "no-store".to_string()));
            headers.push(("Pragma", "no-cache".to_string()));
            headers.push(("Referrer-Policy", "no-referrer".to_string()));
        }
        headers
    }
}

fn error_response(err: &RelayError) -> RelayResponse {
    RelayResponse::html(err.status(), render::render_error_page(err)).no_store()
}

/// The one-time token response. A page that failed to render still shows
/// the token, as plain text, since the code behind it is already spent.
fn token_response(authorized: &Authorized, page: Result<String, RenderError>) -> RelayResponse {
    match page {
        Ok(page) => RelayResponse::html(StatusCode::OK, page).no_store(),
        Err(e) => {
            tracing::error!(error = %e, "Token page failed to render, using plain text");
            RelayResponse::text(StatusCode::OK, render::render_plain_token(&authorized.result))
                .no_store()
        }
    }
}

fn param<'a>(query: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    query.get(key).map(String::as_str)
}

/// Run one relay operation and render its outcome.
pub async fn dispatch(
    relay: &Relay,
    endpoint: Endpoint,
    prefix: &str,
    query: &HashMap<String, String>,
) -> RelayResponse {
    match endpoint {
        Endpoint::Home => RelayResponse::html(
            StatusCode::OK,
            render::render_start_page(&format!("{prefix}/auth/start")),
        ),
        Endpoint::Start => {
            let params = StartParams {
                user_id: param(query, "user_id").map(str::to_string),
                user_name: param(query, "user_name").map(str::to_string),
            };
            match relay.start_flow(&params).await {
                Ok(url) => RelayResponse::redirect(url.into()),
                Err(e) => error_response(&e),
            }
        }
        Endpoint::Callback => {
            let params = CallbackParams {
                code: param(query, "code").map(str::to_string),
                state: param(query, "state").map(str::to_string),
                error: param(query, "error").map(str::to_string),
            };
            match relay.handle_callback(&params).await {
                Ok(authorized) => {
                    let page = render::render_token_page(&authorized.result, &authorized.requester);
                    token_response(&authorized, page)
                }
                Err(e) => error_response(&e),
            }
        }
        Endpoint::Health => match relay.health().await {
            Ok(health) => RelayResponse::json(StatusCode::OK, &health),
            Err(e) => {
                tracing::error!(error = %e, "Health check failed");
                RelayResponse::json(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    &serde_json::json!({
                        "status": "error",
                        "error": e.to_string(),
                        "timestamp": chrono::Utc::now(),
                    }),
                )
            }
        },
        Endpoint::Info => RelayResponse::json(StatusCode::OK, &relay.info()),
    }
}

/// Relay server bound to one transport.
pub struct RelayServer {
    relay: Arc<Relay>,
}

impl RelayServer {
    #[must_use]
    pub fn new(relay: Relay) -> Self {
        Self { relay: Arc::new(relay) }
    }

    /// Run the HTTP listener.
    ///
    /// # Errors
    ///
    /// Returns error on bind or server failure.
    pub async fn run_http(self) -> anyhow::Result<()> {
        let config = self.relay.config();
        let _sweeper = start_sweep_task(self.relay.store(), config.sweep_interval);

        let addr = SocketAddr::from(([0, 0, 0, 0], config.listen_port));
        let router = transport::create_router(Arc::clone(&self.relay));

        tracing::info!("HTTP server listening on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await?;

        tracing::info!("HTTP server shut down");
        Ok(())
    }

    /// Serve line-delimited invocation events from stdin.
    ///
    /// # Errors
    ///
    /// Returns error on I/O failure.
    pub async fn run_invocations(self) -> anyhow::Result<()> {
        let _sweeper =
            start_sweep_task(self.relay.store(), self.relay.config().sweep_interval);
        invoke::run_stdio(self.relay).await
    }
}

impl std::fmt::Debug for RelayServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayServer").field("relay", &self.relay).finish()
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install CTRL+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Received shutdown signal");
}
