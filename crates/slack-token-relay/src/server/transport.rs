//! HTTP listener adapter.
//!
//! Every GET is forwarded to [`dispatch`] after [`Endpoint::resolve`] picks
//! the endpoint, so both transports share one route table.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Body,
    extract::{OriginalUri, Query, State},
    http::{HeaderName, HeaderValue, Method, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use super::{Endpoint, RelayResponse, dispatch};
use crate::relay::Relay;

/// Create the HTTP router for the relay.
///
/// Paths are resolved by [`Endpoint::resolve`]; other methods get 405.
pub fn create_router(relay: Arc<Relay>) -> Router {
    Router::new()
        .fallback(get(handle_request).fallback(handle_method_not_allowed))
        .layer(CatchPanicLayer::custom(panic_response))
        // Spans carry the path only; callback queries hold the code and state.
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
            tracing::debug_span!("request", method = %request.method(), path = %request.uri().path())
        }))
        .with_state(relay)
}

async fn handle_request(
    State(relay): State<Arc<Relay>>,
    OriginalUri(uri): OriginalUri,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let Some((endpoint, prefix)) = Endpoint::resolve(uri.path()) else {
        return RelayResponse::not_found().into_response();
    };
    tracing::debug!(?endpoint, "Handling relay request");
    dispatch(&relay, endpoint, prefix, &query).await.into_response()
}

async fn handle_method_not_allowed(method: Method) -> Response {
    RelayResponse::method_not_allowed(method.as_str()).into_response()
}

impl IntoResponse for RelayResponse {
    fn into_response(self) -> Response {
        let headers = self.headers();
        let mut response = (self.status, self.body).into_response();
        for (name, value) in headers {
            match (HeaderName::try_from(name), HeaderValue::from_str(&value)) {
                (Ok(name), Ok(value)) => {
                    response.headers_mut().insert(name, value);
                }
                _ => tracing::error!(header = name, "Dropping invalid header"),
            }
        }
        response
    }
}

/// Turn a handler panic into a JSON 500 instead of a dropped connection.
fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = detail, "Request handler panicked");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({
            "status": "error",
            "error": "internal_error"
        })),
    )
        .into_response()
}
