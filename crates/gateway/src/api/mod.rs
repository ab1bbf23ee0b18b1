//! HTTP API surface.
//!
//! Authentication is handled upstream (OAuth/session proxy); requests
//! arrive with the authenticated user's id in the `x-user-id` header.

pub mod chat;
pub mod conversations;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{header, HeaderName, StatusCode};
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::state::AppState;

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/chat/messages", post(chat::send_message))
        .route(
            "/v1/chat/elicitation/:tool_call_id",
            post(chat::submit_elicitation),
        )
        .route("/v1/chat/conversations", get(conversations::list))
        .route(
            "/v1/chat/conversations/:thread_id",
            get(conversations::detail).delete(conversations::delete),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── Authenticated user extractor ───────────────────────────────────

/// The authenticated user, as established by the upstream auth layer.
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<serde_json::Value>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Uuid::parse_str(v).ok())
            .map(CurrentUser)
            .ok_or((
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({"error": "missing or invalid x-user-id header"})),
            ))
    }
}

/// Transport headers required for unbuffered SSE delivery.
pub(crate) fn sse_headers() -> [(HeaderName, &'static str); 3] {
    [
        (header::CACHE_CONTROL, "no-cache"),
        (header::CONNECTION, "keep-alive"),
        (HeaderName::from_static("x-accel-buffering"), "no"),
    ]
}
