//! Router assembly: HTTP endpoints, WebSocket upgrade, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;
pub mod ws;

/// Build the application router with:
/// - WebSocket at `/ws`
/// - REST-ish API under `/api/v1/...`
/// - CORS (allow any origin/method/headers), adjust for production if needed
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // WebSocket
        .route("/ws", get(ws::ws_upgrade))
        // HTTP API
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/board", get(http::http_get_board))
        .route("/api/v1/board/generate", post(http::http_post_generate))
        .route("/api/v1/board/cancel", post(http::http_post_cancel))
        .route("/api/v1/clue/reveal", post(http::http_post_reveal))
        .route("/api/v1/clue/resolve", post(http::http_post_resolve))
        .route("/api/v1/clue/edit", post(http::http_post_edit_clue))
        .route("/api/v1/category/edit", post(http::http_post_edit_category))
        .route("/api/v1/validate", post(http::http_post_validate))
        .route("/api/v1/guidance", get(http::http_get_guidance))
        .route("/api/v1/difficulty", get(http::http_get_difficulty))
        .route("/api/v1/wager", post(http::http_post_wager))
        .route("/api/v1/ratings", post(http::http_post_ratings))
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::config::AgentConfig;
    use crate::store::MemoryStore;

    fn app() -> Router {
        let state = AppState::with_parts(Arc::new(MemoryStore::new()), None, AgentConfig::default());
        build_router(Arc::new(state))
    }

    async fn call(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(v) => {
                req = req.header("content-type", "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        let res = app.oneshot(req.body(body).expect("request")).await.expect("response");
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.expect("body");
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn health_reports_generation_disabled() {
        let (status, body) = call(app(), "GET", "/api/v1/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"ok": true, "generationEnabled": false}));
    }

    #[tokio::test]
    async fn board_starts_with_six_categories() {
        let (status, body) = call(app(), "GET", "/api/v1/board", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["categories"].as_array().map(|a| a.len()), Some(6));
        assert_eq!(body["categories"][0]["title"], "World History");
    }

    #[tokio::test]
    async fn resolve_then_difficulty_reflects_ratings() {
        let app = app();
        let resolve = json!({"category": 1, "clue": 0, "resolution": {"kind": "correct"}});
        let (status, _) = call(app.clone(), "POST", "/api/v1/clue/resolve", Some(resolve.clone())).await;
        assert_eq!(status, StatusCode::OK);

        // A plain retry is refused; re-judging adds ratings.
        let (status, body) = call(app.clone(), "POST", "/api/v1/clue/resolve", Some(resolve)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["ok"], false);

        for _ in 0..2 {
            let (status, _) = call(
                app.clone(),
                "POST",
                "/api/v1/clue/resolve",
                Some(json!({"category": 1, "clue": 0, "resolution": {"kind": "correct"}, "rejudge": true})),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }
        let (_, body) = call(app, "GET", "/api/v1/difficulty", None).await;
        assert_eq!(body["Science"]["200"], 2);
    }

    #[tokio::test]
    async fn unknown_clue_is_404_with_error_body() {
        let (status, body) =
            call(app(), "POST", "/api/v1/clue/reveal", Some(json!({"category": 0, "clue": 7}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["ok"], false);
    }

    #[tokio::test]
    async fn generate_without_provider_is_503() {
        let (status, _) = call(app(), "POST", "/api/v1/board/generate", Some(json!({}))).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn validate_endpoint_reports_violations() {
        let (status, body) = call(
            app(),
            "POST",
            "/api/v1/validate",
            Some(json!({"category": "Rivers", "clue": "It flows through Cairo", "answer": "What is the Nile?"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"valid": true}));
    }

    #[tokio::test]
    async fn ratings_export_shapes() {
        let app = app();
        let entry = json!({
            "category": "Science", "clue": "c", "answer": "a", "rating": "good",
            "timestamp": "2024-05-01T12:00:00Z"
        });

        let (status, body) = call(app.clone(), "POST", "/api/v1/ratings", Some(json!({"type": "single", "rating": entry}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);

        let (status, body) = call(app.clone(), "POST", "/api/v1/ratings", Some(json!([entry, entry]))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "2 ratings saved successfully");

        let (status, body) = call(app.clone(), "POST", "/api/v1/ratings", Some(json!({"hello": 1}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid request format");

        let (status, _) = call(app, "GET", "/api/v1/ratings", None).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn wager_is_clamped() {
        let (_, body) = call(app(), "POST", "/api/v1/wager", Some(json!({"wager": 5, "score": 0}))).await;
        assert_eq!(body["wager"], 100);
    }
}
