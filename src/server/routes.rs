//! Plain HTTP endpoints.

use crate::server::AppState;
use crate::session::SessionLanguageState;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};

/// Replace the language pair of a session.
pub async fn set_language(
    State(state): State<AppState>,
    Json(language): Json<SessionLanguageState>,
) -> Json<serde_json::Value> {
    tracing::info!(
        session = %language.session_id,
        source_language = %language.source_language,
        target_language = %language.target_language,
        "set_language"
    );
    state.store.set_language_state(language);
    Json(serde_json::json!({ "ok": true }))
}

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Tear down every connected session and forget its state.
pub async fn reset(State(state): State<AppState>) -> Response {
    let outcomes = state.channels.teardown_all();
    let mut first_error = None;

    for (session_id, outcome) in outcomes {
        state.store.remove(&session_id);
        state.pipeline.forget_session(&session_id);
        if let Err(e) = outcome {
            tracing::error!(session = %session_id, error = %e, "failed to close session");
            first_error.get_or_insert(e);
        }
    }

    match first_error {
        None => {
            tracing::info!("all connections reset");
            Json(serde_json::json!({
                "message": "All connections have been cleaned up and reset."
            }))
            .into_response()
        }
        Some(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "detail": format!("An error occurred: {}", e) })),
        )
            .into_response(),
    }
}

/// Serve `index.html` from the static directory.
pub async fn index(State(state): State<AppState>) -> Response {
    let Some(dir) = state.static_dir.as_ref() else {
        return StatusCode::NOT_FOUND.into_response();
    };
    match tokio::fs::read_to_string(dir.join("index.html")).await {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            tracing::debug!(error = %e, "index.html unavailable");
            StatusCode::NOT_FOUND.into_response()
        }
    }
}
