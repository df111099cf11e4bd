//! HTTP server: configuration endpoint, health, reset and the WebSocket
//! transport.

pub mod auth;
pub mod routes;
pub mod ws;

use crate::notify::ChannelRegistry;
use crate::pipeline::TranslationPipeline;
use crate::session::SessionStore;
use auth::TokenVerifier;
use axum::Router;
use axum::middleware;
use axum::routing::{get, post};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<TranslationPipeline>,
    pub store: Arc<SessionStore>,
    pub channels: Arc<ChannelRegistry>,
    /// `None` disables bearer authentication.
    pub verifier: Option<Arc<dyn TokenVerifier>>,
    pub default_sample_rate: u32,
    pub static_dir: Option<PathBuf>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("pipeline", &self.pipeline)
            .field("sessions", &self.store.len())
            .field("connections", &self.channels.len())
            .field("auth", &self.verifier.is_some())
            .field("default_sample_rate", &self.default_sample_rate)
            .field("static_dir", &self.static_dir)
            .finish()
    }
}

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/", get(routes::index))
        .route("/set_language", post(routes::set_language))
        .route("/health", get(routes::health))
        .route("/dev/reset", get(routes::reset))
        .route("/ws/{session_id}", get(ws::ws_handler));

    if let Some(dir) = &state.static_dir {
        router = router.nest_service("/static", ServeDir::new(dir));
    }

    router
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_bearer,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{RelayError, Result};
    use crate::notify::{EventNotifier, SessionChannel, SideChannel};
    use crate::pipeline::PipelineConfig;
    use crate::server::auth::AuthenticatedUser;
    use crate::session::SessionLanguageState;
    use crate::stt::MockSpeechToText;
    use crate::translate::MockTranslator;
    use crate::tts::MockTextToSpeech;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    struct StaticVerifier(Option<&'static str>);

    #[async_trait]
    impl TokenVerifier for StaticVerifier {
        async fn verify(&self, token: &str) -> Result<Option<AuthenticatedUser>> {
            match self.0 {
                Some(valid) if valid == token => Ok(Some(AuthenticatedUser {
                    id: "user-1".to_string(),
                    email: None,
                })),
                Some(_) => Ok(None),
                None => Err(RelayError::missing_env("SUPABASE_URL")),
            }
        }
    }

    struct FailingChannel;

    impl SideChannel for FailingChannel {
        fn is_open(&self) -> bool {
            true
        }
        fn send(&self, _text: &str) -> Result<()> {
            Ok(())
        }
        fn close(&self) -> Result<()> {
            Err(RelayError::Notification {
                message: "close refused".to_string(),
            })
        }
    }

    fn state(verifier: Option<Arc<dyn TokenVerifier>>) -> AppState {
        let store = Arc::new(SessionStore::new());
        let channels = Arc::new(ChannelRegistry::new());
        let pipeline = TranslationPipeline::new(
            store.clone(),
            Arc::new(MockSpeechToText::new()),
            Arc::new(MockTranslator::new()),
            Arc::new(MockTextToSpeech::new()),
            EventNotifier::new(channels.clone()),
            PipelineConfig::default(),
        );
        AppState {
            pipeline: Arc::new(pipeline),
            store,
            channels,
            verifier,
            default_sample_rate: 48000,
            static_dir: None,
        }
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn health_is_ok() {
        let response = create_router(state(None)).oneshot(get_request("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, serde_json::json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn set_language_updates_store() {
        let state = state(None);
        let request = Request::builder()
            .method("POST")
            .uri("/set_language")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                r#"{"webrtc_id":"s1","source_language":"ko","target_language":"en"}"#,
            ))
            .unwrap();

        let response = create_router(state.clone()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, serde_json::json!({"ok": true}));
        assert_eq!(
            state.store.get_language_state("s1"),
            SessionLanguageState::new("s1", "ko", "en")
        );
    }

    #[tokio::test]
    async fn set_language_needs_no_token() {
        let state = state(Some(Arc::new(StaticVerifier(Some("good")))));
        let request = Request::builder()
            .method("POST")
            .uri("/set_language")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"session_id":"s2"}"#))
            .unwrap();

        let response = create_router(state.clone()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(state.store.get_language_state("s2").source_language, "ja");
    }

    #[tokio::test]
    async fn reset_closes_connections_and_state() {
        let state = state(None);
        let (channel, _rx) = SessionChannel::new();
        let channel = Arc::new(channel);
        state.channels.register("s1", channel.clone());
        state
            .store
            .set_language_state(SessionLanguageState::new("s1", "ko", "en"));
        state
            .store
            .set_language_state(SessionLanguageState::new("idle", "ko", "ja"));

        let response = create_router(state.clone()).oneshot(get_request("/dev/reset")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({"message": "All connections have been cleaned up and reset."})
        );
        assert!(state.channels.is_empty());
        assert!(!channel.is_open());
        assert_eq!(state.store.get_language_state("s1").source_language, "ja");
        assert_eq!(state.store.get_language_state("idle").target_language, "ja");
    }

    #[tokio::test]
    async fn reset_reports_teardown_failure() {
        let state = state(None);
        state.channels.register("bad", Arc::new(FailingChannel));

        let response = create_router(state.clone()).oneshot(get_request("/dev/reset")).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        let detail = body["detail"].as_str().unwrap();
        assert!(detail.starts_with("An error occurred: "));
        assert!(detail.contains("close refused"));
        assert!(state.channels.is_empty());
    }

    #[tokio::test]
    async fn ws_without_token_is_rejected() {
        let state = state(Some(Arc::new(StaticVerifier(Some("good")))));
        let response = create_router(state).oneshot(get_request("/ws/s1")).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");
        assert_eq!(
            body_json(response).await,
            serde_json::json!({"detail": "Authorization header missing or invalid"})
        );
    }

    #[tokio::test]
    async fn ws_with_invalid_token_is_rejected() {
        let state = state(Some(Arc::new(StaticVerifier(Some("good")))));
        let request = Request::builder()
            .uri("/ws/s1")
            .header(header::AUTHORIZATION, "Bearer wrong")
            .body(Body::empty())
            .unwrap();

        let response = create_router(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await, serde_json::json!({"detail": "Invalid token"}));
    }

    #[tokio::test]
    async fn ws_with_unavailable_verifier_is_rejected() {
        let state = state(Some(Arc::new(StaticVerifier(None))));
        let request = Request::builder()
            .uri("/ws/s1")
            .header(header::AUTHORIZATION, "Bearer any")
            .body(Body::empty())
            .unwrap();

        let response = create_router(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert!(
            body["detail"]
                .as_str()
                .unwrap()
                .starts_with("Authentication failed: ")
        );
    }

    #[tokio::test]
    async fn ws_with_valid_token_passes_auth() {
        let state = state(Some(Arc::new(StaticVerifier(Some("good")))));
        let request = Request::builder()
            .uri("/ws/s1")
            .header(header::AUTHORIZATION, "Bearer good")
            .body(Body::empty())
            .unwrap();

        // No upgrade headers, so the WebSocket extractor rejects it, but not with 401.
        let response = create_router(state).oneshot(request).await.unwrap();
        assert_ne!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn auth_disabled_skips_check() {
        let response = create_router(state(None)).oneshot(get_request("/ws/s1")).await.unwrap();
        assert_ne!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn static_files_and_index_are_served() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>relay</h1>").unwrap();
        std::fs::write(dir.path().join("app.js"), "console.log(1)").unwrap();
        let mut state = state(None);
        state.static_dir = Some(dir.path().to_path_buf());

        let router = create_router(state);
        let index = router.clone().oneshot(get_request("/")).await.unwrap();
        assert_eq!(index.status(), StatusCode::OK);
        let body = index.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"<h1>relay</h1>");

        let script = router.oneshot(get_request("/static/app.js")).await.unwrap();
        assert_eq!(script.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn index_without_static_dir_is_not_found() {
        let response = create_router(state(None)).oneshot(get_request("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
