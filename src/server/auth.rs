//! Bearer authentication for the WebSocket connection-setup route.
//!
//! Only requests under `/ws/` are inspected; everything else passes
//! through untouched.

use crate::error::{Result, RelayError};
use crate::provider::{Credential, HttpSettings, error_body};
use crate::server::AppState;
use async_trait::async_trait;
use axum::Json;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

/// Path prefix of the route that requires a bearer token.
pub const PROTECTED_PREFIX: &str = "/ws/";

/// Identity attached to an authenticated request's extensions.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthenticatedUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Validates bearer tokens against an identity provider.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// `Ok(None)` for a token the provider rejects (invalid or expired);
    /// `Err` when the provider could not be asked at all.
    async fn verify(&self, token: &str) -> Result<Option<AuthenticatedUser>>;
}

/// Supabase `auth/v1/user` verifier.
///
/// `SUPABASE_URL` and `SUPABASE_KEY` are read on first use, so a missing
/// variable rejects requests instead of stopping the server.
#[derive(Debug)]
pub struct SupabaseVerifier {
    client: reqwest::Client,
    url: Credential,
    key: Credential,
}

impl SupabaseVerifier {
    pub fn new(http: &HttpSettings) -> Result<Self> {
        Ok(Self {
            client: http.client()?,
            url: Credential::from_env("SUPABASE_URL"),
            key: Credential::from_env("SUPABASE_KEY"),
        })
    }

    pub fn with_credentials(mut self, url: Credential, key: Credential) -> Self {
        self.url = url;
        self.key = key;
        self
    }
}

#[async_trait]
impl TokenVerifier for SupabaseVerifier {
    async fn verify(&self, token: &str) -> Result<Option<AuthenticatedUser>> {
        self.url.initialize()?;
        self.key.initialize()?;
        let base = self.url.get("supabase")?.trim_end_matches('/');
        let key = self.key.get("supabase")?;

        let response = self
            .client
            .get(format!("{}/auth/v1/user", base))
            .header("apikey", key)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| RelayError::Auth {
                message: format!("Request to Supabase failed: {}", e),
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(RelayError::Auth {
                message: error_body(response).await,
            });
        }

        let user: AuthenticatedUser = response.json().await.map_err(|e| RelayError::Auth {
            message: format!("Malformed Supabase user: {}", e),
        })?;
        Ok(Some(user))
    }
}

/// Extracts the token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() { None } else { Some(token) }
}

fn unauthorized(detail: impl Into<String>) -> Response {
    let mut response = (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "detail": detail.into() })),
    )
        .into_response();
    response
        .headers_mut()
        .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    response
}

/// Middleware guarding [`PROTECTED_PREFIX`]. Disabled when the state
/// carries no verifier.
pub async fn require_bearer(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if !request.uri().path().starts_with(PROTECTED_PREFIX) {
        return next.run(request).await;
    }
    let Some(verifier) = state.verifier.clone() else {
        return next.run(request).await;
    };

    let Some(token) = bearer_token(request.headers()).map(str::to_string) else {
        return unauthorized("Authorization header missing or invalid");
    };

    match verifier.verify(&token).await {
        Ok(Some(user)) => {
            tracing::debug!(user = %user.id, path = %request.uri().path(), "authenticated");
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Ok(None) => unauthorized("Invalid token"),
        Err(e) => {
            tracing::warn!(error = %e, "token verification failed");
            unauthorized(format!("Authentication failed: {}", e))
        }
    }
}
