//! Gemini `generateContent` translation backend.

use crate::defaults;
use crate::error::{Result, RelayError};
use crate::provider::{Credential, HttpSettings, error_body};
use crate::translate::translator::{Translator, language_name};
use async_trait::async_trait;
use serde::Deserialize;

const API_KEY_VAR: &str = "GEMINI_API_KEY";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

impl GenerateResponse {
    fn into_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .next()?
            .text
    }
}

/// Builds the single-turn prompt sent to the model.
pub(crate) fn build_prompt(text: &str, source: &str, target: &str) -> String {
    format!(
        "Translate the following text from {} to {} Only provide the translated text without any explanation: {}",
        language_name(source),
        language_name(target),
        text
    )
}

#[derive(Debug)]
pub struct GeminiTranslator {
    client: reqwest::Client,
    credential: Credential,
    base_url: String,
    model: String,
}

impl GeminiTranslator {
    pub fn new(http: &HttpSettings) -> Result<Self> {
        Ok(Self {
            client: http.client()?,
            credential: Credential::from_env(API_KEY_VAR),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: defaults::GEMINI_MODEL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = credential;
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }
}

#[async_trait]
impl Translator for GeminiTranslator {
    fn initialize(&self) -> Result<()> {
        self.credential.initialize()
    }

    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String> {
        let api_key = self.credential.get(self.name())?;
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let request = serde_json::json!({
            "contents": [{
                "parts": [{ "text": build_prompt(text, source, target) }]
            }]
        });

        tracing::debug!(model = %self.model, from = source, to = target, "sending translation request");

        let response = self
            .client
            .post(&url)
            .header("X-goog-api-key", api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| RelayError::Translation {
                message: format!("Request to Gemini failed: {}", e),
            })?;

        if !response.status().is_success() {
            return Err(RelayError::Translation {
                message: error_body(response).await,
            });
        }

        let body: GenerateResponse = response.json().await.map_err(|e| RelayError::Translation {
            message: format!("Malformed Gemini response: {}", e),
        })?;

        body.into_text().ok_or_else(|| RelayError::Translation {
            message: "Gemini response has no candidate text".to_string(),
        })
    }

    fn name(&self) -> &str {
        "gemini-translator"
    }
}
