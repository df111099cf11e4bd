//! ElevenLabs speech-to-text backend.

use crate::audio::StagedAudio;
use crate::defaults;
use crate::error::{Result, RelayError};
use crate::provider::{Credential, HttpSettings, error_body};
use crate::stt::transcriber::SpeechToText;
use async_trait::async_trait;
use serde::Deserialize;

const API_KEY_VAR: &str = "ELEVENLABS_API_KEY";
const DEFAULT_BASE_URL: &str = "https://api.elevenlabs.io";

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: Option<String>,
}

/// Uploads the staged WAV to `/v1/speech-to-text` as multipart form data.
#[derive(Debug)]
pub struct ElevenLabsStt {
    client: reqwest::Client,
    credential: Credential,
    base_url: String,
    model_id: String,
}

impl ElevenLabsStt {
    pub fn new(http: &HttpSettings) -> Result<Self> {
        Ok(Self {
            client: http.client()?,
            credential: Credential::from_env(API_KEY_VAR),
            base_url: DEFAULT_BASE_URL.to_string(),
            model_id: defaults::ELEVENLABS_STT_MODEL.to_string(),
        })
    }

    /// Point the backend at a different host (tests, proxies).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Use an explicit credential instead of the environment.
    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = credential;
        self
    }

    pub fn with_model(mut self, model_id: &str) -> Self {
        self.model_id = model_id.to_string();
        self
    }
}

#[async_trait]
impl SpeechToText for ElevenLabsStt {
    fn initialize(&self) -> Result<()> {
        self.credential.initialize()
    }

    async fn transcribe(&self, audio: &StagedAudio, language_hint: Option<&str>) -> Result<String> {
        let api_key = self.credential.get(self.name())?;
        let bytes = audio.read_bytes().await?;

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(defaults::STAGED_FILE_NAME)
            .mime_str("audio/wav")
            .map_err(|e| RelayError::Transcription {
                message: format!("Invalid upload part: {}", e),
            })?;

        let mut form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model_id", self.model_id.clone())
            .text("tag_audio_events", "false");
        if let Some(language) = language_hint {
            form = form.text("language_code", language.to_string());
        }

        let url = format!("{}/v1/speech-to-text", self.base_url);
        tracing::debug!(
            url = %url,
            language = ?language_hint,
            samples = audio.sample_count(),
            sample_rate = audio.sample_rate(),
            "sending transcription request"
        );

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| RelayError::Transcription {
                message: format!("Request to ElevenLabs failed: {}", e),
            })?;

        if !response.status().is_success() {
            return Err(RelayError::Transcription {
                message: error_body(response).await,
            });
        }

        let body: TranscriptionResponse =
            response.json().await.map_err(|e| RelayError::Transcription {
                message: format!("Malformed ElevenLabs response: {}", e),
            })?;

        body.text.ok_or_else(|| RelayError::Transcription {
            message: "ElevenLabs response has no 'text' field".to_string(),
        })
    }

    fn name(&self) -> &str {
        "elevenlabs-stt"
    }
}
