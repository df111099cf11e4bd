//! AssemblyAI speech-to-text backend.
//!
//! Three steps: upload the WAV, create a transcript job, poll the job until
//! it completes or errors. The free tier can take a long time to finish; the
//! per-request timeout applies to each poll, not to the whole job.

use crate::audio::StagedAudio;
use crate::defaults;
use crate::error::{Result, RelayError};
use crate::provider::{Credential, HttpSettings, error_body};
use crate::stt::transcriber::SpeechToText;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

const API_KEY_VAR: &str = "ASSEMBLYAI_API_KEY";
const BASE_URL_VAR: &str = "ASSEMBLYAI_API_URL";
const DEFAULT_BASE_URL: &str = "https://api.assemblyai.com";

#[derive(Debug, Deserialize)]
struct UploadResponse {
    upload_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TranscriptJob {
    id: String,
}

#[derive(Debug, Deserialize)]
struct TranscriptStatus {
    status: String,
    text: Option<String>,
    error: Option<String>,
}

#[derive(Debug)]
pub struct AssemblyAiStt {
    client: reqwest::Client,
    credential: Credential,
    base_url: String,
    poll_interval: Duration,
}

impl AssemblyAiStt {
    /// Base URL comes from `ASSEMBLYAI_API_URL` when set.
    pub fn new(http: &HttpSettings) -> Result<Self> {
        let base_url = std::env::var(BASE_URL_VAR)
            .ok()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Ok(Self {
            client: http.client()?,
            credential: Credential::from_env(API_KEY_VAR),
            base_url: base_url.trim_end_matches('/').to_string(),
            poll_interval: Duration::from_secs(defaults::ASSEMBLYAI_POLL_SECS),
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

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    async fn upload(&self, api_key: &str, bytes: Vec<u8>) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/v2/upload", self.base_url))
            .header("authorization", api_key)
            .body(bytes)
            .send()
            .await
            .map_err(request_failed)?;
        if !response.status().is_success() {
            return Err(RelayError::Transcription {
                message: format!("Upload failed: {}", error_body(response).await),
            });
        }

        let body: UploadResponse = response.json().await.map_err(malformed)?;
        body.upload_url.ok_or_else(|| RelayError::Transcription {
            message: "Upload response has no 'upload_url'".to_string(),
        })
    }

    async fn create_job(
        &self,
        api_key: &str,
        audio_url: &str,
        language_hint: Option<&str>,
    ) -> Result<String> {
        let mut request = serde_json::json!({
            "audio_url": audio_url,
            "speech_model": "universal",
        });
        if let Some(language) = language_hint {
            request["language_code"] = serde_json::Value::String(language.to_string());
        }

        let response = self
            .client
            .post(format!("{}/v2/transcript", self.base_url))
            .header("authorization", api_key)
            .json(&request)
            .send()
            .await
            .map_err(request_failed)?;
        if !response.status().is_success() {
            return Err(RelayError::Transcription {
                message: format!("Transcript request failed: {}", error_body(response).await),
            });
        }

        let job: TranscriptJob = response.json().await.map_err(malformed)?;
        Ok(job.id)
    }

    async fn poll(&self, api_key: &str, job_id: &str) -> Result<String> {
        let url = format!("{}/v2/transcript/{}", self.base_url, job_id);
        loop {
            let response = self
                .client
                .get(&url)
                .header("authorization", api_key)
                .send()
                .await
                .map_err(request_failed)?;
            if !response.status().is_success() {
                return Err(RelayError::Transcription {
                    message: format!("Polling failed: {}", error_body(response).await),
                });
            }

            let status: TranscriptStatus = response.json().await.map_err(malformed)?;
            tracing::debug!(job = job_id, status = %status.status, "assemblyai poll");
            match status.status.as_str() {
                "completed" => {
                    return status.text.ok_or_else(|| RelayError::Transcription {
                        message: "Completed transcript has no text".to_string(),
                    });
                }
                "error" => {
                    return Err(RelayError::Transcription {
                        message: format!(
                            "AssemblyAI job failed: {}",
                            status.error.unwrap_or_else(|| "unknown error".to_string())
                        ),
                    });
                }
                _ => tokio::time::sleep(self.poll_interval).await,
            }
        }
    }
}

fn request_failed(e: reqwest::Error) -> RelayError {
    RelayError::Transcription {
        message: format!("Request to AssemblyAI failed: {}", e),
    }
}

fn malformed(e: reqwest::Error) -> RelayError {
    RelayError::Transcription {
        message: format!("Malformed AssemblyAI response: {}", e),
    }
}

#[async_trait]
impl SpeechToText for AssemblyAiStt {
    fn initialize(&self) -> Result<()> {
        self.credential.initialize()
    }

    async fn transcribe(&self, audio: &StagedAudio, language_hint: Option<&str>) -> Result<String> {
        let api_key = self.credential.get(self.name())?;
        let bytes = audio.read_bytes().await?;
        tracing::debug!(
            samples = audio.sample_count(),
            sample_rate = audio.sample_rate(),
            "uploading utterance to assemblyai"
        );

        let audio_url = self.upload(api_key, bytes).await?;
        let job_id = self.create_job(api_key, &audio_url, language_hint).await?;
        self.poll(api_key, &job_id).await
    }

    fn name(&self) -> &str {
        "assemblyai-stt"
    }
}
