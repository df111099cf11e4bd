//! ElevenLabs text-to-speech backend.
//!
//! Requests raw `pcm_24000` output and decodes it in memory; nothing is
//! written to disk. The whole clip arrives as one frame.

use crate::audio::wav;
use crate::defaults;
use crate::error::{Result, RelayError};
use crate::pipeline::types::SynthesizedFrame;
use crate::provider::{Credential, HttpSettings, error_body};
use crate::tts::synthesizer::{FrameStream, TextToSpeech};
use async_trait::async_trait;
use futures_util::stream;

const API_KEY_VAR: &str = "ELEVENLABS_API_KEY";
const DEFAULT_BASE_URL: &str = "https://api.elevenlabs.io";
const OUTPUT_FORMAT: &str = "pcm_24000";

#[derive(Debug)]
pub struct ElevenLabsTts {
    client: reqwest::Client,
    credential: Credential,
    base_url: String,
    voice_id: String,
    model_id: String,
}

impl ElevenLabsTts {
    pub fn new(http: &HttpSettings) -> Result<Self> {
        Ok(Self {
            client: http.client()?,
            credential: Credential::from_env(API_KEY_VAR),
            base_url: DEFAULT_BASE_URL.to_string(),
            voice_id: defaults::ELEVENLABS_VOICE_ID.to_string(),
            model_id: defaults::ELEVENLABS_TTS_MODEL.to_string(),
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

    /// Voice used when the caller gives no voice hint.
    pub fn with_voice(mut self, voice_id: &str) -> Self {
        self.voice_id = voice_id.to_string();
        self
    }

    pub fn with_model(mut self, model_id: &str) -> Self {
        self.model_id = model_id.to_string();
        self
    }
}

/// Turns a response body into a frame. Some proxies hand back a RIFF
/// container even for `pcm_*` formats, so both shapes are accepted.
fn decode_body(bytes: &[u8]) -> Result<SynthesizedFrame> {
    if wav::is_wav(bytes) {
        let (sample_rate, samples) = wav::read_wav(std::io::Cursor::new(bytes))?;
        return Ok(SynthesizedFrame::new(sample_rate, samples));
    }
    Ok(SynthesizedFrame::new(
        defaults::SYNTHESIS_SAMPLE_RATE,
        wav::decode_pcm_le(bytes),
    ))
}

async fn fetch_frame(
    client: reqwest::Client,
    url: String,
    api_key: String,
    body: serde_json::Value,
) -> Result<SynthesizedFrame> {
    let response = client
        .post(&url)
        .header("xi-api-key", api_key)
        .json(&body)
        .send()
        .await
        .map_err(|e| RelayError::Synthesis {
            message: format!("Request to ElevenLabs failed: {}", e),
        })?;

    if !response.status().is_success() {
        return Err(RelayError::Synthesis {
            message: error_body(response).await,
        });
    }

    let bytes = response.bytes().await.map_err(|e| RelayError::Synthesis {
        message: format!("Failed to read ElevenLabs audio: {}", e),
    })?;
    let frame = decode_body(&bytes)?;
    tracing::debug!(
        samples = frame.samples.len(),
        sample_rate = frame.sample_rate,
        "received synthesized audio"
    );
    Ok(frame)
}

#[async_trait]
impl TextToSpeech for ElevenLabsTts {
    fn initialize(&self) -> Result<()> {
        self.credential.initialize()
    }

    async fn synthesize(
        &self,
        text: &str,
        _language_hint: Option<&str>,
        voice_hint: Option<&str>,
    ) -> Result<FrameStream> {
        let api_key = self.credential.get(self.name())?.to_string();
        let voice = voice_hint.unwrap_or(&self.voice_id);
        let url = format!(
            "{}/v1/text-to-speech/{}?output_format={}",
            self.base_url, voice, OUTPUT_FORMAT
        );
        let body = serde_json::json!({
            "text": text,
            "model_id": self.model_id,
        });

        // The request is sent when the consumer first polls the stream.
        let request = fetch_frame(self.client.clone(), url, api_key, body);
        Ok(Box::pin(stream::once(request)))
    }

    fn name(&self) -> &str {
        "elevenlabs-tts"
    }
}
