//! Data types that flow through the translation pipeline.

use crate::defaults;
use serde::{Deserialize, Serialize};

/// One utterance of mono 16-bit PCM as delivered by the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// PCM samples (16-bit signed integers).
    pub samples: Vec<i16>,
}

impl AudioBuffer {
    pub fn new(sample_rate: u32, samples: Vec<i16>) -> Self {
        Self {
            sample_rate,
            samples,
        }
    }

    /// Builds a buffer from little-endian 16-bit PCM bytes. A trailing odd byte is ignored.
    pub fn from_le_bytes(sample_rate: u32, bytes: &[u8]) -> Self {
        let samples = bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        Self::new(sample_rate, samples)
    }

    /// Duration of the buffer in milliseconds (0 for a zero sample rate).
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        self.samples.len() as u64 * 1000 / self.sample_rate as u64
    }
}

/// A block of synthesized speech, emitted in playback order.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedFrame {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// PCM samples (16-bit signed integers).
    pub samples: Vec<i16>,
}

impl SynthesizedFrame {
    pub fn new(sample_rate: u32, samples: Vec<i16>) -> Self {
        Self {
            sample_rate,
            samples,
        }
    }
}

/// Source text and its translation for one utterance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationResult {
    #[serde(rename = "input")]
    pub input_text: String,
    #[serde(rename = "output")]
    pub output_text: String,
}

/// A point-in-time event delivered on a session's side-channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    /// Serialized payload.
    pub data: String,
}

impl NotificationEvent {
    pub fn new(event_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            data: data.into(),
        }
    }

    /// Builds the `translation` event carrying `{"input", "output"}` as its payload.
    pub fn translation(result: &TranslationResult) -> Result<Self, serde_json::Error> {
        Ok(Self::new(
            defaults::TRANSLATION_EVENT,
            serde_json::to_string(result)?,
        ))
    }

    /// Serialize the event to its wire form.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decodes the payload of a translation event.
    pub fn translation_payload(&self) -> Option<TranslationResult> {
        if self.event_type != defaults::TRANSLATION_EVENT {
            return None;
        }
        serde_json::from_str(&self.data).ok()
    }
}
