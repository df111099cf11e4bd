use crate::audio::StagedAudio;
use crate::error::{Result, RelayError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Trait for speech-to-text providers.
///
/// Implementations are swappable (hosted backends vs mock). `initialize()`
/// must succeed before `transcribe()`; calling it again is a no-op.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Validate credentials and prepare the client.
    ///
    /// Returns `Configuration` if a required secret is absent.
    fn initialize(&self) -> Result<()>;

    /// Transcribe a staged utterance.
    ///
    /// # Arguments
    /// * `audio` - Staged WAV file, valid for the duration of the call
    /// * `language_hint` - Advisory source language code; backends may ignore it
    ///
    /// # Returns
    /// Best-effort transcription, or `Transcription` on provider/network error.
    /// Failures are never reported as empty text.
    async fn transcribe(&self, audio: &StagedAudio, language_hint: Option<&str>) -> Result<String>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

/// Implement SpeechToText for Arc<T> to allow sharing across sessions.
#[async_trait]
impl<T: SpeechToText + ?Sized> SpeechToText for Arc<T> {
    fn initialize(&self) -> Result<()> {
        (**self).initialize()
    }

    async fn transcribe(&self, audio: &StagedAudio, language_hint: Option<&str>) -> Result<String> {
        (**self).transcribe(audio, language_hint).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Mock speech-to-text provider for testing
#[derive(Debug)]
pub struct MockSpeechToText {
    response: String,
    should_fail: bool,
    initialized: AtomicBool,
    calls: AtomicUsize,
    last_hint: Mutex<Option<String>>,
    last_path: Mutex<Option<PathBuf>>,
}

impl Default for MockSpeechToText {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSpeechToText {
    /// Create a new mock that answers "mock transcription"
    pub fn new() -> Self {
        Self {
            response: "mock transcription".to_string(),
            should_fail: false,
            initialized: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
            last_hint: Mutex::new(None),
            last_path: Mutex::new(None),
        }
    }

    /// Configure the mock to return a specific response
    pub fn with_response(mut self, response: &str) -> Self {
        self.response = response.to_string();
        self
    }

    /// Configure the mock to fail on transcribe
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// Number of transcribe calls seen.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Language hint passed on the most recent call.
    pub fn last_hint(&self) -> Option<String> {
        self.last_hint.lock().clone()
    }

    /// Path of the staged file handed in on the most recent call.
    pub fn last_path(&self) -> Option<PathBuf> {
        self.last_path.lock().clone()
    }
}

#[async_trait]
impl SpeechToText for MockSpeechToText {
    fn initialize(&self) -> Result<()> {
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn transcribe(&self, audio: &StagedAudio, language_hint: Option<&str>) -> Result<String> {
        if !self.initialized.load(Ordering::SeqCst) {
            return Err(RelayError::not_initialized("mock-stt"));
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_hint.lock() = language_hint.map(str::to_string);
        *self.last_path.lock() = Some(audio.path().to_path_buf());

        if !audio.path().exists() {
            return Err(RelayError::Transcription {
                message: "staged audio missing".to_string(),
            });
        }
        if self.should_fail {
            Err(RelayError::Transcription {
                message: "mock transcription failure".to_string(),
            })
        } else {
            Ok(self.response.clone())
        }
    }

    fn name(&self) -> &str {
        "mock-stt"
    }
}
