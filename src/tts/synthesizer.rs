use crate::defaults;
use crate::error::{Result, RelayError};
use crate::pipeline::types::SynthesizedFrame;
use async_trait::async_trait;
use futures_util::stream::{self, Stream};
use parking_lot::Mutex;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Ordered, lazily produced synthesized audio.
///
/// A stream item error ends playback for the utterance; frames yielded
/// before it have already been handed to the consumer.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<SynthesizedFrame>> + Send>>;

/// Trait for text-to-speech providers.
#[async_trait]
pub trait TextToSpeech: Send + Sync {
    /// Returns `Configuration` if a required secret is absent.
    fn initialize(&self) -> Result<()>;

    /// Start synthesizing `text`.
    ///
    /// # Arguments
    /// * `text` - Text to speak
    /// * `language_hint` - Advisory language code; backends may ignore it
    /// * `voice_hint` - Provider voice id; `None` selects the backend default
    ///
    /// Errors before the first frame may be returned either here or as the
    /// first stream item.
    async fn synthesize(
        &self,
        text: &str,
        language_hint: Option<&str>,
        voice_hint: Option<&str>,
    ) -> Result<FrameStream>;

    fn name(&self) -> &str;
}

#[async_trait]
impl<T: TextToSpeech + ?Sized> TextToSpeech for Arc<T> {
    fn initialize(&self) -> Result<()> {
        (**self).initialize()
    }

    async fn synthesize(
        &self,
        text: &str,
        language_hint: Option<&str>,
        voice_hint: Option<&str>,
    ) -> Result<FrameStream> {
        (**self).synthesize(text, language_hint, voice_hint).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Mock synthesizer for testing.
///
/// Emits two short 24 kHz frames unless configured otherwise.
#[derive(Debug)]
pub struct MockTextToSpeech {
    frames: Vec<SynthesizedFrame>,
    should_fail: bool,
    initialized: AtomicBool,
    calls: AtomicUsize,
    last_text: Mutex<Option<String>>,
    last_voice: Mutex<Option<String>>,
}

impl Default for MockTextToSpeech {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTextToSpeech {
    pub fn new() -> Self {
        let rate = defaults::SYNTHESIS_SAMPLE_RATE;
        Self {
            frames: vec![
                SynthesizedFrame::new(rate, vec![100; 240]),
                SynthesizedFrame::new(rate, vec![-100; 240]),
            ],
            should_fail: false,
            initialized: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
            last_text: Mutex::new(None),
            last_voice: Mutex::new(None),
        }
    }

    pub fn with_frames(mut self, frames: Vec<SynthesizedFrame>) -> Self {
        self.frames = frames;
        self
    }

    /// Fail when synthesis is requested.
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_text(&self) -> Option<String> {
        self.last_text.lock().clone()
    }

    pub fn last_voice(&self) -> Option<String> {
        self.last_voice.lock().clone()
    }
}

#[async_trait]
impl TextToSpeech for MockTextToSpeech {
    fn initialize(&self) -> Result<()> {
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn synthesize(
        &self,
        text: &str,
        _language_hint: Option<&str>,
        voice_hint: Option<&str>,
    ) -> Result<FrameStream> {
        if !self.initialized.load(Ordering::SeqCst) {
            return Err(RelayError::not_initialized("mock-tts"));
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_text.lock() = Some(text.to_string());
        *self.last_voice.lock() = voice_hint.map(str::to_string);

        if self.should_fail {
            return Err(RelayError::Synthesis {
                message: "mock synthesis failure".to_string(),
            });
        }
        let frames: Vec<Result<SynthesizedFrame>> = self.frames.iter().cloned().map(Ok).collect();
        Ok(Box::pin(stream::iter(frames)))
    }

    fn name(&self) -> &str {
        "mock-tts"
    }
}
