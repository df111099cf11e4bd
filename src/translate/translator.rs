use crate::error::{Result, RelayError};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Trait for text translation providers.
///
/// Language codes are passed through unchanged; a backend that needs
/// human-readable names maps them itself (see [`language_name`]).
#[async_trait]
pub trait Translator: Send + Sync {
    /// Returns `Configuration` if a required secret is absent.
    fn initialize(&self) -> Result<()>;

    /// Translate `text` from `source` to `target`.
    ///
    /// Failures surface as `Translation`; they are never turned into the
    /// original text or an empty string.
    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String>;

    fn name(&self) -> &str;
}

#[async_trait]
impl<T: Translator + ?Sized> Translator for Arc<T> {
    fn initialize(&self) -> Result<()> {
        (**self).initialize()
    }

    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String> {
        (**self).translate(text, source, target).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Maps a language code to the name used in prompts.
///
/// Only `ko` and `ja` are recognized; every other code, including `en`
/// and unknown ones, becomes `english`.
pub fn language_name(code: &str) -> &'static str {
    match code.trim().to_ascii_lowercase().as_str() {
        "ko" => "korean",
        "ja" => "japanese",
        _ => "english",
    }
}

type ResponseFn = dyn Fn(&str, &str, &str) -> String + Send + Sync;

/// Mock translator for testing.
///
/// By default answers `"{text}-{target}"`.
pub struct MockTranslator {
    response: Box<ResponseFn>,
    should_fail: bool,
    initialized: AtomicBool,
    calls: AtomicUsize,
}

impl std::fmt::Debug for MockTranslator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTranslator")
            .field("should_fail", &self.should_fail)
            .field("calls", &self.calls)
            .finish_non_exhaustive()
    }
}

impl Default for MockTranslator {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTranslator {
    pub fn new() -> Self {
        Self {
            response: Box::new(|text, _source, target| format!("{}-{}", text, target)),
            should_fail: false,
            initialized: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    /// Compute the translation from `(text, source, target)`.
    pub fn with_response_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &str, &str) -> String + Send + Sync + 'static,
    {
        self.response = Box::new(f);
        self
    }

    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Translator for MockTranslator {
    fn initialize(&self) -> Result<()> {
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String> {
        if !self.initialized.load(Ordering::SeqCst) {
            return Err(RelayError::not_initialized("mock-translator"));
        }
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.should_fail {
            return Err(RelayError::Translation {
                message: "mock translation failure".to_string(),
            });
        }
        Ok((self.response)(text, source, target))
    }

    fn name(&self) -> &str {
        "mock-translator"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_name_mapping() {
        assert_eq!(language_name("ko"), "korean");
        assert_eq!(language_name("ja"), "japanese");
        assert_eq!(language_name("en"), "english");
        assert_eq!(language_name("fr"), "english");
        assert_eq!(language_name(""), "english");
        assert_eq!(language_name("KO"), "korean");
    }

    #[tokio::test]
    async fn test_mock_default_response() {
        let translator = MockTranslator::new();
        translator.initialize().unwrap();
        let out = translator.translate("hello", "ja", "en").await.unwrap();
        assert_eq!(out, "hello-en");
        assert_eq!(translator.calls(), 1);
    }

    #[tokio::test]
    async fn test_mock_response_fn() {
        let translator = MockTranslator::new()
            .with_response_fn(|text, source, target| format!("[{source}->{target}] {text}"));
        translator.initialize().unwrap();
        let out = translator.translate("hi", "ko", "ja").await.unwrap();
        assert_eq!(out, "[ko->ja] hi");
    }

    #[tokio::test]
    async fn test_mock_failure() {
        let translator = MockTranslator::new().with_failure();
        translator.initialize().unwrap();
        assert!(matches!(
            translator.translate("x", "ja", "en").await,
            Err(RelayError::Translation { .. })
        ));
    }

    #[tokio::test]
    async fn test_translate_before_initialize_is_invalid_state() {
        let translator = MockTranslator::new();
        assert!(matches!(
            translator.translate("x", "ja", "en").await,
            Err(RelayError::InvalidState { .. })
        ));
        assert_eq!(translator.calls(), 0);
    }
}
