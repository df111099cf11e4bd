//! voxrelay - Live speech translation relay
//!
//! Per-session speech-to-text → translation → speech synthesis over
//! WebSocket, with translation events on a side-channel.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod app;
pub mod audio;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod error;
pub mod logging;
pub mod notify;
pub mod pipeline;
pub mod provider;
pub mod server;
pub mod session;
pub mod stt;
pub mod translate;
pub mod tts;

// Capability traits (speech in → text → speech out)
pub use stt::SpeechToText;
pub use translate::Translator;
pub use tts::{FrameStream, TextToSpeech};

// Pipeline
pub use pipeline::{
    AudioBuffer, NotificationEvent, PipelineConfig, PipelineStage, SynthesizedFrame,
    TranslationPipeline, TranslationResult,
};

// Sessions and side-channels
pub use notify::{ChannelRegistry, EventNotifier, SessionChannel, SideChannel};
pub use session::{SessionLanguageState, SessionStore};

// Error handling
pub use error::{RelayError, Result};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
