//! Default configuration constants for voxrelay.
//!
//! Shared between the config layer, providers and the transport adapter so
//! the same values are not spelled out twice.

/// Source language assumed for sessions that never configured one.
pub const SOURCE_LANGUAGE: &str = "ja";

/// Target language assumed for sessions that never configured one.
pub const TARGET_LANGUAGE: &str = "en";

/// Address the HTTP server binds to.
pub const BIND_ADDR: &str = "0.0.0.0:8000";

/// Sample rate assumed for inbound utterances when the client does not say.
pub const INPUT_SAMPLE_RATE: u32 = 48000;

/// Sample rate of frames produced by the ElevenLabs synthesis backend.
///
/// Matches the `pcm_24000` output format requested from the API.
pub const SYNTHESIS_SAMPLE_RATE: u32 = 24000;

/// Per-request timeout for provider HTTP calls, in seconds.
///
/// Providers have no timeout of their own; without this a hung call would
/// stall the session's pipeline indefinitely.
pub const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Interval between AssemblyAI transcript status polls, in seconds.
pub const ASSEMBLYAI_POLL_SECS: u64 = 3;

/// Default ElevenLabs voice.
pub const ELEVENLABS_VOICE_ID: &str = "JBFqnCBsd6RMkjVDRZzb";

/// Default ElevenLabs synthesis model.
pub const ELEVENLABS_TTS_MODEL: &str = "eleven_multilingual_v2";

/// Default ElevenLabs transcription model.
pub const ELEVENLABS_STT_MODEL: &str = "scribe_v1";

/// Default Gemini model used for translation.
pub const GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Event type carried by translation notifications.
pub const TRANSLATION_EVENT: &str = "translation";

/// File name of the staged WAV inside its temporary directory.
pub const STAGED_FILE_NAME: &str = "audio.wav";
