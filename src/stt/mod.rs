//! Speech-to-text providers.

pub mod assemblyai;
pub mod elevenlabs;
pub mod transcriber;

pub use assemblyai::AssemblyAiStt;
pub use elevenlabs::ElevenLabsStt;
pub use transcriber::{MockSpeechToText, SpeechToText};
