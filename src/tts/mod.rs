//! Text-to-speech providers.

pub mod elevenlabs;
pub mod synthesizer;

pub use elevenlabs::ElevenLabsTts;
pub use synthesizer::{FrameStream, MockTextToSpeech, TextToSpeech};
