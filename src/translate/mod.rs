//! Text translation providers.

pub mod gemini;
pub mod translator;

pub use gemini::GeminiTranslator;
pub use translator::{MockTranslator, Translator, language_name};
