//! Translation pipeline for one utterance of one session.
//!
//! Stages run strictly in order on the caller's task; the synthesized audio
//! comes back as a lazy frame stream the transport drains at its own pace.

pub mod orchestrator;
pub mod types;

pub use orchestrator::{PipelineConfig, PipelineStage, TranslationPipeline};
pub use types::{AudioBuffer, NotificationEvent, SynthesizedFrame, TranslationResult};
