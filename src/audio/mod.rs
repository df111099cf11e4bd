//! Audio encoding and staging.

pub mod staging;
pub mod wav;

pub use staging::{StagedAudio, stage, stage_in};
