//! Scoped on-disk staging of utterance audio for providers that take files.
//!
//! A [`StagedAudio`] owns a private temporary directory holding one WAV
//! file. Dropping it removes the directory, so the file is gone on every
//! exit path of the scope that holds it, including `?` propagation and
//! task cancellation.

use crate::audio::wav::write_wav;
use crate::defaults::STAGED_FILE_NAME;
use crate::error::{Result, RelayError};
use crate::pipeline::types::AudioBuffer;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A WAV rendering of one utterance, removed from disk when dropped.
#[derive(Debug)]
pub struct StagedAudio {
    dir: TempDir,
    path: PathBuf,
    sample_rate: u32,
    sample_count: usize,
}

impl StagedAudio {
    /// Path of the WAV file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    /// Reads the encoded WAV bytes for upload.
    pub async fn read_bytes(&self) -> Result<Vec<u8>> {
        Ok(tokio::fs::read(&self.path).await?)
    }

    /// Releases the resource now, surfacing cleanup errors instead of ignoring them.
    pub fn close(self) -> Result<()> {
        self.dir.close().map_err(|e| RelayError::Staging {
            message: format!("Failed to remove staged audio: {}", e),
        })
    }
}

/// Stages the buffer in a fresh directory under the system temp dir.
pub fn stage(buffer: &AudioBuffer) -> Result<StagedAudio> {
    let dir = tempfile::Builder::new().prefix("voxrelay-").tempdir()?;
    stage_into(dir, buffer)
}

/// Stages the buffer in a fresh directory under `parent`.
pub fn stage_in(parent: &Path, buffer: &AudioBuffer) -> Result<StagedAudio> {
    let dir = tempfile::Builder::new()
        .prefix("voxrelay-")
        .tempdir_in(parent)?;
    stage_into(dir, buffer)
}

fn stage_into(dir: TempDir, buffer: &AudioBuffer) -> Result<StagedAudio> {
    if buffer.sample_rate == 0 {
        // `dir` drops here and takes the empty directory with it.
        return Err(RelayError::Staging {
            message: "sample rate must be positive".to_string(),
        });
    }

    let path = dir.path().join(STAGED_FILE_NAME);
    let file = File::create(&path)?;
    write_wav(BufWriter::new(file), buffer.sample_rate, &buffer.samples)?;

    tracing::debug!(
        path = %path.display(),
        samples = buffer.samples.len(),
        sample_rate = buffer.sample_rate,
        "staged utterance"
    );

    Ok(StagedAudio {
        dir,
        path,
        sample_rate: buffer.sample_rate,
        sample_count: buffer.samples.len(),
    })
}
