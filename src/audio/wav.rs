//! WAV encoding for staged utterances and decoding of provider audio payloads.

use crate::error::{Result, RelayError};
use std::io::{Read, Seek, Write};

/// Writes mono 16-bit PCM as a WAV stream at the given sample rate.
pub fn write_wav<W: Write + Seek>(writer: W, sample_rate: u32, samples: &[i16]) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut wav_writer = hound::WavWriter::new(writer, spec).map_err(|e| RelayError::Staging {
        message: format!("Failed to start WAV stream: {}", e),
    })?;

    for &sample in samples {
        wav_writer
            .write_sample(sample)
            .map_err(|e| RelayError::Staging {
                message: format!("Failed to write WAV sample: {}", e),
            })?;
    }

    wav_writer.finalize().map_err(|e| RelayError::Staging {
        message: format!("Failed to finalize WAV stream: {}", e),
    })
}

/// Encodes mono 16-bit PCM into an in-memory WAV file.
pub fn encode_wav(sample_rate: u32, samples: &[i16]) -> Result<Vec<u8>> {
    let mut cursor = std::io::Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
    write_wav(&mut cursor, sample_rate, samples)?;
    Ok(cursor.into_inner())
}

/// Decodes a 16-bit WAV stream into `(sample_rate, mono samples)`.
///
/// Stereo input is downmixed by averaging the two channels.
pub fn read_wav<R: Read>(reader: R) -> Result<(u32, Vec<i16>)> {
    let mut wav_reader = hound::WavReader::new(reader).map_err(|e| RelayError::Synthesis {
        message: format!("Failed to parse WAV payload: {}", e),
    })?;

    let spec = wav_reader.spec();
    if spec.bits_per_sample != 16 || spec.sample_format != hound::SampleFormat::Int {
        return Err(RelayError::Synthesis {
            message: format!(
                "Unsupported WAV format: {} bit {:?}",
                spec.bits_per_sample, spec.sample_format
            ),
        });
    }

    let raw_samples: Vec<i16> = wav_reader
        .samples::<i16>()
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| RelayError::Synthesis {
            message: format!("Failed to read WAV samples: {}", e),
        })?;

    let mono_samples = if spec.channels == 2 {
        raw_samples
            .chunks_exact(2)
            .map(|chunk| {
                let left = chunk[0] as i32;
                let right = chunk[1] as i32;
                ((left + right) / 2) as i16
            })
            .collect()
    } else {
        raw_samples
    };

    Ok((spec.sample_rate, mono_samples))
}

/// Decodes raw little-endian 16-bit PCM. A trailing odd byte is dropped.
pub fn decode_pcm_le(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// True if the payload starts with a RIFF/WAVE header.
pub fn is_wav(bytes: &[u8]) -> bool {
    bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE"
}
