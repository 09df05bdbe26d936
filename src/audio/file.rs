use anyhow::{Context, Result};
use hound::WavReader;
use std::io::Cursor;
use std::path::Path;
use tracing::info;

/// Format summary of a stored or received recording
#[derive(Debug, Clone)]
pub struct AudioFile {
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub sample_count: usize,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let reader = WavReader::open(path).context("Failed to open WAV file")?;
        Self::from_reader(reader)
    }

    /// Probe an in-memory WAV payload (upload bodies)
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let reader = WavReader::new(Cursor::new(bytes)).context("Payload is not a WAV file")?;
        Self::from_reader(reader)
    }

    fn from_reader<R: std::io::Read>(reader: WavReader<R>) -> Result<Self> {
        let spec = reader.spec();
        let sample_count = reader.len() as usize;

        let duration_seconds = if spec.sample_rate == 0 || spec.channels == 0 {
            0.0
        } else {
            sample_count as f64 / (spec.sample_rate as f64 * spec.channels as f64)
        };

        Ok(Self {
            duration_seconds,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            sample_count,
        })
    }
}
