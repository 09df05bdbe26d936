use chrono::{DateTime, Duration as ChronoDuration, SecondsFormat, Utc};
use std::io::Cursor;
use tracing::debug;

use super::backend::AudioFrame;
use crate::error::RecorderResult;

/// MIME type of the encoded chunk payload
pub const CHUNK_CONTENT_TYPE: &str = "audio/wav";

/// A completed, encoded segment of recorded audio ready for upload
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Chunk number within the session (0-indexed)
    pub index: usize,
    /// Upload filename, e.g. `2024-05-01T12:00:00.000Z.opus`
    pub name: String,
    /// Encoded WAV bytes
    pub bytes: Vec<u8>,
    pub sample_rate: u32,
    pub channels: u16,
    /// Number of samples in this chunk (all channels)
    pub sample_count: usize,
    /// When the chunk was flushed
    pub recorded_at: DateTime<Utc>,
}

impl AudioChunk {
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0.0;
        }
        self.sample_count as f64 / (self.sample_rate as f64 * self.channels as f64)
    }
}

/// Generates timestamp-derived chunk names that never repeat within a session
#[derive(Debug, Clone)]
pub struct ChunkNamer {
    extension: String,
    last: Option<DateTime<Utc>>,
}

impl ChunkNamer {
    pub fn new(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
            last: None,
        }
    }

    /// Name for a chunk flushed at `now`
    ///
    /// Names carry millisecond precision; a timestamp that does not move past
    /// the previous one is bumped forward by 1ms.
    pub fn next_name(&mut self, now: DateTime<Utc>) -> (String, DateTime<Utc>) {
        let mut stamp = truncate_to_millis(now);
        if let Some(last) = self.last {
            if stamp <= last {
                stamp = last + ChronoDuration::milliseconds(1);
            }
        }
        self.last = Some(stamp);

        let name = format!(
            "{}.{}",
            stamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.extension
        );
        (name, stamp)
    }
}

fn truncate_to_millis(ts: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ts.timestamp_millis()).unwrap_or(ts)
}

/// Accumulation buffer for the active recording session
#[derive(Debug)]
pub struct ChunkBuffer {
    samples: Vec<i16>,
    sample_rate: u32,
    channels: u16,
}

impl ChunkBuffer {
    /// `sample_rate`/`channels` are used until the first frame says otherwise
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            samples: Vec::new(),
            sample_rate,
            channels,
        }
    }

    pub fn push(&mut self, frame: &AudioFrame) {
        if self.samples.is_empty() {
            self.sample_rate = frame.sample_rate;
            self.channels = frame.channels;
        } else if frame.sample_rate != self.sample_rate || frame.channels != self.channels {
            debug!(
                "Skipping frame with mismatched format ({}Hz/{}ch, buffer is {}Hz/{}ch)",
                frame.sample_rate, frame.channels, self.sample_rate, self.channels
            );
            return;
        }
        self.samples.extend_from_slice(&frame.samples);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Encode everything buffered so far into a chunk
    ///
    /// An empty buffer still yields a valid (header-only) WAV.
    pub fn flush(
        self,
        index: usize,
        namer: &mut ChunkNamer,
        now: DateTime<Utc>,
    ) -> RecorderResult<AudioChunk> {
        let bytes = encode_wav(&self.samples, self.sample_rate, self.channels)?;
        let (name, recorded_at) = namer.next_name(now);

        Ok(AudioChunk {
            index,
            name,
            bytes,
            sample_rate: self.sample_rate,
            channels: self.channels,
            sample_count: self.samples.len(),
            recorded_at,
        })
    }
}

/// 16-bit PCM WAV, written in memory
pub fn encode_wav(samples: &[i16], sample_rate: u32, channels: u16) -> RecorderResult<Vec<u8>> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for &sample in samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
    }

    Ok(cursor.into_inner())
}
