use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::debug;

use crate::audio::{AudioFrame, ChunkBuffer};

/// The live capture plus everything recorded since the last chunk boundary
pub struct RecordingSession {
    frames: Option<mpsc::Receiver<AudioFrame>>,
    buffer: ChunkBuffer,
}

impl RecordingSession {
    pub fn new(frames: mpsc::Receiver<AudioFrame>, sample_rate: u32, channels: u16) -> Self {
        Self {
            frames: Some(frames),
            buffer: ChunkBuffer::new(sample_rate, channels),
        }
    }

    /// Next captured frame; pends forever once the capture stream has ended
    pub async fn next_frame(&mut self) -> Option<AudioFrame> {
        match self.frames.as_mut() {
            Some(rx) => rx.recv().await,
            None => std::future::pending().await,
        }
    }

    /// Mark the capture stream as finished
    pub fn end_stream(&mut self) {
        self.frames = None;
    }

    pub fn push(&mut self, frame: &AudioFrame) {
        self.buffer.push(frame);
    }

    /// Pull whatever the capture delivered before it was stopped
    pub fn drain(&mut self) {
        let Some(rx) = self.frames.as_mut() else {
            return;
        };

        let mut drained = 0usize;
        loop {
            match rx.try_recv() {
                Ok(frame) => {
                    self.buffer.push(&frame);
                    drained += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }

        if drained > 0 {
            debug!("Drained {} trailing frames", drained);
        }
        self.frames = None;
    }

    pub fn into_buffer(self) -> ChunkBuffer {
        self.buffer
    }
}
