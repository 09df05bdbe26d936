//! Chunk upload
//!
//! Each chunk goes out as a multipart POST with a single `audio_data` file
//! field. Only completion and status are looked at; the body is ignored.

use reqwest::multipart::{Form, Part};
use reqwest::Client;
use std::time::Duration;
use tracing::{error, info};

use crate::audio::{AudioChunk, CHUNK_CONTENT_TYPE};
use crate::error::{RecorderError, RecorderResult};

/// Multipart field the endpoint reads the audio from
pub const AUDIO_FIELD: &str = "audio_data";

/// Outcome of a settled upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub name: String,
    pub status: u16,
}

#[async_trait::async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(&self, chunk: &AudioChunk) -> RecorderResult<UploadReceipt>;
}

/// Uploads chunks to an HTTP endpoint
pub struct HttpUploader {
    client: Client,
    upload_url: String,
}

impl HttpUploader {
    pub fn new(upload_url: impl Into<String>) -> RecorderResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;

        Ok(Self {
            client,
            upload_url: upload_url.into(),
        })
    }
}

#[async_trait::async_trait]
impl Uploader for HttpUploader {
    async fn upload(&self, chunk: &AudioChunk) -> RecorderResult<UploadReceipt> {
        info!(
            "Submitting chunk {} ({}, {} bytes, {:.1}s)",
            chunk.index,
            chunk.name,
            chunk.bytes.len(),
            chunk.duration_secs()
        );

        let part = Part::bytes(chunk.bytes.clone())
            .file_name(chunk.name.clone())
            .mime_str(CHUNK_CONTENT_TYPE)?;

        let form = Form::new().part(AUDIO_FIELD, part);

        let response = self
            .client
            .post(&self.upload_url)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            error!("Upload of {} failed: {}", chunk.name, status);
            return Err(RecorderError::UploadFailure(format!(
                "{} answered {}",
                self.upload_url, status
            )));
        }

        info!("Chunk {} submitted ({})", chunk.name, status);

        Ok(UploadReceipt {
            name: chunk.name.clone(),
            status: status.as_u16(),
        })
    }
}
