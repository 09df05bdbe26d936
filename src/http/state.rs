use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Directory that received recordings are written to
#[derive(Debug)]
pub struct RecordingStore {
    root: PathBuf,
}

impl RecordingStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `bytes` as `name`, replacing any earlier upload of that name
    pub async fn save(&self, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("Failed to create {}", self.root.display()))?;

        let path = self.root.join(name);
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;

        info!("Saved {} ({} bytes)", path.display(), bytes.len());
        Ok(path)
    }
}

/// Reject anything that could escape the store directory
pub fn validate_name(name: &str) -> std::result::Result<(), String> {
    if name.is_empty() {
        return Err("File name is empty".to_string());
    }
    if name.contains('/') || name.contains('\\') || name.contains("..") || name.contains('\0') {
        return Err(format!("Invalid file name: {}", name));
    }
    Ok(())
}

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RecordingStore>,
}

impl AppState {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            store: Arc::new(RecordingStore::new(root)),
        }
    }
}
