use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::UiState;

/// Statistics about a recording session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub session_id: String,

    pub state: UiState,

    /// When recording started (None if it never did)
    pub started_at: Option<DateTime<Utc>>,

    /// Time spent recording, in seconds
    pub duration_secs: f64,

    /// Chunks the endpoint accepted
    pub chunks_uploaded: usize,

    /// Uploads that errored or got a non-success status
    pub uploads_failed: usize,

    /// Chunks lost before upload (encoding failures)
    pub chunks_dropped: usize,

    /// Where the user was sent, once redirected
    pub redirected_to: Option<String>,
}
