use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::audio::MeterConfig;

pub const DEFAULT_CHUNK_DURATION: Duration = Duration::from_secs(10);
pub const DEFAULT_METER_REFRESH: Duration = Duration::from_millis(16); // ~60fps

/// What happens after the final upload settles
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedirectPolicy {
    /// Redirect whether or not the upload succeeded
    #[default]
    Always,
    /// Only redirect after a successful upload; otherwise disable the control
    OnSuccess,
}

/// Configuration for a recorder controller
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Session identifier used in logs and stats
    pub session_id: String,

    /// Destination handed to the navigator after submitting
    pub next_url: String,

    /// Length of each chunk before rotating the capture
    /// Default: 10 seconds
    pub chunk_duration: Duration,

    /// Stop automatically after this long
    pub max_duration: Option<Duration>,

    /// Extension of generated chunk names (without the dot)
    pub file_extension: String,

    pub redirect_policy: RedirectPolicy,

    /// Format assumed for a chunk before any frame arrives
    pub sample_rate: u32,
    pub channels: u16,

    pub meter: MeterConfig,

    /// Meter redraw period
    pub meter_refresh: Duration,
}

impl RecorderConfig {
    pub fn new(next_url: impl Into<String>) -> Self {
        Self {
            next_url: next_url.into(),
            ..Self::default()
        }
    }
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            session_id: format!("session-{}", uuid::Uuid::new_v4()),
            next_url: String::new(),
            chunk_duration: DEFAULT_CHUNK_DURATION,
            max_duration: None,
            file_extension: "opus".to_string(),
            redirect_policy: RedirectPolicy::Always,
            sample_rate: 16000,
            channels: 1,
            meter: MeterConfig::default(),
            meter_refresh: DEFAULT_METER_REFRESH,
        }
    }
}
