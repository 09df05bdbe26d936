//! Recorder controller
//!
//! This module provides the `RecorderController` that manages:
//! - Microphone capture and the volume meter
//! - Fixed-length chunk rotation on a timer
//! - Chunk upload and the final redirect
//! - UI state and session statistics

mod config;
mod controller;
mod session;
mod state;
mod stats;

pub use config::{RecorderConfig, RedirectPolicy};
pub use controller::{ControlEvent, RecorderController, StopOutcome};
pub use session::RecordingSession;
pub use state::{ControlState, ControlStyle, UiState};
pub use stats::SessionStats;
