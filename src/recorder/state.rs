use serde::{Deserialize, Serialize};

/// Where the recorder is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UiState {
    /// Waiting for the user to press record
    Idle,
    /// Capturing; chunks rotate on the timer
    Recording,
    /// Final chunk is being uploaded; control input is ignored
    Submitting,
    /// Final upload failed and the redirect was withheld
    Disabled,
}

impl UiState {
    /// Whether a control activation does anything in this state
    pub fn accepts_input(&self) -> bool {
        matches!(self, UiState::Idle | UiState::Recording)
    }

    pub fn control(&self) -> ControlState {
        match self {
            UiState::Idle => ControlState {
                label: "Record".to_string(),
                style: ControlStyle::Record,
                enabled: true,
            },
            UiState::Recording => ControlState {
                label: "Stop".to_string(),
                style: ControlStyle::Stop,
                enabled: true,
            },
            UiState::Submitting => ControlState {
                label: "Submitting...".to_string(),
                style: ControlStyle::Disabled,
                enabled: false,
            },
            UiState::Disabled => ControlState {
                label: "Upload failed".to_string(),
                style: ControlStyle::Disabled,
                enabled: false,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlStyle {
    Record,
    Stop,
    Disabled,
}

impl ControlStyle {
    /// CSS class list for HTML front ends
    pub fn class_name(&self) -> &'static str {
        match self {
            ControlStyle::Record => "button recordButton",
            ControlStyle::Stop => "button stopButton",
            ControlStyle::Disabled => "button disabledButton",
        }
    }
}

/// Everything a view needs to draw the record control
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlState {
    pub label: String,
    pub style: ControlStyle,
    pub enabled: bool,
}
