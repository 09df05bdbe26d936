pub mod audio;
pub mod config;
pub mod error;
pub mod http;
pub mod recorder;
pub mod upload;
pub mod view;

pub use audio::{
    AudioBackend, AudioBackendConfig, AudioChunk, AudioFile, AudioFrame, ChunkBuffer, ChunkNamer,
    MeterReading, MicrophoneBackend, VolumeMeter,
};
pub use config::Config;
pub use error::{RecorderError, RecorderResult};
pub use http::{create_router, AppState, RecordingStore};
pub use recorder::{
    ControlEvent, ControlState, ControlStyle, RecorderConfig, RecorderController, RedirectPolicy,
    SessionStats, StopOutcome, UiState,
};
pub use upload::{HttpUploader, UploadReceipt, Uploader, AUDIO_FIELD};
pub use view::{Navigator, RecorderView, TerminalNavigator, TerminalView};
