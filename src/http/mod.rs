//! Upload receiver
//!
//! The endpoint side of the recorder's upload contract:
//! - POST /upload - Store an `audio_data` multipart file (202 Accepted)
//! - GET /recordings/:name - Fetch a stored recording
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use handlers::UploadResponse;
pub use routes::create_router;
pub use state::{validate_name, AppState, RecordingStore};
