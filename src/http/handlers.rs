use super::state::{validate_name, AppState};
use crate::audio::AudioFile;
use crate::upload::AUDIO_FIELD;
use axum::{
    extract::{Multipart, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct UploadParams {
    /// Optional prefix for the stored name (e.g. a worker or session ID)
    pub session: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    /// Name the recording was stored under
    pub name: String,
    pub bytes: usize,
    /// Present when the payload parsed as WAV
    pub duration_secs: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: String) -> Response {
    (status, Json(ErrorResponse { error })).into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /upload
/// Store the `audio_data` file of a multipart form
pub async fn upload_recording(
    State(state): State<AppState>,
    Query(params): Query<UploadParams>,
    mut multipart: Multipart,
) -> Response {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                warn!("Malformed multipart body: {}", e);
                return error_response(
                    StatusCode::BAD_REQUEST,
                    format!("Malformed multipart body: {}", e),
                );
            }
        };

        if field.name() != Some(AUDIO_FIELD) {
            continue;
        }

        let file_name = field.file_name().map(str::to_string).unwrap_or_else(|| {
            format!(
                "{}.opus",
                Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
            )
        });

        let name = match params.session.as_deref() {
            Some(session) => format!("{}_{}", session, file_name),
            None => file_name,
        };

        if let Err(e) = validate_name(&name) {
            warn!("Rejected upload: {}", e);
            return error_response(StatusCode::BAD_REQUEST, e);
        }

        let data = match field.bytes().await {
            Ok(data) => data,
            Err(e) => {
                warn!("Failed to read upload body: {}", e);
                return error_response(
                    StatusCode::BAD_REQUEST,
                    format!("Failed to read {}: {}", AUDIO_FIELD, e),
                );
            }
        };

        info!("Receiving {} ({} bytes)", name, data.len());

        if let Err(e) = state.store.save(&name, &data).await {
            error!("Failed to store upload: {:#}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to store upload: {}", e),
            );
        }

        let duration_secs = AudioFile::from_bytes(&data)
            .ok()
            .map(|audio| audio.duration_seconds);

        info!("Upload complete: {}", name);

        return (
            StatusCode::ACCEPTED,
            Json(UploadResponse {
                name,
                bytes: data.len(),
                duration_secs,
            }),
        )
            .into_response();
    }

    error_response(
        StatusCode::BAD_REQUEST,
        format!("Missing {} field", AUDIO_FIELD),
    )
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
