use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::config::{
    RecorderConfig, RedirectPolicy, DEFAULT_CHUNK_DURATION, DEFAULT_METER_REFRESH,
};
use super::session::RecordingSession;
use super::state::UiState;
use super::stats::SessionStats;
use crate::audio::{AudioBackend, AudioChunk, AudioFrame, ChunkBuffer, ChunkNamer, VolumeMeter};
use crate::error::{RecorderError, RecorderResult};
use crate::upload::{UploadReceipt, Uploader};
use crate::view::{Navigator, RecorderView};

const SUBMITTING_STATUS: &str = "Now submitting your recording. This could take a moment, please be patient. If it fails, please try again and answer in a shorter amount of time.";
const PERMISSION_STATUS: &str = "Error: failed to initialize the recorder stream. Please make sure this application has access to your microphone, then try again.";
const UNAVAILABLE_STATUS: &str = "Error: no microphone is available. Please connect one and try again.";
const UPLOAD_FAILED_STATUS: &str = "Your recording could not be submitted. Please reload and try again.";

/// Input from the single user-facing control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    Activate,
}

/// Result of stopping and submitting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopOutcome {
    /// Name of the final chunk
    pub final_chunk: Option<String>,
    pub upload_succeeded: bool,
    pub redirected: bool,
}

type UploadResult = (String, RecorderResult<UploadReceipt>);

enum Wake {
    Control(Option<ControlEvent>),
    Rotate,
    Frame(Option<AudioFrame>),
    Redraw,
    Deadline,
    Uploaded(Result<UploadResult, JoinError>),
}

/// Drives capture, chunk rotation, upload and the final redirect
///
/// All recorder state lives here and is touched from one task only.
pub struct RecorderController {
    config: RecorderConfig,
    backend: Box<dyn AudioBackend>,
    uploader: Arc<dyn Uploader>,
    view: Box<dyn RecorderView>,
    navigator: Box<dyn Navigator>,

    state: UiState,
    session: Option<RecordingSession>,
    meter: VolumeMeter,
    namer: ChunkNamer,
    chunk_index: usize,

    /// Chunk rotation timer; None whenever not recording
    rotation: Option<Interval>,
    /// Meter redraw timer; None while no capture is attached
    redraw: Option<Interval>,
    /// Auto-stop deadline
    deadline: Option<Instant>,
    /// Rotation uploads still in flight
    uploads: JoinSet<UploadResult>,

    started_at: Option<(DateTime<Utc>, Instant)>,
    stopped_at: Option<Instant>,
    chunks_uploaded: usize,
    uploads_failed: usize,
    chunks_dropped: usize,
    redirected_to: Option<String>,
}

impl RecorderController {
    /// Zero chunk or meter periods are replaced with the defaults
    pub fn new(
        mut config: RecorderConfig,
        backend: Box<dyn AudioBackend>,
        uploader: Arc<dyn Uploader>,
        view: Box<dyn RecorderView>,
        navigator: Box<dyn Navigator>,
    ) -> Self {
        if config.chunk_duration.is_zero() {
            warn!(
                "Chunk duration must be positive, using {}s",
                DEFAULT_CHUNK_DURATION.as_secs()
            );
            config.chunk_duration = DEFAULT_CHUNK_DURATION;
        }
        if config.meter_refresh.is_zero() {
            warn!(
                "Meter refresh must be positive, using {}ms",
                DEFAULT_METER_REFRESH.as_millis()
            );
            config.meter_refresh = DEFAULT_METER_REFRESH;
        }

        info!(
            "Recorder {} ready (backend: {}, chunks: {}s)",
            config.session_id,
            backend.name(),
            config.chunk_duration.as_secs_f64()
        );

        let meter = VolumeMeter::new(config.meter.clone());
        let namer = ChunkNamer::new(config.file_extension.clone());

        let mut controller = Self {
            config,
            backend,
            uploader,
            view,
            navigator,
            state: UiState::Idle,
            session: None,
            meter,
            namer,
            chunk_index: 0,
            rotation: None,
            redraw: None,
            deadline: None,
            uploads: JoinSet::new(),
            started_at: None,
            stopped_at: None,
            chunks_uploaded: 0,
            uploads_failed: 0,
            chunks_dropped: 0,
            redirected_to: None,
        };
        controller.render_control();
        controller
    }

    pub fn state(&self) -> UiState {
        self.state
    }

    pub fn stats(&self) -> SessionStats {
        let duration_secs = match self.started_at {
            Some((_, started)) => {
                let end = self.stopped_at.unwrap_or_else(Instant::now);
                end.saturating_duration_since(started).as_secs_f64()
            }
            None => 0.0,
        };

        SessionStats {
            session_id: self.config.session_id.clone(),
            state: self.state,
            started_at: self.started_at.map(|(at, _)| at),
            duration_secs,
            chunks_uploaded: self.chunks_uploaded,
            uploads_failed: self.uploads_failed,
            chunks_dropped: self.chunks_dropped,
            redirected_to: self.redirected_to.clone(),
        }
    }

    /// The record control was pressed
    pub async fn activate(&mut self) -> RecorderResult<()> {
        if !self.state.accepts_input() {
            debug!("Control is disabled ({:?}), ignoring activation", self.state);
            return Ok(());
        }

        if self.state == UiState::Recording {
            self.stop().await.map(|_| ())
        } else {
            self.start().await
        }
    }

    /// Attach the microphone while idle so the meter shows input levels
    /// before recording starts. Nothing captured by the preview is uploaded.
    pub async fn preview(&mut self) -> RecorderResult<()> {
        if self.state != UiState::Idle || self.session.is_some() {
            return Ok(());
        }

        self.open_session().await?;
        debug!("Meter preview attached");
        Ok(())
    }

    /// Open the microphone and begin recording
    pub async fn start(&mut self) -> RecorderResult<()> {
        if self.state != UiState::Idle {
            warn!("Recording already started");
            return Ok(());
        }

        info!("Starting recording session: {}", self.config.session_id);

        if let Some(preview) = self.close_session().await {
            debug!("Meter preview closed, {} samples discarded", preview.len());
        }

        if let Err(e) = self.open_session().await {
            error!("Failed to start recording: {}", e);
            let status = match &e {
                RecorderError::PermissionDenied(_) => PERMISSION_STATUS,
                _ => UNAVAILABLE_STATUS,
            };
            self.view.set_status(status);
            return Err(e);
        }

        let now = Instant::now();
        let period = self.config.chunk_duration;
        let mut rotation = time::interval_at(now + period, period);
        rotation.set_missed_tick_behavior(MissedTickBehavior::Delay);

        self.rotation = Some(rotation);
        self.deadline = self.config.max_duration.map(|max| now + max);
        self.started_at = Some((Utc::now(), now));

        self.set_state(UiState::Recording);
        let status = self.recording_status();
        self.view.set_status(&status);
        self.view.hide_configuration();

        info!("Recording session started successfully");

        Ok(())
    }

    /// Close the current chunk, hand it to upload and reopen the capture
    ///
    /// Returns the name of the chunk queued for upload, if any. A chunk that
    /// cannot be encoded is dropped; a capture that cannot be reopened leaves
    /// the session recording without input until the next rotation.
    pub async fn rotate_chunk(&mut self) -> RecorderResult<Option<String>> {
        if self.state != UiState::Recording {
            debug!("Not recording, skipping rotation");
            return Ok(None);
        }

        let queued = match self.close_session().await {
            Some(buffer) => match self.flush(buffer) {
                Ok(chunk) => {
                    let name = chunk.name.clone();
                    let uploader = Arc::clone(&self.uploader);
                    self.uploads.spawn(async move {
                        let result = uploader.upload(&chunk).await;
                        (chunk.name, result)
                    });
                    Some(name)
                }
                Err(e) => {
                    warn!("Dropping chunk: {}", e);
                    self.chunks_dropped += 1;
                    None
                }
            },
            None => {
                debug!("No capture attached at rotation");
                None
            }
        };

        if let Err(e) = self.open_session().await {
            warn!("Failed to reacquire capture: {}", e);
            return Err(e);
        }

        Ok(queued)
    }

    /// Stop recording, submit the final chunk and redirect
    pub async fn stop(&mut self) -> RecorderResult<StopOutcome> {
        if self.state != UiState::Recording {
            warn!("Recording not active");
            return Ok(StopOutcome {
                final_chunk: None,
                upload_succeeded: false,
                redirected: false,
            });
        }

        info!("Stopping recording session: {}", self.config.session_id);

        self.set_state(UiState::Submitting);
        self.rotation = None;
        self.deadline = None;
        self.stopped_at = Some(Instant::now());

        let buffer = match self.close_session().await {
            Some(buffer) => buffer,
            None => ChunkBuffer::new(self.config.sample_rate, self.config.channels),
        };

        self.view.set_status(SUBMITTING_STATUS);

        let (final_chunk, upload_succeeded) = match self.flush(buffer) {
            Ok(chunk) => {
                let succeeded = match self.upload(&chunk).await {
                    Ok(_) => true,
                    Err(e) => {
                        warn!("Final upload failed: {}", e);
                        false
                    }
                };
                (Some(chunk.name), succeeded)
            }
            Err(e) => {
                error!("Failed to encode final chunk: {}", e);
                self.chunks_dropped += 1;
                (None, false)
            }
        };

        self.settle_uploads().await;

        let redirect = upload_succeeded || self.config.redirect_policy == RedirectPolicy::Always;
        if redirect {
            let next_url = self.config.next_url.clone();
            info!("Redirecting user to {}", next_url);
            self.navigator.redirect(&next_url);
            self.redirected_to = Some(next_url);
            self.set_state(UiState::Idle);
        } else {
            self.set_state(UiState::Disabled);
            self.view.set_status(UPLOAD_FAILED_STATUS);
        }

        Ok(StopOutcome {
            final_chunk,
            upload_succeeded,
            redirected: redirect,
        })
    }

    /// Send one chunk to the endpoint
    pub async fn upload(&mut self, chunk: &AudioChunk) -> RecorderResult<UploadReceipt> {
        let result = self.uploader.upload(chunk).await;
        self.record_upload(&chunk.name, &result);
        result
    }

    /// Run until the user has been redirected (or the control goes away)
    pub async fn run(mut self, mut events: mpsc::Receiver<ControlEvent>) -> SessionStats {
        loop {
            // Deadline must win over a rotation due at the same instant
            let wake = tokio::select! {
                biased;

                event = events.recv() => Wake::Control(event),
                _ = until(self.deadline) => Wake::Deadline,
                _ = tick(&mut self.rotation) => Wake::Rotate,
                Some(done) = self.uploads.join_next(), if !self.uploads.is_empty() => Wake::Uploaded(done),
                frame = next_frame(&mut self.session) => Wake::Frame(frame),
                _ = tick(&mut self.redraw) => Wake::Redraw,
            };

            match wake {
                Wake::Control(Some(ControlEvent::Activate)) => {
                    let was_recording = self.state == UiState::Recording;
                    if let Err(e) = self.activate().await {
                        error!("Control activation failed: {}", e);
                    }
                    if was_recording && self.state != UiState::Recording {
                        break;
                    }
                }
                Wake::Control(None) => {
                    if self.state == UiState::Recording {
                        info!("Control closed while recording, submitting");
                        if let Err(e) = self.stop().await {
                            error!("Failed to stop recording: {}", e);
                        }
                    }
                    break;
                }
                Wake::Rotate => {
                    if self.deadline_reached() {
                        self.auto_stop().await;
                        break;
                    }
                    if let Err(e) = self.rotate_chunk().await {
                        warn!("Chunk rotation incomplete: {}", e);
                    }
                }
                Wake::Frame(Some(frame)) => self.on_frame(frame),
                Wake::Frame(None) => {
                    warn!("Capture stream ended unexpectedly");
                    if let Some(session) = self.session.as_mut() {
                        session.end_stream();
                    }
                }
                Wake::Redraw => self.redraw_meter(),
                Wake::Deadline => {
                    self.auto_stop().await;
                    break;
                }
                Wake::Uploaded(done) => self.on_upload_settled(done),
            }
        }

        self.settle_uploads().await;
        if let Some(buffer) = self.close_session().await {
            debug!("Discarding {} unsubmitted samples", buffer.len());
        }

        let stats = self.stats();
        info!(
            "Recorder finished: {} uploaded, {} failed, {} dropped",
            stats.chunks_uploaded, stats.uploads_failed, stats.chunks_dropped
        );
        stats
    }

    fn deadline_reached(&self) -> bool {
        self.deadline
            .is_some_and(|deadline| Instant::now() >= deadline)
    }

    async fn auto_stop(&mut self) {
        info!("Maximum recording duration reached, stopping");
        if let Err(e) = self.stop().await {
            error!("Failed to stop recording: {}", e);
        }
    }

    async fn open_session(&mut self) -> RecorderResult<()> {
        let frames = self.backend.start().await?;

        self.session = Some(RecordingSession::new(
            frames,
            self.config.sample_rate,
            self.config.channels,
        ));

        self.meter.shutdown();
        let mut redraw = time::interval(self.config.meter_refresh);
        redraw.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.redraw = Some(redraw);

        Ok(())
    }

    /// Stop capture and the meter, returning what was buffered
    async fn close_session(&mut self) -> Option<ChunkBuffer> {
        let mut session = self.session.take()?;

        if let Err(e) = self.backend.stop().await {
            warn!("Failed to stop {}: {}", self.backend.name(), e);
        }
        session.drain();

        self.meter.shutdown();
        self.redraw = None;

        Some(session.into_buffer())
    }

    fn flush(&mut self, buffer: ChunkBuffer) -> RecorderResult<AudioChunk> {
        let index = self.chunk_index;
        self.chunk_index += 1;

        let chunk = buffer.flush(index, &mut self.namer, Utc::now())?;
        info!(
            "Chunk {} complete: {} ({:.1}s, {} samples)",
            chunk.index,
            chunk.name,
            chunk.duration_secs(),
            chunk.sample_count
        );
        Ok(chunk)
    }

    fn on_frame(&mut self, frame: AudioFrame) {
        let recording = self.state == UiState::Recording;
        if let Some(session) = self.session.as_mut() {
            if recording {
                session.push(&frame);
            }
            self.meter.process(frame.normalized(), Instant::now().into_std());
        }
    }

    fn redraw_meter(&mut self) {
        let recording = self.state == UiState::Recording;
        let reading = self.meter.reading(recording, Instant::now().into_std());
        self.view.draw_meter(reading);
    }

    fn on_upload_settled(&mut self, done: Result<UploadResult, JoinError>) {
        match done {
            Ok((name, result)) => self.record_upload(&name, &result),
            Err(e) => {
                error!("Upload task failed: {}", e);
                self.uploads_failed += 1;
            }
        }
    }

    fn record_upload(&mut self, name: &str, result: &RecorderResult<UploadReceipt>) {
        match result {
            Ok(receipt) => {
                debug!("Chunk {} accepted ({})", name, receipt.status);
                self.chunks_uploaded += 1;
            }
            Err(e) => {
                warn!("Chunk {} not submitted: {}", name, e);
                self.uploads_failed += 1;
            }
        }
    }

    async fn settle_uploads(&mut self) {
        while let Some(done) = self.uploads.join_next().await {
            self.on_upload_settled(done);
        }
    }

    fn set_state(&mut self, state: UiState) {
        if self.state != state {
            debug!("Recorder state {:?} -> {:?}", self.state, state);
            self.state = state;
            self.render_control();
        }
    }

    fn render_control(&mut self) {
        let control = self.state.control();
        self.view.render_control(&control);
    }

    fn recording_status(&self) -> String {
        let mut status =
            "Now recording. Press the \"Stop\" button below to stop recording.".to_string();
        if let Some(max) = self.config.max_duration {
            status.push_str(&format!(
                " The recording will stop automatically after {} seconds.",
                max.as_secs()
            ));
        }
        status
    }
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn next_frame(session: &mut Option<RecordingSession>) -> Option<AudioFrame> {
    match session {
        Some(session) => session.next_frame().await,
        None => std::future::pending().await,
    }
}

async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
