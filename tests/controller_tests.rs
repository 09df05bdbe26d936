// Integration tests for the recorder controller
//
// The microphone, endpoint, view and navigator are replaced by in-memory
// doubles. Timed scenarios run on tokio's paused clock.

use speak_recorder::audio::meter::{IDLE_COLOR, RECORDING_COLOR};
use speak_recorder::audio::{AudioBackend, AudioChunk, AudioFile, AudioFrame, MeterReading};
use speak_recorder::{
    ControlEvent, ControlState, ControlStyle, Navigator, RecorderConfig, RecorderController,
    RecorderError, RecorderResult, RecorderView, RedirectPolicy, UiState, UploadReceipt, Uploader,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

const NEXT_URL: &str = "https://example.com/next";

// ============================================================================
// Test doubles
// ============================================================================

#[derive(Debug, Default)]
struct BackendLog {
    starts: usize,
    stops: usize,
    active: usize,
    max_active: usize,
}

struct MockBackend {
    log: Arc<Mutex<BackendLog>>,
    deny_permission: bool,
    /// Fail every start after this many successful ones
    fail_after: Option<usize>,
    frames: Option<mpsc::Sender<AudioFrame>>,
}

#[async_trait::async_trait]
impl AudioBackend for MockBackend {
    async fn start(&mut self) -> RecorderResult<mpsc::Receiver<AudioFrame>> {
        if self.deny_permission {
            return Err(RecorderError::PermissionDenied("user dismissed prompt".to_string()));
        }
        if self.frames.is_some() {
            return Err(RecorderError::CaptureUnavailable("Already capturing".to_string()));
        }

        let mut log = self.log.lock().unwrap();
        if let Some(limit) = self.fail_after {
            if log.starts >= limit {
                return Err(RecorderError::CaptureUnavailable("device unplugged".to_string()));
            }
        }
        log.starts += 1;
        log.active += 1;
        log.max_active = log.max_active.max(log.active);

        let (tx, rx) = mpsc::channel(16);
        // 100ms of 16kHz mono at a quarter of full scale
        tx.try_send(AudioFrame {
            samples: vec![8192i16; 1600],
            sample_rate: 16000,
            channels: 1,
            timestamp_ms: 0,
        })
        .unwrap();
        self.frames = Some(tx);

        Ok(rx)
    }

    async fn stop(&mut self) -> RecorderResult<()> {
        if self.frames.take().is_some() {
            let mut log = self.log.lock().unwrap();
            log.active -= 1;
            log.stops += 1;
        }
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.frames.is_some()
    }

    fn name(&self) -> &str {
        "mock"
    }
}

struct MockUploader {
    uploads: Arc<Mutex<Vec<AudioChunk>>>,
    fail: bool,
}

#[async_trait::async_trait]
impl Uploader for MockUploader {
    async fn upload(&self, chunk: &AudioChunk) -> RecorderResult<UploadReceipt> {
        self.uploads.lock().unwrap().push(chunk.clone());
        if self.fail {
            return Err(RecorderError::UploadFailure("503 Service Unavailable".to_string()));
        }
        Ok(UploadReceipt {
            name: chunk.name.clone(),
            status: 202,
        })
    }
}

#[derive(Debug, Default)]
struct ViewLog {
    controls: Vec<ControlState>,
    statuses: Vec<String>,
    configuration_hidden: bool,
    meter_draws: usize,
    last_reading: Option<MeterReading>,
}

struct MockView {
    log: Arc<Mutex<ViewLog>>,
}

impl RecorderView for MockView {
    fn render_control(&mut self, control: &ControlState) {
        self.log.lock().unwrap().controls.push(control.clone());
    }

    fn set_status(&mut self, message: &str) {
        self.log.lock().unwrap().statuses.push(message.to_string());
    }

    fn hide_configuration(&mut self) {
        self.log.lock().unwrap().configuration_hidden = true;
    }

    fn draw_meter(&mut self, reading: MeterReading) {
        let mut log = self.log.lock().unwrap();
        log.meter_draws += 1;
        log.last_reading = Some(reading);
    }
}

struct MockNavigator {
    redirects: Arc<Mutex<Vec<String>>>,
}

impl Navigator for MockNavigator {
    fn redirect(&mut self, url: &str) {
        self.redirects.lock().unwrap().push(url.to_string());
    }
}

/// Shared handles onto everything the controller touched
#[derive(Default)]
struct Harness {
    backend: Arc<Mutex<BackendLog>>,
    uploads: Arc<Mutex<Vec<AudioChunk>>>,
    view: Arc<Mutex<ViewLog>>,
    redirects: Arc<Mutex<Vec<String>>>,
    deny_permission: bool,
    fail_after: Option<usize>,
    fail_uploads: bool,
}

impl Harness {
    fn controller(&self, config: RecorderConfig) -> RecorderController {
        RecorderController::new(
            config,
            Box::new(MockBackend {
                log: Arc::clone(&self.backend),
                deny_permission: self.deny_permission,
                fail_after: self.fail_after,
                frames: None,
            }),
            Arc::new(MockUploader {
                uploads: Arc::clone(&self.uploads),
                fail: self.fail_uploads,
            }),
            Box::new(MockView {
                log: Arc::clone(&self.view),
            }),
            Box::new(MockNavigator {
                redirects: Arc::clone(&self.redirects),
            }),
        )
    }

    fn upload_count(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }

    fn upload_names(&self) -> Vec<String> {
        self.uploads
            .lock()
            .unwrap()
            .iter()
            .map(|chunk| chunk.name.clone())
            .collect()
    }

    fn redirects(&self) -> Vec<String> {
        self.redirects.lock().unwrap().clone()
    }

    fn stop_controls_rendered(&self) -> usize {
        self.view
            .lock()
            .unwrap()
            .controls
            .iter()
            .filter(|c| c.style == ControlStyle::Stop)
            .count()
    }
}

fn config() -> RecorderConfig {
    RecorderConfig {
        session_id: "test-session".to_string(),
        ..RecorderConfig::new(NEXT_URL)
    }
}

// ============================================================================
// Timed scenarios
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_two_rotations_then_stop_uploads_three_and_redirects_once() {
    let harness = Harness::default();
    let controller = harness.controller(config());

    let (tx, rx) = mpsc::channel(4);
    let task = tokio::spawn(controller.run(rx));

    tx.send(ControlEvent::Activate).await.unwrap();
    tokio::time::sleep(Duration::from_secs(25)).await;

    assert_eq!(harness.upload_count(), 2, "Two rotations by 25s");
    assert!(harness.redirects().is_empty());

    tx.send(ControlEvent::Activate).await.unwrap();
    let stats = task.await.unwrap();

    assert_eq!(harness.upload_count(), 3, "Two rotation uploads plus the final one");
    assert_eq!(harness.redirects(), vec![NEXT_URL.to_string()]);
    assert_eq!(stats.chunks_uploaded, 3);
    assert_eq!(stats.uploads_failed, 0);
    assert_eq!(stats.state, UiState::Idle);
    assert_eq!(stats.redirected_to.as_deref(), Some(NEXT_URL));
    assert!((stats.duration_secs - 25.0).abs() < 0.5);

    let backend = harness.backend.lock().unwrap();
    assert_eq!(backend.starts, 3, "Initial capture plus one per rotation");
    assert_eq!(backend.stops, 3);
    assert_eq!(backend.max_active, 1, "Captures must never overlap");
    assert_eq!(backend.active, 0);

    let names: HashSet<String> = harness.upload_names().into_iter().collect();
    assert_eq!(names.len(), 3, "Chunk names must be unique");
}

#[tokio::test(start_paused = true)]
async fn test_each_rotation_period_uploads_exactly_one_chunk() {
    let harness = Harness::default();
    let controller = harness.controller(config());

    let (tx, rx) = mpsc::channel(4);
    let task = tokio::spawn(controller.run(rx));

    tx.send(ControlEvent::Activate).await.unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;

    for expected in 1..=4 {
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(harness.upload_count(), expected);
    }

    drop(tx);
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_auto_stop_at_max_duration() {
    let harness = Harness::default();
    let controller = harness.controller(RecorderConfig {
        max_duration: Some(Duration::from_secs(45)),
        ..config()
    });

    let (tx, rx) = mpsc::channel(4);
    let task = tokio::spawn(controller.run(rx));
    tx.send(ControlEvent::Activate).await.unwrap();

    let stats = task.await.unwrap();

    // Rotations at 10/20/30/40s, final chunk at 45s
    assert_eq!(harness.upload_count(), 5);
    assert_eq!(harness.redirects().len(), 1);
    assert!((stats.duration_secs - 45.0).abs() < 0.5);

    let statuses = harness.view.lock().unwrap().statuses.clone();
    assert!(statuses
        .iter()
        .any(|s| s.contains("stop automatically after 45 seconds")));
}

#[tokio::test(start_paused = true)]
async fn test_auto_stop_on_rotation_boundary_uploads_once_per_period() {
    // Deadline and third rotation fall on the same instant; repeat so a
    // racing select would show up
    for _ in 0..20 {
        let harness = Harness::default();
        let controller = harness.controller(RecorderConfig {
            max_duration: Some(Duration::from_secs(30)),
            ..config()
        });

        let (tx, rx) = mpsc::channel(4);
        let task = tokio::spawn(controller.run(rx));
        tx.send(ControlEvent::Activate).await.unwrap();

        let stats = task.await.unwrap();

        // Rotations at 10/20s, final chunk at 30s
        assert_eq!(harness.upload_count(), 3);
        assert_eq!(stats.chunks_uploaded, 3);
        assert_eq!(harness.redirects().len(), 1);

        let backend = harness.backend.lock().unwrap();
        assert_eq!(backend.starts, 3, "No capture reopened at the deadline");
        assert_eq!(backend.active, 0);

        let uploads = harness.uploads.lock().unwrap();
        let last = uploads.last().expect("final chunk uploaded");
        assert_eq!(
            AudioFile::from_bytes(&last.bytes).unwrap().sample_count,
            1600,
            "Final chunk carries the last period's audio"
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_zero_periods_fall_back_to_defaults() {
    let harness = Harness::default();
    let controller = harness.controller(RecorderConfig {
        chunk_duration: Duration::ZERO,
        meter_refresh: Duration::ZERO,
        ..config()
    });

    let (tx, rx) = mpsc::channel(4);
    let task = tokio::spawn(controller.run(rx));

    tx.send(ControlEvent::Activate).await.unwrap();
    tokio::time::sleep(Duration::from_secs(15)).await;

    assert_eq!(harness.upload_count(), 1, "Rotated at the default 10s");
    assert!(harness.view.lock().unwrap().meter_draws > 0);

    drop(tx);
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_idle_preview_shows_idle_meter_without_uploading() {
    let harness = Harness::default();
    let mut controller = harness.controller(config());
    controller.preview().await.unwrap();

    let (tx, rx) = mpsc::channel(4);
    let task = tokio::spawn(controller.run(rx));
    tokio::time::sleep(Duration::from_secs(1)).await;

    {
        let view = harness.view.lock().unwrap();
        let reading = view.last_reading.expect("meter drawn while idle");
        assert!(!reading.recording);
        assert!(reading.volume > 0.0);
        assert_eq!(reading.color(), IDLE_COLOR);
    }
    assert_eq!(harness.upload_count(), 0);

    tx.send(ControlEvent::Activate).await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(
        harness.view.lock().unwrap().last_reading.unwrap().color(),
        RECORDING_COLOR
    );

    tx.send(ControlEvent::Activate).await.unwrap();
    task.await.unwrap();

    // Only the frame captured after pressing record is submitted
    let uploads = harness.uploads.lock().unwrap();
    assert_eq!(uploads.len(), 1);
    assert_eq!(AudioFile::from_bytes(&uploads[0].bytes).unwrap().sample_count, 1600);

    let backend = harness.backend.lock().unwrap();
    assert_eq!(backend.starts, 2, "Preview capture plus the recording capture");
    assert_eq!(backend.max_active, 1);
    assert_eq!(backend.active, 0);
}

#[tokio::test(start_paused = true)]
async fn test_meter_is_redrawn_while_recording() {
    let harness = Harness::default();
    let controller = harness.controller(config());

    let (tx, rx) = mpsc::channel(4);
    let task = tokio::spawn(controller.run(rx));

    tx.send(ControlEvent::Activate).await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    {
        let view = harness.view.lock().unwrap();
        assert!(view.meter_draws > 10, "Meter should redraw continuously");
        let reading = view.last_reading.expect("meter drawn");
        assert!(reading.recording);
        assert!(reading.volume > 0.0);
    }

    tx.send(ControlEvent::Activate).await.unwrap();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_permission_denied_never_records_or_uploads() {
    let harness = Harness {
        deny_permission: true,
        ..Harness::default()
    };
    let controller = harness.controller(config());

    let (tx, rx) = mpsc::channel(4);
    let task = tokio::spawn(controller.run(rx));

    tx.send(ControlEvent::Activate).await.unwrap();
    tokio::time::sleep(Duration::from_secs(30)).await;
    drop(tx);

    let stats = task.await.unwrap();

    assert_eq!(stats.state, UiState::Idle);
    assert_eq!(harness.upload_count(), 0);
    assert!(harness.redirects().is_empty());
    assert_eq!(harness.stop_controls_rendered(), 0, "Recording was never reached");

    let view = harness.view.lock().unwrap();
    assert!(!view.configuration_hidden);
    assert!(view.statuses.iter().any(|s| s.contains("microphone")));
}

// ============================================================================
// Direct operations
// ============================================================================

#[tokio::test]
async fn test_activation_enters_recording_once() {
    let harness = Harness::default();
    let mut controller = harness.controller(config());

    assert_eq!(controller.state(), UiState::Idle);
    controller.activate().await.unwrap();

    assert_eq!(controller.state(), UiState::Recording);
    assert_eq!(harness.stop_controls_rendered(), 1);
    assert!(harness.view.lock().unwrap().configuration_hidden);

    // start() while recording is a no-op
    controller.start().await.unwrap();
    assert_eq!(harness.backend.lock().unwrap().starts, 1);
    assert_eq!(harness.stop_controls_rendered(), 1);
}

#[tokio::test]
async fn test_permission_denied_is_reported() {
    let harness = Harness {
        deny_permission: true,
        ..Harness::default()
    };
    let mut controller = harness.controller(config());

    let result = controller.activate().await;

    assert!(matches!(result, Err(RecorderError::PermissionDenied(_))));
    assert_eq!(controller.state(), UiState::Idle);
}

#[tokio::test]
async fn test_stop_submits_buffered_audio() {
    let harness = Harness::default();
    let mut controller = harness.controller(config());

    controller.start().await.unwrap();
    let outcome = controller.stop().await.unwrap();

    assert!(outcome.upload_succeeded);
    assert!(outcome.redirected);

    let uploads = harness.uploads.lock().unwrap();
    assert_eq!(uploads.len(), 1);
    assert_eq!(Some(&uploads[0].name), outcome.final_chunk.as_ref());
    assert!(uploads[0].name.ends_with(".opus"));

    // The frame delivered before stop is in the chunk
    let audio = AudioFile::from_bytes(&uploads[0].bytes).unwrap();
    assert_eq!(audio.sample_count, 1600);
}

#[tokio::test]
async fn test_stop_shows_submitting_state() {
    let harness = Harness::default();
    let mut controller = harness.controller(config());

    controller.start().await.unwrap();
    controller.stop().await.unwrap();

    let view = harness.view.lock().unwrap();
    let submitting = view
        .controls
        .iter()
        .find(|c| c.label == "Submitting...")
        .expect("submitting control rendered");
    assert!(!submitting.enabled);
    assert_eq!(submitting.style.class_name(), "button disabledButton");
    assert!(view.statuses.iter().any(|s| s.starts_with("Now submitting")));
}

#[tokio::test]
async fn test_no_rotation_after_stop() {
    let harness = Harness::default();
    let mut controller = harness.controller(config());

    controller.start().await.unwrap();
    controller.stop().await.unwrap();

    let rotated = controller.rotate_chunk().await.unwrap();

    assert_eq!(rotated, None);
    assert_eq!(harness.upload_count(), 1);
    assert_eq!(harness.backend.lock().unwrap().starts, 1);
}

#[tokio::test]
async fn test_failed_upload_still_redirects_by_default() {
    let harness = Harness {
        fail_uploads: true,
        ..Harness::default()
    };
    let mut controller = harness.controller(config());

    controller.start().await.unwrap();
    let outcome = controller.stop().await.unwrap();

    assert!(!outcome.upload_succeeded);
    assert!(outcome.redirected);
    assert_eq!(harness.upload_count(), 1);
    assert_eq!(harness.redirects(), vec![NEXT_URL.to_string()]);

    let stats = controller.stats();
    assert_eq!(stats.uploads_failed, 1);
    assert_eq!(stats.chunks_uploaded, 0);
}

#[tokio::test]
async fn test_failed_upload_disables_control_when_redirect_requires_success() {
    let harness = Harness {
        fail_uploads: true,
        ..Harness::default()
    };
    let mut controller = harness.controller(RecorderConfig {
        redirect_policy: RedirectPolicy::OnSuccess,
        ..config()
    });

    controller.start().await.unwrap();
    let outcome = controller.stop().await.unwrap();

    assert!(!outcome.redirected);
    assert!(harness.redirects().is_empty());
    assert_eq!(controller.state(), UiState::Disabled);

    // Further presses are ignored
    controller.activate().await.unwrap();
    assert_eq!(controller.state(), UiState::Disabled);
    assert_eq!(harness.backend.lock().unwrap().starts, 1);
}

#[tokio::test]
async fn test_rotation_survives_lost_capture() {
    let harness = Harness {
        fail_after: Some(1),
        ..Harness::default()
    };
    let mut controller = harness.controller(config());

    controller.start().await.unwrap();

    // First chunk is queued, but the microphone cannot be reopened
    let result = controller.rotate_chunk().await;
    assert!(matches!(result, Err(RecorderError::CaptureUnavailable(_))));
    assert_eq!(controller.state(), UiState::Recording);

    // Nothing buffered and still no device: no chunk this time
    assert!(controller.rotate_chunk().await.is_err());

    let outcome = controller.stop().await.unwrap();
    assert!(outcome.redirected);
    assert_eq!(harness.upload_count(), 2, "First chunk plus the final one");
    assert_eq!(harness.backend.lock().unwrap().max_active, 1);
}

#[tokio::test]
async fn test_stop_when_idle_does_nothing() {
    let harness = Harness::default();
    let mut controller = harness.controller(config());

    let outcome = controller.stop().await.unwrap();

    assert!(!outcome.redirected);
    assert_eq!(outcome.final_chunk, None);
    assert_eq!(harness.upload_count(), 0);
    assert!(harness.redirects().is_empty());
}
