//! Session controller.
//!
//! Owns the session state machine and hands it, by reference, to the
//! acquisition and presentation helpers. Long-running work (upload, preview
//! decode, health check) runs on worker threads that report back over one
//! channel; the controller applies those reports from the caller's thread, so
//! state is only ever touched by one thread.
//!
//! At most one upload is outstanding per generation. `stage` and `reset`
//! advance the generation, and a response for an older generation is
//! discarded when it arrives.

use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use crate::config::ClientConfig;
use crate::detect::{DetectionResult, DetectionService, HealthReport, UploadRequest};
use crate::error::{ServiceError, ValidationError};
use crate::export::{self, FullscreenView};
use crate::health::ModelStatus;
use crate::input::{self, FileCandidate, Preview, StagedFile};
use crate::notify::{Level, Notification, Notifier, DEFAULT_NOTIFICATION_DURATION};
use crate::present::ResultView;
use crate::session::{Completion, Generation, Phase, ProcessingSettings, Session};
use crate::ui::{ProcessingIndicator, Ui};

/// Report from a worker thread.
#[derive(Debug)]
pub enum WorkerEvent {
    Response {
        generation: Generation,
        outcome: Result<DetectionResult, ServiceError>,
    },
    Preview {
        generation: Generation,
        outcome: Result<Preview, String>,
    },
    Health {
        outcome: Result<HealthReport, ServiceError>,
    },
}

#[derive(Clone, Debug)]
pub struct ControllerOptions {
    pub settings: ProcessingSettings,
    pub download_dir: PathBuf,
    pub notification_duration: Duration,
    /// Decode a thumbnail after each successful staging.
    pub previews: bool,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            settings: ProcessingSettings::default(),
            download_dir: PathBuf::from("."),
            notification_duration: DEFAULT_NOTIFICATION_DURATION,
            previews: true,
        }
    }
}

impl ControllerOptions {
    pub fn from_config(cfg: &ClientConfig) -> Self {
        Self {
            settings: ProcessingSettings::new(cfg.confidence).unwrap_or_default(),
            download_dir: cfg.download_dir.clone(),
            notification_duration: cfg.notification_duration,
            previews: true,
        }
    }
}

pub struct Controller {
    session: Session,
    settings: ProcessingSettings,
    service: Arc<dyn DetectionService>,
    notifier: Box<dyn Notifier>,
    ui: Ui,
    options: ControllerOptions,
    events_tx: Sender<WorkerEvent>,
    events_rx: Receiver<WorkerEvent>,
    /// Uploads whose worker has not reported yet, stale ones included.
    in_flight: usize,
    indicator: Option<ProcessingIndicator>,
    preview: Option<Preview>,
    fullscreen: Option<FullscreenView>,
    model_status: ModelStatus,
    health_pending: bool,
}

impl Controller {
    pub fn new(
        service: Arc<dyn DetectionService>,
        notifier: Box<dyn Notifier>,
        ui: Ui,
        options: ControllerOptions,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel();
        Self {
            session: Session::new(),
            settings: options.settings,
            service,
            notifier,
            ui,
            options,
            events_tx,
            events_rx,
            in_flight: 0,
            indicator: None,
            preview: None,
            fullscreen: None,
            model_status: ModelStatus::Unknown,
            health_pending: false,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn phase(&self) -> Phase {
        self.session.phase()
    }

    pub fn settings(&self) -> ProcessingSettings {
        self.settings
    }

    pub fn result(&self) -> Option<&DetectionResult> {
        self.session.result()
    }

    pub fn preview(&self) -> Option<&Preview> {
        self.preview.as_ref()
    }

    pub fn fullscreen(&self) -> Option<&FullscreenView> {
        self.fullscreen.as_ref()
    }

    pub fn model_status(&self) -> ModelStatus {
        self.model_status
    }

    /// A health check has been started and has not reported yet.
    pub fn health_pending(&self) -> bool {
        self.health_pending
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Project the stored result for display.
    pub fn result_view(&self) -> Option<ResultView> {
        self.session.result().map(ResultView::new)
    }

    fn notify(&self, level: Level, message: impl Into<String>) {
        self.notifier.notify(Notification {
            level,
            message: message.into(),
            duration: self.options.notification_duration,
        });
    }

    /// Change the threshold for the next upload. Out-of-range values are
    /// refused with a warning.
    pub fn set_confidence(&mut self, value: f64) -> bool {
        if self.settings.set_confidence_threshold(value) {
            log::debug!("confidence threshold set to {}", value);
            true
        } else {
            self.notify(Level::Warning, "Confidence must be between 0 and 1");
            false
        }
    }

    /// Restore the default threshold. `reset` never does this.
    pub fn reset_settings(&mut self) {
        self.settings = ProcessingSettings::default();
    }

    /// Stage a local file.
    pub fn stage_path(&mut self, path: &Path) -> Result<StagedFile, ValidationError> {
        match FileCandidate::from_path(path) {
            Ok(candidate) => self.stage(candidate),
            Err(err) => {
                log::warn!("staging rejected: {}", err);
                self.notify(Level::Error, err.user_message());
                Err(err)
            }
        }
    }

    /// Validate and stage a candidate, replacing anything staged before.
    ///
    /// On failure the session is left untouched.
    pub fn stage(&mut self, candidate: FileCandidate) -> Result<StagedFile, ValidationError> {
        let staged = match input::validate_candidate(candidate) {
            Ok(staged) => staged,
            Err(err) => {
                log::warn!("staging rejected: {}", err);
                self.notify(Level::Error, err.user_message());
                return Err(err);
            }
        };

        if self.session.is_processing() {
            log::info!("new file staged while a request is outstanding; its response will be discarded");
        }
        let generation = self.session.stage(staged.clone());
        self.indicator = None;
        self.preview = None;
        self.fullscreen = None;
        log::debug!(
            "staged {} ({} bytes, {}) as {}",
            staged.name(),
            staged.byte_size(),
            staged.mime_type(),
            generation
        );
        if self.options.previews {
            self.spawn_preview(generation, &staged);
        }
        self.notify(
            Level::Success,
            "Image loaded successfully! Adjust confidence and click Process Image.",
        );
        Ok(staged)
    }

    fn spawn_preview(&self, generation: Generation, staged: &StagedFile) {
        let bytes = staged.shared_bytes();
        let tx = self.events_tx.clone();
        let spawned = std::thread::Builder::new()
            .name("preview".to_string())
            .spawn(move || {
                let outcome = input::generate_preview(&bytes).map_err(|e| e.to_string());
                let _ = tx.send(WorkerEvent::Preview {
                    generation,
                    outcome,
                });
            });
        if let Err(err) = spawned {
            log::warn!("preview worker not started: {}", err);
        }
    }

    /// Upload the staged file.
    ///
    /// A no-op returning `None` unless the session is `Staged`; in particular
    /// a second call while a request is outstanding issues nothing.
    pub fn process(&mut self) -> Option<Generation> {
        let (generation, file) = self.session.begin_processing()?;
        let confidence = self.settings.confidence_threshold();
        log::info!(
            "processing {} at confidence {} ({})",
            file.name(),
            confidence,
            generation
        );
        self.fullscreen = None;
        self.indicator = Some(self.ui.processing("Processing image"));

        let service = Arc::clone(&self.service);
        let tx = self.events_tx.clone();
        let spawned = std::thread::Builder::new()
            .name("upload".to_string())
            .spawn(move || {
                let request = UploadRequest {
                    file_name: file.name(),
                    mime_type: file.mime_type(),
                    bytes: file.bytes(),
                    confidence,
                };
                let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| service.upload(&request)))
                    .unwrap_or_else(|_| {
                        Err(ServiceError::Unexpected("detection worker panicked".to_string()))
                    });
                let _ = tx.send(WorkerEvent::Response {
                    generation,
                    outcome,
                });
            });

        match spawned {
            Ok(_) => {
                self.in_flight += 1;
                Some(generation)
            }
            Err(err) => {
                self.in_flight += 1;
                self.apply(WorkerEvent::Response {
                    generation,
                    outcome: Err(ServiceError::Unexpected(format!(
                        "upload worker not started: {}",
                        err
                    ))),
                });
                None
            }
        }
    }

    /// Apply every report that has already arrived.
    pub fn drain_events(&mut self) {
        while let Ok(event) = self.events_rx.try_recv() {
            self.apply(event);
        }
    }

    /// Block until the next report arrives and apply it.
    ///
    /// Returns false when nothing arrived within `timeout`.
    pub fn wait_event(&mut self, timeout: Duration) -> bool {
        match self.events_rx.recv_timeout(timeout) {
            Ok(event) => {
                self.apply(event);
                true
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }

    /// Apply reports until no upload is outstanding.
    ///
    /// With a `timeout`, gives up after that long and returns false.
    pub fn wait_idle(&mut self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);
        while self.in_flight > 0 {
            let event = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    match self.events_rx.recv_timeout(remaining) {
                        Ok(event) => event,
                        Err(_) => return false,
                    }
                }
                None => match self.events_rx.recv() {
                    Ok(event) => event,
                    Err(_) => return false,
                },
            };
            self.apply(event);
        }
        true
    }

    fn apply(&mut self, event: WorkerEvent) {
        match event {
            WorkerEvent::Response {
                generation,
                outcome,
            } => {
                self.in_flight = self.in_flight.saturating_sub(1);
                self.apply_response(generation, outcome);
            }
            WorkerEvent::Preview {
                generation,
                outcome,
            } => {
                if generation != self.session.generation() {
                    log::debug!("discarding preview for {}", generation);
                    return;
                }
                match outcome {
                    Ok(preview) => {
                        log::debug!("preview ready: {}x{}", preview.width, preview.height);
                        self.preview = Some(preview);
                    }
                    Err(err) => log::warn!("preview unavailable: {}", err),
                }
            }
            WorkerEvent::Health { outcome } => {
                self.health_pending = false;
                if let Err(err) = &outcome {
                    log::warn!("health check failed: {}", err);
                }
                self.model_status = ModelStatus::from_check(&outcome);
                log::debug!("model status: {}", self.model_status);
            }
        }
    }

    fn apply_response(
        &mut self,
        generation: Generation,
        outcome: Result<DetectionResult, ServiceError>,
    ) {
        match outcome {
            Ok(result) => {
                let total = result.stats.total_detections;
                match self.session.complete::<ServiceError>(generation, Ok(result)) {
                    Completion::Applied => {
                        self.finish_indicator();
                        log::info!("request {} returned {} detections", generation, total);
                        self.notify(
                            Level::Success,
                            format!("Successfully detected {} objects!", total),
                        );
                    }
                    Completion::Reverted | Completion::Stale => {
                        log::warn!("discarding stale response for request {}", generation);
                    }
                }
            }
            Err(err) => {
                let message = err.user_message();
                match self.session.complete(generation, Err(&err)) {
                    Completion::Reverted => {
                        self.finish_indicator();
                        log::error!("request {} failed: {}", generation, err);
                        self.notify(Level::Error, message);
                    }
                    Completion::Applied | Completion::Stale => {
                        log::warn!(
                            "discarding stale failure for request {}: {}",
                            generation,
                            err
                        );
                    }
                }
            }
        }
    }

    fn finish_indicator(&mut self) {
        if let Some(indicator) = self.indicator.take() {
            indicator.finish();
        }
    }

    /// Return to `Empty`. Settings are kept; an outstanding response will be
    /// discarded on arrival.
    pub fn reset(&mut self) {
        if self.session.is_processing() {
            log::info!("reset while a request is outstanding; its response will be discarded");
        }
        self.session.reset();
        self.indicator = None;
        self.preview = None;
        self.fullscreen = None;
        self.notify(Level::Success, "Ready for new image analysis!");
    }

    /// Write the annotated image into the download directory.
    ///
    /// Without a stored image this warns and writes nothing.
    pub fn download(&mut self) -> Option<PathBuf> {
        let Some(image) = self
            .session
            .result()
            .and_then(|result| result.annotated_image.as_ref())
        else {
            self.notify(Level::Warning, "No results to download");
            return None;
        };
        match export::save_annotated_image(image, &self.options.download_dir, SystemTime::now()) {
            Ok(path) => {
                log::info!("result image written to {}", path.display());
                self.notify(Level::Success, "Result image downloaded successfully!");
                Some(path)
            }
            Err(err) => {
                log::error!("download failed: {}", err);
                self.notify(Level::Error, "Failed to download image");
                None
            }
        }
    }

    /// Prepare the annotated image for full-screen display in `dir`.
    ///
    /// A silent no-op without a stored image.
    pub fn open_fullscreen(&mut self, dir: &Path) -> Option<&FullscreenView> {
        let image = self
            .session
            .result()
            .and_then(|result| result.annotated_image.as_ref())?;
        match export::prepare_fullscreen(image, dir) {
            Ok(view) => {
                self.fullscreen = Some(view);
                self.fullscreen.as_ref()
            }
            Err(err) => {
                log::error!("fullscreen view failed: {}", err);
                self.notify(Level::Error, "Failed to open image");
                None
            }
        }
    }

    pub fn close_fullscreen(&mut self) -> bool {
        self.fullscreen.take().is_some()
    }

    /// Start a health check in the background.
    ///
    /// The status indicator changes when the report is applied. Returns
    /// false when a check is already outstanding.
    pub fn spawn_health(&mut self) -> bool {
        if self.health_pending {
            return false;
        }
        let service = Arc::clone(&self.service);
        let tx = self.events_tx.clone();
        let spawned = std::thread::Builder::new()
            .name("health".to_string())
            .spawn(move || {
                let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| service.health()))
                    .unwrap_or_else(|_| {
                        Err(ServiceError::Unexpected("health worker panicked".to_string()))
                    });
                let _ = tx.send(WorkerEvent::Health { outcome });
            });
        match spawned {
            Ok(_) => {
                self.health_pending = true;
                true
            }
            Err(err) => {
                log::warn!("health worker not started: {}", err);
                self.model_status = ModelStatus::ConnectionError;
                false
            }
        }
    }
}
