//! Detection Client
//!
//! Terminal client for a remote image object-detection service. A user
//! stages one image, picks a confidence threshold, uploads it, and inspects
//! the annotated image, per-class counts and per-detection table that come
//! back.
//!
//! # Architecture
//!
//! The client is a single session driven through an explicit state machine:
//!
//! 1. **Empty**: nothing staged.
//! 2. **Staged**: a validated image is waiting to be processed.
//! 3. **Processing**: exactly one request is outstanding.
//! 4. **Result**: the last response is stored and rendered.
//!
//! Requests run on worker threads and are tagged with the session
//! generation; a response that arrives after `stage` or `reset` is dropped.
//!
//! # Module Structure
//!
//! - `input`: file validation, staging and previews
//! - `detect`: the detection service seam (HTTP and in-process stub) and the
//!   result model
//! - `session`: state machine and processing settings
//! - `controller`: wires staging, processing, export and notifications
//! - `present`: pure projections of a result for display
//! - `export`: download and full-screen view of the annotated image
//! - `cli`, `shell`: the `detect` binary

pub mod cli;
pub mod config;
pub mod controller;
pub mod detect;
pub mod error;
pub mod export;
pub mod health;
pub mod input;
pub mod notify;
pub mod present;
pub mod session;
pub mod shell;
pub mod ui;

pub use config::ClientConfig;
pub use controller::{Controller, ControllerOptions, WorkerEvent};
pub use detect::{
    service_for_url, AnnotatedImage, ClassCount, Detection, DetectionResult, DetectionService,
    DetectionStats, HealthReport, HttpService, StubService, UploadRequest,
};
pub use error::{ExportError, ServiceError, ValidationError};
pub use health::ModelStatus;
pub use input::{FileCandidate, StagedFile, MAX_UPLOAD_BYTES};
pub use notify::{ConsoleNotifier, Level, MemoryNotifier, Notification, Notifier};
pub use present::{ConfidenceTier, ResultView};
pub use session::{Generation, Phase, ProcessingSettings, Session, SessionState};
pub use ui::{Ui, UiMode};
