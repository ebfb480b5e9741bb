//! End-to-end session behavior against the in-process stub service.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use detect_client::controller::{Controller, ControllerOptions};
use detect_client::detect::StubService;
use detect_client::input::MAX_UPLOAD_BYTES;
use detect_client::notify::{Level, MemoryNotifier};
use detect_client::present::{class_color, ConfidenceTier};
use detect_client::session::Phase;
use detect_client::ui::Ui;

const WAIT: Option<Duration> = Some(Duration::from_secs(5));

fn controller(
    stub: Arc<StubService>,
    download_dir: &Path,
    previews: bool,
) -> (Controller, MemoryNotifier) {
    let notifier = MemoryNotifier::new();
    let options = ControllerOptions {
        download_dir: download_dir.to_path_buf(),
        previews,
        ..ControllerOptions::default()
    };
    let controller = Controller::new(stub, Box::new(notifier.clone()), Ui::quiet(), options);
    (controller, notifier)
}

fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    image::RgbImage::new(width, height).save(&path).unwrap();
    path
}

fn sparse_file(dir: &Path, name: &str, len: u64) -> PathBuf {
    let path = dir.join(name);
    let file = std::fs::File::create(&path).unwrap();
    file.set_len(len).unwrap();
    path
}

#[test]
fn oversize_file_is_rejected_without_upload() {
    let dir = tempfile::tempdir().unwrap();
    let stub = Arc::new(StubService::new());
    let (mut controller, notifier) = controller(stub.clone(), dir.path(), false);

    let path = sparse_file(dir.path(), "huge.png", MAX_UPLOAD_BYTES + 1);
    assert!(controller.stage_path(&path).is_err());
    assert_eq!(controller.phase(), Phase::Empty);
    assert!(controller.process().is_none());
    assert_eq!(stub.uploads(), 0);

    let last = notifier.last().unwrap();
    assert_eq!(last.level, Level::Error);
    assert_eq!(last.message, "File size must be less than 16MB");
}

#[test]
fn size_limit_is_inclusive() {
    let dir = tempfile::tempdir().unwrap();
    let (mut controller, _) = controller(Arc::new(StubService::new()), dir.path(), false);
    let path = sparse_file(dir.path(), "limit.png", MAX_UPLOAD_BYTES);
    let staged = controller.stage_path(&path).unwrap();
    assert_eq!(staged.byte_size(), MAX_UPLOAD_BYTES);
    assert_eq!(controller.phase(), Phase::Staged);
}

#[test]
fn non_image_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (mut controller, notifier) = controller(Arc::new(StubService::new()), dir.path(), false);
    let path = dir.path().join("notes.txt");
    std::fs::write(&path, "not an image").unwrap();

    assert!(controller.stage_path(&path).is_err());
    assert_eq!(controller.phase(), Phase::Empty);
    assert_eq!(
        notifier.last().unwrap().message,
        "Please select a valid image file"
    );
}

#[test]
fn processed_result_renders_and_exports() {
    let dir = tempfile::tempdir().unwrap();
    let downloads = tempfile::tempdir().unwrap();
    let stub = Arc::new(StubService::new());
    let (mut controller, notifier) = controller(stub.clone(), downloads.path(), false);

    let image = write_png(dir.path(), "corridor.png", 32, 24);
    controller.stage_path(&image).unwrap();
    controller.process().unwrap();
    assert!(controller.wait_idle(WAIT));
    assert_eq!(controller.phase(), Phase::Result);
    assert_eq!(stub.uploads(), 1);

    let view = controller.result_view().unwrap();
    assert_eq!(view.stats.total_detections, 4);
    assert!(view.has_image);
    let tiers: Vec<_> = view.detections.iter().map(|row| row.tier).collect();
    assert_eq!(
        tiers,
        vec![
            ConfidenceTier::High,
            ConfidenceTier::High,
            ConfidenceTier::Medium,
            ConfidenceTier::Low
        ]
    );
    assert_eq!(view.classes[0].class_name, "FireExtinguisher");
    assert_eq!(view.classes[0].count, 2);
    assert_eq!(view.classes[0].color, class_color("FireExtinguisher"));

    let saved = controller.download().unwrap();
    assert!(saved.starts_with(downloads.path()));
    assert!(image::open(&saved).is_ok());
    assert_eq!(
        notifier.last().unwrap().message,
        "Result image downloaded successfully!"
    );

    let fullscreen = controller.open_fullscreen(dir.path()).unwrap();
    assert!(fullscreen.width > 0 && fullscreen.height > 0);
    assert!(controller.close_fullscreen());
    assert!(!controller.close_fullscreen());

    // Export only reads the result.
    assert_eq!(controller.phase(), Phase::Result);
    assert_eq!(controller.result().unwrap().stats.total_detections, 4);
}

#[test]
fn restage_during_processing_discards_old_response() {
    let dir = tempfile::tempdir().unwrap();
    let stub = Arc::new(StubService::new().with_latency(Duration::from_millis(200)));
    let (mut controller, _) = controller(stub.clone(), dir.path(), false);

    let first = write_png(dir.path(), "first.png", 8, 8);
    let second = write_png(dir.path(), "second.png", 8, 8);
    controller.stage_path(&first).unwrap();
    controller.process().unwrap();
    assert_eq!(controller.phase(), Phase::Processing);

    controller.stage_path(&second).unwrap();
    assert_eq!(controller.phase(), Phase::Staged);
    assert!(controller.wait_idle(WAIT));

    assert_eq!(controller.phase(), Phase::Staged);
    assert!(controller.result().is_none());
    assert_eq!(
        controller.session().staged_file().unwrap().name(),
        "second.png"
    );
    assert_eq!(stub.uploads(), 1);
}

#[test]
fn preview_is_decoded_after_staging() {
    let dir = tempfile::tempdir().unwrap();
    let (mut controller, _) = controller(Arc::new(StubService::new()), dir.path(), true);
    let image = write_png(dir.path(), "wide.png", 640, 320);
    controller.stage_path(&image).unwrap();

    assert!(controller.wait_event(Duration::from_secs(5)));
    let preview = controller.preview().unwrap();
    assert_eq!((preview.width, preview.height), (640, 320));
    assert_eq!(preview.thumbnail.width(), 256);

    controller.reset();
    assert!(controller.preview().is_none());
}
