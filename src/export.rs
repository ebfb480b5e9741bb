//! Saving and viewing the annotated image.
//!
//! Both operations only read the stored result.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::detect::AnnotatedImage;
use crate::error::ExportError;

/// Prefix of every downloaded result file.
pub const DOWNLOAD_PREFIX: &str = "yolo_detection_result_";

/// `yolo_detection_result_<epoch millis>.png`
pub fn download_file_name(at: SystemTime) -> String {
    let millis = at
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    format!("{}{}.png", DOWNLOAD_PREFIX, millis)
}

/// Write the decoded image into `dir`; returns the written path.
pub fn save_annotated_image(
    image: &AnnotatedImage,
    dir: &Path,
    at: SystemTime,
) -> Result<PathBuf, ExportError> {
    let bytes = image.decode()?;
    let path = dir.join(download_file_name(at));
    std::fs::write(&path, &bytes).map_err(|source| ExportError::Io {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

/// Image prepared for full-screen display.
#[derive(Clone, Debug)]
pub struct FullscreenView {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
}

/// Decode the image, write it under `dir` and report its dimensions.
pub fn prepare_fullscreen(image: &AnnotatedImage, dir: &Path) -> Result<FullscreenView, ExportError> {
    let bytes = image.decode()?;
    let decoded =
        image::load_from_memory(&bytes).map_err(|e| ExportError::Decode(e.to_string()))?;
    let path = dir.join("detect_client_fullscreen.png");
    std::fs::write(&path, &bytes).map_err(|source| ExportError::Io {
        path: path.clone(),
        source,
    })?;
    Ok(FullscreenView {
        path,
        width: decoded.width(),
        height: decoded.height(),
    })
}

/// Hand a file to the platform image viewer without waiting for it.
pub fn open_in_viewer(path: &Path) -> std::io::Result<()> {
    let mut command = if cfg!(target_os = "macos") {
        Command::new("open")
    } else if cfg!(target_os = "windows") {
        let mut command = Command::new("cmd");
        command.args(["/C", "start", ""]);
        command
    } else {
        Command::new("xdg-open")
    };
    command.arg(path).spawn().map(|_| ())
}
