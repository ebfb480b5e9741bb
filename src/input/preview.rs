use chrono::{DateTime, Local};
use image::{GenericImageView, RgbaImage};
use serde::Serialize;

use super::staging::StagedFile;

/// Longest edge of a generated thumbnail, in pixels.
pub const THUMBNAIL_EDGE: u32 = 256;

/// Decoded thumbnail of a staged image.
#[derive(Clone, Debug)]
pub struct Preview {
    /// Dimensions of the full image.
    pub width: u32,
    pub height: u32,
    pub thumbnail: RgbaImage,
}

pub fn generate_preview(bytes: &[u8]) -> Result<Preview, image::ImageError> {
    let image = image::load_from_memory(bytes)?;
    let (width, height) = image.dimensions();
    let thumbnail = image.thumbnail(THUMBNAIL_EDGE, THUMBNAIL_EDGE).to_rgba8();
    Ok(Preview {
        width,
        height,
        thumbnail,
    })
}

/// Summary shown next to the preview.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ImageInfo {
    pub file: String,
    /// Megabytes with two decimals, e.g. `1.50 MB`.
    pub size: String,
    pub media_type: String,
    /// Local date, `M/D/YYYY`; empty when the platform reports none.
    pub modified: String,
}

pub fn image_info(file: &StagedFile) -> ImageInfo {
    let megabytes = file.byte_size() as f64 / (1024.0 * 1024.0);
    let modified = file
        .last_modified()
        .map(|time| DateTime::<Local>::from(time).format("%-m/%-d/%Y").to_string())
        .unwrap_or_default();
    ImageInfo {
        file: file.name().to_string(),
        size: format!("{:.2} MB", megabytes),
        media_type: file.mime_type().to_string(),
        modified,
    }
}

/// Human-readable size: `0 Bytes`, `512 Bytes`, `1.5 KB`, `2 MB`.
///
/// Trailing zeros after rounding are dropped.
pub fn format_bytes(bytes: u64, decimals: usize) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let k = 1024f64;
    let exponent = ((bytes as f64).ln() / k.ln()).floor() as usize;
    let exponent = exponent.min(UNITS.len() - 1);
    let value = bytes as f64 / k.powi(exponent as i32);
    let mut text = format!("{:.*}", decimals, value);
    if text.contains('.') {
        let trimmed = text.trim_end_matches('0').trim_end_matches('.').len();
        text.truncate(trimmed);
    }
    format!("{} {}", text, UNITS[exponent])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{validate_candidate, FileCandidate};
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        RgbImage::from_pixel(width, height, Rgb([10, 20, 30]))
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn thumbnail_fits_edge_and_keeps_dimensions() {
        let preview = generate_preview(&png(640, 320)).unwrap();
        assert_eq!((preview.width, preview.height), (640, 320));
        assert_eq!(preview.thumbnail.width(), THUMBNAIL_EDGE);
        assert_eq!(preview.thumbnail.height(), THUMBNAIL_EDGE / 2);
    }

    #[test]
    fn undecodable_bytes_fail() {
        assert!(generate_preview(b"definitely not an image").is_err());
    }

    #[test]
    fn format_bytes_trims_zeros() {
        assert_eq!(format_bytes(0, 2), "0 Bytes");
        assert_eq!(format_bytes(512, 2), "512 Bytes");
        assert_eq!(format_bytes(1536, 2), "1.5 KB");
        assert_eq!(format_bytes(2 * 1024 * 1024, 2), "2 MB");
        assert_eq!(format_bytes(1_234_567, 1), "1.2 MB");
        assert_eq!(format_bytes(5 * 1024 * 1024 * 1024 * 1024, 2), "5120 GB");
    }

    #[test]
    fn image_info_reports_megabytes() {
        let staged =
            validate_candidate(FileCandidate::from_bytes("deck.png", "image/png", vec![0; 1572864]))
                .unwrap();
        let info = image_info(&staged);
        assert_eq!(info.file, "deck.png");
        assert_eq!(info.size, "1.50 MB");
        assert_eq!(info.media_type, "image/png");
        assert!(!info.modified.is_empty());
    }
}
