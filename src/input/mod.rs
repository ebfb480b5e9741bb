//! Input acquisition.
//!
//! Turns a user-selected file into a `StagedFile`:
//! - Media type must be on the image allow-list
//! - Size must not exceed 16 MiB
//! - Bytes are read once, at staging time, and shared with preview and upload
//!
//! Failures are typed results; nothing here panics or logs at error level,
//! since the caller turns every failure into a notification.

mod preview;
mod staging;

pub use preview::{format_bytes, generate_preview, image_info, ImageInfo, Preview, THUMBNAIL_EDGE};
pub use staging::{
    mime_type_for_path, validate_candidate, FileCandidate, StagedFile, ALLOWED_MIME_TYPES,
    MAX_UPLOAD_BYTES,
};
