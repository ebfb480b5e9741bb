use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use image::ImageFormat;

use crate::error::ValidationError;

/// Largest accepted upload, in bytes.
pub const MAX_UPLOAD_BYTES: u64 = 16 * 1024 * 1024;

/// Declared media types accepted for staging.
pub const ALLOWED_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/bmp",
    "image/tiff",
    "image/webp",
];

const UNKNOWN_MIME_TYPE: &str = "application/octet-stream";

/// A file the user picked, before validation.
#[derive(Clone, Debug)]
pub struct FileCandidate {
    pub name: String,
    pub byte_size: u64,
    /// Declared media type; derived from the extension for local files.
    pub mime_type: String,
    pub last_modified: Option<SystemTime>,
    contents: Contents,
}

#[derive(Clone, Debug)]
enum Contents {
    Path(PathBuf),
    Bytes(Arc<[u8]>),
}

impl FileCandidate {
    /// Describe a local file without reading its contents.
    pub fn from_path(path: &Path) -> Result<Self, ValidationError> {
        let metadata = std::fs::metadata(path).map_err(|source| ValidationError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self {
            name,
            byte_size: metadata.len(),
            mime_type: mime_type_for_path(path),
            last_modified: metadata.modified().ok(),
            contents: Contents::Path(path.to_path_buf()),
        })
    }

    /// Candidate whose bytes are already in memory.
    pub fn from_bytes(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            byte_size: bytes.len() as u64,
            mime_type: mime_type.into(),
            last_modified: Some(SystemTime::now()),
            contents: Contents::Bytes(bytes.into()),
        }
    }
}

/// Media type a browser would declare for this path.
pub fn mime_type_for_path(path: &Path) -> String {
    ImageFormat::from_path(path)
        .map(|format| format.to_mime_type().to_string())
        .unwrap_or_else(|_| UNKNOWN_MIME_TYPE.to_string())
}

/// A validated image awaiting processing.
#[derive(Clone, Debug)]
pub struct StagedFile {
    name: String,
    byte_size: u64,
    mime_type: String,
    last_modified: Option<SystemTime>,
    bytes: Arc<[u8]>,
}

impl StagedFile {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn byte_size(&self) -> u64 {
        self.byte_size
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn last_modified(&self) -> Option<SystemTime> {
        self.last_modified
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Cheap handle on the contents for worker threads.
    pub fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }
}

/// Check type, then size, then load the contents.
pub fn validate_candidate(candidate: FileCandidate) -> Result<StagedFile, ValidationError> {
    let mime_type = candidate.mime_type.to_ascii_lowercase();
    if !ALLOWED_MIME_TYPES.contains(&mime_type.as_str()) {
        return Err(ValidationError::UnsupportedType {
            mime_type: candidate.mime_type,
        });
    }
    check_size(candidate.byte_size)?;

    let bytes: Arc<[u8]> = match candidate.contents {
        Contents::Bytes(bytes) => bytes,
        Contents::Path(path) => std::fs::read(&path)
            .map_err(|source| ValidationError::Unreadable { path, source })?
            .into(),
    };
    // The file may have grown since its metadata was read.
    check_size(bytes.len() as u64)?;

    Ok(StagedFile {
        name: candidate.name,
        byte_size: bytes.len() as u64,
        mime_type,
        last_modified: candidate.last_modified,
        bytes,
    })
}

fn check_size(byte_size: u64) -> Result<(), ValidationError> {
    if byte_size > MAX_UPLOAD_BYTES {
        return Err(ValidationError::TooLarge {
            byte_size,
            limit: MAX_UPLOAD_BYTES,
        });
    }
    Ok(())
}
