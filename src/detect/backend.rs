use crate::detect::result::DetectionResult;
use crate::error::ServiceError;

/// Everything one upload carries to the service.
#[derive(Clone, Debug)]
pub struct UploadRequest<'a> {
    pub file_name: &'a str,
    pub mime_type: &'a str,
    pub bytes: &'a [u8],
    /// Minimum detector score, in 0..1.
    pub confidence: f64,
}

/// Body of `GET /health`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HealthReport {
    pub status: String,
    pub model_loaded: bool,
}

/// Remote detection service.
///
/// Calls block the calling thread; the controller runs them on a worker so
/// the session loop stays responsive. No client-side timeout is applied.
pub trait DetectionService: Send + Sync {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Upload one image and wait for its detections.
    fn upload(&self, request: &UploadRequest<'_>) -> Result<DetectionResult, ServiceError>;

    /// Probe the service health endpoint.
    fn health(&self) -> Result<HealthReport, ServiceError>;
}
