mod backend;
pub mod backends;
mod result;

pub use backend::{DetectionService, HealthReport, UploadRequest};
pub use backends::{service_for_url, HttpService, StubService};
pub use result::{
    error_message_from_json, AnnotatedImage, ClassCount, Detection, DetectionResult,
    DetectionStats,
};
