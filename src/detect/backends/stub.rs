use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as B64, Engine as _};
use image::{ImageFormat, Rgb, RgbImage};

use crate::detect::backend::{DetectionService, HealthReport, UploadRequest};
use crate::detect::result::{AnnotatedImage, ClassCount, Detection, DetectionResult, DetectionStats};
use crate::error::ServiceError;

/// Canned detections the stub filters by the requested threshold.
const CANNED: &[(&str, f64, [f64; 4])] = &[
    ("FireExtinguisher", 0.912, [34.0, 50.0, 118.0, 240.0]),
    ("OxygenTank", 0.734, [160.0, 42.0, 228.0, 260.0]),
    ("FireExtinguisher", 0.518, [300.0, 61.0, 371.0, 233.0]),
    ("EmergencyPhone", 0.327, [402.0, 90.0, 449.0, 151.0]),
];

/// In-process detection service for demos and tests.
///
/// Selected with a `stub://` server URL. Never touches the network.
pub struct StubService {
    latency: Duration,
    uploads: AtomicUsize,
}

impl StubService {
    pub fn new() -> Self {
        Self {
            latency: Duration::ZERO,
            uploads: AtomicUsize::new(0),
        }
    }

    /// Sleep this long before answering each upload.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Number of uploads received so far.
    pub fn uploads(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }
}

impl Default for StubService {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectionService for StubService {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn upload(&self, request: &UploadRequest<'_>) -> Result<DetectionResult, ServiceError> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }
        if request.bytes.is_empty() {
            return Err(ServiceError::Request {
                status: 400,
                message: Some("No file selected".to_string()),
            });
        }

        let detections: Vec<Detection> = CANNED
            .iter()
            .filter(|(_, confidence, _)| *confidence >= request.confidence)
            .map(|(class_name, confidence, bbox)| Detection {
                class_name: class_name.to_string(),
                confidence: *confidence,
                bounding_box: *bbox,
                center: [
                    ((bbox[0] + bbox[2]) / 2.0).floor(),
                    ((bbox[1] + bbox[3]) / 2.0).floor(),
                ],
            })
            .collect();

        let mut class_counts: Vec<ClassCount> = Vec::new();
        for detection in &detections {
            match class_counts
                .iter_mut()
                .find(|c| c.class_name == detection.class_name)
            {
                Some(entry) => entry.count += 1,
                None => class_counts.push(ClassCount {
                    class_name: detection.class_name.clone(),
                    count: 1,
                }),
            }
        }

        let average_confidence = if detections.is_empty() {
            0.0
        } else {
            let total: f64 = detections.iter().map(|d| d.confidence).sum();
            (total / detections.len() as f64 * 1000.0).round() / 1000.0
        };

        Ok(DetectionResult {
            annotated_image: Some(placeholder_image()?),
            stats: DetectionStats {
                total_detections: detections.len() as u64,
                average_confidence,
                processing_time_ms: self.latency.as_millis() as f64,
                timestamp: Some(chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()),
            },
            class_counts,
            detections,
        })
    }

    fn health(&self) -> Result<HealthReport, ServiceError> {
        Ok(HealthReport {
            status: "healthy".to_string(),
            model_loaded: true,
        })
    }
}

fn placeholder_image() -> Result<AnnotatedImage, ServiceError> {
    let image = RgbImage::from_pixel(8, 8, Rgb([37, 99, 235]));
    let mut png = Cursor::new(Vec::new());
    image
        .write_to(&mut png, ImageFormat::Png)
        .map_err(|e| ServiceError::Unexpected(format!("encode stub image: {}", e)))?;
    Ok(AnnotatedImage::from_data_uri(format!(
        "data:image/png;base64,{}",
        B64.encode(png.into_inner())
    )))
}
