use base64::{engine::general_purpose::STANDARD as B64, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ExportError, ServiceError};

/// Parsed detection payload returned by the service.
///
/// Never mutated after parsing; presentation only projects it.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectionResult {
    /// Annotated image as sent by the server, if any.
    pub annotated_image: Option<AnnotatedImage>,
    pub stats: DetectionStats,
    /// Per-class counts, in the order the server listed them.
    pub class_counts: Vec<ClassCount>,
    pub detections: Vec<Detection>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DetectionStats {
    pub total_detections: u64,
    /// Mean confidence in 0..1.
    pub average_confidence: f64,
    /// Server-side inference time; may be fractional.
    pub processing_time_ms: f64,
    /// Server-supplied timestamp, if any.
    pub timestamp: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClassCount {
    pub class_name: String,
    pub count: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Detection {
    pub class_name: String,
    /// Detector score in 0..1.
    pub confidence: f64,
    /// `[x1, y1, x2, y2]` in image pixels.
    pub bounding_box: [f64; 4],
    /// `[x, y]` in image pixels.
    pub center: [f64; 2],
}

/// Encoded annotated image, kept as the `data:` URI the server produced.
#[derive(Clone, Debug, PartialEq)]
pub struct AnnotatedImage {
    data_uri: String,
}

impl AnnotatedImage {
    pub fn from_data_uri(data_uri: impl Into<String>) -> Self {
        Self {
            data_uri: data_uri.into(),
        }
    }

    pub fn data_uri(&self) -> &str {
        &self.data_uri
    }

    /// Media type declared by the URI header, e.g. `image/png`.
    pub fn mime_type(&self) -> Option<&str> {
        let header = self.data_uri.strip_prefix("data:")?.split(',').next()?;
        let mime = header.split(';').next()?;
        if mime.is_empty() {
            None
        } else {
            Some(mime)
        }
    }

    /// Decode the base64 payload into raw image bytes.
    pub fn decode(&self) -> Result<Vec<u8>, ExportError> {
        let (header, payload) = self
            .data_uri
            .split_once(',')
            .ok_or_else(|| ExportError::Decode("missing ',' separator".to_string()))?;
        if !header.starts_with("data:") || !header.ends_with(";base64") {
            return Err(ExportError::Decode(format!(
                "unexpected header '{}'",
                header
            )));
        }
        B64.decode(payload.trim())
            .map_err(|e| ExportError::Decode(e.to_string()))
    }
}

/// Body of a successful `POST /upload`.
#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    image_base64: Option<String>,
    stats: WireStats,
    #[serde(default)]
    class_counts: Option<Map<String, Value>>,
    detections: Vec<WireDetection>,
    #[serde(default)]
    timestamp: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireStats {
    total_detections: u64,
    #[serde(default)]
    average_confidence: f64,
    #[serde(default, alias = "processing_time_ms")]
    processing_time: f64,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    class_counts: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct WireDetection {
    #[serde(rename = "class", alias = "class_name")]
    class_name: String,
    confidence: f64,
    bbox: [f64; 4],
    center: [f64; 2],
}

/// Body of a failed request: `{"error": "..."}`.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: Option<String>,
}

impl DetectionResult {
    /// Parse a 2xx response body.
    ///
    /// `class_counts` and `timestamp` are accepted both at the top level and
    /// inside `stats`; the `stats` copy wins when both are present.
    pub fn from_json(body: &[u8]) -> Result<Self, ServiceError> {
        let wire: UploadResponse =
            serde_json::from_slice(body).map_err(|e| ServiceError::Malformed(e.to_string()))?;

        let counts = wire
            .stats
            .class_counts
            .or(wire.class_counts)
            .unwrap_or_default();
        let class_counts = counts
            .into_iter()
            .map(|(class_name, count)| {
                let count = count.as_u64().ok_or_else(|| {
                    ServiceError::Malformed(format!(
                        "class count for '{}' is not a non-negative integer",
                        class_name
                    ))
                })?;
                Ok(ClassCount { class_name, count })
            })
            .collect::<Result<Vec<_>, ServiceError>>()?;

        let detections = wire
            .detections
            .into_iter()
            .map(|d| Detection {
                class_name: d.class_name,
                confidence: d.confidence,
                bounding_box: d.bbox,
                center: d.center,
            })
            .collect();

        Ok(Self {
            annotated_image: wire
                .image_base64
                .filter(|uri| !uri.is_empty())
                .map(AnnotatedImage::from_data_uri),
            stats: DetectionStats {
                total_detections: wire.stats.total_detections,
                average_confidence: wire.stats.average_confidence,
                processing_time_ms: wire.stats.processing_time.max(0.0),
                timestamp: wire.stats.timestamp.or(wire.timestamp),
            },
            class_counts,
            detections,
        })
    }
}

/// Extract the `error` string from a failure body, if there is one.
pub fn error_message_from_json(body: &[u8]) -> Option<String> {
    serde_json::from_slice::<ErrorResponse>(body)
        .ok()
        .and_then(|r| r.error)
        .filter(|msg| !msg.is_empty())
}
