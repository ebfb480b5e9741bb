//! Result presentation.
//!
//! Pure projections from a `DetectionResult` into display rows. Nothing here
//! mutates the result or performs I/O, so the same view feeds the text
//! renderer and the JSON output.

mod text;

use chrono::Local;
use serde::Serialize;

use crate::detect::{Detection, DetectionResult, DetectionStats};

pub use text::render_text;

/// Border color for classes missing from the palette.
pub const DEFAULT_CLASS_COLOR: &str = "#2563eb";

const CLASS_COLORS: &[(&str, &str)] = &[
    ("OxygenTank", "#00ff00"),
    ("NitrogenTank", "#0000ff"),
    ("FirstAidBox", "#ff0000"),
    ("FireAlarm", "#ffff00"),
    ("SafetySwitchPanel", "#ff00ff"),
    ("EmergencyPhone", "#00ffff"),
    ("FireExtinguisher", "#800080"),
];

pub fn class_color(class_name: &str) -> &'static str {
    CLASS_COLORS
        .iter()
        .find(|(name, _)| *name == class_name)
        .map(|(_, color)| *color)
        .unwrap_or(DEFAULT_CLASS_COLOR)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceTier {
    High,
    Medium,
    Low,
}

impl ConfidenceTier {
    /// `High` from 0.70, `Medium` from 0.40, `Low` below.
    pub fn for_confidence(confidence: f64) -> Self {
        if confidence >= 0.7 {
            ConfidenceTier::High
        } else if confidence >= 0.4 {
            ConfidenceTier::Medium
        } else {
            ConfidenceTier::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceTier::High => "high",
            ConfidenceTier::Medium => "medium",
            ConfidenceTier::Low => "low",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StatsView {
    pub total_detections: u64,
    /// Percentage with one decimal, e.g. `87.3%`.
    pub average_confidence: String,
    /// As received, suffixed with `ms`.
    pub processing_time: String,
    pub timestamp: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClassRow {
    pub class_name: String,
    pub count: u64,
    pub color: &'static str,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DetectionRow {
    /// 1-based position in the server's list.
    pub index: usize,
    pub class_name: String,
    pub confidence: String,
    pub tier: ConfidenceTier,
    /// `(x, y)` exactly as received.
    pub center: String,
    /// `[x1, y1, x2, y2]` rounded to integers.
    pub bounding_box: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResultView {
    pub stats: StatsView,
    pub classes: Vec<ClassRow>,
    pub detections: Vec<DetectionRow>,
    pub has_image: bool,
}

impl ResultView {
    /// Project `result`, using the local clock when the server sent no
    /// timestamp.
    pub fn new(result: &DetectionResult) -> Self {
        Self::with_clock(result, local_timestamp)
    }

    pub fn with_clock(result: &DetectionResult, now: impl FnOnce() -> String) -> Self {
        Self {
            stats: stats_view(&result.stats, now),
            classes: class_rows(result),
            detections: detection_rows(&result.detections),
            has_image: result.annotated_image.is_some(),
        }
    }
}

pub fn stats_view(stats: &DetectionStats, now: impl FnOnce() -> String) -> StatsView {
    StatsView {
        total_detections: stats.total_detections,
        average_confidence: percent(stats.average_confidence),
        processing_time: format!("{}ms", stats.processing_time_ms),
        timestamp: stats
            .timestamp
            .clone()
            .filter(|ts| !ts.is_empty())
            .unwrap_or_else(now),
    }
}

pub fn class_rows(result: &DetectionResult) -> Vec<ClassRow> {
    result
        .class_counts
        .iter()
        .map(|entry| ClassRow {
            class_name: entry.class_name.clone(),
            count: entry.count,
            color: class_color(&entry.class_name),
        })
        .collect()
}

pub fn detection_rows(detections: &[Detection]) -> Vec<DetectionRow> {
    detections
        .iter()
        .enumerate()
        .map(|(i, detection)| DetectionRow {
            index: i + 1,
            class_name: detection.class_name.clone(),
            confidence: percent(detection.confidence),
            tier: ConfidenceTier::for_confidence(detection.confidence),
            center: format!("({}, {})", detection.center[0], detection.center[1]),
            bounding_box: format!(
                "[{}]",
                detection
                    .bounding_box
                    .iter()
                    .map(|coord| round_half_up(*coord).to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        })
        .collect()
}

fn percent(fraction: f64) -> String {
    format!("{:.1}%", fraction * 100.0)
}

/// Halves round toward positive infinity: 2.5 -> 3, -2.5 -> -2.
fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

/// Client clock in the `M/D/YYYY, h:mm:ss AM` form.
pub fn local_timestamp() -> String {
    Local::now().format("%-m/%-d/%Y, %-I:%M:%S %p").to_string()
}
