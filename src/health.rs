use std::fmt;

use crate::detect::HealthReport;
use crate::error::ServiceError;

/// Status indicator driven by `GET /health`. Never gates functionality.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelStatus {
    /// No health check has completed yet.
    Unknown,
    Ready,
    ModelError,
    ConnectionError,
}

impl ModelStatus {
    pub fn from_check(outcome: &Result<HealthReport, ServiceError>) -> Self {
        match outcome {
            Ok(report) if report.status == "healthy" && report.model_loaded => ModelStatus::Ready,
            Ok(_) => ModelStatus::ModelError,
            Err(_) => ModelStatus::ConnectionError,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ModelStatus::Unknown => "Checking Model",
            ModelStatus::Ready => "Model Ready",
            ModelStatus::ModelError => "Model Error",
            ModelStatus::ConnectionError => "Connection Error",
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, ModelStatus::Ready)
    }
}

impl fmt::Display for ModelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
