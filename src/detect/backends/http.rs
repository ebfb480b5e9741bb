//! HTTP detection service.
//!
//! Speaks the two endpoints of the inference server:
//! - `POST /upload`: multipart body with `file` (binary) and `confidence`
//!   (decimal string), answered with one JSON document
//! - `GET /health`: `{"status": "...", "model_loaded": bool}`

use std::io::Read;

use anyhow::{anyhow, Context, Result};
use rand::RngCore;
use serde::Deserialize;
use url::Url;

use crate::detect::backend::{DetectionService, HealthReport, UploadRequest};
use crate::detect::result::{error_message_from_json, DetectionResult};
use crate::error::ServiceError;

/// Responses carry the annotated image inline, so the cap sits well above
/// the upload limit.
const MAX_RESPONSE_BYTES: u64 = 96 * 1024 * 1024;

#[derive(Debug, Deserialize)]
struct HealthBody {
    status: String,
    #[serde(default)]
    model_loaded: bool,
}

/// Detection service reached over HTTP(S).
pub struct HttpService {
    base: Url,
    agent: ureq::Agent,
}

impl HttpService {
    pub fn new(base_url: &str) -> Result<Self> {
        let mut base = Url::parse(base_url).context("parse detection server url")?;
        match base.scheme() {
            "http" | "https" => {}
            other => {
                return Err(anyhow!(
                    "unsupported server scheme '{}'; expected http(s)",
                    other
                ))
            }
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            base,
            agent: ureq::AgentBuilder::new().build(),
        })
    }

    fn endpoint(&self, name: &str) -> Result<Url, ServiceError> {
        self.base
            .join(name)
            .map_err(|e| ServiceError::Transport(format!("build {} url: {}", name, e)))
    }
}

impl DetectionService for HttpService {
    fn name(&self) -> &'static str {
        "http"
    }

    fn upload(&self, request: &UploadRequest<'_>) -> Result<DetectionResult, ServiceError> {
        let url = self.endpoint("upload")?;
        let boundary = multipart_boundary();
        let body = encode_multipart(&boundary, request);
        log::info!(
            "uploading {} ({} bytes, confidence {}) to {}",
            request.file_name,
            request.bytes.len(),
            request.confidence,
            url
        );

        let response = self
            .agent
            .post(url.as_str())
            .set(
                "Content-Type",
                &format!("multipart/form-data; boundary={}", boundary),
            )
            .set("Accept", "application/json")
            .send_bytes(&body);

        match response {
            Ok(response) => {
                let status = response.status();
                let bytes = read_body(response)?;
                log::debug!("upload answered {} with {} bytes", status, bytes.len());
                DetectionResult::from_json(&bytes)
            }
            Err(ureq::Error::Status(status, response)) => {
                let bytes = read_body(response).unwrap_or_default();
                Err(ServiceError::Request {
                    status,
                    message: error_message_from_json(&bytes),
                })
            }
            Err(ureq::Error::Transport(err)) => Err(ServiceError::Transport(err.to_string())),
        }
    }

    fn health(&self) -> Result<HealthReport, ServiceError> {
        let url = self.endpoint("health")?;
        // The body is judged regardless of status: an unhealthy server may
        // still describe itself.
        let (status, bytes) = match self.agent.get(url.as_str()).call() {
            Ok(response) => {
                let status = response.status();
                (status, read_body(response)?)
            }
            Err(ureq::Error::Status(status, response)) => {
                (status, read_body(response).unwrap_or_default())
            }
            Err(ureq::Error::Transport(err)) => {
                return Err(ServiceError::Transport(err.to_string()))
            }
        };
        let body: HealthBody = serde_json::from_slice(&bytes).map_err(|e| {
            ServiceError::Malformed(format!("health answered {}: {}", status, e))
        })?;
        Ok(HealthReport {
            status: body.status,
            model_loaded: body.model_loaded,
        })
    }
}

fn read_body(response: ureq::Response) -> Result<Vec<u8>, ServiceError> {
    let mut bytes = Vec::new();
    response
        .into_reader()
        .take(MAX_RESPONSE_BYTES + 1)
        .read_to_end(&mut bytes)
        .map_err(|e| ServiceError::Transport(format!("read response body: {}", e)))?;
    if bytes.len() as u64 > MAX_RESPONSE_BYTES {
        return Err(ServiceError::Malformed(format!(
            "response exceeds {} bytes",
            MAX_RESPONSE_BYTES
        )));
    }
    Ok(bytes)
}

fn multipart_boundary() -> String {
    let mut nonce = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut nonce);
    format!("----detect-client-{}", hex::encode(nonce))
}

/// Encode the `file` and `confidence` form fields.
pub(crate) fn encode_multipart(boundary: &str, request: &UploadRequest<'_>) -> Vec<u8> {
    let mut body = Vec::with_capacity(request.bytes.len() + 512);
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
            quote_filename(request.file_name)
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", request.mime_type).as_bytes());
    body.extend_from_slice(request.bytes);
    body.extend_from_slice(b"\r\n");

    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(b"Content-Disposition: form-data; name=\"confidence\"\r\n\r\n");
    body.extend_from_slice(request.confidence.to_string().as_bytes());
    body.extend_from_slice(b"\r\n");

    body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());
    body
}

fn quote_filename(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '\r' && *c != '\n')
        .map(|c| match c {
            '"' => "%22".to_string(),
            other => other.to_string(),
        })
        .collect()
}
