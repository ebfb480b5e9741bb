pub mod http;
pub mod stub;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

pub use http::HttpService;
pub use stub::StubService;

use super::backend::DetectionService;

/// Latency the `stub://` service simulates so progress output is visible.
const STUB_LATENCY: Duration = Duration::from_millis(750);

/// Build the service a server URL names.
///
/// `stub://...` selects the in-process stub; anything else must be http(s).
pub fn service_for_url(server_url: &str) -> Result<Arc<dyn DetectionService>> {
    if server_url.starts_with("stub://") {
        log::info!("using in-process stub detection service");
        return Ok(Arc::new(StubService::new().with_latency(STUB_LATENCY)));
    }
    Ok(Arc::new(HttpService::new(server_url)?))
}
