use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::gateway::{ApiRequest, Transport};
use crate::error::ApiError;
use crate::model::device::BridgeHealth;

/// Minimal identity the bridge needs to label a capture. No template
/// material ever goes out from this side.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollIdentity {
    pub employee_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Opaque merged template returned by the bridge.
#[derive(Clone, PartialEq, Eq)]
pub struct CapturedTemplate(String);

impl CapturedTemplate {
    pub fn new(blob: impl Into<String>) -> Self {
        Self(blob.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Debug for CapturedTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CapturedTemplate({} bytes)", self.0.len())
    }
}

#[derive(Debug, Deserialize)]
struct EnrollResponse {
    #[serde(default)]
    template: Option<String>,
}

/// Client for the fingerprint bridge running next to the scanner.
#[derive(Clone)]
pub struct BridgeClient {
    transport: Arc<dyn Transport>,
    health_timeout: Duration,
    capture_timeout: Duration,
}

impl BridgeClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        health_timeout: Duration,
        capture_timeout: Duration,
    ) -> Self {
        Self {
            transport,
            health_timeout,
            capture_timeout,
        }
    }

    pub async fn health(&self) -> Result<BridgeHealth, ApiError> {
        let request = ApiRequest::get("/api/health").with_timeout(self.health_timeout);
        let health: BridgeHealth = serde_json::from_value(self.transport.execute(request).await?)?;
        debug!(device_connected = health.device_connected, "Bridge health");
        Ok(health)
    }

    /// Runs the bridge's multi-scan capture and merge. Blocks until the
    /// employee has placed their finger enough times or the capture
    /// timeout elapses.
    pub async fn enroll(&self, identity: &EnrollIdentity) -> Result<CapturedTemplate, ApiError> {
        let request = ApiRequest::post("/api/fingerprint/enroll", serde_json::to_value(identity)?)
            .with_timeout(self.capture_timeout);
        let response: EnrollResponse =
            serde_json::from_value(self.transport.execute(request).await?)?;

        response
            .template
            .filter(|t| !t.is_empty())
            .map(CapturedTemplate)
            .ok_or_else(|| ApiError::Decode("bridge reported success without a template".into()))
    }
}
