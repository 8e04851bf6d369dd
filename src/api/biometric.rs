use std::time::Duration;

use serde_json::json;
use tracing::info;

use crate::api::gateway::{ApiRequest, Gateway};
use crate::error::ApiError;
use crate::events::{AttendanceMark, DomainEvent, EventBus};
use crate::model::attendance::AttendanceScan;
use crate::model::device::BackendDeviceHealth;

const RESOURCE: &str = "/biometric-integrated";

/// Biometric routes the backend exposes on top of the scanner.
#[derive(Clone)]
pub struct BiometricApi {
    gateway: Gateway,
    bus: EventBus,
    health_timeout: Duration,
}

impl BiometricApi {
    pub fn new(gateway: Gateway, bus: EventBus, health_timeout: Duration) -> Self {
        Self {
            gateway,
            bus,
            health_timeout,
        }
    }

    /// Never cached; a stale "connected" would be worse than none.
    pub async fn device_health(&self) -> Result<BackendDeviceHealth, ApiError> {
        let request =
            ApiRequest::get(format!("{RESOURCE}/device/health")).with_timeout(self.health_timeout);
        Ok(serde_json::from_value(self.gateway.send(request).await?)?)
    }

    /// Asks the backend to drive an enrollment on its own scanner.
    pub async fn enroll(&self, employee_id: &str, finger: &str) -> Result<(), ApiError> {
        let request = ApiRequest::post(
            format!("{RESOURCE}/enroll/{employee_id}"),
            json!({ "finger": finger }),
        );
        self.gateway.mutate(request, "/employees").await?;
        self.bus.emit(&DomainEvent::FingerprintEnrolled {
            employee_id: employee_id.to_string(),
        });
        Ok(())
    }

    /// Scans a finger at the terminal and records time-in or time-out for
    /// whoever matched.
    pub async fn record_attendance(&self) -> Result<AttendanceScan, ApiError> {
        let request = ApiRequest::post(format!("{RESOURCE}/attendance/record"), json!({}));
        let scan: AttendanceScan =
            serde_json::from_value(self.gateway.mutate(request, "/attendance").await?)?;

        info!(action = %scan.action, "Biometric attendance recorded");
        self.bus.emit(&DomainEvent::AttendanceRecorded(AttendanceMark {
            record_id: None,
            employee_id: scan.employee.as_ref().map(|e| e.id.clone()),
            action: Some(scan.action),
        }));
        Ok(scan)
    }
}
