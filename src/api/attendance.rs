use tracing::{debug, info};

use crate::api::gateway::{ApiRequest, Freshness, Gateway, Listing, normalize_list, unwrap_entity};
use crate::error::ApiError;
use crate::events::{AttendanceMark, DomainEvent, EventBus};
use crate::model::attendance::{AttendanceQuery, AttendanceRecord, AttendanceStats, NewAttendance};

const RESOURCE: &str = "/attendance";

/// `/attendance` on the backend. Records are read-only apart from
/// recording a new punch.
#[derive(Clone)]
pub struct AttendanceApi {
    gateway: Gateway,
    bus: EventBus,
}

impl AttendanceApi {
    pub fn new(gateway: Gateway, bus: EventBus) -> Self {
        Self { gateway, bus }
    }

    pub async fn get_all(
        &self,
        query: &AttendanceQuery,
        freshness: Freshness,
    ) -> Result<Listing<AttendanceRecord>, ApiError> {
        let request = ApiRequest::get(RESOURCE).with_query(query.pairs());
        let listing = normalize_list(self.gateway.fetch(request, freshness).await?)?;
        debug!(count = listing.len(), "Fetched attendance");
        Ok(listing)
    }

    pub async fn get_by_id(&self, id: &str) -> Result<AttendanceRecord, ApiError> {
        let body = self
            .gateway
            .fetch(ApiRequest::get(format!("{RESOURCE}/{id}")), Freshness::Cached)
            .await?;
        unwrap_entity(body)
    }

    /// Present / full-day / half-day / absent / invalid counts.
    pub async fn stats(
        &self,
        query: &AttendanceQuery,
        freshness: Freshness,
    ) -> Result<AttendanceStats, ApiError> {
        let request = ApiRequest::get(format!("{RESOURCE}/stats")).with_query(query.pairs());
        unwrap_entity(self.gateway.fetch(request, freshness).await?)
    }

    pub async fn create(&self, record: &NewAttendance) -> Result<AttendanceRecord, ApiError> {
        let body = self
            .gateway
            .mutate(ApiRequest::post(RESOURCE, serde_json::to_value(record)?), RESOURCE)
            .await?;
        let created: AttendanceRecord = unwrap_entity(body)?;
        let employee_id = created.employee_id().unwrap_or(&record.employee).to_string();

        info!(id = %created.id, employee = %employee_id, "Attendance recorded");
        self.bus.emit(&DomainEvent::AttendanceRecorded(AttendanceMark {
            record_id: Some(created.id.clone()),
            employee_id: Some(employee_id),
            action: None,
        }));
        Ok(created)
    }
}
