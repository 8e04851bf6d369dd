use tracing::{debug, info, instrument};

use crate::api::gateway::{ApiRequest, Freshness, Gateway, Listing, normalize_list, unwrap_entity};
use crate::error::ApiError;
use crate::events::{DomainEvent, EventBus};
use crate::model::employee::{Employee, EmployeeQuery, EmployeeUpdate, NewEmployee};

const RESOURCE: &str = "/employees";

/// `/employees` on the backend.
#[derive(Clone)]
pub struct EmployeeApi {
    gateway: Gateway,
    bus: EventBus,
}

impl EmployeeApi {
    pub fn new(gateway: Gateway, bus: EventBus) -> Self {
        Self { gateway, bus }
    }

    pub async fn get_all(
        &self,
        query: &EmployeeQuery,
        freshness: Freshness,
    ) -> Result<Listing<Employee>, ApiError> {
        let request = ApiRequest::get(RESOURCE).with_query(query.pairs());
        let body = self.gateway.fetch(request, freshness).await?;
        let listing = normalize_list(body)?;
        debug!(count = listing.len(), ?freshness, "Fetched employees");
        Ok(listing)
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Employee, ApiError> {
        let body = self
            .gateway
            .fetch(ApiRequest::get(format!("{RESOURCE}/{id}")), Freshness::Cached)
            .await?;
        unwrap_entity(body)
    }

    #[instrument(name = "employee_create", skip(self, payload), fields(employee_id = %payload.employee_id))]
    pub async fn create(&self, payload: &NewEmployee) -> Result<Employee, ApiError> {
        let body = self
            .gateway
            .mutate(ApiRequest::post(RESOURCE, serde_json::to_value(payload)?), RESOURCE)
            .await?;
        let employee: Employee = unwrap_entity(body)?;

        info!(id = %employee.id, "Employee created");
        self.bus.emit(&DomainEvent::EmployeeCreated(employee.clone()));
        Ok(employee)
    }

    #[instrument(name = "employee_update", skip(self, update))]
    pub async fn update(&self, id: &str, update: &EmployeeUpdate) -> Result<Employee, ApiError> {
        let body = self
            .gateway
            .mutate(
                ApiRequest::put(format!("{RESOURCE}/{id}"), serde_json::to_value(update)?),
                RESOURCE,
            )
            .await?;
        let employee: Employee = unwrap_entity(body)?;

        self.bus.emit(&DomainEvent::EmployeeUpdated(employee.clone()));
        Ok(employee)
    }

    #[instrument(name = "employee_delete", skip(self))]
    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.gateway
            .mutate(ApiRequest::delete(format!("{RESOURCE}/{id}")), RESOURCE)
            .await?;

        info!("Employee deleted");
        self.bus.emit(&DomainEvent::EmployeeDeleted { id: id.to_string() });
        Ok(())
    }

    /// Stores a captured template and the new enrollment count.
    pub async fn save_fingerprint(
        &self,
        id: &str,
        templates: Vec<String>,
        enrollment_count: u8,
    ) -> Result<Employee, ApiError> {
        let update = EmployeeUpdate {
            fingerprint_enrolled: Some(true),
            fingerprint_enrollment_count: Some(enrollment_count),
            fingerprint_template: templates.last().cloned(),
            fingerprint_templates: Some(templates),
            ..EmployeeUpdate::default()
        };
        self.update(id, &update).await
    }
}
