use chrono::NaiveDate;
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::api::attendance::AttendanceApi;
use crate::api::gateway::{ApiRequest, Freshness, Gateway, Listing, normalize_list, unwrap_entity};
use crate::error::ApiError;
use crate::events::{DomainEvent, EventBus};
use crate::model::attendance::AttendanceQuery;
use crate::model::deduction::{ADVANCE, Deduction, DeductionQuery, DeductionUpdate, NewCashAdvance};
use crate::model::employee::Employee;
use crate::rules::cash_advance::{CashAdvanceCheck, validate};
use crate::utils::period::DateRange;

const RESOURCE: &str = "/cash-advance";

/// Cash advances under `/cash-advance`. Active and archived lists are
/// separate endpoints.
#[derive(Clone)]
pub struct DeductionApi {
    gateway: Gateway,
    bus: EventBus,
}

impl DeductionApi {
    pub fn new(gateway: Gateway, bus: EventBus) -> Self {
        Self { gateway, bus }
    }

    pub async fn get_all(
        &self,
        query: &DeductionQuery,
        freshness: Freshness,
    ) -> Result<Listing<Deduction>, ApiError> {
        let request = ApiRequest::get(RESOURCE).with_query(query.pairs());
        normalize_list(self.gateway.fetch(request, freshness).await?)
    }

    pub async fn get_archived(&self, freshness: Freshness) -> Result<Listing<Deduction>, ApiError> {
        let request = ApiRequest::get(format!("{RESOURCE}/archived"));
        normalize_list(self.gateway.fetch(request, freshness).await?)
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Deduction, ApiError> {
        let body = self
            .gateway
            .fetch(ApiRequest::get(format!("{RESOURCE}/{id}")), Freshness::Cached)
            .await?;
        unwrap_entity(body)
    }

    /// Validates the weekly cash-advance rules against fresh data and only
    /// then submits. A rule violation never reaches the backend.
    #[instrument(name = "cash_advance_request", skip(self, employee, attendance), fields(employee = %employee.id))]
    pub async fn request_cash_advance(
        &self,
        employee: &Employee,
        amount: f64,
        on: NaiveDate,
        attendance: &AttendanceApi,
    ) -> Result<Deduction, ApiError> {
        let week = DateRange::work_week(on);

        let existing = self
            .get_all(&DeductionQuery::for_employee(&employee.id), Freshness::Bypass)
            .await?;
        let records = attendance
            .get_all(&AttendanceQuery::for_employee_in(&employee.id, week), Freshness::Bypass)
            .await?;

        let check = CashAdvanceCheck {
            employee_id: &employee.id,
            daily_rate: employee.current_daily_rate(),
            amount,
            on,
            existing: &existing.items,
            attendance: &records.items,
        };
        if let Err(violation) = validate(&check) {
            warn!(%violation, amount, "Cash advance refused");
            return Err(violation.into());
        }

        let advance = NewCashAdvance {
            employee: employee.id.clone(),
            amount,
            date: on,
            kind: ADVANCE.to_string(),
            description: None,
        };
        let body = self
            .gateway
            .mutate(ApiRequest::post(RESOURCE, serde_json::to_value(&advance)?), RESOURCE)
            .await?;
        let created: Deduction = unwrap_entity(body)?;

        info!(id = %created.id, amount, "Cash advance created");
        self.bus.emit(&DomainEvent::DeductionCreated(created.clone()));
        Ok(created)
    }

    pub async fn update(&self, id: &str, update: &DeductionUpdate) -> Result<Deduction, ApiError> {
        let body = self
            .gateway
            .mutate(
                ApiRequest::patch(format!("{RESOURCE}/{id}"), serde_json::to_value(update)?),
                RESOURCE,
            )
            .await?;
        let updated: Deduction = unwrap_entity(body)?;
        self.bus.emit(&DomainEvent::DeductionUpdated(updated.clone()));
        Ok(updated)
    }

    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.gateway
            .mutate(ApiRequest::delete(format!("{RESOURCE}/{id}")), RESOURCE)
            .await?;
        self.bus.emit(&DomainEvent::DeductionDeleted { id: id.to_string() });
        Ok(())
    }

    pub async fn archive(&self, id: &str) -> Result<(), ApiError> {
        self.gateway
            .mutate(
                ApiRequest::patch(format!("{RESOURCE}/{id}/archive"), json!({})),
                RESOURCE,
            )
            .await?;
        self.bus.emit(&DomainEvent::DeductionArchived { id: id.to_string() });
        Ok(())
    }

    pub async fn restore(&self, id: &str) -> Result<(), ApiError> {
        self.gateway
            .mutate(
                ApiRequest::patch(format!("{RESOURCE}/{id}/restore"), json!({})),
                RESOURCE,
            )
            .await?;
        self.bus.emit(&DomainEvent::DeductionRestored { id: id.to_string() });
        Ok(())
    }
}
