use serde_json::json;
use tracing::{error, info};

use crate::api::gateway::{ApiRequest, Freshness, Gateway, Listing, normalize_list, unwrap_entity};
use crate::error::ApiError;
use crate::events::{DomainEvent, EventBus};
use crate::model::payroll::{NewPayroll, PaymentStatus, PayrollRecord, PayrollUpdate, SalaryQuery};

const RESOURCE: &str = "/salary";

/// Payroll records under `/salary`.
#[derive(Clone)]
pub struct SalaryApi {
    gateway: Gateway,
    bus: EventBus,
}

impl SalaryApi {
    pub fn new(gateway: Gateway, bus: EventBus) -> Self {
        Self { gateway, bus }
    }

    pub async fn get_all(
        &self,
        query: &SalaryQuery,
        freshness: Freshness,
    ) -> Result<Listing<PayrollRecord>, ApiError> {
        let request = ApiRequest::get(RESOURCE).with_query(query.pairs());
        normalize_list(self.gateway.fetch(request, freshness).await?)
    }

    pub async fn get_by_id(&self, id: &str) -> Result<PayrollRecord, ApiError> {
        let body = self
            .gateway
            .fetch(ApiRequest::get(format!("{RESOURCE}/{id}")), Freshness::Cached)
            .await?;
        unwrap_entity(body)
    }

    pub async fn create(&self, payroll: &NewPayroll) -> Result<PayrollRecord, ApiError> {
        let body = self
            .gateway
            .mutate(ApiRequest::post(RESOURCE, serde_json::to_value(payroll)?), RESOURCE)
            .await?;
        let record: PayrollRecord = unwrap_entity(body)?;
        self.bus.emit(&DomainEvent::SalaryCreated(record.clone()));
        Ok(record)
    }

    pub async fn update(&self, id: &str, update: &PayrollUpdate) -> Result<PayrollRecord, ApiError> {
        let body = self
            .gateway
            .mutate(
                ApiRequest::put(format!("{RESOURCE}/{id}"), serde_json::to_value(update)?),
                RESOURCE,
            )
            .await?;
        let record: PayrollRecord = unwrap_entity(body)?;
        self.bus.emit(&DomainEvent::SalaryUpdated(record.clone()));
        Ok(record)
    }

    pub async fn archive(&self, id: &str) -> Result<(), ApiError> {
        self.set_archived(id, true).await?;
        self.bus.emit(&DomainEvent::SalaryArchived { id: id.to_string() });
        Ok(())
    }

    pub async fn restore(&self, id: &str) -> Result<(), ApiError> {
        self.set_archived(id, false).await?;
        self.bus.emit(&DomainEvent::SalaryRestored { id: id.to_string() });
        Ok(())
    }

    async fn set_archived(&self, id: &str, archived: bool) -> Result<(), ApiError> {
        self.gateway
            .mutate(
                ApiRequest::patch(format!("{RESOURCE}/{id}"), json!({ "archived": archived })),
                RESOURCE,
            )
            .await
            .map(|_| ())
    }

    /// Settles a pending payroll. Anything other than `Pending → Paid|Done`
    /// is refused before a request is made.
    pub async fn set_payment_status(
        &self,
        record: &PayrollRecord,
        status: PaymentStatus,
    ) -> Result<PayrollRecord, ApiError> {
        if !record.payment_status.can_transition_to(status) {
            error!(id = %record.id, from = %record.payment_status, to = %status, "Invalid payment status change");
            return Err(ApiError::Rejected(format!(
                "Cannot change payment status from {} to {}",
                record.payment_status, status
            )));
        }

        let body = self
            .gateway
            .mutate(
                ApiRequest::patch(
                    format!("{RESOURCE}/{}", record.id),
                    json!({ "paymentStatus": status }),
                ),
                RESOURCE,
            )
            .await?;

        // Some deployments answer with `{ message }` only.
        let updated = unwrap_entity::<PayrollRecord>(body).unwrap_or_else(|_| PayrollRecord {
            payment_status: status,
            ..record.clone()
        });

        info!(id = %updated.id, status = %updated.payment_status, "Payment status changed");
        self.bus.emit(&DomainEvent::SalaryUpdated(updated.clone()));
        Ok(updated)
    }
}
