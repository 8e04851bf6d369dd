use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::employee::EmployeeApi;
use crate::api::gateway::Freshness;
use crate::error::ApiError;
use crate::events::{DomainEvent, EventBus};
use crate::model::employee::{Employee, EmployeeQuery};

/// Periodically pulls the employee list past the cache and broadcasts it,
/// so changes made on other machines show up here too.
#[derive(Clone)]
pub struct EmployeePoller {
    employees: EmployeeApi,
    bus: EventBus,
    every: Duration,
}

impl EmployeePoller {
    pub fn new(employees: EmployeeApi, bus: EventBus, every: Duration) -> Self {
        Self {
            employees,
            bus,
            every,
        }
    }

    pub async fn poll_once(&self) -> Result<Vec<Employee>, ApiError> {
        let listing = self
            .employees
            .get_all(&EmployeeQuery::default(), Freshness::Bypass)
            .await?;
        debug!(count = listing.len(), "Employee poll");

        self.bus
            .emit(&DomainEvent::EmployeesRefreshed(listing.items.clone()));
        Ok(listing.items)
    }

    /// Polls until `cancel` fires. The first poll runs immediately.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!(every = ?self.every, "Employee poller started");

            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = self.poll_once().await {
                            warn!(error = %e, "Employee poll failed");
                        }
                    }
                }
            }
            info!("Employee poller stopped");
        })
    }
}
