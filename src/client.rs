use std::sync::Arc;

use futures::FutureExt;
use tracing::info;

use crate::api::attendance::AttendanceApi;
use crate::api::biometric::BiometricApi;
use crate::api::bridge::BridgeClient;
use crate::api::deduction::DeductionApi;
use crate::api::employee::EmployeeApi;
use crate::api::gateway::{Gateway, HttpTransport, Transport};
use crate::api::salary::SalaryApi;
use crate::biometric::enrollment::Enroller;
use crate::config::Config;
use crate::error::{ApiError, Service};
use crate::events::{Domain, EVENT_BUS, EventBus, EventKind};
use crate::model::employee::{Employee, EmployeeQuery};
use crate::realtime::device_monitor::{DeviceMonitor, HealthSource};
use crate::realtime::live_list::LiveList;
use crate::realtime::poller::EmployeePoller;
use crate::utils::request_dedup::RequestDeduplicator;

/// Every client-side service wired to one backend, one bridge and one
/// event bus.
#[derive(Clone)]
pub struct Desk {
    pub bus: EventBus,
    pub employees: EmployeeApi,
    pub attendance: AttendanceApi,
    pub salary: SalaryApi,
    pub deductions: DeductionApi,
    pub biometric: BiometricApi,
    pub bridge: BridgeClient,
    pub enroller: Enroller,
    dedup: RequestDeduplicator,
    config: Config,
}

impl Desk {
    /// HTTP transports for `config.api_url` and `config.bridge_url`,
    /// sharing the process-wide event bus.
    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("hrm-desk/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let backend = Arc::new(HttpTransport::new(client.clone(), &config.api_url, Service::Backend));
        let bridge = Arc::new(HttpTransport::new(client, &config.bridge_url, Service::Bridge));
        info!(api = %backend.base_url(), bridge = %bridge.base_url(), "Desk configured");

        Ok(Self::with_transports(config, backend, bridge, EVENT_BUS.clone()))
    }

    pub fn with_transports(
        config: &Config,
        backend: Arc<dyn Transport>,
        bridge: Arc<dyn Transport>,
        bus: EventBus,
    ) -> Self {
        let dedup = RequestDeduplicator::new(config.dedupe_capacity);
        let gateway = Gateway::new(
            backend,
            dedup.clone(),
            config.dedupe_window,
            config.request_timeout,
        );

        let employees = EmployeeApi::new(gateway.clone(), bus.clone());
        let bridge = BridgeClient::new(bridge, config.health_timeout, config.capture_timeout);
        let enroller = Enroller::new(bridge.clone(), employees.clone(), bus.clone());

        Self {
            attendance: AttendanceApi::new(gateway.clone(), bus.clone()),
            salary: SalaryApi::new(gateway.clone(), bus.clone()),
            deductions: DeductionApi::new(gateway.clone(), bus.clone()),
            biometric: BiometricApi::new(gateway, bus.clone(), config.health_timeout),
            employees,
            bridge,
            enroller,
            bus,
            dedup,
            config: config.clone(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn dedup(&self) -> &RequestDeduplicator {
        &self.dedup
    }

    pub fn employee_poller(&self) -> EmployeePoller {
        EmployeePoller::new(self.employees.clone(), self.bus.clone(), self.config.employee_poll)
    }

    pub fn device_monitor(&self) -> DeviceMonitor {
        match self.config.health_source {
            HealthSource::Bridge => DeviceMonitor::bridge(self.bridge.clone(), self.bus.clone()),
            HealthSource::Backend => {
                DeviceMonitor::backend(self.biometric.clone(), self.bus.clone())
            }
        }
    }

    /// Employee list that follows every employee event.
    pub fn employee_list(&self, query: EmployeeQuery) -> LiveList<Employee> {
        let employees = self.employees.clone();
        LiveList::spawn(&self.bus, &EventKind::of(Domain::Employee), move |freshness| {
            let employees = employees.clone();
            let query = query.clone();
            async move {
                employees
                    .get_all(&query, freshness)
                    .await
                    .map(|listing| listing.items)
            }
            .boxed()
        })
    }
}
