use std::time::Duration;

use strum_macros::{Display, EnumString};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::biometric::BiometricApi;
use crate::api::bridge::BridgeClient;
use crate::error::ApiError;
use crate::events::{DomainEvent, EventBus};
use crate::model::device::DeviceStatus;

/// Where scanner presence is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum HealthSource {
    #[default]
    Bridge,
    Backend,
}

enum Probe {
    Bridge(BridgeClient),
    Backend(BiometricApi),
}

/// Keeps an advisory scanner status for the UI.
pub struct DeviceMonitor {
    probe: Probe,
    bus: EventBus,
    status: watch::Sender<DeviceStatus>,
}

impl DeviceMonitor {
    pub fn bridge(bridge: BridgeClient, bus: EventBus) -> Self {
        Self::with_probe(Probe::Bridge(bridge), bus)
    }

    pub fn backend(biometric: BiometricApi, bus: EventBus) -> Self {
        Self::with_probe(Probe::Backend(biometric), bus)
    }

    fn with_probe(probe: Probe, bus: EventBus) -> Self {
        let (status, _) = watch::channel(DeviceStatus::Checking);
        Self { probe, bus, status }
    }

    pub fn source(&self) -> HealthSource {
        match self.probe {
            Probe::Bridge(_) => HealthSource::Bridge,
            Probe::Backend(_) => HealthSource::Backend,
        }
    }

    pub fn status(&self) -> DeviceStatus {
        *self.status.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<DeviceStatus> {
        self.status.subscribe()
    }

    /// Runs one probe. Shows `Checking` while it is in flight and emits
    /// `device-status-changed` only when the settled status differs from
    /// the previous one.
    pub async fn check(&self) -> DeviceStatus {
        let previous = self.status();
        self.status.send_replace(DeviceStatus::Checking);

        let settled = match &self.probe {
            Probe::Bridge(bridge) => match bridge.health().await {
                Ok(health) if health.device_connected => DeviceStatus::Connected,
                Ok(_) => DeviceStatus::Disconnected,
                Err(e) => Self::degrade(e),
            },
            Probe::Backend(biometric) => match biometric.device_health().await {
                // `{ success: false }` arrives as `Rejected` and degrades to `Error`.
                Ok(health) if health.connected => DeviceStatus::Connected,
                Ok(_) => DeviceStatus::Disconnected,
                Err(e) => Self::degrade(e),
            },
        };

        self.status.send_replace(settled);
        if settled != previous {
            info!(from = %previous, to = %settled, "Device status changed");
            self.bus.emit(&DomainEvent::DeviceStatusChanged(settled));
        }
        settled
    }

    fn degrade(e: ApiError) -> DeviceStatus {
        if e.is_connectivity() {
            debug!(error = %e, "Health check unreachable");
            DeviceStatus::Disconnected
        } else {
            warn!(error = %e, "Health check failed");
            DeviceStatus::Error
        }
    }

    /// Re-checks on a fixed interval until `cancel` fires.
    pub fn spawn(self, every: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        self.check().await;
                    }
                }
            }
            debug!("Device monitor stopped");
        })
    }
}
