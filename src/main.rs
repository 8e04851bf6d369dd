use anyhow::Context;
use strum::IntoEnumIterator;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_appender::rolling;

use hrm_desk::events::{DomainEvent, EventKind};
use hrm_desk::model::employee::EmployeeQuery;
use hrm_desk::session::SessionStore;
use hrm_desk::{Config, Desk};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env();

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "desk.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!("Desk starting...");

    let desk = Desk::from_config(&config).context("building HTTP clients")?;

    let session = SessionStore::open(&config.session_file)?;
    match session.current_employee() {
        Some(employee) if session.is_logged_in() => {
            info!(employee = %employee.full_name(), "Resumed session")
        }
        _ => info!("No active session"),
    }

    let _audit: Vec<_> = EventKind::iter()
        .map(|kind| desk.bus.on(kind, log_event))
        .collect();

    let cancel = CancellationToken::new();
    let poller = desk.employee_poller().spawn(cancel.child_token());

    let monitor = desk.device_monitor();
    let mut device = monitor.subscribe();
    let monitor = monitor.spawn(config.device_poll, cancel.child_token());

    let employees = desk.employee_list(EmployeeQuery::default());
    let mut list = employees.watch();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            Ok(()) = device.changed() => {
                let status = *device.borrow_and_update();
                debug!(%status, "Scanner");
            }
            Ok(()) = list.changed() => {
                let state = list.borrow_and_update().clone();
                match &state.error {
                    Some(e) => warn!(error = %e.user_message(), "Employee list is stale"),
                    None if !state.loading => info!(count = state.items.len(), "Employee list refreshed"),
                    None => {}
                }
            }
        }
    }

    info!("Shutting down");
    cancel.cancel();
    employees.close().await;
    let _ = tokio::join!(poller, monitor);
    Ok(())
}

fn log_event(event: &DomainEvent) {
    match event {
        DomainEvent::EmployeesRefreshed(list) => debug!(count = list.len(), "employees-refreshed"),
        DomainEvent::DeviceStatusChanged(status) => info!(%status, "device-status-changed"),
        other => info!(event = %other.kind(), "Domain event"),
    }
}
