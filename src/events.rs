//! In-process publish/subscribe for domain mutations.
//!
//! A mutation in one place (say, re-enrolling a fingerprint) has to reach
//! every list that shows the affected data. Components register
//! listeners per [`EventKind`]. Delivery is synchronous and follows
//! registration order. There is no replay, so a listener registered
//! after an emit never sees that event.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use once_cell::sync::Lazy;
use strum_macros::{AsRefStr, Display, EnumIter};
use tracing::{error, trace};

use crate::model::attendance::ScanAction;
use crate::model::deduction::Deduction;
use crate::model::device::DeviceStatus;
use crate::model::employee::Employee;
use crate::model::payroll::PayrollRecord;

/// Page-session wide bus.
pub static EVENT_BUS: Lazy<EventBus> = Lazy::new(EventBus::default);

#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceMark {
    pub record_id: Option<String>,
    pub employee_id: Option<String>,
    pub action: Option<ScanAction>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    EmployeeCreated(Employee),
    EmployeeUpdated(Employee),
    EmployeeDeleted { id: String },
    EmployeesRefreshed(Vec<Employee>),
    FingerprintEnrolled { employee_id: String },
    AttendanceRecorded(AttendanceMark),
    SalaryCreated(PayrollRecord),
    SalaryUpdated(PayrollRecord),
    SalaryArchived { id: String },
    SalaryRestored { id: String },
    DeductionCreated(Deduction),
    DeductionUpdated(Deduction),
    DeductionDeleted { id: String },
    DeductionArchived { id: String },
    DeductionRestored { id: String },
    DeviceStatusChanged(DeviceStatus),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, EnumIter)]
#[strum(serialize_all = "kebab-case")]
pub enum EventKind {
    EmployeeCreated,
    EmployeeUpdated,
    EmployeeDeleted,
    EmployeesRefreshed,
    FingerprintEnrolled,
    AttendanceRecorded,
    SalaryCreated,
    SalaryUpdated,
    SalaryArchived,
    SalaryRestored,
    DeductionCreated,
    DeductionUpdated,
    DeductionDeleted,
    DeductionArchived,
    DeductionRestored,
    DeviceStatusChanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    Employee,
    Attendance,
    Salary,
    Deduction,
    Device,
}

impl EventKind {
    pub fn domain(self) -> Domain {
        use EventKind::*;
        match self {
            EmployeeCreated | EmployeeUpdated | EmployeeDeleted | EmployeesRefreshed
            | FingerprintEnrolled => Domain::Employee,
            AttendanceRecorded => Domain::Attendance,
            SalaryCreated | SalaryUpdated | SalaryArchived | SalaryRestored => Domain::Salary,
            DeductionCreated | DeductionUpdated | DeductionDeleted | DeductionArchived
            | DeductionRestored => Domain::Deduction,
            DeviceStatusChanged => Domain::Device,
        }
    }

    /// Every kind that belongs to `domain`.
    pub fn of(domain: Domain) -> Vec<EventKind> {
        use strum::IntoEnumIterator;
        EventKind::iter().filter(|k| k.domain() == domain).collect()
    }
}

impl DomainEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            DomainEvent::EmployeeCreated(_) => EventKind::EmployeeCreated,
            DomainEvent::EmployeeUpdated(_) => EventKind::EmployeeUpdated,
            DomainEvent::EmployeeDeleted { .. } => EventKind::EmployeeDeleted,
            DomainEvent::EmployeesRefreshed(_) => EventKind::EmployeesRefreshed,
            DomainEvent::FingerprintEnrolled { .. } => EventKind::FingerprintEnrolled,
            DomainEvent::AttendanceRecorded(_) => EventKind::AttendanceRecorded,
            DomainEvent::SalaryCreated(_) => EventKind::SalaryCreated,
            DomainEvent::SalaryUpdated(_) => EventKind::SalaryUpdated,
            DomainEvent::SalaryArchived { .. } => EventKind::SalaryArchived,
            DomainEvent::SalaryRestored { .. } => EventKind::SalaryRestored,
            DomainEvent::DeductionCreated(_) => EventKind::DeductionCreated,
            DomainEvent::DeductionUpdated(_) => EventKind::DeductionUpdated,
            DomainEvent::DeductionDeleted { .. } => EventKind::DeductionDeleted,
            DomainEvent::DeductionArchived { .. } => EventKind::DeductionArchived,
            DomainEvent::DeductionRestored { .. } => EventKind::DeductionRestored,
            DomainEvent::DeviceStatusChanged(_) => EventKind::DeviceStatusChanged,
        }
    }

    /// Mutation events tell readers their cached lists are stale.
    /// Refresh and device notices do not.
    pub fn invalidates_cache(&self) -> bool {
        !matches!(
            self,
            DomainEvent::EmployeesRefreshed(_) | DomainEvent::DeviceStatusChanged(_)
        )
    }
}

pub type Listener = Arc<dyn Fn(&DomainEvent) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: AtomicU64,
    listeners: Mutex<HashMap<EventKind, Vec<(u64, Listener)>>>,
}

impl Registry {
    fn remove(&self, kind: EventKind, id: u64) {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = listeners.get_mut(&kind) {
            slot.retain(|(lid, _)| *lid != id);
        }
    }
}

#[derive(Clone, Default)]
pub struct EventBus {
    registry: Arc<Registry>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `listener` for `kind`. The returned handle unsubscribes
    /// when dropped or when [`Subscription::unsubscribe`] is called.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn on<F>(&self, kind: EventKind, listener: F) -> Subscription
    where
        F: Fn(&DomainEvent) + Send + Sync + 'static,
    {
        self.subscribe(kind, Arc::new(listener))
    }

    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe(&self, kind: EventKind, listener: Listener) -> Subscription {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(kind)
            .or_default()
            .push((id, listener));

        Subscription {
            registry: Arc::downgrade(&self.registry),
            kind,
            id,
        }
    }

    /// Delivers `event` to every listener of its kind and returns how many
    /// ran to completion. A panicking listener is logged and skipped so
    /// the rest still hear about the event.
    pub fn emit(&self, event: &DomainEvent) -> usize {
        let kind = event.kind();
        // Snapshot so listeners may (un)subscribe while being called.
        let listeners: Vec<Listener> = self
            .registry
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .map(|slot| slot.iter().map(|(_, l)| l.clone()).collect())
            .unwrap_or_default();

        trace!(event = %kind, listeners = listeners.len(), "Emitting event");

        let mut delivered = 0;
        for listener in listeners {
            match catch_unwind(AssertUnwindSafe(|| listener(event))) {
                Ok(()) => delivered += 1,
                Err(_) => error!(event = %kind, "Event listener panicked"),
            }
        }
        delivered
    }

    /// Removes `listener` by pointer identity. Does nothing if it is not
    /// registered.
    pub fn remove_listener(&self, kind: EventKind, listener: &Listener) {
        let mut listeners = self
            .registry
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = listeners.get_mut(&kind) {
            slot.retain(|(_, l)| !Arc::ptr_eq(l, listener));
        }
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.registry
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .map_or(0, Vec::len)
    }
}

/// Handle returned by [`EventBus::on`].
pub struct Subscription {
    registry: Weak<Registry>,
    kind: EventKind,
    id: u64,
}

impl Subscription {
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Idempotent.
    pub fn unsubscribe(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.kind, self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
