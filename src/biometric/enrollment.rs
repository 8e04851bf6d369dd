//! Fingerprint enrollment for new employees and re-enrollment for
//! existing ones.
//!
//! ```text
//! Idle → CheckingDevice → Ready → Scanning → Captured → Submitting → Success
//!   ↑          │                      │                     │
//!   └──────────┘ (guard failed)       └──────→ Failed ←─────┘
//! ```
//!
//! `Success` and `Failed` end one attempt; a retry goes back through
//! `CheckingDevice`. A captured template only lives inside the session and
//! is dropped on any failure, so a partial capture is never persisted.

use strum_macros::Display;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::api::bridge::{BridgeClient, CapturedTemplate, EnrollIdentity};
use crate::api::employee::EmployeeApi;
use crate::biometric::credentials::Credentials;
use crate::error::ApiError;
use crate::events::{DomainEvent, EventBus};
use crate::model::employee::{Employee, EmployeeDraft, MAX_FINGERPRINT_ENROLLMENTS, NewEmployee};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum EnrollmentState {
    Idle,
    CheckingDevice,
    Ready,
    Scanning,
    Captured,
    Submitting,
    Success,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EnrollmentError {
    #[error("Fingerprint bridge is not running. Start the bridge service and try again.")]
    BridgeUnavailable,

    #[error("Fingerprint scanner not detected. Connect the USB scanner and try again.")]
    DeviceNotConnected,

    #[error("Fingerprint capture timed out. Place the finger on the scanner and try again.")]
    CaptureTimeout,

    #[error("Maximum of {max} fingerprint enrollments reached for this employee")]
    LimitReached { count: u8, max: u8 },

    #[error("Cannot {action} while enrollment is {state}")]
    InvalidState {
        action: &'static str,
        state: EnrollmentState,
    },

    #[error("{0}")]
    Failed(String),

    /// The employee exists; only the template save has to be retried.
    #[error(
        "Employee was created, but saving the fingerprint failed: {reason}. Re-enroll the fingerprint from the employee list."
    )]
    FingerprintNotSaved {
        employee: Box<Employee>,
        reason: String,
    },
}

impl EnrollmentError {
    fn device_message(message: &str) -> Option<Self> {
        let lower = message.to_lowercase();
        if lower.contains("not connected")
            || lower.contains("no device")
            || lower.contains("device not found")
        {
            Some(EnrollmentError::DeviceNotConnected)
        } else if lower.contains("timed out") || lower.contains("timeout") {
            Some(EnrollmentError::CaptureTimeout)
        } else {
            None
        }
    }

    fn from_health(e: ApiError) -> Self {
        match &e {
            ApiError::Unreachable { .. } | ApiError::Timeout { .. } => {
                EnrollmentError::BridgeUnavailable
            }
            ApiError::Rejected(m) | ApiError::Backend { message: m, .. } => {
                Self::device_message(m).unwrap_or_else(|| EnrollmentError::Failed(m.clone()))
            }
            _ => EnrollmentError::Failed(e.user_message()),
        }
    }

    fn from_capture(e: ApiError) -> Self {
        match &e {
            ApiError::Unreachable { .. } => EnrollmentError::BridgeUnavailable,
            ApiError::Timeout { .. } => EnrollmentError::CaptureTimeout,
            ApiError::Rejected(m) | ApiError::Backend { message: m, .. } => {
                Self::device_message(m).unwrap_or_else(|| EnrollmentError::Failed(m.clone()))
            }
            _ => EnrollmentError::Failed(e.user_message()),
        }
    }
}

#[derive(Debug, Clone)]
enum Mode {
    NewEmployee { credentials: Credentials },
    ReEnroll { employee: Box<Employee> },
}

/// One enroll or re-enroll interaction.
#[derive(Debug)]
pub struct EnrollmentSession {
    state: EnrollmentState,
    mode: Mode,
    template: Option<CapturedTemplate>,
    last_error: Option<EnrollmentError>,
}

impl EnrollmentSession {
    fn new(mode: Mode) -> Self {
        Self {
            state: EnrollmentState::Idle,
            mode,
            template: None,
            last_error: None,
        }
    }

    pub fn state(&self) -> EnrollmentState {
        self.state
    }

    /// Generated credentials; `None` when re-enrolling.
    pub fn credentials(&self) -> Option<&Credentials> {
        match &self.mode {
            Mode::NewEmployee { credentials } => Some(credentials),
            Mode::ReEnroll { .. } => None,
        }
    }

    pub fn is_reenrollment(&self) -> bool {
        matches!(self.mode, Mode::ReEnroll { .. })
    }

    /// The `EMP-####` code the bridge labels the capture with.
    pub fn employee_code(&self) -> &str {
        match &self.mode {
            Mode::NewEmployee { credentials } => credentials.employee_id(),
            Mode::ReEnroll { employee } => employee.employee_id.as_deref().unwrap_or(&employee.id),
        }
    }

    pub fn has_template(&self) -> bool {
        self.template.is_some()
    }

    pub fn last_error(&self) -> Option<&EnrollmentError> {
        self.last_error.as_ref()
    }

    /// Abandons the attempt.
    pub fn reset(&mut self) {
        self.template = None;
        self.transition(EnrollmentState::Idle);
    }

    fn transition(&mut self, to: EnrollmentState) {
        debug!(from = %self.state, %to, "Enrollment state");
        self.state = to;
    }

    fn expect_state(
        &self,
        action: &'static str,
        allowed: &[EnrollmentState],
    ) -> Result<(), EnrollmentError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(EnrollmentError::InvalidState {
                action,
                state: self.state,
            })
        }
    }

    fn settle(&mut self, to: EnrollmentState, err: EnrollmentError) -> EnrollmentError {
        self.template = None;
        self.transition(to);
        self.last_error = Some(err.clone());
        err
    }
}

/// Drives sessions against the bridge and the employee API.
#[derive(Clone)]
pub struct Enroller {
    bridge: BridgeClient,
    employees: EmployeeApi,
    bus: EventBus,
}

impl Enroller {
    pub fn new(bridge: BridgeClient, employees: EmployeeApi, bus: EventBus) -> Self {
        Self {
            bridge,
            employees,
            bus,
        }
    }

    /// Starts an Add-Employee enrollment. Credentials are generated here,
    /// once, so the capture can be labelled with the final employee id.
    pub fn begin_new(&self) -> EnrollmentSession {
        let credentials = Credentials::generate();
        debug!(employee_id = %credentials.employee_id(), "New enrollment session");
        EnrollmentSession::new(Mode::NewEmployee { credentials })
    }

    /// Starts a re-enrollment, refusing employees at the enrollment limit
    /// before anything touches the scanner.
    pub fn begin_reenroll(&self, employee: Employee) -> Result<EnrollmentSession, EnrollmentError> {
        if employee.fingerprint_enrollment_count >= MAX_FINGERPRINT_ENROLLMENTS {
            warn!(id = %employee.id, count = employee.fingerprint_enrollment_count, "Enrollment limit reached");
            return Err(EnrollmentError::LimitReached {
                count: employee.fingerprint_enrollment_count,
                max: MAX_FINGERPRINT_ENROLLMENTS,
            });
        }
        Ok(EnrollmentSession::new(Mode::ReEnroll {
            employee: Box::new(employee),
        }))
    }

    /// Entry guard: the bridge must be up and see a scanner.
    pub async fn check_device(&self, session: &mut EnrollmentSession) -> Result<(), EnrollmentError> {
        use EnrollmentState::*;
        session.expect_state("check the scanner", &[Idle, Ready, Success, Failed])?;
        session.template = None;
        session.transition(CheckingDevice);

        match self.bridge.health().await {
            Ok(health) if health.device_connected => {
                session.last_error = None;
                session.transition(Ready);
                Ok(())
            }
            Ok(_) => Err(session.settle(Idle, EnrollmentError::DeviceNotConnected)),
            Err(e) => {
                debug!(error = %e, "Bridge health check failed");
                Err(session.settle(Idle, EnrollmentError::from_health(e)))
            }
        }
    }

    /// Has the bridge capture and merge the finger. Only the identity is
    /// sent; the template comes back opaque.
    pub async fn capture(
        &self,
        session: &mut EnrollmentSession,
        name: &str,
        email: Option<&str>,
    ) -> Result<(), EnrollmentError> {
        session.expect_state("capture", &[EnrollmentState::Ready])?;
        session.transition(EnrollmentState::Scanning);

        let identity = EnrollIdentity {
            employee_id: session.employee_code().to_string(),
            name: name.to_string(),
            email: email.map(str::to_owned),
        };

        match self.bridge.enroll(&identity).await {
            Ok(template) => {
                info!(employee_id = %identity.employee_id, "Fingerprint captured");
                session.template = Some(template);
                session.transition(EnrollmentState::Captured);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, employee_id = %identity.employee_id, "Fingerprint capture failed");
                Err(session.settle(EnrollmentState::Failed, EnrollmentError::from_capture(e)))
            }
        }
    }

    /// Creates the employee from `draft` and the session's credentials,
    /// then stores the captured template.
    ///
    /// A failed create leaves nothing behind. A failed template save does
    /// not roll the employee back and is reported as
    /// [`EnrollmentError::FingerprintNotSaved`].
    #[instrument(name = "enroll_new_employee", skip_all, fields(employee_id = %session.employee_code()))]
    pub async fn submit_new(
        &self,
        session: &mut EnrollmentSession,
        draft: &EmployeeDraft,
    ) -> Result<Employee, EnrollmentError> {
        session.expect_state("submit", &[EnrollmentState::Captured])?;
        let Some(credentials) = session.credentials().cloned() else {
            return Err(EnrollmentError::InvalidState {
                action: "create an employee during re-enrollment",
                state: session.state,
            });
        };
        let Some(template) = session.template.clone() else {
            return Err(session.settle(
                EnrollmentState::Failed,
                EnrollmentError::Failed("No fingerprint has been captured".into()),
            ));
        };
        session.transition(EnrollmentState::Submitting);

        let payload = NewEmployee {
            profile: draft.clone(),
            employee_id: credentials.employee_id().to_string(),
            username: credentials.username().to_string(),
            password: credentials.password().to_string(),
            fingerprint_enrolled: false,
            fingerprint_enrollment_count: 0,
        };

        let created = match self.employees.create(&payload).await {
            Ok(employee) => employee,
            Err(e) => {
                return Err(session.settle(
                    EnrollmentState::Failed,
                    EnrollmentError::Failed(e.user_message()),
                ));
            }
        };

        match self
            .employees
            .save_fingerprint(&created.id, vec![template.into_inner()], 1)
            .await
        {
            Ok(saved) => {
                session.template = None;
                session.transition(EnrollmentState::Success);
                self.bus.emit(&DomainEvent::FingerprintEnrolled {
                    employee_id: saved.id.clone(),
                });
                info!(id = %saved.id, "Employee enrolled");
                Ok(saved)
            }
            Err(e) => {
                warn!(id = %created.id, error = %e, "Employee created but fingerprint not saved");
                let reason = e.user_message();
                Err(session.settle(
                    EnrollmentState::Failed,
                    EnrollmentError::FingerprintNotSaved {
                        employee: Box::new(created),
                        reason,
                    },
                ))
            }
        }
    }

    /// Full re-enrollment: limit check, device check, capture, and an
    /// automatic save without a separate confirmation step.
    #[instrument(name = "reenroll", skip_all, fields(id = %employee.id))]
    pub async fn reenroll(&self, employee: Employee) -> Result<Employee, EnrollmentError> {
        let name = employee.full_name();
        let email = employee.email.clone();

        let mut session = self.begin_reenroll(employee)?;
        self.check_device(&mut session).await?;
        self.capture(&mut session, &name, email.as_deref()).await?;
        self.submit_reenrollment(&mut session).await
    }

    async fn submit_reenrollment(
        &self,
        session: &mut EnrollmentSession,
    ) -> Result<Employee, EnrollmentError> {
        session.expect_state("submit", &[EnrollmentState::Captured])?;
        let (employee, template) = match (&session.mode, session.template.clone()) {
            (Mode::ReEnroll { employee }, Some(template)) => (employee.clone(), template),
            _ => {
                return Err(EnrollmentError::InvalidState {
                    action: "save a re-enrollment",
                    state: session.state,
                });
            }
        };
        session.transition(EnrollmentState::Submitting);

        let mut templates = employee.fingerprint_templates.clone();
        if templates.is_empty() {
            templates.extend(employee.fingerprint_template.clone());
        }
        templates.push(template.into_inner());
        let count = employee.fingerprint_enrollment_count.saturating_add(1);

        match self
            .employees
            .save_fingerprint(&employee.id, templates, count)
            .await
        {
            Ok(saved) => {
                session.template = None;
                session.transition(EnrollmentState::Success);
                self.bus.emit(&DomainEvent::FingerprintEnrolled {
                    employee_id: saved.id.clone(),
                });
                info!(id = %saved.id, count, "Fingerprint re-enrolled");
                Ok(saved)
            }
            Err(e) => Err(session.settle(
                EnrollmentState::Failed,
                EnrollmentError::Failed(e.user_message()),
            )),
        }
    }
}
