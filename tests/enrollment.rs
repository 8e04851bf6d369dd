mod common;

use std::sync::{Arc, Mutex};

use pretty_assertions::assert_eq;
use serde_json::{Value, json};

use common::{FakeTransport, Recorder, desk, employee_json, envelope};
use hrm_desk::api::gateway::{Freshness, Method};
use hrm_desk::biometric::enrollment::{EnrollmentError, EnrollmentState};
use hrm_desk::error::{ApiError, Service};
use hrm_desk::events::{Domain, EventKind};
use hrm_desk::model::employee::{Employee, EmployeeDraft, EmployeeQuery};

fn merged(mut base: Value, patch: &Value) -> Value {
    if let Some(fields) = patch.as_object() {
        for (key, value) in fields {
            base[key] = value.clone();
        }
    }
    base
}

fn ready_bridge() -> Arc<FakeTransport> {
    let bridge = FakeTransport::bridge();
    bridge.respond(Method::Get, "/api/health", json!({ "deviceConnected": true }));
    bridge.respond(
        Method::Post,
        "/api/fingerprint/enroll",
        json!({ "success": true, "template": "TPL-NEW" }),
    );
    bridge
}

/// Backend that lists every employee it has accepted.
fn backend_accepting(id: &str) -> Arc<FakeTransport> {
    let backend = FakeTransport::backend();
    let roster: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));

    let listed = roster.clone();
    backend.route(Method::Get, "/employees", move |_| {
        Ok(Value::Array(listed.lock().unwrap().clone()))
    });
    let created_id = id.to_string();
    backend.route(Method::Post, "/employees", move |request| {
        let mut body = request.body.clone().unwrap();
        body["_id"] = json!(created_id);
        body.as_object_mut().unwrap().remove("password");
        roster.lock().unwrap().push(body.clone());
        Ok(envelope(body))
    });
    let base = employee_json(id, "EMP-0007", 0);
    backend.route(Method::Put, &format!("/employees/{id}"), move |request| {
        Ok(envelope(merged(base.clone(), request.body.as_ref().unwrap())))
    });
    backend
}

fn draft() -> EmployeeDraft {
    EmployeeDraft {
        first_name: "Maria".into(),
        last_name: "Santos".into(),
        email: Some("maria@example.com".into()),
        daily_rate: Some(550.0),
        ..EmployeeDraft::default()
    }
}

#[tokio::test]
async fn new_employee_is_created_then_fingerprint_saved() {
    let backend = backend_accepting("E7");
    let bridge = ready_bridge();
    let desk = desk(&backend, &bridge);
    let recorder = Recorder::new(&desk.bus, &EventKind::of(Domain::Employee));

    let mut session = desk.enroller.begin_new();
    let credentials = session.credentials().unwrap().clone();
    assert!(credentials.employee_id().starts_with("EMP-"));
    assert_eq!(session.state(), EnrollmentState::Idle);

    desk.enroller.check_device(&mut session).await.unwrap();
    assert_eq!(session.state(), EnrollmentState::Ready);

    desk.enroller
        .capture(&mut session, &draft().full_name(), draft().email.as_deref())
        .await
        .unwrap();
    assert_eq!(session.state(), EnrollmentState::Captured);
    assert_eq!(
        bridge.last_body(Method::Post, "/api/fingerprint/enroll").unwrap(),
        json!({
            "employeeId": credentials.employee_id(),
            "name": "Maria Santos",
            "email": "maria@example.com"
        })
    );

    let employee = desk.enroller.submit_new(&mut session, &draft()).await.unwrap();
    assert_eq!(session.state(), EnrollmentState::Success);
    assert!(!session.has_template());
    assert_eq!(employee.id, "E7");
    assert_eq!(employee.fingerprint_enrollment_count, 1);
    assert!(employee.fingerprint_enrolled);

    let created = backend.last_body(Method::Post, "/employees").unwrap();
    assert_eq!(created["employeeId"], json!(credentials.employee_id()));
    assert_eq!(created["username"], json!(credentials.employee_id()));
    assert_eq!(created["password"], json!(credentials.password()));
    assert_eq!(created["firstName"], json!("Maria"));

    let saved = backend.last_body(Method::Put, "/employees/E7").unwrap();
    assert_eq!(saved["fingerprintTemplates"], json!(["TPL-NEW"]));
    assert_eq!(saved["fingerprintEnrollmentCount"], json!(1));

    assert_eq!(
        recorder.kinds(),
        vec![
            EventKind::EmployeeCreated,
            EventKind::EmployeeUpdated,
            EventKind::FingerprintEnrolled
        ]
    );
}

#[tokio::test]
async fn enrollment_ceiling_is_checked_before_the_scanner() {
    let backend = FakeTransport::backend();
    let bridge = ready_bridge();
    let desk = desk(&backend, &bridge);
    let employee: Employee = serde_json::from_value(employee_json("E1", "EMP-0001", 3)).unwrap();

    let err = desk.enroller.reenroll(employee).await.unwrap_err();

    assert_eq!(err, EnrollmentError::LimitReached { count: 3, max: 3 });
    assert!(bridge.calls().is_empty());
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn template_save_failure_keeps_the_created_employee() {
    let backend = backend_accepting("E7");
    backend.fail(
        Method::Put,
        "/employees/E7",
        ApiError::Backend {
            status: 500,
            message: "Database write failed".into(),
        },
    );
    let bridge = ready_bridge();
    let desk = desk(&backend, &bridge);
    let recorder = Recorder::new(&desk.bus, &EventKind::of(Domain::Employee));
    let before = desk
        .employees
        .get_all(&EmployeeQuery::default(), Freshness::Cached)
        .await
        .unwrap();
    assert!(before.is_empty());

    let mut session = desk.enroller.begin_new();
    desk.enroller.check_device(&mut session).await.unwrap();
    desk.enroller.capture(&mut session, "Maria Santos", None).await.unwrap();
    let err = desk.enroller.submit_new(&mut session, &draft()).await.unwrap_err();

    match &err {
        EnrollmentError::FingerprintNotSaved { employee, reason } => {
            assert_eq!(employee.id, "E7");
            assert_eq!(reason, "Database write failed");
        }
        other => panic!("expected FingerprintNotSaved, got {other:?}"),
    }
    assert!(err.to_string().contains("Re-enroll"));
    assert_eq!(session.state(), EnrollmentState::Failed);
    assert!(!session.has_template());
    assert_eq!(session.last_error(), Some(&err));
    assert_eq!(recorder.kinds(), vec![EventKind::EmployeeCreated]);

    let after = desk
        .employees
        .get_all(&EmployeeQuery::default(), Freshness::Cached)
        .await
        .unwrap();
    let ids: Vec<&str> = after.items.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["E7"]);
    assert_eq!(backend.count(Method::Get, "/employees"), 2);
}

#[tokio::test]
async fn failed_create_leaves_nothing_behind() {
    let backend = FakeTransport::backend();
    backend.fail(
        Method::Post,
        "/employees",
        ApiError::Backend {
            status: 400,
            message: "Email already exists".into(),
        },
    );
    let bridge = ready_bridge();
    let desk = desk(&backend, &bridge);
    let recorder = Recorder::new(&desk.bus, &EventKind::of(Domain::Employee));

    let mut session = desk.enroller.begin_new();
    desk.enroller.check_device(&mut session).await.unwrap();
    desk.enroller.capture(&mut session, "Maria Santos", None).await.unwrap();
    let err = desk.enroller.submit_new(&mut session, &draft()).await.unwrap_err();

    assert_eq!(err, EnrollmentError::Failed("Email already exists".into()));
    assert_eq!(session.state(), EnrollmentState::Failed);
    assert_eq!(backend.count(Method::Put, "/employees/E7"), 0);
    assert!(recorder.kinds().is_empty());
}

#[tokio::test]
async fn device_guard_returns_to_idle() {
    let backend = FakeTransport::backend();
    let bridge = FakeTransport::bridge();
    bridge.fail(
        Method::Get,
        "/api/health",
        ApiError::Unreachable {
            service: Service::Bridge,
            message: "connection refused".into(),
        },
    );
    let desk = desk(&backend, &bridge);

    let mut session = desk.enroller.begin_new();
    let err = desk.enroller.check_device(&mut session).await.unwrap_err();
    assert_eq!(err, EnrollmentError::BridgeUnavailable);
    assert_eq!(session.state(), EnrollmentState::Idle);

    bridge.respond(Method::Get, "/api/health", json!({ "deviceConnected": false }));
    let err = desk.enroller.check_device(&mut session).await.unwrap_err();
    assert_eq!(err, EnrollmentError::DeviceNotConnected);
    assert_eq!(session.state(), EnrollmentState::Idle);

    let err = desk
        .enroller
        .capture(&mut session, "Maria Santos", None)
        .await
        .unwrap_err();
    assert!(matches!(err, EnrollmentError::InvalidState { .. }));
    assert_eq!(bridge.count(Method::Post, "/api/fingerprint/enroll"), 0);
}

#[tokio::test]
async fn capture_timeout_fails_and_can_be_retried() {
    let backend = FakeTransport::backend();
    let bridge = ready_bridge();
    bridge.fail(
        Method::Post,
        "/api/fingerprint/enroll",
        ApiError::Timeout {
            service: Service::Bridge,
        },
    );
    let desk = desk(&backend, &bridge);

    let mut session = desk.enroller.begin_new();
    desk.enroller.check_device(&mut session).await.unwrap();
    let err = desk
        .enroller
        .capture(&mut session, "Maria Santos", None)
        .await
        .unwrap_err();
    assert_eq!(err, EnrollmentError::CaptureTimeout);
    assert_eq!(session.state(), EnrollmentState::Failed);
    assert!(!session.has_template());

    bridge.respond(
        Method::Post,
        "/api/fingerprint/enroll",
        json!({ "success": true, "template": "TPL-RETRY" }),
    );
    desk.enroller.check_device(&mut session).await.unwrap();
    desk.enroller.capture(&mut session, "Maria Santos", None).await.unwrap();
    assert_eq!(session.state(), EnrollmentState::Captured);
}

#[tokio::test]
async fn reenroll_appends_template_and_counts_up() {
    let backend = FakeTransport::backend();
    let mut current = employee_json("E1", "EMP-0001", 1);
    current["fingerprintTemplates"] = json!(["TPL-OLD"]);
    let base = current.clone();
    backend.route(Method::Put, "/employees/E1", move |request| {
        Ok(envelope(merged(base.clone(), request.body.as_ref().unwrap())))
    });
    let bridge = ready_bridge();
    let desk = desk(&backend, &bridge);
    let recorder = Recorder::new(&desk.bus, &EventKind::of(Domain::Employee));
    let employee: Employee = serde_json::from_value(current).unwrap();

    let updated = desk.enroller.reenroll(employee).await.unwrap();

    assert_eq!(updated.fingerprint_enrollment_count, 2);
    assert_eq!(updated.fingerprint_templates, vec!["TPL-OLD", "TPL-NEW"]);
    assert_eq!(
        bridge.last_body(Method::Post, "/api/fingerprint/enroll").unwrap()["employeeId"],
        json!("EMP-0001")
    );
    let saved = backend.last_body(Method::Put, "/employees/E1").unwrap();
    assert!(saved.get("username").is_none());
    assert!(saved.get("password").is_none());
    assert_eq!(
        recorder.kinds(),
        vec![EventKind::EmployeeUpdated, EventKind::FingerprintEnrolled]
    );
}
