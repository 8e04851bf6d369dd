#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use serde_json::{Value, json};

use hrm_desk::api::gateway::{ApiRequest, Method, Transport};
use hrm_desk::error::{ApiError, Service};
use hrm_desk::events::{DomainEvent, EventBus, EventKind, Subscription};
use hrm_desk::{Config, Desk};

type Handler = Arc<dyn Fn(&ApiRequest) -> Result<Value, ApiError> + Send + Sync>;

/// In-memory stand-in for the backend or the bridge. Routes match on
/// method and path; the query string is ignored.
pub struct FakeTransport {
    service: Service,
    routes: Mutex<HashMap<(Method, String), Handler>>,
    calls: Mutex<Vec<ApiRequest>>,
    delay: Mutex<Option<Duration>>,
}

impl FakeTransport {
    pub fn new(service: Service) -> Arc<Self> {
        Arc::new(Self {
            service,
            routes: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            delay: Mutex::new(None),
        })
    }

    pub fn backend() -> Arc<Self> {
        Self::new(Service::Backend)
    }

    pub fn bridge() -> Arc<Self> {
        Self::new(Service::Bridge)
    }

    pub fn route<F>(&self, method: Method, path: &str, handler: F)
    where
        F: Fn(&ApiRequest) -> Result<Value, ApiError> + Send + Sync + 'static,
    {
        self.routes
            .lock()
            .unwrap()
            .insert((method, path.to_string()), Arc::new(handler));
    }

    pub fn respond(&self, method: Method, path: &str, body: Value) {
        self.route(method, path, move |_| Ok(body.clone()));
    }

    pub fn fail(&self, method: Method, path: &str, error: ApiError) {
        self.route(method, path, move |_| Err(error.clone()));
    }

    /// Every response waits this long, so concurrent callers overlap.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn calls(&self) -> Vec<ApiRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, method: Method, path: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }

    pub fn last_body(&self, method: Method, path: &str) -> Option<Value> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|r| r.method == method && r.path == path)
            .and_then(|r| r.body.clone())
    }
}

impl Transport for FakeTransport {
    fn service(&self) -> Service {
        self.service
    }

    fn execute(&self, request: ApiRequest) -> BoxFuture<'_, Result<Value, ApiError>> {
        self.calls.lock().unwrap().push(request.clone());
        let handler = self
            .routes
            .lock()
            .unwrap()
            .get(&(request.method, request.path.clone()))
            .cloned();
        let delay = *self.delay.lock().unwrap();

        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            match handler {
                Some(handler) => handler(&request),
                None => Err(ApiError::Backend {
                    status: 404,
                    message: format!("no route for {} {}", request.method, request.path),
                }),
            }
        })
    }
}

pub fn desk(backend: &Arc<FakeTransport>, bridge: &Arc<FakeTransport>) -> Desk {
    Desk::with_transports(
        &Config::default(),
        backend.clone(),
        bridge.clone(),
        EventBus::new(),
    )
}

/// Records every event of the given kinds, in delivery order.
pub struct Recorder {
    pub events: Arc<Mutex<Vec<DomainEvent>>>,
    _subscriptions: Vec<Subscription>,
}

impl Recorder {
    pub fn new(bus: &EventBus, kinds: &[EventKind]) -> Self {
        let events = Arc::new(Mutex::new(Vec::new()));
        let subscriptions = kinds
            .iter()
            .map(|&kind| {
                let events = events.clone();
                bus.on(kind, move |event| events.lock().unwrap().push(event.clone()))
            })
            .collect();
        Self {
            events,
            _subscriptions: subscriptions,
        }
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.events.lock().unwrap().iter().map(DomainEvent::kind).collect()
    }
}

pub fn employee_json(id: &str, employee_id: &str, enrollments: u8) -> Value {
    json!({
        "_id": id,
        "employeeId": employee_id,
        "firstName": "Maria",
        "lastName": "Santos",
        "email": "maria@example.com",
        "dailyRate": 550,
        "status": "active",
        "fingerprintEnrolled": enrollments > 0,
        "fingerprintEnrollmentCount": enrollments,
    })
}

pub fn envelope(data: Value) -> Value {
    json!({ "success": true, "data": data })
}
