use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use strum_macros::Display;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::error::{ApiError, Service, extract_message};
use crate::utils::request_dedup::{CacheKey, RequestDeduplicator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

/// Whether a read may be answered from the deduplicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Freshness {
    #[default]
    Cached,
    /// Always hits the network; the result still refreshes the cache.
    Bypass,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    pub timeout: Option<Duration>,
}

impl ApiRequest {
    fn new(method: Method, path: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body,
            timeout: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path, None)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Post, path, Some(body))
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Put, path, Some(body))
    }

    pub fn patch(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Patch, path, Some(body))
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path, None)
    }

    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    /// Sets a timeout unless `timeout` is `None`.
    pub fn with_timeout(mut self, timeout: impl Into<Option<Duration>>) -> Self {
        if let Some(timeout) = timeout.into() {
            self.timeout = Some(timeout);
        }
        self
    }

    /// `METHOD path?sorted-query`, stable regardless of parameter order.
    pub fn cache_key(&self) -> CacheKey {
        let mut query = self.query.clone();
        query.sort();
        let query = query
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");

        if query.is_empty() {
            CacheKey::from(format!("{} {}", self.method, self.path))
        } else {
            CacheKey::from(format!("{} {}?{}", self.method, self.path, query))
        }
    }
}

/// Sends one request to one service and returns the decoded JSON body.
pub trait Transport: Send + Sync {
    fn service(&self) -> Service;

    fn execute(&self, request: ApiRequest) -> BoxFuture<'_, Result<Value, ApiError>>;
}

/// `reqwest` backed transport bound to a base URL.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    service: Service,
}

impl HttpTransport {
    pub fn new(client: reqwest::Client, base_url: &str, service: Service) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            service,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn map_send_error(&self, e: reqwest::Error) -> ApiError {
        if e.is_timeout() {
            ApiError::Timeout {
                service: self.service,
            }
        } else if e.is_connect() {
            ApiError::Unreachable {
                service: self.service,
                message: e.to_string(),
            }
        } else {
            ApiError::Transport(e.to_string())
        }
    }

    async fn send(&self, request: ApiRequest) -> Result<Value, ApiError> {
        let request_id = Uuid::new_v4();
        let url = format!("{}{}", self.base_url, request.path);
        debug!(%request_id, method = %request.method, %url, "Sending request");

        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.client.request(method, &url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await.map_err(|e| {
            warn!(%request_id, error = %e, service = %self.service, "Request failed to send");
            self.map_send_error(e)
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| self.map_send_error(e))?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            match serde_json::from_str::<Value>(&text) {
                Ok(body) => body,
                // Non-JSON error pages still carry a useful status.
                Err(_) if !status.is_success() => Value::String(text),
                Err(e) => return Err(ApiError::Decode(e.to_string())),
            }
        };

        interpret(status.as_u16(), status.canonical_reason(), body).inspect_err(|e| {
            error!(%request_id, status = status.as_u16(), error = %e, "Request rejected");
        })
    }
}

impl Transport for HttpTransport {
    fn service(&self) -> Service {
        self.service
    }

    fn execute(&self, request: ApiRequest) -> BoxFuture<'_, Result<Value, ApiError>> {
        Box::pin(self.send(request))
    }
}

/// Maps a raw response to the uniform result shape.
pub fn interpret(status: u16, reason: Option<&str>, body: Value) -> Result<Value, ApiError> {
    if !(200..300).contains(&status) {
        let message = extract_message(&body)
            .or_else(|| body.as_str().filter(|s| !s.is_empty()).map(str::to_owned))
            .or_else(|| reason.map(str::to_owned))
            .unwrap_or_else(|| format!("HTTP {status}"));
        return Err(ApiError::Backend { status, message });
    }

    if body.get("success").and_then(Value::as_bool) == Some(false) {
        let message = extract_message(&body).unwrap_or_else(|| "Request was not successful".into());
        return Err(ApiError::Rejected(message));
    }

    Ok(body)
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Pagination {
    pub page: u32,
    pub total_pages: u32,
    pub total_items: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Listing<T> {
    pub items: Vec<T>,
    pub pagination: Option<Pagination>,
}

impl<T> Listing<T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Accepts both a bare array and `{ data: [...], pagination }`.
pub fn normalize_list<T: DeserializeOwned>(body: Value) -> Result<Listing<T>, ApiError> {
    match body {
        Value::Array(_) => Ok(Listing {
            items: serde_json::from_value(body)?,
            pagination: None,
        }),
        Value::Object(mut map) => {
            let data = map
                .remove("data")
                .filter(Value::is_array)
                .ok_or_else(|| ApiError::Decode("list response has no `data` array".into()))?;
            let pagination = map
                .remove("pagination")
                .filter(|p| !p.is_null())
                .map(serde_json::from_value)
                .transpose()?;
            Ok(Listing {
                items: serde_json::from_value(data)?,
                pagination,
            })
        }
        Value::Null => Ok(Listing {
            items: Vec::new(),
            pagination: None,
        }),
        other => Err(ApiError::Decode(format!("expected a list, got {other}"))),
    }
}

/// Accepts both a bare document and `{ data: {...} }`.
pub fn unwrap_entity<T: DeserializeOwned>(body: Value) -> Result<T, ApiError> {
    match body {
        Value::Object(mut map) if map.get("data").is_some_and(Value::is_object) => {
            let data = map.remove("data").unwrap_or_default();
            Ok(serde_json::from_value(data)?)
        }
        other => Ok(serde_json::from_value(other)?),
    }
}

/// Backend access shared by the domain modules: reads go through the
/// deduplicator, writes invalidate the reads of their resource.
#[derive(Clone)]
pub struct Gateway {
    transport: Arc<dyn Transport>,
    dedup: RequestDeduplicator,
    window: Duration,
    request_timeout: Option<Duration>,
}

impl Gateway {
    pub fn new(
        transport: Arc<dyn Transport>,
        dedup: RequestDeduplicator,
        window: Duration,
        request_timeout: Option<Duration>,
    ) -> Self {
        Self {
            transport,
            dedup,
            window,
            request_timeout,
        }
    }

    pub fn dedup(&self) -> &RequestDeduplicator {
        &self.dedup
    }

    pub fn service(&self) -> Service {
        self.transport.service()
    }

    /// Sends `request` without touching the cache. The gateway timeout
    /// only fills in for requests that carry none of their own.
    pub async fn send(&self, mut request: ApiRequest) -> Result<Value, ApiError> {
        if request.timeout.is_none() {
            request.timeout = self.request_timeout;
        }
        self.transport.execute(request).await
    }

    pub async fn fetch(&self, request: ApiRequest, freshness: Freshness) -> Result<Value, ApiError> {
        let key = request.cache_key();
        match freshness {
            Freshness::Bypass => {
                let value = self.send(request).await?;
                self.dedup.store(key, value.clone(), self.window).await;
                Ok(value)
            }
            Freshness::Cached => {
                self.dedup
                    .dedupe(key, self.send(request), self.window)
                    .await
            }
        }
    }

    /// Sends a write and, on success, drops cached reads under `resource`.
    pub async fn mutate(&self, request: ApiRequest, resource: &str) -> Result<Value, ApiError> {
        let value = self.send(request).await?;
        self.dedup.clear_prefix(&format!("{} {}", Method::Get, resource));
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Row {
        #[serde(rename = "_id")]
        id: String,
    }

    #[test]
    fn cache_key_sorts_query_params() {
        let a = ApiRequest::get("/attendance").with_query(vec![
            ("startDate".into(), "2024-05-06".into()),
            ("employeeId".into(), "E1".into()),
        ]);
        let b = ApiRequest::get("/attendance").with_query(vec![
            ("employeeId".into(), "E1".into()),
            ("startDate".into(), "2024-05-06".into()),
        ]);
        assert_eq!(a.cache_key(), b.cache_key());
        assert_eq!(
            a.cache_key().as_str(),
            "GET /attendance?employeeId=E1&startDate=2024-05-06"
        );
        assert_eq!(ApiRequest::get("/salary").cache_key().as_str(), "GET /salary");
    }

    #[test]
    fn normalizes_both_list_shapes() {
        let bare: Listing<Row> = normalize_list(json!([{ "_id": "E1" }])).unwrap();
        assert_eq!(bare.items, vec![Row { id: "E1".into() }]);
        assert!(bare.pagination.is_none());

        let paged: Listing<Row> = normalize_list(json!({
            "success": true,
            "data": [{ "_id": "E1" }, { "_id": "E2" }],
            "pagination": { "page": 1, "totalPages": 3, "totalItems": 42 }
        }))
        .unwrap();
        assert_eq!(paged.len(), 2);
        assert_eq!(
            paged.pagination,
            Some(Pagination {
                page: 1,
                total_pages: 3,
                total_items: 42
            })
        );

        let err = normalize_list::<Row>(json!({ "success": true })).unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[test]
    fn unwraps_data_envelope() {
        let row: Row = unwrap_entity(json!({ "success": true, "data": { "_id": "E1" } })).unwrap();
        assert_eq!(row.id, "E1");
        let row: Row = unwrap_entity(json!({ "_id": "E2", "name": "x" })).unwrap();
        assert_eq!(row.id, "E2");
    }

    #[test]
    fn interprets_error_shapes() {
        let err = interpret(404, Some("Not Found"), json!({ "message": "Employee not found" }))
            .unwrap_err();
        assert_eq!(
            err,
            ApiError::Backend {
                status: 404,
                message: "Employee not found".into()
            }
        );

        let err = interpret(500, Some("Internal Server Error"), Value::Null).unwrap_err();
        assert_eq!(err.to_string(), "Internal Server Error");

        let err = interpret(200, Some("OK"), json!({ "success": false, "message": "Device busy" }))
            .unwrap_err();
        assert_eq!(err, ApiError::Rejected("Device busy".into()));

        assert_eq!(interpret(204, None, Value::Null).unwrap(), Value::Null);
    }
}
