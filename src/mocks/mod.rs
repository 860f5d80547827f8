//! Scripted transport and wire-format fixtures for tests.
//!
//! [`MockTransport`] replays queued responses in order and records every
//! request it was handed, so tests can assert on exactly what went over the
//! wire without a network.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::ops::Deref;
use std::sync::Arc;

use crate::client::{CodaClient, CodaClientBuilder};
use crate::errors::CodaResult;
use crate::resilience::RetryConfig;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, TransportError};

/// Well-formed API token accepted by the shape check.
pub const TEST_TOKEN: &str = "a1b2c3d4-e5f6-7890-abcd-ef1234567890";

/// A request as the transport received it.
///
/// Derefs to [`HttpRequest`], so `method`, `url` and `headers` read
/// directly.
#[derive(Debug, Clone)]
pub struct RecordedRequest(HttpRequest);

impl RecordedRequest {
    /// The body decoded as JSON, if there was one and it parsed.
    pub fn body_json(&self) -> Option<Value> {
        serde_json::from_slice(self.0.body.as_deref()?).ok()
    }

    /// The URL path, e.g. `/apis/v1/docs/d1`, without the query string.
    pub fn path(&self) -> &str {
        let url = self.0.url.as_str();
        let end = url.find('?').unwrap_or(url.len());
        let start = url
            .find("://")
            .and_then(|scheme| url[scheme + 3..end].find('/').map(|host| scheme + 3 + host))
            .unwrap_or(0);
        &url[start..end]
    }
}

impl Deref for RecordedRequest {
    type Target = HttpRequest;

    fn deref(&self) -> &HttpRequest {
        &self.0
    }
}

/// A canned response.
#[derive(Debug, Clone)]
pub struct MockResponse(HttpResponse);

impl MockResponse {
    fn raw(status: u16, content_type: &str, body: Vec<u8>) -> Self {
        Self(HttpResponse {
            status,
            headers: HashMap::from([("content-type".to_string(), content_type.to_string())]),
            body,
        })
    }

    /// `200 OK` carrying `value` as JSON.
    pub fn json<T: Serialize>(value: &T) -> Self {
        Self::raw(
            200,
            "application/json",
            serde_json::to_vec(value).unwrap_or_default(),
        )
    }

    /// An error in the shape Coda uses: `statusCode`, `statusMessage`,
    /// `message`.
    pub fn error(status: u16, message: &str) -> Self {
        Self::json(&json!({
            "statusCode": status,
            "statusMessage": "Error",
            "message": message,
        }))
        .with_status(status)
    }

    /// A `text/plain` body.
    pub fn text(status: u16, body: &str) -> Self {
        Self::raw(status, "text/plain", body.as_bytes().to_vec())
    }

    /// `429`, advertising `retry-after` when given.
    pub fn rate_limited(retry_after: Option<u64>) -> Self {
        let response = Self::error(429, "Too many requests");
        if let Some(secs) = retry_after {
            response.with_header("retry-after", &secs.to_string())
        } else {
            response
        }
    }

    /// `202 Accepted` for a queued mutation.
    pub fn accepted(request_id: &str) -> Self {
        Self::json(&json!({ "requestId": request_id })).with_status(202)
    }

    /// Overrides the status code.
    pub fn with_status(mut self, status: u16) -> Self {
        self.0.status = status;
        self
    }

    /// Adds or replaces a header.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.0.headers.insert(name.to_string(), value.to_string());
        self
    }
}

#[derive(Default)]
struct Script {
    pending: VecDeque<Result<MockResponse, TransportError>>,
    seen: Vec<RecordedRequest>,
}

/// Transport that replays queued responses in FIFO order.
///
/// When the script runs dry every further call gets a 500.
#[derive(Default)]
pub struct MockTransport {
    script: Mutex<Script>,
}

impl MockTransport {
    /// An empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `response` to the script.
    pub fn queue(&self, response: MockResponse) {
        self.script.lock().pending.push_back(Ok(response));
    }

    /// Appends a `200` with `value` as its JSON body.
    pub fn queue_json<T: Serialize>(&self, value: &T) {
        self.queue(MockResponse::json(value));
    }

    /// Appends a Coda-shaped error response.
    pub fn queue_error(&self, status: u16, message: &str) {
        self.queue(MockResponse::error(status, message));
    }

    /// Appends a failure where no response arrives at all.
    pub fn queue_failure(&self, error: TransportError) {
        self.script.lock().pending.push_back(Err(error));
    }

    /// Every request received so far, oldest first.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.script.lock().seen.clone()
    }

    /// The most recent request.
    pub fn last_request(&self) -> Option<RecordedRequest> {
        self.script.lock().seen.last().cloned()
    }

    /// How many requests were received.
    pub fn request_count(&self) -> usize {
        self.script.lock().seen.len()
    }

    /// How many scripted responses are still unused.
    pub fn remaining(&self) -> usize {
        self.script.lock().pending.len()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let next = {
            let mut script = self.script.lock();
            script.seen.push(RecordedRequest(request));
            script.pending.pop_front()
        };

        match next {
            Some(Ok(MockResponse(response))) => Ok(response),
            Some(Err(error)) => Err(error),
            None => Ok(MockResponse::error(500, "script exhausted").0),
        }
    }
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let script = self.script.lock();
        f.debug_struct("MockTransport")
            .field("pending", &script.pending.len())
            .field("seen", &script.seen.len())
            .finish()
    }
}

/// A client builder talking to `transport` with [`TEST_TOKEN`].
pub fn mock_client_builder(transport: Arc<MockTransport>) -> CodaClientBuilder {
    CodaClient::builder()
        .api_token(TEST_TOKEN)
        .transport(transport)
}

/// A client talking to `transport` that never retries.
pub fn mock_client(transport: Arc<MockTransport>) -> CodaResult<CodaClient> {
    mock_client_builder(transport)
        .retry(RetryConfig::no_retries())
        .build()
}

/// Bodies in the Coda wire format.
pub mod fixtures {
    use serde_json::{json, Value};

    /// A row of table `t1` in doc `d1`.
    pub fn row(id: &str, values: Value) -> Value {
        json!({
            "id": id,
            "type": "row",
            "href": format!("https://coda.io/apis/v1/docs/d1/tables/t1/rows/{}", id),
            "name": id,
            "values": values,
        })
    }

    /// One page of a listing.
    pub fn page(items: Vec<Value>, next_page_token: Option<&str>) -> Value {
        let mut page = json!({ "items": items });
        if let Some(token) = next_page_token {
            page["nextPageToken"] = json!(token);
        }
        page
    }

    /// A `mutationStatus` body.
    pub fn mutation_status(status: &str, error: Option<&str>) -> Value {
        let mut body = json!({ "status": status });
        if let Some(error) = error {
            body["error"] = json!(error);
        }
        body
    }

    /// A doc owned by `owner@example.com`.
    pub fn doc(id: &str, name: &str) -> Value {
        json!({
            "id": id,
            "type": "doc",
            "name": name,
            "owner": "owner@example.com",
            "ownerName": "Owner",
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-02T00:00:00Z",
        })
    }

    /// An empty base table.
    pub fn table(id: &str, name: &str) -> Value {
        json!({
            "id": id,
            "type": "table",
            "tableType": "table",
            "name": name,
            "rowCount": 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::HttpMethod;

    #[tokio::test]
    async fn test_replays_in_order_then_fails() {
        let transport = MockTransport::new();
        transport.queue_json(&json!({"n": 1}));
        transport.queue(MockResponse::text(204, ""));

        let url = "https://coda.io/apis/v1/docs?limit=1";
        let first = transport
            .send(HttpRequest::new(HttpMethod::Get, url))
            .await
            .unwrap();
        let second = transport
            .send(HttpRequest::new(HttpMethod::Get, url))
            .await
            .unwrap();
        let third = transport
            .send(HttpRequest::new(HttpMethod::Get, url))
            .await
            .unwrap();

        assert_eq!(first.status, 200);
        assert_eq!(second.status, 204);
        assert_eq!(third.status, 500);
        assert_eq!(transport.request_count(), 3);
        assert_eq!(transport.remaining(), 0);
    }

    #[tokio::test]
    async fn test_recorded_request_views() {
        let transport = MockTransport::new();
        transport
            .send(
                HttpRequest::new(HttpMethod::Post, "https://coda.io/apis/v1/docs/d1?x=1")
                    .with_body(br#"{"rows":[]}"#.to_vec()),
            )
            .await
            .unwrap();

        let recorded = transport.last_request().unwrap();
        assert_eq!(recorded.method, HttpMethod::Post);
        assert_eq!(recorded.path(), "/apis/v1/docs/d1");
        assert_eq!(recorded.body_json(), Some(json!({"rows": []})));
    }
}
