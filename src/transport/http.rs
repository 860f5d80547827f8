//! reqwest-backed transport and the request/response values it exchanges.

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Client, Method};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tracing::instrument;

use super::TransportError;

/// Idle connections are kept alive this long between calls.
const TCP_KEEPALIVE: Duration = Duration::from_secs(60);

/// The verbs the Coda API uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `PATCH`
    Patch,
    /// `DELETE`
    Delete,
}

impl HttpMethod {
    /// Wire name of the verb.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    /// Whether a JSON body may accompany the verb. Coda accepts one on
    /// `DELETE` for bulk row deletion.
    pub fn has_body(&self) -> bool {
        !matches!(self, Self::Get)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<HttpMethod> for Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Delete => Method::DELETE,
        }
    }
}

/// One fully-resolved call, ready to put on the wire.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// Verb.
    pub method: HttpMethod,
    /// Absolute URL with the query string already encoded.
    pub url: String,
    /// Header name to value.
    pub headers: HashMap<String, String>,
    /// Serialized body, if any.
    pub body: Option<Vec<u8>>,
    /// Overrides the transport's default timeout for this attempt.
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    /// A bare request to `url`.
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HashMap::new(),
            body: None,
            timeout: None,
        }
    }

    /// Attaches a serialized body.
    pub fn with_body(self, body: Vec<u8>) -> Self {
        Self {
            body: Some(body),
            ..self
        }
    }

    /// Sets `name`, replacing any earlier value.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Bounds this attempt by `timeout`.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..self
        }
    }
}

/// Status, headers and raw body of whatever the server sent back.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Header name to value. Names keep the case the server used.
    pub headers: HashMap<String, String>,
    /// Raw body bytes.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter().find_map(|(key, value)| {
            key.eq_ignore_ascii_case(name).then_some(value.as_str())
        })
    }

    /// Whether `content-type` names JSON, including `+json` suffixed types
    /// such as `application/problem+json`.
    pub fn is_json(&self) -> bool {
        let Some(mime) = self
            .header("content-type")
            .and_then(|raw| raw.parse::<mime::Mime>().ok())
        else {
            return false;
        };
        mime.subtype() == mime::JSON || mime.suffix() == Some(mime::JSON)
    }

    /// The `retry-after` header read as seconds. HTTP-date values are not
    /// recognised and yield `None`.
    pub fn retry_after(&self) -> Option<Duration> {
        let secs: f64 = self.header("retry-after")?.trim().parse().ok()?;
        (secs.is_finite() && secs >= 0.0).then(|| Duration::from_secs_f64(secs))
    }
}

/// Sends a single request and hands back the raw response.
///
/// Implementations do not retry, cache or interpret status codes. An
/// `Err` means no response was received at all.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Performs `request`.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Production transport over a pooled [`reqwest::Client`] using rustls.
pub struct ReqwestTransport {
    client: Client,
    default_timeout: Duration,
}

impl ReqwestTransport {
    /// Builds the connection pool. `default_timeout` applies to requests
    /// that do not carry their own.
    pub fn new(default_timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(default_timeout)
            .tcp_keepalive(TCP_KEEPALIVE)
            .build()
            .map_err(|err| TransportError::Connection {
                message: format!("failed to build HTTP client: {}", err),
            })?;

        Ok(Self {
            client,
            default_timeout,
        })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    #[instrument(skip_all, fields(method = %request.method, url = %request.url))]
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let HttpRequest {
            method,
            url,
            headers,
            body,
            timeout,
        } = request;
        let timeout = timeout.unwrap_or(self.default_timeout);

        let mut builder = headers.iter().fold(
            self.client.request(method.into(), url.as_str()).timeout(timeout),
            |builder, (name, value)| builder.header(name.as_str(), value.as_str()),
        );
        if let Some(body) = body.filter(|_| method.has_body()) {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|err| classify(err, timeout))?;

        let status = response.status().as_u16();
        let headers = flatten_headers(response.headers());
        let body = response
            .bytes()
            .await
            .map_err(|err| classify(err, timeout))?;

        tracing::trace!(status, bytes = body.len(), "Received response");

        Ok(HttpResponse {
            status,
            headers,
            body: body.to_vec(),
        })
    }
}

impl fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReqwestTransport")
            .field("default_timeout", &self.default_timeout)
            .finish_non_exhaustive()
    }
}

fn classify(err: reqwest::Error, timeout: Duration) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout { timeout }
    } else if err.is_connect() || err.is_request() {
        TransportError::Connection {
            message: err.to_string(),
        }
    } else {
        TransportError::InvalidResponse {
            message: err.to_string(),
        }
    }
}

/// Non-UTF-8 header values are dropped.
fn flatten_headers(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn response_with(headers: &[(&str, &str)]) -> HttpResponse {
        HttpResponse {
            status: 200,
            headers: headers
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
            body: Vec::new(),
        }
    }

    #[test_case("application/json", true ; "plain json")]
    #[test_case("application/json; charset=utf-8", true ; "with charset")]
    #[test_case("application/problem+json", true ; "json suffix")]
    #[test_case("text/plain", false ; "text")]
    #[test_case("not a mime", false ; "garbage")]
    fn test_json_detection(content_type: &str, expected: bool) {
        assert_eq!(
            response_with(&[("Content-Type", content_type)]).is_json(),
            expected
        );
    }

    #[test]
    fn test_missing_content_type_is_not_json() {
        assert!(!response_with(&[]).is_json());
    }

    #[test_case("12", Some(Duration::from_secs(12)) ; "integer seconds")]
    #[test_case(" 1.5 ", Some(Duration::from_millis(1500)) ; "fractional")]
    #[test_case("-3", None ; "negative")]
    #[test_case("Wed, 21 Oct 2015 07:28:00 GMT", None ; "http date")]
    fn test_retry_after(raw: &str, expected: Option<Duration>) {
        assert_eq!(response_with(&[("Retry-After", raw)]).retry_after(), expected);
    }

    #[test]
    fn test_success_range() {
        let mut response = response_with(&[]);
        for (status, ok) in [(200, true), (202, true), (299, true), (301, false), (429, false)] {
            response.status = status;
            assert_eq!(response.is_success(), ok, "status {}", status);
        }
    }

    #[test]
    fn test_method_mapping() {
        assert_eq!(HttpMethod::Patch.to_string(), "PATCH");
        assert_eq!(Method::from(HttpMethod::Delete), Method::DELETE);
        assert!(!HttpMethod::Get.has_body());
        assert!(HttpMethod::Delete.has_body());
    }
}
