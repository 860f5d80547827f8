//! Description of a single logical API call.

use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use crate::errors::{CodaError, CodaResult};
use crate::resilience::TrafficClass;
use crate::transport::HttpMethod;

/// Everything the executor needs to perform one API call.
///
/// The path is kept as raw segments; the executor percent-encodes them when
/// joining onto the base URL.
#[derive(Debug, Clone)]
pub struct CallDescriptor {
    method: HttpMethod,
    segments: Vec<String>,
    body: Option<Value>,
    query: Vec<(String, String)>,
    traffic_class: TrafficClass,
    cacheable: bool,
    cache_ttl: Option<Duration>,
}

impl CallDescriptor {
    /// Creates a descriptor for `method` on the given path segments.
    ///
    /// GET calls are classed as reads and cacheable; everything else is a
    /// write and bypasses the cache.
    pub fn new<I, S>(method: HttpMethod, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let is_read = method == HttpMethod::Get;
        Self {
            method,
            segments: segments.into_iter().map(Into::into).collect(),
            body: None,
            query: Vec::new(),
            traffic_class: if is_read {
                TrafficClass::Read
            } else {
                TrafficClass::Write
            },
            cacheable: is_read,
            cache_ttl: None,
        }
    }

    /// GET on the given path segments.
    pub fn get<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(HttpMethod::Get, segments)
    }

    /// POST on the given path segments.
    pub fn post<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(HttpMethod::Post, segments)
    }

    /// PUT on the given path segments.
    pub fn put<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(HttpMethod::Put, segments)
    }

    /// PATCH on the given path segments.
    pub fn patch<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(HttpMethod::Patch, segments)
    }

    /// DELETE on the given path segments.
    pub fn delete<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(HttpMethod::Delete, segments)
    }

    /// Sets the JSON body.
    pub fn with_body<B: Serialize>(mut self, body: &B) -> CodaResult<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    /// Appends query parameters from a serializable struct or map.
    ///
    /// Null fields are dropped. Strings are sent as-is, numbers and booleans
    /// as their JSON text, and arrays are joined with `,`.
    pub fn with_query<Q: Serialize>(mut self, params: &Q) -> CodaResult<Self> {
        match serde_json::to_value(params)? {
            Value::Null => {}
            Value::Object(fields) => {
                for (key, value) in fields {
                    if let Some(value) = coerce_query_value(value) {
                        self.query.push((key, value));
                    }
                }
            }
            other => {
                return Err(CodaError::serialization(format!(
                    "query parameters must serialize to an object, got {}",
                    other
                )))
            }
        }
        Ok(self)
    }

    /// Appends a single query parameter.
    pub fn query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Overrides the traffic class used for rate limiting.
    pub fn traffic_class(mut self, class: TrafficClass) -> Self {
        self.traffic_class = class;
        self
    }

    /// Excludes this call from the response cache.
    pub fn no_cache(mut self) -> Self {
        self.cacheable = false;
        self
    }

    /// Caches this call's response for `ttl` instead of the default.
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    /// HTTP method.
    pub fn method(&self) -> HttpMethod {
        self.method
    }

    /// Raw path segments.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Path relative to the base URL, segments joined with `/`.
    pub fn path(&self) -> String {
        self.segments.join("/")
    }

    /// JSON body, if any.
    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    /// Query parameters in insertion order.
    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    /// Traffic class for rate limiting.
    pub fn class(&self) -> TrafficClass {
        self.traffic_class
    }

    /// Whether the response may be served from and stored in the cache.
    pub fn is_cacheable(&self) -> bool {
        self.cacheable
    }

    /// Cache ttl override.
    pub fn ttl_override(&self) -> Option<Duration> {
        self.cache_ttl
    }

    /// Cache key: `"{METHOD} {path}"`, followed by `?` and the query pairs
    /// sorted by key then value when there are any.
    pub fn cache_key(&self) -> String {
        let mut key = format!("{} {}", self.method, self.path());
        if !self.query.is_empty() {
            let mut pairs: Vec<&(String, String)> = self.query.iter().collect();
            pairs.sort();
            let joined = pairs
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("&");
            key.push('?');
            key.push_str(&joined);
        }
        key
    }
}

fn coerce_query_value(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Array(items) => Some(
            items
                .into_iter()
                .filter_map(coerce_query_value)
                .collect::<Vec<_>>()
                .join(","),
        ),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ListRowsParams;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_follow_method() {
        let get = CallDescriptor::get(["docs"]);
        assert_eq!(get.class(), TrafficClass::Read);
        assert!(get.is_cacheable());

        let post = CallDescriptor::post(["docs", "d1", "tables", "t1", "rows"]);
        assert_eq!(post.class(), TrafficClass::Write);
        assert!(!post.is_cacheable());
        assert_eq!(post.path(), "docs/d1/tables/t1/rows");
    }

    #[test]
    fn test_query_coercion() {
        let params = ListRowsParams {
            query: Some("c-1:\"Ada\"".to_string()),
            use_column_names: Some(true),
            limit: Some(25),
            ..Default::default()
        };
        let descriptor = CallDescriptor::get(["docs"])
            .with_query(&params)
            .unwrap()
            .with_query(&serde_json::json!({"tableTypes": ["table", "view"]}))
            .unwrap();

        let mut query = descriptor.query().to_vec();
        query.sort();
        assert_eq!(
            query,
            vec![
                ("limit".to_string(), "25".to_string()),
                ("query".to_string(), "c-1:\"Ada\"".to_string()),
                ("tableTypes".to_string(), "table,view".to_string()),
                ("useColumnNames".to_string(), "true".to_string()),
            ]
        );
    }

    #[test]
    fn test_query_rejects_scalars() {
        assert!(CallDescriptor::get(["docs"]).with_query(&5).is_err());
    }

    #[test]
    fn test_cache_key_is_order_independent() {
        let a = CallDescriptor::get(["docs"])
            .query_param("limit", "10")
            .query_param("isOwner", "true");
        let b = CallDescriptor::get(["docs"])
            .query_param("isOwner", "true")
            .query_param("limit", "10");

        assert_eq!(a.cache_key(), "GET docs?isOwner=true&limit=10");
        assert_eq!(a.cache_key(), b.cache_key());
        assert_eq!(CallDescriptor::get(["whoami"]).cache_key(), "GET whoami");
    }
}
