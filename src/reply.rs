//! What a resource handler returns.
//!
//! A [`Reply`] is the triple every calling convention produces: a status
//! code, a body value that has not been serialised yet, and the headers to
//! send. The dispatcher picks an encoder from the `Content-Type` header (if
//! any) and turns the body into bytes.

use http::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use http::{HeaderMap, StatusCode};
use serde_json::Value;

/// Status, body value and outgoing headers of one handled request.
///
/// ```rust
/// use dozy::Reply;
/// use http::StatusCode;
/// use serde_json::json;
///
/// Reply::ok(json!({ "items": ["item1", "item2"] }));
///
/// Reply::new(StatusCode::CREATED, json!({ "id": 42 }))
///     .header("location", "/items/42");
///
/// Reply::ok(json!({ "id": 42 }))
///     .content_type("application/xml; charset=utf-8");
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Reply {
    pub status: StatusCode,
    pub body: Value,
    pub headers: HeaderMap,
}

impl Reply {
    pub fn new(status: StatusCode, body: impl Into<Value>) -> Self {
        Self { status, body: body.into(), headers: HeaderMap::new() }
    }

    /// `200 OK` with `body`.
    pub fn ok(body: impl Into<Value>) -> Self {
        Self::new(StatusCode::OK, body)
    }

    /// A reply whose body encodes to `null`.
    pub fn status(status: StatusCode) -> Self {
        Self::new(status, Value::Null)
    }

    /// Appends a header value. Earlier values for the same name are kept.
    ///
    /// # Panics
    ///
    /// Panics if `name` or `value` is not a valid header name or value.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        let name = HeaderName::try_from(name).unwrap_or_else(|e| panic!("invalid header name `{name}`: {e}"));
        let value = HeaderValue::try_from(value).unwrap_or_else(|e| panic!("invalid header value `{value}`: {e}"));
        self.headers.append(name, value);
        self
    }

    /// Sets `Content-Type`, which also selects the encoder for the body.
    pub fn content_type(self, content_type: &str) -> Self {
        self.header(CONTENT_TYPE.as_str(), content_type)
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }
}

impl From<(StatusCode, Value, HeaderMap)> for Reply {
    fn from((status, body, headers): (StatusCode, Value, HeaderMap)) -> Self {
        Self { status, body, headers }
    }
}
