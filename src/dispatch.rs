//! Per-request pipeline.
//!
//! ```text
//! http::Request<Bytes>
//!        ↓ form::from_request             malformed        → 400, no body
//!        ↓ resource::resolve(method)      no capability    → 405, no body
//!        ↓ handler(&Request) -> Reply
//!        ↓ Content-Type of the reply, parameters stripped (default application/json)
//!        ↓ Marshalers::lookup → encode    encoder failed   → 500, no body
//! http::Response: reply headers + reply status + encoded body
//! ```
//!
//! Nothing in here fails outward: every problem ends as a status code.

use std::fmt;
use std::sync::{Arc, OnceLock};

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, StatusCode};
use http_body_util::Full;
use tracing::{debug, warn};

use crate::form;
use crate::marshal::{APPLICATION_JSON, Marshalers};
use crate::method::Method;
use crate::request::Request;
use crate::resource::{Resource, resolve};

/// A request with its body fully read, as endpoints receive it.
pub type HttpRequest = http::Request<Bytes>;

/// What an endpoint answers.
pub type HttpResponse = http::Response<Full<Bytes>>;

/// Prefix and indent handed to every encoder.
const PREFIX: &str = "";
const INDENT: &str = "  ";

/// The dispatch function bound to one path.
///
/// [`Api::add_resource`](crate::Api::add_resource) builds one per path.
/// [`Api::add_resource_with_wrapper`](crate::Api::add_resource_with_wrapper)
/// hands it to a wrapper first, which may return any endpoint it likes,
/// usually one that calls the original and adjusts the request or response.
///
/// ```rust
/// use dozy::Endpoint;
/// use http::HeaderValue;
///
/// fn server_header(inner: Endpoint) -> Endpoint {
///     Endpoint::new(move |req| {
///         let mut res = inner.call(req);
///         res.headers_mut().insert("server", HeaderValue::from_static("dozy"));
///         res
///     })
/// }
/// ```
#[derive(Clone)]
pub struct Endpoint(Arc<dyn Fn(HttpRequest) -> HttpResponse + Send + Sync>);

impl Endpoint {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(HttpRequest) -> HttpResponse + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, req: HttpRequest) -> HttpResponse {
        (self.0)(req)
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Endpoint(..)")
    }
}

/// Builds the endpoint that dispatches to `resource`.
///
/// The encoders are read at request time, so the ones registered at start
/// apply to endpoints created before it.
pub(crate) fn endpoint(resource: Arc<dyn Resource>, marshalers: Arc<OnceLock<Marshalers>>) -> Endpoint {
    Endpoint::new(move |req| {
        let marshalers = marshalers.get_or_init(Marshalers::default);
        handle(resource.as_ref(), marshalers, req)
    })
}

/// Runs one request through `resource`.
pub fn handle(resource: &dyn Resource, marshalers: &Marshalers, req: HttpRequest) -> HttpResponse {
    let (parts, body) = req.into_parts();

    let form = match form::from_request(&parts, &body) {
        Ok(form) => form,
        Err(e) => {
            warn!(path = %parts.uri.path(), "malformed form: {e}");
            return empty(StatusCode::BAD_REQUEST);
        }
    };

    let method = parts.method.as_str().parse::<Method>().ok();
    let request = Request::new(parts, body, form);

    let Some(handler) = method.and_then(|m| resolve(m, resource)) else {
        debug!(method = %request.method(), path = request.path(), "method not allowed");
        return empty(StatusCode::METHOD_NOT_ALLOWED);
    };

    let reply = handler(&request);

    let content_type = negotiated_type(&reply.headers);
    let body = match marshalers.lookup(content_type).encode(&reply.body, PREFIX, INDENT) {
        Ok(body) => body,
        Err(e) => {
            warn!(path = request.path(), content_type, "encoding reply failed: {e}");
            return empty(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    debug!(method = %request.method(), path = request.path(), status = reply.status.as_u16(), "dispatched");

    let mut response = http::Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = reply.status;
    let headers = response.headers_mut();
    for (name, value) in &reply.headers {
        headers.append(name, value.clone());
    }
    response
}

/// The media type named by the reply's `Content-Type`, without parameters.
fn negotiated_type(headers: &HeaderMap) -> &str {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.split(';').next().unwrap_or_default().trim())
        .unwrap_or(APPLICATION_JSON)
}

pub(crate) fn empty(status: StatusCode) -> HttpResponse {
    let mut response = http::Response::new(Full::new(Bytes::new()));
    *response.status_mut() = status;
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::Form;
    use crate::marshal::Marshaler;
    use crate::reply::Reply;
    use crate::request::Context;
    use crate::resource::{Get, PostRequest, PutContext};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};

    struct Items;

    impl Get for Items {
        fn get(&self, _: &Form, _: &HeaderMap) -> Reply {
            Reply::ok(json!({ "items": ["item1", "item2"] }))
        }
    }

    crate::resource!(Items: Get);

    /// Answers GET with whatever headers it was configured with.
    struct Exports {
        headers: HeaderMap,
    }

    impl Exports {
        fn with_content_type(content_type: Option<&str>) -> Self {
            let mut headers = HeaderMap::new();
            if let Some(ct) = content_type {
                headers.insert(CONTENT_TYPE, ct.parse().unwrap());
            }
            Self { headers }
        }
    }

    impl Get for Exports {
        fn get(&self, _: &Form, _: &HeaderMap) -> Reply {
            Reply::ok(json!([{ "Name": "Name1" }, { "Name": "Name2" }])).with_headers(self.headers.clone())
        }
    }

    crate::resource!(Exports: Get);

    struct Echo;

    impl PostRequest for Echo {
        fn post(&self, request: &Request) -> Reply {
            let tags: Vec<_> = request.form().get_all("tag").to_vec();
            Reply::new(StatusCode::CREATED, json!({ "tags": tags }))
                .header("x-multi", "one")
                .header("x-multi", "two")
        }
    }

    impl PutContext for Echo {
        fn put(&self, ctx: &Context<'_>, form: &Form, headers: &HeaderMap) -> Reply {
            Reply::ok(json!({
                "peer": ctx.remote_addr().is_some(),
                "id": form.get("id"),
                "agent": headers.get("user-agent").and_then(|v| v.to_str().ok()),
            }))
        }
    }

    crate::resource!(Echo: PostRequest, PutContext);

    /// Writes `<Name>..</Name>` elements for an array of `{ "Name": .. }` objects.
    fn xml_indent(value: &Value, prefix: &str, indent: &str) -> Result<Vec<u8>, crate::MarshalError> {
        let rows = value.as_array().ok_or("expected an array")?;
        let mut out = Vec::new();
        for (i, row) in rows.iter().enumerate() {
            let name = row["Name"].as_str().ok_or("expected a Name")?;
            if i > 0 {
                out.push(format!("\n{prefix}"));
            }
            out.push(format!("<DataExport>\n{prefix}{indent}<Name>{name}</Name>\n{prefix}</DataExport>"));
        }
        Ok(out.concat().into_bytes())
    }

    fn with_xml() -> Marshalers {
        let mut marshalers = Marshalers::new();
        marshalers.register("application/xml", Marshaler::new(xml_indent));
        marshalers
    }

    fn request(method: &str, uri: &str) -> HttpRequest {
        http::Request::builder().method(method).uri(uri).body(Bytes::new()).unwrap()
    }

    fn body(response: HttpResponse) -> String {
        let collected = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(response.into_body().collect())
            .unwrap();
        String::from_utf8(collected.to_bytes().to_vec()).unwrap()
    }

    const JSON_EXPORTS: &str = "[\n  {\n    \"Name\": \"Name1\"\n  },\n  {\n    \"Name\": \"Name2\"\n  }\n]";
    const XML_EXPORTS: &str =
        "<DataExport>\n  <Name>Name1</Name>\n</DataExport>\n<DataExport>\n  <Name>Name2</Name>\n</DataExport>";

    #[test]
    fn get_encodes_reply_as_indented_json() {
        let res = handle(&Items, &Marshalers::new(), request("GET", "/items"));
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body(res), "{\n  \"items\": [\n    \"item1\",\n    \"item2\"\n  ]\n}");
    }

    #[test]
    fn unimplemented_verbs_get_405_and_no_body() {
        for method in ["POST", "PUT", "DELETE", "HEAD", "PATCH", "OPTIONS", "TRACE"] {
            let res = handle(&Items, &Marshalers::new(), request(method, "/items"));
            assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED, "{method}");
            assert!(body(res).is_empty());
        }
    }

    #[test]
    fn malformed_query_gets_400_before_resolution() {
        for uri in ["/items?a=%zz", "/items?a=1;b=2", "/items?%"] {
            let res = handle(&Items, &Marshalers::new(), request("GET", uri));
            assert_eq!(res.status(), StatusCode::BAD_REQUEST, "{uri}");
            assert!(body(res).is_empty());
        }
        // Even a verb the resource does not answer reports the bad form first.
        let res = handle(&Items, &Marshalers::new(), request("DELETE", "/items?a=%zz"));
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        // Same for a form verb whose content-type does not parse.
        let req = http::Request::builder()
            .method("POST")
            .uri("/items")
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded; =")
            .body(Bytes::from_static(b"a=1"))
            .unwrap();
        let res = handle(&Items, &Marshalers::new(), req);
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(body(res).is_empty());
    }

    #[test]
    fn content_type_selects_the_encoder() {
        let marshalers = with_xml();
        let cases = [
            (None, JSON_EXPORTS),
            (Some("application/json"), JSON_EXPORTS),
            (Some("application/xml"), XML_EXPORTS),
            (Some("application/xml;charset=utf-8"), XML_EXPORTS),
            (Some("application/xml; charset=utf-8"), XML_EXPORTS),
        ];
        for (content_type, expected) in cases {
            let res = handle(&Exports::with_content_type(content_type), &marshalers, request("GET", "/x"));
            assert_eq!(res.status(), StatusCode::OK);
            assert_eq!(
                res.headers().get(CONTENT_TYPE).map(|v| v.to_str().unwrap()),
                content_type,
            );
            assert_eq!(body(res), expected, "content type {content_type:?}");
        }
    }

    #[test]
    fn unknown_content_type_falls_back_to_json_and_keeps_the_header() {
        let res = handle(&Exports::with_content_type(Some("text/csv")), &with_xml(), request("GET", "/x"));
        assert_eq!(res.headers()[CONTENT_TYPE], "text/csv");
        assert_eq!(body(res), JSON_EXPORTS);
    }

    #[test]
    fn encoder_failure_gets_500_and_no_headers() {
        let mut marshalers = Marshalers::new();
        marshalers.register("application/broken", Marshaler::new(|_, _, _| Err("always fails".into())));

        let res = handle(&Exports::with_content_type(Some("application/broken")), &marshalers, request("GET", "/x"));
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(res.headers().is_empty());
        assert!(body(res).is_empty());
    }

    #[test]
    fn reply_headers_are_copied_in_order() {
        let req = http::Request::builder()
            .method("POST")
            .uri("/echo?tag=q")
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Bytes::from_static(b"tag=a&tag=b"))
            .unwrap();

        let res = handle(&Echo, &Marshalers::new(), req);
        assert_eq!(res.status(), StatusCode::CREATED);
        let multi: Vec<_> = res.headers().get_all("x-multi").iter().collect();
        assert_eq!(multi, ["one", "two"]);
        let value: Value = serde_json::from_str(&body(res)).unwrap();
        assert_eq!(value, json!({ "tags": ["a", "b", "q"] }));
    }

    #[test]
    fn context_handlers_receive_form_and_headers() {
        let req = http::Request::builder()
            .method("PUT")
            .uri("/echo?id=7")
            .header("user-agent", "test")
            .body(Bytes::new())
            .unwrap();

        let value: Value = serde_json::from_str(&body(handle(&Echo, &Marshalers::new(), req))).unwrap();
        assert_eq!(value, json!({ "peer": false, "id": "7", "agent": "test" }));
    }

    #[test]
    fn identical_requests_give_identical_responses() {
        let marshalers = with_xml();
        let resource = Exports::with_content_type(Some("application/xml"));
        let first = handle(&resource, &marshalers, request("GET", "/x"));
        let second = handle(&resource, &marshalers, request("GET", "/x"));
        assert_eq!(first.status(), second.status());
        assert_eq!(first.headers(), second.headers());
        assert_eq!(body(first), body(second));
    }
}
