//! # dozy
//!
//! A small resource-oriented REST layer on top of hyper.
//!
//! Bind plain Rust objects to paths. Each object opts into the verbs it
//! answers by implementing capability traits ([`Get`], [`PostRequest`],
//! [`PutContext`], ...). dozy works out which verb a request wants, calls
//! the matching handler, and serialises whatever value it returns with the
//! encoder registered for the reply's `Content-Type` (JSON by default).
//!
//! | Situation | Response |
//! |---|---|
//! | query string or form body cannot be decoded | `400`, empty body |
//! | resource does not implement the verb | `405`, empty body |
//! | encoder fails | `500`, empty body |
//! | otherwise | handler's status, headers and encoded body |
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use dozy::{Api, Form, Get, Reply, resource, with_marshaler};
//! use http::HeaderMap;
//! use serde_json::json;
//!
//! struct Items;
//!
//! impl Get for Items {
//!     fn get(&self, _form: &Form, _headers: &HeaderMap) -> Reply {
//!         Reply::ok(json!({ "items": ["item1", "item2"] }))
//!     }
//! }
//!
//! resource!(Items: Get);
//!
//! #[tokio::main]
//! async fn main() -> Result<(), dozy::Error> {
//!     let api = Api::new();
//!     api.add_resource(Items, &["/items"]);
//!     api.start(3000, [
//!         with_marshaler("text/plain", |value, _, _| Ok(value.to_string().into_bytes())),
//!     ]).await
//! }
//! ```

mod config;
mod dispatch;
mod error;
mod form;
mod marshal;
mod method;
mod reply;
mod request;
mod resource;
mod router;
mod server;

pub use config::{ApiOption, Config, DEFAULT_BODY_LIMIT, with_body_limit, with_marshaler};
pub use dispatch::{Endpoint, HttpRequest, HttpResponse, handle};
pub use error::Error;
pub use form::{Form, FormError};
pub use marshal::{APPLICATION_JSON, MarshalError, Marshaler, Marshalers, json_indent};
pub use method::Method;
pub use reply::Reply;
pub use request::{Context, Request};
pub use resource::{
    Delete, DeleteContext, DeleteRequest, Get, GetContext, GetRequest, Handler, Head, HeadContext,
    HeadRequest, Patch, PatchContext, PatchRequest, Post, PostContext, PostRequest, Put, PutContext,
    PutRequest, Resource, resolve,
};
pub use router::Api;
