//! The request as resources see it.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use bytes::Bytes;
use http::request::Parts;
use http::{Extensions, HeaderMap, Uri};

use crate::form::Form;

/// Peer address of the connection a request arrived on.
///
/// The server stores it in the request extensions; [`Context::remote_addr`]
/// and [`Request::remote_addr`] read it back.
#[derive(Clone, Copy, Debug)]
pub(crate) struct RemoteAddr(pub(crate) SocketAddr);

/// An incoming request with its body fully read and its form decoded.
///
/// Handed to the raw-request calling convention (`GetRequest`,
/// `PostRequest`, ...).
pub struct Request {
    parts: Parts,
    body: Bytes,
    form: Form,
    received_at: Instant,
}

impl Request {
    pub(crate) fn new(parts: Parts, body: Bytes, form: Form) -> Self {
        Self { parts, body, form, received_at: Instant::now() }
    }

    pub fn method(&self) -> &http::Method { &self.parts.method }
    pub fn uri(&self) -> &Uri { &self.parts.uri }
    pub fn path(&self) -> &str { self.parts.uri.path() }
    pub fn query(&self) -> Option<&str> { self.parts.uri.query() }
    pub fn headers(&self) -> &HeaderMap { &self.parts.headers }
    pub fn body(&self) -> &[u8] { &self.body }
    pub fn form(&self) -> &Form { &self.form }
    pub fn extensions(&self) -> &Extensions { &self.parts.extensions }

    /// Header lookup. Names are case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.parts.headers.get(name)?.to_str().ok()
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.parts.extensions.get::<RemoteAddr>().map(|addr| addr.0)
    }

    /// Request-scoped view handed to the context-carrying calling convention.
    pub fn context(&self) -> Context<'_> {
        Context { request: self }
    }
}

/// Request-scoped data for the context-carrying calling convention
/// (`GetContext`, `PostContext`, ...).
///
/// Wrappers passed to
/// [`Api::add_resource_with_wrapper`](crate::Api::add_resource_with_wrapper)
/// can put typed values into the request extensions; handlers read them here
/// with [`Context::get`].
#[derive(Clone, Copy)]
pub struct Context<'r> {
    request: &'r Request,
}

impl<'r> Context<'r> {
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.request.remote_addr()
    }

    /// Time since the dispatcher started on this request.
    pub fn elapsed(&self) -> Duration {
        self.request.received_at.elapsed()
    }

    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&'r T> {
        self.request.parts.extensions.get::<T>()
    }
}
