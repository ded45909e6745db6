//! Unified error type.

use std::net::AddrParseError;

/// The error type returned when an [`Api`](crate::Api) cannot start or stops
/// serving abnormally.
///
/// Request-level problems (malformed forms, unsupported verbs, encoder
/// failures) never show up here. They are answered with `400`, `405` and
/// `500` responses instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// `start` was called before any resource was added.
    #[error("you must add at least one resource to this API")]
    NoResources,

    #[error("invalid listen address `{addr}`: {source}")]
    Address {
        addr: String,
        #[source]
        source: AddrParseError,
    },

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}
