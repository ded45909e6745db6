//! Start-time options.
//!
//! Options are plain functions over [`Config`], applied in order when the
//! API starts:
//!
//! ```rust,no_run
//! # async fn run(api: dozy::Api) -> Result<(), dozy::Error> {
//! use dozy::with_marshaler;
//!
//! api.start(3000, [
//!     with_marshaler("text/plain", |value, _prefix, _indent| Ok(value.to_string().into_bytes())),
//! ]).await
//! # }
//! ```

use serde_json::Value;

use crate::marshal::{MarshalError, Marshaler, Marshalers};

/// An option applied by [`Api::start`](crate::Api::start) and friends.
pub type ApiOption = Box<dyn FnOnce(&mut Config) + Send>;

/// Request bodies larger than this get `400 Bad Request` unless
/// [`with_body_limit`] says otherwise.
pub const DEFAULT_BODY_LIMIT: usize = 10 << 20;

/// Settings frozen when the API starts serving.
#[derive(Debug)]
pub struct Config {
    pub marshalers: Marshalers,
    /// Largest request body read into memory, in bytes.
    pub body_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self { marshalers: Marshalers::default(), body_limit: DEFAULT_BODY_LIMIT }
    }
}

/// Registers `encode` for `content_type`, replacing any previous encoder for it.
pub fn with_marshaler<F>(content_type: impl Into<String>, encode: F) -> ApiOption
where
    F: Fn(&Value, &str, &str) -> Result<Vec<u8>, MarshalError> + Send + Sync + 'static,
{
    let content_type = content_type.into();
    let marshaler = Marshaler::new(encode);
    Box::new(move |config: &mut Config| config.marshalers.register(content_type, marshaler))
}

/// Caps request bodies at `bytes`. Larger bodies are answered with
/// `400 Bad Request` before any resource runs.
pub fn with_body_limit(bytes: usize) -> ApiOption {
    Box::new(move |config: &mut Config| config.body_limit = bytes)
}
