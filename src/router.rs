//! Path bindings.
//!
//! An [`Api`] binds resources to exact paths. The path table is created the
//! first time a resource is added, exactly once even when several threads
//! add resources at the same moment, and is frozen when the API starts.

use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use matchit::Router as MatchitRouter;
use tracing::debug;

use crate::config::Config;
use crate::dispatch::{self, Endpoint};
use crate::marshal::Marshalers;
use crate::resource::Resource;

pub(crate) type PathTable = MatchitRouter<Endpoint>;

/// A group of resources served on one listener.
///
/// Add resources during setup, then call [`Api::start`]. Several APIs can
/// run side by side on different ports, each with its own resources and
/// encoders.
///
/// ```rust,no_run
/// use dozy::{Api, Form, Get, Reply, resource};
/// use http::HeaderMap;
/// use serde_json::json;
///
/// struct Items;
///
/// impl Get for Items {
///     fn get(&self, _form: &Form, _headers: &HeaderMap) -> Reply {
///         Reply::ok(json!({ "items": ["item1", "item2"] }))
///     }
/// }
///
/// resource!(Items: Get);
///
/// #[tokio::main]
/// async fn main() -> Result<(), dozy::Error> {
///     let api = Api::new();
///     api.add_resource(Items, &["/items", "/bar", "/baz"]);
///     api.start(3000, []).await
/// }
/// ```
pub struct Api {
    paths: OnceLock<Mutex<PathTable>>,
    pub(crate) marshalers: Arc<OnceLock<Marshalers>>,
    pub(crate) config: Config,
}

impl Api {
    pub fn new() -> Self {
        Self {
            paths: OnceLock::new(),
            marshalers: Arc::new(OnceLock::new()),
            config: Config::default(),
        }
    }

    /// Binds `resource` to every path in `paths`.
    ///
    /// Paths match exactly; `{` and `}` carry no special meaning.
    ///
    /// # Panics
    ///
    /// Panics if a path is already bound.
    pub fn add_resource(&self, resource: impl Resource, paths: &[&str]) {
        self.add_resource_with_wrapper(resource, |endpoint| endpoint, paths);
    }

    /// Like [`add_resource`](Api::add_resource), but every generated
    /// endpoint goes through `wrapper` before it is bound. Use it to hook in
    /// compression, request-scoped values and the like.
    ///
    /// # Panics
    ///
    /// Panics if a path is already bound.
    pub fn add_resource_with_wrapper<W>(&self, resource: impl Resource, wrapper: W, paths: &[&str])
    where
        W: Fn(Endpoint) -> Endpoint,
    {
        let resource: Arc<dyn Resource> = Arc::new(resource);
        let mut table = self.paths().lock().unwrap_or_else(PoisonError::into_inner);

        for path in paths {
            let endpoint = wrapper(dispatch::endpoint(Arc::clone(&resource), Arc::clone(&self.marshalers)));
            table
                .insert(literal(path), endpoint)
                .unwrap_or_else(|e| panic!("invalid path `{path}`: {e}"));
            debug!(path, "resource bound");
        }
    }

    /// Whether any resource was ever added.
    pub fn has_resources(&self) -> bool {
        self.paths.get().is_some()
    }

    fn paths(&self) -> &Mutex<PathTable> {
        self.paths.get_or_init(|| {
            debug!("path table created");
            Mutex::new(PathTable::new())
        })
    }

    /// Takes the path table out for serving. `None` if nothing was added.
    pub(crate) fn freeze(&mut self) -> Option<PathTable> {
        let table = self.paths.take()?;
        Some(table.into_inner().unwrap_or_else(PoisonError::into_inner))
    }
}

impl Default for Api {
    fn default() -> Self { Self::new() }
}

/// Escapes `path` so matchit treats every character literally.
fn literal(path: &str) -> String {
    path.replace('{', "{{").replace('}', "}}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::Form;
    use crate::reply::Reply;
    use crate::resource::Get;
    use bytes::Bytes;
    use http::{HeaderMap, HeaderValue, StatusCode};
    use serde_json::json;

    struct Named(&'static str);

    impl Get for Named {
        fn get(&self, _: &Form, _: &HeaderMap) -> Reply {
            Reply::ok(json!(self.0))
        }
    }

    crate::resource!(Named: Get);

    fn get(table: &PathTable, path: &str) -> Option<(StatusCode, HeaderMap)> {
        let endpoint = table.at(path).ok()?.value;
        let req = http::Request::builder().uri(path).body(Bytes::new()).unwrap();
        let res = endpoint.call(req);
        Some((res.status(), res.headers().clone()))
    }

    #[test]
    fn table_is_created_on_first_add() {
        let mut api = Api::new();
        assert!(!api.has_resources());
        assert!(api.freeze().is_none());

        api.add_resource(Named("items"), &["/items", "/bar"]);
        assert!(api.has_resources());

        let table = api.freeze().unwrap();
        assert_eq!(get(&table, "/items").unwrap().0, StatusCode::OK);
        assert_eq!(get(&table, "/bar").unwrap().0, StatusCode::OK);
        assert!(get(&table, "/baz").is_none());
        assert!(get(&table, "/items/").is_none());
    }

    #[test]
    fn braces_are_literal() {
        let mut api = Api::new();
        api.add_resource(Named("literal"), &["/users/{id}"]);
        let table = api.freeze().unwrap();
        assert!(table.at("/users/{id}").is_ok());
        assert!(table.at("/users/42").is_err());
    }

    #[test]
    fn wrapper_decorates_every_path() {
        let mut api = Api::new();
        api.add_resource_with_wrapper(
            Named("wrapped"),
            |inner| {
                Endpoint::new(move |req| {
                    let mut res = inner.call(req);
                    res.headers_mut().insert("x-wrapped", HeaderValue::from_static("yes"));
                    res
                })
            },
            &["/a", "/b"],
        );
        let table = api.freeze().unwrap();
        for path in ["/a", "/b"] {
            let (status, headers) = get(&table, path).unwrap();
            assert_eq!(status, StatusCode::OK);
            assert_eq!(headers["x-wrapped"], "yes");
        }
    }

    #[test]
    #[should_panic(expected = "invalid path `/dup`")]
    fn binding_a_path_twice_panics() {
        let api = Api::new();
        api.add_resource(Named("one"), &["/dup"]);
        api.add_resource(Named("two"), &["/dup"]);
    }

    #[test]
    fn concurrent_first_use_builds_one_table() {
        let mut api = Api::new();
        std::thread::scope(|s| {
            for i in 0..8 {
                let api = &api;
                s.spawn(move || {
                    let path = format!("/r{i}");
                    api.add_resource(Named("concurrent"), &[path.as_str()]);
                });
            }
        });

        let table = api.freeze().unwrap();
        for i in 0..8 {
            assert!(get(&table, &format!("/r{i}")).is_some(), "/r{i} missing");
        }
    }
}
