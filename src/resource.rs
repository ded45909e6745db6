//! Resources, their verb capabilities, and capability resolution.
//!
//! # Capabilities
//!
//! Every verb comes in three calling conventions. A resource implements
//! whichever fits the handler it needs, for whichever verbs it answers:
//!
//! | Trait | Handler receives |
//! |---|---|
//! | `Get`, `Post`, ... | decoded [`Form`] values and request headers |
//! | `GetRequest`, `PostRequest`, ... | the whole [`Request`] |
//! | `GetContext`, `PostContext`, ... | a [`Context`], form values and headers |
//!
//! The server only ever sees a `dyn Resource`, so a resource announces what
//! it implements through the `as_*` accessors of [`Resource`]. The
//! [`resource!`](crate::resource!) macro writes them for you:
//!
//! ```rust
//! use dozy::{Form, Get, PostRequest, Reply, Request, resource};
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
//! impl PostRequest for Items {
//!     fn post(&self, request: &Request) -> Reply {
//!         Reply::ok(json!({ "received": request.body().len() }))
//!     }
//! }
//!
//! resource!(Items: Get, PostRequest);
//! ```
//!
//! # Resolution
//!
//! [`resolve`] turns a verb and a resource into one canonical [`Handler`]:
//! a boxed `Fn(&Request) -> Reply`. When a resource implements several
//! conventions for the same verb, the first one in this order wins:
//! context, form values + headers, raw request.

use http::HeaderMap;

use crate::form::Form;
use crate::method::Method;
use crate::reply::Reply;
use crate::request::{Context, Request};

/// The canonical handler shape every calling convention is adapted into.
pub type Handler<'r> = Box<dyn Fn(&Request) -> Reply + Send + Sync + 'r>;

macro_rules! capabilities {
    ($(
        $verb:ident => $method:ident {
            form: $Form:ident / $as_form:ident,
            request: $Raw:ident / $as_raw:ident,
            context: $Ctx:ident / $as_ctx:ident $(,)?
        }
    )*) => {
        $(
            #[doc = concat!("Answers `", stringify!($verb), "` requests with decoded form values and request headers.")]
            pub trait $Form: Send + Sync {
                fn $method(&self, form: &Form, headers: &HeaderMap) -> Reply;
            }

            #[doc = concat!("Answers `", stringify!($verb), "` requests with the whole request.")]
            pub trait $Raw: Send + Sync {
                fn $method(&self, request: &Request) -> Reply;
            }

            #[doc = concat!("Answers `", stringify!($verb), "` requests with a request context, form values and headers.")]
            pub trait $Ctx: Send + Sync {
                fn $method(&self, ctx: &Context<'_>, form: &Form, headers: &HeaderMap) -> Reply;
            }
        )*

        /// An object bound to one or more paths.
        ///
        /// Each accessor reports whether the resource implements one calling
        /// convention for one verb. They all default to `None`, so a resource
        /// with no overrides answers every request with `405`. Use
        /// [`resource!`](crate::resource!) rather than writing these by hand.
        ///
        /// A resource is shared by every concurrent request on its paths.
        /// Interior mutability is the resource's own business.
        pub trait Resource: Send + Sync + 'static {
            $(
                fn $as_ctx(&self) -> Option<&dyn $Ctx> { None }
                fn $as_form(&self) -> Option<&dyn $Form> { None }
                fn $as_raw(&self) -> Option<&dyn $Raw> { None }
            )*
        }

        /// Finds the handler `resource` exposes for `method`, adapted to the
        /// canonical shape. `None` means the resource does not answer that verb.
        pub fn resolve(method: Method, resource: &dyn Resource) -> Option<Handler<'_>> {
            match method {
                $(
                    Method::$verb => {
                        if let Some(h) = resource.$as_ctx() {
                            return Some(Box::new(move |req: &Request| {
                                h.$method(&req.context(), req.form(), req.headers())
                            }));
                        }
                        if let Some(h) = resource.$as_form() {
                            return Some(Box::new(move |req: &Request| h.$method(req.form(), req.headers())));
                        }
                        if let Some(h) = resource.$as_raw() {
                            return Some(Box::new(move |req: &Request| h.$method(req)));
                        }
                        None
                    }
                )*
            }
        }
    };
}

capabilities! {
    Get => get {
        form: Get / as_get,
        request: GetRequest / as_get_request,
        context: GetContext / as_get_context,
    }
    Post => post {
        form: Post / as_post,
        request: PostRequest / as_post_request,
        context: PostContext / as_post_context,
    }
    Put => put {
        form: Put / as_put,
        request: PutRequest / as_put_request,
        context: PutContext / as_put_context,
    }
    Delete => delete {
        form: Delete / as_delete,
        request: DeleteRequest / as_delete_request,
        context: DeleteContext / as_delete_context,
    }
    Head => head {
        form: Head / as_head,
        request: HeadRequest / as_head_request,
        context: HeadContext / as_head_context,
    }
    Patch => patch {
        form: Patch / as_patch,
        request: PatchRequest / as_patch_request,
        context: PatchContext / as_patch_context,
    }
}

/// Implements [`Resource`] for a type, announcing the capability traits it
/// implements.
///
/// ```rust
/// # use dozy::{Form, Reply, resource};
/// # use http::HeaderMap;
/// struct Health;
///
/// impl dozy::Get for Health {
///     fn get(&self, _: &Form, _: &HeaderMap) -> Reply {
///         Reply::ok("ok")
///     }
/// }
///
/// resource!(Health: Get);
/// ```
///
/// A type listed with no capabilities answers every verb with `405`:
/// `resource!(Nothing:);`
#[macro_export]
macro_rules! resource {
    ($ty:ty : $($cap:ident),* $(,)?) => {
        impl $crate::Resource for $ty {
            $( $crate::__capability_accessor!($cap); )*
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __capability_accessor {
    (@as $name:ident $Trait:ident) => {
        fn $name(&self) -> ::core::option::Option<&dyn $crate::$Trait> {
            ::core::option::Option::Some(self)
        }
    };
    (Get)           => { $crate::__capability_accessor!(@as as_get Get); };
    (GetRequest)    => { $crate::__capability_accessor!(@as as_get_request GetRequest); };
    (GetContext)    => { $crate::__capability_accessor!(@as as_get_context GetContext); };
    (Post)          => { $crate::__capability_accessor!(@as as_post Post); };
    (PostRequest)   => { $crate::__capability_accessor!(@as as_post_request PostRequest); };
    (PostContext)   => { $crate::__capability_accessor!(@as as_post_context PostContext); };
    (Put)           => { $crate::__capability_accessor!(@as as_put Put); };
    (PutRequest)    => { $crate::__capability_accessor!(@as as_put_request PutRequest); };
    (PutContext)    => { $crate::__capability_accessor!(@as as_put_context PutContext); };
    (Delete)        => { $crate::__capability_accessor!(@as as_delete Delete); };
    (DeleteRequest) => { $crate::__capability_accessor!(@as as_delete_request DeleteRequest); };
    (DeleteContext) => { $crate::__capability_accessor!(@as as_delete_context DeleteContext); };
    (Head)          => { $crate::__capability_accessor!(@as as_head Head); };
    (HeadRequest)   => { $crate::__capability_accessor!(@as as_head_request HeadRequest); };
    (HeadContext)   => { $crate::__capability_accessor!(@as as_head_context HeadContext); };
    (Patch)         => { $crate::__capability_accessor!(@as as_patch Patch); };
    (PatchRequest)  => { $crate::__capability_accessor!(@as as_patch_request PatchRequest); };
    (PatchContext)  => { $crate::__capability_accessor!(@as as_patch_context PatchContext); };
}
