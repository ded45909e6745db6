//! Serving an [`Api`] and graceful shutdown.
//!
//! # Graceful shutdown
//!
//! On **SIGTERM** or **Ctrl-C** the server:
//! 1. Immediately stops `listener.accept()`, so no new connections are made.
//! 2. Lets every in-flight connection task run to completion.
//! 3. Returns `Ok(())` from [`Api::start`] (or `start_addr` / `serve`).

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Limited};
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::config::ApiOption;
use crate::dispatch::{self, HttpResponse};
use crate::error::Error;
use crate::request::RemoteAddr;
use crate::router::{Api, PathTable};

impl Api {
    /// Serves on every interface at `port`. See [`Api::start_addr`].
    pub async fn start(self, port: u16, options: impl IntoIterator<Item = ApiOption>) -> Result<(), Error> {
        self.start_addr(&SocketAddr::from(([0, 0, 0, 0], port)).to_string(), options).await
    }

    /// Applies `options`, binds `addr` (`host:port`) and serves until a
    /// shutdown signal arrives.
    ///
    /// Fails with [`Error::NoResources`] before opening any socket when no
    /// resource was ever added.
    pub async fn start_addr(self, addr: &str, options: impl IntoIterator<Item = ApiOption>) -> Result<(), Error> {
        if !self.has_resources() {
            return Err(Error::NoResources);
        }
        let addr: SocketAddr = addr
            .parse()
            .map_err(|source| Error::Address { addr: addr.to_owned(), source })?;
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener, options).await
    }

    /// Like [`start_addr`](Api::start_addr), on a listener you bound yourself.
    pub async fn serve(mut self, listener: TcpListener, options: impl IntoIterator<Item = ApiOption>) -> Result<(), Error> {
        let Some(table) = self.freeze() else {
            return Err(Error::NoResources);
        };

        for option in options {
            option(&mut self.config);
        }
        let body_limit = self.config.body_limit;
        let marshalers = std::mem::take(&mut self.config.marshalers);
        if self.marshalers.set(marshalers).is_err() {
            warn!("encoders were already in use; start-time encoder options ignored");
        }

        // Wrap the table in Arc so it can be shared across concurrent
        // connection tasks without copying it.
        let table = Arc::new(table);
        let local_addr = listener.local_addr()?;

        info!(addr = %local_addr, "dozy listening");

        let mut tasks = tokio::task::JoinSet::new();

        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                // Check shutdown first so a SIGTERM immediately stops
                // accepting new connections, even if more are queued.
                biased;

                () = &mut shutdown => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let table = Arc::clone(&table);
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        // Called once per request on the connection.
                        let svc = service_fn(move |req| {
                            let table = Arc::clone(&table);
                            async move { route(&table, req, remote_addr, body_limit).await }
                        });

                        // Handles both HTTP/1.1 and HTTP/2, whatever the client negotiates.
                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                // Reap finished connection tasks so the JoinSet does not grow
                // without bound on long-running servers.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}

        info!("dozy stopped");
        Ok(())
    }
}

// ── Request routing ───────────────────────────────────────────────────────────

/// Finds the endpoint bound to the request path and runs it.
///
/// The error type is [`Infallible`](std::convert::Infallible): unbound paths
/// get 404, unreadable bodies and bodies over `body_limit` bytes get 400, so
/// hyper never sees an error.
async fn route(
    table: &PathTable,
    req: hyper::Request<hyper::body::Incoming>,
    remote_addr: SocketAddr,
    body_limit: usize,
) -> Result<HttpResponse, std::convert::Infallible> {
    let endpoint = match table.at(req.uri().path()) {
        Ok(matched) => matched.value.clone(),
        Err(_) => {
            debug!(method = %req.method(), path = req.uri().path(), "no resource bound");
            return Ok(dispatch::empty(http::StatusCode::NOT_FOUND));
        }
    };

    let (mut parts, body) = req.into_parts();
    let body: Bytes = match Limited::new(body, body_limit).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(peer = %remote_addr, "reading request body failed: {e}");
            return Ok(dispatch::empty(http::StatusCode::BAD_REQUEST));
        }
    };
    parts.extensions.insert(RemoteAddr(remote_addr));

    Ok(endpoint.call(http::Request::from_parts(parts, body)))
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first shutdown signal the process receives.
///
/// On Unix this listens for both SIGTERM and SIGINT (Ctrl-C). On Windows only
/// Ctrl-C is available. A handler that cannot be installed never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    // `pending()` never resolves, so on non-Unix platforms the SIGTERM arm
    // is disabled.
    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn start_without_resources_is_a_configuration_error() {
        let err = Api::new().start(0, []).await.unwrap_err();
        assert!(matches!(err, Error::NoResources));
    }

    #[tokio::test]
    async fn no_resources_is_reported_before_the_address_is_read() {
        let err = Api::new().start_addr("not an address", []).await.unwrap_err();
        assert!(matches!(err, Error::NoResources));
    }

    #[tokio::test]
    async fn serve_without_resources_fails_too() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let err = Api::new().serve(listener, []).await.unwrap_err();
        assert!(matches!(err, Error::NoResources));
    }
}
