//! Socket adapter: feeds hyper connections into [`App::fetch`].
//!
//! The dispatch core never touches a socket. [`App::fetch`] maps a buffered
//! [`Request`] to a [`Response`], and the in-process caller reuses it with no
//! server at all. This module only buffers request bodies and manages the
//! listener's lifetime.
//!
//! # Shutdown
//!
//! On SIGTERM or Ctrl-C the listener stops accepting at once, connections
//! already accepted keep being served until they close, and
//! [`Server::serve`] returns once the last one has finished.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::app::App;
use crate::error::Error;
use crate::request::Request;
use crate::response::Response;

/// Listens for HTTP connections and hands every request to an [`App`].
pub struct Server {
    addr: SocketAddr,
}

impl Server {
    /// The address [`serve`](Server::serve) will listen on.
    ///
    /// ```rust,no_run
    /// use tsu_rpc::Server;
    /// let server = Server::bind("0.0.0.0:3000")?;
    /// # Ok::<(), tsu_rpc::Error>(())
    /// ```
    pub fn bind(addr: &str) -> Result<Self, Error> {
        Ok(Self { addr: addr.parse()? })
    }

    /// Serves `app` until a shutdown signal arrives and every open
    /// connection has drained.
    pub async fn serve(self, app: App) -> Result<(), Error> {
        let listener = TcpListener::bind(self.addr).await?;

        let app = Arc::new(app);

        info!(addr = %self.addr, "tsu-rpc listening");

        let mut tasks = tokio::task::JoinSet::new();

        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                // Shutdown wins over queued connections.
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

                    let app = Arc::clone(&app);
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        let svc = service_fn(move |req| {
                            let app = Arc::clone(&app);
                            async move { dispatch(&app, req).await }
                        });

                        // HTTP/1.1 or HTTP/2, as negotiated.
                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                // Reap finished connections.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}

        info!("tsu-rpc stopped");
        Ok(())
    }
}

/// Buffers one request body and runs it through the app. Never fails from
/// hyper's point of view: every problem becomes a response.
async fn dispatch(
    app: &App,
    req: hyper::Request<hyper::body::Incoming>,
) -> Result<http::Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            error!(path = parts.uri.path(), "failed to read request body: {e}");
            return Ok(Response::builder()
                .status(http::StatusCode::BAD_REQUEST)
                .text("Bad Request")
                .into_http());
        }
    };

    let req = Request::new(parts.method, parts.uri, parts.headers, body);
    Ok(app.fetch(req).await.into_http())
}

/// Resolves on SIGTERM (Unix) or Ctrl-C. A handler that cannot be installed
/// is logged and never fires.
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

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}
