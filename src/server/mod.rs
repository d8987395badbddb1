//! Async TCP server using Tokio.
//!
//! A minimal HTTP/1.1 layer around an [`App`]: it accepts connections, parses requests,
//! dispatches them and writes the outcome back. Persistent connections (keep-alive) are
//! supported; bodies are read according to `Content-Length`.

use std::net::SocketAddr;

use bytes::{Bytes, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::app::App;
use crate::http::{
    Request, Response, ResponseWriter, StatusCode,
    request::RequestError,
};

/// Errors produced by the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Maximum size of a complete HTTP request we will buffer before rejecting it (8 MiB).
const MAX_REQUEST_SIZE: usize = 8 * 1024 * 1024;

/// Initial read buffer capacity per connection.
const INITIAL_BUF_SIZE: usize = 4096;

/// Dispatches `request` through `app` and settles on the response to write.
///
/// A response sent through the [`ResponseWriter`] wins over a returned one; when the app
/// handles nothing the answer is `404 Not Found`. A dispatch error is logged and answered
/// with its status and the canonical reason phrase. Headers staged on the writer are added
/// to whichever response is chosen.
pub async fn respond(app: &App, request: Request) -> Response {
    let res = ResponseWriter::new();
    let method = request.method().clone();
    let url = request.url().to_owned();

    let mut response = match app.dispatch(request, res.clone()).await {
        Ok(returned) => match (res.take(), returned) {
            (Some(sent), _) => sent,
            (None, Some(returned)) => returned,
            (None, None) => {
                let status = StatusCode::NotFound;
                Response::text(status, status.canonical_reason())
            }
        },
        Err(err) => {
            let status = err.status();
            if status.is_server_error() {
                error!(%method, %url, %status, error = %err, "request failed");
            } else {
                warn!(%method, %url, %status, error = %err, "request rejected");
            }
            Response::text(status, status.canonical_reason())
        }
    };
    response.headers_mut().fill_from(&res.staged_headers());
    response
}

/// The HTTP server driving an [`App`].
///
/// # Examples
///
/// ```rust,no_run
/// use rttp_router::context::Context;
/// use rttp_router::router::Route;
/// use rttp_router::{App, Response, Server, StatusCode};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let app = App::new(vec![Route::get("/", |_ctx: Context| async {
///         Ok(Some(Response::text(StatusCode::Ok, "Hello!")))
///     })])?;
///     let server = Server::bind("127.0.0.1:8080").await?;
///     server.serve(app).await?;
///     Ok(())
/// }
/// ```
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl Server {
    /// Binds the server to the given TCP address.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address cannot be bound
    /// (e.g. port already in use, insufficient permissions).
    pub async fn bind(addr: impl AsRef<str>) -> Result<Self, ServerError> {
        let addr = addr.as_ref();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: addr.to_owned(),
                source: e,
            })?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Starts accepting connections and dispatching their requests through `app`.
    ///
    /// Each connection runs on its own Tokio task sharing the compiled route table. Runs
    /// until the process is terminated.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Io`] if the TCP listener itself fails.
    pub async fn serve(self, app: App) -> Result<(), ServerError> {
        info!(address = %self.local_addr, routes = app.len(), "rttp listening");

        loop {
            let (stream, peer_addr) = match self.listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    error!(error = %e, "failed to accept connection");
                    continue;
                }
            };

            debug!(peer = %peer_addr, "connection accepted");
            let app = app.clone();

            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, peer_addr, app).await {
                    warn!(peer = %peer_addr, error = %e, "connection closed with error");
                }
            });
        }
    }
}

/// Handles a single TCP connection over its lifetime.
///
/// HTTP/1.1 connections are persistent by default: we loop, reading one
/// request per iteration, until the peer closes the connection or signals
/// `Connection: close`.
async fn handle_connection(
    mut stream: TcpStream,
    peer_addr: SocketAddr,
    app: App,
) -> Result<(), std::io::Error> {
    let mut buf = BytesMut::with_capacity(INITIAL_BUF_SIZE);

    loop {
        // Pipelined requests may already be buffered; only read when nothing parses.
        let parsed = if buf.is_empty() {
            Err(RequestError::Incomplete)
        } else {
            Request::parse(&buf)
        };

        let (request, body_offset) = match parsed {
            Ok(pair) => pair,
            Err(RequestError::Incomplete) => {
                if buf.len() > MAX_REQUEST_SIZE {
                    warn!(peer = %peer_addr, "request too large, sending 413");
                    reject(&mut stream, StatusCode::PayloadTooLarge, "Request entity too large")
                        .await?;
                    break;
                }
                if stream.read_buf(&mut buf).await? == 0 {
                    debug!(peer = %peer_addr, "connection closed by peer");
                    break;
                }
                continue;
            }
            Err(e) => {
                warn!(peer = %peer_addr, error = %e, "bad request, sending 400");
                reject(&mut stream, StatusCode::BadRequest, &format!("Bad Request: {e}")).await?;
                break;
            }
        };

        // Wait for the full body to arrive if Content-Length is set.
        let content_length = request.content_length().unwrap_or(0);
        let total_needed = body_offset + content_length;
        if total_needed > MAX_REQUEST_SIZE {
            warn!(peer = %peer_addr, content_length, "request too large, sending 413");
            reject(&mut stream, StatusCode::PayloadTooLarge, "Request entity too large").await?;
            break;
        }
        if buf.len() < total_needed {
            if stream.read_buf(&mut buf).await? == 0 {
                debug!(peer = %peer_addr, "connection closed mid-body");
                break;
            }
            continue;
        }

        let mut consumed = buf.split_to(total_needed);
        let body: Bytes = consumed.split_off(body_offset).freeze();
        let request = request.with_body(body);
        let keep_alive = request.is_keep_alive();

        debug!(
            peer = %peer_addr,
            method = %request.method(),
            path = %request.path(),
            "dispatching request"
        );

        let response = respond(&app, request).await.keep_alive(keep_alive);
        stream.write_all(&response.into_bytes()).await?;
        stream.flush().await?;

        if !keep_alive {
            debug!(peer = %peer_addr, "Connection: close, shutting down");
            break;
        }
    }

    Ok(())
}

async fn reject(stream: &mut TcpStream, status: StatusCode, message: &str) -> std::io::Result<()> {
    let response = Response::text(status, message).keep_alive(false);
    stream.write_all(&response.into_bytes()).await
}
