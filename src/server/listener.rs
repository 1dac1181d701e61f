use crate::config::ServerConfig;
use crate::error::PutterError;
use crate::server::pipeline::{self, AppState};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::{TokioIo, TokioTimer};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

/// Pause after a failed accept (e.g. out of file descriptors) before retrying.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(10);

/// Bind `config.bind_addr` and serve forever.
pub async fn run(config: ServerConfig) -> Result<(), PutterError> {
    // Fails fast if the address is in use or invalid
    let listener = TcpListener::bind(config.bind_addr).await?;
    serve(listener, config).await
}

/// Serve HTTP/1 on an already-bound listener.
///
/// Architecture:
/// - One background task drains the history queue for the life of the server
/// - Main loop accepts connections
/// - Each connection is spawned into an independent, detached task
/// - Each request on a connection runs the pipeline handler
///
/// No error after startup stops the server: accept failures are logged and
/// retried, connection failures end only that connection.
pub async fn serve(listener: TcpListener, config: ServerConfig) -> Result<(), PutterError> {
    let (state, consumer) = AppState::new(&config)?;
    tokio::spawn(consumer.run());

    let local_addr = listener.local_addr()?;
    let max_header_bytes = config.max_header_bytes();
    info!(
        addr = %local_addr,
        history_capacity = config.history_capacity,
        digest_mode = ?config.digest_mode(),
        max_header_bytes,
        inflight_limit = config.initial_inflight_limit,
        "putter listening"
    );

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(error = %e, "accept failed");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
                continue;
            }
        };
        debug!(%peer, "accepted connection");

        let state: Arc<AppState> = Arc::clone(&state);
        tokio::spawn(async move {
            let io = TokioIo::new(stream);
            let service = service_fn(move |req: Request<Incoming>| {
                pipeline::handle(Arc::clone(&state), req)
            });

            let mut builder = http1::Builder::new();
            builder.timer(TokioTimer::new()).max_buf_size(max_header_bytes);

            if let Err(e) = builder.serve_connection(io, service).await {
                // Client resets and oversized headers land here
                debug!(%peer, error = %e, "connection ended with error");
            }
        });
    }
}
