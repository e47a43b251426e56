//! Listener loop: accept connections, hand each off to `handler::route` over
//! plain HTTP/1.1.

use std::net::SocketAddr;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::handler::{self, AppState};

/// Bind `addr` and serve the API until the process is killed or the caller
/// drops the returned future.
///
/// Each accepted connection is handled on its own spawned task; a slow or
/// stalled client only ever blocks its own connection.
pub async fn serve(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, backend = state.store.backend_name(), "orchestrator HTTP API listening");

    loop {
        let (stream, peer) = listener.accept().await?;
        debug!(%peer, "accepted connection");

        let state = state.clone();
        tokio::spawn(async move {
            let io = TokioIo::new(stream);
            let service = service_fn(move |req| handler::route(req, state.clone()));

            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                let message = err.to_string();
                if message.contains("connection closed before message completed") {
                    debug!(%peer, "client disconnected");
                } else {
                    error!(%peer, error = %message, "error serving connection");
                }
            }
        });
    }
}
