// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A minimal HTTP/1.1 server: accept loop plus one spawned task per
//! connection, following the teacher's `Listener::run`/`handle_connection`
//! shape in `crates/daemon/src/listener/mod.rs`, adapted from its
//! length-prefixed IPC framing to Content-Length-framed HTTP.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::io::BufReader;
use tokio::net::TcpListener;
use tracing::{debug, error};

use crate::error::TransportError;
use crate::message::{self, Request, Response};

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// A request handler. Implemented for any `Fn(Request) -> impl Future<Output
/// = Response>` closure, so routing tables are just a match on
/// `request.path`/`request.method` inside one async fn.
pub trait Handler: Send + Sync + 'static {
    fn handle(&self, request: Request) -> BoxFuture<Response>;
}

impl<F, Fut> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    fn handle(&self, request: Request) -> BoxFuture<Response> {
        Box::pin(self(request))
    }
}

/// Accept connections on `listener` forever, dispatching each to `handler`
/// on its own spawned task. Never returns; callers spawn this as its own
/// tokio task.
pub async fn serve(listener: TcpListener, handler: Arc<dyn Handler>) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                debug!(%peer, "accepted connection");
                let handler = Arc::clone(&handler);
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, handler).await {
                        error!(error = %e, "connection error");
                    }
                });
            }
            Err(e) => error!(error = %e, "accept failed"),
        }
    }
}

async fn handle_connection(
    stream: tokio::net::TcpStream,
    handler: Arc<dyn Handler>,
) -> Result<(), TransportError> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let request = message::read_request(&mut reader).await?;
    let response = handler.handle(request).await;
    message::write_response(&mut write_half, &response).await
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
