// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hand-rolled HTTP/1.1 client and server used for the controller-runner
//! link. Both ends only ever speak small JSON bodies over a loopback TCP
//! connection, so this skips everything a general-purpose web stack would
//! carry (keep-alive, chunked transfer, TLS, routing macros) in favor of
//! the same Content-Length-framed request/response shape the teacher's
//! agent adapters already used for their Unix-socket coop client.

mod client;
mod error;
mod message;
mod server;

pub use client::{get, post};
pub use error::TransportError;
pub use message::{read_request, write_response, Method, Request, Response};
pub use server::{serve, BoxFuture, Handler};
