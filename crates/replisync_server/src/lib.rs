//! # Replisync Server
//!
//! Transport-agnostic sync endpoint for replisync.
//!
//! This crate provides:
//! - Routing of `GET`/`POST` on the sync endpoint to pull and push
//! - Mapping of engine outcomes to HTTP status codes and JSON bodies
//! - Request size limits
//!
//! # Protocol
//!
//! - `GET /sync/?last_pulled_at=<ms>` returns the changes since the cursor
//!   and a new cursor; without a cursor (or with `null`) a full snapshot
//! - `POST /sync/` with `{"changes": {...}}` applies a batch and answers
//!   `{"status": "success"}` or, with status 400, `{"errors": [...]}`
//!
//! Malformed requests are answered with 400 and `{"error": ...}` before the
//! store is touched. Store failures are answered with 500 and no details.

#![deny(unsafe_code)]
#![warn(missing_docs)]
// Production code MUST NOT use panic!/unwrap()/expect()
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

mod config;
mod error;
mod handler;
mod server;

pub use config::{ServerConfig, DEFAULT_MAX_BODY_BYTES};
pub use error::{ServerError, ServerResult};
pub use handler::{query_param, HandlerContext, HttpResponse, RequestHandler, CURSOR_PARAM};
pub use server::SyncServer;
