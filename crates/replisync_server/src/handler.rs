//! Request handlers for sync endpoints.

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use replisync_core::RecordStore;
use replisync_engine::SyncCoordinator;
use replisync_protocol::{PullResponse, PushRequest, PushResponse};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Name of the query parameter carrying the pull cursor.
pub const CURSOR_PARAM: &str = "last_pulled_at";

/// A transport-neutral HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// JSON body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Creates a response.
    pub fn new(status: u16, body: Vec<u8>) -> Self {
        Self { status, body }
    }

    /// Creates the response for an error.
    pub fn from_error(err: &ServerError) -> Self {
        if err.is_server_error() {
            error!(error = %err, "request failed");
        } else {
            debug!(error = %err, "request rejected");
        }
        let body = json!({ "error": err.public_message() }).to_string();
        Self::new(err.status(), body.into_bytes())
    }

    /// Returns the body parsed as JSON.
    pub fn json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_slice(&self.body)
    }

    /// Returns true for 2xx responses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Context for request handling.
pub struct HandlerContext<S: RecordStore> {
    /// Server configuration.
    pub config: ServerConfig,
    /// Coordinator over the shared store.
    pub coordinator: SyncCoordinator<S>,
}

impl<S: RecordStore> HandlerContext<S> {
    /// Creates a new handler context.
    pub fn new(config: ServerConfig, store: Arc<S>) -> Self {
        let coordinator = SyncCoordinator::with_config(store, config.engine.clone());
        Self {
            config,
            coordinator,
        }
    }
}

/// Handler for sync requests.
pub struct RequestHandler<S: RecordStore> {
    context: Arc<HandlerContext<S>>,
}

impl<S: RecordStore> RequestHandler<S> {
    /// Creates a new request handler.
    pub fn new(context: Arc<HandlerContext<S>>) -> Self {
        Self { context }
    }

    /// Returns the handler context.
    pub fn context(&self) -> &Arc<HandlerContext<S>> {
        &self.context
    }

    /// Handles a pull given the raw query string.
    pub fn handle_pull(&self, query: Option<&str>) -> ServerResult<PullResponse> {
        let cursor = query.and_then(|q| query_param(q, CURSOR_PARAM));
        Ok(self.context.coordinator.pull(cursor.as_deref())?)
    }

    /// Handles a push given the raw request body.
    pub fn handle_push(&self, body: &[u8]) -> ServerResult<PushResponse> {
        let limit = self.context.config.max_body_bytes;
        if body.len() > limit {
            return Err(ServerError::PayloadTooLarge {
                size: body.len(),
                limit,
            });
        }
        let request = PushRequest::decode(body)?;
        let response = self.context.coordinator.push(&request)?;
        if !response.is_success() {
            warn!(failed = response.errors().len(), "push completed with item errors");
        }
        Ok(response)
    }

    /// Handles a pull and renders the HTTP response.
    pub fn pull_response(&self, query: Option<&str>) -> HttpResponse {
        let rendered = self
            .handle_pull(query)
            .and_then(|response| response.encode().map_err(ServerError::from));
        match rendered {
            Ok(body) => HttpResponse::new(200, body),
            Err(err) => HttpResponse::from_error(&err),
        }
    }

    /// Handles a push and renders the HTTP response.
    ///
    /// A push with item errors is answered with 400 and the error list; the
    /// items that succeeded are committed nonetheless.
    pub fn push_response(&self, body: &[u8]) -> HttpResponse {
        let rendered = self.handle_push(body).and_then(|response| {
            let status = if response.is_success() { 200 } else { 400 };
            Ok((status, response.encode()?))
        });
        match rendered {
            Ok((status, body)) => HttpResponse::new(status, body),
            Err(err) => HttpResponse::from_error(&err),
        }
    }
}

/// Extracts the first value of `name` from a query string.
///
/// Keys and values are decoded as `application/x-www-form-urlencoded`.
pub fn query_param(query: &str, name: &str) -> Option<String> {
    url::form_urlencoded::parse(query.trim_start_matches('?').as_bytes())
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.into_owned())
}
