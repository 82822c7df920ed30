//! Main sync server.

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::{HandlerContext, HttpResponse, RequestHandler};
use replisync_core::RecordStore;
use replisync_protocol::{PullResponse, PushResponse};
use std::sync::Arc;
use tracing::{debug, info};

/// The sync server.
///
/// Routes requests to the sync endpoint: `GET` pulls, `POST` pushes. It is
/// independent of any HTTP stack; an adapter passes the method, path, query
/// string and body in and writes the returned status and body out.
///
/// # Example
///
/// ```
/// use replisync_core::{CollectionSchema, FieldDef, MemoryStore, Schema};
/// use replisync_server::{ServerConfig, SyncServer};
/// use std::sync::Arc;
///
/// let schema = Schema::new()
///     .with_collection(CollectionSchema::new("tasks").field(FieldDef::text("title")));
/// let store = Arc::new(MemoryStore::new(schema).unwrap());
/// let server = SyncServer::new(ServerConfig::default(), store);
///
/// let response = server.handle("GET", "/sync/", Some("last_pulled_at=null"), b"");
/// assert_eq!(response.status, 200);
/// ```
pub struct SyncServer<S: RecordStore> {
    handler: RequestHandler<S>,
    context: Arc<HandlerContext<S>>,
}

impl<S: RecordStore> SyncServer<S> {
    /// Creates a new sync server over a store.
    pub fn new(config: ServerConfig, store: Arc<S>) -> Self {
        let context = Arc::new(HandlerContext::new(config, store));
        let handler = RequestHandler::new(Arc::clone(&context));

        Self { handler, context }
    }

    /// Handles one HTTP request.
    pub fn handle(
        &self,
        method: &str,
        path: &str,
        query: Option<&str>,
        body: &[u8],
    ) -> HttpResponse {
        if !self.context.config.matches_endpoint(path) {
            return HttpResponse::from_error(&ServerError::NotFound(path.to_string()));
        }

        let response = if method.eq_ignore_ascii_case("GET") {
            self.handler.pull_response(query)
        } else if method.eq_ignore_ascii_case("POST") {
            self.handler.push_response(body)
        } else {
            HttpResponse::from_error(&ServerError::MethodNotAllowed(method.to_string()))
        };

        info!(method, path, status = response.status, "sync request");
        response
    }

    /// Handles a pull request.
    pub fn handle_pull(&self, query: Option<&str>) -> ServerResult<PullResponse> {
        self.handler.handle_pull(query)
    }

    /// Handles a push request.
    pub fn handle_push(&self, body: &[u8]) -> ServerResult<PushResponse> {
        debug!(bytes = body.len(), "push received");
        self.handler.handle_push(body)
    }

    /// Returns the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.context.config
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &Arc<S> {
        self.context.coordinator.store()
    }
}
