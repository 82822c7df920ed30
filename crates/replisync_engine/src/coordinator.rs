//! Sync coordinator: the entry point of the transport layer.

use crate::applier::BatchApplier;
use crate::config::EngineConfig;
use crate::delta::DeltaReader;
use crate::error::{ApplyError, SyncResult};
use crate::validate::PayloadValidator;
use replisync_core::{RecordStore, Timestamp};
use replisync_protocol::{PullRequest, PullResponse, PushRequest, PushResponse};
use std::sync::Arc;

/// Runs pulls and pushes against one record store.
///
/// The coordinator holds no per-client state; clients own their cursors.
/// It is cheap to share behind an `Arc` and safe to call from many threads,
/// isolation being provided by the store.
pub struct SyncCoordinator<S: RecordStore> {
    store: Arc<S>,
    reader: DeltaReader,
    applier: BatchApplier,
}

impl<S: RecordStore> SyncCoordinator<S> {
    /// Creates a coordinator with default configuration.
    pub fn new(store: Arc<S>) -> Self {
        Self::with_config(store, EngineConfig::default())
    }

    /// Creates a coordinator with the given configuration.
    pub fn with_config(store: Arc<S>, config: EngineConfig) -> Self {
        Self {
            store,
            reader: DeltaReader::new(),
            applier: BatchApplier::new(config),
        }
    }

    /// Replaces the payload validator.
    pub fn with_validator(mut self, validator: Arc<dyn PayloadValidator>) -> Self {
        self.applier = self.applier.with_validator(validator);
        self
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Returns the configuration.
    pub fn config(&self) -> &EngineConfig {
        self.applier.config()
    }

    /// Pulls changes after a raw cursor value.
    ///
    /// A cursor that is not a millisecond timestamp is rejected before the
    /// store is read.
    pub fn pull(&self, cursor: Option<&str>) -> SyncResult<PullResponse> {
        let request = PullRequest::from_query(cursor)?;
        self.pull_since(request.last_pulled_at)
    }

    /// Pulls changes after a cursor; `None` is a full snapshot.
    pub fn pull_since(&self, cursor: Option<Timestamp>) -> SyncResult<PullResponse> {
        let cursor = PullRequest::new(cursor).cursor();
        self.reader.compute_delta(self.store.as_ref(), cursor)
    }

    /// Applies a push batch and packages the outcome.
    pub fn push(&self, request: &PushRequest) -> SyncResult<PushResponse> {
        let errors = self.push_detailed(request)?;
        Ok(PushResponse::from_errors(
            errors.iter().map(ToString::to_string).collect(),
        ))
    }

    /// Applies a push batch and returns the structured item errors.
    pub fn push_detailed(&self, request: &PushRequest) -> SyncResult<Vec<ApplyError>> {
        self.applier
            .apply_batch(self.store.as_ref(), &request.changes)
    }
}

impl<S: RecordStore> std::fmt::Debug for SyncCoordinator<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncCoordinator")
            .field("applier", &self.applier)
            .finish_non_exhaustive()
    }
}
