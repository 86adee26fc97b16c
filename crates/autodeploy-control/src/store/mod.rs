//! Pipeline state storage.
//!
//! This module provides the [`PipelineStateStore`] trait, the only shared
//! mutable state in the orchestration core, and an in-memory implementation.
//! Polling clients read records while pipelines write them.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;

use crate::error::ControlResult;
use crate::types::{DeploymentId, DeploymentOutcome, DeploymentRecord, LogEntry, Stage};

/// Filter criteria for listing deployments.
#[derive(Debug, Clone, Default)]
pub struct DeploymentFilter {
    /// Filter by stage.
    pub stage: Option<Stage>,
    /// Only return records that have (or have not) finished.
    pub terminal: Option<bool>,
    /// Maximum number of results.
    pub limit: Option<usize>,
}

impl DeploymentFilter {
    /// Create a new empty filter.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            stage: None,
            terminal: None,
            limit: None,
        }
    }

    /// Filter by stage.
    #[must_use]
    pub const fn with_stage(mut self, stage: Stage) -> Self {
        self.stage = Some(stage);
        self
    }

    /// Filter by whether the deployment has reached a terminal stage.
    #[must_use]
    pub const fn with_terminal(mut self, terminal: bool) -> Self {
        self.terminal = Some(terminal);
        self
    }

    /// Set maximum results.
    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether `record` passes this filter.
    #[must_use]
    pub fn matches(&self, record: &DeploymentRecord) -> bool {
        if let Some(stage) = self.stage {
            if record.stage != stage {
                return false;
            }
        }
        if let Some(terminal) = self.terminal {
            if record.stage.is_terminal() != terminal {
                return false;
            }
        }
        true
    }
}

/// Store of deployment records.
///
/// Mutations on one id are linearizable. Operations on different ids never
/// block one another. Readers always see a consistent snapshot of a record.
#[async_trait]
pub trait PipelineStateStore: Send + Sync {
    /// Create a record in [`Stage::Initiated`].
    ///
    /// Returns an error if a record with the same ID already exists.
    async fn create(&self, id: &DeploymentId) -> ControlResult<()>;

    /// Append an entry to the record's log.
    async fn append_log(&self, id: &DeploymentId, entry: LogEntry) -> ControlResult<()>;

    /// Move the record to `stage`, logging `message`.
    ///
    /// Rejects transitions the stage machine does not allow. Moving to
    /// [`Stage::Failed`] this way records `message` as the terminal error.
    async fn set_stage(&self, id: &DeploymentId, stage: Stage, message: &str)
        -> ControlResult<()>;

    /// Move the record to [`Stage::Failed`] with `error` as the terminal error.
    async fn fail(&self, id: &DeploymentId, error: &str) -> ControlResult<()>;

    /// Move the record to [`Stage::Completed`] with `outcome` as its result.
    async fn complete(
        &self,
        id: &DeploymentId,
        outcome: DeploymentOutcome,
        message: &str,
    ) -> ControlResult<()>;

    /// Snapshot of a record.
    ///
    /// Returns [`ControlError::DeploymentNotFound`](crate::ControlError::DeploymentNotFound)
    /// for unknown ids.
    async fn get(&self, id: &DeploymentId) -> ControlResult<DeploymentRecord>;

    /// The record's full log, oldest first.
    async fn logs(&self, id: &DeploymentId) -> ControlResult<Vec<LogEntry>>;

    /// Log entries from `offset` onwards, and the offset to poll from next.
    async fn logs_since(
        &self,
        id: &DeploymentId,
        offset: usize,
    ) -> ControlResult<(Vec<LogEntry>, usize)>;

    /// Records matching `filter`, newest first.
    async fn list(&self, filter: &DeploymentFilter) -> ControlResult<Vec<DeploymentRecord>>;

    /// Remove a record.
    async fn evict(&self, id: &DeploymentId) -> ControlResult<()>;
}
