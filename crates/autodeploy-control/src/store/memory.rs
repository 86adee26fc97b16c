//! In-memory pipeline state store.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tracing::debug;

use crate::error::{ControlError, ControlResult};
use crate::types::{DeploymentId, DeploymentOutcome, DeploymentRecord, LogEntry, Stage};

use super::{DeploymentFilter, PipelineStateStore};

type SharedRecord = Arc<RwLock<DeploymentRecord>>;

/// In-memory pipeline state store.
///
/// Each record sits behind its own lock; the index only hands out clones of
/// the record handle, so a slow writer on one deployment never stalls
/// readers of another. Data is lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: DashMap<DeploymentId, SharedRecord>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn record(&self, id: &DeploymentId) -> ControlResult<SharedRecord> {
        self.records
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| ControlError::DeploymentNotFound(id.to_string()))
    }

    fn write<T>(
        &self,
        id: &DeploymentId,
        f: impl FnOnce(&mut DeploymentRecord) -> ControlResult<T>,
    ) -> ControlResult<T> {
        let record = self.record(id)?;
        let mut guard = record
            .write()
            .map_err(|_| ControlError::internal("lock poisoned"))?;
        f(&mut guard)
    }

    fn read<T>(&self, id: &DeploymentId, f: impl FnOnce(&DeploymentRecord) -> T) -> ControlResult<T> {
        let record = self.record(id)?;
        let guard = record
            .read()
            .map_err(|_| ControlError::internal("lock poisoned"))?;
        Ok(f(&guard))
    }
}

fn transition(record: &mut DeploymentRecord, stage: Stage) -> ControlResult<()> {
    if !record.stage.can_transition_to(stage) {
        return Err(ControlError::InvalidStateTransition {
            from: record.stage.as_str(),
            to: stage.as_str(),
        });
    }
    record.stage = stage;
    if stage.is_terminal() {
        record.finished_at = Some(Utc::now());
    }
    Ok(())
}

#[async_trait]
impl PipelineStateStore for MemoryStore {
    async fn create(&self, id: &DeploymentId) -> ControlResult<()> {
        match self.records.entry(id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(ControlError::DeploymentExists(id.to_string()))
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                let mut record = DeploymentRecord::new(id.clone());
                record.logs.push(LogEntry::info("deployment initiated"));
                slot.insert(Arc::new(RwLock::new(record)));
                debug!(deployment_id = %id, "record created");
                Ok(())
            }
        }
    }

    async fn append_log(&self, id: &DeploymentId, entry: LogEntry) -> ControlResult<()> {
        self.write(id, |record| {
            record.logs.push(entry);
            Ok(())
        })
    }

    async fn set_stage(
        &self,
        id: &DeploymentId,
        stage: Stage,
        message: &str,
    ) -> ControlResult<()> {
        self.write(id, |record| {
            transition(record, stage)?;
            if stage == Stage::Failed {
                record.error = Some(message.to_owned());
                record.logs.push(LogEntry::error(message));
            } else {
                record.logs.push(LogEntry::info(message));
            }
            Ok(())
        })?;
        debug!(deployment_id = %id, stage = %stage, "stage changed");
        Ok(())
    }

    async fn fail(&self, id: &DeploymentId, error: &str) -> ControlResult<()> {
        self.set_stage(id, Stage::Failed, error).await
    }

    async fn complete(
        &self,
        id: &DeploymentId,
        outcome: DeploymentOutcome,
        message: &str,
    ) -> ControlResult<()> {
        self.write(id, |record| {
            transition(record, Stage::Completed)?;
            record.result = Some(outcome);
            record.logs.push(LogEntry::info(message));
            Ok(())
        })?;
        debug!(deployment_id = %id, "deployment completed");
        Ok(())
    }

    async fn get(&self, id: &DeploymentId) -> ControlResult<DeploymentRecord> {
        self.read(id, Clone::clone)
    }

    async fn logs(&self, id: &DeploymentId) -> ControlResult<Vec<LogEntry>> {
        self.read(id, |record| record.logs.clone())
    }

    async fn logs_since(
        &self,
        id: &DeploymentId,
        offset: usize,
    ) -> ControlResult<(Vec<LogEntry>, usize)> {
        self.read(id, |record| {
            let total = record.logs.len();
            let start = offset.min(total);
            (record.logs[start..].to_vec(), total)
        })
    }

    async fn list(&self, filter: &DeploymentFilter) -> ControlResult<Vec<DeploymentRecord>> {
        let handles: Vec<SharedRecord> = self
            .records
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            let record = handle
                .read()
                .map_err(|_| ControlError::internal("lock poisoned"))?;
            if filter.matches(&record) {
                results.push(record.clone());
            }
        }

        results.sort_by(|a, b| {
            b.started_at
                .cmp(&a.started_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        if let Some(limit) = filter.limit {
            results.truncate(limit);
        }
        Ok(results)
    }

    async fn evict(&self, id: &DeploymentId) -> ControlResult<()> {
        self.records
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| ControlError::DeploymentNotFound(id.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::types::LogLevel;

    async fn store_with(id: &str) -> (MemoryStore, DeploymentId) {
        let store = MemoryStore::new();
        let id = DeploymentId::new(id);
        store.create(&id).await.unwrap();
        (store, id)
    }

    async fn advance_to(store: &MemoryStore, id: &DeploymentId, stage: Stage) {
        let mut current = store.get(id).await.unwrap().stage;
        while current != stage {
            let next = current.successor().unwrap();
            store.set_stage(id, next, next.as_str()).await.unwrap();
            current = next;
        }
    }

    #[tokio::test]
    async fn create_and_get() {
        let (store, id) = store_with("dep-1").await;
        let record = store.get(&id).await.unwrap();
        assert_eq!(record.id, id);
        assert_eq!(record.stage, Stage::Initiated);
        assert_eq!(record.logs.len(), 1);
    }

    #[tokio::test]
    async fn duplicate_create_fails() {
        let (store, id) = store_with("dep-1").await;
        assert!(matches!(
            store.create(&id).await,
            Err(ControlError::DeploymentExists(_))
        ));
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let store = MemoryStore::new();
        let id = DeploymentId::new("missing");
        assert!(matches!(
            store.get(&id).await,
            Err(ControlError::DeploymentNotFound(_))
        ));
        assert!(matches!(
            store.logs(&id).await,
            Err(ControlError::DeploymentNotFound(_))
        ));
        assert!(store.append_log(&id, LogEntry::info("x")).await.is_err());
    }

    #[tokio::test]
    async fn stages_follow_the_success_path() {
        let (store, id) = store_with("dep-1").await;
        advance_to(&store, &id, Stage::Verifying).await;
        store
            .complete(
                &id,
                DeploymentOutcome {
                    url: Some("https://app.example.com".to_owned()),
                    metadata: BTreeMap::new(),
                },
                "deployment completed",
            )
            .await
            .unwrap();

        let record = store.get(&id).await.unwrap();
        assert_eq!(record.stage, Stage::Completed);
        assert!(record.finished_at.is_some());
        assert_eq!(
            record.result.and_then(|r| r.url).as_deref(),
            Some("https://app.example.com")
        );
        // initiated + six transitions + completion
        assert_eq!(record.logs.len(), 7);
    }

    #[tokio::test]
    async fn skipping_a_stage_is_rejected() {
        let (store, id) = store_with("dep-1").await;
        let err = store
            .set_stage(&id, Stage::Provisioning, "skip")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ControlError::InvalidStateTransition {
                from: "initiated",
                to: "provisioning"
            }
        ));
        assert_eq!(store.get(&id).await.unwrap().stage, Stage::Initiated);
    }

    #[tokio::test]
    async fn completing_before_verification_is_rejected() {
        let (store, id) = store_with("dep-1").await;
        advance_to(&store, &id, Stage::Deploying).await;
        let outcome = DeploymentOutcome {
            url: None,
            metadata: BTreeMap::new(),
        };
        assert!(store.complete(&id, outcome, "done").await.is_err());
    }

    #[tokio::test]
    async fn failure_records_error_verbatim() {
        let (store, id) = store_with("dep-1").await;
        advance_to(&store, &id, Stage::Provisioning).await;
        store
            .fail(&id, "provisioning error: quota exceeded")
            .await
            .unwrap();

        let record = store.get(&id).await.unwrap();
        assert_eq!(record.stage, Stage::Failed);
        assert_eq!(
            record.error.as_deref(),
            Some("provisioning error: quota exceeded")
        );
        let last = record.logs.last().unwrap();
        assert_eq!(last.level, LogLevel::Error);
        assert_eq!(last.message, "provisioning error: quota exceeded");
    }

    #[tokio::test]
    async fn terminal_stages_reject_further_transitions() {
        let (store, id) = store_with("dep-1").await;
        store.fail(&id, "boom").await.unwrap();

        for stage in [Stage::Profiling, Stage::Completed, Stage::Failed] {
            assert!(store.set_stage(&id, stage, "again").await.is_err());
        }
        assert_eq!(store.get(&id).await.unwrap().error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn logs_since_pages_forward() {
        let (store, id) = store_with("dep-1").await;
        for i in 0..4 {
            store
                .append_log(&id, LogEntry::info(format!("line {i}")))
                .await
                .unwrap();
        }

        let (first, next) = store.logs_since(&id, 0).await.unwrap();
        assert_eq!(first.len(), 5);
        assert_eq!(next, 5);

        store.append_log(&id, LogEntry::warn("late")).await.unwrap();
        let (rest, next) = store.logs_since(&id, next).await.unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].message, "late");
        assert_eq!(next, 6);

        let (none, next) = store.logs_since(&id, 100).await.unwrap();
        assert!(none.is_empty());
        assert_eq!(next, 6);
    }

    #[tokio::test]
    async fn list_filters_and_limits() {
        let store = MemoryStore::new();
        let ids: Vec<_> = (0..3).map(|i| DeploymentId::new(format!("dep-{i}"))).collect();
        for id in &ids {
            store.create(id).await.unwrap();
        }
        store.fail(&ids[1], "boom").await.unwrap();

        let failed = store
            .list(&DeploymentFilter::new().with_stage(Stage::Failed))
            .await
            .unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].id, ids[1]);

        let active = store
            .list(&DeploymentFilter::new().with_terminal(false))
            .await
            .unwrap();
        assert_eq!(active.len(), 2);

        let limited = store
            .list(&DeploymentFilter::new().with_limit(2))
            .await
            .unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[tokio::test]
    async fn evict_removes_record() {
        let (store, id) = store_with("dep-1").await;
        store.evict(&id).await.unwrap();
        assert!(store.is_empty());
        assert!(store.get(&id).await.is_err());
        assert!(store.evict(&id).await.is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_appends_lose_nothing() {
        let store = Arc::new(MemoryStore::new());
        let id = DeploymentId::new("dep-concurrent");
        store.create(&id).await.unwrap();

        let mut handles = Vec::new();
        for writer in 0..8 {
            let store = Arc::clone(&store);
            let id = id.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..100 {
                    store
                        .append_log(&id, LogEntry::info(format!("{writer}:{i}")))
                        .await
                        .unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let logs = store.logs(&id).await.unwrap();
        assert_eq!(logs.len(), 1 + 8 * 100);

        // Each writer's own messages stay in order.
        for writer in 0..8 {
            let prefix = format!("{writer}:");
            let seq: Vec<usize> = logs
                .iter()
                .filter_map(|e| e.message.strip_prefix(&prefix))
                .map(|n| n.parse().unwrap())
                .collect();
            assert_eq!(seq, (0..100).collect::<Vec<_>>());
        }
    }
}
