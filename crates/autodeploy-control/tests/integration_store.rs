//! Integration tests for concurrent access to the pipeline state store.

use std::sync::Arc;

use autodeploy_control::{
    DeploymentFilter, DeploymentId, LogEntry, MemoryStore, PipelineStateStore, Stage,
};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn writers_and_readers_on_many_deployments() {
    let store = Arc::new(MemoryStore::new());
    let ids: Vec<DeploymentId> = (0..10)
        .map(|i| DeploymentId::new(format!("dep-{i:02}")))
        .collect();
    for id in &ids {
        store.create(id).await.unwrap();
    }

    let mut writers = Vec::new();
    for id in ids.clone() {
        let store = Arc::clone(&store);
        writers.push(tokio::spawn(async move {
            let mut stage = Stage::Initiated;
            while let Some(next) = stage.successor() {
                for i in 0..20 {
                    store
                        .append_log(&id, LogEntry::info(format!("{stage} step {i}")))
                        .await
                        .unwrap();
                }
                if next == Stage::Completed {
                    break;
                }
                store.set_stage(&id, next, next.as_str()).await.unwrap();
                stage = next;
            }
        }));
    }

    let reader_store = Arc::clone(&store);
    let reader_ids = ids.clone();
    let reader = tokio::spawn(async move {
        for _ in 0..50 {
            for id in &reader_ids {
                let record = reader_store.get(id).await.unwrap();
                // A snapshot never shows a stage whose log line is missing.
                let transitions = record
                    .logs
                    .iter()
                    .filter(|e| e.message == record.stage.as_str())
                    .count();
                if record.stage != Stage::Initiated {
                    assert_eq!(transitions, 1);
                }
            }
            tokio::task::yield_now().await;
        }
    });

    for writer in writers {
        writer.await.unwrap();
    }
    reader.await.unwrap();

    for id in &ids {
        let record = store.get(id).await.unwrap();
        assert_eq!(record.stage, Stage::Verifying);
        // initiated + 6 stages x 20 lines + 5 transitions
        assert_eq!(record.logs.len(), 1 + 6 * 20 + 5);
    }

    let verifying = store
        .list(&DeploymentFilter::new().with_stage(Stage::Verifying))
        .await
        .unwrap();
    assert_eq!(verifying.len(), ids.len());
}

#[tokio::test]
async fn evicted_records_disappear_from_listings() {
    let store = MemoryStore::new();
    let keep = DeploymentId::new("keep");
    let drop = DeploymentId::new("drop");
    store.create(&keep).await.unwrap();
    store.create(&drop).await.unwrap();
    store.fail(&drop, "boom").await.unwrap();

    let finished = store
        .list(&DeploymentFilter::new().with_terminal(true))
        .await
        .unwrap();
    assert_eq!(finished.len(), 1);

    store.evict(&drop).await.unwrap();
    let all = store.list(&DeploymentFilter::new()).await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].id, keep);
}
