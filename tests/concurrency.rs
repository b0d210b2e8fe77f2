// Concurrent-writer invariants (LSN uniqueness/monotonicity, branch head
// monotonicity) under real task interleaving rather than sequential calls.

use std::collections::HashSet;
use std::sync::Arc;

use argon_core::config::ArgonConfig;
use argon_core::store::{LogStore, MemoryLogStore};
use argon_core::ArgonEngine;
use serde_json::json;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_inserts_yield_unique_lsns_and_a_head_that_covers_them_all() {
    let store: Arc<dyn LogStore> = Arc::new(MemoryLogStore::new());
    let engine = Arc::new(ArgonEngine::new(store, ArgonConfig::default()).await.unwrap());
    let (_project, main_branch) = engine.projects.create_project("p1").await.unwrap();
    let before_head = main_branch.head_lsn;

    let mut tasks = Vec::new();
    for i in 0..50 {
        let engine = engine.clone();
        let branch = main_branch.clone();
        tasks.push(tokio::spawn(async move {
            engine
                .interceptor
                .insert_one(&branch, "users", json!({"name": format!("user-{i}")}))
                .await
        }));
    }
    for task in tasks {
        // `update_branch_head` is monotonic-safe: a call whose own LSN loses
        // the race to a larger concurrent one quietly no-ops on the head
        // advance rather than erroring, since its write already landed
        // durably in the log either way. Every insert here succeeds.
        task.await.unwrap().unwrap();
    }

    let final_branch = engine.branches.get_branch_by_id(&main_branch.id).unwrap();
    assert!(final_branch.head_lsn > before_head);

    let entries = engine
        .wal
        .get_branch_entries(main_branch.id.as_str(), Some("users"), before_head, engine.wal.current_lsn())
        .await
        .unwrap();
    assert_eq!(entries.len(), 50);

    let mut entry_lsns = HashSet::new();
    for e in &entries {
        assert!(entry_lsns.insert(e.lsn), "duplicate LSN observed: {:?}", e.lsn);
    }

    let state = engine.materializer.materialize_collection(&final_branch, "users").await.unwrap();
    assert_eq!(state.len(), entries.len());
}
