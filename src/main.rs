// Argon demo binary.
//
// Wires an in-memory `LogStore` into an `ArgonEngine` and walks through the
// core workflow — create a project, write some documents, fork a branch,
// materialize both, take a time-travel snapshot, and preview a restore.
// There is no network listener here; embedding this engine behind a
// protocol server is left to the caller.

use std::sync::Arc;

use argon_core::config::ArgonConfig;
use argon_core::store::{LogStore, MemoryLogStore};
use argon_core::{ArgonEngine, Result};
use serde_json::json;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    print_banner();

    let store: Arc<dyn LogStore> = Arc::new(MemoryLogStore::new());
    let engine = ArgonEngine::new(store, ArgonConfig::default()).await?;
    engine.start_monitoring();

    info!("creating project 'demo'");
    let (project, main_branch) = engine.projects.create_project("demo").await?;

    engine
        .interceptor
        .insert_one(&main_branch, "users", json!({"name": "Ada Lovelace", "role": "admin"}))
        .await?;
    engine
        .interceptor
        .insert_one(&main_branch, "users", json!({"name": "Alan Turing", "role": "user"}))
        .await?;
    let main_branch = engine.branches.get_branch_by_id(&main_branch.id).unwrap();

    info!(lsn = main_branch.head_lsn.0, "main branch after two inserts");

    let feature_branch = engine
        .branches
        .create_branch(&project.id, "feature/promote-turing", Some(&main_branch.id))
        .await?;
    engine
        .interceptor
        .update_one(
            &feature_branch,
            "users",
            json!({"name": "Alan Turing"}),
            json!({"$set": {"role": "admin"}}),
        )
        .await?;
    let feature_branch = engine.branches.get_branch_by_id(&feature_branch.id).unwrap();

    let main_state = engine.materializer.materialize_collection(&main_branch, "users").await?;
    let feature_state = engine
        .materializer
        .materialize_collection(&feature_branch, "users")
        .await?;

    info!(
        main_branch_count = main_state.len(),
        feature_branch_count = feature_state.len(),
        "fork isolates writes from its parent until merged"
    );

    let tt_info = engine.time_travel.get_time_travel_info(&main_branch).await?;
    info!(
        earliest_lsn = ?tt_info.earliest_lsn,
        latest_lsn = ?tt_info.latest_lsn,
        entry_count = tt_info.entry_count,
        "time-travel window for main"
    );

    let preview = engine
        .restore
        .get_restore_preview(&main_branch, main_branch.base_lsn)
        .await?;
    info!(
        operations_discarded = preview.operations_discarded,
        "restore preview: resetting main to its base would discard this many ops"
    );

    print_summary(&main_state.len(), &feature_state.len());
    Ok(())
}

fn print_banner() {
    println!("╔════════════════════════════════════════════════════════════╗");
    println!("║  Argon — WAL-based branching and time-travel for documents  ║");
    println!("╚════════════════════════════════════════════════════════════╝");
    println!();
}

fn print_summary(main_count: &usize, feature_count: &usize) {
    println!();
    println!("╭─────────────────────────────────────────────────────────╮");
    println!("│  demo complete                                          │");
    println!("│  main/users documents:    {:<3}                         │", main_count);
    println!("│  feature/users documents: {:<3}                         │", feature_count);
    println!("╰─────────────────────────────────────────────────────────╯");
}
