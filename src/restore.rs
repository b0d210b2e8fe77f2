// Restore (C9): reset-to-LSN with preview/safety, fork-from-history.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::branch::{Branch, BranchService};
use crate::error::{ArgonError, Result};
use crate::ids::Lsn;
use crate::monitoring::EngineMetrics;
use crate::timetravel::TimeTravelService;
use crate::wal::WalService;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionDelta {
    pub collection: String,
    pub operations_discarded: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestorePreview {
    pub current_lsn: Lsn,
    pub target_lsn: Lsn,
    pub operations_discarded: usize,
    pub per_collection: Vec<CollectionDelta>,
}

pub struct RestoreService {
    wal: Arc<WalService>,
    branches: Arc<BranchService>,
    time_travel: Arc<TimeTravelService>,
    metrics: Arc<EngineMetrics>,
}

impl RestoreService {
    pub fn new(
        wal: Arc<WalService>,
        branches: Arc<BranchService>,
        time_travel: Arc<TimeTravelService>,
        metrics: Arc<EngineMetrics>,
    ) -> Self {
        Self {
            wal,
            branches,
            time_travel,
            metrics,
        }
    }

    /// `GetRestorePreview` — summarizes what a reset to `target_lsn` would
    /// discard without applying it.
    pub async fn get_restore_preview(&self, branch: &Branch, target_lsn: Lsn) -> Result<RestorePreview> {
        if target_lsn < branch.base_lsn {
            return Err(ArgonError::RestoreBelowBase {
                target: target_lsn.0,
                base_lsn: branch.base_lsn.0,
            });
        }

        let discarded = self
            .wal
            .get_branch_entries(branch.id.as_str(), None, target_lsn, branch.head_lsn)
            .await?;

        let mut per_collection: HashMap<String, usize> = HashMap::new();
        for entry in &discarded {
            if let Some(collection) = &entry.collection {
                *per_collection.entry(collection.clone()).or_insert(0) += 1;
            }
        }
        let mut per_collection: Vec<_> = per_collection
            .into_iter()
            .map(|(collection, operations_discarded)| CollectionDelta {
                collection,
                operations_discarded,
            })
            .collect();
        per_collection.sort_by(|a, b| a.collection.cmp(&b.collection));

        Ok(RestorePreview {
            current_lsn: branch.head_lsn,
            target_lsn,
            operations_discarded: discarded.len(),
            per_collection,
        })
    }

    /// `ResetBranchToLSN` — rewinds `head_lsn` to `target_lsn`. Requires a
    /// preview to have been taken and `confirmed` to be set explicitly
    /// (spec §4.9 / §7: destructive operations require opt-in).
    ///
    /// No compensating WAL entry is emitted (spec §9 open question: current
    /// design moves the head pointer directly). The discarded entries stay
    /// physically in the log, simply outside the branch's logical view.
    pub async fn reset_branch_to_lsn(&self, branch: &Branch, target_lsn: Lsn, confirmed: bool) -> Result<()> {
        let started = std::time::Instant::now();
        let result = self.reset_branch_to_lsn_inner(branch, target_lsn, confirmed).await;
        match &result {
            Ok(()) => {
                self.metrics.restores.inc();
                self.metrics.record_success(started.elapsed());
            }
            Err(_) => self.metrics.record_failure(started.elapsed()),
        }
        result
    }

    async fn reset_branch_to_lsn_inner(&self, branch: &Branch, target_lsn: Lsn, confirmed: bool) -> Result<()> {
        let preview = self.get_restore_preview(branch, target_lsn).await?;

        if preview.operations_discarded > 0 && !confirmed {
            return Err(ArgonError::RestoreNotConfirmed {
                discarded: preview.operations_discarded,
            });
        }

        self.branches.force_set_head(&branch.id, target_lsn)
    }

    /// `ResetBranchToTime` — resolves `t` to an LSN via C8 and resets there.
    pub async fn reset_branch_to_time(&self, branch: &Branch, t: i64, confirmed: bool) -> Result<()> {
        let target_lsn = self
            .time_travel
            .find_lsn_at_time(branch, t)
            .await?
            .unwrap_or(Lsn::ZERO);
        self.reset_branch_to_lsn(branch, target_lsn, confirmed).await
    }

    /// Forks a new branch whose `base_lsn = head_lsn = target_lsn`. The new
    /// branch sees the source's entries in `(0, target_lsn]` via the
    /// ancestor-inclusion rule and accumulates its own writes after that.
    pub async fn fork_from_history(&self, source: &Branch, name: &str, target_lsn: Lsn) -> Result<Branch> {
        if target_lsn < Lsn::ZERO {
            return Err(ArgonError::NegativeLsn { lsn: target_lsn.0 });
        }
        if target_lsn > source.head_lsn {
            return Err(ArgonError::LsnOutOfRange {
                lsn: target_lsn.0,
                head_lsn: source.head_lsn.0,
            });
        }
        self.branches.fork_branch_at(source, name, target_lsn).await
    }

    /// `CreateBackup` — forks the branch at its current head as a safety
    /// snapshot before a destructive operation.
    pub async fn create_backup(&self, branch: &Branch, name: &str) -> Result<Branch> {
        self.fork_from_history(branch, name, branch.head_lsn).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompressionConfig;
    use crate::interceptor::Interceptor;
    use crate::materializer::Materializer;
    use crate::store::{LogStore, MemoryLogStore};
    use serde_json::json;

    async fn setup() -> (RestoreService, Interceptor, Arc<BranchService>, Branch) {
        let store: Arc<dyn LogStore> = Arc::new(MemoryLogStore::new());
        let wal = Arc::new(WalService::new(store, CompressionConfig::default()).await.unwrap());
        let registry = Arc::new(crate::project::ProjectRegistry::new());
        let branches = Arc::new(BranchService::new(wal.clone(), registry.clone()));
        let project_id = crate::ids::ProjectId::generate();
        registry.insert(project_id.to_string());
        let branch = branches.create_branch(&project_id, "main", None).await.unwrap();
        let metrics = Arc::new(EngineMetrics::default());
        let materializer = Arc::new(Materializer::new(wal.clone(), metrics.clone()));
        let time_travel = Arc::new(TimeTravelService::new(wal.clone(), materializer));
        (
            RestoreService::new(wal.clone(), branches.clone(), time_travel, metrics.clone()),
            Interceptor::new(wal, branches.clone(), metrics),
            branches,
            branch,
        )
    }

    #[tokio::test]
    async fn preview_reports_discarded_operations_per_collection() {
        let (restore, interceptor, branches, mut branch) = setup().await;
        interceptor.insert_one(&branch, "users", json!({"name": "A"})).await.unwrap();
        branch = branches.get_branch_by_id(&branch.id).unwrap();
        let target = branch.head_lsn;
        interceptor.insert_one(&branch, "users", json!({"name": "B"})).await.unwrap();
        interceptor.insert_one(&branch, "orders", json!({"item": "X"})).await.unwrap();
        branch = branches.get_branch_by_id(&branch.id).unwrap();

        let preview = restore.get_restore_preview(&branch, target).await.unwrap();
        assert_eq!(preview.operations_discarded, 2);
        assert_eq!(preview.per_collection.len(), 2);
    }

    #[tokio::test]
    async fn preview_rejects_target_below_base_lsn() {
        let (restore, interceptor, branches, mut branch) = setup().await;
        interceptor.insert_one(&branch, "users", json!({"name": "A"})).await.unwrap();
        branch = branches.get_branch_by_id(&branch.id).unwrap();
        let feat = branches
            .create_branch(&branch.project_id, "feat", Some(&branch.id))
            .await
            .unwrap();

        let result = restore.get_restore_preview(&feat, Lsn::ZERO).await;
        assert!(matches!(result, Err(ArgonError::RestoreBelowBase { .. })));
    }

    #[tokio::test]
    async fn reset_without_confirmation_is_refused_when_destructive() {
        let (restore, interceptor, branches, mut branch) = setup().await;
        interceptor.insert_one(&branch, "users", json!({"name": "A"})).await.unwrap();
        branch = branches.get_branch_by_id(&branch.id).unwrap();
        let target = branch.head_lsn;
        interceptor.insert_one(&branch, "users", json!({"name": "B"})).await.unwrap();
        branch = branches.get_branch_by_id(&branch.id).unwrap();

        let result = restore.reset_branch_to_lsn(&branch, target, false).await;
        assert!(matches!(result, Err(ArgonError::RestoreNotConfirmed { .. })));
    }

    #[tokio::test]
    async fn reset_with_confirmation_rewinds_head() {
        let (restore, interceptor, branches, mut branch) = setup().await;
        interceptor.insert_one(&branch, "users", json!({"name": "A"})).await.unwrap();
        branch = branches.get_branch_by_id(&branch.id).unwrap();
        let target = branch.head_lsn;
        interceptor.insert_one(&branch, "users", json!({"name": "B"})).await.unwrap();
        branch = branches.get_branch_by_id(&branch.id).unwrap();

        restore.reset_branch_to_lsn(&branch, target, true).await.unwrap();
        let updated = branches.get_branch_by_id(&branch.id).unwrap();
        assert_eq!(updated.head_lsn, target);
    }

    #[tokio::test]
    async fn fork_from_history_creates_branch_with_matching_base_and_head() {
        let (restore, interceptor, branches, mut branch) = setup().await;
        interceptor.insert_one(&branch, "users", json!({"name": "A"})).await.unwrap();
        branch = branches.get_branch_by_id(&branch.id).unwrap();
        let target = branch.head_lsn;
        interceptor.insert_one(&branch, "users", json!({"name": "B"})).await.unwrap();
        branch = branches.get_branch_by_id(&branch.id).unwrap();

        let forked = restore.fork_from_history(&branch, "snapshot", target).await.unwrap();
        assert_eq!(forked.base_lsn, target);
        assert_eq!(forked.head_lsn, target);
    }

    #[tokio::test]
    async fn create_backup_forks_at_current_head() {
        let (restore, interceptor, branches, mut branch) = setup().await;
        interceptor.insert_one(&branch, "users", json!({"name": "A"})).await.unwrap();
        branch = branches.get_branch_by_id(&branch.id).unwrap();

        let backup = restore.create_backup(&branch, "backup").await.unwrap();
        assert_eq!(backup.head_lsn, branch.head_lsn);
    }
}
