// Branch Service (C4): branch metadata, lineage, head/base LSN invariants.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{ArgonError, Result};
use crate::ids::{BranchId, Lsn, ProjectId};
use crate::project::ProjectRegistry;
use crate::wal::{Operation, WalEntry, WalService};

pub const MAIN_BRANCH_NAME: &str = "main";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Branch {
    pub id: BranchId,
    pub project_id: ProjectId,
    pub name: String,
    pub parent_id: Option<BranchId>,
    pub head_lsn: Lsn,
    pub base_lsn: Lsn,
    pub created_at: DateTime<Utc>,
    pub created_lsn: Lsn,
    pub is_deleted: bool,
}

/// Branch metadata store plus the WAL operations that keep it coherent.
/// Grounded on the teacher's collection-metadata maps: a flat `DashMap`
/// keyed by ID, reads scanning by project/parent rather than a secondary
/// index structure — acceptable at the metadata scale this component deals
/// with (branches, not documents).
pub struct BranchService {
    wal: Arc<WalService>,
    branches: DashMap<String, Branch>,
    projects: Arc<ProjectRegistry>,
}

impl BranchService {
    pub fn new(wal: Arc<WalService>, projects: Arc<ProjectRegistry>) -> Self {
        Self {
            wal,
            branches: DashMap::new(),
            projects,
        }
    }

    pub async fn create_branch(
        &self,
        project_id: &ProjectId,
        name: &str,
        parent_id: Option<&BranchId>,
    ) -> Result<Branch> {
        if !self.projects.contains(project_id.as_str()) {
            return Err(ArgonError::ProjectNotFound(project_id.to_string()));
        }
        if self.get_branch(project_id, name).is_some() {
            return Err(ArgonError::BranchExists {
                project_id: project_id.to_string(),
                name: name.to_string(),
            });
        }

        let parent = match parent_id {
            Some(id) => Some(
                self.get_branch_by_id(id)
                    .ok_or_else(|| ArgonError::BranchNotFound(id.to_string()))?,
            ),
            None => None,
        };

        let id = BranchId::generate();
        let entry = WalEntry::new(project_id.as_str(), id.as_str(), Operation::CreateBranch)
            .with_document(serde_json::json!({
                "name": name,
                "parent_id": parent.as_ref().map(|p| p.id.to_string()),
            }));
        let created_lsn = self.wal.append(entry).await?;

        let (base_lsn, head_lsn) = match &parent {
            Some(parent) => (parent.head_lsn, parent.head_lsn),
            None => (Lsn::ZERO, created_lsn),
        };

        let branch = Branch {
            id,
            project_id: project_id.clone(),
            name: name.to_string(),
            parent_id: parent.map(|p| p.id),
            head_lsn,
            base_lsn,
            created_at: Utc::now(),
            created_lsn,
            is_deleted: false,
        };

        self.branches
            .insert(branch.id.to_string(), branch.clone());
        Ok(branch)
    }

    pub async fn delete_branch(&self, branch_id: &BranchId) -> Result<()> {
        let branch = self
            .get_branch_by_id(branch_id)
            .ok_or_else(|| ArgonError::BranchNotFound(branch_id.to_string()))?;

        if branch.name == MAIN_BRANCH_NAME {
            return Err(ArgonError::CannotDeleteMain);
        }

        if !self.get_child_branches(branch_id).is_empty() {
            return Err(ArgonError::BranchHasChildren(branch_id.to_string()));
        }

        let entry = WalEntry::new(branch.project_id.as_str(), branch_id.as_str(), Operation::DeleteBranch);
        self.wal.append(entry).await?;

        self.branches
            .alter(&branch_id.to_string(), |_, mut b| {
                b.is_deleted = true;
                b
            });
        Ok(())
    }

    /// Advances `head_lsn` to `new_lsn` if it's newer. A racing writer whose
    /// own LSN lost the race to a larger concurrent advance is a silent
    /// no-op rather than an error: that writer's entry already landed
    /// durably in the log, it's merely superseded as the "latest" pointer.
    /// A restore reset bypasses this monotonic guard entirely via
    /// `force_set_head`.
    pub fn update_branch_head(&self, branch_id: &BranchId, new_lsn: Lsn) -> Result<()> {
        let mut entry = self
            .branches
            .get_mut(&branch_id.to_string())
            .ok_or_else(|| ArgonError::BranchNotFound(branch_id.to_string()))?;
        if new_lsn > entry.head_lsn {
            entry.head_lsn = new_lsn;
        }
        Ok(())
    }

    /// Used only by restore-reset, which is explicitly allowed to move
    /// `head_lsn` backward.
    pub fn force_set_head(&self, branch_id: &BranchId, new_lsn: Lsn) -> Result<()> {
        let mut entry = self
            .branches
            .get_mut(&branch_id.to_string())
            .ok_or_else(|| ArgonError::BranchNotFound(branch_id.to_string()))?;
        entry.head_lsn = new_lsn;
        Ok(())
    }

    pub fn get_branch(&self, project_id: &ProjectId, name: &str) -> Option<Branch> {
        self.branches
            .iter()
            .find(|b| b.project_id == *project_id && b.name == name && !b.is_deleted)
            .map(|b| b.clone())
    }

    pub fn get_branch_by_id(&self, id: &BranchId) -> Option<Branch> {
        self.branches.get(&id.to_string()).map(|b| b.clone())
    }

    pub fn list_branches(&self, project_id: &ProjectId) -> Vec<Branch> {
        self.branches
            .iter()
            .filter(|b| b.project_id == *project_id && !b.is_deleted)
            .map(|b| b.clone())
            .collect()
    }

    /// Active (non-deleted) branch count across every project, for the
    /// monitor's `active_branches` gauge.
    pub fn active_branch_count(&self) -> usize {
        self.branches.iter().filter(|b| !b.is_deleted).count()
    }

    pub fn get_child_branches(&self, parent_id: &BranchId) -> Vec<Branch> {
        self.branches
            .iter()
            .filter(|b| !b.is_deleted && b.parent_id.as_ref() == Some(parent_id))
            .map(|b| b.clone())
            .collect()
    }

    /// Restore's fork-from-history (§4.9): unlike `create_branch`, base and
    /// head both land on `target_lsn` rather than the parent's current head.
    pub async fn fork_branch_at(
        &self,
        source: &Branch,
        name: &str,
        target_lsn: Lsn,
    ) -> Result<Branch> {
        if self.get_branch(&source.project_id, name).is_some() {
            return Err(ArgonError::BranchExists {
                project_id: source.project_id.to_string(),
                name: name.to_string(),
            });
        }

        let id = BranchId::generate();
        let entry = WalEntry::new(source.project_id.as_str(), id.as_str(), Operation::CreateBranch)
            .with_document(serde_json::json!({
                "name": name,
                "parent_id": source.id.to_string(),
                "fork_lsn": target_lsn.0,
            }));
        let created_lsn = self.wal.append(entry).await?;

        let branch = Branch {
            id,
            project_id: source.project_id.clone(),
            name: name.to_string(),
            parent_id: Some(source.id.clone()),
            head_lsn: target_lsn,
            base_lsn: target_lsn,
            created_at: Utc::now(),
            created_lsn,
            is_deleted: false,
        };

        self.branches.insert(branch.id.to_string(), branch.clone());
        Ok(branch)
    }
}
