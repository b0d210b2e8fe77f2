// Project Service (C5): project creation with an initial `main` branch.

use chrono::{DateTime, Utc};
use dashmap::{DashMap, DashSet};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::branch::{Branch, BranchService, MAIN_BRANCH_NAME};
use crate::error::{ArgonError, Result};
use crate::ids::ProjectId;
use crate::wal::{Operation, WalEntry, WalService};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub main_branch_id: crate::ids::BranchId,
    pub created_at: DateTime<Utc>,
}

/// Shared existence set `BranchService::create_branch` consults to raise
/// `ProjectNotFound` (spec §4.4). A plain `DashSet` rather than an `Arc` back
/// to `ProjectService` itself: the two services already reference each other
/// the other way (`ProjectService` holds `Arc<BranchService>`), so a second
/// full reference would be a cycle.
pub type ProjectRegistry = DashSet<String>;

pub struct ProjectService {
    wal: Arc<WalService>,
    branches: Arc<BranchService>,
    registry: Arc<ProjectRegistry>,
    projects: DashMap<String, Project>,
    names: DashMap<String, ProjectId>,
}

impl ProjectService {
    pub fn new(wal: Arc<WalService>, branches: Arc<BranchService>, registry: Arc<ProjectRegistry>) -> Self {
        Self {
            wal,
            branches,
            registry,
            projects: DashMap::new(),
            names: DashMap::new(),
        }
    }

    pub async fn create_project(&self, name: &str) -> Result<(Project, Branch)> {
        if self.names.contains_key(name) {
            return Err(ArgonError::ProjectExists(name.to_string()));
        }

        let id = ProjectId::generate();
        let entry = WalEntry::new(id.as_str(), "", Operation::CreateProject)
            .with_document(serde_json::json!({ "name": name }));
        self.wal.append(entry).await?;

        // Registered before the main branch exists so `create_branch`'s
        // existence check passes; rolled back if that branch creation fails
        // so a failed `create_project` never leaves a phantom entry behind.
        self.registry.insert(id.to_string());
        let main_branch = match self.branches.create_branch(&id, MAIN_BRANCH_NAME, None).await {
            Ok(branch) => branch,
            Err(e) => {
                self.registry.remove(id.as_str());
                return Err(e);
            }
        };

        let project = Project {
            id: id.clone(),
            name: name.to_string(),
            main_branch_id: main_branch.id.clone(),
            created_at: Utc::now(),
        };

        self.projects.insert(id.to_string(), project.clone());
        self.names.insert(name.to_string(), id);

        Ok((project, main_branch))
    }

    pub fn get_project(&self, id: &ProjectId) -> Option<Project> {
        self.projects.get(&id.to_string()).map(|p| p.clone())
    }

    pub fn get_project_by_name(&self, name: &str) -> Option<Project> {
        let id = self.names.get(name)?;
        self.get_project(&id)
    }

    /// Project count, for the monitor's `active_projects` gauge. Projects
    /// have no soft-delete of their own (C5 defines none), so this is every
    /// project created so far.
    pub fn project_count(&self) -> usize {
        self.projects.len()
    }
}
