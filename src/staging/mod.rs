//! Operator input kept between picking a solution and confirming it.
//!
//! Entries are addressed by [`StagingKey`], the pair (project, solutions
//! group). Nothing outside a project's namespace is ever visible to it.

pub mod file;
pub mod memory;

pub use file::FileStagingStore;
pub use memory::MemoryStagingStore;

use crate::config::{StagingBackend, StagingConfig};
use crate::error::StagingResult;
use crate::suggestion::SolutionValues;
use crate::types::{CookieSuggestionId, ProjectId, SolutionUniqueId, SolutionsUniqueId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Composite key of a staged entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StagingKey {
    pub project_id: ProjectId,
    pub solutions_unique_id: SolutionsUniqueId,
}

impl StagingKey {
    pub fn new(project_id: ProjectId, solutions_unique_id: SolutionsUniqueId) -> Self {
        Self {
            project_id,
            solutions_unique_id,
        }
    }
}

/// A solution the operator picked but has not confirmed yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagedSolution {
    pub project_id: ProjectId,
    pub solutions_unique_id: SolutionsUniqueId,
    pub solution_unique_id: SolutionUniqueId,
    /// Kept as submitted; parsed when the entry is resolved
    pub solution_type: String,
    pub cookie_suggestion_id: CookieSuggestionId,
    #[serde(default)]
    pub values: SolutionValues,
    pub staged_at: DateTime<Utc>,
}

impl StagedSolution {
    pub fn new(
        project_id: ProjectId,
        solutions_unique_id: SolutionsUniqueId,
        solution_unique_id: SolutionUniqueId,
        solution_type: impl Into<String>,
        cookie_suggestion_id: CookieSuggestionId,
        values: SolutionValues,
    ) -> Self {
        Self {
            project_id,
            solutions_unique_id,
            solution_unique_id,
            solution_type: solution_type.into(),
            cookie_suggestion_id,
            values,
            staged_at: Utc::now(),
        }
    }

    pub fn key(&self) -> StagingKey {
        StagingKey::new(self.project_id.clone(), self.solutions_unique_id.clone())
    }
}

/// Key/value contract every staging medium implements.
///
/// Writes to the same key are last-writer-wins. Removing an absent key is
/// not an error.
pub trait StagingStore: Send + Sync {
    /// Insert or overwrite the entry at `entry.key()`
    fn store(&self, entry: StagedSolution) -> StagingResult<()>;

    fn get(&self, key: &StagingKey) -> StagingResult<Option<StagedSolution>>;

    /// Point-in-time copy of every entry staged for the project
    fn get_all(
        &self,
        project_id: &ProjectId,
    ) -> StagingResult<HashMap<SolutionsUniqueId, StagedSolution>>;

    fn remove(&self, key: &StagingKey) -> StagingResult<()>;

    fn remove_all(&self, project_id: &ProjectId) -> StagingResult<()>;
}

/// Open the store selected by configuration
pub fn open_store(config: &StagingConfig) -> Arc<dyn StagingStore> {
    match config.backend {
        StagingBackend::Memory => Arc::new(MemoryStagingStore::new()),
        StagingBackend::File => Arc::new(FileStagingStore::new(&config.directory)),
    }
}
