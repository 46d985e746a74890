use super::{StagedSolution, StagingKey, StagingStore};
use crate::error::StagingResult;
use crate::types::{ProjectId, SolutionsUniqueId};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;

/// Process-local staging, sharded per project
#[derive(Clone, Debug, Default)]
pub struct MemoryStagingStore {
    projects: Arc<DashMap<ProjectId, HashMap<SolutionsUniqueId, StagedSolution>>>,
}

impl MemoryStagingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.projects.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StagingStore for MemoryStagingStore {
    fn store(&self, entry: StagedSolution) -> StagingResult<()> {
        self.projects
            .entry(entry.project_id.clone())
            .or_default()
            .insert(entry.solutions_unique_id.clone(), entry);
        Ok(())
    }

    fn get(&self, key: &StagingKey) -> StagingResult<Option<StagedSolution>> {
        Ok(self
            .projects
            .get(&key.project_id)
            .and_then(|entries| entries.get(&key.solutions_unique_id).cloned()))
    }

    fn get_all(
        &self,
        project_id: &ProjectId,
    ) -> StagingResult<HashMap<SolutionsUniqueId, StagedSolution>> {
        Ok(self
            .projects
            .get(project_id)
            .map(|entries| entries.clone())
            .unwrap_or_default())
    }

    fn remove(&self, key: &StagingKey) -> StagingResult<()> {
        let emptied = match self.projects.get_mut(&key.project_id) {
            Some(mut entries) => {
                entries.remove(&key.solutions_unique_id);
                entries.is_empty()
            }
            None => false,
        };
        // A concurrent store may have refilled the project meanwhile
        if emptied {
            self.projects
                .remove_if(&key.project_id, |_, entries| entries.is_empty());
        }
        Ok(())
    }

    fn remove_all(&self, project_id: &ProjectId) -> StagingResult<()> {
        self.projects.remove(project_id);
        Ok(())
    }
}
