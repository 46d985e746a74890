//! Staging persisted as one JSON document per project.
//!
//! Lets a staged solution survive between CLI invocations the way a session
//! survives between requests. Files are replaced atomically through a
//! temporary file and rename.

use super::{StagedSolution, StagingKey, StagingStore};
use crate::error::{StagingError, StagingResult};
use crate::hashing::short_hash;
use crate::types::{ProjectId, SolutionsUniqueId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

/// Version of the staging file schema
pub const STAGING_FILE_VERSION: &str = "1.0";

#[derive(Debug, Serialize, Deserialize)]
struct StagingFile {
    version: String,
    project_id: ProjectId,
    entries: BTreeMap<SolutionsUniqueId, StagedSolution>,
}

#[derive(Debug)]
pub struct FileStagingStore {
    directory: PathBuf,
    /// Serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl FileStagingStore {
    pub fn new(directory: impl AsRef<Path>) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Project ids are hashed so any id is a safe file name
    fn path_for(&self, project_id: &ProjectId) -> PathBuf {
        self.directory
            .join(format!("{}.json", short_hash(&[project_id.as_str()], 16)))
    }

    fn read(&self, project_id: &ProjectId) -> StagingResult<BTreeMap<SolutionsUniqueId, StagedSolution>> {
        let path = self.path_for(project_id);
        if !path.exists() {
            return Ok(BTreeMap::new());
        }

        let content = fs::read_to_string(&path).map_err(|e| StagingError::io(&path, e))?;
        let file: StagingFile = serde_json::from_str(&content)
            .map_err(|e| StagingError::Serialization(format!("{}: {e}", path.display())))?;

        if file.version != STAGING_FILE_VERSION {
            return Err(StagingError::Serialization(format!(
                "{}: unsupported staging file version {}",
                path.display(),
                file.version
            )));
        }

        Ok(file.entries)
    }

    fn write(
        &self,
        project_id: &ProjectId,
        entries: BTreeMap<SolutionsUniqueId, StagedSolution>,
    ) -> StagingResult<()> {
        let path = self.path_for(project_id);

        if entries.is_empty() {
            if path.exists() {
                fs::remove_file(&path).map_err(|e| StagingError::io(&path, e))?;
            }
            return Ok(());
        }

        fs::create_dir_all(&self.directory).map_err(|e| StagingError::io(&self.directory, e))?;

        let file = StagingFile {
            version: STAGING_FILE_VERSION.to_string(),
            project_id: project_id.clone(),
            entries,
        };
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| StagingError::Serialization(e.to_string()))?;

        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, json).map_err(|e| StagingError::io(&temp_path, e))?;
        fs::rename(&temp_path, &path).map_err(|e| StagingError::io(&path, e))
    }
}

impl StagingStore for FileStagingStore {
    fn store(&self, entry: StagedSolution) -> StagingResult<()> {
        let _guard = self.write_lock.lock();
        let project_id = entry.project_id.clone();
        let mut entries = self.read(&project_id)?;
        entries.insert(entry.solutions_unique_id.clone(), entry);
        self.write(&project_id, entries)
    }

    fn get(&self, key: &StagingKey) -> StagingResult<Option<StagedSolution>> {
        Ok(self
            .read(&key.project_id)?
            .remove(&key.solutions_unique_id))
    }

    fn get_all(
        &self,
        project_id: &ProjectId,
    ) -> StagingResult<HashMap<SolutionsUniqueId, StagedSolution>> {
        Ok(self.read(project_id)?.into_iter().collect())
    }

    fn remove(&self, key: &StagingKey) -> StagingResult<()> {
        let _guard = self.write_lock.lock();
        let mut entries = self.read(&key.project_id)?;
        if entries.remove(&key.solutions_unique_id).is_none() {
            return Ok(());
        }
        self.write(&key.project_id, entries)
    }

    fn remove_all(&self, project_id: &ProjectId) -> StagingResult<()> {
        let _guard = self.write_lock.lock();
        self.write(project_id, BTreeMap::new())
    }
}
