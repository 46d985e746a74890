//! In-process catalog backed by a JSON document.
//!
//! Used by the CLI (loading and saving `catalog.json`) and by tests. Every
//! command is applied under a single write lock so it is atomic.

use super::{
    CatalogCommand, CatalogSnapshot, CategoryView, CommandBus, CookieView, CreateCookieCommand,
    ProjectView, ProviderView, QueryBus, UpdateCookieCommand,
};
use crate::error::{CatalogError, CatalogResult};
use crate::suggestion::{CookieSuggestion, DiscoveredFact};
use crate::types::{CookieId, CookieProviderId, CookieSuggestionId, ProjectId};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Serialized form of the whole catalog
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogDocument {
    #[serde(default)]
    pub projects: Vec<ProjectView>,
    #[serde(default)]
    pub categories: Vec<CategoryView>,
    #[serde(default)]
    pub providers: Vec<ProviderView>,
    #[serde(default)]
    pub cookies: Vec<CookieView>,
    #[serde(default)]
    pub suggestions: Vec<CookieSuggestion>,
    /// Crawl results per project
    #[serde(default)]
    pub facts: BTreeMap<ProjectId, Vec<DiscoveredFact>>,
    #[serde(default)]
    pub next_cookie_number: u64,
}

#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    state: RwLock<CatalogDocument>,
    journal: Mutex<Vec<CatalogCommand>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_document(document: CatalogDocument) -> Self {
        Self {
            state: RwLock::new(document),
            journal: Mutex::new(Vec::new()),
        }
    }

    /// Load from a JSON file; a missing file yields an empty catalog
    pub fn load(path: &Path) -> CatalogResult<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let content = fs::read_to_string(path).map_err(|e| {
            CatalogError::Backend(format!("Failed to read '{}': {e}", path.display()))
        })?;
        let document: CatalogDocument = serde_json::from_str(&content).map_err(|e| {
            CatalogError::Backend(format!("Failed to parse '{}': {e}", path.display()))
        })?;

        Ok(Self::from_document(document))
    }

    pub fn save(&self, path: &Path) -> CatalogResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                CatalogError::Backend(format!("Failed to create '{}': {e}", parent.display()))
            })?;
        }

        let content = serde_json::to_string_pretty(&*self.state.read())
            .map_err(|e| CatalogError::Backend(format!("Failed to serialize catalog: {e}")))?;
        fs::write(path, content).map_err(|e| {
            CatalogError::Backend(format!("Failed to write '{}': {e}", path.display()))
        })
    }

    pub fn document(&self) -> CatalogDocument {
        self.state.read().clone()
    }

    pub fn insert_project(&self, project: ProjectView) {
        let mut state = self.state.write();
        state.projects.retain(|p| p.id != project.id);
        state.projects.push(project);
    }

    pub fn insert_category(&self, category: CategoryView) {
        let mut state = self.state.write();
        state.categories.retain(|c| c.id != category.id);
        state.categories.push(category);
    }

    pub fn insert_provider(&self, provider: ProviderView) {
        let mut state = self.state.write();
        state.providers.retain(|p| p.id != provider.id);
        state.providers.push(provider);
    }

    pub fn insert_cookie(&self, cookie: CookieView) {
        let mut state = self.state.write();
        state.cookies.retain(|c| c.id != cookie.id);
        state.cookies.push(cookie);
    }

    pub fn record_facts(&self, project_id: &ProjectId, facts: impl IntoIterator<Item = DiscoveredFact>) {
        self.state
            .write()
            .facts
            .entry(project_id.clone())
            .or_default()
            .extend(facts);
    }

    pub fn facts(&self, project_id: &ProjectId) -> Vec<DiscoveredFact> {
        self.state
            .read()
            .facts
            .get(project_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn suggestions(&self, project_id: &ProjectId) -> Vec<CookieSuggestion> {
        self.state
            .read()
            .suggestions
            .iter()
            .filter(|s| &s.project_id == project_id)
            .cloned()
            .collect()
    }

    /// Upsert suggestion records returned by classification
    pub fn save_suggestions(&self, records: impl IntoIterator<Item = CookieSuggestion>) {
        let mut state = self.state.write();
        for record in records {
            match state.suggestions.iter_mut().find(|s| s.id == record.id) {
                Some(existing) => *existing = record,
                None => state.suggestions.push(record),
            }
        }
    }

    pub fn snapshot(&self, project_id: &ProjectId) -> CatalogResult<CatalogSnapshot> {
        let state = self.state.read();
        let project = state
            .projects
            .iter()
            .find(|p| &p.id == project_id)
            .cloned()
            .ok_or_else(|| CatalogError::not_found("Project", project_id.as_str()))?;

        Ok(CatalogSnapshot {
            project,
            cookies: state.cookies.clone(),
            categories: state.categories.clone(),
            providers: state
                .providers
                .iter()
                .filter(|p| p.is_visible_to(project_id))
                .cloned()
                .collect(),
        })
    }

    /// Commands applied so far, oldest first
    pub fn dispatched(&self) -> Vec<CatalogCommand> {
        self.journal.lock().clone()
    }

    fn apply(state: &mut CatalogDocument, command: &CatalogCommand) -> CatalogResult<()> {
        match command {
            CatalogCommand::CreateCookie(create) => Self::create_cookie(state, create),
            CatalogCommand::UpdateCookie(update) => Self::update_cookie(state, update),
            CatalogCommand::IgnoreSuggestionUntilNextOccurrence { suggestion_id } => {
                Self::suggestion_mut(state, suggestion_id)?.ignore(false);
                Ok(())
            }
            CatalogCommand::IgnoreSuggestionPermanently { suggestion_id } => {
                Self::suggestion_mut(state, suggestion_id)?.ignore(true);
                Ok(())
            }
            CatalogCommand::DoNotIgnoreSuggestion { suggestion_id } => {
                Self::suggestion_mut(state, suggestion_id)?.do_not_ignore();
                Ok(())
            }
            CatalogCommand::AddCookieProvidersToProject {
                project_id,
                provider_ids,
            } => {
                if let Some(missing) = provider_ids
                    .iter()
                    .find(|id| !state.providers.iter().any(|p| &p.id == *id))
                {
                    return Err(CatalogError::not_found("CookieProvider", missing.as_str()));
                }

                let project = state
                    .projects
                    .iter_mut()
                    .find(|p| &p.id == project_id)
                    .ok_or_else(|| CatalogError::not_found("Project", project_id.as_str()))?;

                for id in provider_ids {
                    if !project.cookie_provider_ids.contains(id) {
                        project.cookie_provider_ids.push(id.clone());
                    }
                }
                Ok(())
            }
            CatalogCommand::CreateCookieSuggestion(create) => {
                if state.suggestions.iter().any(|s| s.id == create.suggestion_id) {
                    return Err(CatalogError::Invariant {
                        reason: format!("Suggestion '{}' already exists", create.suggestion_id),
                    });
                }

                let mut suggestion = CookieSuggestion::with_id(
                    create.suggestion_id.clone(),
                    create.project_id.clone(),
                    create.name.clone(),
                    create.domain.clone(),
                );
                suggestion.last_occurrence = create.occurrences.iter().copied().reduce(|a, b| {
                    if b.is_newer_than(&a) { b } else { a }
                });
                state.suggestions.push(suggestion);
                Ok(())
            }
        }
    }

    fn create_cookie(state: &mut CatalogDocument, create: &CreateCookieCommand) -> CatalogResult<()> {
        let category_id = create
            .category_id
            .clone()
            .ok_or_else(|| CatalogError::Invariant {
                reason: "A cookie requires a category".to_string(),
            })?;
        let provider_id = create
            .cookie_provider_id
            .clone()
            .ok_or_else(|| CatalogError::Invariant {
                reason: "A cookie requires a provider".to_string(),
            })?;

        Self::ensure_references(state, &category_id, &provider_id)?;
        Self::ensure_unique_name(state, &provider_id, &create.name, None)?;

        state.next_cookie_number += 1;
        let id = CookieId::new(format!("cookie-{}", state.next_cookie_number));
        state.cookies.push(CookieView {
            id,
            name: create.name.clone(),
            domain: create.domain.clone(),
            category_id,
            cookie_provider_id: provider_id,
            processing_time: create.processing_time.clone(),
            active: create.active,
            purposes: create.purposes.clone(),
            environments: create.environments.clone(),
        });
        Ok(())
    }

    fn update_cookie(state: &mut CatalogDocument, update: &UpdateCookieCommand) -> CatalogResult<()> {
        let provider_id = state
            .cookies
            .iter()
            .find(|c| c.id == update.cookie_id)
            .map(|c| c.cookie_provider_id.clone())
            .ok_or_else(|| CatalogError::not_found("Cookie", update.cookie_id.as_str()))?;

        if let Some(category_id) = &update.category_id {
            Self::ensure_references(state, category_id, &provider_id)?;
        }
        Self::ensure_unique_name(state, &provider_id, &update.name, Some(&update.cookie_id))?;

        let cookie = state
            .cookies
            .iter_mut()
            .find(|c| c.id == update.cookie_id)
            .ok_or_else(|| CatalogError::not_found("Cookie", update.cookie_id.as_str()))?;

        if let Some(category_id) = &update.category_id {
            cookie.category_id = category_id.clone();
        }
        cookie.name = update.name.clone();
        cookie.domain = update.domain.clone();
        cookie.processing_time = update.processing_time.clone();
        cookie.active = update.active;
        cookie.purposes = update.purposes.clone();
        cookie.environments = update.environments.clone();
        Ok(())
    }

    fn ensure_references(
        state: &CatalogDocument,
        category_id: &crate::types::CategoryId,
        provider_id: &CookieProviderId,
    ) -> CatalogResult<()> {
        if !state.categories.iter().any(|c| &c.id == category_id) {
            return Err(CatalogError::not_found("Category", category_id.as_str()));
        }
        if !state.providers.iter().any(|p| &p.id == provider_id) {
            return Err(CatalogError::not_found("CookieProvider", provider_id.as_str()));
        }
        Ok(())
    }

    /// Cookie names are unique per provider
    fn ensure_unique_name(
        state: &CatalogDocument,
        provider_id: &CookieProviderId,
        name: &str,
        except: Option<&CookieId>,
    ) -> CatalogResult<()> {
        let taken = state.cookies.iter().any(|c| {
            &c.cookie_provider_id == provider_id && c.name == name && Some(&c.id) != except
        });

        if taken {
            Err(CatalogError::NameUniqueness {
                name: name.to_string(),
            })
        } else {
            Ok(())
        }
    }

    fn suggestion_mut<'a>(
        state: &'a mut CatalogDocument,
        id: &CookieSuggestionId,
    ) -> CatalogResult<&'a mut CookieSuggestion> {
        state
            .suggestions
            .iter_mut()
            .find(|s| &s.id == id)
            .ok_or_else(|| CatalogError::not_found("CookieSuggestion", id.as_str()))
    }
}

#[async_trait]
impl CommandBus for InMemoryCatalog {
    async fn dispatch(&self, command: CatalogCommand) -> CatalogResult<()> {
        let mut state = self.state.write();
        Self::apply(&mut state, &command)?;
        drop(state);

        debug!(command = command.name(), "Catalog command applied");
        self.journal.lock().push(command);
        Ok(())
    }
}

#[async_trait]
impl QueryBus for InMemoryCatalog {
    async fn get_cookie(&self, id: &CookieId) -> CatalogResult<Option<CookieView>> {
        Ok(self.state.read().cookies.iter().find(|c| &c.id == id).cloned())
    }

    async fn get_suggestion(
        &self,
        id: &CookieSuggestionId,
    ) -> CatalogResult<Option<CookieSuggestion>> {
        Ok(self
            .state
            .read()
            .suggestions
            .iter()
            .find(|s| &s.id == id)
            .cloned())
    }

    async fn find_provider_options(
        &self,
        project_id: &ProjectId,
    ) -> CatalogResult<Vec<ProviderView>> {
        let mut options: Vec<ProviderView> = self
            .state
            .read()
            .providers
            .iter()
            .filter(|p| p.is_visible_to(project_id))
            .cloned()
            .collect();
        options.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(options)
    }

    async fn get_project(&self, id: &ProjectId) -> CatalogResult<Option<ProjectView>> {
        Ok(self.state.read().projects.iter().find(|p| &p.id == id).cloned())
    }
}
