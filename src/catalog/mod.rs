//! Boundary to the cookie catalog collaborator.
//!
//! The catalog owns projects, cookies, categories, providers and suggestion
//! records. This crate only reads views through [`QueryBus`] and asks for
//! changes through [`CommandBus`]; how the catalog enforces its own
//! invariants is not our concern beyond the
//! [`CatalogError`](crate::error::CatalogError) it reports.

pub mod command;
pub mod memory;

pub use command::{
    CatalogCommand, CreateCookieCommand, CreateCookieSuggestionCommand, Environments,
    UpdateCookieCommand,
};
pub use memory::{CatalogDocument, InMemoryCatalog};

use crate::error::CatalogResult;
use crate::suggestion::CookieSuggestion;
use crate::types::{CategoryId, CookieId, CookieProviderId, CookieSuggestionId, ProjectId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Processing time values the cookie form treats specially
pub mod processing_time {
    pub const PERSISTENT: &str = "persistent";
    pub const SESSION: &str = "session";
    /// Form-only marker: the real value lives in `processing_time_mask`
    pub const EXPIRATION: &str = "expiration";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectView {
    pub id: ProjectId,
    pub code: String,
    pub name: String,
    pub domain: String,
    /// Providers already linked to the project
    #[serde(default)]
    pub cookie_provider_ids: Vec<CookieProviderId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryView {
    pub id: CategoryId,
    pub code: String,
    /// Necessary cookies may fire before any consent is given
    #[serde(default)]
    pub necessary: bool,
}

/// Provider as offered in the provider select box
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderView {
    pub id: CookieProviderId,
    /// Registrable domain identifying the provider, e.g. `google.com`
    pub code: String,
    pub name: String,
    /// Private providers are visible only to the owning project
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_to: Option<ProjectId>,
}

impl ProviderView {
    pub fn is_visible_to(&self, project_id: &ProjectId) -> bool {
        self.private_to.as_ref().is_none_or(|owner| owner == project_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieView {
    pub id: CookieId,
    pub name: String,
    #[serde(default)]
    pub domain: String,
    pub category_id: CategoryId,
    pub cookie_provider_id: CookieProviderId,
    pub processing_time: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub purposes: Vec<String>,
    #[serde(default)]
    pub environments: Environments,
}

/// What classification sees of the catalog for one project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    pub project: ProjectView,
    pub cookies: Vec<CookieView>,
    pub categories: Vec<CategoryView>,
    pub providers: Vec<ProviderView>,
}

impl CatalogSnapshot {
    pub fn category(&self, id: &CategoryId) -> Option<&CategoryView> {
        self.categories.iter().find(|category| &category.id == id)
    }

    pub fn provider(&self, id: &CookieProviderId) -> Option<&ProviderView> {
        self.providers.iter().find(|provider| &provider.id == id)
    }

    pub fn is_provider_linked(&self, id: &CookieProviderId) -> bool {
        self.project.cookie_provider_ids.contains(id)
    }

    pub fn linked_providers(&self) -> impl Iterator<Item = &ProviderView> + '_ {
        self.providers
            .iter()
            .filter(|provider| self.is_provider_linked(&provider.id))
    }
}

/// Write side of the catalog. Fire-and-forget with a success/failure signal.
#[async_trait]
pub trait CommandBus: Send + Sync {
    async fn dispatch(&self, command: CatalogCommand) -> CatalogResult<()>;
}

/// Read side of the catalog
#[async_trait]
pub trait QueryBus: Send + Sync {
    async fn get_cookie(&self, id: &CookieId) -> CatalogResult<Option<CookieView>>;

    async fn get_suggestion(
        &self,
        id: &CookieSuggestionId,
    ) -> CatalogResult<Option<CookieSuggestion>>;

    /// Public providers plus the ones private to the project
    async fn find_provider_options(&self, project_id: &ProjectId)
    -> CatalogResult<Vec<ProviderView>>;

    async fn get_project(&self, id: &ProjectId) -> CatalogResult<Option<ProjectView>>;
}
