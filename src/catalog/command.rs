//! Commands issued to the catalog collaborator.

use crate::suggestion::Occurrence;
use crate::types::{CategoryId, CookieId, CookieProviderId, CookieSuggestionId, ProjectId};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Environments a cookie applies to.
///
/// `All` serializes as the literal `true`; a discrete list serializes as an
/// array where `null` stands for the default environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environments {
    All,
    Only(Vec<Option<String>>),
}

impl Default for Environments {
    fn default() -> Self {
        Self::Only(Vec::new())
    }
}

impl Serialize for Environments {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::All => serializer.serialize_bool(true),
            Self::Only(list) => list.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Environments {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Flag(bool),
            List(Vec<Option<String>>),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Flag(true) => Self::All,
            Raw::Flag(false) => Self::default(),
            Raw::List(list) => Self::Only(list),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateCookieCommand {
    pub category_id: Option<CategoryId>,
    pub cookie_provider_id: Option<CookieProviderId>,
    pub name: String,
    pub domain: String,
    pub processing_time: String,
    pub active: bool,
    pub purposes: Vec<String>,
    pub environments: Environments,
}

/// Update of an existing cookie; the provider never changes here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateCookieCommand {
    pub cookie_id: CookieId,
    pub category_id: Option<CategoryId>,
    pub name: String,
    pub domain: String,
    pub processing_time: String,
    pub active: bool,
    pub purposes: Vec<String>,
    pub environments: Environments,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateCookieSuggestionCommand {
    pub suggestion_id: CookieSuggestionId,
    pub project_id: ProjectId,
    pub name: String,
    pub domain: String,
    #[serde(default)]
    pub occurrences: Vec<Occurrence>,
}

/// Everything this workflow can ask the catalog to do. Each command is one
/// atomic write on the collaborator side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum CatalogCommand {
    CreateCookie(CreateCookieCommand),
    UpdateCookie(UpdateCookieCommand),
    IgnoreSuggestionUntilNextOccurrence {
        suggestion_id: CookieSuggestionId,
    },
    IgnoreSuggestionPermanently {
        suggestion_id: CookieSuggestionId,
    },
    DoNotIgnoreSuggestion {
        suggestion_id: CookieSuggestionId,
    },
    AddCookieProvidersToProject {
        project_id: ProjectId,
        provider_ids: Vec<CookieProviderId>,
    },
    CreateCookieSuggestion(CreateCookieSuggestionCommand),
}

impl CatalogCommand {
    pub fn ignore(suggestion_id: CookieSuggestionId, permanently: bool) -> Self {
        if permanently {
            Self::IgnoreSuggestionPermanently { suggestion_id }
        } else {
            Self::IgnoreSuggestionUntilNextOccurrence { suggestion_id }
        }
    }

    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateCookie(_) => "create_cookie",
            Self::UpdateCookie(_) => "update_cookie",
            Self::IgnoreSuggestionUntilNextOccurrence { .. } => {
                "ignore_suggestion_until_next_occurrence"
            }
            Self::IgnoreSuggestionPermanently { .. } => "ignore_suggestion_permanently",
            Self::DoNotIgnoreSuggestion { .. } => "do_not_ignore_suggestion",
            Self::AddCookieProvidersToProject { .. } => "add_cookie_providers_to_project",
            Self::CreateCookieSuggestion(_) => "create_cookie_suggestion",
        }
    }
}
