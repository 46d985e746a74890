//! The cookie form used by the three form solutions.
//!
//! Preparing the form computes its default values; submitting it stages the
//! values; resolving turns them into a create or update command.

use super::dispatcher::Resolver;
use super::SolutionRequest;
use crate::catalog::{
    CatalogCommand, CookieView, CreateCookieCommand, Environments, ProviderView,
    UpdateCookieCommand, processing_time,
};
use crate::error::ResolutionError;
use crate::matcher::{match_domain, provider_code_matches};
use crate::suggestion::solution::{is_truthy, text};
use crate::suggestion::{CookieSuggestion, SolutionKind, SolutionValues};
use crate::types::{CategoryId, CookieId, CookieProviderId};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Values of the cookie form as submitted
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CookieFormValues {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub domain: Option<String>,
    /// `persistent`, `session` or `expiration`
    #[serde(default)]
    pub processing_time: String,
    /// Authoritative processing time when `processing_time` is `expiration`
    #[serde(default)]
    pub processing_time_mask: Option<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub active: bool,
    #[serde(default)]
    pub purposes: Vec<String>,
    /// Overrides `environments` when set
    #[serde(default, deserialize_with = "lenient_bool")]
    pub all_environments: bool,
    /// Empty string stands for the default environment
    #[serde(default)]
    pub environments: Vec<String>,
}

/// Checkboxes arrive as `true`, `1`, `"1"` or `"on"`
fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(is_truthy(&Value::deserialize(deserializer)?))
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl CookieFormValues {
    /// Read the form staged under `form_values`
    pub fn from_values(values: &SolutionValues) -> Result<Self, ResolutionError> {
        let raw = values
            .get("form_values")
            .ok_or_else(|| ResolutionError::invalid_values("form_values", "the cookie form was not submitted"))?;

        serde_json::from_value(raw.clone())
            .map_err(|e| ResolutionError::invalid_values("form_values", e.to_string()))
    }

    pub fn environments(&self) -> Environments {
        if self.all_environments {
            return Environments::All;
        }

        Environments::Only(
            self.environments
                .iter()
                .map(|env| (!env.is_empty()).then(|| env.clone()))
                .collect(),
        )
    }

    /// The processing time that ends up on the cookie
    pub fn effective_processing_time(&self) -> Result<String, ResolutionError> {
        match self.processing_time.trim() {
            "" => Err(ResolutionError::invalid_values("processing_time", "is required")),
            processing_time::EXPIRATION => non_empty(&self.processing_time_mask)
                .map(str::to_string)
                .ok_or_else(|| ResolutionError::invalid_values("processing_time_mask", "is required")),
            fixed => Ok(fixed.to_string()),
        }
    }

    /// Create a cookie, or update `existing_cookie_id` when given
    pub fn into_command(
        self,
        existing_cookie_id: Option<CookieId>,
    ) -> Result<CatalogCommand, ResolutionError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(ResolutionError::invalid_values("name", "is required"));
        }

        let processing_time = self.effective_processing_time()?;
        let environments = self.environments();
        let category_id = non_empty(&self.category).map(CategoryId::new);
        let domain = non_empty(&self.domain).unwrap_or_default().to_string();

        Ok(match existing_cookie_id {
            Some(cookie_id) => CatalogCommand::UpdateCookie(UpdateCookieCommand {
                cookie_id,
                category_id,
                name,
                domain,
                processing_time,
                active: self.active,
                purposes: self.purposes,
                environments,
            }),
            None => CatalogCommand::CreateCookie(CreateCookieCommand {
                category_id,
                cookie_provider_id: non_empty(&self.provider).map(CookieProviderId::new),
                name,
                domain,
                processing_time,
                active: self.active,
                purposes: self.purposes,
                environments,
            }),
        })
    }
}

/// Everything the presentation layer needs to render the cookie form
#[derive(Debug, Clone, PartialEq)]
pub struct CookieFormContext {
    pub kind: SolutionKind,
    pub request: SolutionRequest,
    pub suggestion: CookieSuggestion,
    pub existing_cookie: Option<CookieView>,
    pub provider_options: Vec<ProviderView>,
    pub defaults: CookieFormValues,
    /// Defaults come from a previous submission of the same solution
    pub restored: bool,
}

impl Resolver {
    /// Load the form for a form solution with its default values
    pub async fn prepare_form(
        &self,
        request: &SolutionRequest,
    ) -> Result<CookieFormContext, ResolutionError> {
        let kind: SolutionKind = request.solution_type.parse()?;
        if !kind.requires_form() {
            return Err(ResolutionError::Validation {
                field: None,
                message: format!("Solution '{kind}' has no cookie form"),
            });
        }

        let suggestion = self
            .queries
            .get_suggestion(&request.cookie_suggestion_id)
            .await?
            .ok_or_else(|| {
                ResolutionError::not_found("CookieSuggestion", request.cookie_suggestion_id.as_str())
            })?;

        let existing_cookie = match text(&request.values, "existing_cookie_id") {
            Some(id) => Some(
                self.queries
                    .get_cookie(&CookieId::new(id))
                    .await?
                    .ok_or_else(|| ResolutionError::not_found("Cookie", id))?,
            ),
            None => None,
        };

        let provider_options = self.queries.find_provider_options(&self.project.id).await?;

        let (defaults, restored) = match self.restore_submission(request)? {
            Some(values) => (values, true),
            None => (
                self.default_values(kind, &suggestion, existing_cookie.as_ref(), &provider_options),
                false,
            ),
        };

        Ok(CookieFormContext {
            kind,
            request: request.clone(),
            suggestion,
            existing_cookie,
            provider_options,
            defaults,
            restored,
        })
    }

    /// Form values staged earlier for exactly this solution
    fn restore_submission(
        &self,
        request: &SolutionRequest,
    ) -> Result<Option<CookieFormValues>, ResolutionError> {
        let staged = self
            .staging
            .get(&self.key(&request.solutions_unique_id))
            .map_err(|e| ResolutionError::unexpected(e.to_string()))?;

        let Some(staged) = staged else {
            return Ok(None);
        };
        if staged.solution_unique_id != request.solution_unique_id
            || staged.solution_type != request.solution_type
            || !staged.values.contains_key("form_values")
        {
            return Ok(None);
        }

        CookieFormValues::from_values(&staged.values).map(Some)
    }

    fn default_values(
        &self,
        kind: SolutionKind,
        suggestion: &CookieSuggestion,
        existing: Option<&CookieView>,
        provider_options: &[ProviderView],
    ) -> CookieFormValues {
        match (kind, existing) {
            (SolutionKind::CreateNewCookie, _) => CookieFormValues {
                name: suggestion.name.clone(),
                provider: provider_options
                    .iter()
                    .find(|provider| provider_code_matches(&provider.code, &suggestion.domain))
                    .map(|provider| provider.id.to_string()),
                domain: (!match_domain(&self.project.domain, &suggestion.domain))
                    .then(|| suggestion.domain.clone()),
                ..CookieFormValues::default()
            },
            (SolutionKind::CreateNewCookieWithNotAcceptedCategory, Some(cookie)) => {
                let (processing_time, processing_time_mask) =
                    split_processing_time(&cookie.processing_time);
                CookieFormValues {
                    name: cookie.name.clone(),
                    provider: Some(cookie.cookie_provider_id.to_string()),
                    processing_time,
                    processing_time_mask,
                    active: cookie.active,
                    purposes: cookie.purposes.clone(),
                    ..CookieFormValues::default()
                }
            }
            (SolutionKind::ChangeCookieCategory, Some(cookie)) => {
                let mut values = form_from_cookie(cookie);
                values.category = None;
                values
            }
            _ => CookieFormValues {
                name: suggestion.name.clone(),
                ..CookieFormValues::default()
            },
        }
    }
}

/// Fixed processing times stay as they are; anything else is an expiration
/// carried in the mask field.
fn split_processing_time(value: &str) -> (String, Option<String>) {
    match value {
        processing_time::PERSISTENT | processing_time::SESSION => (value.to_string(), None),
        other => (processing_time::EXPIRATION.to_string(), Some(other.to_string())),
    }
}

/// Current state of a cookie as form values
fn form_from_cookie(cookie: &CookieView) -> CookieFormValues {
    let (processing_time, processing_time_mask) = split_processing_time(&cookie.processing_time);

    let (all_environments, environments) = match &cookie.environments {
        Environments::All => (true, Vec::new()),
        Environments::Only(list) => (
            false,
            list.iter().map(|env| env.clone().unwrap_or_default()).collect(),
        ),
    };

    CookieFormValues {
        category: Some(cookie.category_id.to_string()),
        provider: Some(cookie.cookie_provider_id.to_string()),
        name: cookie.name.clone(),
        domain: (!cookie.domain.is_empty()).then(|| cookie.domain.clone()),
        processing_time,
        processing_time_mask,
        active: cookie.active,
        purposes: cookie.purposes.clone(),
        all_environments,
        environments,
    }
}
