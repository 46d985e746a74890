//! Suggestions for catalog cookies that were never discovered.
//!
//! Ignoring a cataloged cookie needs a suggestion record to hold the ignore
//! state. The record reuses the cookie id so materializing twice finds the
//! first record instead of creating another.

use super::StepError;
use super::dispatcher::{Resolver, guarded};
use crate::catalog::{CatalogCommand, CreateCookieSuggestionCommand};
use crate::error::ResolutionError;
use crate::suggestion::CookieSuggestion;
use crate::types::{CookieId, CookieSuggestionId};
use tokio_util::sync::CancellationToken;
use tracing::debug;

impl Resolver {
    /// Create the suggestion record standing in for catalog cookie `virtual_id`
    pub(crate) async fn materialize(
        &self,
        virtual_id: &CookieId,
        cancel: &CancellationToken,
    ) -> Result<CookieSuggestion, StepError> {
        let suggestion_id = CookieSuggestionId::new(virtual_id.as_str());

        if let Some(existing) = guarded(cancel, self.queries.get_suggestion(&suggestion_id)).await? {
            return Ok(existing);
        }

        let cookie = guarded(cancel, self.queries.get_cookie(virtual_id))
            .await?
            .ok_or_else(|| ResolutionError::not_found("Cookie", virtual_id.as_str()))?;

        let domain = if cookie.domain.trim().is_empty() {
            self.project.domain.clone()
        } else {
            cookie.domain.clone()
        };

        let command = CreateCookieSuggestionCommand {
            suggestion_id: suggestion_id.clone(),
            project_id: self.project.id.clone(),
            name: cookie.name.clone(),
            domain: domain.clone(),
            occurrences: Vec::new(),
        };
        self.dispatch(CatalogCommand::CreateCookieSuggestion(command), cancel)
            .await?;

        debug!(
            project = %self.project.id,
            cookie = %virtual_id,
            "Virtual suggestion materialized"
        );

        Ok(CookieSuggestion::with_id(
            suggestion_id,
            self.project.id.clone(),
            cookie.name,
            domain,
        ))
    }
}
