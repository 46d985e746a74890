use super::form::CookieFormValues;
use super::{
    FieldError, FormFollowUp, NotificationMode, Notice, ResolutionOutcome, SolutionRequest,
    StageOutcome, StepError, notice,
};
use crate::catalog::{CatalogCommand, CommandBus, ProjectView, QueryBus};
use crate::config::Settings;
use crate::error::{
    CatalogResult, Cancelled, ErrorKind, ResolutionError, StagingError, WorkflowError,
    WorkflowResult,
};
use crate::staging::{StagedSolution, StagingKey, StagingStore};
use crate::suggestion::solution::{is_truthy, text};
use crate::suggestion::{SolutionKind, SolutionValues};
use crate::types::{CookieId, CookieProviderId, CookieSuggestionId, ProjectId, SolutionsUniqueId};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Resolution workflow for one project
#[derive(Clone)]
pub struct Resolver {
    pub(super) project: ProjectView,
    pub(super) commands: Arc<dyn CommandBus>,
    pub(super) queries: Arc<dyn QueryBus>,
    pub(super) staging: Arc<dyn StagingStore>,
}

impl Resolver {
    pub fn new(
        project: ProjectView,
        commands: Arc<dyn CommandBus>,
        queries: Arc<dyn QueryBus>,
        staging: Arc<dyn StagingStore>,
    ) -> Self {
        Self {
            project,
            commands,
            queries,
            staging,
        }
    }

    /// Look the project up and refuse to start while the crawler is off
    pub async fn open(
        settings: &Settings,
        project_id: &ProjectId,
        commands: Arc<dyn CommandBus>,
        queries: Arc<dyn QueryBus>,
        staging: Arc<dyn StagingStore>,
    ) -> WorkflowResult<Self> {
        settings.ensure_crawler_enabled()?;

        let project = queries
            .get_project(project_id)
            .await?
            .ok_or_else(|| WorkflowError::ProjectNotFound {
                id: project_id.to_string(),
            })?;

        Ok(Self::new(project, commands, queries, staging))
    }

    pub fn project(&self) -> &ProjectView {
        &self.project
    }

    pub(super) fn key(&self, solutions_unique_id: &SolutionsUniqueId) -> StagingKey {
        StagingKey::new(self.project.id.clone(), solutions_unique_id.clone())
    }

    /// Staged entries of the project, oldest first
    pub fn staged(&self) -> Result<Vec<StagedSolution>, StagingError> {
        let mut entries: Vec<StagedSolution> =
            self.staging.get_all(&self.project.id)?.into_values().collect();
        entries.sort_by(|a, b| {
            a.staged_at
                .cmp(&b.staged_at)
                .then_with(|| a.solutions_unique_id.cmp(&b.solutions_unique_id))
        });
        Ok(entries)
    }

    /// Number of staged entries waiting for confirmation
    pub fn ready_to_resolve(&self) -> Result<usize, StagingError> {
        Ok(self.staging.get_all(&self.project.id)?.len())
    }

    pub fn reset(&self, solutions_unique_id: &SolutionsUniqueId) -> Result<(), StagingError> {
        self.staging.remove(&self.key(solutions_unique_id))
    }

    pub fn reset_all(&self) -> Result<(), StagingError> {
        self.staging.remove_all(&self.project.id)
    }

    /// Record the operator's pick.
    ///
    /// Form kinds are not stored here; the operator gets the form and its
    /// submission stages the entry.
    pub async fn stage(&self, request: SolutionRequest) -> Result<StageOutcome, ResolutionError> {
        let kind = parse_kind(&request.solution_type)?;

        if kind.requires_form() {
            let context = self.prepare_form(&request).await?;
            return Ok(StageOutcome::FormRequired(Box::new(context)));
        }

        let values = match kind {
            SolutionKind::AssociateCookieProviderWithProject => {
                let provider_id = text(&request.values, "provider_id")
                    .ok_or_else(|| ResolutionError::invalid_values("provider_id", "is required"))?;
                let mut values = SolutionValues::new();
                values.insert("provider_id".to_string(), Value::String(provider_id.to_string()));
                values
            }
            _ => request.values,
        };

        let entry = StagedSolution::new(
            self.project.id.clone(),
            request.solutions_unique_id,
            request.solution_unique_id,
            kind.as_str(),
            request.cookie_suggestion_id,
            values,
        );
        self.store(entry.clone())?;

        debug!(
            project = %self.project.id,
            solution_type = kind.as_str(),
            "Solution staged"
        );
        Ok(StageOutcome::Staged(entry))
    }

    /// Stage the submitted cookie form for a form solution
    pub fn submit_form(
        &self,
        request: SolutionRequest,
        form_values: CookieFormValues,
    ) -> Result<StagedSolution, ResolutionError> {
        let kind = parse_kind(&request.solution_type)?;
        if !kind.requires_form() {
            return Err(ResolutionError::Validation {
                field: None,
                message: format!("Solution '{kind}' has no cookie form"),
            });
        }

        let form_values = serde_json::to_value(form_values).map_err(|e| {
            ResolutionError::unexpected(format!("Failed to serialize form values: {e}"))
        })?;

        let mut values = SolutionValues::new();
        values.insert(
            "cookie_suggestion_id".to_string(),
            Value::String(request.cookie_suggestion_id.to_string()),
        );
        if kind == SolutionKind::ChangeCookieCategory {
            let existing = text(&request.values, "existing_cookie_id").ok_or_else(|| {
                ResolutionError::invalid_values("existing_cookie_id", "is required")
            })?;
            values.insert(
                "existing_cookie_id".to_string(),
                Value::String(existing.to_string()),
            );
        }
        values.insert("form_values".to_string(), form_values);

        let entry = StagedSolution::new(
            self.project.id.clone(),
            request.solutions_unique_id,
            request.solution_unique_id,
            kind.as_str(),
            request.cookie_suggestion_id,
            values,
        );
        self.store(entry.clone())?;
        Ok(entry)
    }

    fn store(&self, entry: StagedSolution) -> Result<(), ResolutionError> {
        self.staging.store(entry).map_err(|e| {
            error!(project = %self.project.id, error = %e, "Failed to stage solution");
            ResolutionError::unexpected(e.to_string())
        })
    }

    /// Resolve one solution.
    ///
    /// The staged entry is removed only after the catalog accepted the
    /// command; on any failure it stays as it was.
    pub async fn resolve(
        &self,
        request: SolutionRequest,
        mode: NotificationMode,
        cancel: &CancellationToken,
    ) -> Result<ResolutionOutcome, Cancelled> {
        if cancel.is_cancelled() {
            return Err(Cancelled);
        }

        let kind = match parse_kind(&request.solution_type) {
            Ok(kind) => kind,
            Err(e) => return Ok(self.failure(None, request, e, mode)),
        };

        let key = self.key(&request.solutions_unique_id);
        let staged = match self.staging.get(&key) {
            Ok(staged) => staged,
            Err(e) => {
                let error = ResolutionError::unexpected(e.to_string());
                return Ok(self.failure(Some(kind), request, error, mode));
            }
        };

        let mut request = request;
        if let Some(staged) = staged {
            if staged.solution_unique_id != request.solution_unique_id
                || staged.solution_type != request.solution_type
            {
                let error = ResolutionError::StaleSolution {
                    solutions_unique_id: request.solutions_unique_id.to_string(),
                    staged: format!("{}/{}", staged.solution_type, staged.solution_unique_id),
                    requested: format!("{}/{}", request.solution_type, request.solution_unique_id),
                };
                return Ok(self.failure(Some(kind), request, error, mode));
            }
            for (field, value) in staged.values {
                request.values.entry(field).or_insert(value);
            }
        }

        match self.perform(kind, &request, cancel).await {
            Ok(()) => {
                info!(
                    project = %self.project.id,
                    suggestion = %request.cookie_suggestion_id,
                    solution_type = kind.as_str(),
                    "Solution resolved"
                );

                if let Err(e) = self.staging.remove(&key) {
                    error!(
                        project = %self.project.id,
                        solutions_unique_id = %request.solutions_unique_id,
                        error = %e,
                        "Resolved solution could not be removed from staging"
                    );
                    let notice =
                        notify(mode, || Notice::error(notice::RESOLVED_SOLUTION_IS_STILL_STAGED));
                    return Ok(ResolutionOutcome::resolved_but_staged(
                        request.solutions_unique_id,
                        notice,
                    ));
                }

                let key = if kind == SolutionKind::DoNotIgnore {
                    notice::COOKIE_IS_NO_LONGER_IGNORED
                } else {
                    notice::SUGGESTION_RESOLVED
                };
                Ok(ResolutionOutcome::resolved(notify(mode, || Notice::success(key))))
            }
            Err(StepError::Cancelled) => {
                debug!(
                    project = %self.project.id,
                    solution_type = kind.as_str(),
                    "Resolution cancelled"
                );
                Err(Cancelled)
            }
            Err(StepError::Failed(error)) => Ok(self.failure(Some(kind), request, error, mode)),
        }
    }

    async fn perform(
        &self,
        kind: SolutionKind,
        request: &SolutionRequest,
        cancel: &CancellationToken,
    ) -> Result<(), StepError> {
        let command = match kind {
            SolutionKind::IgnoreUntilNextOccurrence
            | SolutionKind::IgnorePermanently
            | SolutionKind::DoNotIgnore => {
                let suggestion_id = self.target_suggestion(request, cancel).await?;
                match kind {
                    SolutionKind::DoNotIgnore => {
                        CatalogCommand::DoNotIgnoreSuggestion { suggestion_id }
                    }
                    _ => CatalogCommand::ignore(
                        suggestion_id,
                        kind == SolutionKind::IgnorePermanently,
                    ),
                }
            }
            SolutionKind::AssociateCookieProviderWithProject => {
                let provider_id = text(&request.values, "provider_id")
                    .ok_or_else(|| ResolutionError::invalid_values("provider_id", "is required"))?;
                CatalogCommand::AddCookieProvidersToProject {
                    project_id: self.project.id.clone(),
                    provider_ids: vec![CookieProviderId::new(provider_id)],
                }
            }
            SolutionKind::ChangeCookieCategory
            | SolutionKind::CreateNewCookie
            | SolutionKind::CreateNewCookieWithNotAcceptedCategory => {
                let form = CookieFormValues::from_values(&request.values)?;
                // Only a category change touches the cookie it was offered for
                let existing = (kind == SolutionKind::ChangeCookieCategory)
                    .then(|| text(&request.values, "existing_cookie_id"))
                    .flatten()
                    .map(CookieId::new);
                form.into_command(existing)?
            }
        };

        self.dispatch(command, cancel).await
    }

    /// Ignore actions may target a catalog cookie that has no suggestion yet
    async fn target_suggestion(
        &self,
        request: &SolutionRequest,
        cancel: &CancellationToken,
    ) -> Result<CookieSuggestionId, StepError> {
        match virtual_target(request) {
            Some(virtual_id) => {
                let suggestion = self.materialize(&virtual_id, cancel).await?;
                Ok(suggestion.id)
            }
            None => Ok(request.cookie_suggestion_id.clone()),
        }
    }

    pub(super) async fn dispatch(
        &self,
        command: CatalogCommand,
        cancel: &CancellationToken,
    ) -> Result<(), StepError> {
        let name = command.name();
        guarded(cancel, self.commands.dispatch(command)).await?;
        debug!(project = %self.project.id, command = name, "Command dispatched");
        Ok(())
    }

    fn failure(
        &self,
        kind: Option<SolutionKind>,
        request: SolutionRequest,
        error: ResolutionError,
        mode: NotificationMode,
    ) -> ResolutionOutcome {
        match error.kind() {
            ErrorKind::Unexpected => error!(
                project = %self.project.id,
                solution_type = %request.solution_type,
                error = %error,
                "Unable to resolve solution"
            ),
            ErrorKind::UnsupportedSolution => warn!(
                project = %self.project.id,
                solution_type = %request.solution_type,
                "Unsupported solution type"
            ),
            ErrorKind::Validation | ErrorKind::NotFound => debug!(
                project = %self.project.id,
                solution_type = %request.solution_type,
                error = %error,
                "Solution not resolved"
            ),
        }

        let reopen = mode == NotificationMode::Notify
            && kind.is_some_and(|kind| kind.requires_form())
            && error.kind() == ErrorKind::Validation;

        if let (true, Some(field)) = (reopen, error.field()) {
            let field_errors = vec![FieldError {
                field: field.to_string(),
                message: field_message(&error),
            }];
            let mut outcome = ResolutionOutcome::failed(error, None);
            outcome.follow_up = Some(FormFollowUp::ReopenForm {
                request,
                field_errors,
            });
            return outcome;
        }

        let notice = notify(mode, || Notice::error(notice::UNABLE_TO_RESOLVE_SOLUTION));
        ResolutionOutcome::failed(error, notice)
    }
}

fn parse_kind(solution_type: &str) -> Result<SolutionKind, ResolutionError> {
    solution_type.parse()
}

/// Cookie behind a virtual suggestion.
///
/// `virtual_suggestion` is either a flag, in which case the suggestion id is
/// the cookie id, or the cookie id itself.
fn virtual_target(request: &SolutionRequest) -> Option<CookieId> {
    let value = request.values.get("virtual_suggestion")?;
    match value.as_str() {
        Some(id) if !id.is_empty() && !FLAG_WORDS.contains(&id) => {
            Some(CookieId::new(id))
        }
        _ => is_truthy(value).then(|| CookieId::new(request.cookie_suggestion_id.as_str())),
    }
}

const FLAG_WORDS: [&str; 8] = ["0", "1", "true", "false", "on", "off", "yes", "no"];

fn notify(mode: NotificationMode, notice: impl FnOnce() -> Notice) -> Option<Notice> {
    match mode {
        NotificationMode::Notify => Some(notice()),
        NotificationMode::Quiet => None,
    }
}

/// Message attached to the offending form field
fn field_message(error: &ResolutionError) -> String {
    match error {
        ResolutionError::Validation { message, .. } => message.clone(),
        ResolutionError::InvalidValues { reason, .. } => reason.clone(),
        other => other.to_string(),
    }
}

/// Await a catalog call unless the caller gives up first
pub(super) async fn guarded<T>(
    cancel: &CancellationToken,
    call: impl Future<Output = CatalogResult<T>>,
) -> Result<T, StepError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(StepError::Cancelled),
        result = call => result.map_err(StepError::from),
    }
}
