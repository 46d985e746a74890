//! Turning a staged solution into a catalog command.
//!
//! [`Resolver`] is the per-project entry point: it stages solutions, prepares
//! and accepts the cookie form, resolves one entry or the whole staging area,
//! and materializes virtual suggestions on the way. Resolution never lets a
//! failure escape as an error except caller cancellation; every other failure
//! is reported inside [`ResolutionOutcome`] and the staged input is kept.

pub mod batch;
pub mod dispatcher;
pub mod form;
pub mod virtual_suggestion;

pub use batch::BatchSummary;
pub use dispatcher::Resolver;
pub use form::{CookieFormContext, CookieFormValues};

use crate::error::{CatalogError, Cancelled, ResolutionError};
use crate::staging::StagedSolution;
use crate::suggestion::SolutionValues;
use crate::types::{CookieSuggestionId, SolutionUniqueId, SolutionsUniqueId};
use serde::{Deserialize, Serialize};

/// Notice keys shown to the operator
pub mod notice {
    pub const SUGGESTION_RESOLVED: &str = "suggestion_resolved";
    pub const COOKIE_IS_NO_LONGER_IGNORED: &str = "cookie_is_no_longer_ignored";
    pub const UNABLE_TO_RESOLVE_SOLUTION: &str = "unable_to_resolve_solution";
    pub const UNABLE_TO_PROCESS_SOLUTION: &str = "unable_to_process_solution";
    pub const MULTIPLE_SUGGESTIONS_RESOLVED: &str = "multiple_suggestions_resolved";
    pub const UNABLE_TO_RESOLVE_MULTIPLE_SOLUTIONS: &str = "unable_to_resolve_multiple_solutions";
    pub const RESOLVED_SOLUTION_IS_STILL_STAGED: &str = "resolved_solution_is_still_staged";
}

/// What the operator asked to resolve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolutionRequest {
    pub cookie_suggestion_id: CookieSuggestionId,
    pub solutions_unique_id: SolutionsUniqueId,
    pub solution_unique_id: SolutionUniqueId,
    pub solution_type: String,
    /// Fields missing here are taken from the staged entry
    #[serde(default)]
    pub values: SolutionValues,
}

impl From<StagedSolution> for SolutionRequest {
    fn from(staged: StagedSolution) -> Self {
        Self {
            cookie_suggestion_id: staged.cookie_suggestion_id,
            solutions_unique_id: staged.solutions_unique_id,
            solution_unique_id: staged.solution_unique_id,
            solution_type: staged.solution_type,
            values: staged.values,
        }
    }
}

/// Whether per-item notices are produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationMode {
    Notify,
    /// Batch runs report totals only
    Quiet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub key: String,
    /// Set for notices about several suggestions at once
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

impl Notice {
    pub fn success(key: &str) -> Self {
        Self {
            level: NoticeLevel::Success,
            key: key.to_string(),
            count: None,
        }
    }

    pub fn error(key: &str) -> Self {
        Self {
            level: NoticeLevel::Error,
            key: key.to_string(),
            count: None,
        }
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Follow-up the presentation layer should perform after a failure
#[derive(Debug, Clone, PartialEq)]
pub enum FormFollowUp {
    /// Show the cookie form again with the errors attached
    ReopenForm {
        request: SolutionRequest,
        field_errors: Vec<FieldError>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionOutcome {
    pub success: bool,
    pub error: Option<ResolutionError>,
    pub notice: Option<Notice>,
    pub follow_up: Option<FormFollowUp>,
    /// Resolved, but the staged entry could not be removed. It must be reset
    /// before the next batch run or the command is sent again.
    pub still_staged: Option<SolutionsUniqueId>,
}

impl ResolutionOutcome {
    pub fn resolved(notice: Option<Notice>) -> Self {
        Self {
            success: true,
            error: None,
            notice,
            follow_up: None,
            still_staged: None,
        }
    }

    pub fn resolved_but_staged(
        solutions_unique_id: SolutionsUniqueId,
        notice: Option<Notice>,
    ) -> Self {
        Self {
            still_staged: Some(solutions_unique_id),
            ..Self::resolved(notice)
        }
    }

    pub fn failed(error: ResolutionError, notice: Option<Notice>) -> Self {
        Self {
            success: false,
            error: Some(error),
            notice,
            follow_up: None,
            still_staged: None,
        }
    }
}

/// Result of picking a solution
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome {
    /// Stored and ready to resolve
    Staged(StagedSolution),
    /// The cookie form must be filled in first
    FormRequired(Box<CookieFormContext>),
}

/// Failure of one step inside a resolution
#[derive(Debug)]
pub(crate) enum StepError {
    Cancelled,
    Failed(ResolutionError),
}

impl From<ResolutionError> for StepError {
    fn from(error: ResolutionError) -> Self {
        Self::Failed(error)
    }
}

impl From<CatalogError> for StepError {
    fn from(error: CatalogError) -> Self {
        Self::Failed(error.into())
    }
}

impl From<Cancelled> for StepError {
    fn from(_: Cancelled) -> Self {
        Self::Cancelled
    }
}
