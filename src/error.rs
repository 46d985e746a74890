//! Error types for the cookie triage workflow
//!
//! This module provides structured error types using thiserror. Collaborator
//! failures (`CatalogError`, `StagingError`) are kept separate from the error
//! kinds a resolution reports back to the operator (`ResolutionError`).

use std::path::PathBuf;
use thiserror::Error;

/// Errors reported by the catalog collaborator (command and query buses)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// A cookie with the same name already exists where it must be unique
    #[error("Cookie name '{name}' is already in use")]
    NameUniqueness { name: String },

    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    /// Any other aggregate invariant the catalog refused to break
    #[error("Catalog invariant violated: {reason}")]
    Invariant { reason: String },

    /// Infrastructure failure behind the bus
    #[error("Catalog backend failure: {0}")]
    Backend(String),
}

impl CatalogError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }
}

/// Errors specific to the staging medium
#[derive(Error, Debug)]
pub enum StagingError {
    #[error("Staging I/O failed at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Staged data could not be (de)serialized: {0}")]
    Serialization(String),
}

impl StagingError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Recovery classes a resolution failure falls into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Expected, user-recoverable input problem
    Validation,
    /// Referenced suggestion, cookie or provider no longer exists
    NotFound,
    /// Programming or configuration error
    UnsupportedSolution,
    /// Anything else from a collaborator; logged
    Unexpected,
}

fn field_suffix(field: &Option<String>) -> String {
    field
        .as_ref()
        .map(|f| format!(" for '{f}'"))
        .unwrap_or_default()
}

/// Error attached to a failed `ResolutionOutcome`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("Invalid input{}: {message}", field_suffix(.field))]
    Validation {
        field: Option<String>,
        message: String,
    },

    #[error(
        "Solution '{solutions_unique_id}' was staged for '{staged}' but '{requested}' was submitted"
    )]
    StaleSolution {
        solutions_unique_id: String,
        staged: String,
        requested: String,
    },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValues { field: String, reason: String },

    #[error("{entity} '{id}' not found")]
    NotFound { entity: String, id: String },

    #[error("Unsupported solution type '{solution_type}'")]
    UnsupportedSolution { solution_type: String },

    #[error("Unable to resolve solution: {message}")]
    Unexpected { message: String },
}

impl ResolutionError {
    pub fn invalid_values(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValues {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } | Self::StaleSolution { .. } | Self::InvalidValues { .. } => {
                ErrorKind::Validation
            }
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::UnsupportedSolution { .. } => ErrorKind::UnsupportedSolution,
            Self::Unexpected { .. } => ErrorKind::Unexpected,
        }
    }

    /// Field the error should be attached to when the form is re-presented
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Validation { field, .. } => field.as_deref(),
            Self::InvalidValues { field, .. } => Some(field),
            _ => None,
        }
    }

    /// Get a stable status code for this error type.
    pub fn status_code(&self) -> String {
        match self {
            Self::Validation { .. } => "VALIDATION_FAILED",
            Self::StaleSolution { .. } => "STALE_SOLUTION",
            Self::InvalidValues { .. } => "INVALID_VALUES",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::UnsupportedSolution { .. } => "UNSUPPORTED_SOLUTION",
            Self::Unexpected { .. } => "UNEXPECTED_FAILURE",
        }
        .to_string()
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::Validation { .. } => vec![
                "Correct the highlighted field and submit the form again",
                "Your previous input is still staged",
            ],
            Self::StaleSolution { .. } => vec![
                "Reload the found cookies page, the suggestion changed since it was staged",
                "Reset the staged solution to start over",
            ],
            Self::InvalidValues { .. } => {
                vec!["Reset the staged solution and pick it again"]
            }
            Self::NotFound { .. } => vec![
                "The referenced record was removed; reset the staged solution",
                "Run the crawler again to refresh suggestions",
            ],
            Self::UnsupportedSolution { .. } => {
                vec!["Reset the staged solution; this solution type is not known"]
            }
            Self::Unexpected { .. } => vec![
                "Try the operation again, your staged input was kept",
                "Check the logs for details",
            ],
        }
    }
}

impl From<CatalogError> for ResolutionError {
    fn from(error: CatalogError) -> Self {
        match error {
            CatalogError::NameUniqueness { .. } => Self::Validation {
                field: Some("name".to_string()),
                message: "name.error.duplicated_value".to_string(),
            },
            CatalogError::NotFound { entity, id } => Self::NotFound {
                entity: entity.to_string(),
                id,
            },
            CatalogError::Invariant { reason } => Self::Validation {
                field: None,
                message: reason,
            },
            CatalogError::Backend(message) => Self::Unexpected { message },
        }
    }
}

/// The caller abandoned the operation; never swallowed
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Operation was cancelled by the caller")]
pub struct Cancelled;

/// Errors that end a batch run early
#[derive(Error, Debug)]
pub enum BatchError {
    #[error(transparent)]
    Cancelled(#[from] Cancelled),

    #[error("Failed to read staged solutions: {0}")]
    Staging(#[from] StagingError),
}

/// Errors raised before a workflow for a project can start
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Project '{id}' not found")]
    ProjectNotFound { id: String },

    #[error("Crawler is disabled")]
    CrawlerDisabled,

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Staging(#[from] StagingError),
}

impl WorkflowError {
    /// Get a stable status code for this error type.
    pub fn status_code(&self) -> String {
        match self {
            Self::ProjectNotFound { .. } => "PROJECT_NOT_FOUND",
            Self::CrawlerDisabled => "CRAWLER_DISABLED",
            Self::Catalog(_) => "CATALOG_ERROR",
            Self::Staging(_) => "STAGING_ERROR",
        }
        .to_string()
    }
}

/// Result type alias for catalog collaborator calls
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Result type alias for staging operations
pub type StagingResult<T> = Result<T, StagingError>;

/// Result type alias for workflow setup
pub type WorkflowResult<T> = Result<T, WorkflowError>;
