//! Exit codes for CLI operations following Unix conventions.
//!
//! # Exit Code Semantics
//!
//! - `0`: Success
//! - `1`: General error - unspecified failure
//! - `2`: Blocking error - the workflow cannot run for this project
//! - `3-125`: Specific recoverable errors
//! - `126-255`: Reserved by shell

use crate::error::{BatchError, ErrorKind, ResolutionError, WorkflowError};

/// Standard exit codes for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    /// Operation succeeded (code 0)
    Success = 0,

    /// Unspecified error occurred (code 1)
    GeneralError = 1,

    /// Workflow refused to start, e.g. crawler disabled (code 2)
    BlockingError = 2,

    /// Referenced project, suggestion or cookie does not exist (code 3)
    NotFound = 3,

    /// Operator input was rejected (code 4)
    ValidationError = 4,

    /// Staging or catalog file could not be read or written (code 5)
    IoError = 5,

    /// Configuration error (code 6)
    ConfigError = 6,

    /// Some staged solutions could not be resolved (code 7)
    PartialFailure = 7,

    /// Solution type not supported (code 8)
    UnsupportedOperation = 8,

    /// Interrupted before completion (code 130)
    Cancelled = 130,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code as i32
    }
}

impl ExitCode {
    /// Exit code for a failed resolution reported in an outcome
    pub fn from_resolution_error(error: &ResolutionError) -> Self {
        match error.kind() {
            ErrorKind::Validation => ExitCode::ValidationError,
            ErrorKind::NotFound => ExitCode::NotFound,
            ErrorKind::UnsupportedSolution => ExitCode::UnsupportedOperation,
            ErrorKind::Unexpected => ExitCode::GeneralError,
        }
    }

    pub fn from_workflow_error(error: &WorkflowError) -> Self {
        match error {
            WorkflowError::ProjectNotFound { .. } => ExitCode::NotFound,
            WorkflowError::CrawlerDisabled => ExitCode::BlockingError,
            WorkflowError::Catalog(_) => ExitCode::GeneralError,
            WorkflowError::Staging(_) => ExitCode::IoError,
        }
    }

    pub fn from_batch_error(error: &BatchError) -> Self {
        match error {
            BatchError::Cancelled(_) => ExitCode::Cancelled,
            BatchError::Staging(_) => ExitCode::IoError,
        }
    }

    /// Map an error reaching the top of the binary
    pub fn from_anyhow(error: &anyhow::Error) -> Self {
        if let Some(error) = error.downcast_ref::<WorkflowError>() {
            return Self::from_workflow_error(error);
        }
        if let Some(error) = error.downcast_ref::<ResolutionError>() {
            return Self::from_resolution_error(error);
        }
        if let Some(error) = error.downcast_ref::<BatchError>() {
            return Self::from_batch_error(error);
        }
        if error.downcast_ref::<crate::error::Cancelled>().is_some() {
            return ExitCode::Cancelled;
        }
        if error.downcast_ref::<crate::error::StagingError>().is_some() {
            return ExitCode::IoError;
        }
        if error.downcast_ref::<figment::Error>().is_some() {
            return ExitCode::ConfigError;
        }
        ExitCode::GeneralError
    }

    /// Batch runs with failures still ran to completion
    pub fn from_batch_errors(errors: usize) -> Self {
        if errors == 0 {
            ExitCode::Success
        } else {
            ExitCode::PartialFailure
        }
    }

    #[must_use]
    pub fn is_blocking(&self) -> bool {
        matches!(self, ExitCode::BlockingError)
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, ExitCode::Success)
    }

    /// Get a human-readable description of the exit code.
    pub fn description(&self) -> &str {
        match self {
            ExitCode::Success => "Success",
            ExitCode::GeneralError => "General error",
            ExitCode::BlockingError => "Blocking error - workflow cannot run",
            ExitCode::NotFound => "Not found",
            ExitCode::ValidationError => "Validation error",
            ExitCode::IoError => "I/O error",
            ExitCode::ConfigError => "Configuration error",
            ExitCode::PartialFailure => "Some solutions were not resolved",
            ExitCode::UnsupportedOperation => "Unsupported operation",
            ExitCode::Cancelled => "Cancelled",
        }
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.description(), *self as u8)
    }
}
