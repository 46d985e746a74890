//! Triage of crawled cookies against a project's cookie catalog.
//!
//! Crawl results are classified into buckets, the operator stages one of the
//! offered solutions per suggestion, and resolution turns staged solutions
//! into catalog commands.

pub mod catalog;
pub mod config;
pub mod display;
pub mod error;
pub mod exit_code;
pub mod hashing;
pub mod logging;
pub mod matcher;
pub mod resolution;
pub mod staging;
pub mod suggestion;
pub mod types;

// Explicit exports for better API clarity
pub use catalog::{CatalogCommand, CatalogSnapshot, CommandBus, InMemoryCatalog, QueryBus};
pub use config::Settings;
pub use error::{
    BatchError, Cancelled, CatalogError, CatalogResult, ErrorKind, ResolutionError, StagingError,
    StagingResult, WorkflowError, WorkflowResult,
};
pub use exit_code::ExitCode;
pub use matcher::match_domain;
pub use resolution::{
    BatchSummary, NotificationMode, ResolutionOutcome, Resolver, SolutionRequest, StageOutcome,
};
pub use staging::{StagedSolution, StagingKey, StagingStore};
pub use suggestion::{
    ClassificationType, CookieSuggestion, DiscoveredFact, IgnoreState, SuggestionsResult, classify,
};
pub use types::{
    CategoryId, CookieId, CookieProviderId, CookieSuggestionId, ProjectId, SolutionUniqueId,
    SolutionsUniqueId,
};
