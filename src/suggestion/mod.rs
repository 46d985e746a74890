//! Suggestion records and the classifier that buckets crawl results.
//!
//! A suggestion is the project-scoped record for one discovered (domain, name)
//! pair. Its identity survives re-crawls so ignoring and re-surfacing work;
//! the bucket it lands in is recomputed on every read by [`classify`].

pub mod classifier;
pub mod solution;

pub use classifier::{ClassifiedSuggestion, SuggestionsResult, UncrawledCookie, classify};
pub use solution::{SolutionGroup, SolutionKind, SolutionOffer, SolutionValues};

use crate::hashing::short_hash;
use crate::matcher::normalize_domain;
use crate::types::{CookieSuggestionId, ProjectId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One cookie the crawler observed. Immutable input to classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredFact {
    pub domain: String,
    pub cookie_name: String,
    pub first_seen_at: DateTime<Utc>,
    pub occurrence_count: u64,
    /// Consent category codes granted when the cookie was observed.
    /// `None` when the crawler could not tell.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted_categories: Option<Vec<String>>,
}

impl DiscoveredFact {
    pub fn new(
        domain: impl Into<String>,
        cookie_name: impl Into<String>,
        first_seen_at: DateTime<Utc>,
        occurrence_count: u64,
    ) -> Self {
        Self {
            domain: domain.into(),
            cookie_name: cookie_name.into(),
            first_seen_at,
            occurrence_count,
            accepted_categories: None,
        }
    }

    pub fn with_accepted_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.accepted_categories = Some(categories.into_iter().map(Into::into).collect());
        self
    }
}

/// Aggregated sightings of a suggestion, used to detect new occurrences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
    pub count: u64,
    pub first_seen_at: DateTime<Utc>,
}

impl Occurrence {
    /// A higher count or a newer sighting counts as a new occurrence.
    pub fn is_newer_than(&self, other: &Occurrence) -> bool {
        self.count > other.count || self.first_seen_at > other.first_seen_at
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreState {
    #[default]
    #[serde(rename = "none")]
    NotIgnored,
    IgnoredUntilNextOccurrence,
    IgnoredPermanently,
}

impl IgnoreState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotIgnored => "none",
            Self::IgnoredUntilNextOccurrence => "ignored_until_next_occurrence",
            Self::IgnoredPermanently => "ignored_permanently",
        }
    }
}

/// Classification bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationType {
    Missing,
    Unassociated,
    Problematic,
    Unproblematic,
    Ignored,
}

impl ClassificationType {
    pub const ALL: [ClassificationType; 5] = [
        Self::Missing,
        Self::Unassociated,
        Self::Problematic,
        Self::Unproblematic,
        Self::Ignored,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::Unassociated => "unassociated",
            Self::Problematic => "problematic",
            Self::Unproblematic => "unproblematic",
            Self::Ignored => "ignored",
        }
    }

    /// Every bucket except `Ignored` counts towards resolvable suggestions.
    pub fn is_resolvable(&self) -> bool {
        !matches!(self, Self::Ignored)
    }
}

impl fmt::Display for ClassificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persistent suggestion record. Never deleted; only its ignore state moves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieSuggestion {
    pub id: CookieSuggestionId,
    pub project_id: ProjectId,
    pub name: String,
    pub domain: String,
    #[serde(default)]
    pub ignore_state: IgnoreState,
    /// Occurrence snapshot taken when the suggestion was ignored until next occurrence
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignored_at: Option<Occurrence>,
    /// Latest occurrence seen by classification
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_occurrence: Option<Occurrence>,
}

impl CookieSuggestion {
    /// Create a record for a first sighting; the id is derived from the
    /// (project, domain, name) triple.
    pub fn new(project_id: ProjectId, name: impl Into<String>, domain: impl Into<String>) -> Self {
        let name = name.into();
        let domain = normalize_domain(&domain.into());
        let id = Self::stable_id(&project_id, &domain, &name);
        Self::with_id(id, project_id, name, domain)
    }

    pub fn with_id(
        id: CookieSuggestionId,
        project_id: ProjectId,
        name: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            id,
            project_id,
            name: name.into(),
            domain: normalize_domain(&domain.into()),
            ignore_state: IgnoreState::NotIgnored,
            ignored_at: None,
            last_occurrence: None,
        }
    }

    pub fn stable_id(project_id: &ProjectId, domain: &str, name: &str) -> CookieSuggestionId {
        CookieSuggestionId::new(short_hash(
            &[project_id.as_str(), &normalize_domain(domain), name],
            32,
        ))
    }

    pub fn is_ignored(&self) -> bool {
        self.ignore_state != IgnoreState::NotIgnored
    }

    /// Apply an ignore command. Returns `false` when nothing changed:
    /// re-ignoring until next occurrence without a new sighting is a no-op.
    pub fn ignore(&mut self, permanently: bool) -> bool {
        let target = if permanently {
            IgnoreState::IgnoredPermanently
        } else {
            IgnoreState::IgnoredUntilNextOccurrence
        };

        if self.ignore_state == target {
            return false;
        }

        self.ignore_state = target;
        self.ignored_at = if permanently {
            None
        } else {
            self.last_occurrence
        };
        true
    }

    /// Clear any ignore state. Returns `false` when it was not ignored.
    pub fn do_not_ignore(&mut self) -> bool {
        if !self.is_ignored() {
            return false;
        }
        self.ignore_state = IgnoreState::NotIgnored;
        self.ignored_at = None;
        true
    }
}
