//! Solution kinds offered for a suggestion and the values they carry.

use crate::error::ResolutionError;
use crate::hashing::short_hash;
use crate::types::{CookieSuggestionId, SolutionUniqueId, SolutionsUniqueId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Free-form values attached to a solution (args, staged form input)
pub type SolutionValues = serde_json::Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolutionKind {
    IgnoreUntilNextOccurrence,
    IgnorePermanently,
    DoNotIgnore,
    AssociateCookieProviderWithProject,
    ChangeCookieCategory,
    CreateNewCookie,
    CreateNewCookieWithNotAcceptedCategory,
}

impl SolutionKind {
    pub const ALL: [SolutionKind; 7] = [
        Self::IgnoreUntilNextOccurrence,
        Self::IgnorePermanently,
        Self::DoNotIgnore,
        Self::AssociateCookieProviderWithProject,
        Self::ChangeCookieCategory,
        Self::CreateNewCookie,
        Self::CreateNewCookieWithNotAcceptedCategory,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IgnoreUntilNextOccurrence => "ignore_until_next_occurrence",
            Self::IgnorePermanently => "ignore_permanently",
            Self::DoNotIgnore => "do_not_ignore",
            Self::AssociateCookieProviderWithProject => "associate_cookie_provider_with_project",
            Self::ChangeCookieCategory => "change_cookie_category",
            Self::CreateNewCookie => "create_new_cookie",
            Self::CreateNewCookieWithNotAcceptedCategory => {
                "create_new_cookie_with_not_accepted_category"
            }
        }
    }

    /// Kinds that need the cookie form filled in before they can be resolved
    pub fn requires_form(&self) -> bool {
        matches!(
            self,
            Self::ChangeCookieCategory
                | Self::CreateNewCookie
                | Self::CreateNewCookieWithNotAcceptedCategory
        )
    }
}

impl fmt::Display for SolutionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SolutionKind {
    type Err = ResolutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ResolutionError::UnsupportedSolution {
                solution_type: s.to_string(),
            })
    }
}

/// A single solution the operator can pick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolutionOffer {
    pub solution_unique_id: SolutionUniqueId,
    pub kind: SolutionKind,
    #[serde(default)]
    pub args: SolutionValues,
}

/// All solutions offered for one suggestion, sharing the staging key half
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolutionGroup {
    pub solutions_unique_id: SolutionsUniqueId,
    pub offers: Vec<SolutionOffer>,
}

impl SolutionGroup {
    /// The group id changes with the bucket so a staged solution from a
    /// previous classification is not mistaken for a current one.
    pub fn new(suggestion_id: &CookieSuggestionId, bucket: &str) -> Self {
        Self {
            solutions_unique_id: SolutionsUniqueId::new(short_hash(
                &[suggestion_id.as_str(), bucket],
                16,
            )),
            offers: Vec::new(),
        }
    }

    pub fn offer(&mut self, kind: SolutionKind, args: SolutionValues) {
        let args_json = Value::Object(args.clone()).to_string();
        let solution_unique_id = SolutionUniqueId::new(short_hash(
            &[self.solutions_unique_id.as_str(), kind.as_str(), &args_json],
            16,
        ));
        self.offers.push(SolutionOffer {
            solution_unique_id,
            kind,
            args,
        });
    }

    pub fn find(&self, kind: SolutionKind) -> Option<&SolutionOffer> {
        self.offers.iter().find(|offer| offer.kind == kind)
    }
}

/// Read a string value; empty strings count as absent.
pub fn text<'a>(values: &'a SolutionValues, key: &str) -> Option<&'a str> {
    values
        .get(key)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
}

/// Read a loosely typed boolean (`true`, `1`, `"1"`, `"true"`, `"on"`).
pub fn flag(values: &SolutionValues, key: &str) -> bool {
    values.get(key).is_some_and(is_truthy)
}

pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => matches!(s.as_str(), "1" | "true" | "on" | "yes"),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Null => false,
    }
}
