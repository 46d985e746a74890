//! Identifier newtypes shared by every layer.
//!
//! Identifiers arrive from the presentation layer and the catalog as plain
//! strings; wrapping them keeps a cookie id from being passed where a
//! suggestion id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Project the crawl ran against
    ProjectId
);
string_id!(
    /// Cookie known to the catalog
    CookieId
);
string_id!(
    /// Suggestion record; stable for a (project, domain, name) triple
    CookieSuggestionId
);
string_id!(CookieProviderId);
string_id!(CategoryId);
string_id!(
    /// Identifies the group of solutions offered for one suggestion.
    /// Second half of the staging key.
    SolutionsUniqueId
);
string_id!(
    /// Identifies a single offered solution inside its group
    SolutionUniqueId
);
