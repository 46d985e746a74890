//! Groups crawl results into classification buckets.
//!
//! Classification is a pure function of its inputs. It never caches state:
//! the presentation layer calls it on every page view. Records it had to
//! create or update (first sightings, new occurrences, suggestions promoted
//! out of "ignored until next occurrence") are handed back to the caller to
//! persist.
//!
//! Catalog cookies of linked providers that no fact matched are listed
//! apart from the buckets, with ignore offers that materialize a suggestion
//! for them on resolution.

use super::solution::{SolutionGroup, SolutionKind, SolutionValues};
use super::{ClassificationType, CookieSuggestion, DiscoveredFact, IgnoreState, Occurrence};
use crate::catalog::{CatalogSnapshot, CookieView};
use crate::matcher::{match_domain, normalize_domain, provider_code_matches};
use crate::types::{CookieId, CookieProviderId, CookieSuggestionId, ProjectId};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// A suggestion placed in its bucket, with the solutions offered for it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedSuggestion {
    pub suggestion: CookieSuggestion,
    pub classification: ClassificationType,
    pub occurrence: Occurrence,
    /// Catalog cookies matching the discovered (domain, name)
    pub matched_cookies: Vec<CookieId>,
    pub solutions: SolutionGroup,
}

/// A catalog cookie of a linked provider that the crawl never reported
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UncrawledCookie {
    pub cookie_id: CookieId,
    /// Suggestion standing in for the cookie, present once materialized
    pub suggestion_id: CookieSuggestionId,
    pub name: String,
    pub domain: String,
    pub ignore_state: IgnoreState,
    pub solutions: SolutionGroup,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SuggestionsResult {
    buckets: BTreeMap<ClassificationType, Vec<ClassifiedSuggestion>>,
    uncrawled: Vec<UncrawledCookie>,
    changed_records: Vec<CookieSuggestion>,
}

impl SuggestionsResult {
    /// Suggestions of one bucket, ordered by (name, domain)
    pub fn get_suggestions_by_type(&self, classification: ClassificationType) -> &[ClassifiedSuggestion] {
        self.buckets
            .get(&classification)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Count of every suggestion outside the ignored bucket
    pub fn get_total_number_of_resolvable_suggestions(&self) -> usize {
        self.buckets
            .iter()
            .filter(|(classification, _)| classification.is_resolvable())
            .map(|(_, suggestions)| suggestions.len())
            .sum()
    }

    pub fn total(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClassifiedSuggestion> + '_ {
        self.buckets.values().flatten()
    }

    /// Cataloged cookies no fact matched, ordered by (name, domain)
    pub fn uncrawled(&self) -> &[UncrawledCookie] {
        &self.uncrawled
    }

    /// Records created or updated during classification
    pub fn changed_records(&self) -> &[CookieSuggestion] {
        &self.changed_records
    }

    pub fn into_changed_records(self) -> Vec<CookieSuggestion> {
        self.changed_records
    }
}

/// Duplicate facts for one (domain, name) pair
struct FactGroup<'a> {
    domain: String,
    name: &'a str,
    occurrence: Occurrence,
    consents: Vec<Option<&'a [String]>>,
}

/// Classify every discovered fact of a project against the catalog.
///
/// `records` are the suggestion records persisted so far; records belonging
/// to other projects are ignored.
pub fn classify(
    project_id: &ProjectId,
    facts: &[DiscoveredFact],
    catalog: &CatalogSnapshot,
    records: &[CookieSuggestion],
) -> SuggestionsResult {
    let known: HashMap<(String, &str), &CookieSuggestion> = records
        .iter()
        .filter(|record| &record.project_id == project_id)
        .map(|record| ((normalize_domain(&record.domain), record.name.as_str()), record))
        .collect();

    let mut result = SuggestionsResult::default();

    for group in group_facts(facts).into_values() {
        let (suggestion, changed) = match known.get(&(group.domain.clone(), group.name)) {
            Some(record) => refresh((*record).clone(), group.occurrence),
            None => {
                let mut created =
                    CookieSuggestion::new(project_id.clone(), group.name, group.domain.clone());
                created.last_occurrence = Some(group.occurrence);
                (created, true)
            }
        };

        if changed {
            result.changed_records.push(suggestion.clone());
        }

        let classified = place(suggestion, &group, catalog);
        result
            .buckets
            .entry(classified.classification)
            .or_default()
            .push(classified);
    }

    for suggestions in result.buckets.values_mut() {
        suggestions.sort_by(|a, b| {
            (&a.suggestion.name, &a.suggestion.domain).cmp(&(&b.suggestion.name, &b.suggestion.domain))
        });
    }

    let crawled: HashSet<CookieId> = result
        .iter()
        .flat_map(|classified| classified.matched_cookies.iter().cloned())
        .collect();
    result.uncrawled = uncrawled_cookies(project_id, catalog, records, &crawled);

    result
}

fn uncrawled_cookies(
    project_id: &ProjectId,
    catalog: &CatalogSnapshot,
    records: &[CookieSuggestion],
    crawled: &HashSet<CookieId>,
) -> Vec<UncrawledCookie> {
    let materialized: HashMap<&str, &CookieSuggestion> = records
        .iter()
        .filter(|record| &record.project_id == project_id)
        .map(|record| (record.id.as_str(), record))
        .collect();

    let mut uncrawled: Vec<UncrawledCookie> = catalog
        .cookies
        .iter()
        .filter(|cookie| {
            catalog.is_provider_linked(&cookie.cookie_provider_id) && !crawled.contains(&cookie.id)
        })
        .map(|cookie| {
            let suggestion_id = CookieSuggestionId::new(cookie.id.as_str());
            let record = materialized.get(suggestion_id.as_str());
            let ignore_state = record.map_or(IgnoreState::NotIgnored, |record| record.ignore_state);

            let mut solutions = SolutionGroup::new(&suggestion_id, "uncrawled");
            match (record, ignore_state) {
                (None, _) => {
                    let args = flag_arg("virtual_suggestion");
                    solutions.offer(SolutionKind::IgnoreUntilNextOccurrence, args.clone());
                    solutions.offer(SolutionKind::IgnorePermanently, args);
                }
                (Some(_), IgnoreState::NotIgnored) => {
                    solutions.offer(SolutionKind::IgnoreUntilNextOccurrence, SolutionValues::new());
                    solutions.offer(SolutionKind::IgnorePermanently, SolutionValues::new());
                }
                (Some(_), IgnoreState::IgnoredUntilNextOccurrence) => {
                    solutions.offer(SolutionKind::DoNotIgnore, SolutionValues::new());
                    solutions.offer(SolutionKind::IgnorePermanently, SolutionValues::new());
                }
                (Some(_), IgnoreState::IgnoredPermanently) => {
                    solutions.offer(SolutionKind::DoNotIgnore, SolutionValues::new());
                }
            }

            let domain = if cookie.domain.trim().is_empty() {
                catalog.project.domain.clone()
            } else {
                cookie.domain.clone()
            };

            UncrawledCookie {
                cookie_id: cookie.id.clone(),
                suggestion_id,
                name: cookie.name.clone(),
                domain,
                ignore_state,
                solutions,
            }
        })
        .collect();

    uncrawled.sort_by(|a, b| (&a.name, &a.domain).cmp(&(&b.name, &b.domain)));
    uncrawled
}

fn group_facts(facts: &[DiscoveredFact]) -> BTreeMap<(String, &str), FactGroup<'_>> {
    let mut groups: BTreeMap<(String, &str), FactGroup<'_>> = BTreeMap::new();

    for fact in facts {
        let domain = normalize_domain(&fact.domain);
        let consent = fact.accepted_categories.as_deref();

        groups
            .entry((domain.clone(), fact.cookie_name.as_str()))
            .and_modify(|group| {
                group.occurrence.count =
                    group.occurrence.count.saturating_add(fact.occurrence_count);
                group.occurrence.first_seen_at =
                    group.occurrence.first_seen_at.max(fact.first_seen_at);
                group.consents.push(consent);
            })
            .or_insert_with(|| FactGroup {
                domain,
                name: fact.cookie_name.as_str(),
                occurrence: Occurrence {
                    count: fact.occurrence_count,
                    first_seen_at: fact.first_seen_at,
                },
                consents: vec![consent],
            });
    }

    groups
}

/// Record the latest occurrence and promote a suggestion ignored until next
/// occurrence when something new was seen.
fn refresh(mut record: CookieSuggestion, occurrence: Occurrence) -> (CookieSuggestion, bool) {
    let mut changed = false;

    if record.ignore_state == IgnoreState::IgnoredUntilNextOccurrence
        && record
            .ignored_at
            .is_none_or(|snapshot| occurrence.is_newer_than(&snapshot))
    {
        record.ignore_state = IgnoreState::NotIgnored;
        record.ignored_at = None;
        changed = true;
    }

    if record.last_occurrence != Some(occurrence) {
        record.last_occurrence = Some(occurrence);
        changed = true;
    }

    (record, changed)
}

fn place(
    suggestion: CookieSuggestion,
    group: &FactGroup<'_>,
    catalog: &CatalogSnapshot,
) -> ClassifiedSuggestion {
    let matched: Vec<&CookieView> = catalog
        .cookies
        .iter()
        .filter(|cookie| {
            cookie.name == group.name
                && (cookie.domain.trim().is_empty() || match_domain(&cookie.domain, &group.domain))
        })
        .collect();

    let classification = if suggestion.is_ignored() {
        ClassificationType::Ignored
    } else if matched.is_empty() {
        ClassificationType::Missing
    } else if !is_associated(&group.domain, catalog) {
        ClassificationType::Unassociated
    } else if violating_cookie(&matched, group, catalog).is_some() {
        ClassificationType::Problematic
    } else {
        ClassificationType::Unproblematic
    };

    let solutions = offer_solutions(&suggestion, classification, &matched, group, catalog);

    ClassifiedSuggestion {
        matched_cookies: matched.iter().map(|cookie| cookie.id.clone()).collect(),
        occurrence: group.occurrence,
        suggestion,
        classification,
        solutions,
    }
}

/// Whether the project itself or one of its linked providers owns `domain`
fn is_associated(domain: &str, catalog: &CatalogSnapshot) -> bool {
    match_domain(&catalog.project.domain, domain)
        || catalog
            .linked_providers()
            .any(|provider| provider_code_matches(&provider.code, domain))
}

/// First matching cookie whose category fired without being accepted
fn violating_cookie<'a>(
    matched: &[&'a CookieView],
    group: &FactGroup<'_>,
    catalog: &CatalogSnapshot,
) -> Option<&'a CookieView> {
    matched.iter().copied().find(|cookie| {
        let Some(category) = catalog.category(&cookie.category_id) else {
            return false;
        };
        !category.necessary
            && group.consents.iter().any(|consent| {
                consent.is_some_and(|accepted| !accepted.iter().any(|code| code == &category.code))
            })
    })
}

fn offer_solutions(
    suggestion: &CookieSuggestion,
    classification: ClassificationType,
    matched: &[&CookieView],
    group: &FactGroup<'_>,
    catalog: &CatalogSnapshot,
) -> SolutionGroup {
    let mut solutions = SolutionGroup::new(&suggestion.id, classification.as_str());

    match classification {
        ClassificationType::Missing => {
            solutions.offer(SolutionKind::CreateNewCookie, SolutionValues::new());
        }
        ClassificationType::Unassociated => {
            let covering = catalog
                .providers
                .iter()
                .filter(|provider| provider_code_matches(&provider.code, &group.domain))
                .map(|provider| &provider.id);
            let providers: BTreeSet<&CookieProviderId> = matched
                .iter()
                .map(|cookie| &cookie.cookie_provider_id)
                .chain(covering)
                .filter(|id| !catalog.is_provider_linked(id))
                .collect();
            for provider_id in providers {
                solutions.offer(
                    SolutionKind::AssociateCookieProviderWithProject,
                    single("provider_id", provider_id.as_str()),
                );
            }
        }
        ClassificationType::Problematic => {
            if let Some(cookie) = violating_cookie(matched, group, catalog) {
                let args = single("existing_cookie_id", cookie.id.as_str());
                solutions.offer(SolutionKind::ChangeCookieCategory, args.clone());
                solutions.offer(SolutionKind::CreateNewCookieWithNotAcceptedCategory, args);
            }
        }
        ClassificationType::Unproblematic => {}
        ClassificationType::Ignored => {
            solutions.offer(SolutionKind::DoNotIgnore, SolutionValues::new());
            if suggestion.ignore_state == IgnoreState::IgnoredUntilNextOccurrence {
                solutions.offer(SolutionKind::IgnorePermanently, SolutionValues::new());
            }
            return solutions;
        }
    }

    solutions.offer(SolutionKind::IgnoreUntilNextOccurrence, SolutionValues::new());
    solutions.offer(SolutionKind::IgnorePermanently, SolutionValues::new());
    solutions
}

fn single(key: &str, value: &str) -> SolutionValues {
    let mut values = SolutionValues::new();
    values.insert(key.to_string(), Value::String(value.to_string()));
    values
}

fn flag_arg(key: &str) -> SolutionValues {
    let mut values = SolutionValues::new();
    values.insert(key.to_string(), Value::Bool(true));
    values
}
