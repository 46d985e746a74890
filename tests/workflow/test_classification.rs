use crate::common::{Fixture, bucket_names, day, request};
use cookie_triage::suggestion::SolutionKind;
use cookie_triage::{ClassificationType, DiscoveredFact, IgnoreState, NotificationMode, match_domain};
use tokio_util::sync::CancellationToken;

fn crawl() -> Vec<DiscoveredFact> {
    vec![
        DiscoveredFact::new("example.com", "PHPSESSID", day(1), 10).with_accepted_categories(Vec::<String>::new()),
        DiscoveredFact::new("ads.example.com", "_gcl_au", day(1), 3),
        DiscoveredFact::new(".google.com", "_ga", day(1), 4),
        DiscoveredFact::new("example.com", "_stats", day(1), 2).with_accepted_categories(["functionality"]),
        DiscoveredFact::new("example.com", "_stats", day(2), 1).with_accepted_categories(["analytics"]),
        DiscoveredFact::new("facebook.com", "_fbp", day(1), 1),
        DiscoveredFact::new("ads.example.com", "_gcl_au", day(3), 2),
    ]
}

#[test]
fn test_unknown_subdomain_cookie_is_missing() {
    let fixture = Fixture::new();
    fixture.record(vec![DiscoveredFact::new("ads.example.com", "_gcl_au", day(1), 1)]);

    let result = fixture.classify();

    assert!(match_domain("example.com", "ads.example.com"));
    assert_eq!(
        bucket_names(&result, ClassificationType::Missing),
        vec!["_gcl_au"]
    );
}

#[test]
fn test_every_fact_lands_in_exactly_one_bucket() {
    let fixture = Fixture::new();
    fixture.record(crawl());

    let result = fixture.classify();

    // 7 facts, two duplicate pairs collapsed
    assert_eq!(result.total(), 5);
    let per_bucket: usize = ClassificationType::ALL
        .into_iter()
        .map(|bucket| result.get_suggestions_by_type(bucket).len())
        .sum();
    assert_eq!(per_bucket, 5);

    assert_eq!(bucket_names(&result, ClassificationType::Missing), vec!["_gcl_au"]);
    assert_eq!(
        bucket_names(&result, ClassificationType::Unassociated),
        vec!["_fbp", "_ga"]
    );
    assert_eq!(bucket_names(&result, ClassificationType::Problematic), vec!["_stats"]);
    assert_eq!(
        bucket_names(&result, ClassificationType::Unproblematic),
        vec!["PHPSESSID"]
    );
    assert_eq!(result.get_total_number_of_resolvable_suggestions(), 5);

    let gcl = fixture.suggestion(&result, "_gcl_au");
    assert_eq!(gcl.occurrence.count, 5);
    assert_eq!(gcl.occurrence.first_seen_at, day(3));
}

#[test]
fn test_classification_is_repeatable() {
    let fixture = Fixture::new();
    fixture.record(crawl());

    let first = fixture.classify();
    assert_eq!(first.changed_records().len(), 5);

    let second = fixture.classify();
    assert!(second.changed_records().is_empty());
    for bucket in ClassificationType::ALL {
        assert_eq!(bucket_names(&first, bucket), bucket_names(&second, bucket));
    }
}

#[test]
fn test_unassociated_offers_each_unlinked_provider() {
    let fixture = Fixture::new();
    fixture.record(crawl());
    let result = fixture.classify();

    let ga = fixture.suggestion(&result, "_ga");
    let providers: Vec<_> = ga
        .solutions
        .offers
        .iter()
        .filter(|offer| offer.kind == SolutionKind::AssociateCookieProviderWithProject)
        .map(|offer| offer.args["provider_id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(providers, vec!["google"]);
}

#[test]
fn test_known_cookie_on_uncovered_domain_is_unassociated() {
    let fixture = Fixture::new();
    // `_stats` belongs to the linked `own` provider, which only covers example.com
    fixture.record(vec![DiscoveredFact::new("tracker.net", "_stats", day(1), 1)]);

    let result = fixture.classify();

    assert_eq!(
        bucket_names(&result, ClassificationType::Unassociated),
        vec!["_stats"]
    );
    assert!(bucket_names(&result, ClassificationType::Unproblematic).is_empty());
    let stats = fixture.suggestion(&result, "_stats");
    assert!(
        stats
            .solutions
            .find(SolutionKind::AssociateCookieProviderWithProject)
            .is_none()
    );
    assert!(stats.solutions.find(SolutionKind::IgnorePermanently).is_some());
}

#[test]
fn test_uncrawled_cookies_are_listed_apart() {
    let fixture = Fixture::new();
    fixture.record(vec![DiscoveredFact::new("example.com", "PHPSESSID", day(1), 1)]);

    let result = fixture.classify();

    let names: Vec<&str> = result.uncrawled().iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["_stats"]);
    assert_eq!(result.total(), 1);
}

#[tokio::test]
async fn test_permanently_ignored_suggestion_moves_to_ignored_bucket() {
    let fixture = Fixture::new();
    fixture.record(crawl());
    let result = fixture.classify();
    let gcl = fixture.suggestion(&result, "_gcl_au");

    let request = request(&gcl, SolutionKind::IgnorePermanently);
    fixture.resolver.stage(request.clone()).await.unwrap();

    let outcome = fixture
        .resolver
        .resolve(request.clone(), NotificationMode::Notify, &CancellationToken::new())
        .await
        .unwrap();
    assert!(outcome.success);

    let stored = fixture.catalog.suggestions(&fixture.project_id());
    let record = stored.iter().find(|s| s.id == gcl.suggestion.id).unwrap();
    assert_eq!(record.ignore_state, IgnoreState::IgnoredPermanently);

    let result = fixture.classify();
    assert_eq!(bucket_names(&result, ClassificationType::Ignored), vec!["_gcl_au"]);
    assert_eq!(result.get_total_number_of_resolvable_suggestions(), 4);
    assert!(fixture.staging.is_empty());
}

#[tokio::test]
async fn test_ignored_until_next_occurrence_returns_on_new_sighting() {
    let fixture = Fixture::new();
    fixture.record(vec![DiscoveredFact::new("ads.example.com", "_gcl_au", day(1), 1)]);
    let result = fixture.classify();
    let gcl = fixture.suggestion(&result, "_gcl_au");

    let outcome = fixture
        .resolver
        .resolve(
            request(&gcl, SolutionKind::IgnoreUntilNextOccurrence),
            NotificationMode::Notify,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert!(outcome.success);

    // Same crawl again: still ignored
    let result = fixture.classify();
    assert_eq!(bucket_names(&result, ClassificationType::Ignored), vec!["_gcl_au"]);

    fixture.record(vec![DiscoveredFact::new("ads.example.com", "_gcl_au", day(5), 1)]);
    let result = fixture.classify();
    assert_eq!(bucket_names(&result, ClassificationType::Missing), vec!["_gcl_au"]);

    let stored = fixture.catalog.suggestions(&fixture.project_id());
    assert_eq!(stored[0].ignore_state, IgnoreState::NotIgnored);
}
