use crate::common::{Fixture, bucket_names, day, values};
use cookie_triage::catalog::CatalogCommand;
use cookie_triage::error::ErrorKind;
use cookie_triage::suggestion::SolutionKind;
use cookie_triage::{
    ClassificationType, DiscoveredFact, IgnoreState, NotificationMode, SolutionRequest,
};
use serde_json::json;
use tokio_util::sync::CancellationToken;

/// Ignore request for a catalog cookie that was never discovered
fn virtual_request(cookie_id: &str, solution_type: &str) -> SolutionRequest {
    SolutionRequest {
        cookie_suggestion_id: cookie_id.into(),
        solutions_unique_id: format!("virtual-{cookie_id}").into(),
        solution_unique_id: format!("virtual-{cookie_id}-{solution_type}").into(),
        solution_type: solution_type.to_string(),
        values: values(json!({ "virtual_suggestion": cookie_id })),
    }
}

#[tokio::test]
async fn test_ignoring_cataloged_cookie_materializes_suggestion() {
    let fixture = Fixture::new();
    let cancel = CancellationToken::new();

    let outcome = fixture
        .resolver
        .resolve(
            virtual_request("c-sess", "ignore_permanently"),
            NotificationMode::Notify,
            &cancel,
        )
        .await
        .unwrap();
    assert!(outcome.success, "{:?}", outcome.error);

    let commands = fixture.catalog.dispatched();
    assert_eq!(commands.len(), 2);
    let CatalogCommand::CreateCookieSuggestion(create) = &commands[0] else {
        panic!("suggestion must be created first, got {commands:?}");
    };
    assert_eq!(create.name, "PHPSESSID");
    // The cookie has no domain of its own
    assert_eq!(create.domain, "example.com");
    assert_eq!(
        commands[1],
        CatalogCommand::IgnoreSuggestionPermanently {
            suggestion_id: "c-sess".into()
        }
    );

    // A later crawl finds the record instead of creating a new one
    fixture.record(vec![DiscoveredFact::new("example.com", "PHPSESSID", day(2), 3)]);
    let result = fixture.classify();
    assert_eq!(bucket_names(&result, ClassificationType::Ignored), vec!["PHPSESSID"]);
    assert_eq!(fixture.catalog.suggestions(&fixture.project_id()).len(), 1);
}

#[tokio::test]
async fn test_flagged_request_targets_its_own_suggestion_id() {
    let fixture = Fixture::new();
    let mut request = virtual_request("c-sess", "ignore_permanently");
    request.values = values(json!({ "virtual_suggestion": true }));

    let outcome = fixture
        .resolver
        .resolve(request, NotificationMode::Notify, &CancellationToken::new())
        .await
        .unwrap();
    assert!(outcome.success, "{:?}", outcome.error);

    let commands = fixture.catalog.dispatched();
    assert!(matches!(
        commands.as_slice(),
        [CatalogCommand::CreateCookieSuggestion(create), CatalogCommand::IgnoreSuggestionPermanently { suggestion_id }]
            if create.name == "PHPSESSID" && suggestion_id.as_str() == "c-sess"
    ));
}

#[tokio::test]
async fn test_false_flag_does_not_materialize() {
    let fixture = Fixture::new();
    let mut request = virtual_request("c-sess", "ignore_permanently");
    request.values = values(json!({ "virtual_suggestion": false }));

    let outcome = fixture
        .resolver
        .resolve(request, NotificationMode::Quiet, &CancellationToken::new())
        .await
        .unwrap();

    assert!(!outcome.success);
    assert_eq!(outcome.error.unwrap().kind(), ErrorKind::NotFound);
    assert!(fixture.catalog.dispatched().is_empty());
}

#[tokio::test]
async fn test_uncrawled_cookie_offer_round_trip() {
    let fixture = Fixture::new();
    fixture.record(vec![DiscoveredFact::new("example.com", "PHPSESSID", day(1), 1)]);
    let result = fixture.classify();

    let stats = &result.uncrawled()[0];
    assert_eq!(stats.name, "_stats");
    let offer = stats
        .solutions
        .find(SolutionKind::IgnoreUntilNextOccurrence)
        .unwrap();
    let request = SolutionRequest {
        cookie_suggestion_id: stats.suggestion_id.clone(),
        solutions_unique_id: stats.solutions.solutions_unique_id.clone(),
        solution_unique_id: offer.solution_unique_id.clone(),
        solution_type: offer.kind.as_str().to_string(),
        values: offer.args.clone(),
    };
    fixture.resolver.stage(request).await.unwrap();

    let summary = fixture
        .resolver
        .resolve_all(&CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(summary.success, 1);

    let result = fixture.classify();
    let stats = &result.uncrawled()[0];
    assert_eq!(stats.ignore_state, IgnoreState::IgnoredUntilNextOccurrence);
    assert!(stats.solutions.find(SolutionKind::DoNotIgnore).is_some());
}

#[tokio::test]
async fn test_second_virtual_action_reuses_record() {
    let fixture = Fixture::new();
    let cancel = CancellationToken::new();

    for solution_type in ["ignore_until_next_occurrence", "ignore_permanently"] {
        let outcome = fixture
            .resolver
            .resolve(
                virtual_request("c-fbp", solution_type),
                NotificationMode::Quiet,
                &cancel,
            )
            .await
            .unwrap();
        assert!(outcome.success, "{:?}", outcome.error);
    }

    let creates = fixture
        .catalog
        .dispatched()
        .iter()
        .filter(|c| matches!(c, CatalogCommand::CreateCookieSuggestion(_)))
        .count();
    assert_eq!(creates, 1);

    let stored = fixture.catalog.suggestions(&fixture.project_id());
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].domain, "facebook.com");
    assert_eq!(stored[0].ignore_state, IgnoreState::IgnoredPermanently);
}

#[tokio::test]
async fn test_virtual_suggestion_for_unknown_cookie() {
    let fixture = Fixture::new();

    let outcome = fixture
        .resolver
        .resolve(
            virtual_request("c-gone", "ignore_permanently"),
            NotificationMode::Notify,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(!outcome.success);
    assert_eq!(outcome.error.unwrap().kind(), ErrorKind::NotFound);
    assert!(fixture.catalog.dispatched().is_empty());
}
