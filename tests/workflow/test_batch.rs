use crate::common::{Fixture, PROJECT, PendingCommandBus, day, request, seeded_catalog};
use cookie_triage::resolution::notice;
use cookie_triage::suggestion::{SolutionKind, SolutionValues};
use cookie_triage::{
    BatchError, BatchSummary, DiscoveredFact, IgnoreState, NotificationMode, ProjectId,
    StagedSolution, StagingStore,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn crawled(fixture: &Fixture) {
    fixture.record(vec![
        DiscoveredFact::new("ads.example.com", "_gcl_au", day(1), 1),
        DiscoveredFact::new("cdn.example.com", "_cdn", day(1), 1),
        DiscoveredFact::new("tracker.net", "uid", day(1), 1),
    ]);
}

fn raw_entry(group: &str, solution_type: &str, suggestion: &str) -> StagedSolution {
    StagedSolution::new(
        ProjectId::new(PROJECT),
        group.into(),
        format!("{group}-uid").into(),
        solution_type,
        suggestion.into(),
        SolutionValues::new(),
    )
}

#[tokio::test]
async fn test_batch_counts_successes_and_failures() {
    let fixture = Fixture::new();
    crawled(&fixture);
    let result = fixture.classify();

    for name in ["_gcl_au", "_cdn"] {
        let suggestion = fixture.suggestion(&result, name);
        fixture
            .resolver
            .stage(request(&suggestion, SolutionKind::IgnorePermanently))
            .await
            .unwrap();
    }

    let uid = fixture.suggestion(&result, "uid");
    // Written by an older version or by hand: unknown kind, form never submitted
    fixture
        .staging
        .store(raw_entry("legacy", "delete_cookie", uid.suggestion.id.as_str()))
        .unwrap();
    fixture
        .staging
        .store(raw_entry(
            uid.solutions.solutions_unique_id.as_str(),
            "create_new_cookie",
            uid.suggestion.id.as_str(),
        ))
        .unwrap();
    assert_eq!(fixture.resolver.ready_to_resolve().unwrap(), 4);

    let summary = fixture
        .resolver
        .resolve_all(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        summary,
        BatchSummary {
            success: 2,
            errors: 2,
            still_staged: 0,
        }
    );
    let notices = summary.notices();
    assert_eq!(notices[0].key, notice::MULTIPLE_SUGGESTIONS_RESOLVED);
    assert_eq!(notices[0].count, Some(2));
    assert_eq!(notices[1].key, notice::UNABLE_TO_RESOLVE_MULTIPLE_SOLUTIONS);
    assert_eq!(notices[1].count, Some(2));

    let left: Vec<String> = fixture
        .resolver
        .staged()
        .unwrap()
        .into_iter()
        .map(|entry| entry.solution_type)
        .collect();
    assert_eq!(left.len(), 2);
    assert!(left.contains(&"delete_cookie".to_string()));
    assert!(left.contains(&"create_new_cookie".to_string()));

    let ignored = fixture
        .catalog
        .suggestions(&fixture.project_id())
        .into_iter()
        .filter(|s| s.ignore_state == IgnoreState::IgnoredPermanently)
        .count();
    assert_eq!(ignored, 2);
}

#[tokio::test]
async fn test_empty_batch() {
    let fixture = Fixture::new();
    let summary = fixture
        .resolver
        .resolve_all(&CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(summary, BatchSummary::default());
    assert!(summary.notices().is_empty());
}

#[tokio::test]
async fn test_quiet_mode_has_no_item_notices() {
    let fixture = Fixture::new();
    crawled(&fixture);
    let gcl = fixture.suggestion(&fixture.classify(), "_gcl_au");

    let outcome = fixture
        .resolver
        .resolve(
            request(&gcl, SolutionKind::IgnoreUntilNextOccurrence),
            NotificationMode::Quiet,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert!(outcome.success);
    assert!(outcome.notice.is_none());
}

#[tokio::test]
async fn test_batch_stops_on_cancellation() {
    let catalog = Arc::new(seeded_catalog());
    let fixture = Fixture::with_commands(catalog, Arc::new(PendingCommandBus));
    crawled(&fixture);
    let result = fixture.classify();
    for name in ["_gcl_au", "_cdn"] {
        let suggestion = fixture.suggestion(&result, name);
        fixture
            .resolver
            .stage(request(&suggestion, SolutionKind::IgnorePermanently))
            .await
            .unwrap();
    }

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let err = fixture.resolver.resolve_all(&cancel).await.unwrap_err();
    assert!(matches!(err, BatchError::Cancelled(_)));
    assert_eq!(fixture.resolver.ready_to_resolve().unwrap(), 2);
}
