use crate::common::{
    FailingCommandBus, Fixture, PendingCommandBus, StickyStagingStore, day, project_view, request,
    seeded_catalog,
};
use cookie_triage::catalog::{CatalogCommand, QueryBus};
use cookie_triage::error::{CatalogError, ErrorKind, ResolutionError};
use cookie_triage::resolution::{CookieFormValues, FormFollowUp, NoticeLevel, notice};
use cookie_triage::suggestion::SolutionKind;
use cookie_triage::{
    Cancelled, ClassificationType, CookieId, CookieProviderId, DiscoveredFact, NotificationMode,
    Resolver, StageOutcome, StagingStore,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn crawled() -> Fixture {
    let fixture = Fixture::new();
    fixture.record(vec![
        DiscoveredFact::new("ads.example.com", "_gcl_au", day(1), 2),
        DiscoveredFact::new(".google.com", "_ga", day(1), 4),
        DiscoveredFact::new("example.com", "_stats", day(1), 1).with_accepted_categories(["functionality"]),
    ]);
    fixture
}

fn new_cookie_form(name: &str) -> CookieFormValues {
    CookieFormValues {
        category: Some("marketing".to_string()),
        provider: Some("google".to_string()),
        name: name.to_string(),
        processing_time: "persistent".to_string(),
        active: true,
        all_environments: true,
        environments: vec!["prod".to_string(), String::new()],
        ..CookieFormValues::default()
    }
}

#[tokio::test]
async fn test_stale_solution_is_refused() {
    let fixture = crawled();
    let gcl = fixture.suggestion(&fixture.classify(), "_gcl_au");

    let StageOutcome::Staged(staged) = fixture
        .resolver
        .stage(request(&gcl, SolutionKind::IgnorePermanently))
        .await
        .unwrap()
    else {
        panic!("ignore solutions are staged directly");
    };

    let outcome = fixture
        .resolver
        .resolve(
            request(&gcl, SolutionKind::IgnoreUntilNextOccurrence),
            NotificationMode::Notify,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(!outcome.success);
    assert!(matches!(
        outcome.error,
        Some(ResolutionError::StaleSolution { .. })
    ));
    let notice = outcome.notice.unwrap();
    assert_eq!(notice.level, NoticeLevel::Error);
    assert_eq!(notice.key, notice::UNABLE_TO_RESOLVE_SOLUTION);

    assert_eq!(fixture.staging.get(&staged.key()).unwrap(), Some(staged));
    assert!(fixture.catalog.dispatched().is_empty());
}

#[tokio::test]
async fn test_create_new_cookie_with_all_environments() {
    let fixture = crawled();
    let gcl = fixture.suggestion(&fixture.classify(), "_gcl_au");
    let request = request(&gcl, SolutionKind::CreateNewCookie);

    let outcome = fixture.resolver.stage(request.clone()).await.unwrap();
    assert!(matches!(outcome, StageOutcome::FormRequired(_)));
    assert!(fixture.staging.is_empty());

    fixture
        .resolver
        .submit_form(request.clone(), new_cookie_form("_gcl_au"))
        .unwrap();
    assert_eq!(fixture.resolver.ready_to_resolve().unwrap(), 1);

    let outcome = fixture
        .resolver
        .resolve(request, NotificationMode::Notify, &CancellationToken::new())
        .await
        .unwrap();
    assert!(outcome.success, "{:?}", outcome.error);
    assert_eq!(outcome.notice.unwrap().key, notice::SUGGESTION_RESOLVED);
    assert!(fixture.staging.is_empty());

    let commands = fixture.catalog.dispatched();
    let [CatalogCommand::CreateCookie(create)] = commands.as_slice() else {
        panic!("expected a single create command, got {commands:?}");
    };
    assert_eq!(create.cookie_provider_id, Some(CookieProviderId::new("google")));
    let issued = serde_json::to_value(create).unwrap();
    assert_eq!(issued["environments"], json!(true));

    let result = fixture.classify();
    let gcl = fixture.suggestion(&result, "_gcl_au");
    assert_ne!(gcl.classification, ClassificationType::Missing);
}

#[tokio::test]
async fn test_duplicate_name_reopens_form() {
    let fixture = crawled();
    let gcl = fixture.suggestion(&fixture.classify(), "_gcl_au");
    let request = request(&gcl, SolutionKind::CreateNewCookie);

    // `_ga` already exists for google
    let staged = fixture
        .resolver
        .submit_form(request.clone(), new_cookie_form("_ga"))
        .unwrap();

    let outcome = fixture
        .resolver
        .resolve(request.clone(), NotificationMode::Notify, &CancellationToken::new())
        .await
        .unwrap();

    assert!(!outcome.success);
    assert!(outcome.notice.is_none());
    assert_eq!(outcome.error.as_ref().unwrap().field(), Some("name"));
    let Some(FormFollowUp::ReopenForm { field_errors, .. }) = outcome.follow_up else {
        panic!("form should be re-presented");
    };
    assert_eq!(field_errors[0].field, "name");

    // The operator's input survives for the re-presented form
    assert_eq!(fixture.staging.get(&staged.key()).unwrap(), Some(staged));
    let context = fixture.resolver.prepare_form(&request).await.unwrap();
    assert!(context.restored);
    assert_eq!(context.defaults.name, "_ga");
}

#[tokio::test]
async fn test_duplicate_name_in_quiet_mode_has_no_follow_up() {
    let fixture = crawled();
    let gcl = fixture.suggestion(&fixture.classify(), "_gcl_au");
    let request = request(&gcl, SolutionKind::CreateNewCookie);
    fixture
        .resolver
        .submit_form(request.clone(), new_cookie_form("_ga"))
        .unwrap();

    let outcome = fixture
        .resolver
        .resolve(request, NotificationMode::Quiet, &CancellationToken::new())
        .await
        .unwrap();
    assert!(!outcome.success);
    assert!(outcome.follow_up.is_none());
    assert!(outcome.notice.is_none());
}

#[tokio::test]
async fn test_backend_failure_keeps_staged_entry() {
    let catalog = Arc::new(seeded_catalog());
    let failing = Arc::new(FailingCommandBus {
        error: CatalogError::Backend("connection reset".to_string()),
    });
    let fixture = Fixture::with_commands(catalog, failing);
    fixture.record(vec![DiscoveredFact::new("ads.example.com", "_gcl_au", day(1), 1)]);
    let gcl = fixture.suggestion(&fixture.classify(), "_gcl_au");
    let request = request(&gcl, SolutionKind::IgnorePermanently);

    fixture.resolver.stage(request.clone()).await.unwrap();
    let outcome = fixture
        .resolver
        .resolve(request, NotificationMode::Notify, &CancellationToken::new())
        .await
        .unwrap();

    assert!(!outcome.success);
    assert_eq!(outcome.error.unwrap().kind(), ErrorKind::Unexpected);
    assert_eq!(outcome.notice.unwrap().key, notice::UNABLE_TO_RESOLVE_SOLUTION);
    assert_eq!(fixture.resolver.ready_to_resolve().unwrap(), 1);
}

#[tokio::test]
async fn test_cancellation_propagates_and_keeps_entry() {
    let catalog = Arc::new(seeded_catalog());
    let fixture = Fixture::with_commands(catalog, Arc::new(PendingCommandBus));
    fixture.record(vec![DiscoveredFact::new("ads.example.com", "_gcl_au", day(1), 1)]);
    let gcl = fixture.suggestion(&fixture.classify(), "_gcl_au");
    let request = request(&gcl, SolutionKind::IgnorePermanently);
    fixture.resolver.stage(request.clone()).await.unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let result = fixture
        .resolver
        .resolve(request, NotificationMode::Notify, &cancel)
        .await;

    assert_eq!(result, Err(Cancelled));
    assert_eq!(fixture.resolver.ready_to_resolve().unwrap(), 1);
}

#[tokio::test]
async fn test_associate_provider_links_it() {
    let fixture = crawled();
    let ga = fixture.suggestion(&fixture.classify(), "_ga");
    assert_eq!(ga.classification, ClassificationType::Unassociated);

    let request = request(&ga, SolutionKind::AssociateCookieProviderWithProject);
    fixture.resolver.stage(request.clone()).await.unwrap();
    let outcome = fixture
        .resolver
        .resolve(request, NotificationMode::Notify, &CancellationToken::new())
        .await
        .unwrap();
    assert!(outcome.success);

    let project = fixture
        .catalog
        .get_project(&fixture.project_id())
        .await
        .unwrap()
        .unwrap();
    assert!(project.cookie_provider_ids.contains(&CookieProviderId::new("google")));

    let ga = fixture.suggestion(&fixture.classify(), "_ga");
    assert_eq!(ga.classification, ClassificationType::Unproblematic);
}

#[tokio::test]
async fn test_change_cookie_category_updates_existing_cookie() {
    let fixture = crawled();
    let stats = fixture.suggestion(&fixture.classify(), "_stats");
    assert_eq!(stats.classification, ClassificationType::Problematic);

    let request = request(&stats, SolutionKind::ChangeCookieCategory);
    let StageOutcome::FormRequired(context) = fixture.resolver.stage(request.clone()).await.unwrap()
    else {
        panic!("change_cookie_category needs the form");
    };

    let mut form = context.defaults.clone();
    form.category = Some("functionality".to_string());
    fixture.resolver.submit_form(request.clone(), form).unwrap();

    let outcome = fixture
        .resolver
        .resolve(request, NotificationMode::Notify, &CancellationToken::new())
        .await
        .unwrap();
    assert!(outcome.success, "{:?}", outcome.error);

    let cookie = fixture
        .catalog
        .get_cookie(&CookieId::new("c-stats"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(cookie.category_id.as_str(), "functionality");
    assert_eq!(cookie.processing_time, "P1Y");

    let stats = fixture.suggestion(&fixture.classify(), "_stats");
    assert_eq!(stats.classification, ClassificationType::Unproblematic);
}

#[tokio::test]
async fn test_do_not_ignore_uses_its_own_notice() {
    let fixture = crawled();
    let gcl = fixture.suggestion(&fixture.classify(), "_gcl_au");
    let cancel = CancellationToken::new();

    fixture
        .resolver
        .resolve(
            request(&gcl, SolutionKind::IgnorePermanently),
            NotificationMode::Notify,
            &cancel,
        )
        .await
        .unwrap();

    let ignored = fixture.suggestion(&fixture.classify(), "_gcl_au");
    assert_eq!(ignored.classification, ClassificationType::Ignored);

    let outcome = fixture
        .resolver
        .resolve(
            request(&ignored, SolutionKind::DoNotIgnore),
            NotificationMode::Notify,
            &cancel,
        )
        .await
        .unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.notice.unwrap().key, notice::COOKIE_IS_NO_LONGER_IGNORED);

    let gcl = fixture.suggestion(&fixture.classify(), "_gcl_au");
    assert_eq!(gcl.classification, ClassificationType::Missing);
}

#[tokio::test]
async fn test_unknown_solution_type_is_unsupported() {
    let fixture = crawled();
    let gcl = fixture.suggestion(&fixture.classify(), "_gcl_au");
    let mut request = request(&gcl, SolutionKind::IgnorePermanently);
    request.solution_type = "delete_cookie".to_string();

    let outcome = fixture
        .resolver
        .resolve(request, NotificationMode::Notify, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(outcome.error.unwrap().kind(), ErrorKind::UnsupportedSolution);
    assert_eq!(outcome.notice.unwrap().key, notice::UNABLE_TO_RESOLVE_SOLUTION);
}

#[tokio::test]
async fn test_entry_left_staged_after_success_is_reported() {
    let fixture = crawled();
    let gcl = fixture.suggestion(&fixture.classify(), "_gcl_au");
    let staging = Arc::new(StickyStagingStore::default());
    let resolver = Resolver::new(
        project_view(),
        fixture.catalog.clone(),
        fixture.catalog.clone(),
        staging.clone(),
    );

    let request = request(&gcl, SolutionKind::IgnorePermanently);
    resolver.stage(request.clone()).await.unwrap();

    let outcome = resolver
        .resolve(request.clone(), NotificationMode::Notify, &CancellationToken::new())
        .await
        .unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.still_staged, Some(request.solutions_unique_id.clone()));
    let shown = outcome.notice.unwrap();
    assert_eq!(shown.key, notice::RESOLVED_SOLUTION_IS_STILL_STAGED);
    assert_eq!(shown.level, NoticeLevel::Error);
    assert_eq!(resolver.ready_to_resolve().unwrap(), 1);

    let summary = resolver.resolve_all(&CancellationToken::new()).await.unwrap();
    assert_eq!(summary.still_staged, 1);
    assert!(
        summary
            .notices()
            .iter()
            .any(|n| n.key == notice::RESOLVED_SOLUTION_IS_STILL_STAGED)
    );
}
