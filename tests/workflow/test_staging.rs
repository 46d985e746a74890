use crate::common::{Fixture, PROJECT, day, project_view, request, seeded_catalog};
use cookie_triage::staging::{FileStagingStore, MemoryStagingStore};
use cookie_triage::suggestion::{SolutionKind, SolutionValues};
use cookie_triage::{
    DiscoveredFact, ProjectId, Resolver, SolutionsUniqueId, StageOutcome, StagedSolution,
    StagingKey, StagingStore,
};
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn entry(project: &str, group: &str, solution_type: &str) -> StagedSolution {
    StagedSolution::new(
        ProjectId::new(project),
        group.into(),
        format!("{group}-{solution_type}").into(),
        solution_type,
        format!("suggestion-{group}").into(),
        SolutionValues::new(),
    )
}

fn check_store(store: &dyn StagingStore) {
    let project = ProjectId::new(PROJECT);

    // Last write wins per (project, group)
    store.store(entry(PROJECT, "g1", "ignore_permanently")).unwrap();
    store.store(entry(PROJECT, "g1", "ignore_until_next_occurrence")).unwrap();
    store.store(entry(PROJECT, "g2", "do_not_ignore")).unwrap();
    store.store(entry("p2", "g1", "ignore_permanently")).unwrap();

    let all = store.get_all(&project).unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(
        all[&SolutionsUniqueId::new("g1")].solution_type,
        "ignore_until_next_occurrence"
    );

    // Projects never see each other's entries
    let other = store.get_all(&ProjectId::new("p2")).unwrap();
    assert_eq!(other.len(), 1);
    assert_eq!(other[&SolutionsUniqueId::new("g1")].solution_type, "ignore_permanently");

    // Removing an absent key is fine
    store
        .remove(&StagingKey::new(project.clone(), "absent".into()))
        .unwrap();

    store.remove_all(&project).unwrap();
    assert!(store.get_all(&project).unwrap().is_empty());
    assert_eq!(store.get_all(&ProjectId::new("p2")).unwrap().len(), 1);
}

#[test]
fn test_memory_store_keying() {
    check_store(&MemoryStagingStore::new());
}

#[test]
fn test_file_store_keying() {
    let temp_dir = TempDir::new().unwrap();
    check_store(&FileStagingStore::new(temp_dir.path()));
}

#[test]
fn test_file_store_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let staged = entry(PROJECT, "g1", "ignore_permanently");

    FileStagingStore::new(temp_dir.path())
        .store(staged.clone())
        .unwrap();

    let reopened = FileStagingStore::new(temp_dir.path());
    assert_eq!(reopened.get(&staged.key()).unwrap(), Some(staged));
}

#[tokio::test]
async fn test_resolver_over_file_store() {
    let temp_dir = TempDir::new().unwrap();
    let catalog = Arc::new(seeded_catalog());
    let staging: Arc<dyn StagingStore> = Arc::new(FileStagingStore::new(temp_dir.path()));
    let resolver = Resolver::new(project_view(), catalog.clone(), catalog.clone(), staging.clone());

    let fixture = Fixture {
        catalog: catalog.clone(),
        staging: Arc::new(MemoryStagingStore::new()),
        resolver: resolver.clone(),
    };
    fixture.record(vec![DiscoveredFact::new("ads.example.com", "_gcl_au", day(1), 1)]);
    let gcl = fixture.suggestion(&fixture.classify(), "_gcl_au");

    let outcome = resolver
        .stage(request(&gcl, SolutionKind::IgnorePermanently))
        .await
        .unwrap();
    assert!(matches!(outcome, StageOutcome::Staged(_)));

    // A second resolver over the same directory sees the entry
    let other = Resolver::new(
        project_view(),
        catalog.clone(),
        catalog.clone(),
        Arc::new(FileStagingStore::new(temp_dir.path())),
    );
    assert_eq!(other.ready_to_resolve().unwrap(), 1);

    let summary = other.resolve_all(&CancellationToken::new()).await.unwrap();
    assert_eq!(summary.success, 1);
    assert_eq!(resolver.ready_to_resolve().unwrap(), 0);
}

#[tokio::test]
async fn test_reset_clears_entries() {
    let fixture = Fixture::new();
    fixture.record(vec![
        DiscoveredFact::new("ads.example.com", "_gcl_au", day(1), 1),
        DiscoveredFact::new("cdn.example.com", "_cdn", day(1), 1),
    ]);
    let result = fixture.classify();
    let gcl = fixture.suggestion(&result, "_gcl_au");
    let cdn = fixture.suggestion(&result, "_cdn");

    for suggestion in [&gcl, &cdn] {
        fixture
            .resolver
            .stage(request(suggestion, SolutionKind::IgnorePermanently))
            .await
            .unwrap();
    }
    assert_eq!(fixture.resolver.ready_to_resolve().unwrap(), 2);

    fixture.resolver.reset(&gcl.solutions.solutions_unique_id).unwrap();
    let staged = fixture.resolver.staged().unwrap();
    assert_eq!(staged.len(), 1);
    assert_eq!(staged[0].cookie_suggestion_id, cdn.suggestion.id);

    fixture.resolver.reset_all().unwrap();
    assert!(fixture.staging.is_empty());

    assert!(fixture.catalog.dispatched().is_empty());
}
