use chrono::Utc;
use metersync::{
    EntityId, MemoryAdapter, MeterKind, MeterReading, ReadingDraft, ReconciliationController,
    Scope, SyncConfig, SyncError,
};
use std::sync::Arc;
use std::time::Duration;

fn scope() -> Scope {
    Scope::new("prop-1")
}

fn draft(meter: &str) -> ReadingDraft {
    ReadingDraft::new(scope(), "EG links", meter, MeterKind::Water)
}

fn engine_over(
    adapter: Arc<MemoryAdapter>,
) -> ReconciliationController<Arc<MemoryAdapter>> {
    ReconciliationController::new(adapter, scope(), SyncConfig::default()).unwrap()
}

fn seeded_row(id: &str, meter: &str) -> MeterReading {
    let now = Utc::now();
    MeterReading {
        id: EntityId::canonical(id),
        scope: scope(),
        unit: "EG links".to_string(),
        meter_number: meter.to_string(),
        kind: MeterKind::Water,
        reading_start: Some(100.0),
        reading_end: None,
        note: None,
        created_at: now,
        updated_at: now,
    }
}

async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn create_shows_the_optimistic_row_before_confirmation() {
    let adapter = Arc::new(MemoryAdapter::new().with_latency(Duration::from_millis(100)));
    let engine = engine_over(adapter.clone());

    let handle = tokio::spawn({
        let engine = engine.clone();
        async move { engine.create(draft("7311").reading_end(142.5)).await }
    });
    settle().await;

    // confirmation is still in flight: the row is visible under a
    // temporary identity, unsupplied fields defaulted to null
    let store = engine.store();
    assert_eq!(store.len(), 1);
    let row = &store.readings()[0];
    assert!(row.id.is_temp());
    assert!(row.id.to_string().starts_with("temp:1:"));
    assert_eq!(row.reading_start, None);
    assert_eq!(row.reading_end, Some(142.5));
    assert_eq!(engine.pending_count(), 1);

    let created = handle.await.unwrap().unwrap();
    assert_eq!(created.id, EntityId::canonical("r-1"));

    // reconciled: exactly one canonical row, no temp identity left behind
    let store = engine.store();
    assert_eq!(store.len(), 1);
    assert_eq!(store.readings()[0].id, EntityId::canonical("r-1"));
    assert!(store.readings().iter().all(|r| !r.id.is_temp()));
    assert_eq!(engine.pending_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn failed_create_rolls_back_completely() {
    let adapter = Arc::new(MemoryAdapter::new());
    let engine = engine_over(adapter.clone());
    adapter.fail_next_create();

    let err = engine.create(draft("7311")).await.unwrap_err();
    assert!(matches!(err, SyncError::Persistence(_)));

    // no orphaned optimistic state survives
    assert!(engine.store().is_empty());
    assert_eq!(engine.pending_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn conflicting_create_rolls_back_and_keeps_the_existing_row() {
    let adapter = Arc::new(MemoryAdapter::new());
    adapter.seed(seeded_row("r-77", "7311")).await.unwrap();
    let engine = engine_over(adapter.clone());
    engine.refresh().await.unwrap();
    assert_eq!(engine.store().len(), 1);

    let err = engine.create(draft("7311")).await.unwrap_err();
    assert!(matches!(err, SyncError::Conflict(_)));

    let store = engine.store();
    assert_eq!(store.len(), 1);
    assert_eq!(store.readings()[0].id, EntityId::canonical("r-77"));
    assert_eq!(engine.pending_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn refresh_during_a_pending_create_never_duplicates_the_row() {
    let adapter = Arc::new(MemoryAdapter::new().with_latency(Duration::from_millis(100)));
    let engine = engine_over(adapter.clone());

    let handle = tokio::spawn({
        let engine = engine.clone();
        async move { engine.create(draft("7311")).await }
    });
    settle().await;
    assert!(engine.store().readings()[0].id.is_temp());

    // the backend has committed the row; this refresh sees its canonical
    // form while our create's confirmation is still travelling back
    engine.refresh().await.unwrap();
    handle.await.unwrap().unwrap();

    let store = engine.store();
    assert_eq!(store.len(), 1);
    assert_eq!(store.readings()[0].id, EntityId::canonical("r-1"));
    assert!(store.readings().iter().all(|r| !r.id.is_temp()));
    assert_eq!(engine.pending_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn create_still_succeeds_when_a_refresh_already_installed_its_row() {
    let adapter = Arc::new(
        MemoryAdapter::new()
            .with_latency(Duration::from_millis(100))
            .with_list_latency(Duration::ZERO),
    );
    let engine = engine_over(adapter.clone());

    let handle = tokio::spawn({
        let engine = engine.clone();
        async move { engine.create(draft("7311")).await }
    });
    settle().await;
    assert!(engine.store().readings()[0].id.is_temp());

    // the backend has committed the row; with an instant list this refresh
    // merges the canonical form in and drops the optimistic row while the
    // create's response is still travelling back
    engine.refresh().await.unwrap();
    let store = engine.store();
    assert_eq!(store.len(), 1);
    assert_eq!(store.readings()[0].id, EntityId::canonical("r-1"));
    assert_eq!(engine.pending_count(), 1);

    // the create must still resolve with the canonical row, with nothing
    // left to reconcile in the store
    let created = handle.await.unwrap().unwrap();
    assert_eq!(created.id, EntityId::canonical("r-1"));
    assert_eq!(engine.store().len(), 1);
    assert_eq!(engine.pending_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn conflicting_create_surfaces_its_error_after_a_refresh_dropped_the_row() {
    let adapter = Arc::new(
        MemoryAdapter::new()
            .with_latency(Duration::from_millis(100))
            .with_list_latency(Duration::ZERO),
    );
    adapter.seed(seeded_row("r-77", "7311")).await.unwrap();
    let engine = engine_over(adapter.clone());

    let handle = tokio::spawn({
        let engine = engine.clone();
        async move { engine.create(draft("7311")).await }
    });
    settle().await;
    assert!(engine.store().readings()[0].id.is_temp());

    // the refresh sees the server row that wins the conflict and drops the
    // optimistic one before the create's rejection arrives
    engine.refresh().await.unwrap();
    assert_eq!(engine.store().len(), 1);
    assert_eq!(engine.store().readings()[0].id, EntityId::canonical("r-77"));

    // the rollback has nothing left to remove, and the caller still gets
    // the conflict rather than an internal error
    let err = handle.await.unwrap().unwrap_err();
    assert!(matches!(err, SyncError::Conflict(_)));
    assert_eq!(engine.store().len(), 1);
    assert_eq!(engine.pending_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn concurrent_creates_do_not_collide() {
    let adapter = Arc::new(MemoryAdapter::new().with_latency(Duration::from_millis(100)));
    let engine = engine_over(adapter.clone());

    let first = tokio::spawn({
        let engine = engine.clone();
        async move { engine.create(draft("7311")).await }
    });
    let second = tokio::spawn({
        let engine = engine.clone();
        async move { engine.create(draft("9922")).await }
    });
    settle().await;

    // two independent optimistic rows, each with its own sequence
    assert_eq!(engine.store().len(), 2);
    assert_eq!(engine.pending_count(), 2);

    let first = first.await.unwrap().unwrap();
    let second = second.await.unwrap().unwrap();
    assert_ne!(first.id, second.id);

    let store = engine.store();
    assert_eq!(store.len(), 2);
    assert!(store.readings().iter().all(|r| !r.id.is_temp()));
    assert_eq!(engine.pending_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn refresh_folds_instead_of_replacing() {
    let adapter = Arc::new(MemoryAdapter::new());
    adapter.seed(seeded_row("r-1", "100")).await.unwrap();
    adapter.seed(seeded_row("r-2", "200")).await.unwrap();
    let engine = engine_over(adapter.clone());

    engine.refresh().await.unwrap();
    assert_eq!(engine.store().len(), 2);

    // refresh again; nothing is lost or duplicated
    engine.refresh().await.unwrap();
    assert_eq!(engine.store().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn observers_see_the_reconciled_store() {
    let adapter = Arc::new(MemoryAdapter::new());
    let engine = engine_over(adapter.clone());
    let rx = engine.subscribe();

    engine.create(draft("7311")).await.unwrap();

    let observed = rx.borrow().clone();
    assert_eq!(observed.len(), 1);
    assert!(!observed.readings()[0].id.is_temp());
}
