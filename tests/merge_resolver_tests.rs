use chrono::{DateTime, TimeZone, Utc};
use metersync::store::{EntityStore, PendingWrite, PendingWriteRegistry};
use metersync::sync::merge;
use metersync::{EntityId, MeterKind, MeterReading, Scope, SyncError, TempId};

fn at(secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap() + chrono::Duration::seconds(secs)
}

fn scope() -> Scope {
    Scope::new("prop-1")
}

fn canonical(id: &str, meter: &str, updated_secs: i64) -> MeterReading {
    MeterReading {
        id: EntityId::canonical(id),
        scope: scope(),
        unit: "EG links".to_string(),
        meter_number: meter.to_string(),
        kind: MeterKind::Water,
        reading_start: Some(100.0),
        reading_end: None,
        note: None,
        created_at: at(0),
        updated_at: at(updated_secs),
    }
}

fn optimistic(seq: u64, meter: &str) -> (TempId, MeterReading) {
    let temp_id = TempId::with_nonce(seq, "cafe0123");
    let reading = MeterReading {
        id: EntityId::Temp(temp_id.clone()),
        scope: scope(),
        unit: "EG links".to_string(),
        meter_number: meter.to_string(),
        kind: MeterKind::Water,
        reading_start: None,
        reading_end: None,
        note: None,
        created_at: at(0),
        updated_at: at(0),
    };
    (temp_id, reading)
}

fn pending_for(seq: u64, meter: &str) -> (PendingWriteRegistry, EntityStore) {
    let (temp_id, reading) = optimistic(seq, meter);
    let registry = PendingWriteRegistry::new()
        .inserted(PendingWrite {
            temp_id,
            op_seq: seq,
            snapshot: reading.clone(),
        })
        .unwrap();
    let store = EntityStore::new().inserted(reading).unwrap();
    (registry, store)
}

#[test]
fn snapshot_alone_becomes_the_store() {
    let snapshot = vec![canonical("r-1", "100", 0), canonical("r-2", "200", 0)];
    let merged = merge(&snapshot, &EntityStore::new(), &PendingWriteRegistry::new()).unwrap();
    assert_eq!(merged.len(), 2);
    assert!(merged.contains(&EntityId::canonical("r-1")));
    assert!(merged.contains(&EntityId::canonical("r-2")));
}

#[test]
fn newer_local_row_survives_the_refresh() {
    let snapshot = vec![canonical("r-1", "100", 10)];

    let mut local = canonical("r-1", "100", 20);
    local.reading_end = Some(142.5);
    let store = EntityStore::new().inserted(local.clone()).unwrap();

    let merged = merge(&snapshot, &store, &PendingWriteRegistry::new()).unwrap();
    assert_eq!(merged.get(&EntityId::canonical("r-1")), Some(&local));
}

#[test]
fn timestamp_tie_favors_the_snapshot() {
    let authoritative = canonical("r-1", "100", 10);

    let mut local = canonical("r-1", "100", 10);
    local.reading_end = Some(999.0);
    let store = EntityStore::new().inserted(local).unwrap();

    let merged = merge(
        std::slice::from_ref(&authoritative),
        &store,
        &PendingWriteRegistry::new(),
    )
    .unwrap();
    assert_eq!(merged.get(&EntityId::canonical("r-1")), Some(&authoritative));
}

#[test]
fn local_only_rows_are_kept() {
    let snapshot = vec![canonical("r-1", "100", 0)];
    let store = EntityStore::new()
        .inserted(canonical("r-9", "900", 5))
        .unwrap();

    let merged = merge(&snapshot, &store, &PendingWriteRegistry::new()).unwrap();
    assert_eq!(merged.len(), 2);
    assert!(merged.contains(&EntityId::canonical("r-9")));
}

#[test]
fn pending_row_is_included_when_nothing_claims_its_key() {
    let snapshot = vec![canonical("r-1", "100", 0)];
    let (registry, store) = pending_for(1, "777");

    let merged = merge(&snapshot, &store, &registry).unwrap();
    assert_eq!(merged.len(), 2);
    assert!(merged.contains(&EntityId::Temp(TempId::with_nonce(1, "cafe0123"))));
}

#[test]
fn pending_row_is_dropped_when_a_canonical_row_claims_its_key() {
    // the backend already confirmed the same real-world record under a
    // permanent identity; keeping the temp row would duplicate it
    let snapshot = vec![canonical("r-1", "777", 0)];
    let (registry, store) = pending_for(1, "777");

    let merged = merge(&snapshot, &store, &registry).unwrap();
    assert_eq!(merged.len(), 1);
    assert!(merged.contains(&EntityId::canonical("r-1")));
    assert!(merged.readings().iter().all(|r| !r.id.is_temp()));
}

#[test]
fn live_store_copy_of_a_pending_row_wins_over_its_registered_snapshot() {
    let (temp_id, reading) = optimistic(1, "777");
    let registry = PendingWriteRegistry::new()
        .inserted(PendingWrite {
            temp_id: temp_id.clone(),
            op_seq: 1,
            snapshot: reading.clone(),
        })
        .unwrap();

    // the user edited the optimistic row while its create was in flight
    let mut edited = reading;
    edited.reading_start = Some(55.0);
    edited.updated_at = at(5);
    let store = EntityStore::new().inserted(edited.clone()).unwrap();

    let merged = merge(&[], &store, &registry).unwrap();
    assert_eq!(merged.get(&EntityId::Temp(temp_id)), Some(&edited));
}

#[test]
fn stale_temp_row_without_pending_entry_is_dropped() {
    let (_, reading) = optimistic(1, "777");
    let store = EntityStore::new().inserted(reading).unwrap();

    let merged = merge(&[], &store, &PendingWriteRegistry::new()).unwrap();
    assert!(merged.is_empty());
}

#[test]
fn merge_is_idempotent() {
    let snapshot = vec![canonical("r-1", "100", 10), canonical("r-2", "200", 0)];

    let mut local = canonical("r-1", "100", 20);
    local.reading_end = Some(142.5);
    let (registry, pending_store) = pending_for(3, "777");
    let store = pending_store.inserted(local).unwrap();

    let once = merge(&snapshot, &store, &registry).unwrap();
    let twice = merge(&snapshot, &once, &registry).unwrap();
    assert_eq!(once, twice);
}

#[test]
fn duplicate_snapshot_identity_is_an_integrity_error() {
    let snapshot = vec![canonical("r-1", "100", 0), canonical("r-1", "200", 0)];
    let err = merge(&snapshot, &EntityStore::new(), &PendingWriteRegistry::new()).unwrap_err();
    assert!(matches!(err, SyncError::ReferenceIntegrity(_)));
}

#[test]
fn temporary_identity_in_snapshot_is_an_integrity_error() {
    let (_, reading) = optimistic(1, "777");
    let err = merge(
        std::slice::from_ref(&reading),
        &EntityStore::new(),
        &PendingWriteRegistry::new(),
    )
    .unwrap_err();
    assert!(matches!(err, SyncError::ReferenceIntegrity(_)));
}
