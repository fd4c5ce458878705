use crate::core::{EntityId, MeterReading, NaturalKey, Result, SyncError};
use crate::store::{EntityStore, PendingWriteRegistry};
use im::OrdMap;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Combines the three concurrently valid views of the data into one
/// consistent store:
///
/// 1. the freshly loaded authoritative snapshot,
/// 2. the current local store (which may carry optimistic field edits and
///    rows the snapshot does not know yet),
/// 3. the registry of optimistic creates still awaiting confirmation.
///
/// A refresh must go through here instead of replacing the store outright,
/// or in-flight optimistic data would be lost.
///
/// The result never contains two rows with the same permanent identity,
/// and never a pending row whose natural key a canonical row already
/// claims.
pub fn merge(
    snapshot: &[MeterReading],
    current: &EntityStore,
    pending: &PendingWriteRegistry,
) -> Result<EntityStore> {
    let mut result: OrdMap<EntityId, MeterReading> = OrdMap::new();
    let mut claimed_keys: HashSet<NaturalKey> = HashSet::new();

    // 1. authoritative snapshot, indexed by permanent identity
    for reading in snapshot {
        if reading.id.is_temp() {
            return Err(SyncError::ReferenceIntegrity(format!(
                "authoritative snapshot contains temporary identity '{}'",
                reading.id
            )));
        }
        if result.contains_key(&reading.id) {
            return Err(SyncError::ReferenceIntegrity(format!(
                "authoritative snapshot contains duplicate identity '{}'",
                reading.id
            )));
        }
        claimed_keys.insert(reading.natural_key());
        result.insert(reading.id.clone(), reading.clone());
    }

    // 2. fold in the local store: last write wins per identity, ties favor
    //    the snapshot; rows the snapshot does not know yet are kept
    for (id, local) in current.iter() {
        if let Some(temp_id) = id.as_temp() {
            // live optimistic rows are folded in step 3; a temporary row
            // no longer registered as pending has been superseded already
            if !pending.contains(temp_id) {
                warn!(entity = %id, "dropping stale temporary row with no pending create");
            }
            continue;
        }
        let keep_local = match result.get(id) {
            Some(canonical) => local.updated_at > canonical.updated_at,
            None => {
                claimed_keys.insert(local.natural_key());
                true
            }
        };
        if keep_local {
            result.insert(id.clone(), local.clone());
        }
    }

    // 3. fold in pending creates: prefer the store's live copy (it may
    //    carry newer optimistic edits than the registered snapshot), and
    //    drop any row whose natural key a canonical row already claims
    for (temp_id, write) in pending.iter() {
        let id = EntityId::Temp(temp_id.clone());
        let live = current
            .get(&id)
            .cloned()
            .unwrap_or_else(|| write.snapshot.clone());
        let key = live.natural_key();
        if claimed_keys.contains(&key) {
            debug!(
                entity = %id,
                "dropping pending row; a canonical row with its natural key has arrived"
            );
            continue;
        }
        claimed_keys.insert(key);
        result.insert(id, live);
    }

    Ok(EntityStore::from_map(result))
}

/// Last-write-wins fold of one local row against its canonical
/// counterpart. Ties favor the canonical side.
pub fn latest_of(local: &MeterReading, canonical: &MeterReading) -> MeterReading {
    if local.updated_at > canonical.updated_at {
        local.clone()
    } else {
        canonical.clone()
    }
}
