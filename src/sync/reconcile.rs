use crate::config::SyncConfig;
use crate::core::{
    parse_note_input, parse_reading_input, EntityId, FieldEdit, FieldName, MeterReading,
    ReadingDraft, ReadingPatch, Result, SaveStatus, Scope, SyncError, TempId,
};
use crate::persist::PersistenceAdapter;
use crate::store::{EntityStore, PendingHandle, PendingWrite, StoreHandle};
use crate::sync::debounce::{FieldDebounceScheduler, FieldKey};
use crate::sync::merge::{latest_of, merge};
use crate::sync::status::SaveStatusBoard;
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{oneshot, watch};
use tracing::{debug, warn};

/// Resolves once the debounced save for a field edit completes.
///
/// When a later edit to the same field coalesces this one away, the ticket
/// reports `Superseded` instead of a canonical row.
#[derive(Debug)]
pub struct SaveTicket {
    rx: oneshot::Receiver<Result<MeterReading>>,
}

impl SaveTicket {
    pub async fn outcome(self) -> Result<MeterReading> {
        self.rx.await.unwrap_or(Err(SyncError::Superseded))
    }
}

/// Orchestrates the optimistic create/update lifecycle.
///
/// Creates insert an optimistic row under a temporary identity before the
/// persistence call is awaited; field edits patch the store instantly and
/// commit through the per-field debounce scheduler. Confirmation and
/// refresh results are folded back through the merge resolver, never
/// blindly replacing the store.
pub struct ReconciliationController<A: PersistenceAdapter> {
    adapter: Arc<A>,
    scope: Scope,
    store: StoreHandle,
    pending: PendingHandle,
    status: SaveStatusBoard,
    scheduler: FieldDebounceScheduler,
    op_seq: Arc<AtomicU64>,
    config: SyncConfig,
}

impl<A: PersistenceAdapter> Clone for ReconciliationController<A> {
    fn clone(&self) -> Self {
        Self {
            adapter: self.adapter.clone(),
            scope: self.scope.clone(),
            store: self.store.clone(),
            pending: self.pending.clone(),
            status: self.status.clone(),
            scheduler: self.scheduler.clone(),
            op_seq: self.op_seq.clone(),
            config: self.config.clone(),
        }
    }
}

impl<A: PersistenceAdapter> ReconciliationController<A> {
    pub fn new(adapter: A, scope: Scope, config: SyncConfig) -> Result<Self> {
        config.validate().map_err(SyncError::Config)?;
        Ok(Self {
            adapter: Arc::new(adapter),
            scope,
            store: StoreHandle::new(),
            pending: PendingHandle::new(),
            status: SaveStatusBoard::new(config.saved_clear_after, config.error_clear_after),
            scheduler: FieldDebounceScheduler::new(config.debounce_window),
            op_seq: Arc::new(AtomicU64::new(0)),
            config,
        })
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Snapshot of the committed store.
    pub fn store(&self) -> EntityStore {
        self.store.snapshot()
    }

    /// Subscribe to committed store snapshots.
    pub fn subscribe(&self) -> watch::Receiver<EntityStore> {
        self.store.subscribe()
    }

    pub fn save_status(&self, id: &EntityId, field: FieldName) -> SaveStatus {
        self.status.status(&(id.clone(), field))
    }

    pub fn pending_count(&self) -> usize {
        self.pending.snapshot().len()
    }

    /// Creates a record optimistically.
    ///
    /// The optimistic row is visible to readers under its temporary
    /// identity before the persistence call is awaited. On confirmation the
    /// temporary row is replaced by the canonical one, unless a concurrent
    /// refresh already installed a row with the same natural key, in which
    /// case the optimistic row is simply dropped rather than duplicated.
    /// On failure both the store row and the registry entry are rolled
    /// back; no partial state survives.
    pub async fn create(&self, draft: ReadingDraft) -> Result<MeterReading> {
        let op_seq = self.op_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let temp_id = TempId::new(op_seq);
        let optimistic = MeterReading::from_draft(
            EntityId::Temp(temp_id.clone()),
            &draft,
            Utc::now(),
        );

        self.store
            .update_with(|store| store.inserted(optimistic.clone()))?;
        self.pending.update_with(|pending| {
            pending.inserted(PendingWrite {
                temp_id: temp_id.clone(),
                op_seq,
                snapshot: optimistic.clone(),
            })
        })?;
        self.debug_check_registry_subset();
        debug!(entity = %optimistic.id, op_seq, "optimistic row inserted");

        match self.adapter.create(draft).await {
            Ok(canonical) => {
                self.pending
                    .update_with(|pending| Ok(pending.removed(&temp_id).without_op_seq(op_seq)))?;
                // a concurrent refresh may have merged the canonical row in
                // already, dropping the temp row from the store; that leaves
                // nothing to do here, which must not trip the mutation guard
                self.store.update_if_changed(|store| {
                    let temp = EntityId::Temp(temp_id.clone());
                    let had_temp = store.contains(&temp);
                    let without_temp = store.removed(&temp);
                    if without_temp.by_natural_key(&canonical.natural_key()).is_some() {
                        debug!(
                            entity = %canonical.id,
                            "canonical row already present; dropping optimistic row"
                        );
                        if had_temp {
                            Ok(Some(without_temp))
                        } else {
                            Ok(None)
                        }
                    } else {
                        without_temp.inserted(canonical.clone()).map(Some)
                    }
                })?;
                self.debug_check_registry_subset();
                debug!(entity = %canonical.id, op_seq, "create reconciled");
                Ok(canonical)
            }
            Err(err) => {
                warn!(entity = %optimistic.id, op_seq, error = %err, "create failed; rolling back");
                self.pending
                    .update_with(|pending| Ok(pending.removed(&temp_id)))?;
                // the temp row may already be gone if a refresh merged in a
                // canonical row claiming its natural key; the rollback is
                // then a no-op and the adapter's error must still surface
                self.store.update_if_changed(|store| {
                    let temp = EntityId::Temp(temp_id.clone());
                    if store.contains(&temp) {
                        Ok(Some(store.removed(&temp)))
                    } else {
                        Ok(None)
                    }
                })?;
                Err(err)
            }
        }
    }

    /// Applies a field edit optimistically and schedules its debounced
    /// persistence.
    ///
    /// The raw input is parsed first: an empty input is an explicit clear,
    /// an unparsable numeric input is rejected locally and nothing is
    /// scheduled. The store reflects the edit instantly and the field's
    /// indicator switches to `Saving`; the persistence call itself fires
    /// once the field's quiescence window elapses. A failed save keeps the
    /// locally typed value so the user can retry or correct it.
    pub fn update_field(
        &self,
        id: &EntityId,
        field: FieldName,
        raw: &str,
    ) -> Result<SaveTicket> {
        let edit = self.parse_edit(field, raw)?;
        let patch = ReadingPatch::from_edit(&edit);

        self.store
            .update_with(|store| store.patched(id, &patch, Utc::now()))?;

        let key: FieldKey = (id.clone(), field);
        self.status.begin_save(&key)?;

        let (tx, rx) = oneshot::channel();
        let adapter = self.adapter.clone();
        let store = self.store.clone();
        let status = self.status.clone();
        let scheduler = self.scheduler.clone();
        let commit_key = key.clone();
        self.scheduler.schedule(key, move || async move {
            let result =
                Self::commit_field(adapter, store, status, scheduler, commit_key, patch).await;
            let _ = tx.send(result);
        })?;

        Ok(SaveTicket { rx })
    }

    /// Blur: commits the field's pending edit immediately, bypassing the
    /// quiescence window. Sibling timers are untouched. Returns whether a
    /// commit was pending.
    pub async fn flush_field(&self, id: &EntityId, field: FieldName) -> Result<bool> {
        self.scheduler.flush_now(&(id.clone(), field)).await
    }

    /// Teardown: commits every still-armed field edit so nothing typed
    /// right before navigating away is lost. Returns how many commits ran.
    pub async fn shutdown(&self) -> Result<usize> {
        self.scheduler.flush_all().await
    }

    /// Reloads the authoritative snapshot and folds it into the store.
    ///
    /// Never replaces the store outright: optimistic rows and in-flight
    /// edits survive the refresh through the merge resolver.
    pub async fn refresh(&self) -> Result<()> {
        let snapshot = self.adapter.list(&self.scope).await?;
        let merged = merge(&snapshot, &self.store.snapshot(), &self.pending.snapshot())?;
        self.store.commit(merged)?;
        self.debug_check_registry_subset();
        Ok(())
    }

    fn parse_edit(&self, field: FieldName, raw: &str) -> Result<FieldEdit> {
        match field {
            FieldName::ReadingStart => Ok(FieldEdit::ReadingStart(parse_reading_input(
                raw,
                self.config.decimal_separator,
            )?)),
            FieldName::ReadingEnd => Ok(FieldEdit::ReadingEnd(parse_reading_input(
                raw,
                self.config.decimal_separator,
            )?)),
            FieldName::Note => Ok(FieldEdit::Note(parse_note_input(raw))),
        }
    }

    /// Runs when a field's debounce window elapses (or the field is
    /// flushed): sends the single-field patch and folds the canonical
    /// result back into the store.
    async fn commit_field(
        adapter: Arc<A>,
        store: StoreHandle,
        status: SaveStatusBoard,
        scheduler: FieldDebounceScheduler,
        key: FieldKey,
        patch: ReadingPatch,
    ) -> Result<MeterReading> {
        let (id, field) = &key;
        match adapter.update(id, patch).await {
            Ok(canonical) => {
                store.update_if_changed(|current| {
                    let Some(local) = current.get(id) else {
                        // the row left the store while the save was in
                        // flight (rollback or deletion); nothing to fold
                        return Ok(None);
                    };
                    let mut next = latest_of(local, &canonical);
                    for other in FieldName::ALL {
                        // the committed field always takes the canonical
                        // value the adapter returned for it
                        if other == *field {
                            continue;
                        }
                        // a sibling whose edit is still armed, whose own
                        // save is still in flight, or whose failed save is
                        // awaiting retry keeps its local optimistic value;
                        // the canonical row does not carry it yet
                        let other_key = (id.clone(), other);
                        let other_status = status.status(&other_key);
                        if scheduler.is_armed(&other_key)
                            || other_status == SaveStatus::Saving
                            || other_status == SaveStatus::Error
                        {
                            keep_local_field(&mut next, local, other);
                        }
                    }
                    if next == *local {
                        return Ok(None);
                    }
                    Ok(Some(current.replaced(next)))
                })?;
                // when a newer edit has re-armed the timer, that edit owns
                // the indicator now
                if !scheduler.is_armed(&key) {
                    status.finish_saved(&key)?;
                }
                debug!(entity = %id, field = %field, "field saved");
                Ok(canonical)
            }
            Err(err) => {
                // the locally typed value is deliberately kept; the error
                // indicator tells the user to retry or correct it
                warn!(entity = %id, field = %field, error = %err, "field save failed");
                if !scheduler.is_armed(&key) {
                    status.finish_error(&key)?;
                }
                Err(err)
            }
        }
    }

    fn debug_check_registry_subset(&self) {
        #[cfg(debug_assertions)]
        {
            let store = self.store.snapshot();
            let pending = self.pending.snapshot();
            for (temp_id, write) in pending.iter() {
                // a pending temp may be absent only while a canonical row
                // with its natural key supersedes it (a refresh merged the
                // confirmed row in before the create's response arrived)
                let present = store.contains(&EntityId::Temp(temp_id.clone()));
                let superseded = store
                    .by_natural_key(&write.snapshot.natural_key())
                    .is_some_and(|row| !row.id.is_temp());
                debug_assert!(
                    present || superseded,
                    "pending temporary identity '{temp_id}' is missing from the entity store"
                );
            }
        }
    }
}

fn keep_local_field(next: &mut MeterReading, local: &MeterReading, field: FieldName) {
    match field {
        FieldName::ReadingStart => next.reading_start = local.reading_start,
        FieldName::ReadingEnd => next.reading_end = local.reading_end,
        FieldName::Note => next.note = local.note.clone(),
    }
}
