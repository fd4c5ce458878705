use crate::core::{EntityId, MeterReading, ReadingDraft, ReadingPatch, Result, Scope, SyncError};
use crate::persist::PersistenceAdapter;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

/// In-memory backing store.
///
/// Allocates canonical identities (`r-<n>`), enforces natural-key
/// uniqueness on create, and records every update call so tests can assert
/// exactly which patches were sent. `latency` delays each operation on the
/// tokio clock, which lets tests observe the optimistic window between a
/// create being issued and its confirmation.
pub struct MemoryAdapter {
    rows: RwLock<HashMap<String, MeterReading>>,
    update_calls: RwLock<Vec<(EntityId, ReadingPatch)>>,
    next_id: AtomicU64,
    create_count: AtomicU64,
    fail_next_create: AtomicBool,
    fail_next_update: AtomicBool,
    latency: Duration,
    list_latency: Option<Duration>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
            update_calls: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(0),
            create_count: AtomicU64::new(0),
            fail_next_create: AtomicBool::new(false),
            fail_next_update: AtomicBool::new(false),
            latency: Duration::ZERO,
            list_latency: None,
        }
    }

    /// Delay every operation by `latency` on the tokio clock.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Override the latency applied to list calls alone. Lets a test pin
    /// down a refresh landing while a slower create is still in flight.
    pub fn with_list_latency(mut self, latency: Duration) -> Self {
        self.list_latency = Some(latency);
        self
    }

    /// Preinstalls a canonical row, bypassing the create path.
    pub async fn seed(&self, reading: MeterReading) -> Result<()> {
        let EntityId::Canonical(id) = &reading.id else {
            return Err(SyncError::ReferenceIntegrity(format!(
                "seeded row '{}' must carry a canonical identity",
                reading.id
            )));
        };
        self.rows.write().await.insert(id.clone(), reading);
        Ok(())
    }

    /// Makes the next create call fail with a persistence error.
    pub fn fail_next_create(&self) {
        self.fail_next_create.store(true, Ordering::SeqCst);
    }

    /// Makes the next update call fail with a persistence error.
    pub fn fail_next_update(&self) {
        self.fail_next_update.store(true, Ordering::SeqCst);
    }

    pub fn create_count(&self) -> u64 {
        self.create_count.load(Ordering::SeqCst)
    }

    /// Every `(id, patch)` pair the engine has sent, in arrival order.
    pub async fn update_calls(&self) -> Vec<(EntityId, ReadingPatch)> {
        self.update_calls.read().await.clone()
    }

    async fn simulate_latency(&self) {
        Self::sleep_for(self.latency).await;
    }

    async fn sleep_for(latency: Duration) {
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }
}

impl Default for MemoryAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PersistenceAdapter for MemoryAdapter {
    async fn create(&self, draft: ReadingDraft) -> Result<MeterReading> {
        self.create_count.fetch_add(1, Ordering::SeqCst);

        if self.fail_next_create.swap(false, Ordering::SeqCst) {
            self.simulate_latency().await;
            return Err(SyncError::Persistence(
                "injected create failure".to_string(),
            ));
        }

        let outcome = {
            let mut rows = self.rows.write().await;
            let key = draft.natural_key();
            if rows.values().any(|row| row.natural_key() == key) {
                Err(SyncError::Conflict(format!(
                    "meter {} in unit '{}' already has a reading",
                    draft.meter_number, draft.unit
                )))
            } else {
                let id = format!("r-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
                let reading =
                    MeterReading::from_draft(EntityId::canonical(&id), &draft, Utc::now());
                rows.insert(id, reading.clone());
                Ok(reading)
            }
        };

        // the outcome is decided; the latency models the response
        // travelling back, which is the window a concurrent refresh can
        // observe
        self.simulate_latency().await;
        outcome
    }

    async fn update(&self, id: &EntityId, patch: ReadingPatch) -> Result<MeterReading> {
        self.update_calls
            .write()
            .await
            .push((id.clone(), patch.clone()));

        if self.fail_next_update.swap(false, Ordering::SeqCst) {
            self.simulate_latency().await;
            return Err(SyncError::Persistence(
                "injected update failure".to_string(),
            ));
        }

        let EntityId::Canonical(key) = id else {
            // a temporary identity was never issued by this store
            self.simulate_latency().await;
            return Err(SyncError::NotFound(id.to_string()));
        };

        let next = {
            let mut rows = self.rows.write().await;
            let current = rows
                .get(key)
                .ok_or_else(|| SyncError::NotFound(id.to_string()))?;
            let next = current.apply_patch(&patch, Utc::now());
            rows.insert(key.clone(), next.clone());
            next
        };

        self.simulate_latency().await;
        Ok(next)
    }

    async fn list(&self, scope: &Scope) -> Result<Vec<MeterReading>> {
        Self::sleep_for(self.list_latency.unwrap_or(self.latency)).await;
        let rows = self.rows.read().await;
        let mut listed: Vec<MeterReading> = rows
            .values()
            .filter(|row| row.scope == *scope)
            .cloned()
            .collect();
        listed.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(listed)
    }
}
