use crate::core::patch::{ReadingDraft, ReadingPatch};
use crate::core::types::{EntityId, MeterKind, NaturalKey, Scope};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A meter reading record.
///
/// This is the entity the synchronization engine moves between its three
/// concurrently valid views: the authoritative snapshot, the local store,
/// and the not-yet-confirmed optimistic rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterReading {
    pub id: EntityId,
    pub scope: Scope,
    pub unit: String,
    pub meter_number: String,
    pub kind: MeterKind,
    pub reading_start: Option<f64>,
    pub reading_end: Option<f64>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MeterReading {
    /// Synthesizes an optimistic row from a creation payload.
    ///
    /// Fields the draft does not supply stay null until the user edits them
    /// or the canonical row arrives.
    pub fn from_draft(id: EntityId, draft: &ReadingDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            scope: draft.scope.clone(),
            unit: draft.unit.clone(),
            meter_number: draft.meter_number.clone(),
            kind: draft.kind,
            reading_start: draft.reading_start,
            reading_end: draft.reading_end,
            note: draft.note.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey {
            scope: self.scope.clone(),
            unit: self.unit.clone(),
            meter_number: self.meter_number.clone(),
            kind: self.kind,
        }
    }

    pub fn is_optimistic(&self) -> bool {
        self.id.is_temp()
    }

    /// Applies a partial patch, returning the patched copy.
    ///
    /// A slot absent from the patch leaves the field untouched; a present
    /// null slot clears it. An all-keep patch returns the record unchanged,
    /// timestamp included.
    pub fn apply_patch(&self, patch: &ReadingPatch, now: DateTime<Utc>) -> Self {
        if patch.is_empty() {
            return self.clone();
        }
        let mut next = self.clone();
        patch.reading_start.apply_to(&mut next.reading_start);
        patch.reading_end.apply_to(&mut next.reading_end);
        patch.note.apply_to(&mut next.note);
        next.updated_at = now;
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn reading() -> MeterReading {
        let t0 = Utc.with_ymd_and_hms(2026, 1, 10, 8, 0, 0).unwrap();
        MeterReading {
            id: EntityId::canonical("r-1"),
            scope: Scope::new("prop-1"),
            unit: "EG links".to_string(),
            meter_number: "7311".to_string(),
            kind: MeterKind::Water,
            reading_start: Some(100.0),
            reading_end: Some(142.5),
            note: Some("Ablesung".to_string()),
            created_at: t0,
            updated_at: t0,
        }
    }

    #[test]
    fn empty_patch_changes_nothing() {
        let base = reading();
        let patched = base.apply_patch(&ReadingPatch::new(), Utc::now());
        assert_eq!(patched, base);
    }

    #[test]
    fn null_slot_clears_only_its_field() {
        let base = reading();
        let now = Utc::now();
        let patched = base.apply_patch(&ReadingPatch::new().with_reading_start(None), now);
        assert_eq!(patched.reading_start, None);
        assert_eq!(patched.reading_end, Some(142.5));
        assert_eq!(patched.note.as_deref(), Some("Ablesung"));
        assert_eq!(patched.updated_at, now);
    }

    #[test]
    fn zero_is_a_value_not_a_clear() {
        let base = reading();
        let patched = base.apply_patch(
            &ReadingPatch::new().with_reading_end(Some(0.0)),
            Utc::now(),
        );
        assert_eq!(patched.reading_end, Some(0.0));
    }
}
