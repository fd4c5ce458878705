use crate::core::types::{FieldName, MeterKind, NaturalKey, Scope};
use serde::{Deserialize, Serialize};

/// Tri-state patch slot for a single field.
///
/// `Keep` is "key absent from the patch" (leave the field untouched),
/// `Clear` is "key present with null" (explicit clear). The distinction is
/// structural, so `0` and `None` can never be conflated by a falsy check.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum FieldPatch<T> {
    #[default]
    Keep,
    Clear,
    Set(T),
}

impl<T> FieldPatch<T> {
    pub fn is_keep(&self) -> bool {
        matches!(self, Self::Keep)
    }

    /// Builds the patch slot from an already-parsed optional value, where
    /// `None` means an explicit clear (not an omission).
    pub fn from_explicit(value: Option<T>) -> Self {
        match value {
            Some(v) => Self::Set(v),
            None => Self::Clear,
        }
    }
}

impl<T: Clone> FieldPatch<T> {
    /// Applies this slot to the current field value.
    pub fn apply_to(&self, slot: &mut Option<T>) {
        match self {
            Self::Keep => {}
            Self::Clear => *slot = None,
            Self::Set(v) => *slot = Some(v.clone()),
        }
    }
}

/// A single parsed field edit, the unit of debounced persistence.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldEdit {
    ReadingStart(Option<f64>),
    ReadingEnd(Option<f64>),
    Note(Option<String>),
}

impl FieldEdit {
    pub fn field_name(&self) -> FieldName {
        match self {
            Self::ReadingStart(_) => FieldName::ReadingStart,
            Self::ReadingEnd(_) => FieldName::ReadingEnd,
            Self::Note(_) => FieldName::Note,
        }
    }
}

/// Partial patch over a reading record.
///
/// A default-constructed patch touches nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadingPatch {
    pub reading_start: FieldPatch<f64>,
    pub reading_end: FieldPatch<f64>,
    pub note: FieldPatch<String>,
}

impl ReadingPatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the single-field patch carrying exactly one edit.
    pub fn from_edit(edit: &FieldEdit) -> Self {
        let mut patch = Self::new();
        match edit {
            FieldEdit::ReadingStart(v) => patch.reading_start = FieldPatch::from_explicit(*v),
            FieldEdit::ReadingEnd(v) => patch.reading_end = FieldPatch::from_explicit(*v),
            FieldEdit::Note(v) => patch.note = FieldPatch::from_explicit(v.clone()),
        }
        patch
    }

    pub fn with_reading_start(mut self, value: Option<f64>) -> Self {
        self.reading_start = FieldPatch::from_explicit(value);
        self
    }

    pub fn with_reading_end(mut self, value: Option<f64>) -> Self {
        self.reading_end = FieldPatch::from_explicit(value);
        self
    }

    pub fn with_note(mut self, value: Option<String>) -> Self {
        self.note = FieldPatch::from_explicit(value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.reading_start.is_keep() && self.reading_end.is_keep() && self.note.is_keep()
    }

    /// Whether this patch carries a value (or clear) for the given field.
    pub fn touches(&self, field: FieldName) -> bool {
        match field {
            FieldName::ReadingStart => !self.reading_start.is_keep(),
            FieldName::ReadingEnd => !self.reading_end.is_keep(),
            FieldName::Note => !self.note.is_keep(),
        }
    }

    pub fn touched_fields(&self) -> Vec<FieldName> {
        FieldName::ALL
            .into_iter()
            .filter(|field| self.touches(*field))
            .collect()
    }
}

/// Creation payload for a reading record.
///
/// The natural-key fields are required; value fields left out default to
/// null on the optimistic row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingDraft {
    pub scope: Scope,
    pub unit: String,
    pub meter_number: String,
    pub kind: MeterKind,
    #[serde(default)]
    pub reading_start: Option<f64>,
    #[serde(default)]
    pub reading_end: Option<f64>,
    #[serde(default)]
    pub note: Option<String>,
}

impl ReadingDraft {
    pub fn new(
        scope: Scope,
        unit: impl Into<String>,
        meter_number: impl Into<String>,
        kind: MeterKind,
    ) -> Self {
        Self {
            scope,
            unit: unit.into(),
            meter_number: meter_number.into(),
            kind,
            reading_start: None,
            reading_end: None,
            note: None,
        }
    }

    pub fn reading_start(mut self, value: f64) -> Self {
        self.reading_start = Some(value);
        self
    }

    pub fn reading_end(mut self, value: f64) -> Self {
        self.reading_end = Some(value);
        self
    }

    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey {
            scope: self.scope.clone(),
            unit: self.unit.clone(),
            meter_number: self.meter_number.clone(),
            kind: self.kind,
        }
    }
}
