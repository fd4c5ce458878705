use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of the property ("Liegenschaft") a reading list belongs to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scope(String);

impl Scope {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of meter a reading belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeterKind {
    Electricity,
    Water,
    Heat,
    Gas,
}

impl MeterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Electricity => "electricity",
            Self::Water => "water",
            Self::Heat => "heat",
            Self::Gas => "gas",
        }
    }
}

/// Locally generated placeholder identity for a record that has not been
/// confirmed by the backing store yet.
///
/// Renders as `temp:<seq>:<nonce>`. The sequence number is strictly
/// increasing per process, so concurrent creates can never collide; the
/// nonce guards against accidental reuse across restarts.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TempId {
    pub seq: u64,
    pub nonce: String,
}

impl TempId {
    /// Allocates a temporary identity for the given operation sequence.
    pub fn new(seq: u64) -> Self {
        let nonce = Uuid::new_v4().simple().to_string()[..8].to_string();
        Self { seq, nonce }
    }

    pub fn with_nonce(seq: u64, nonce: impl Into<String>) -> Self {
        Self {
            seq,
            nonce: nonce.into(),
        }
    }
}

impl fmt::Display for TempId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "temp:{}:{}", self.seq, self.nonce)
    }
}

/// Identity of a reading record.
///
/// Canonical identities are issued by the backing store; temporary ones are
/// allocated locally for optimistic rows. Canonical identities sort before
/// temporary ones so that confirmed rows lead a merged listing.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum EntityId {
    Canonical(String),
    Temp(TempId),
}

impl EntityId {
    pub fn canonical(id: impl Into<String>) -> Self {
        Self::Canonical(id.into())
    }

    pub fn is_temp(&self) -> bool {
        matches!(self, Self::Temp(_))
    }

    pub fn as_temp(&self) -> Option<&TempId> {
        match self {
            Self::Temp(temp) => Some(temp),
            Self::Canonical(_) => None,
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Canonical(id) => write!(f, "{id}"),
            Self::Temp(temp) => write!(f, "{temp}"),
        }
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for EntityId {
    type Error = String;

    fn try_from(raw: String) -> std::result::Result<Self, Self::Error> {
        if let Some(rest) = raw.strip_prefix("temp:") {
            let mut parts = rest.splitn(2, ':');
            let seq = parts
                .next()
                .and_then(|s| s.parse::<u64>().ok())
                .ok_or_else(|| format!("malformed temporary identity '{raw}'"))?;
            let nonce = parts
                .next()
                .filter(|n| !n.is_empty())
                .ok_or_else(|| format!("malformed temporary identity '{raw}'"))?;
            Ok(Self::Temp(TempId::with_nonce(seq, nonce)))
        } else {
            Ok(Self::Canonical(raw))
        }
    }
}

/// Backend-independent identity of "the same real-world record".
///
/// Two rows with the same natural key describe the same meter reading no
/// matter whether they are currently named by a temporary or a canonical
/// identity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NaturalKey {
    pub scope: Scope,
    pub unit: String,
    pub meter_number: String,
    pub kind: MeterKind,
}

/// Scalar field of a reading record that can be edited independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FieldName {
    ReadingStart,
    ReadingEnd,
    Note,
}

impl FieldName {
    pub const ALL: [Self; 3] = [Self::ReadingStart, Self::ReadingEnd, Self::Note];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReadingStart => "reading_start",
            Self::ReadingEnd => "reading_end",
            Self::Note => "note",
        }
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-field persistence indicator.
///
/// `Saved` and `Error` are transient; the status board clears them back to
/// `Idle` after the configured display window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SaveStatus {
    #[default]
    Idle,
    Saving,
    Saved,
    Error,
}
