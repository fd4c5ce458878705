use crate::core::{Result, SyncError};

/// Parses the raw text of a numeric reading field.
///
/// An empty or whitespace-only input is a deliberate clear and yields
/// `Ok(None)`; the caller must send it as an explicit null, never drop it.
/// The locale decimal separator is normalized to `.` before parsing. Any
/// other input that does not parse to a finite number is rejected so it can
/// never silently turn into "no value".
pub fn parse_reading_input(raw: &str, decimal_separator: char) -> Result<Option<f64>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let normalized = if decimal_separator == '.' {
        trimmed.to_string()
    } else {
        trimmed.replace(decimal_separator, ".")
    };

    match normalized.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(Some(value)),
        _ => Err(SyncError::InvalidNumber(raw.to_string())),
    }
}

/// Parses the raw text of the free-text note field.
///
/// Whitespace-only input clears the note.
pub fn parse_note_input(raw: &str) -> Option<String> {
    if raw.trim().is_empty() {
        None
    } else {
        Some(raw.to_string())
    }
}
