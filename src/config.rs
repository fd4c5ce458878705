use std::time::Duration;

/// Synchronization engine configuration
///
/// Covers the debounce quiescence window, the per-field status display
/// windows, and the locale decimal separator for numeric input.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Quiescence window between the last edit to a field and its commit
    pub debounce_window: Duration,

    /// How long a successful save keeps showing `Saved` before clearing
    pub saved_clear_after: Duration,

    /// How long a failed save keeps showing `Error` before clearing
    pub error_clear_after: Duration,

    /// Locale decimal separator accepted in numeric input
    pub decimal_separator: char,
}

impl SyncConfig {
    pub fn new() -> Self {
        Self {
            debounce_window: Duration::from_millis(550),
            saved_clear_after: Duration::from_secs(2),
            error_clear_after: Duration::from_secs(5),
            decimal_separator: ',',
        }
    }

    /// Set the debounce quiescence window
    pub fn debounce_window(mut self, window: Duration) -> Self {
        self.debounce_window = window;
        self
    }

    /// Set the `Saved` indicator display window
    pub fn saved_clear_after(mut self, window: Duration) -> Self {
        self.saved_clear_after = window;
        self
    }

    /// Set the `Error` indicator display window
    pub fn error_clear_after(mut self, window: Duration) -> Self {
        self.error_clear_after = window;
        self
    }

    /// Set the locale decimal separator
    pub fn decimal_separator(mut self, separator: char) -> Self {
        self.decimal_separator = separator;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.debounce_window.is_zero() {
            return Err("debounce_window must be > 0".to_string());
        }

        if self.saved_clear_after.is_zero() || self.error_clear_after.is_zero() {
            return Err("status display windows must be > 0".to_string());
        }

        if self.decimal_separator.is_ascii_digit() {
            return Err("decimal_separator cannot be a digit".to_string());
        }

        Ok(())
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}
