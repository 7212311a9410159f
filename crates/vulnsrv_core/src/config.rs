//! Core configuration.

use std::time::Duration;

/// Configuration for the shared-state container.
#[derive(Debug, Clone)]
pub struct Config {
    /// Timeout applied to forwarded SQL statements. `None` means block
    /// until the result arrives, which is the reference behavior the
    /// training exercises assume.
    pub submit_timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            submit_timeout: None,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a timeout for forwarded SQL statements.
    ///
    /// Resets are not subject to this timeout: a reset that cannot
    /// finish leaves nothing worth serving, so it always blocks to
    /// completion.
    #[must_use]
    pub const fn submit_timeout(mut self, timeout: Duration) -> Self {
        self.submit_timeout = Some(timeout);
        self
    }
}
