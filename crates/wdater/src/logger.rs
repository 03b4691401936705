//! Tagged logging.
//!
//! A [`Logger`] is a path of tags (`wdater > migrating > AutoMigration{0 -> 1}`)
//! attached to every message it emits through `tracing`.

use std::fmt;

/// Separator between nested tags.
const DELIMITER: &str = " > ";

/// Emits messages tagged with the stage of the update they belong to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Logger {
    tag: Option<String>,
    enabled: bool,
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

impl Logger {
    /// Creates a logger without a tag.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tag: None,
            enabled: true,
        }
    }

    /// Creates a logger that discards every message.
    #[must_use]
    pub fn none() -> Self {
        Self {
            tag: None,
            enabled: false,
        }
    }

    /// Returns a logger nested under `tag`.
    #[must_use]
    pub fn child(&self, tag: impl fmt::Display) -> Self {
        let tag = match &self.tag {
            Some(parent) => format!("{parent}{DELIMITER}{tag}"),
            None => tag.to_string(),
        };
        Self {
            tag: Some(tag),
            enabled: self.enabled,
        }
    }

    /// Returns the full tag path, if any.
    #[must_use]
    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// Logs a progress message.
    pub fn log(&self, message: impl fmt::Display) {
        if !self.enabled {
            return;
        }
        match &self.tag {
            Some(tag) => tracing::info!(tag = %tag, "{message}"),
            None => tracing::info!("{message}"),
        }
    }

    /// Logs a statement about to be executed.
    pub fn sql(&self, statement: &str) {
        if !self.enabled {
            return;
        }
        tracing::debug!(tag = self.tag.as_deref().unwrap_or_default(), sql = %statement, "Executing SQL");
    }
}
