//! Change reports produced by reconciliation

use serde::{Deserialize, Serialize};

/// Whether anything changed, plus an ordered human-readable change log.
///
/// In check mode the report describes what would change; the `changed`
/// flag and the log lines are the same as for a real run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeReport {
    pub changed: bool,
    pub log: Vec<String>,
}

impl ChangeReport {
    /// Create an empty, unchanged report
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a change and its description
    pub fn change(&mut self, message: impl Into<String>) {
        self.changed = true;
        self.log.push(message.into());
    }

    /// Merge another report into this one, keeping log order
    pub fn merge(&mut self, other: ChangeReport) {
        self.changed |= other.changed;
        self.log.extend(other.log);
    }

    /// Number of log lines
    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }
}
