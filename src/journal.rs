//! Session journal: an append-only record of every state-changing call.
//!
//! Entries carry a per-journal sequence number so ordering survives
//! timestamp collisions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::parts::PartId;

/// What kind of call produced an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalEvent {
    PartAdded,
    EdgeAdded,
    Blend,
    Unblend,
    Transition,
    Trailhead,
    FocusShift,
    SixFs,
    Unburdening,
    Dialogue,
    DirectAccess,
}

/// A single journal record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub event_type: JournalEvent,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_id: Option<PartId>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Journal {
    entries: Vec<LogEntry>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry stamped with the current time.
    pub fn record(
        &mut self,
        event_type: JournalEvent,
        part_id: Option<PartId>,
        description: impl Into<String>,
    ) -> &LogEntry {
        let entry = LogEntry {
            sequence: self.entries.len() as u64 + 1,
            timestamp: Utc::now(),
            event_type,
            description: description.into(),
            part_id,
        };
        log::trace!("journal #{} {:?}: {}", entry.sequence, entry.event_type, entry.description);
        self.entries.push(entry);
        &self.entries[self.entries.len() - 1]
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn for_part(&self, part_id: PartId) -> impl Iterator<Item = &LogEntry> {
        self.entries
            .iter()
            .filter(move |e| e.part_id == Some(part_id))
    }

    pub fn of_type(&self, event_type: JournalEvent) -> impl Iterator<Item = &LogEntry> {
        self.entries
            .iter()
            .filter(move |e| e.event_type == event_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_and_filters() {
        let mut journal = Journal::new();
        let id = PartId::new();
        journal.record(JournalEvent::Blend, Some(id), "blended at 0.70");
        journal.record(JournalEvent::SixFs, None, "find");
        let last = journal.record(JournalEvent::Unblend, Some(id), "unblended");
        assert_eq!(last.sequence, 3);

        assert_eq!(journal.for_part(id).count(), 2);
        assert_eq!(journal.of_type(JournalEvent::SixFs).count(), 1);
        assert!(journal.entries()[0].timestamp <= journal.entries()[2].timestamp);
    }

    #[test]
    fn test_entry_serializes_snake_case() {
        let mut journal = Journal::new();
        journal.record(JournalEvent::DirectAccess, None, "hello");
        let value = serde_json::to_value(&journal.entries()[0]).unwrap();
        assert_eq!(value["event_type"], "direct_access");
        assert!(value.get("part_id").is_none());
    }
}
