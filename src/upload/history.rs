//! Append-only record of every distinct status message received.

use std::sync::Mutex;
use std::time::SystemTime;

use uuid::Uuid;

/// Most-recent entries exposed for display; older entries stay in the log.
pub const DISPLAY_LIMIT: usize = 10;

#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub text: String,
    pub received_at: SystemTime,
}

/// Display window: newest first, at most [`DISPLAY_LIMIT`] entries, plus
/// the count of older entries left out (for "+N earlier" rendering).
#[derive(Debug, Clone, Default)]
pub struct HistoryView {
    pub entries: Vec<HistoryEntry>,
    pub earlier: usize,
}

/// Ordered status history. Entries are appended by the inbound dispatch
/// path and never mutated or removed.
#[derive(Debug, Default)]
pub struct StatusHistory {
    entries: Mutex<Vec<HistoryEntry>>,
}

impl StatusHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `text` unless it is empty or repeats the immediately
    /// preceding entry (repeated broadcasts collapse to one entry).
    pub fn record(&self, text: &str) {
        if text.is_empty() {
            return;
        }
        let mut entries = lock(&self.entries);
        if entries.last().map(|e| e.text.as_str()) == Some(text) {
            return;
        }
        entries.push(HistoryEntry {
            id: Uuid::new_v4(),
            text: text.to_string(),
            received_at: SystemTime::now(),
        });
    }

    /// Total recorded entries, including those outside the display window.
    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Newest-first window of the most recent entries.
    pub fn view(&self) -> HistoryView {
        let entries = lock(&self.entries);
        let shown: Vec<HistoryEntry> = entries.iter().rev().take(DISPLAY_LIMIT).cloned().collect();
        let earlier = entries.len().saturating_sub(shown.len());
        HistoryView {
            entries: shown,
            earlier,
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::error!("history lock poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_distinct_messages_in_order() {
        let history = StatusHistory::new();
        history.record("received metadata");
        history.record("saving file");

        let view = history.view();
        assert_eq!(view.entries.len(), 2);
        assert_eq!(view.entries[0].text, "saving file");
        assert_eq!(view.entries[1].text, "received metadata");
        assert_eq!(view.earlier, 0);
    }

    #[test]
    fn collapses_consecutive_duplicates() {
        let history = StatusHistory::new();
        history.record("processing");
        history.record("processing");

        assert_eq!(history.len(), 1);
    }

    #[test]
    fn non_consecutive_repeats_are_kept() {
        let history = StatusHistory::new();
        history.record("processing");
        history.record("still working");
        history.record("processing");

        assert_eq!(history.len(), 3);
    }

    #[test]
    fn ignores_empty_text() {
        let history = StatusHistory::new();
        history.record("");

        assert!(history.is_empty());
    }

    #[test]
    fn window_caps_at_ten_and_counts_the_rest() {
        let history = StatusHistory::new();
        for i in 0..13 {
            history.record(&format!("update {}", i));
        }

        let view = history.view();
        assert_eq!(view.entries.len(), DISPLAY_LIMIT);
        assert_eq!(view.earlier, 3);
        // Newest first
        assert_eq!(view.entries[0].text, "update 12");
        assert_eq!(view.entries[9].text, "update 3");
        // The full log is retained internally
        assert_eq!(history.len(), 13);
    }

    #[test]
    fn entries_get_unique_identifiers() {
        let history = StatusHistory::new();
        history.record("one");
        history.record("two");

        let view = history.view();
        assert_ne!(view.entries[0].id, view.entries[1].id);
    }
}
