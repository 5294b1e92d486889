//! Filtering the log for display

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::change::{ChangeKind, ChangeRecord};
use crate::history::{HistoryEntry, HistoryManager};

/// Filter over history entries; unset fields match everything
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    /// Case-insensitive substring of description, target or kind
    pub text: Option<String>,
    /// Only entries of this kind
    pub kind: Option<ChangeKind>,
    /// Earliest timestamp, inclusive
    pub since: Option<DateTime<Utc>>,
    /// Latest timestamp, inclusive
    pub until: Option<DateTime<Utc>>,
    /// Maximum number of results
    pub limit: Option<usize>,
}

impl HistoryQuery {
    /// A query matching every entry
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter by free text
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Filter by kind
    pub fn with_kind(mut self, kind: ChangeKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Filter by time range
    pub fn with_time_range(mut self, since: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self.until = Some(until);
        self
    }

    /// Set result limit
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Check if a record matches this query
    pub fn matches(&self, record: &ChangeRecord) -> bool {
        if let Some(kind) = self.kind {
            if record.kind() != kind {
                return false;
            }
        }

        if let Some(since) = self.since {
            if record.timestamp < since {
                return false;
            }
        }

        if let Some(until) = self.until {
            if record.timestamp > until {
                return false;
            }
        }

        match self.text.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => text_matches(record, &text.to_lowercase()),
            _ => true,
        }
    }
}

fn text_matches(record: &ChangeRecord, needle: &str) -> bool {
    let contains = |haystack: &str| haystack.to_lowercase().contains(needle);

    contains(&record.description)
        || contains(record.kind().as_str())
        || record
            .change
            .edits()
            .iter()
            .any(|edit| contains(edit.target().as_str()))
}

impl HistoryManager {
    /// Entries matching `query`, oldest first
    pub fn query(&self, query: &HistoryQuery) -> Vec<HistoryEntry> {
        let limit = query.limit.unwrap_or(usize::MAX);
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, record)| query.matches(record))
            .take(limit)
            .map(|(index, _)| self.entry_at(index))
            .collect()
    }

    /// Case-insensitive search over description, target and kind.
    ///
    /// A blank query returns every entry.
    pub fn search(&self, text: &str) -> Vec<HistoryEntry> {
        self.query(&HistoryQuery::new().with_text(text))
    }

    /// Entries recorded between `start` and `end`, both inclusive
    pub fn by_time_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<HistoryEntry> {
        self.query(&HistoryQuery::new().with_time_range(start, end))
    }

    /// Entries of one kind
    pub fn by_kind(&self, kind: ChangeKind) -> Vec<HistoryEntry> {
        self.query(&HistoryQuery::new().with_kind(kind))
    }
}
