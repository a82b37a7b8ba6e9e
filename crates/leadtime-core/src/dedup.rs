// Copyright (C) 2026  Leadtime Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.
//! At-most-once bookkeeping for published records

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::record::{MetricKind, Record};

/// Identity of a published event
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    /// Application name
    pub app_name: String,
    /// Metric kind
    pub kind: MetricKind,
    /// Commit hash, image digest or issue id
    pub identifier: String,
}

impl DedupKey {
    /// Create a key
    pub fn new(
        app_name: impl Into<String>,
        kind: MetricKind,
        identifier: impl Into<String>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            kind,
            identifier: identifier.into(),
        }
    }
}

/// Result of checking a record against the set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupOutcome {
    /// First sighting; the key is now marked and the record should be published
    New,
    /// Already published with the same timestamp
    Duplicate,
    /// Already published with a different timestamp
    Conflict {
        /// Timestamp that was published first
        previous: DateTime<Utc>,
    },
}

/// Keys published during this process lifetime
///
/// Grows monotonically. Nothing is ever evicted.
#[derive(Debug, Default)]
pub struct DedupSet {
    seen: HashMap<DedupKey, DateTime<Utc>>,
}

impl DedupSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Check a record and mark its key when unseen, in one step
    pub fn check_and_mark(&mut self, record: &Record) -> DedupOutcome {
        use std::collections::hash_map::Entry;

        match self.seen.entry(record.dedup_key()) {
            Entry::Vacant(slot) => {
                slot.insert(record.timestamp());
                DedupOutcome::New
            }
            Entry::Occupied(slot) if *slot.get() == record.timestamp() => DedupOutcome::Duplicate,
            Entry::Occupied(slot) => DedupOutcome::Conflict {
                previous: *slot.get(),
            },
        }
    }

    /// Whether a key has been published
    pub fn contains(&self, key: &DedupKey) -> bool {
        self.seen.contains_key(key)
    }

    /// Number of published keys
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Whether nothing has been published yet
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::BTreeMap;

    fn record(identifier: &str, secs: i64) -> Record {
        Record::new(
            "billing",
            "prod",
            MetricKind::Commit,
            identifier,
            Utc.timestamp_opt(secs, 0).unwrap(),
            BTreeMap::new(),
        )
    }

    #[test]
    fn test_first_sighting_is_new() {
        let mut set = DedupSet::new();
        assert!(set.is_empty());
        assert_eq!(set.check_and_mark(&record("abc", 100)), DedupOutcome::New);
        assert_eq!(set.len(), 1);
        assert!(set.contains(&DedupKey::new("billing", MetricKind::Commit, "abc")));
    }

    #[test]
    fn test_same_timestamp_is_duplicate() {
        let mut set = DedupSet::new();
        set.check_and_mark(&record("abc", 100));
        assert_eq!(set.check_and_mark(&record("abc", 100)), DedupOutcome::Duplicate);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_different_timestamp_is_conflict_and_keeps_first() {
        let mut set = DedupSet::new();
        set.check_and_mark(&record("abc", 100));

        let outcome = set.check_and_mark(&record("abc", 200));
        assert_eq!(
            outcome,
            DedupOutcome::Conflict {
                previous: Utc.timestamp_opt(100, 0).unwrap()
            }
        );
        // the original sample stays authoritative
        assert_eq!(set.check_and_mark(&record("abc", 100)), DedupOutcome::Duplicate);
    }

    #[test]
    fn test_keys_differ_by_kind_and_app() {
        let mut set = DedupSet::new();
        set.check_and_mark(&record("abc", 100));

        let deploy = Record::new(
            "billing",
            "prod",
            MetricKind::Deploy,
            "abc",
            Utc.timestamp_opt(100, 0).unwrap(),
            BTreeMap::new(),
        );
        let other_app = Record::new(
            "ledger",
            "prod",
            MetricKind::Commit,
            "abc",
            Utc.timestamp_opt(100, 0).unwrap(),
            BTreeMap::new(),
        );
        assert_eq!(set.check_and_mark(&deploy), DedupOutcome::New);
        assert_eq!(set.check_and_mark(&other_app), DedupOutcome::New);
        assert_eq!(set.len(), 3);
    }
}
