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

//! Custom test assertions over published records.

use leadtime_core::{MetricKind, Record};
use std::collections::HashSet;

/// Assert that exactly one record was published for `app` with `identifier`
/// at `epoch` seconds.
pub fn assert_published_once(records: &[Record], app: &str, identifier: &str, epoch: i64) {
    let matching: Vec<&Record> = records
        .iter()
        .filter(|r| r.app_name() == app && r.identifier() == identifier)
        .collect();
    assert_eq!(
        matching.len(),
        1,
        "expected one record for {}/{}, found {:?}",
        app,
        identifier,
        matching
    );
    assert_eq!(
        matching[0].timestamp_secs(),
        epoch,
        "record for {}/{} has the wrong timestamp",
        app,
        identifier
    );
}

/// Assert that nothing was published for `app`
pub fn assert_nothing_published(records: &[Record], app: &str) {
    let found: Vec<&Record> = records.iter().filter(|r| r.app_name() == app).collect();
    assert!(found.is_empty(), "expected no records for {}, found {:?}", app, found);
}

/// Assert that no dedup key appears twice
pub fn assert_no_duplicate_keys(records: &[Record]) {
    let mut seen = HashSet::new();
    for record in records {
        assert!(
            seen.insert(record.dedup_key()),
            "record published twice: {:?}",
            record
        );
    }
}

/// Assert that every record has the given kind
pub fn assert_all_kind(records: &[Record], kind: MetricKind) {
    for record in records {
        assert_eq!(record.kind(), kind, "unexpected kind for {:?}", record);
    }
}
