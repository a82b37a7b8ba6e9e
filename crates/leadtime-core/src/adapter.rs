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
//! Contracts between the engine and its collaborators
//!
//! The engine only talks to the outside world through three seams:
//!
//! - [`WorkloadLister`] enumerates what to observe
//! - [`SourceAdapter`] fetches raw evidence for one workload
//! - [`MetricSink`] receives finalized records
//!
//! # Examples
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use leadtime_core::{AdapterError, FactSource, RawFact, SourceAdapter, Workload};
//!
//! #[derive(Debug)]
//! struct Fixed;
//!
//! #[async_trait]
//! impl SourceAdapter for Fixed {
//!     fn name(&self) -> &str {
//!         "fixed"
//!     }
//!
//!     async fn fetch(&self, workload: &Workload) -> Result<RawFact, AdapterError> {
//!         Ok(RawFact::new(FactSource::Git)
//!             .with("commit_hash", workload.commit_hash.clone().unwrap_or_default())
//!             .with("timestamp", "1663770655"))
//!     }
//! }
//! ```

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::fmt::Debug;

use crate::error::{AdapterError, ListerError};
use crate::exporter::CycleReport;
use crate::record::{RawFact, Record, Workload};

/// A provider of raw facts for workloads
///
/// Implementations must be `Send + Sync` so one instance can serve many
/// concurrent resolutions.
#[async_trait]
pub trait SourceAdapter: Send + Sync + Debug {
    /// Stable name; keys the adapter's backoff state
    fn name(&self) -> &str;

    /// Whether this adapter serves the workload at all
    fn supports(&self, _workload: &Workload) -> bool {
        true
    }

    /// Fetch evidence for one workload
    async fn fetch(&self, workload: &Workload) -> Result<RawFact, AdapterError>;
}

/// Source of workloads to observe each cycle
#[async_trait]
pub trait WorkloadLister: Send + Sync + Debug {
    /// Enumerate workloads allowed by `filter`
    async fn list(&self, filter: &NamespaceFilter) -> Result<Vec<Workload>, ListerError>;
}

/// Receiver of finalized records
pub trait MetricSink: Send + Sync {
    /// Publish a record. Fire-and-forget.
    fn publish(&self, record: &Record);

    /// Observe the outcome of a completed cycle
    fn observe_cycle(&self, _report: &CycleReport) {}
}

/// Namespace allow-list; empty allows everything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceFilter {
    allowed: BTreeSet<String>,
}

impl NamespaceFilter {
    /// Allow every namespace
    pub fn all() -> Self {
        Self::default()
    }

    /// Allow only the listed namespaces; blank entries are dropped
    pub fn only<I, S>(namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed: namespaces
                .into_iter()
                .map(|ns| ns.as_ref().trim().to_string())
                .filter(|ns| !ns.is_empty())
                .collect(),
        }
    }

    /// Whether `namespace` passes the filter
    pub fn allows(&self, namespace: &str) -> bool {
        self.allowed.is_empty() || self.allowed.contains(namespace)
    }

    /// Whether every namespace passes
    pub fn is_unrestricted(&self) -> bool {
        self.allowed.is_empty()
    }

    /// Allowed namespaces, sorted
    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.allowed.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_filter_allows_all() {
        let filter = NamespaceFilter::all();
        assert!(filter.is_unrestricted());
        assert!(filter.allows("prod"));
        assert!(filter.allows(""));
    }

    #[test]
    fn test_filter_only() {
        let filter = NamespaceFilter::only([" prod ", "", "staging"]);
        assert!(filter.allows("prod"));
        assert!(filter.allows("staging"));
        assert!(!filter.allows("dev"));
        assert_eq!(filter.namespaces().collect::<Vec<_>>(), vec!["prod", "staging"]);
    }

    #[test]
    fn test_filter_of_blanks_is_unrestricted() {
        let filter = NamespaceFilter::only(["  ", ""]);
        assert!(filter.is_unrestricted());
    }
}
