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
//! Collection engine shared by every leadtime exporter
//!
//! The engine polls a [`WorkloadLister`] on a fixed cadence, resolves each
//! workload into a [`Record`] through an ordered [`ResolutionPolicy`]
//! (annotation, then source adapters, then an optional fallback), drops
//! anything already published via the [`DedupSet`], and hands the delta to a
//! [`MetricSink`].
//!
//! # Guarantees
//!
//! - At most one record per `(app, kind, identifier)` is published per process
//! - A defect in one workload never blocks the others
//! - A rate-limited adapter backs off alone; other adapters keep polling
//! - Cycles never overlap
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use leadtime_core::{
//!     Exporter, ExporterSettings, MetricSink, Record, ResolutionPolicy, Resolver,
//!     WorkloadLister,
//! };
//!
//! struct Stdout;
//!
//! impl MetricSink for Stdout {
//!     fn publish(&self, record: &Record) {
//!         println!("{} {} {}", record.app_name(), record.identifier(), record.timestamp_secs());
//!     }
//! }
//!
//! # async fn example(lister: Arc<dyn WorkloadLister>) {
//! let mut exporter = Exporter::new(
//!     ExporterSettings::default(),
//!     Resolver::default(),
//!     ResolutionPolicy::standard(Vec::new(), None),
//!     lister,
//!     Arc::new(Stdout),
//! );
//! let report = exporter.run_cycle().await;
//! println!("published {}", report.published);
//! # }
//! ```

pub mod adapter;
pub mod backoff;
pub mod dedup;
pub mod error;
pub mod exporter;
pub mod policy;
pub mod record;
pub mod resolver;
pub mod timestamp;

pub use adapter::{MetricSink, NamespaceFilter, SourceAdapter, WorkloadLister};
pub use backoff::{BackoffPolicy, BackoffTracker};
pub use dedup::{DedupKey, DedupOutcome, DedupSet};
pub use error::{AdapterError, ListerError, ResolutionError};
pub use exporter::{CycleReport, Exporter, ExporterSettings, LoopState};
pub use policy::{
    AttemptContext, DeferReason, Deferral, Gathered, ResolutionPolicy, ResolutionStep, StepOutcome,
};
pub use record::{keys, FactSource, MetricKind, RawFact, Record, Workload};
pub use resolver::{AnnotationKeys, Resolver};
pub use timestamp::{parse_timestamp, DEFAULT_DATE_FORMAT};
