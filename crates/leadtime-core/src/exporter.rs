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
//! The polling loop
//!
//! Each cycle walks `Idle -> Listing -> Resolving -> Publishing -> Idle`.
//! Resolution fans out over workloads with bounded concurrency; everything
//! that mutates exporter state (dedup set, backoff tracker) runs serially on
//! the cycle task once resolution has completed.

use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::adapter::{MetricSink, NamespaceFilter, WorkloadLister};
use crate::backoff::{BackoffPolicy, BackoffTracker};
use crate::dedup::{DedupOutcome, DedupSet};
use crate::error::ResolutionError;
use crate::policy::{AttemptContext, DeferReason, Deferral, ResolutionPolicy};
use crate::record::{MetricKind, Record, Workload};
use crate::resolver::Resolver;

/// Phase of the exporter loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopState {
    /// Waiting for the next tick
    Idle,
    /// Enumerating workloads
    Listing,
    /// Running the resolution policy
    Resolving,
    /// Deduplicating and publishing records
    Publishing,
}

impl LoopState {
    /// Get string label for logs
    pub fn as_label(&self) -> &'static str {
        match self {
            LoopState::Idle => "idle",
            LoopState::Listing => "listing",
            LoopState::Resolving => "resolving",
            LoopState::Publishing => "publishing",
        }
    }
}

/// Runtime settings of one exporter
#[derive(Debug, Clone)]
pub struct ExporterSettings {
    /// Kind of record produced
    pub kind: MetricKind,
    /// Time between cycle starts
    pub poll_interval: Duration,
    /// Workloads resolved concurrently
    pub max_concurrency: usize,
    /// Namespace allow-list
    pub namespaces: NamespaceFilter,
    /// Adapter backoff tuning
    pub backoff: BackoffPolicy,
}

impl Default for ExporterSettings {
    fn default() -> Self {
        Self {
            kind: MetricKind::Commit,
            poll_interval: Duration::from_secs(30),
            max_concurrency: 4,
            namespaces: NamespaceFilter::all(),
            backoff: BackoffPolicy::default(),
        }
    }
}

/// Outcome of one cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleReport {
    /// Cycle number, starting at 1
    pub cycle: u64,
    /// Kind of record the exporter produces
    pub kind: MetricKind,
    /// Workloads listed after namespace filtering
    pub listed: usize,
    /// Records handed to the sink
    pub published: usize,
    /// Records dropped as already published
    pub duplicates: usize,
    /// Records rejected for changing an already published timestamp
    pub conflicts: usize,
    /// Workloads skipped for data defects, by reason
    pub skipped: BTreeMap<String, usize>,
    /// Workloads postponed because an adapter was unreachable or limited
    pub deferred: usize,
    /// Adapters sitting out this cycle
    pub backing_off: Vec<String>,
    /// Whether listing failed
    pub listing_failed: bool,
    /// Wall time spent in the cycle
    pub elapsed_ms: u64,
}

impl CycleReport {
    fn new(cycle: u64, kind: MetricKind) -> Self {
        Self {
            cycle,
            kind,
            listed: 0,
            published: 0,
            duplicates: 0,
            conflicts: 0,
            skipped: BTreeMap::new(),
            deferred: 0,
            backing_off: Vec::new(),
            listing_failed: false,
            elapsed_ms: 0,
        }
    }

    /// Total workloads skipped for any reason
    pub fn skipped_total(&self) -> usize {
        self.skipped.values().sum()
    }

    /// Elapsed time as a duration
    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms)
    }
}

enum Resolution {
    Resolved(Record),
    Skipped(ResolutionError),
    Deferred(Deferral),
}

struct WorkloadOutcome {
    app: String,
    namespace: String,
    answered: Vec<String>,
    resolution: Resolution,
}

/// Collection engine for one metric kind
pub struct Exporter {
    settings: ExporterSettings,
    resolver: Resolver,
    policy: ResolutionPolicy,
    lister: Arc<dyn WorkloadLister>,
    sink: Arc<dyn MetricSink>,
    dedup: DedupSet,
    backoff: BackoffTracker,
    state: LoopState,
    cycle: u64,
}

impl Exporter {
    /// Create an exporter
    pub fn new(
        settings: ExporterSettings,
        resolver: Resolver,
        policy: ResolutionPolicy,
        lister: Arc<dyn WorkloadLister>,
        sink: Arc<dyn MetricSink>,
    ) -> Self {
        let backoff = BackoffTracker::new(settings.backoff);
        Self {
            settings,
            resolver,
            policy,
            lister,
            sink,
            dedup: DedupSet::new(),
            backoff,
            state: LoopState::Idle,
            cycle: 0,
        }
    }

    /// Current loop phase
    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Number of cycles started
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Settings in use
    pub fn settings(&self) -> &ExporterSettings {
        &self.settings
    }

    /// Records published so far
    pub fn dedup(&self) -> &DedupSet {
        &self.dedup
    }

    /// Adapter backoff state
    pub fn backoff(&self) -> &BackoffTracker {
        &self.backoff
    }

    /// Run one full cycle
    pub async fn run_cycle(&mut self) -> CycleReport {
        self.cycle += 1;
        let cycle = self.cycle;
        let kind = self.settings.kind;
        let started = Instant::now();
        let mut report = CycleReport::new(cycle, kind);

        self.state = LoopState::Listing;
        let workloads = match self.lister.list(&self.settings.namespaces).await {
            Ok(workloads) => workloads,
            Err(e) => {
                warn!(cycle, error = %e, "Workload listing failed, retrying next cycle");
                report.listing_failed = true;
                return self.finish(report, started);
            }
        };
        let workloads: Vec<Workload> = workloads
            .into_iter()
            .filter(|w| self.settings.namespaces.allows(&w.namespace))
            .collect();
        report.listed = workloads.len();

        self.state = LoopState::Resolving;
        let suspended = self.backoff.suspended(cycle);
        let mut backing_off: Vec<String> = suspended.iter().cloned().collect();
        backing_off.sort();
        report.backing_off = backing_off;

        let outcomes = self.resolve_all(&workloads, kind, &suspended).await;

        self.state = LoopState::Publishing;
        let mut answered: HashSet<String> = HashSet::new();
        let mut rate_limited: HashMap<String, Option<Duration>> = HashMap::new();

        for outcome in outcomes {
            answered.extend(outcome.answered);

            match outcome.resolution {
                Resolution::Resolved(record) => self.publish(record, &mut report),
                Resolution::Skipped(err) => {
                    warn!(
                        cycle,
                        app = %outcome.app,
                        namespace = %outcome.namespace,
                        kind = %kind,
                        reason = err.reason(),
                        error = %err,
                        "Skipping workload this cycle"
                    );
                    *report.skipped.entry(err.reason().to_string()).or_default() += 1;
                }
                Resolution::Deferred(deferral) => {
                    debug!(
                        cycle,
                        app = %outcome.app,
                        namespace = %outcome.namespace,
                        adapter = %deferral.adapter,
                        reason = deferral.reason_label(),
                        "Workload deferred to a later cycle"
                    );
                    report.deferred += 1;
                    match deferral.reason {
                        DeferReason::RateLimited(retry_after) => {
                            let hint = rate_limited.entry(deferral.adapter).or_insert(None);
                            *hint = (*hint).max(retry_after);
                        }
                        DeferReason::Unavailable(detail) => {
                            warn!(
                                cycle,
                                app = %outcome.app,
                                adapter = %deferral.adapter,
                                error = %detail,
                                "Adapter unavailable"
                            );
                        }
                        DeferReason::BackingOff => {}
                    }
                }
            }
        }

        for adapter in answered.iter().filter(|a| !rate_limited.contains_key(*a)) {
            if self.backoff.strikes(adapter) > 0 {
                info!(cycle, adapter = %adapter, "Adapter recovered, backoff cleared");
            }
            self.backoff.record_success(adapter);
        }
        for (adapter, retry_after) in rate_limited {
            let min_cycles = retry_after.map_or(0, |hint| self.cycles_for(hint));
            let skip = self.backoff.record_rate_limited(&adapter, cycle, min_cycles);
            warn!(
                cycle,
                adapter = %adapter,
                strikes = self.backoff.strikes(&adapter),
                skip_cycles = skip,
                "Adapter rate limited, backing off"
            );
        }

        self.finish(report, started)
    }

    async fn resolve_all(
        &self,
        workloads: &[Workload],
        kind: MetricKind,
        suspended: &HashSet<String>,
    ) -> Vec<WorkloadOutcome> {
        let ctx = AttemptContext {
            resolver: &self.resolver,
            kind,
            suspended,
        };
        let policy = &self.policy;
        let resolver = &self.resolver;

        let attempts: Vec<_> = workloads
            .iter()
            .map(|workload| {
                let ctx = ctx;
                async move {
                    let gathered = policy.gather(workload, &ctx).await;
                    let resolution = match gathered.deferral {
                        Some(deferral) => Resolution::Deferred(deferral),
                        None => match resolver.resolve(workload, kind, &gathered.facts) {
                            Ok(record) => Resolution::Resolved(record),
                            Err(err) => Resolution::Skipped(err),
                        },
                    };
                    WorkloadOutcome {
                        app: workload.app_name.clone(),
                        namespace: workload.namespace.clone(),
                        answered: gathered.answered,
                        resolution,
                    }
                }
            })
            .collect();

        stream::iter(attempts)
            .buffer_unordered(self.settings.max_concurrency.max(1))
            .collect()
            .await
    }

    fn publish(&mut self, record: Record, report: &mut CycleReport) {
        match self.dedup.check_and_mark(&record) {
            DedupOutcome::New => {
                debug!(
                    app = record.app_name(),
                    namespace = record.namespace(),
                    kind = %record.kind(),
                    identifier = record.identifier(),
                    timestamp = record.timestamp_secs(),
                    "Publishing record"
                );
                self.sink.publish(&record);
                report.published += 1;
            }
            DedupOutcome::Duplicate => report.duplicates += 1,
            DedupOutcome::Conflict { previous } => {
                warn!(
                    app = record.app_name(),
                    kind = %record.kind(),
                    identifier = record.identifier(),
                    published = %previous,
                    received = %record.timestamp(),
                    "Rejecting record whose timestamp changed after publication"
                );
                report.conflicts += 1;
            }
        }
    }

    fn cycles_for(&self, hint: Duration) -> u64 {
        let interval = self.settings.poll_interval.as_millis().max(1);
        let cycles = hint.as_millis().div_ceil(interval);
        u64::try_from(cycles).unwrap_or(u64::MAX)
    }

    fn finish(&mut self, mut report: CycleReport, started: Instant) -> CycleReport {
        report.elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.state = LoopState::Idle;
        self.sink.observe_cycle(&report);

        info!(
            cycle = report.cycle,
            kind = %report.kind,
            listed = report.listed,
            published = report.published,
            duplicates = report.duplicates,
            conflicts = report.conflicts,
            skipped = report.skipped_total(),
            deferred = report.deferred,
            backing_off = report.backing_off.len(),
            elapsed_ms = report.elapsed_ms,
            "Cycle complete"
        );
        report
    }

    /// Poll until `shutdown` resolves.
    ///
    /// Cycles never overlap: a tick that comes due while a cycle is running is
    /// delayed until the cycle finishes. Shutdown abandons any in-flight
    /// cycle; records are only published after resolution completes, so a
    /// cycle is never half-published.
    pub async fn run<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let mut ticker = tokio::time::interval(self.settings.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            kind = %self.settings.kind,
            poll_interval_secs = self.settings.poll_interval.as_secs(),
            max_concurrency = self.settings.max_concurrency,
            adapters = ?self.policy.adapter_names(),
            "Exporter loop starting"
        );

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = ticker.tick() => {}
            }

            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!(
                        cycle = self.cycle,
                        phase = self.state.as_label(),
                        "Abandoning in-flight cycle"
                    );
                    break;
                }
                _ = self.run_cycle() => {}
            }
        }

        self.state = LoopState::Idle;
        info!(cycles = self.cycle, published = self.dedup.len(), "Exporter loop stopped");
    }
}
