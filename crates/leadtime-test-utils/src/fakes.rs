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

//! In-memory fakes for the engine's collaborator contracts.
//!
//! All fakes are cheap to clone and share their state, so a test can keep a
//! handle while the exporter owns another.

use async_trait::async_trait;
use leadtime_core::{
    AdapterError, CycleReport, ListerError, MetricSink, NamespaceFilter, RawFact, Record,
    SourceAdapter, Workload, WorkloadLister,
};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Lister returning a fixed, replaceable set of workloads
///
/// The namespace filter is ignored so tests can check that the exporter
/// applies it.
#[derive(Clone, Default)]
pub struct StaticLister {
    workloads: Arc<Mutex<Vec<Workload>>>,
    failing: Arc<AtomicBool>,
    calls: Arc<AtomicUsize>,
}

impl StaticLister {
    /// Create a lister with initial workloads
    pub fn new(workloads: Vec<Workload>) -> Self {
        Self {
            workloads: Arc::new(Mutex::new(workloads)),
            ..Default::default()
        }
    }

    /// Replace the workloads returned from now on
    pub fn set_workloads(&self, workloads: Vec<Workload>) {
        *lock(&self.workloads) = workloads;
    }

    /// Make subsequent listings fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of list calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for StaticLister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticLister")
            .field("workloads", &lock(&self.workloads).len())
            .finish()
    }
}

#[async_trait]
impl WorkloadLister for StaticLister {
    async fn list(&self, _filter: &NamespaceFilter) -> Result<Vec<Workload>, ListerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(ListerError::unavailable("static lister set to fail"));
        }
        Ok(lock(&self.workloads).clone())
    }
}

#[derive(Default)]
struct Script {
    responses: HashMap<String, Result<RawFact, AdapterError>>,
    fallback: Option<Result<RawFact, AdapterError>>,
    unsupported: HashSet<String>,
    delay: Option<Duration>,
    calls: Vec<(String, Instant)>,
}

/// Adapter answering from a per-app script
///
/// Apps without a scripted response get `NotFound` unless a default response
/// was set.
#[derive(Clone)]
pub struct ScriptedAdapter {
    name: String,
    script: Arc<Mutex<Script>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl ScriptedAdapter {
    /// Create an adapter with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            script: Arc::new(Mutex::new(Script::default())),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Script the response for one app
    pub fn respond(&self, app: &str, response: Result<RawFact, AdapterError>) -> &Self {
        lock(&self.script).responses.insert(app.to_string(), response);
        self
    }

    /// Script the response for apps without their own entry
    pub fn respond_default(&self, response: Result<RawFact, AdapterError>) -> &Self {
        lock(&self.script).fallback = Some(response);
        self
    }

    /// Report the app as not served by this adapter
    pub fn unsupported_for(&self, app: &str) -> &Self {
        lock(&self.script).unsupported.insert(app.to_string());
        self
    }

    /// Sleep this long inside every fetch
    pub fn with_delay(&self, delay: Duration) -> &Self {
        lock(&self.script).delay = Some(delay);
        self
    }

    /// Total fetch calls
    pub fn calls(&self) -> usize {
        lock(&self.script).calls.len()
    }

    /// Fetch calls for one app
    pub fn calls_for(&self, app: &str) -> usize {
        lock(&self.script)
            .calls
            .iter()
            .filter(|(called, _)| called == app)
            .count()
    }

    /// Instants at which fetches started
    pub fn call_starts(&self) -> Vec<Instant> {
        lock(&self.script).calls.iter().map(|(_, at)| *at).collect()
    }

    /// Highest number of concurrent fetches observed
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for ScriptedAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedAdapter")
            .field("name", &self.name)
            .finish()
    }
}

#[async_trait]
impl SourceAdapter for ScriptedAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports(&self, workload: &Workload) -> bool {
        !lock(&self.script).unsupported.contains(&workload.app_name)
    }

    async fn fetch(&self, workload: &Workload) -> Result<RawFact, AdapterError> {
        let (response, delay) = {
            let mut script = lock(&self.script);
            script
                .calls
                .push((workload.app_name.clone(), Instant::now()));
            let response = script
                .responses
                .get(&workload.app_name)
                .or(script.fallback.as_ref())
                .cloned()
                .unwrap_or_else(|| Err(AdapterError::not_found(workload.app_name.clone())));
            (response, script.delay)
        };

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        response
    }
}

/// Sink keeping every record and report it receives
#[derive(Clone, Default)]
pub struct RecordingSink {
    records: Arc<Mutex<Vec<Record>>>,
    reports: Arc<Mutex<Vec<CycleReport>>>,
}

impl RecordingSink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Records published so far
    pub fn records(&self) -> Vec<Record> {
        lock(&self.records).clone()
    }

    /// Records published for one app
    pub fn records_for(&self, app: &str) -> Vec<Record> {
        lock(&self.records)
            .iter()
            .filter(|r| r.app_name() == app)
            .cloned()
            .collect()
    }

    /// Cycle reports observed so far
    pub fn reports(&self) -> Vec<CycleReport> {
        lock(&self.reports).clone()
    }
}

impl MetricSink for RecordingSink {
    fn publish(&self, record: &Record) {
        lock(&self.records).push(record.clone());
    }

    fn observe_cycle(&self, report: &CycleReport) {
        lock(&self.reports).push(report.clone());
    }
}
