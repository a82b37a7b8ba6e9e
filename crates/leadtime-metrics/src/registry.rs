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
//! Metrics registry for delivery timestamps and exporter health

use leadtime_core::{CycleReport, MetricKind, MetricSink, Record};
use prometheus::{
    Counter, CounterVec, Encoder, Gauge, GaugeVec, Histogram, HistogramOpts, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;
use tracing::warn;

const COMMIT_LABELS: [&str; 4] = ["namespace", "app", "commit", "image_sha"];
const DEPLOY_LABELS: [&str; 3] = ["namespace", "app", "image_sha"];
const FAILURE_LABELS: [&str; 2] = ["app", "issue_number"];

/// Central metrics registry for an exporter process
///
/// Thread-safe registry that can be cloned and shared across async tasks.
/// Each published [`Record`] becomes one gauge sample whose value is the
/// event time in Unix seconds.
#[derive(Clone)]
pub struct MetricsRegistry {
    inner: Arc<MetricsRegistryInner>,
}

struct MetricsRegistryInner {
    /// Prometheus registry
    registry: Registry,

    // Delivery timestamps
    commit_timestamp: GaugeVec,
    deploy_timestamp: GaugeVec,
    failure_creation_timestamp: GaugeVec,

    // Exporter self-metrics
    records_published: CounterVec,
    records_rejected: CounterVec,
    workloads_skipped: CounterVec,
    cycles_total: Counter,
    cycle_duration: Histogram,
    adapters_backing_off: Gauge,
}

impl MetricsRegistry {
    /// Create new metrics registry
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let commit_timestamp = GaugeVec::new(
            Opts::new("commit_timestamp", "Commit timestamp"),
            &COMMIT_LABELS,
        )?;
        registry.register(Box::new(commit_timestamp.clone()))?;

        let deploy_timestamp = GaugeVec::new(
            Opts::new("deploy_timestamp", "Deployment timestamp"),
            &DEPLOY_LABELS,
        )?;
        registry.register(Box::new(deploy_timestamp.clone()))?;

        let failure_creation_timestamp = GaugeVec::new(
            Opts::new("failure_creation_timestamp", "Failure creation timestamp"),
            &FAILURE_LABELS,
        )?;
        registry.register(Box::new(failure_creation_timestamp.clone()))?;

        let records_published = CounterVec::new(
            Opts::new(
                "leadtime_records_published_total",
                "Records published, by kind",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(records_published.clone()))?;

        let records_rejected = CounterVec::new(
            Opts::new(
                "leadtime_records_rejected_total",
                "Records rejected for conflicting with an already published timestamp",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(records_rejected.clone()))?;

        let workloads_skipped = CounterVec::new(
            Opts::new(
                "leadtime_workloads_skipped_total",
                "Workloads skipped because their source data was unusable",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(workloads_skipped.clone()))?;

        let cycles_total = Counter::with_opts(Opts::new(
            "leadtime_cycles_total",
            "Completed exporter cycles",
        ))?;
        registry.register(Box::new(cycles_total.clone()))?;

        let cycle_duration = Histogram::with_opts(
            HistogramOpts::new(
                "leadtime_cycle_duration_seconds",
                "Wall time of an exporter cycle in seconds",
            )
            .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]),
        )?;
        registry.register(Box::new(cycle_duration.clone()))?;

        let adapters_backing_off = Gauge::with_opts(Opts::new(
            "leadtime_adapters_backing_off",
            "Adapters currently suspended after rate limiting",
        ))?;
        registry.register(Box::new(adapters_backing_off.clone()))?;

        Ok(Self {
            inner: Arc::new(MetricsRegistryInner {
                registry,
                commit_timestamp,
                deploy_timestamp,
                failure_creation_timestamp,
                records_published,
                records_rejected,
                workloads_skipped,
                cycles_total,
                cycle_duration,
                adapters_backing_off,
            }),
        })
    }

    /// Get the underlying Prometheus registry
    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    /// Render every metric family in the text exposition format
    pub fn encode(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.inner.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    /// Current value of the timestamp gauge for `record`'s label set
    pub fn timestamp_of(&self, record: &Record) -> Option<f64> {
        let (gauge, names) = self.gauge_for(record.kind());
        let values: Vec<&str> = names.iter().map(|n| record.label(n)).collect();
        gauge
            .get_metric_with_label_values(values.as_slice())
            .ok()
            .map(|g| g.get())
    }

    fn gauge_for(&self, kind: MetricKind) -> (&GaugeVec, &'static [&'static str]) {
        match kind {
            MetricKind::Commit => (&self.inner.commit_timestamp, &COMMIT_LABELS),
            MetricKind::Deploy => (&self.inner.deploy_timestamp, &DEPLOY_LABELS),
            MetricKind::Failure => (&self.inner.failure_creation_timestamp, &FAILURE_LABELS),
        }
    }
}

impl MetricSink for MetricsRegistry {
    fn publish(&self, record: &Record) {
        let (gauge, names) = self.gauge_for(record.kind());
        let values: Vec<&str> = names.iter().map(|n| record.label(n)).collect();

        match gauge.get_metric_with_label_values(values.as_slice()) {
            Ok(sample) => {
                sample.set(record.timestamp_secs() as f64);
                self.inner
                    .records_published
                    .with_label_values(&[record.kind().as_label()])
                    .inc();
            }
            Err(e) => warn!(
                app = record.app_name(),
                namespace = record.namespace(),
                kind = %record.kind(),
                "Failed to set timestamp gauge: {}",
                e
            ),
        }
    }

    fn observe_cycle(&self, report: &CycleReport) {
        let inner = &self.inner;
        inner.cycles_total.inc();
        inner.cycle_duration.observe(report.elapsed().as_secs_f64());
        inner
            .adapters_backing_off
            .set(report.backing_off.len() as f64);

        if report.conflicts > 0 {
            inner
                .records_rejected
                .with_label_values(&[report.kind.as_label()])
                .inc_by(report.conflicts as f64);
        }
        for (reason, count) in &report.skipped {
            inner
                .workloads_skipped
                .with_label_values(&[reason.as_str()])
                .inc_by(*count as f64);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    fn commit_record(sha: &str, secs: i64) -> Record {
        let labels: BTreeMap<String, String> = [
            ("namespace", "shop"),
            ("app", "checkout"),
            ("commit", sha),
            ("image_sha", "sha256:abc"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        Record::new(
            "checkout",
            "shop",
            MetricKind::Commit,
            sha,
            Utc.timestamp_opt(secs, 0).unwrap(),
            labels,
        )
    }

    #[test]
    fn test_registry_creation() {
        assert!(MetricsRegistry::new().is_ok());
    }

    #[test]
    fn test_publish_sets_gauge_and_counter() {
        let registry = MetricsRegistry::new().unwrap();
        let record = commit_record("a1b2c3", 1_663_770_655);

        registry.publish(&record);

        assert_eq!(registry.timestamp_of(&record), Some(1_663_770_655.0));
        let published = registry
            .inner
            .records_published
            .with_label_values(&["commit"])
            .get();
        assert_eq!(published, 1.0);
    }

    #[test]
    fn test_observe_cycle() {
        let registry = MetricsRegistry::new().unwrap();
        let report = CycleReport {
            cycle: 1,
            kind: MetricKind::Commit,
            listed: 4,
            published: 1,
            duplicates: 0,
            conflicts: 2,
            skipped: BTreeMap::from([("malformed_timestamp".to_string(), 1)]),
            deferred: 0,
            backing_off: vec!["github".to_string()],
            listing_failed: false,
            elapsed_ms: 1500,
        };

        registry.observe_cycle(&report);

        assert_eq!(registry.inner.cycles_total.get(), 1.0);
        assert_eq!(registry.inner.adapters_backing_off.get(), 1.0);
        assert_eq!(
            registry
                .inner
                .records_rejected
                .with_label_values(&["commit"])
                .get(),
            2.0
        );
        assert_eq!(
            registry
                .inner
                .workloads_skipped
                .with_label_values(&["malformed_timestamp"])
                .get(),
            1.0
        );
        assert_eq!(registry.inner.cycle_duration.get_sample_count(), 1);
    }
}
