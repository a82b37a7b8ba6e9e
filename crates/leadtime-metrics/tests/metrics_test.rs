//! Integration tests for leadtime-metrics
//!
//! Drives a real exporter cycle into the registry and scrapes the result
//! over HTTP.

#![allow(clippy::unwrap_used)]

use leadtime_core::{Exporter, ExporterSettings, MetricSink, ResolutionPolicy, Resolver, Workload};
use leadtime_metrics::{MetricsRegistry, MetricsServer};
use leadtime_test_utils::fixtures::SAMPLE_EPOCH;
use leadtime_test_utils::{StaticLister, TestFixtures};
use std::sync::Arc;
use tokio::sync::oneshot;

fn exporter(workloads: Vec<Workload>, registry: &MetricsRegistry) -> Exporter {
    Exporter::new(
        ExporterSettings::default(),
        Resolver::default(),
        ResolutionPolicy::standard(Vec::new(), None),
        Arc::new(StaticLister::new(workloads)),
        Arc::new(registry.clone()) as Arc<dyn MetricSink>,
    )
}

#[tokio::test]
async fn test_cycle_populates_exposition() {
    let registry = MetricsRegistry::new().unwrap();
    let mut exporter = exporter(
        vec![
            TestFixtures::annotated_commit("checkout", "shop", "a1b2c3", SAMPLE_EPOCH),
            TestFixtures::annotated_commit("billing", "shop", "d4e5f6", "not-a-date"),
        ],
        &registry,
    );

    let report = exporter.run_cycle().await;
    assert_eq!(report.published, 1);

    let text = registry.encode().unwrap();
    assert!(text.contains("commit_timestamp{"));
    assert!(text.contains("commit=\"a1b2c3\""));
    assert!(text.contains("app=\"checkout\""));
    assert!(text.contains("} 1663770655"));
    assert!(!text.contains("d4e5f6"));
    assert!(text.contains("leadtime_records_published_total{kind=\"commit\"} 1"));
    assert!(text.contains("leadtime_workloads_skipped_total{reason=\"malformed_timestamp\"} 1"));
    assert!(text.contains("leadtime_cycles_total 1"));
}

#[tokio::test]
async fn test_republishing_is_idempotent() {
    let registry = MetricsRegistry::new().unwrap();
    let mut exporter = exporter(
        vec![TestFixtures::annotated_commit("checkout", "shop", "a1b2c3", SAMPLE_EPOCH)],
        &registry,
    );

    for _ in 0..3 {
        exporter.run_cycle().await;
    }

    let text = registry.encode().unwrap();
    assert_eq!(text.matches("commit=\"a1b2c3\"").count(), 1);
    assert!(text.contains("leadtime_records_published_total{kind=\"commit\"} 1"));
    assert!(text.contains("leadtime_cycles_total 3"));
}

#[tokio::test]
async fn test_scrape_over_http() {
    let registry = MetricsRegistry::new().unwrap();
    let mut exporter = exporter(
        vec![TestFixtures::annotated_commit("checkout", "shop", "a1b2c3", SAMPLE_EPOCH)],
        &registry,
    );
    exporter.run_cycle().await;

    let server = MetricsServer::new(registry.clone(), 0);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(server.serve_on(listener, async {
        let _ = stop_rx.await;
    }));

    let client = reqwest::Client::new();
    let metrics = client
        .get(format!("http://{}/metrics", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(metrics.status(), 200);
    let body = metrics.text().await.unwrap();
    assert!(body.contains("commit_timestamp"));

    let health = client
        .get(format!("http://{}/health", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(health.text().await.unwrap(), "OK");

    stop_tx.send(()).unwrap();
    assert!(handle.await.unwrap().is_ok());
}
