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

//! Single-cycle behaviour of the exporter against in-memory collaborators

use leadtime_core::{
    AdapterError, Exporter, ExporterSettings, LoopState, MetricKind, NamespaceFilter,
    ResolutionPolicy, Resolver, SourceAdapter, Workload,
};
use leadtime_test_utils::fixtures::SAMPLE_EPOCH;
use leadtime_test_utils::{
    assert_no_duplicate_keys, assert_nothing_published, assert_published_once, RecordingSink,
    ScriptedAdapter, StaticLister, TestFixtures,
};
use std::sync::Arc;
use std::time::Duration;

const REPO: &str = "https://github.com/example/billing";

fn exporter(
    lister: &StaticLister,
    adapters: &[&ScriptedAdapter],
    fallback: Option<&ScriptedAdapter>,
    sink: &RecordingSink,
) -> Exporter {
    exporter_with(ExporterSettings::default(), lister, adapters, fallback, sink)
}

fn exporter_with(
    settings: ExporterSettings,
    lister: &StaticLister,
    adapters: &[&ScriptedAdapter],
    fallback: Option<&ScriptedAdapter>,
    sink: &RecordingSink,
) -> Exporter {
    let adapters: Vec<Arc<dyn SourceAdapter>> = adapters
        .iter()
        .map(|a| Arc::new((*a).clone()) as Arc<dyn SourceAdapter>)
        .collect();
    let fallback = fallback.map(|f| Arc::new(f.clone()) as Arc<dyn SourceAdapter>);
    Exporter::new(
        settings,
        Resolver::default(),
        ResolutionPolicy::standard(adapters, fallback),
        Arc::new(lister.clone()),
        Arc::new(sink.clone()),
    )
}

#[tokio::test]
async fn test_same_event_published_once_across_cycles() {
    let workload = TestFixtures::built_from("billing", "prod", "abc123", REPO);
    let lister = StaticLister::new(vec![workload]);
    let github = ScriptedAdapter::new("github");
    github.respond("billing", Ok(TestFixtures::git_fact("abc123", SAMPLE_EPOCH)));
    let sink = RecordingSink::new();
    let mut exporter = exporter(&lister, &[&github], None, &sink);

    let first = exporter.run_cycle().await;
    assert_eq!(first.published, 1);

    for _ in 0..4 {
        let report = exporter.run_cycle().await;
        assert_eq!(report.published, 0);
        assert_eq!(report.duplicates, 1);
    }

    let records = sink.records();
    assert_published_once(&records, "billing", "abc123", 1_663_770_655);
    assert_no_duplicate_keys(&records);
    assert_eq!(github.calls(), 5);
    assert_eq!(exporter.cycle(), 5);
    assert_eq!(exporter.state(), LoopState::Idle);
}

#[tokio::test]
async fn test_malformed_workload_does_not_block_others() {
    let lister = StaticLister::new(vec![
        TestFixtures::annotated_commit("broken", "prod", "bad1", "last tuesday"),
        TestFixtures::annotated_commit("billing", "prod", "abc123", SAMPLE_EPOCH),
        Workload::new("no-data", "prod"),
    ]);
    let sink = RecordingSink::new();
    let mut exporter = exporter(&lister, &[], None, &sink);

    let report = exporter.run_cycle().await;

    assert_eq!(report.listed, 3);
    assert_eq!(report.published, 1);
    assert_eq!(report.skipped.get("malformed_timestamp"), Some(&1));
    assert_eq!(report.skipped.get("incomplete"), Some(&1));
    assert_eq!(report.skipped_total(), 2);

    let records = sink.records();
    assert_published_once(&records, "billing", "abc123", 1_663_770_655);
    assert_nothing_published(&records, "broken");
}

#[tokio::test]
async fn test_annotation_wins_without_calling_adapter() {
    let lister = StaticLister::new(vec![TestFixtures::annotated_commit(
        "billing",
        "prod",
        "abc123",
        SAMPLE_EPOCH,
    )]);
    let github = ScriptedAdapter::new("github");
    github.respond_default(Ok(TestFixtures::git_fact("other", "1700000000")));
    let sink = RecordingSink::new();
    let mut exporter = exporter(&lister, &[&github], None, &sink);

    exporter.run_cycle().await;

    assert_eq!(github.calls(), 0);
    assert_published_once(&sink.records(), "billing", "abc123", 1_663_770_655);
}

#[tokio::test]
async fn test_fallback_used_only_after_not_found() {
    let lister = StaticLister::new(vec![
        TestFixtures::built_from("billing", "prod", "abc123", REPO),
        TestFixtures::built_from("ledger", "prod", "def456", REPO),
    ]);
    let github = ScriptedAdapter::new("github");
    github.respond("billing", Err(AdapterError::not_found("no such commit")));
    github.respond("ledger", Err(AdapterError::unavailable("connection reset")));
    let image = ScriptedAdapter::new("image");
    image.respond_default(Ok(TestFixtures::image_fact("abc123", SAMPLE_EPOCH)));
    let sink = RecordingSink::new();
    let mut exporter = exporter(&lister, &[&github], Some(&image), &sink);

    let report = exporter.run_cycle().await;

    assert_eq!(report.published, 1);
    assert_eq!(report.deferred, 1);
    assert_eq!(image.calls_for("billing"), 1);
    assert_eq!(image.calls_for("ledger"), 0);
    assert_published_once(&sink.records(), "billing", "abc123", 1_663_770_655);
    assert_nothing_published(&sink.records(), "ledger");
}

#[tokio::test]
async fn test_unsupported_host_behaves_as_not_found() {
    let workload = TestFixtures::built_from("billing", "prod", "abc123", REPO);
    let lister = StaticLister::new(vec![workload]);
    let azure = ScriptedAdapter::new("azure-devops");
    azure.respond("billing", Err(AdapterError::unsupported("github.com")));
    let image = ScriptedAdapter::new("image");
    image.respond_default(Ok(TestFixtures::image_fact("abc123", SAMPLE_EPOCH)));
    let sink = RecordingSink::new();
    let mut exporter = exporter(&lister, &[&azure], Some(&image), &sink);

    let report = exporter.run_cycle().await;

    assert_eq!(report.published, 1);
    assert_eq!(report.deferred, 0);
}

#[tokio::test]
async fn test_incomplete_workload_never_published() {
    let workload = TestFixtures::built_from("billing", "prod", "abc123", REPO);
    let lister = StaticLister::new(vec![workload]);
    let github = ScriptedAdapter::new("github");
    let sink = RecordingSink::new();
    let mut exporter = exporter(&lister, &[&github], None, &sink);

    for _ in 0..3 {
        let report = exporter.run_cycle().await;
        assert_eq!(report.published, 0);
        assert_eq!(report.skipped.get("incomplete"), Some(&1));
    }

    assert!(sink.records().is_empty());
    assert!(exporter.dedup().is_empty());
}

#[tokio::test]
async fn test_rate_limited_adapter_backs_off_alone() {
    let lister = StaticLister::new(vec![
        TestFixtures::built_from("billing", "prod", "abc123", REPO),
        TestFixtures::built_from("ledger", "prod", "def456", "https://gitlab.com/example/ledger"),
    ]);
    let github = ScriptedAdapter::new("github");
    github
        .unsupported_for("ledger")
        .respond("billing", Err(AdapterError::rate_limited(None)));
    let gitlab = ScriptedAdapter::new("gitlab");
    gitlab
        .unsupported_for("billing")
        .respond("ledger", Ok(TestFixtures::git_fact("def456", SAMPLE_EPOCH)));
    let sink = RecordingSink::new();
    let mut exporter = exporter(&lister, &[&github, &gitlab], None, &sink);

    let first = exporter.run_cycle().await;
    assert_eq!(first.published, 1);
    assert_eq!(first.deferred, 1);
    assert_published_once(&sink.records(), "ledger", "def456", 1_663_770_655);
    assert_eq!(exporter.backoff().strikes("github"), 1);

    // github sits out the next cycle; gitlab keeps polling
    let second = exporter.run_cycle().await;
    assert_eq!(second.backing_off, vec!["github".to_string()]);
    assert_eq!(second.deferred, 1);
    assert_eq!(github.calls(), 1);
    assert_eq!(gitlab.calls(), 2);

    // back in rotation, recovers
    github.respond("billing", Ok(TestFixtures::git_fact("abc123", SAMPLE_EPOCH)));
    let third = exporter.run_cycle().await;
    assert!(third.backing_off.is_empty());
    assert_eq!(third.published, 1);
    assert_eq!(github.calls(), 2);
    assert_eq!(exporter.backoff().strikes("github"), 0);
}

#[tokio::test]
async fn test_repeated_rate_limits_grow_backoff() {
    let workload = TestFixtures::built_from("billing", "prod", "abc123", REPO);
    let lister = StaticLister::new(vec![workload]);
    let github = ScriptedAdapter::new("github");
    github.respond("billing", Err(AdapterError::rate_limited(None)));
    let sink = RecordingSink::new();
    let mut exporter = exporter(&lister, &[&github], None, &sink);

    // called on cycle 1, skipped 1 cycle; called on 3, skipped 2; called on 6
    for _ in 0..6 {
        exporter.run_cycle().await;
    }
    assert_eq!(github.calls(), 3);
    assert_eq!(exporter.backoff().strikes("github"), 3);
}

#[tokio::test]
async fn test_retry_after_hint_counts_in_cycles() {
    let workload = TestFixtures::built_from("billing", "prod", "abc123", REPO);
    let lister = StaticLister::new(vec![workload]);
    let github = ScriptedAdapter::new("github");
    github.respond(
        "billing",
        Err(AdapterError::rate_limited(Some(Duration::from_secs(90)))),
    );
    let sink = RecordingSink::new();
    let mut exporter = exporter(&lister, &[&github], None, &sink);

    // 90s at a 30s interval is three cycles
    for _ in 0..4 {
        exporter.run_cycle().await;
    }
    assert_eq!(github.calls(), 1);
    exporter.run_cycle().await;
    assert_eq!(github.calls(), 2);
}

#[tokio::test]
async fn test_changed_timestamp_rejected_as_conflict() {
    let workload = TestFixtures::built_from("billing", "prod", "abc123", REPO);
    let lister = StaticLister::new(vec![workload]);
    let github = ScriptedAdapter::new("github");
    github.respond("billing", Ok(TestFixtures::git_fact("abc123", SAMPLE_EPOCH)));
    let sink = RecordingSink::new();
    let mut exporter = exporter(&lister, &[&github], None, &sink);

    exporter.run_cycle().await;
    github.respond("billing", Ok(TestFixtures::git_fact("abc123", "1700000000")));
    let report = exporter.run_cycle().await;

    assert_eq!(report.conflicts, 1);
    assert_eq!(report.published, 0);
    assert_published_once(&sink.records(), "billing", "abc123", 1_663_770_655);
}

#[tokio::test]
async fn test_listing_failure_is_retried_next_cycle() {
    let lister = StaticLister::new(vec![TestFixtures::annotated_commit(
        "billing",
        "prod",
        "abc123",
        SAMPLE_EPOCH,
    )]);
    lister.set_failing(true);
    let sink = RecordingSink::new();
    let mut exporter = exporter(&lister, &[], None, &sink);

    let failed = exporter.run_cycle().await;
    assert!(failed.listing_failed);
    assert_eq!(failed.listed, 0);
    assert_eq!(exporter.state(), LoopState::Idle);

    lister.set_failing(false);
    let recovered = exporter.run_cycle().await;
    assert!(!recovered.listing_failed);
    assert_eq!(recovered.published, 1);
    assert_eq!(lister.calls(), 2);
    assert_eq!(sink.reports().len(), 2);
}

#[tokio::test]
async fn test_namespace_allow_list_applied() {
    let lister = StaticLister::new(vec![
        TestFixtures::annotated_commit("billing", "prod", "abc123", SAMPLE_EPOCH),
        TestFixtures::annotated_commit("scratch", "dev", "fff000", SAMPLE_EPOCH),
    ]);
    let sink = RecordingSink::new();
    let settings = ExporterSettings {
        namespaces: NamespaceFilter::only(["prod"]),
        ..Default::default()
    };
    let mut exporter = exporter_with(settings, &lister, &[], None, &sink);

    let report = exporter.run_cycle().await;

    assert_eq!(report.listed, 1);
    assert_nothing_published(&sink.records(), "scratch");
}

#[tokio::test]
async fn test_deploy_kind_keys_on_image_digest() {
    let lister = StaticLister::new(vec![Workload::new("billing", "prod")
        .with_build_id("billing-7")
        .with_annotation("leadtime.dev/image-digest", "sha256:feed")
        .with_annotation("leadtime.dev/deploy-time", SAMPLE_EPOCH)]);
    let sink = RecordingSink::new();
    let settings = ExporterSettings {
        kind: MetricKind::Deploy,
        ..Default::default()
    };
    let mut exporter = exporter_with(settings, &lister, &[], None, &sink);

    exporter.run_cycle().await;

    let records = sink.records();
    assert_published_once(&records, "billing", "sha256:feed", 1_663_770_655);
    assert_eq!(records[0].kind(), MetricKind::Deploy);
}

#[tokio::test(start_paused = true)]
async fn test_resolution_concurrency_is_bounded() {
    let workloads = (0..10)
        .map(|i| {
            TestFixtures::built_from(&format!("app-{}", i), "prod", &format!("{:040}", i), REPO)
        })
        .collect();
    let lister = StaticLister::new(workloads);
    let github = ScriptedAdapter::new("github");
    github
        .with_delay(Duration::from_secs(1))
        .respond_default(Err(AdapterError::not_found("none")));
    let sink = RecordingSink::new();
    let settings = ExporterSettings {
        max_concurrency: 3,
        ..Default::default()
    };
    let mut exporter = exporter_with(settings, &lister, &[&github], None, &sink);

    exporter.run_cycle().await;

    assert_eq!(github.calls(), 10);
    assert_eq!(github.max_in_flight(), 3);
}
