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
//! Workloads, raw facts and the canonical record shape
//!
//! A [`Workload`] is what the lister discovers, a [`RawFact`] is what a source
//! hands back before normalization, and a [`Record`] is what gets published.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::dedup::DedupKey;

/// Canonical keys inside a [`RawFact`]
pub mod keys {
    /// Git commit SHA
    pub const COMMIT_HASH: &str = "commit_hash";
    /// Source repository URL
    pub const REPO_URL: &str = "repo_url";
    /// Raw timestamp, epoch seconds or a formatted date
    pub const TIMESTAMP: &str = "timestamp";
    /// Container image digest
    pub const IMAGE_DIGEST: &str = "image_digest";
    /// Build identifier
    pub const BUILD_ID: &str = "build_id";
    /// Issue or incident identifier
    pub const ISSUE_ID: &str = "issue_id";
}

/// Which delivery signal a record carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// Time a commit was made
    Commit,
    /// Time an image was deployed
    Deploy,
    /// Time a failure was raised
    Failure,
}

impl MetricKind {
    /// Get string label for Prometheus
    pub fn as_label(&self) -> &'static str {
        match self {
            MetricKind::Commit => "commit",
            MetricKind::Deploy => "deploy",
            MetricKind::Failure => "failure",
        }
    }

    /// Human name of the natural identifier for this kind
    pub fn identifier_name(&self) -> &'static str {
        match self {
            MetricKind::Commit => "commit hash",
            MetricKind::Deploy => "image digest or build id",
            MetricKind::Failure => "issue id",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

impl FromStr for MetricKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "commit" | "committime" => Ok(MetricKind::Commit),
            "deploy" | "deploytime" => Ok(MetricKind::Deploy),
            "failure" | "failuretime" => Ok(MetricKind::Failure),
            other => Err(format!(
                "unknown metric kind '{}', expected one of: commit, deploy, failure",
                other
            )),
        }
    }
}

/// One deployable unit under observation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workload {
    /// Stable identity key
    pub app_name: String,

    /// Namespace the workload runs in
    #[serde(default)]
    pub namespace: String,

    /// Build that produced the running image
    #[serde(default)]
    pub build_id: Option<String>,

    /// Digest of the running image
    #[serde(default)]
    pub image_digest: Option<String>,

    /// Commit recorded in build metadata
    #[serde(default)]
    pub commit_hash: Option<String>,

    /// Repository recorded in build metadata
    #[serde(default)]
    pub repo_url: Option<String>,

    /// Annotations set on the workload itself
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,

    /// Labels embedded in the container image
    #[serde(default)]
    pub image_labels: BTreeMap<String, String>,
}

impl Workload {
    /// Create a workload with only its identity set
    pub fn new(app_name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            namespace: namespace.into(),
            ..Default::default()
        }
    }

    /// Set the build identifier
    pub fn with_build_id(mut self, build_id: impl Into<String>) -> Self {
        self.build_id = Some(build_id.into());
        self
    }

    /// Set the image digest
    pub fn with_image_digest(mut self, digest: impl Into<String>) -> Self {
        self.image_digest = Some(digest.into());
        self
    }

    /// Set the commit hash from build metadata
    pub fn with_commit_hash(mut self, hash: impl Into<String>) -> Self {
        self.commit_hash = Some(hash.into());
        self
    }

    /// Set the repository URL from build metadata
    pub fn with_repo_url(mut self, url: impl Into<String>) -> Self {
        self.repo_url = Some(url.into());
        self
    }

    /// Add a workload annotation
    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    /// Add an image label
    pub fn with_image_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.image_labels.insert(key.into(), value.into());
        self
    }

    /// `namespace/app` string used in logs
    pub fn display_name(&self) -> String {
        if self.namespace.is_empty() {
            self.app_name.clone()
        } else {
            format!("{}/{}", self.namespace, self.app_name)
        }
    }
}

/// Where a raw fact came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FactSource {
    /// Annotation on the workload
    Annotation,
    /// Git hosting API
    Git,
    /// Container image metadata
    Image,
    /// Cluster deployment event
    ClusterEvent,
}

impl FactSource {
    /// Get string label for logs
    pub fn as_label(&self) -> &'static str {
        match self {
            FactSource::Annotation => "annotation",
            FactSource::Git => "git",
            FactSource::Image => "image",
            FactSource::ClusterEvent => "cluster-event",
        }
    }
}

/// Provider-specific evidence before normalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFact {
    source: FactSource,
    values: BTreeMap<String, String>,
}

impl RawFact {
    /// Create an empty fact from the given source
    pub fn new(source: FactSource) -> Self {
        Self {
            source,
            values: BTreeMap::new(),
        }
    }

    /// Add a value; blank values are ignored
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Add a value if present
    pub fn with_opt(mut self, key: &str, value: Option<&str>) -> Self {
        if let Some(value) = value {
            self.insert(key, value);
        }
        self
    }

    /// Insert a value; blank values are ignored
    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            self.values.insert(key.to_string(), trimmed.to_string());
        }
    }

    /// Look up a value
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Source tag of this fact
    pub fn source(&self) -> FactSource {
        self.source
    }

    /// All values
    pub fn values(&self) -> &BTreeMap<String, String> {
        &self.values
    }
}

/// A normalized, timestamped event ready for publication
///
/// Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    app_name: String,
    namespace: String,
    kind: MetricKind,
    identifier: String,
    timestamp: DateTime<Utc>,
    labels: BTreeMap<String, String>,
}

impl Record {
    /// Create a record
    pub fn new(
        app_name: impl Into<String>,
        namespace: impl Into<String>,
        kind: MetricKind,
        identifier: impl Into<String>,
        timestamp: DateTime<Utc>,
        labels: BTreeMap<String, String>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            namespace: namespace.into(),
            kind,
            identifier: identifier.into(),
            timestamp,
            labels,
        }
    }

    /// Application name
    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// Namespace of the originating workload
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Metric kind
    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    /// Natural identifier (commit hash, image digest, issue id)
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Event time
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Event time as Unix seconds
    pub fn timestamp_secs(&self) -> i64 {
        self.timestamp.timestamp()
    }

    /// Metric labels
    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }

    /// Label value, or empty string when unset
    pub fn label(&self, name: &str) -> &str {
        self.labels.get(name).map(String::as_str).unwrap_or("")
    }

    /// Key guaranteeing at-most-once publication
    pub fn dedup_key(&self) -> DedupKey {
        DedupKey::new(self.app_name.clone(), self.kind, self.identifier.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_metric_kind_labels() {
        assert_eq!(MetricKind::Commit.as_label(), "commit");
        assert_eq!(MetricKind::Deploy.as_label(), "deploy");
        assert_eq!(MetricKind::Failure.as_label(), "failure");
    }

    #[test]
    fn test_metric_kind_parsing() {
        assert_eq!("commit".parse::<MetricKind>().unwrap(), MetricKind::Commit);
        assert_eq!("DeployTime".parse::<MetricKind>().unwrap(), MetricKind::Deploy);
        assert_eq!(" failure ".parse::<MetricKind>().unwrap(), MetricKind::Failure);
        assert!("release".parse::<MetricKind>().is_err());
    }

    #[test]
    fn test_raw_fact_ignores_blank_values() {
        let fact = RawFact::new(FactSource::Git)
            .with(keys::COMMIT_HASH, "  abc123 ")
            .with(keys::REPO_URL, "   ")
            .with_opt(keys::IMAGE_DIGEST, None);

        assert_eq!(fact.get(keys::COMMIT_HASH), Some("abc123"));
        assert_eq!(fact.get(keys::REPO_URL), None);
        assert_eq!(fact.values().len(), 1);
        assert_eq!(fact.source().as_label(), "git");
    }

    #[test]
    fn test_workload_builder_and_display() {
        let workload = Workload::new("billing", "prod")
            .with_commit_hash("abc")
            .with_annotation("team", "payments");
        assert_eq!(workload.display_name(), "prod/billing");
        assert_eq!(workload.commit_hash.as_deref(), Some("abc"));
        assert_eq!(workload.annotations.get("team").map(String::as_str), Some("payments"));

        assert_eq!(Workload::new("billing", "").display_name(), "billing");
    }

    #[test]
    fn test_record_accessors() {
        let ts = Utc.with_ymd_and_hms(2022, 9, 21, 14, 30, 55).unwrap();
        let mut labels = BTreeMap::new();
        labels.insert("app".to_string(), "billing".to_string());
        let record = Record::new("billing", "prod", MetricKind::Commit, "abc", ts, labels);

        assert_eq!(record.timestamp_secs(), 1_663_770_655);
        assert_eq!(record.label("app"), "billing");
        assert_eq!(record.label("missing"), "");
        assert_eq!(record.dedup_key().identifier, "abc");
    }

    #[test]
    fn test_workload_deserializes_with_defaults() {
        let workload: Workload = serde_json::from_str(r#"{"app_name": "billing"}"#).unwrap();
        assert_eq!(workload.app_name, "billing");
        assert!(workload.namespace.is_empty());
        assert!(workload.annotations.is_empty());
    }
}
