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
//! Pure decision logic turning candidate facts into a [`Record`]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ResolutionError;
use crate::record::{keys, FactSource, MetricKind, RawFact, Record, Workload};
use crate::timestamp::{parse_timestamp, DEFAULT_DATE_FORMAT};

/// Annotation names consulted before any adapter is called
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationKeys {
    /// Commit SHA
    pub commit_hash: String,
    /// Source repository URL
    pub repo_url: String,
    /// Commit date
    pub commit_date: String,
    /// Format of dates that are not epoch seconds
    pub date_format: String,
    /// Deployment time
    pub deploy_time: String,
    /// Deployed image digest
    pub image_digest: String,
    /// Issue identifier of a failure
    pub failure_id: String,
    /// Creation time of a failure
    pub failure_time: String,
}

impl Default for AnnotationKeys {
    fn default() -> Self {
        Self {
            commit_hash: "io.openshift.build.commit.id".to_string(),
            repo_url: "io.openshift.build.source-location".to_string(),
            commit_date: "io.openshift.build.commit.date".to_string(),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            deploy_time: "leadtime.dev/deploy-time".to_string(),
            image_digest: "leadtime.dev/image-digest".to_string(),
            failure_id: "leadtime.dev/failure-id".to_string(),
            failure_time: "leadtime.dev/failure-time".to_string(),
        }
    }
}

impl AnnotationKeys {
    /// Key holding the event time for `kind`
    pub fn time_key(&self, kind: MetricKind) -> &str {
        match kind {
            MetricKind::Commit => &self.commit_date,
            MetricKind::Deploy => &self.deploy_time,
            MetricKind::Failure => &self.failure_time,
        }
    }

    /// Build a fact of `source` from a string map using these key names.
    ///
    /// Returns `None` when the map has no time entry for `kind`.
    pub fn extract(
        &self,
        source: FactSource,
        map: &BTreeMap<String, String>,
        kind: MetricKind,
    ) -> Option<RawFact> {
        let lookup = |key: &str| map.get(key).map(String::as_str).filter(|v| !v.trim().is_empty());

        let timestamp = lookup(self.time_key(kind))?;
        let fact = RawFact::new(source).with(keys::TIMESTAMP, timestamp);

        let fact = match kind {
            MetricKind::Commit => fact
                .with_opt(keys::COMMIT_HASH, lookup(&self.commit_hash))
                .with_opt(keys::REPO_URL, lookup(&self.repo_url)),
            MetricKind::Deploy => fact.with_opt(keys::IMAGE_DIGEST, lookup(&self.image_digest)),
            MetricKind::Failure => fact.with_opt(keys::ISSUE_ID, lookup(&self.failure_id)),
        };
        Some(fact)
    }
}

/// Normalizes facts into records
#[derive(Debug, Clone, Default)]
pub struct Resolver {
    keys: AnnotationKeys,
}

impl Resolver {
    /// Create a resolver using the given annotation names
    pub fn new(keys: AnnotationKeys) -> Self {
        Self { keys }
    }

    /// Annotation names in use
    pub fn keys(&self) -> &AnnotationKeys {
        &self.keys
    }

    /// Fact carried by the workload's own annotations, if any
    pub fn annotation_fact(&self, workload: &Workload, kind: MetricKind) -> Option<RawFact> {
        self.keys
            .extract(FactSource::Annotation, &workload.annotations, kind)
    }

    /// Turn the first candidate fact into a record.
    ///
    /// Facts are never merged. Identity fields missing from the fact may come
    /// from the workload's build metadata.
    pub fn resolve(
        &self,
        workload: &Workload,
        kind: MetricKind,
        facts: &[RawFact],
    ) -> Result<Record, ResolutionError> {
        let fact = facts
            .first()
            .ok_or_else(|| ResolutionError::incomplete(&workload.app_name, "source data"))?;

        let identifier = identifier_for(workload, kind, fact).ok_or_else(|| {
            ResolutionError::incomplete(&workload.app_name, kind.identifier_name())
        })?;

        let raw = fact
            .get(keys::TIMESTAMP)
            .ok_or_else(|| ResolutionError::incomplete(&workload.app_name, "timestamp"))?;
        let timestamp = parse_timestamp(raw, &self.keys.date_format)?;

        let labels = labels_for(workload, kind, fact, &identifier);
        Ok(Record::new(
            workload.app_name.clone(),
            workload.namespace.clone(),
            kind,
            identifier,
            timestamp,
            labels,
        ))
    }
}

fn non_blank(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).map(str::trim).filter(|v| !v.is_empty())
}

fn identifier_for(workload: &Workload, kind: MetricKind, fact: &RawFact) -> Option<String> {
    let found = match kind {
        MetricKind::Commit => fact
            .get(keys::COMMIT_HASH)
            .or_else(|| non_blank(workload.commit_hash.as_ref())),
        MetricKind::Deploy => fact
            .get(keys::IMAGE_DIGEST)
            .or_else(|| non_blank(workload.image_digest.as_ref()))
            .or_else(|| fact.get(keys::BUILD_ID))
            .or_else(|| non_blank(workload.build_id.as_ref())),
        MetricKind::Failure => fact.get(keys::ISSUE_ID),
    };
    found.map(str::to_string)
}

fn labels_for(
    workload: &Workload,
    kind: MetricKind,
    fact: &RawFact,
    identifier: &str,
) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    match kind {
        MetricKind::Commit => {
            let image_sha = fact
                .get(keys::IMAGE_DIGEST)
                .or_else(|| non_blank(workload.image_digest.as_ref()))
                .unwrap_or_default();
            labels.insert("namespace".to_string(), workload.namespace.clone());
            labels.insert("app".to_string(), workload.app_name.clone());
            labels.insert("commit".to_string(), identifier.to_string());
            labels.insert("image_sha".to_string(), image_sha.to_string());
        }
        MetricKind::Deploy => {
            labels.insert("namespace".to_string(), workload.namespace.clone());
            labels.insert("app".to_string(), workload.app_name.clone());
            labels.insert("image_sha".to_string(), identifier.to_string());
        }
        MetricKind::Failure => {
            labels.insert("app".to_string(), workload.app_name.clone());
            labels.insert("issue_number".to_string(), identifier.to_string());
        }
    }
    labels
}
