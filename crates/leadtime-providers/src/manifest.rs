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
//! Workload manifest lister
//!
//! The manifest is re-read every cycle, so edits take effect without a
//! restart. It is either a bare list of entries or a map with a
//! `workloads` list:
//!
//! ```yaml
//! workloads:
//!   - namespace: shop
//!     labels:
//!       app.kubernetes.io/name: checkout
//!     commit_hash: a1b2c3
//!     repo_url: https://github.com/acme/checkout
//!     annotations:
//!       io.openshift.build.commit.date: "1663770655"
//! ```

use async_trait::async_trait;
use leadtime_core::{ListerError, NamespaceFilter, Workload, WorkloadLister};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One workload as written in the manifest
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ManifestEntry {
    /// Explicit app name; wins over the app label
    pub app: Option<String>,
    pub namespace: String,
    pub labels: BTreeMap<String, String>,
    pub build_id: Option<String>,
    pub image_digest: Option<String>,
    pub commit_hash: Option<String>,
    pub repo_url: Option<String>,
    pub annotations: BTreeMap<String, String>,
    pub image_labels: BTreeMap<String, String>,
}

impl ManifestEntry {
    /// Convert to a workload; `None` when no app name can be found
    pub fn into_workload(self, app_label: &str) -> Option<Workload> {
        let app = self
            .app
            .or_else(|| self.labels.get(app_label).cloned())
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())?;

        Some(Workload {
            app_name: app,
            namespace: self.namespace,
            build_id: self.build_id,
            image_digest: self.image_digest,
            commit_hash: self.commit_hash,
            repo_url: self.repo_url,
            annotations: self.annotations,
            image_labels: self.image_labels,
        })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Manifest {
    Wrapped { workloads: Vec<ManifestEntry> },
    Bare(Vec<ManifestEntry>),
}

impl Manifest {
    fn into_entries(self) -> Vec<ManifestEntry> {
        match self {
            Manifest::Wrapped { workloads } => workloads,
            Manifest::Bare(entries) => entries,
        }
    }
}

/// Lists workloads from a YAML or JSON file
#[derive(Debug, Clone)]
pub struct FileWorkloadLister {
    path: PathBuf,
    app_label: String,
}

impl FileWorkloadLister {
    /// Lister reading `path`, taking app names from `app_label` when an entry has no `app`
    pub fn new(path: impl Into<PathBuf>, app_label: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            app_label: app_label.into(),
        }
    }

    /// Manifest location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse manifest text; JSON when the file ends in `.json`, YAML otherwise
    pub fn parse(&self, content: &str) -> Result<Vec<Workload>, ListerError> {
        let is_json = self
            .path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));

        let manifest: Manifest = if is_json {
            serde_json::from_str(content).map_err(|e| self.unavailable(e))?
        } else {
            serde_yaml::from_str(content).map_err(|e| self.unavailable(e))?
        };

        let mut workloads = Vec::new();
        for entry in manifest.into_entries() {
            let namespace = entry.namespace.clone();
            match entry.into_workload(&self.app_label) {
                Some(workload) => workloads.push(workload),
                None => debug!(
                    namespace = %namespace,
                    label = %self.app_label,
                    "Dropping manifest entry without an app name"
                ),
            }
        }
        Ok(workloads)
    }

    fn unavailable(&self, e: impl std::fmt::Display) -> ListerError {
        ListerError::unavailable(format!("{}: {}", self.path.display(), e))
    }
}

#[async_trait]
impl WorkloadLister for FileWorkloadLister {
    async fn list(&self, filter: &NamespaceFilter) -> Result<Vec<Workload>, ListerError> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| self.unavailable(e))?;

        let mut workloads = self.parse(&content)?;
        workloads.retain(|w| filter.allows(&w.namespace));
        Ok(workloads)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const APP_LABEL: &str = "app.kubernetes.io/name";

    #[test]
    fn test_app_from_label_or_field() {
        let lister = FileWorkloadLister::new("workloads.yaml", APP_LABEL);
        let workloads = lister
            .parse(
                r#"
- namespace: shop
  labels:
    app.kubernetes.io/name: checkout
- namespace: shop
  app: billing
  labels:
    app.kubernetes.io/name: ignored
- namespace: shop
  labels:
    team: payments
"#,
            )
            .unwrap();

        let names: Vec<&str> = workloads.iter().map(|w| w.app_name.as_str()).collect();
        assert_eq!(names, vec!["checkout", "billing"]);
    }

    #[test]
    fn test_wrapped_json() {
        let lister = FileWorkloadLister::new("workloads.json", APP_LABEL);
        let workloads = lister
            .parse(
                r#"{"workloads": [
                    {"app": "checkout", "namespace": "shop", "image_digest": "sha256:abc"}
                ]}"#,
            )
            .unwrap();
        assert_eq!(workloads.len(), 1);
        assert_eq!(workloads[0].image_digest.as_deref(), Some("sha256:abc"));
    }

    #[test]
    fn test_parse_error_is_unavailable() {
        let lister = FileWorkloadLister::new("workloads.yaml", APP_LABEL);
        assert!(matches!(
            lister.parse("workloads: {not: [a list"),
            Err(ListerError::Unavailable(_))
        ));
    }
}
