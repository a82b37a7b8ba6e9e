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
//! Startup version banner.
//!
//! Images produced by a source-to-image build carry `OPENSHIFT_BUILD_SOURCE`,
//! `OPENSHIFT_BUILD_REFERENCE` and `OPENSHIFT_BUILD_COMMIT` in their
//! environment. When all three are present they are logged next to the
//! crate version so operators can trace a running exporter to its source.

use tracing::info;

/// Build provenance read from the environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInfo {
    pub source: String,
    pub reference: String,
    pub commit: String,
}

impl BuildInfo {
    /// Read provenance from the process environment
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read provenance through `lookup`; `None` unless all three values are non-empty
    pub fn from_lookup<F>(lookup: F) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        Some(BuildInfo {
            source: get("OPENSHIFT_BUILD_SOURCE")?,
            reference: get("OPENSHIFT_BUILD_REFERENCE")?,
            commit: get("OPENSHIFT_BUILD_COMMIT")?,
        })
    }
}

/// Render the banner line for an exporter of the given kind
pub fn banner(kind: &str, version: &str, build: Option<&BuildInfo>) -> String {
    match build {
        Some(b) => format!(
            "Running {} exporter v{} from {}, ref {} (commit {})",
            kind, version, b.source, b.reference, b.commit
        ),
        None => format!(
            "Running {} exporter v{}. No build provenance found.",
            kind, version
        ),
    }
}

/// Log the banner at info level, reading provenance from the environment
pub fn log_banner(kind: &str, version: &str) {
    let build = BuildInfo::from_env();
    info!(
        kind,
        version,
        source = build.as_ref().map(|b| b.source.as_str()),
        commit = build.as_ref().map(|b| b.commit.as_str()),
        "{}",
        banner(kind, version, build.as_ref())
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_complete_provenance() {
        let build = BuildInfo::from_lookup(lookup(&[
            ("OPENSHIFT_BUILD_SOURCE", "https://github.com/acme/leadtime"),
            ("OPENSHIFT_BUILD_REFERENCE", "main"),
            ("OPENSHIFT_BUILD_COMMIT", "a1b2c3"),
        ]));
        let text = banner("committime", "0.3.0", build.as_ref());
        assert_eq!(
            text,
            "Running committime exporter v0.3.0 from https://github.com/acme/leadtime, \
             ref main (commit a1b2c3)"
        );
    }

    #[test]
    fn test_partial_provenance_ignored() {
        let build = BuildInfo::from_lookup(lookup(&[
            ("OPENSHIFT_BUILD_SOURCE", "https://github.com/acme/leadtime"),
            ("OPENSHIFT_BUILD_COMMIT", ""),
        ]));
        assert!(build.is_none());
        assert!(banner("deploytime", "0.3.0", None).contains("No build provenance"));
    }
}
