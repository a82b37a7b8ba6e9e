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

//! Test fixture management.

use leadtime_core::{keys, FactSource, RawFact, Workload};
use std::io::Write;
use tempfile::NamedTempFile;

/// Epoch seconds of 2022-09-21T14:30:55Z
pub const SAMPLE_EPOCH: &str = "1663770655";

/// Self-signed CA certificate, valid until 2126
pub const TEST_CA_PEM: &str = "\
-----BEGIN CERTIFICATE-----
MIIBjDCCATOgAwIBAgIULCi8AWSKy6xcIW2qfVoc2C+mZwgwCgYIKoZIzj0EAwIw
GzEZMBcGA1UEAwwQTGVhZHRpbWUgVGVzdCBDQTAgFw0yNjEwMTYxODI2MDVaGA8y
MTI2MDkyMjE4MjYwNVowGzEZMBcGA1UEAwwQTGVhZHRpbWUgVGVzdCBDQTBZMBMG
ByqGSM49AgEGCCqGSM49AwEHA0IABPIdQ8IThIC0GP79tG6Ih7W2IOLhZZiaR1+i
z9MpRM4GRD+EsJ9as3mPLFhUjxBPXOfSaTxYZyE6fHgxLxMvx8OjUzBRMB0GA1Ud
DgQWBBQNsXAY6s8/Y2EfRZ8jSTqu2exBljAfBgNVHSMEGDAWgBQNsXAY6s8/Y2Ef
RZ8jSTqu2exBljAPBgNVHRMBAf8EBTADAQH/MAoGCCqGSM49BAMCA0cAMEQCIGPP
L7Q2U/1l8IC/wpGtvUwQ9BBBO5dCoy38TuwiCtSgAiApJyyD0MvOu83xfeOH8x0j
MrO/8SfcEbhMaRKoalzI0A==
-----END CERTIFICATE-----
";

/// Test fixture management utilities.
pub struct TestFixtures;

impl TestFixtures {
    /// Workload whose annotations carry a complete commit event
    pub fn annotated_commit(app: &str, namespace: &str, sha: &str, epoch: &str) -> Workload {
        Workload::new(app, namespace)
            .with_annotation("io.openshift.build.commit.id", sha)
            .with_annotation("io.openshift.build.commit.date", epoch)
            .with_annotation(
                "io.openshift.build.source-location",
                format!("https://github.com/example/{}", app),
            )
    }

    /// Workload with build metadata but no annotations
    pub fn built_from(app: &str, namespace: &str, sha: &str, repo_url: &str) -> Workload {
        Workload::new(app, namespace)
            .with_commit_hash(sha)
            .with_repo_url(repo_url)
            .with_image_digest(format!("sha256:{}", sha))
    }

    /// Fact as a Git API adapter would return it
    pub fn git_fact(sha: &str, epoch: &str) -> RawFact {
        RawFact::new(FactSource::Git)
            .with(keys::COMMIT_HASH, sha)
            .with(keys::TIMESTAMP, epoch)
    }

    /// Fact as the image-label fallback would return it
    pub fn image_fact(sha: &str, epoch: &str) -> RawFact {
        RawFact::new(FactSource::Image)
            .with(keys::COMMIT_HASH, sha)
            .with(keys::TIMESTAMP, epoch)
    }

    /// Write `content` to a temporary file ending in `suffix`
    ///
    /// # Panics
    ///
    /// Panics if the temporary file cannot be created or written.
    #[allow(clippy::expect_used)]
    pub fn temp_file(content: &str, suffix: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(suffix)
            .tempfile()
            .expect("create temp file");
        file.write_all(content.as_bytes()).expect("write temp file");
        file.flush().expect("flush temp file");
        file
    }
}
