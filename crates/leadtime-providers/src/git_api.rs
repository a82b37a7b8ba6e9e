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
//! Commit lookups against Git hosting REST APIs
//!
//! One [`GitApiAdapter`] serves one kind of host. Each kind differs only in
//! where the commit lives and where its committer date sits in the JSON
//! body, so both are data on [`HostKind`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use leadtime_core::{keys, AdapterError, FactSource, RawFact, SourceAdapter, Workload};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::certificates::TlsOptions;
use crate::git_repo::GitRepo;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!("leadtime/", env!("CARGO_PKG_VERSION"));
const RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";
const RATELIMIT_RESET: &str = "x-ratelimit-reset";

/// Errors building an adapter
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Invalid API address '{api}': {reason}")]
    InvalidApi { api: String, reason: String },

    #[error("Invalid CA certificate {}: {reason}", .path.display())]
    Certificate { path: PathBuf, reason: String },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Supported Git hosting APIs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostKind {
    GitHub,
    GitLab,
    Bitbucket,
    Gitea,
    AzureDevOps,
}

impl HostKind {
    /// Adapter name, matching the provider type in configuration
    pub fn name(&self) -> &'static str {
        match self {
            HostKind::GitHub => "github",
            HostKind::GitLab => "gitlab",
            HostKind::Bitbucket => "bitbucket",
            HostKind::Gitea => "gitea",
            HostKind::AzureDevOps => "azure-devops",
        }
    }

    /// JSON pointer to the committer date in a commit response
    pub fn date_pointer(&self) -> &'static str {
        match self {
            HostKind::GitHub | HostKind::Gitea => "/commit/committer/date",
            HostKind::GitLab => "/committed_date",
            HostKind::Bitbucket => "/date",
            HostKind::AzureDevOps => "/committer/date",
        }
    }

    /// Path segments locating `sha` in `repo`, relative to the API base
    fn commit_segments(&self, repo: &GitRepo, sha: &str) -> Vec<String> {
        let owner: Vec<&str> = repo.group.split('/').collect();
        let project = repo.project.as_str();
        let full_path = repo.path();

        let segments: Vec<&str> = match self {
            HostKind::GitHub => {
                [&["repos"][..], owner.as_slice(), &[project, "commits", sha][..]].concat()
            }
            // The project path travels as one encoded segment
            HostKind::GitLab => vec![
                "api",
                "v4",
                "projects",
                full_path.as_str(),
                "repository",
                "commits",
                sha,
            ],
            HostKind::Bitbucket => [
                &["2.0", "repositories"][..],
                owner.as_slice(),
                &[project, "commit", sha][..],
            ]
            .concat(),
            HostKind::Gitea => [
                &["api", "v1", "repos"][..],
                owner.as_slice(),
                &[project, "git", "commits", sha][..],
            ]
            .concat(),
            HostKind::AzureDevOps => vec![
                project,
                "_apis",
                "git",
                "repositories",
                project,
                "commits",
                sha,
            ],
        };
        segments.into_iter().map(str::to_string).collect()
    }

    /// Whether a repository on `fqdn` can live on this kind of host
    fn serves_host(&self, fqdn: &str) -> bool {
        match self {
            HostKind::AzureDevOps => {
                let host = fqdn.to_lowercase();
                !["github", "gitlab", "bitbucket", "gitea"]
                    .iter()
                    .any(|other| host.contains(other))
            }
            _ => true,
        }
    }
}

/// Credentials sent with every request
#[derive(Clone)]
pub enum ApiAuth {
    /// Unauthenticated; public repositories only
    Anonymous,
    /// HTTP basic auth
    Basic { username: String, token: String },
}

impl std::fmt::Debug for ApiAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiAuth::Anonymous => f.write_str("Anonymous"),
            ApiAuth::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("token", &"********")
                .finish(),
        }
    }
}

/// Fetches commit times from a Git host
#[derive(Debug, Clone)]
pub struct GitApiAdapter {
    kind: HostKind,
    base: Url,
    auth: ApiAuth,
    client: Client,
}

impl GitApiAdapter {
    /// Create an adapter for `kind` rooted at `api`.
    ///
    /// `api` may be a bare host (`api.github.com`), in which case HTTPS is
    /// assumed, or a full base URL including a path prefix.
    pub fn new(
        kind: HostKind,
        api: &str,
        auth: ApiAuth,
        tls_verify: bool,
    ) -> Result<Self, ProviderError> {
        Self::with_tls(kind, api, auth, TlsOptions::verify(tls_verify))
    }

    /// Create an adapter trusting extra root certificates
    pub fn with_tls(
        kind: HostKind,
        api: &str,
        auth: ApiAuth,
        tls: TlsOptions,
    ) -> Result<Self, ProviderError> {
        let base = parse_api(api)?;
        let mut builder = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .danger_accept_invalid_certs(!tls.verify);
        if tls.verify {
            for certificate in tls.root_certificates {
                builder = builder.add_root_certificate(certificate);
            }
        }
        let client = builder.build()?;

        Ok(Self {
            kind,
            base,
            auth,
            client,
        })
    }

    /// Host kind served
    pub fn kind(&self) -> HostKind {
        self.kind
    }

    /// API base URL
    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Full URL of the commit resource
    pub fn commit_url(&self, repo: &GitRepo, sha: &str) -> Result<Url, AdapterError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| AdapterError::unsupported(format!("{} cannot be a base URL", self.base)))?
            .pop_if_empty()
            .extend(self.kind.commit_segments(repo, sha));
        if self.kind == HostKind::AzureDevOps {
            url.query_pairs_mut().append_pair("api-version", "6.0");
        }
        Ok(url)
    }

    async fn get_commit(&self, url: Url) -> Result<serde_json::Value, AdapterError> {
        let request = match &self.auth {
            ApiAuth::Anonymous => self.client.get(url.clone()),
            ApiAuth::Basic { username, token } => {
                self.client.get(url.clone()).basic_auth(username, Some(token))
            }
        };

        let response = request
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| AdapterError::unavailable(format!("request to {} failed: {}", url, e)))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| {
                    AdapterError::unavailable(format!("invalid JSON from {}: {}", url, e))
                });
        }

        Err(classify(status, response.headers(), &url))
    }
}

#[async_trait]
impl SourceAdapter for GitApiAdapter {
    fn name(&self) -> &str {
        self.kind.name()
    }

    fn supports(&self, workload: &Workload) -> bool {
        match workload.repo_url.as_deref().map(GitRepo::from_url) {
            Some(Ok(repo)) => self.kind.serves_host(&repo.fqdn),
            _ => true,
        }
    }

    async fn fetch(&self, workload: &Workload) -> Result<RawFact, AdapterError> {
        let sha = workload
            .commit_hash
            .as_deref()
            .ok_or_else(|| AdapterError::not_found("workload has no commit hash"))?;
        let repo_url = workload
            .repo_url
            .as_deref()
            .ok_or_else(|| AdapterError::not_found("workload has no repository URL"))?;
        let repo =
            GitRepo::from_url(repo_url).map_err(|e| AdapterError::unsupported(e.to_string()))?;

        if !self.kind.serves_host(&repo.fqdn) {
            return Err(AdapterError::unsupported(format!(
                "{} is not an {} host",
                repo.fqdn,
                self.kind.name()
            )));
        }

        let url = self.commit_url(&repo, sha)?;
        debug!(app = %workload.app_name, adapter = self.kind.name(), %url, "Fetching commit");
        let body = self.get_commit(url).await?;

        let mut fact = RawFact::new(FactSource::Git)
            .with(keys::COMMIT_HASH, sha)
            .with(keys::REPO_URL, repo_url);
        if let Some(date) = body.pointer(self.kind.date_pointer()).and_then(|v| v.as_str()) {
            fact.insert(keys::TIMESTAMP, epoch_value(date));
        }
        Ok(fact)
    }
}

/// Commit date as a 10-digit epoch string.
///
/// Unparseable and pre-1970 dates pass through for the resolver to report.
fn epoch_value(date: &str) -> String {
    let secs = DateTime::parse_from_rfc3339(date).map(|parsed| parsed.timestamp());
    match secs {
        Ok(secs) if secs >= 0 => format!("{:010}", secs),
        _ => date.to_string(),
    }
}

fn parse_api(api: &str) -> Result<Url, ProviderError> {
    let trimmed = api.trim();
    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };
    let url = Url::parse(&with_scheme).map_err(|e| ProviderError::InvalidApi {
        api: api.to_string(),
        reason: e.to_string(),
    })?;
    if url.cannot_be_a_base() {
        return Err(ProviderError::InvalidApi {
            api: api.to_string(),
            reason: "not a base URL".to_string(),
        });
    }
    Ok(url)
}

/// Map a non-success response to an adapter error
fn classify(status: StatusCode, headers: &HeaderMap, url: &Url) -> AdapterError {
    let exhausted = header_str(headers, RATELIMIT_REMAINING) == Some("0");
    if status == StatusCode::TOO_MANY_REQUESTS || (status == StatusCode::FORBIDDEN && exhausted) {
        return AdapterError::rate_limited(retry_after(headers));
    }

    match status {
        StatusCode::NOT_FOUND => AdapterError::not_found(format!("{} not found", url)),
        _ => AdapterError::unavailable(format!("{} returned {}", url, status)),
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim)
}

/// Server hint from `retry-after` seconds or an `x-ratelimit-reset` epoch
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let seconds = header_str(headers, RETRY_AFTER.as_str()).and_then(|v| v.parse::<u64>().ok());
    if let Some(secs) = seconds {
        return Some(Duration::from_secs(secs));
    }

    let reset = header_str(headers, RATELIMIT_RESET).and_then(|v| v.parse::<i64>().ok())?;
    let wait = reset - Utc::now().timestamp();
    u64::try_from(wait).ok().map(Duration::from_secs)
}
