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
use leadtime_core::{AnnotationKeys, BackoffPolicy, ExporterSettings, MetricKind, NamespaceFilter};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Collection loop settings
    #[serde(default)]
    pub exporter: ExporterConfig,

    /// Annotation names consulted before any adapter
    #[serde(default)]
    pub annotations: AnnotationKeys,

    /// Source provider
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Workload discovery
    #[serde(default)]
    pub workloads: WorkloadsConfig,

    /// Extra trust roots for Git host APIs
    #[serde(default)]
    pub certificates: CertificatesConfig,

    /// Observability settings
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Collection loop settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExporterConfig {
    /// Kind of record produced
    #[serde(default = "default_kind")]
    pub kind: MetricKind,

    /// Seconds between cycle starts
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Workloads resolved concurrently
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Namespace allow-list; empty means all
    #[serde(default)]
    pub namespaces: Vec<String>,

    /// Label carrying the app name in workload manifests
    #[serde(default = "default_app_label")]
    pub app_label: String,

    /// Upper bound on cycles a rate-limited adapter sits out
    #[serde(default = "default_backoff_max_cycles")]
    pub backoff_max_cycles: u64,

    /// Fall back to image labels when the provider finds nothing
    #[serde(default)]
    pub image_fallback: bool,
}

impl ExporterConfig {
    /// Poll interval as a duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Engine settings derived from this section
    pub fn settings(&self) -> ExporterSettings {
        ExporterSettings {
            kind: self.kind,
            poll_interval: self.poll_interval(),
            max_concurrency: self.max_concurrency,
            namespaces: NamespaceFilter::only(&self.namespaces),
            backoff: BackoffPolicy {
                max_cycles: self.backoff_max_cycles,
                ..BackoffPolicy::default()
            },
        }
    }
}

/// Username and token for a Git host
#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Credentials {
    /// API user
    pub username: Option<String>,
    /// API token
    pub token: Option<String>,
}

impl Credentials {
    /// Create credentials
    pub fn new(username: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            token: Some(token.into()),
        }
    }

    /// Whether both parts are set
    pub fn is_complete(&self) -> bool {
        self.username.is_some() && self.token.is_some()
    }

    /// Both parts must be set together; a lone half is dropped with a warning
    pub fn normalize(&mut self) {
        let blank = |v: &Option<String>| v.as_deref().filter(|s| !s.trim().is_empty()).is_none();
        if blank(&self.username) {
            self.username = None;
        }
        if blank(&self.token) {
            self.token = None;
        }

        match (&self.username, &self.token) {
            (Some(_), None) | (None, Some(_)) => {
                warn!("Username and token must both be set; ignoring the one provided");
                self.username = None;
                self.token = None;
            }
            (None, None) => {
                warn!("No API credentials configured; only public repositories will be reachable");
            }
            (Some(_), Some(_)) => {}
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("token", &self.token.as_ref().map(|_| REDACTED))
            .finish()
    }
}

const REDACTED: &str = "********";

/// Settings shared by the GitHub, GitLab, Bitbucket and Gitea providers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GitProviderConfig {
    /// API host or base URL; the provider's public host when unset
    pub api: Option<String>,
    /// Optional credentials
    pub credentials: Credentials,
    /// Verify TLS certificates
    pub tls_verify: bool,
}

impl Default for GitProviderConfig {
    fn default() -> Self {
        Self {
            api: None,
            credentials: Credentials::default(),
            tls_verify: true,
        }
    }
}

/// Azure DevOps settings
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AzureDevOpsConfig {
    /// Organization URL, e.g. `https://dev.azure.com/org`
    pub api: String,
    /// Personal access token
    pub token: String,
    /// Verify TLS certificates
    pub tls_verify: bool,
}

impl Default for AzureDevOpsConfig {
    fn default() -> Self {
        Self {
            api: String::new(),
            token: String::new(),
            tls_verify: true,
        }
    }
}

impl fmt::Debug for AzureDevOpsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureDevOpsConfig")
            .field("api", &self.api)
            .field("token", &if self.token.is_empty() { "" } else { REDACTED })
            .field("tls_verify", &self.tls_verify)
            .finish()
    }
}

/// Source provider configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum ProviderConfig {
    /// GitHub or GitHub Enterprise
    #[serde(rename = "github")]
    GitHub(GitProviderConfig),

    /// GitLab
    #[serde(rename = "gitlab")]
    GitLab(GitProviderConfig),

    /// Bitbucket Cloud
    #[serde(rename = "bitbucket")]
    Bitbucket(GitProviderConfig),

    /// Gitea
    #[serde(rename = "gitea")]
    Gitea(GitProviderConfig),

    /// Azure DevOps
    #[serde(rename = "azure-devops")]
    AzureDevOps(AzureDevOpsConfig),

    /// Container image labels only; no Git API
    #[serde(rename = "image")]
    Image,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig::GitHub(GitProviderConfig::default())
    }
}

/// Names accepted for the provider type
pub const PROVIDER_NAMES: [&str; 6] = [
    "github",
    "gitlab",
    "bitbucket",
    "gitea",
    "azure-devops",
    "image",
];

impl ProviderConfig {
    /// Provider type name
    pub fn name(&self) -> &'static str {
        match self {
            ProviderConfig::GitHub(_) => "github",
            ProviderConfig::GitLab(_) => "gitlab",
            ProviderConfig::Bitbucket(_) => "bitbucket",
            ProviderConfig::Gitea(_) => "gitea",
            ProviderConfig::AzureDevOps(_) => "azure-devops",
            ProviderConfig::Image => "image",
        }
    }

    /// Public API host used when none is configured
    pub fn default_api(&self) -> Option<&'static str> {
        match self {
            ProviderConfig::GitHub(_) => Some("api.github.com"),
            ProviderConfig::GitLab(_) => Some("gitlab.com"),
            ProviderConfig::Bitbucket(_) => Some("api.bitbucket.org"),
            ProviderConfig::Gitea(_) => Some("try.gitea.io"),
            ProviderConfig::AzureDevOps(_) | ProviderConfig::Image => None,
        }
    }

    /// Effective API host or base URL
    pub fn api(&self) -> Option<&str> {
        match self {
            ProviderConfig::GitHub(c)
            | ProviderConfig::GitLab(c)
            | ProviderConfig::Bitbucket(c)
            | ProviderConfig::Gitea(c) => c.api.as_deref().or(self.default_api()),
            ProviderConfig::AzureDevOps(c) => Some(c.api.as_str()),
            ProviderConfig::Image => None,
        }
    }

    /// Whether TLS certificates are verified
    pub fn tls_verify(&self) -> bool {
        match self {
            ProviderConfig::GitHub(c)
            | ProviderConfig::GitLab(c)
            | ProviderConfig::Bitbucket(c)
            | ProviderConfig::Gitea(c) => c.tls_verify,
            ProviderConfig::AzureDevOps(c) => c.tls_verify,
            ProviderConfig::Image => true,
        }
    }

    /// Provider of the given type carrying over credentials and TLS settings
    pub fn switch_to(&self, name: &str) -> Option<ProviderConfig> {
        let git = match self {
            ProviderConfig::GitHub(c)
            | ProviderConfig::GitLab(c)
            | ProviderConfig::Bitbucket(c)
            | ProviderConfig::Gitea(c) => GitProviderConfig {
                api: None,
                ..c.clone()
            },
            ProviderConfig::AzureDevOps(c) => GitProviderConfig {
                tls_verify: c.tls_verify,
                ..GitProviderConfig::default()
            },
            ProviderConfig::Image => GitProviderConfig::default(),
        };

        let switched = match name.trim().to_lowercase().as_str() {
            "github" => ProviderConfig::GitHub(git),
            "gitlab" => ProviderConfig::GitLab(git),
            "bitbucket" => ProviderConfig::Bitbucket(git),
            "gitea" => ProviderConfig::Gitea(git),
            "azure-devops" | "azure" => ProviderConfig::AzureDevOps(AzureDevOpsConfig {
                token: git.credentials.token.unwrap_or_default(),
                tls_verify: git.tls_verify,
                ..AzureDevOpsConfig::default()
            }),
            "image" => ProviderConfig::Image,
            _ => return None,
        };
        Some(switched)
    }

    /// Drop half-configured Git credentials
    pub fn normalize_credentials(&mut self) {
        match self {
            ProviderConfig::GitHub(c)
            | ProviderConfig::GitLab(c)
            | ProviderConfig::Bitbucket(c)
            | ProviderConfig::Gitea(c) => c.credentials.normalize(),
            ProviderConfig::AzureDevOps(_) | ProviderConfig::Image => {}
        }
    }
}

/// Workload discovery
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkloadsConfig {
    /// Manifest listing the workloads to observe (YAML or JSON)
    #[serde(default = "default_manifest")]
    pub manifest: PathBuf,
}

/// Extra certificate authorities trusted by Git host clients.
///
/// The files are PEM encoded and are added on top of the built-in roots, so
/// public hosts keep working next to hosts signed by a private CA. They are
/// ignored when the provider does not verify TLS.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CertificatesConfig {
    /// PEM files holding one or more certificates each
    pub custom_pem_cert_files: Vec<PathBuf>,
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ObservabilityConfig {
    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log format (pretty, compact, json)
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Metrics endpoint
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Metrics endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricsConfig {
    /// Serve `/metrics`
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Bind address
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Metrics port
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_kind() -> MetricKind {
    MetricKind::Commit
}

fn default_poll_interval() -> u64 {
    30
}

fn default_max_concurrency() -> usize {
    4
}

/// Label the upstream exporters read app names from
pub const DEFAULT_APP_LABEL: &str = "app.kubernetes.io/name";

fn default_app_label() -> String {
    DEFAULT_APP_LABEL.to_string()
}

fn default_backoff_max_cycles() -> u64 {
    32
}

fn default_manifest() -> PathBuf {
    PathBuf::from("workloads.yaml")
}

fn default_log_level() -> String {
    "INFO".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_metrics_port() -> u16 {
    8080
}

impl Default for ExporterConfig {
    fn default() -> Self {
        ExporterConfig {
            kind: default_kind(),
            poll_interval_secs: default_poll_interval(),
            max_concurrency: default_max_concurrency(),
            namespaces: Vec::new(),
            app_label: default_app_label(),
            backoff_max_cycles: default_backoff_max_cycles(),
            image_fallback: false,
        }
    }
}

impl Default for WorkloadsConfig {
    fn default() -> Self {
        WorkloadsConfig {
            manifest: default_manifest(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        ObservabilityConfig {
            log_level: default_log_level(),
            log_format: default_log_format(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        MetricsConfig {
            enabled: true,
            bind_address: default_bind_address(),
            port: default_metrics_port(),
        }
    }
}
