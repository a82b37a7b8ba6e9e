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
//! Assemble sources from configuration

use leadtime_config::{CertificatesConfig, Config, Credentials, ProviderConfig};
use leadtime_core::{MetricKind, ResolutionPolicy, SourceAdapter};
use std::sync::Arc;
use tracing::info;

use crate::certificates::TlsOptions;
use crate::git_api::{ApiAuth, GitApiAdapter, HostKind, ProviderError};
use crate::image::ImageLabelAdapter;
use crate::manifest::FileWorkloadLister;

/// Lister for the configured manifest
pub fn build_lister(config: &Config) -> FileWorkloadLister {
    FileWorkloadLister::new(&config.workloads.manifest, &config.exporter.app_label)
}

/// Resolution steps for the configured provider and record kind.
///
/// Annotations always come first. Git hosts only know commit times, so
/// they are consulted for commit exporters alone; image labels can serve
/// any kind.
pub fn build_policy(config: &Config) -> Result<ResolutionPolicy, ProviderError> {
    let kind = config.exporter.kind;
    let image = || -> Arc<dyn SourceAdapter> {
        Arc::new(ImageLabelAdapter::new(config.annotations.clone(), kind))
    };

    let primary: Option<Arc<dyn SourceAdapter>> = match (&config.provider, kind) {
        (ProviderConfig::Image, _) => Some(image()),
        (provider, MetricKind::Commit) => {
            Some(Arc::new(git_adapter(provider, &config.certificates)?))
        }
        (provider, _) => {
            info!(
                provider = provider.name(),
                kind = %kind,
                "Provider does not serve this kind; using annotations only"
            );
            None
        }
    };

    let fallback = match (&config.provider, config.exporter.image_fallback) {
        (ProviderConfig::Image, _) | (_, false) => None,
        (_, true) => Some(image()),
    };

    let policy = ResolutionPolicy::standard(primary.into_iter().collect(), fallback);
    info!(steps = ?policy.steps(), "Resolution policy ready");
    Ok(policy)
}

/// Adapter for a Git hosting provider, trusting any configured private CAs
pub fn git_adapter(
    provider: &ProviderConfig,
    certificates: &CertificatesConfig,
) -> Result<GitApiAdapter, ProviderError> {
    let kind = match provider {
        ProviderConfig::GitHub(_) => HostKind::GitHub,
        ProviderConfig::GitLab(_) => HostKind::GitLab,
        ProviderConfig::Bitbucket(_) => HostKind::Bitbucket,
        ProviderConfig::Gitea(_) => HostKind::Gitea,
        ProviderConfig::AzureDevOps(_) => HostKind::AzureDevOps,
        ProviderConfig::Image => {
            return Err(ProviderError::InvalidApi {
                api: String::new(),
                reason: "the image provider has no API".to_string(),
            })
        }
    };

    let auth = match provider {
        ProviderConfig::GitHub(c)
        | ProviderConfig::GitLab(c)
        | ProviderConfig::Bitbucket(c)
        | ProviderConfig::Gitea(c) => basic_auth(&c.credentials),
        ProviderConfig::AzureDevOps(c) => ApiAuth::Basic {
            username: String::new(),
            token: c.token.clone(),
        },
        ProviderConfig::Image => ApiAuth::Anonymous,
    };

    let tls = TlsOptions::with_pem_files(
        provider.tls_verify(),
        &certificates.custom_pem_cert_files,
    )?;
    if !tls.root_certificates.is_empty() {
        info!(
            provider = provider.name(),
            count = tls.root_certificates.len(),
            "Trusting custom CA certificates"
        );
    }

    let api = provider.api().unwrap_or_default();
    GitApiAdapter::with_tls(kind, api, auth, tls)
}

fn basic_auth(credentials: &Credentials) -> ApiAuth {
    match (&credentials.username, &credentials.token) {
        (Some(username), Some(token)) => ApiAuth::Basic {
            username: username.clone(),
            token: token.clone(),
        },
        _ => ApiAuth::Anonymous,
    }
}
