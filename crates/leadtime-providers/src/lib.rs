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
//! Sources of workloads and facts for leadtime exporters
//!
//! - [`FileWorkloadLister`] reads the workloads to observe from a manifest
//! - [`GitApiAdapter`] looks commit times up on GitHub, GitLab, Bitbucket,
//!   Gitea or Azure DevOps
//! - [`ImageLabelAdapter`] reads build metadata stamped on images
//! - [`TlsOptions`] adds private CA roots to Git host clients
//!
//! [`build_policy`] and [`build_lister`] wire them up from a loaded
//! [`leadtime_config::Config`].

pub mod build;
pub mod certificates;
pub mod git_api;
pub mod git_repo;
pub mod image;
pub mod manifest;

pub use build::{build_lister, build_policy, git_adapter};
pub use certificates::TlsOptions;
pub use git_api::{ApiAuth, GitApiAdapter, HostKind, ProviderError};
pub use git_repo::{GitRepo, GitRepoError};
pub use image::ImageLabelAdapter;
pub use manifest::{FileWorkloadLister, ManifestEntry};
