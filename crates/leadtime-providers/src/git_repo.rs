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
//! Git repository URL parsing
//!
//! Build metadata records the repository as whatever the build system was
//! given: `https://host/group/name.git`, `ssh://git@host:2222/group/name`,
//! or the scp-like `git@host:group/name.git`. [`GitRepo::from_url`]
//! normalizes all of them into the parts the host APIs need.

use std::fmt;
use thiserror::Error;
use url::Url;

/// Protocols a repository URL may use
pub const SUPPORTED_PROTOCOLS: [&str; 4] = ["http", "https", "ssh", "git"];

/// Errors from parsing a repository URL
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GitRepoError {
    #[error("Unsupported protocol '{protocol}' in repository URL {url}")]
    UnsupportedProtocol { url: String, protocol: String },

    #[error("Malformed repository URL {url}: {reason}")]
    Malformed { url: String, reason: String },
}

impl GitRepoError {
    fn malformed(url: &str, reason: impl Into<String>) -> Self {
        GitRepoError::Malformed {
            url: url.to_string(),
            reason: reason.into(),
        }
    }
}

/// Parts of a repository URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitRepo {
    /// URL as given, minus trailing slashes
    pub url: String,
    pub protocol: String,
    pub fqdn: String,
    pub port: Option<u16>,
    /// Owner path; nested subgroups are joined with `/`
    pub group: String,
    /// Repository name without `.git`
    pub name: String,
    pub project: String,
}

impl GitRepo {
    /// Parse a repository URL
    pub fn from_url(raw: &str) -> Result<Self, GitRepoError> {
        let url = raw.trim().trim_end_matches('/').to_string();
        if url.is_empty() {
            return Err(GitRepoError::malformed(raw, "empty"));
        }

        match url.split_once("://") {
            Some(_) => Self::from_standard(url),
            None => Self::from_scp_like(url),
        }
    }

    fn from_standard(url: String) -> Result<Self, GitRepoError> {
        let parsed = Url::parse(&url).map_err(|e| GitRepoError::malformed(&url, e.to_string()))?;

        let protocol = parsed.scheme().to_string();
        if !SUPPORTED_PROTOCOLS.contains(&protocol.as_str()) {
            return Err(GitRepoError::UnsupportedProtocol { url, protocol });
        }

        let fqdn = parsed
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| GitRepoError::malformed(&url, "no host"))?
            .to_string();
        let port = parsed.port();
        let path = parsed.path().to_string();

        Self::assemble(url, protocol, fqdn, port, &path)
    }

    // user@host:group/name.git
    fn from_scp_like(url: String) -> Result<Self, GitRepoError> {
        let (authority, path) = url.split_once(':').ok_or_else(|| {
            GitRepoError::malformed(&url, "expected scheme://host/path or user@host:path")
        })?;
        let fqdn = authority
            .rsplit_once('@')
            .map_or(authority, |(_, host)| host)
            .to_string();
        if fqdn.is_empty() {
            return Err(GitRepoError::malformed(&url, "no host"));
        }

        Self::assemble(url.clone(), "ssh".to_string(), fqdn, None, path)
    }

    fn assemble(
        url: String,
        protocol: String,
        fqdn: String,
        port: Option<u16>,
        path: &str,
    ) -> Result<Self, GitRepoError> {
        let path = path.trim_matches('/');
        let path = path.strip_suffix(".git").unwrap_or(path);
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        let (name, owners) = match segments.split_last() {
            Some((name, owners)) if !owners.is_empty() => (name.to_string(), owners.join("/")),
            _ => return Err(GitRepoError::malformed(&url, "path must contain group and name")),
        };

        Ok(GitRepo {
            url,
            protocol,
            fqdn,
            port,
            group: owners,
            project: name.clone(),
            name,
        })
    }

    /// `protocol://fqdn[:port]`
    pub fn server(&self) -> String {
        match self.port {
            Some(port) => format!("{}://{}:{}", self.protocol, self.fqdn, port),
            None => format!("{}://{}", self.protocol, self.fqdn),
        }
    }

    /// `group/project`
    pub fn path(&self) -> String {
        format!("{}/{}", self.group, self.project)
    }
}

impl fmt::Display for GitRepo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.server(), self.path())
    }
}
