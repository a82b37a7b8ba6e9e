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
//! Trust settings for Git host clients

use leadtime_config::validation::PEM_CERTIFICATE_HEADER;
use reqwest::Certificate;
use std::path::{Path, PathBuf};

use crate::git_api::ProviderError;

/// TLS behaviour of a Git host client
#[derive(Debug, Clone)]
pub struct TlsOptions {
    /// Verify server certificates
    pub verify: bool,
    /// Roots trusted in addition to the built-in ones
    pub root_certificates: Vec<Certificate>,
}

impl TlsOptions {
    /// Built-in roots only
    pub fn verify(verify: bool) -> Self {
        Self {
            verify,
            root_certificates: Vec::new(),
        }
    }

    /// Read extra roots from PEM files.
    ///
    /// Nothing is read when verification is off.
    pub fn with_pem_files(verify: bool, paths: &[PathBuf]) -> Result<Self, ProviderError> {
        if !verify {
            return Ok(Self::verify(false));
        }
        let root_certificates = paths
            .iter()
            .map(|path| load_pem(path))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            verify,
            root_certificates,
        })
    }
}

impl Default for TlsOptions {
    fn default() -> Self {
        Self::verify(true)
    }
}

fn load_pem(path: &Path) -> Result<Certificate, ProviderError> {
    let certificate_error = |reason: String| ProviderError::Certificate {
        path: path.to_path_buf(),
        reason,
    };
    let pem = std::fs::read(path).map_err(|e| certificate_error(e.to_string()))?;
    // rustls defers parsing to client build and skips non-PEM input silently
    if !String::from_utf8_lossy(&pem).contains(PEM_CERTIFICATE_HEADER) {
        return Err(certificate_error("no PEM certificate found".to_string()));
    }
    Certificate::from_pem(&pem).map_err(|e| certificate_error(e.to_string()))
}
