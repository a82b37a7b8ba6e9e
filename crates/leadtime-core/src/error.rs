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
//! Error types for the collection engine

use std::time::Duration;
use thiserror::Error;

/// Per-workload data defects found while turning facts into a record
///
/// These never escalate past the workload they belong to.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    /// The raw timestamp was neither epoch seconds nor matched the configured format
    #[error("malformed timestamp '{value}': expected epoch seconds or format '{format}'")]
    MalformedTimestamp {
        /// Raw value as found on the fact
        value: String,
        /// Format string that was tried after the epoch heuristic
        format: String,
    },

    /// Required identity data was absent from every source
    #[error("incomplete data for '{app}': missing {missing}")]
    Incomplete {
        /// Application the workload belongs to
        app: String,
        /// Which piece of data was missing
        missing: &'static str,
    },
}

impl ResolutionError {
    /// Create a MalformedTimestamp error
    pub fn malformed(value: impl Into<String>, format: impl Into<String>) -> Self {
        ResolutionError::MalformedTimestamp {
            value: value.into(),
            format: format.into(),
        }
    }

    /// Create an Incomplete error
    pub fn incomplete(app: impl Into<String>, missing: &'static str) -> Self {
        ResolutionError::Incomplete {
            app: app.into(),
            missing,
        }
    }

    /// Short label used in reports and metrics
    pub fn reason(&self) -> &'static str {
        match self {
            ResolutionError::MalformedTimestamp { .. } => "malformed_timestamp",
            ResolutionError::Incomplete { .. } => "incomplete",
        }
    }
}

/// Outcomes of a source adapter call other than a usable fact
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdapterError {
    /// The upstream has no data for this workload
    #[error("not found: {0}")]
    NotFound(String),

    /// The upstream asked us to slow down
    #[error("rate limited (retry after {retry_after:?})")]
    RateLimited {
        /// Hint from the upstream, if it gave one
        retry_after: Option<Duration>,
    },

    /// Transport failure or an unusable upstream response
    #[error("upstream unavailable: {0}")]
    Unavailable(String),

    /// The adapter does not serve this workload's repository host
    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl AdapterError {
    /// Create a NotFound error
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        AdapterError::NotFound(msg.into())
    }

    /// Create an Unavailable error
    pub fn unavailable<S: Into<String>>(msg: S) -> Self {
        AdapterError::Unavailable(msg.into())
    }

    /// Create an Unsupported error
    pub fn unsupported<S: Into<String>>(msg: S) -> Self {
        AdapterError::Unsupported(msg.into())
    }

    /// Create a RateLimited error
    pub fn rate_limited(retry_after: Option<Duration>) -> Self {
        AdapterError::RateLimited { retry_after }
    }

    /// Whether the resolution policy may move on to the next step
    pub fn is_absence(&self) -> bool {
        matches!(self, AdapterError::NotFound(_) | AdapterError::Unsupported(_))
    }

    /// Check if this is a RateLimited error
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, AdapterError::RateLimited { .. })
    }
}

/// Failures of the workload source
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ListerError {
    /// Listing could not be completed; retried on the next cycle
    #[error("workload source unavailable: {0}")]
    Unavailable(String),
}

impl ListerError {
    /// Create an Unavailable error
    pub fn unavailable<S: Into<String>>(msg: S) -> Self {
        ListerError::Unavailable(msg.into())
    }
}
