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
//! Leadtime Observability Module
//!
//! Structured logging for the exporters, built on `tracing` and
//! `tracing-subscriber`.
//!
//! # Features
//!
//! - **Multiple Output Formats**: Pretty, JSON, and compact output formats
//! - **Operator Level Names**: `DEBUG`, `INFO`, `WARNING`, `ERROR`, `CRITICAL`
//! - **Environment-based Filtering**: `RUST_LOG` directives apply when no
//!   explicit filter is given
//! - **Version Banner**: build provenance logged at startup
//!
//! # Example
//!
//! ```no_run
//! use leadtime_observability::{init_tracing_with_config, LogConfig, LogFormat, LogLevel};
//!
//! let config = LogConfig::new()
//!     .with_format(LogFormat::Json)
//!     .with_default_level(LogLevel::Info);
//! init_tracing_with_config(config).unwrap();
//!
//! leadtime_observability::log_banner("committime", env!("CARGO_PKG_VERSION"));
//! tracing::info!(app = "checkout", namespace = "shop", "Published record");
//! ```

pub mod banner;
pub mod config;
pub mod initialization;

pub use banner::{banner, log_banner, BuildInfo};
pub use config::{LogConfig, LogError, LogFormat, LogLevel, LogOutput};
pub use initialization::{init_tracing, init_tracing_with_config};
