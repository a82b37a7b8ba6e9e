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
//! Leadtime Metrics Module
//!
//! Prometheus exposition for the delivery timestamps produced by an exporter,
//! plus a handful of self-metrics describing the exporter's own health.
//!
//! # Key Metrics
//!
//! - `commit_timestamp{namespace,app,commit,image_sha}`
//! - `deploy_timestamp{namespace,app,image_sha}`
//! - `failure_creation_timestamp{app,issue_number}`
//! - `leadtime_*` counters for published, rejected and skipped records
//!
//! # Example
//!
//! ```no_run
//! use leadtime_metrics::{MetricsRegistry, MetricsServer};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let registry = MetricsRegistry::new()?;
//!
//!     let server = MetricsServer::new(registry.clone(), 8080);
//!     tokio::spawn(server.serve(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     }));
//!
//!     // Hand `registry` to the exporter as its MetricSink
//!     Ok(())
//! }
//! ```

pub mod registry;
pub mod server;
pub mod types;

pub use registry::MetricsRegistry;
pub use server::MetricsServer;
pub use types::MetricsConfig;

// Re-export prometheus types for convenience
pub use prometheus::{Encoder, TextEncoder};
