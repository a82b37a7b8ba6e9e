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
//! Wiring for the `leadtime-exporter` binary
//!
//! Kept apart from `main.rs` so start-up can be exercised in tests without
//! installing a global subscriber or binding a port.

use anyhow::{Context, Result};
use clap::Parser;
use leadtime_config::{Config, ConfigLoader, EnvSource, ObservabilityConfig, Validator};
use leadtime_core::{Exporter, MetricSink, Resolver};
use leadtime_observability::{LogConfig, LogFormat, LogLevel};
use leadtime_providers::{build_lister, build_policy};
use std::path::PathBuf;
use std::sync::Arc;

/// Command-line flags; they win over the file and the environment
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "leadtime-exporter")]
#[command(version, about = "Export software delivery timestamps as Prometheus metrics")]
#[command(
    long_about = "Watches a set of workloads and publishes when each was committed, deployed \
or failed, so lead time and deployment frequency can be computed in Prometheus."
)]
pub struct Cli {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long, value_name = "PATH", env = "LEADTIME_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARNING, ERROR, CRITICAL); overrides RUST_LOG
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Log format (pretty, compact, json)
    #[arg(long, value_name = "FORMAT")]
    pub log_format: Option<String>,

    /// Run a single cycle, print its report as JSON and exit
    #[arg(long)]
    pub once: bool,
}

/// Load the file, apply environment then CLI overrides, and validate
pub async fn load_config(cli: &Cli, env: &dyn EnvSource) -> Result<Config> {
    let mut config = ConfigLoader::without_validation()
        .load_with_env(cli.config.as_deref(), env)
        .await
        .context("Failed to load configuration")?;

    if let Some(level) = &cli.log_level {
        config.observability.log_level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.observability.log_format = format.clone();
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Logging setup for the configured level and format.
///
/// A level from the command line is explicit and beats `RUST_LOG`; one from
/// the file or environment only applies when `RUST_LOG` is unset.
pub fn log_config(observability: &ObservabilityConfig, explicit_level: bool) -> Result<LogConfig> {
    let level: LogLevel = observability.log_level.parse()?;
    let format: LogFormat = observability.log_format.parse()?;

    let mut config = LogConfig::new()
        .with_format(format)
        .with_default_level(level);
    if explicit_level {
        config = config.with_level(level.as_directive());
    }
    Ok(config)
}

/// Exporter wired to the configured manifest and provider
pub fn build_exporter(config: &Config, sink: Arc<dyn MetricSink>) -> Result<Exporter> {
    let policy = build_policy(config)
        .with_context(|| format!("Failed to set up the {} provider", config.provider.name()))?;

    Ok(Exporter::new(
        config.exporter.settings(),
        Resolver::new(config.annotations.clone()),
        policy,
        Arc::new(build_lister(config)),
        sink,
    ))
}

/// Endpoint settings for the metrics server
pub fn metrics_config(config: &Config) -> leadtime_metrics::MetricsConfig {
    let metrics = &config.observability.metrics;
    leadtime_metrics::MetricsConfig {
        port: metrics.port,
        enabled: metrics.enabled,
        bind_address: metrics.bind_address.clone(),
    }
}
