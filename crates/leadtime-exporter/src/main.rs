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
use anyhow::{Context, Result};
use clap::Parser;
use leadtime_config::SystemEnv;
use leadtime_core::MetricSink;
use leadtime_exporter::{build_exporter, load_config, log_config, metrics_config, Cli};
use leadtime_metrics::{MetricsRegistry, MetricsServer};
use leadtime_observability::{init_tracing_with_config, log_banner};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(&cli, &SystemEnv).await?;
    init_tracing_with_config(log_config(&config.observability, cli.log_level.is_some())?)?;

    let kind = format!("{}time", config.exporter.kind);
    log_banner(&kind, env!("CARGO_PKG_VERSION"));
    info!(config = ?config, "Effective configuration");

    let registry = MetricsRegistry::new().context("Failed to create metrics registry")?;
    let sink: Arc<dyn MetricSink> = Arc::new(registry.clone());
    let mut exporter = build_exporter(&config, sink)?;

    if cli.once {
        let report = exporter.run_cycle().await;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server_config = metrics_config(&config);
    let server = if server_config.enabled {
        let server = MetricsServer::with_config(registry, server_config);
        let listener = server.bind().await?;
        Some(tokio::spawn(server.serve_on(listener, async {
            let _ = stop_rx.await;
        })))
    } else {
        info!("Metrics server disabled");
        None
    };

    exporter.run(shutdown_signal()).await;

    let _ = stop_tx.send(());
    if let Some(handle) = server {
        match handle.await {
            Ok(result) => result?,
            Err(e) => warn!("Metrics server task failed: {}", e),
        }
    }

    info!("Exporter stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received Ctrl-C, shutting down");
}
