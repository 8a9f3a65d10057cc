//! stanscale — command-line controller for the STAN autoscaling signal.
//!
//! Loads a trigger file, builds a `StanScaler` and either answers one
//! question or keeps polling like an autoscaling controller would.
//!
//! # Usage
//!
//! ```text
//! stanscale --config trigger.toml check-active
//! stanscale --config trigger.toml metric-value --format prometheus
//! stanscale --config trigger.toml watch --interval 30s
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde_json::{json, Map, Value};
use tokio::sync::watch;
use tracing::{info, warn};

use stanscale::{
    render_prometheus, ExternalMetricValue, MetricSelector, PollContext, Scaler, ScalerResult,
    StanScaler,
};

mod trigger;

use trigger::{parse_duration, TriggerFile};

#[derive(Parser)]
#[command(
    name = "stanscale",
    about = "Autoscaling signal for NATS Streaming durable queue groups",
    version
)]
struct Cli {
    /// Trigger file (TOML) with metadata and auth params.
    #[arg(short, long, global = true, default_value = "trigger.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Report whether the workload should be active.
    CheckActive,
    /// Print the external metric definition.
    MetricSpec,
    /// Fetch the current lag metric.
    MetricValue {
        /// Output format: json or prometheus
        #[arg(short, long, default_value = "json")]
        format: String,
    },
    /// Poll activation and lag until interrupted.
    Watch {
        /// Polling interval, e.g. "30s", "500ms", "1m".
        #[arg(short, long, default_value = "30s")]
        interval: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,stanscale=debug".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let trigger = TriggerFile::from_file(&cli.config)?;
    let scaler = StanScaler::new(&trigger.to_scaler_config()?)
        .context("failed to create STAN scaler")?;

    let result = match cli.command {
        Command::CheckActive => check_active(&scaler).await,
        Command::MetricSpec => metric_spec(&scaler),
        Command::MetricValue { format } => metric_value(&scaler, &format).await,
        Command::Watch { interval } => {
            let interval = parse_duration(&interval)
                .with_context(|| format!("invalid interval {interval:?}"))?;
            watch_loop(&scaler, interval).await
        }
    };

    scaler.close(&PollContext::new()).await?;
    result
}

async fn check_active(scaler: &StanScaler) -> anyhow::Result<()> {
    let active = scaler.is_active(&PollContext::new()).await?;
    println!("{}", json!({ "active": active }));
    Ok(())
}

fn metric_spec(scaler: &StanScaler) -> anyhow::Result<()> {
    let specs = scaler.metric_specs(&PollContext::new());
    println!("{}", serde_json::to_string_pretty(&specs)?);
    Ok(())
}

async fn metric_value(scaler: &StanScaler, format: &str) -> anyhow::Result<()> {
    let values = scaler
        .metric_values(&PollContext::new(), &scaler.metric_name(), &MetricSelector::new())
        .await?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&values)?),
        "prometheus" => print!("{}", render_prometheus(&values)),
        other => bail!("unknown format {other:?}, expected json or prometheus"),
    }
    Ok(())
}

/// Controller-style polling: both questions every interval, errors logged
/// and retried on the next tick.
async fn watch_loop(scaler: &StanScaler, interval: Duration) -> anyhow::Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for ctrl-c");
                // Keep the sender alive so the loop does not see a shutdown.
                std::future::pending::<()>().await;
            }
        }
    });

    let metric_name = scaler.metric_name();
    let selector = MetricSelector::new();
    let mut shutdown = shutdown_rx.clone();

    info!(
        interval_ms = interval.as_millis() as u64,
        metric = %metric_name,
        "watching STAN channel"
    );

    loop {
        let ctx = PollContext::new().with_cancel(shutdown_rx.clone());
        let (active, values) = tokio::join!(
            scaler.is_active(&ctx),
            scaler.metric_values(&ctx, &metric_name, &selector)
        );

        if let Some(report) = poll_report(active, values) {
            println!("{report}");
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown.changed() => {
                info!("watch shutting down");
                break;
            }
        }
    }

    Ok(())
}

/// One watch tick as a JSON line. Each half is reported on its own, so a
/// failed metric read does not hide a good activation answer. A missing
/// channel reads as inactive. `None` when neither half produced anything.
fn poll_report(
    active: ScalerResult<bool>,
    values: ScalerResult<Vec<ExternalMetricValue>>,
) -> Option<Value> {
    let mut report = Map::new();

    match active {
        Ok(active) => {
            report.insert("active".into(), json!(active));
        }
        Err(e) if e.is_channel_not_found() => {
            info!(error = %e, "channel not found, reporting inactive");
            report.insert("active".into(), json!(false));
        }
        Err(e) => warn!(error = %e, "activation check failed"),
    }

    match values {
        Ok(values) => {
            let lag = values.first().map(|v| v.value()).unwrap_or_default();
            info!(lag, "metric read");
            report.insert("metrics".into(), json!(values));
        }
        Err(e) if e.is_channel_not_found() => {
            info!(error = %e, "channel not found, no metric");
        }
        Err(e) => warn!(error = %e, "metric read failed"),
    }

    (!report.is_empty()).then_some(Value::Object(report))
}
