//! Pushes Prometheus query results to Statuspage metrics.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::watch;
use tracing::{info, Level};

use statuspage_pusher::config::{parse_duration, parse_log_level, PusherConfig, QueryConfig};
use statuspage_pusher::logging::{init_logging, LoggingConfig};
use statuspage_pusher::point::DEFAULT_PRECISION;
use statuspage_pusher::scheduler::Scheduler;
use statuspage_pusher::sink::{StatuspageClient, StatuspageConfig, DEFAULT_API_BASE};
use statuspage_pusher::source::{PrometheusClient, PrometheusConfig};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// URL of Prometheus server
    #[arg(long, env = "PROMETHEUS_URL", default_value = "http://localhost:9090")]
    prometheus_url: String,

    /// Statuspage API key
    #[arg(long, env = "STATUSPAGE_API_KEY", hide_env_values = true)]
    statuspage_api_key: String,

    /// Statuspage page ID
    #[arg(long, env = "STATUSPAGE_PAGE_ID")]
    statuspage_page_id: String,

    /// Statuspage API root
    #[arg(long, env = "STATUSPAGE_API_BASE", default_value = DEFAULT_API_BASE)]
    statuspage_api_base: String,

    /// Query config file
    #[arg(long, env = "CONFIG", default_value = "queries.yaml")]
    config: PathBuf,

    /// Metric push interval
    #[arg(long, env = "INTERVAL", default_value = "30s", value_parser = parse_duration)]
    interval: Duration,

    /// Round metric values to specific decimal places
    #[arg(long, env = "ROUNDING", default_value_t = DEFAULT_PRECISION)]
    rounding: u32,

    /// Backfill the data points in, for example, 5d
    #[arg(long, env = "BACKFILL", value_parser = parse_duration)]
    backfill: Option<Duration>,

    /// Log level, for example "error", "warn", "info", "debug"
    #[arg(long, env = "LOG_LEVEL", default_value = "info", value_parser = parse_log_level)]
    log_level: Level,

    /// Emit logs as JSON
    #[arg(long, env = "JSON_LOGS")]
    json_logs: bool,

    /// Timeout for each HTTP request
    #[arg(long, env = "TIMEOUT", default_value = "30s", value_parser = parse_duration)]
    timeout: Duration,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(LoggingConfig::new(args.log_level).with_json_format(args.json_logs))
        .map_err(|e| anyhow::anyhow!(e))
        .context("Couldn't initialize logging")?;

    let queries = QueryConfig::from_file(&args.config)?;
    info!(
        path = %args.config.display(),
        metrics = queries.len(),
        "Loaded query config"
    );

    let source = PrometheusClient::new(
        PrometheusConfig::new(args.prometheus_url).with_timeout(args.timeout),
    )?;
    let sink = StatuspageClient::new(
        StatuspageConfig::new(args.statuspage_api_key, args.statuspage_page_id)
            .with_api_base(args.statuspage_api_base)
            .with_timeout(args.timeout),
    )?;

    let config = PusherConfig::new(queries)
        .with_interval(args.interval)
        .with_rounding(args.rounding)
        .with_backfill(args.backfill);
    let scheduler = Scheduler::from_config(config, Arc::new(source), Arc::new(sink))?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    scheduler.run(shutdown_rx).await;
    Ok(())
}
