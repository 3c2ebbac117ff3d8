mod allocation;
mod cli;
mod config;
mod error;
mod fanout;
mod format;
mod k8s;
mod model;
mod quantity;
mod report;
mod resources;
mod table;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{CliArgs, Command, NodeArgs, PodArgs};
use config::ViewConfig;
use error::ViewError;
use format::RowStyle;
use k8s::KubeGateway;
use std::io::IsTerminal;
use std::sync::Arc;
use tokio::time::{Duration, Instant};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_tracing(&args.log_filter)?;

    let config = ViewConfig::load()?;
    let timeout = Duration::from_secs(args.timeout_secs.unwrap_or(config.timeout_secs));

    match &args.command {
        Command::Node(node) => run_node(args.context.clone(), node, &config, timeout).await,
        Command::Pod(pod) => run_pod(args.context.clone(), pod, &config, timeout).await,
    }
}

fn init_tracing(level_filter: &str) -> Result<()> {
    let filter = EnvFilter::try_new(level_filter)
        .or_else(|_| EnvFilter::try_new("info"))
        .context("failed to initialize tracing filter")?;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .with_writer(std::io::stderr)
        .try_init();

    Ok(())
}

async fn run_node(
    context: Option<String>,
    args: &NodeArgs,
    config: &ViewConfig,
    timeout: Duration,
) -> Result<()> {
    let query = args.query(config)?;
    let plain = args.plain(config);

    let gateway = Arc::new(KubeGateway::new(context).await?);
    let deadline = Instant::now() + timeout;
    debug!(?query, ?timeout, "node report");

    let rows = report::node_report(gateway, &query, row_style(plain), deadline)
        .await
        .map_err(report_failure)?;
    if rows.is_empty() {
        eprintln!("No resources found");
        return Ok(());
    }
    println!(
        "{}",
        table::render(table::node_header(&query.dimensions), rows, plain)
    );
    Ok(())
}

async fn run_pod(
    context: Option<String>,
    args: &PodArgs,
    config: &ViewConfig,
    timeout: Duration,
) -> Result<()> {
    let plan = args.plan(config)?;
    let plain = args.plain(config);

    let gateway = Arc::new(KubeGateway::new(context).await?);
    let query = plan.into_query(gateway.default_namespace());
    let deadline = Instant::now() + timeout;
    debug!(?query, ?timeout, "pod report");

    let rows = report::pod_report(gateway, &query, row_style(plain), deadline)
        .await
        .map_err(report_failure)?;
    if rows.is_empty() {
        eprintln!("{}", report::no_resources_message(&query.scope));
        return Ok(());
    }
    println!(
        "{}",
        table::render(table::pod_header(&query.dimensions), rows, plain)
    );
    Ok(())
}

fn report_failure(error: ViewError) -> anyhow::Error {
    if error.is_timeout() {
        warn!("the deadline can be raised with --timeout-secs");
    }
    error.into()
}

fn row_style(plain: bool) -> RowStyle {
    if !plain && std::io::stdout().is_terminal() {
        RowStyle::colored()
    } else {
        RowStyle::plain()
    }
}
