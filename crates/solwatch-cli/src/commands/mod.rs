mod fetch;
mod watch;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use solwatch_core::{FixtureSource, LedgerSource, MonitorConfig, SolanaRpcSource};
use tracing::info;

use crate::cli::{Cli, Command};
use crate::error::CliError;

pub async fn run(cli: &Cli) -> Result<ExitCode, CliError> {
    let config = resolve_config(cli)?;
    let source = build_source(cli, &config);

    match &cli.command {
        Command::Fetch(args) => fetch::run(args, source, &config, cli.pretty).await,
        Command::Watch(args) => watch::run(args, source, &config).await,
    }
}

/// Environment first, then command-line flags on top.
fn resolve_config(cli: &Cli) -> Result<MonitorConfig, CliError> {
    let mut config = MonitorConfig::from_env()?;

    if let Some(rpc_url) = &cli.rpc_url {
        config = config.with_rpc_url(rpc_url.clone());
    }
    if let Some(depth) = cli.depth {
        config = config.with_history_depth(depth);
    }
    if let Some(secs) = cli.interval_secs {
        config = config.with_poll_interval(Duration::from_secs(secs));
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        config = config.with_request_timeout(Duration::from_millis(timeout_ms));
    }

    config.validate()?;
    Ok(config)
}

fn build_source(cli: &Cli, config: &MonitorConfig) -> Arc<dyn LedgerSource> {
    if cli.mock {
        info!("using synthetic fixture provider");
        return Arc::new(FixtureSource::synthetic());
    }

    info!(rpc_url = %redact_query(&config.rpc_url), "using solana json-rpc provider");
    Arc::new(SolanaRpcSource::from_config(config))
}

/// Provider URLs often carry an API key in the query string.
fn redact_query(url: &str) -> &str {
    url.split_once('?').map_or(url, |(base, _)| base)
}
