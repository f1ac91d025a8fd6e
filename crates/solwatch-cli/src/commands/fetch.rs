use std::process::ExitCode;
use std::sync::Arc;

use solwatch_core::{LedgerSource, MonitorConfig, MonitorFeed, MonitorRequest};
use tracing::warn;

use crate::cli::FetchArgs;
use crate::error::CliError;
use crate::output;

pub async fn run(
    args: &FetchArgs,
    source: Arc<dyn LedgerSource>,
    config: &MonitorConfig,
    pretty: bool,
) -> Result<ExitCode, CliError> {
    let feed = MonitorFeed::new(source, config);
    let request = MonitorRequest::new(args.addresses.iter().cloned());

    let response = feed.handle(&request).await?;
    output::render(&response, pretty)?;

    if response.has_failures() {
        for error in &response.errors {
            warn!(address = %error.address, code = %error.code, "{}", error.message);
        }
        return Err(CliError::WalletsFailed {
            failed: response.errors.len(),
            total: response.wallets.len(),
        });
    }

    Ok(ExitCode::SUCCESS)
}
