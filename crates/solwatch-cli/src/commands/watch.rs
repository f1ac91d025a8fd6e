use std::process::ExitCode;
use std::sync::Arc;

use solwatch_core::{LedgerSource, MonitorConfig, MonitorSession, Registration, TickOutcome};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{info, warn};

use crate::cli::WatchArgs;
use crate::error::CliError;
use crate::output::{self, FramePhase, WatchFrame};

pub async fn run(
    args: &WatchArgs,
    source: Arc<dyn LedgerSource>,
    config: &MonitorConfig,
) -> Result<ExitCode, CliError> {
    let session = MonitorSession::new(source, config)?;

    for address in &args.addresses {
        match session.register(address).await? {
            Registration::Registered(TickOutcome::Failed(error)) => {
                warn!(%address, error = %error.cause, "first fetch failed; will retry on the next poll");
            }
            Registration::Registered(_) => {}
            Registration::AlreadyActive => info!(%address, "duplicate address ignored"),
        }
    }

    output::emit_line(&WatchFrame::new(FramePhase::Poll, 0, session.snapshot().await))?;

    // Sample halfway between scheduled passes.
    let period = session.poll_interval();
    let mut ticker = time::interval_at(Instant::now() + period + period / 2, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut cycle = 0;
    let interrupted = loop {
        if args.cycles.is_some_and(|limit| cycle >= limit) {
            break false;
        }
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break true;
            }
            _ = ticker.tick() => {
                cycle += 1;
                output::emit_line(&WatchFrame::new(FramePhase::Poll, cycle, session.snapshot().await))?;
            }
        }
    };

    if interrupted {
        info!(cycles = cycle, "interrupted; shutting down");
    }
    let final_state = session.shutdown().await;
    output::emit_line(&WatchFrame::new(FramePhase::Final, cycle, final_state))?;

    Ok(ExitCode::SUCCESS)
}
