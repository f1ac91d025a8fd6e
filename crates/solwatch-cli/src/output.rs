use std::io::{self, Write};

use serde::Serialize;
use solwatch_core::{AddressState, Snapshot, UtcDateTime};

use crate::error::CliError;

/// One line of `watch` output.
#[derive(Debug, Serialize)]
pub struct WatchFrame {
    pub phase: FramePhase,
    pub cycle: u64,
    pub at: UtcDateTime,
    pub addresses: Vec<AddressState>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FramePhase {
    Poll,
    Final,
}

impl WatchFrame {
    pub fn new(phase: FramePhase, cycle: u64, snapshot: Snapshot) -> Self {
        Self {
            phase,
            cycle,
            at: UtcDateTime::now(),
            addresses: snapshot.into_values().collect(),
        }
    }
}

pub fn render<T: Serialize>(value: &T, pretty: bool) -> Result<(), CliError> {
    let payload = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };

    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{payload}")?;
    Ok(())
}

/// Writes one NDJSON line and flushes so followers see it immediately.
pub fn emit_line<T: Serialize>(value: &T) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, value)?;
    stdout.write_all(b"\n")?;
    stdout.flush()?;
    Ok(())
}
