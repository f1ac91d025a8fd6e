//! CLI argument definitions for solwatch.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `fetch` | One-shot fetch of recent transactions for addresses |
//! | `watch` | Keep polling addresses and stream snapshots |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--rpc-url` | `SOLWATCH_RPC_URL` or mainnet-beta | JSON-RPC endpoint |
//! | `--depth` | `10` | History depth per address |
//! | `--interval-secs` | `10` | Poll interval for `watch` |
//! | `--timeout-ms` | `3000` | Per-request timeout |
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--mock` | `false` | Use the offline fixture provider |
//!
//! # Examples
//!
//! ```bash
//! solwatch fetch So11111111111111111111111111111111111111112 --pretty
//! solwatch watch So11111111111111111111111111111111111111112 --interval-secs 5
//! solwatch --mock watch So11111111111111111111111111111111111111112 --cycles 3
//! ```

use clap::{Args, Parser, Subcommand};

/// Solana multi-address transaction monitor.
#[derive(Debug, Parser)]
#[command(
    name = "solwatch",
    author,
    version,
    about = "Monitor recent transactions of Solana addresses"
)]
pub struct Cli {
    /// JSON-RPC endpoint; overrides SOLWATCH_RPC_URL / HELIUS_RPC_URL.
    #[arg(long, global = true)]
    pub rpc_url: Option<String>,

    /// Transactions kept per address; overrides SOLWATCH_HISTORY_DEPTH.
    #[arg(long, global = true)]
    pub depth: Option<usize>,

    /// Seconds between polls; overrides SOLWATCH_POLL_INTERVAL_SECS.
    #[arg(long, global = true)]
    pub interval_secs: Option<u64>,

    /// Per-request timeout in milliseconds.
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Serve deterministic synthetic data instead of calling the network.
    #[arg(long, global = true, default_value_t = false)]
    pub mock: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch recent transactions once and print them.
    ///
    /// # Examples
    ///
    ///   solwatch fetch So11111111111111111111111111111111111111112
    ///   solwatch fetch <ADDR> <ADDR> --depth 25 --pretty
    Fetch(FetchArgs),

    /// Poll addresses and print one NDJSON snapshot per interval.
    ///
    /// Stops on Ctrl-C or after `--cycles` intervals, then prints the final
    /// state of every address.
    ///
    /// # Examples
    ///
    ///   solwatch watch So11111111111111111111111111111111111111112
    ///   solwatch watch <ADDR> <ADDR> --interval-secs 5 --cycles 12
    Watch(WatchArgs),
}

#[derive(Debug, Args)]
pub struct FetchArgs {
    /// Base58 account addresses.
    #[arg(required = true)]
    pub addresses: Vec<String>,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Base58 account addresses.
    #[arg(required = true)]
    pub addresses: Vec<String>,

    /// Stop after this many poll intervals.
    #[arg(long)]
    pub cycles: Option<u64>,
}
