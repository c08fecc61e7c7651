// Licensed under the Apache-2.0 license

use clap::Parser;
use std::path::PathBuf;

/// Cycles the host waits for one descriptor before giving up.
pub const DEFAULT_WATCHDOG_CYCLES: u64 = 10_000_000;

/// Lowest bandwidth the copy test accepts for either direction.
pub const MIN_BANDWIDTH_GBPS: f64 = 8.2;

#[derive(Parser, Debug)]
#[command(author, version, about = "DMA engine emulator host test", long_about = None)]
pub struct Args {
    /// Bytes to copy in each direction. Must be a multiple of 64
    #[arg(short, long, default_value_t = 64 * 1024)]
    pub transfer_size: u64,

    /// TOML file with engine and memory parameters
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Minimum acceptable bandwidth in GB/s
    #[arg(long, default_value_t = MIN_BANDWIDTH_GBPS)]
    pub min_bandwidth: f64,

    /// Watchdog timeout in engine clock cycles
    #[arg(long, default_value_t = DEFAULT_WATCHDOG_CYCLES)]
    pub watchdog_cycles: u64,

    /// Dump the CSRs before and after the test
    #[arg(long)]
    pub print_csrs: bool,

    /// Debug logging
    #[arg(short, long)]
    pub verbose: bool,
}
