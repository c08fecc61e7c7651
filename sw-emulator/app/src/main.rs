/*++

Licensed under the Apache-2.0 license.

File Name:

    main.rs

Abstract:

    File contains main entrypoint for the DMA engine emulator host test.

--*/

mod cli;
mod driver;

use anyhow::Context;
use clap::Parser;
use cli::Args;
use dma_emu_periph::{DmaAfu, DmaAfuArgs};
use driver::HostDriver;
use log::LevelFilter;
use simple_logger::SimpleLogger;
use std::path::Path;
use std::process::exit;

fn load_config(path: Option<&Path>) -> anyhow::Result<DmaAfuArgs> {
    let Some(path) = path else {
        return Ok(DmaAfuArgs::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn run(args: &Args) -> anyhow::Result<bool> {
    let config = load_config(args.config.as_deref())?;
    let clock_mhz = config.clock_mhz;
    let afu = DmaAfu::new(config).context("invalid engine configuration")?;
    let mut driver = HostDriver::new(afu, clock_mhz, args.watchdog_cycles);

    if args.print_csrs {
        driver.print_csrs()?;
    }
    let report = driver.run_basic_ddr_dma_test(args.transfer_size, args.min_bandwidth)?;
    if args.print_csrs {
        driver.print_csrs()?;
    }

    println!(
        "Average bandwidth: host to DDR {:.6} GB/s, DDR to host {:.6} GB/s",
        report.host_to_ddr.average(),
        report.ddr_to_host.average()
    );
    if report.mismatches > 0 {
        log::error!("{} words differ after the round trip", report.mismatches);
        return Ok(false);
    }
    log::info!(
        "Copied {} bytes in {} cycles",
        args.transfer_size,
        driver.bus().cycle()
    );
    Ok(true)
}

fn main() {
    let args = Args::parse();
    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let _ = SimpleLogger::new().with_level(level).init();

    match run(&args) {
        Ok(true) => println!("Test PASSED"),
        Ok(false) => {
            println!("Test FAILED");
            exit(1);
        }
        Err(err) => {
            log::error!("{err:#}");
            println!("Test FAILED");
            exit(1);
        }
    }
}
