/*++

Licensed under the Apache-2.0 license.

File Name:

    driver.rs

Abstract:

    File contains the host side of the DMA test: descriptor submission over
    the CSR interface, completion polling and bandwidth figures.

--*/

use anyhow::{bail, ensure, Context};
use dma_emu_bus::Bus;
use dma_emu_periph::csr::{Control, CsrIndex};
use dma_emu_periph::{Descriptor, DmaAfu, DmaMode, DmaStatus, PerfCntrWord};
use dma_emu_types::{CsrSize, DATA_WIDTH_BYTES};

/// Host address of the test buffer.
pub const HOST_BUFFER_ADDR: u64 = 0;

/// Local address the test buffer is copied to.
pub const DDR_BUFFER_ADDR: u64 = 0;

/// Read and write bandwidth of one transfer, from the perf counters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bandwidth {
    pub read_gbps: f64,
    pub write_gbps: f64,
}

impl Bandwidth {
    pub fn average(&self) -> f64 {
        (self.read_gbps + self.write_gbps) / 2.0
    }
}

/// Outcome of `run_basic_ddr_dma_test`.
#[derive(Clone, Copy, Debug)]
pub struct TestReport {
    pub host_to_ddr: Bandwidth,
    pub ddr_to_host: Bandwidth,
    pub mismatches: usize,
}

/// GB/s moved by a direction that accepted a beat on `uptime` of its active
/// cycles.
pub fn bandwidth_gbps(uptime: f64, clock_mhz: u32) -> f64 {
    uptime * (DATA_WIDTH_BYTES as f64 * clock_mhz as f64) / 1000.0
}

pub struct HostDriver<B: Bus> {
    bus: B,
    clock_mhz: u32,
    watchdog_cycles: u64,
}

impl<B: Bus> HostDriver<B> {
    pub fn new(bus: B, clock_mhz: u32, watchdog_cycles: u64) -> Self {
        Self {
            bus,
            clock_mhz,
            watchdog_cycles,
        }
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    #[cfg(test)]
    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn read_csr(&mut self, index: CsrIndex) -> anyhow::Result<u64> {
        self.bus
            .read(CsrSize::DoubleWord, index.offset())
            .with_context(|| format!("reading {index}"))
    }

    pub fn write_csr(&mut self, index: CsrIndex, val: u64) -> anyhow::Result<()> {
        self.bus
            .write(CsrSize::DoubleWord, index.offset(), val)
            .with_context(|| format!("writing {val:#x} to {index}"))
    }

    pub fn status(&mut self) -> anyhow::Result<DmaStatus> {
        Ok(DmaStatus::from_bits(self.read_csr(CsrIndex::Status)?))
    }

    pub fn print_csrs(&mut self) -> anyhow::Result<()> {
        println!("AFU properties:");
        for index in CsrIndex::ALL {
            let val = self.read_csr(index)?;
            println!("  {:<22} {:016X}", format!("{index}:"), val);
        }
        println!();
        Ok(())
    }

    /// Write the descriptor registers, DESCRIPTOR_CONTROL last.
    pub fn send_descriptor(&mut self, desc: &Descriptor) -> anyhow::Result<()> {
        for (index, val) in [
            (CsrIndex::SrcAddr, desc.src_addr),
            (CsrIndex::DestAddr, desc.dest_addr),
            (CsrIndex::Length, desc.length),
            (CsrIndex::DescriptorControl, desc.control),
        ] {
            log::debug!("Writing {:X} to address {:X}", val, index.offset());
            self.write_csr(index, val)?;
        }
        Ok(())
    }

    /// Submit one descriptor and poll STATUS until the engine goes idle.
    /// Returns the cycles spent polling.
    ///
    /// A rejected descriptor is reported as an error after pulsing
    /// RESET_DISPATCHER, so the sticky DESCRIPTOR_INVALID bit does not fail
    /// the next transfer.
    pub fn dma_transfer(
        &mut self,
        mode: DmaMode,
        src: u64,
        dest: u64,
        lines: u64,
    ) -> anyhow::Result<u64> {
        let line = DATA_WIDTH_BYTES as u64;
        ensure!(
            src % line == 0 && dest % line == 0,
            "DMA addresses must be {line}-byte aligned"
        );
        let desc = Descriptor::new(src, dest, lines, mode);
        log::debug!("{:?}: {:#x} -> {:#x}, {} lines", mode, src, dest, lines);
        self.send_descriptor(&desc)?;

        for cycle in 0..self.watchdog_cycles {
            let status = self.status()?;
            if status.stopped_on_error {
                bail!(
                    "DMA stopped on error (rd_error={}, wr_error={})",
                    status.rd_error,
                    status.wr_error
                );
            }
            if status.descriptor_invalid {
                self.write_csr(CsrIndex::Control, Control::RESET_DISPATCHER::SET.value)?;
                self.bus.poll();
                bail!("descriptor rejected by the engine: {desc:x?}");
            }
            if !status.busy {
                return Ok(cycle);
            }
            self.bus.poll();
        }
        bail!(
            "DMA transfer did not complete within {} cycles",
            self.watchdog_cycles
        )
    }

    /// Decode the perf counters of the last transfer.
    pub fn bandwidth(&mut self) -> anyhow::Result<Bandwidth> {
        let rd = PerfCntrWord(self.read_csr(CsrIndex::RdSrcPerfCntr)?);
        let wr = PerfCntrWord(self.read_csr(CsrIndex::WrDestPerfCntr)?);
        Ok(Bandwidth {
            read_gbps: bandwidth_gbps(rd.uptime(), self.clock_mhz),
            write_gbps: bandwidth_gbps(wr.uptime(), self.clock_mhz),
        })
    }

    fn checked_bandwidth(&mut self, what: &str, min_gbps: f64) -> anyhow::Result<Bandwidth> {
        let bw = self.bandwidth()?;
        println!("AFU reading {what} BW = {:.6} GB/s", bw.read_gbps);
        println!("AFU writing {what} BW = {:.6} GB/s", bw.write_gbps);
        if bw.read_gbps < min_gbps || bw.write_gbps < min_gbps {
            bail!("minimum bandwidth of {min_gbps} GB/s not met during {what} transfer");
        }
        Ok(bw)
    }
}

impl HostDriver<DmaAfu> {
    /// Copy an index pattern to local memory and back, then compare.
    pub fn run_basic_ddr_dma_test(
        &mut self,
        transfer_size: u64,
        min_gbps: f64,
    ) -> anyhow::Result<TestReport> {
        let line = DATA_WIDTH_BYTES as u64;
        ensure!(
            transfer_size > 0 && transfer_size % line == 0,
            "transfer size {transfer_size} is not a non-zero multiple of {line}"
        );
        let size = transfer_size as usize;
        let bank_size = self
            .bus
            .bank_memory(0)
            .context("engine has no local memory")?
            .ram()
            .len();
        ensure!(
            size <= self.bus.host_memory().ram().len() && size <= bank_size,
            "transfer size {transfer_size:#x} does not fit in host or local memory"
        );
        let lines = transfer_size / line;
        println!("dma_len = {lines}");

        let expected: Vec<u8> = (0..size as u64 / 8).flat_map(u64::to_le_bytes).collect();
        let host = HOST_BUFFER_ADDR as usize;
        self.bus.host_memory_mut().ram_mut().data_mut()[host..host + size]
            .copy_from_slice(&expected);

        self.dma_transfer(DmaMode::HostToDdr, HOST_BUFFER_ADDR, DDR_BUFFER_ADDR, lines)
            .context("host to DDR transfer")?;
        let host_to_ddr = self.checked_bandwidth("host", min_gbps)?;

        self.bus.host_memory_mut().ram_mut().data_mut()[host..host + size].fill(0);

        self.dma_transfer(DmaMode::DdrToHost, DDR_BUFFER_ADDR, HOST_BUFFER_ADDR, lines)
            .context("DDR to host transfer")?;
        let ddr_to_host = self.checked_bandwidth("DDR", min_gbps)?;

        let actual = &self.bus.host_memory().ram().data()[host..host + size];
        let mut mismatches = 0;
        for (i, (got, want)) in actual
            .chunks_exact(8)
            .zip(expected.chunks_exact(8))
            .enumerate()
        {
            if got != want {
                if mismatches < 8 {
                    log::error!("word {i}: expected {want:02x?}, got {got:02x?}");
                }
                mismatches += 1;
            }
        }
        Ok(TestReport {
            host_to_ddr,
            ddr_to_host,
            mismatches,
        })
    }
}
