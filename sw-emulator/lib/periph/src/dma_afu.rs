/*++

Licensed under the Apache-2.0 license.

File Name:

    dma_afu.rs

Abstract:

    File contains the top level of the emulated DMA accelerator: the CSR
    block, the coordinator, the memory router and the memories behind it.

--*/

use crate::axi_mem::{AxiMemory, AxiMemoryArgs};
use crate::csr::{
    guid_halves, Config1Word, Config2Word, Control, CsrIndex, TypeVersionWord, DFH_VALUE,
    RSVD_1_VALUE, RSVD_2_VALUE,
};
use crate::descriptor::{Descriptor, DescriptorControl, DEFAULT_QUEUE_DEPTH};
use crate::dispatcher::{Coordinator, DmaStatus};
use crate::router::Router;
use dma_emu_bus::{Bus, BusError, Clock, ReadOnlyRegister, ReadWriteRegister, Register};
use dma_emu_types::{AxiBurst, AxiSize, CsrAddr, CsrData, CsrSize, DATA_WIDTH_BYTES};
use serde::Deserialize;
use thiserror::Error;
use tock_registers::interfaces::{ReadWriteable, Readable};

/// Largest depth either queue can report through CONFIG_1.
const MAX_REPORTED_DEPTH: usize = 0xffff;

/// Engine and memory configuration.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DmaAfuArgs {
    /// Transfer buffer depth in beats. Must be a power of two.
    pub fifo_depth: usize,
    /// Descriptor queue depth.
    pub queue_depth: usize,
    /// Longest burst the engine issues, in beats.
    pub max_burst: usize,
    /// Burst type of every request the engine issues.
    pub burst: AxiBurst,
    /// Engine clock, used for bandwidth figures.
    pub clock_mhz: u32,
    pub host: AxiMemoryArgs,
    /// Number of local memory banks.
    pub banks: usize,
    /// Parameters shared by every local bank.
    pub bank: AxiMemoryArgs,
}

impl Default for DmaAfuArgs {
    fn default() -> Self {
        Self {
            fifo_depth: 128,
            queue_depth: DEFAULT_QUEUE_DEPTH,
            max_burst: 64,
            burst: AxiBurst::Incr,
            clock_mhz: 400,
            host: AxiMemoryArgs::default(),
            banks: 2,
            bank: AxiMemoryArgs::default(),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("transfer buffer depth {0} is not a power of two up to 65536")]
    FifoDepth(usize),
    #[error("descriptor queue depth {0} is out of range")]
    QueueDepth(usize),
    #[error("max burst of {0} beats is out of range 1..=256")]
    MaxBurst(usize),
    #[error("the engine cannot issue {0:?} bursts")]
    Burst(AxiBurst),
    #[error("clock frequency must be non-zero")]
    ClockMhz,
    #[error("local bank count {0} is out of range 1..=255")]
    Banks(usize),
    #[error("{name} memory size {size:#x} is not a non-zero multiple of 64 bytes")]
    MemorySize { name: &'static str, size: usize },
    #[error("{name} memory stall percentage {percent} is above 100")]
    StallPercent { name: &'static str, percent: u8 },
}

impl DmaAfuArgs {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.fifo_depth.is_power_of_two() || self.fifo_depth > MAX_REPORTED_DEPTH + 1 {
            return Err(ConfigError::FifoDepth(self.fifo_depth));
        }
        if self.queue_depth == 0 || self.queue_depth > MAX_REPORTED_DEPTH {
            return Err(ConfigError::QueueDepth(self.queue_depth));
        }
        if !(1..=256).contains(&self.max_burst) {
            return Err(ConfigError::MaxBurst(self.max_burst));
        }
        if !matches!(self.burst, AxiBurst::Incr | AxiBurst::Wrap) {
            return Err(ConfigError::Burst(self.burst));
        }
        if self.clock_mhz == 0 {
            return Err(ConfigError::ClockMhz);
        }
        if !(1..=255).contains(&self.banks) {
            return Err(ConfigError::Banks(self.banks));
        }
        for (name, mem) in [("host", &self.host), ("bank", &self.bank)] {
            if mem.size == 0 || mem.size % DATA_WIDTH_BYTES != 0 {
                return Err(ConfigError::MemorySize {
                    name,
                    size: mem.size,
                });
            }
            if mem.stall_percent > 100 {
                return Err(ConfigError::StallPercent {
                    name,
                    percent: mem.stall_percent,
                });
            }
        }
        Ok(())
    }

    fn config_1(&self) -> u64 {
        let mut word = Config1Word(0);
        word.set_buffer_depth(self.fifo_depth.min(MAX_REPORTED_DEPTH) as u64);
        word.set_queue_depth(self.queue_depth as u64);
        word.set_max_burst_len(self.max_burst as u64 - 1);
        word.set_size(AxiSize::from_bytes(DATA_WIDTH_BYTES).encoding().unwrap_or_default() as u64);
        word.set_incr(true);
        word.set_wrap(true);
        word.set_fixed(false);
        word.0
    }

    fn config_2(&self) -> u64 {
        let mut word = Config2Word(0);
        word.set_banks(self.banks as u64);
        word.set_bank_lines((self.bank.size / DATA_WIDTH_BYTES) as u64);
        word.0
    }
}

/// Emulated DMA accelerator function.
pub struct DmaAfu {
    clock: Clock,
    clock_mhz: u32,
    router: Router,
    coord: Coordinator,

    dfh: ReadOnlyRegister,
    guid_l: ReadOnlyRegister,
    guid_h: ReadOnlyRegister,
    rsvd_1: ReadOnlyRegister,
    rsvd_2: ReadOnlyRegister,
    src_addr: ReadWriteRegister,
    dest_addr: ReadWriteRegister,
    length: ReadWriteRegister,
    descriptor_control: ReadWriteRegister<DescriptorControl::Register>,
    control: ReadWriteRegister<Control::Register>,
    config_1: ReadOnlyRegister,
    config_2: ReadOnlyRegister,
    type_version: ReadOnlyRegister,
}

impl DmaAfu {
    pub fn new(args: DmaAfuArgs) -> Result<Self, ConfigError> {
        args.validate()?;
        let clock = Clock::new();
        let banks = (0..args.banks)
            .map(|i| AxiMemory::new(&format!("bank{i}"), clock.timer(), args.bank.clone()))
            .collect();
        let router = Router::new(
            AxiMemory::new("host", clock.timer(), args.host.clone()),
            banks,
            args.bank.size as u64,
        );
        let coord = Coordinator::new(
            args.queue_depth,
            args.fifo_depth,
            args.max_burst,
            args.burst,
            *router.layout(),
        );
        let (guid_l, guid_h) = guid_halves();
        log::debug!(
            "dma_afu: {} banks of {:#x} bytes, buffer depth {}, max burst {}",
            args.banks,
            args.bank.size,
            args.fifo_depth,
            args.max_burst
        );
        Ok(Self {
            clock,
            clock_mhz: args.clock_mhz,
            router,
            coord,
            dfh: ReadOnlyRegister::new(DFH_VALUE),
            guid_l: ReadOnlyRegister::new(guid_l),
            guid_h: ReadOnlyRegister::new(guid_h),
            rsvd_1: ReadOnlyRegister::new(RSVD_1_VALUE),
            rsvd_2: ReadOnlyRegister::new(RSVD_2_VALUE),
            src_addr: ReadWriteRegister::new(0),
            dest_addr: ReadWriteRegister::new(0),
            length: ReadWriteRegister::new(0),
            descriptor_control: ReadWriteRegister::new(0),
            control: ReadWriteRegister::new(0),
            config_1: ReadOnlyRegister::new(args.config_1()),
            config_2: ReadOnlyRegister::new(args.config_2()),
            type_version: ReadOnlyRegister::new(TypeVersionWord::current().0),
        })
    }

    /// Advance the engine by one clock cycle.
    pub fn step(&mut self) {
        self.coord.step(&mut self.router);
        self.clock.increment(1);
    }

    pub fn run(&mut self, cycles: u64) {
        for _ in 0..cycles {
            self.step();
        }
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn cycle(&self) -> u64 {
        self.clock.now()
    }

    pub fn clock_mhz(&self) -> u32 {
        self.clock_mhz
    }

    pub fn status(&self) -> DmaStatus {
        self.coord.status()
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coord
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn host_memory(&self) -> &AxiMemory {
        self.router.host()
    }

    pub fn host_memory_mut(&mut self) -> &mut AxiMemory {
        self.router.host_mut()
    }

    pub fn bank_memory(&self, bank: usize) -> Option<&AxiMemory> {
        self.router.memory(bank + 1)
    }

    pub fn bank_memory_mut(&mut self, bank: usize) -> Option<&mut AxiMemory> {
        self.router.memory_mut(bank + 1)
    }

    /// Protocol violations seen by every memory port.
    pub fn protocol_violations(&self) -> u64 {
        self.router.protocol_violations()
    }

    fn read_csr(&self, index: CsrIndex) -> Result<CsrData, BusError> {
        let size = CsrSize::DoubleWord;
        match index {
            CsrIndex::Dfh => self.dfh.read(size),
            CsrIndex::GuidL => self.guid_l.read(size),
            CsrIndex::GuidH => self.guid_h.read(size),
            CsrIndex::Rsvd1 => self.rsvd_1.read(size),
            CsrIndex::Rsvd2 => self.rsvd_2.read(size),
            CsrIndex::SrcAddr => self.src_addr.read(size),
            CsrIndex::DestAddr => self.dest_addr.read(size),
            CsrIndex::Length => self.length.read(size),
            CsrIndex::DescriptorControl => self.descriptor_control.read(size),
            CsrIndex::Status => Ok(self.coord.status().to_bits()),
            CsrIndex::Control => self.control.read(size),
            CsrIndex::WrReFillLevel => Ok(self.coord.fill_level_word()),
            CsrIndex::RespFillLevel => Ok(self.coord.resp_fill_level()),
            CsrIndex::WrReSeqNum => Ok(self.coord.seq_num_word()),
            CsrIndex::Config1 => self.config_1.read(size),
            CsrIndex::Config2 => self.config_2.read(size),
            CsrIndex::TypeVersion => self.type_version.read(size),
            CsrIndex::RdSrcPerfCntr => Ok(self.coord.rd_perf().to_bits()),
            CsrIndex::WrDestPerfCntr => Ok(self.coord.wr_perf().to_bits()),
            CsrIndex::Invalid => Ok(0),
        }
    }

    fn write_csr(&mut self, index: CsrIndex, val: CsrData) -> Result<(), BusError> {
        if !index.is_writable() {
            log::debug!("dma_afu: ignored write of {val:#x} to {index}");
            return Ok(());
        }
        let size = CsrSize::DoubleWord;
        match index {
            CsrIndex::SrcAddr => self.src_addr.write(size, val),
            CsrIndex::DestAddr => self.dest_addr.write(size, val),
            CsrIndex::Length => self.length.write(size, val),
            CsrIndex::DescriptorControl => {
                self.descriptor_control.write(size, val)?;
                if self.descriptor_control.reg.is_set(DescriptorControl::GO) {
                    self.go();
                    self.descriptor_control.reg.modify(DescriptorControl::GO::CLEAR);
                }
                Ok(())
            }
            CsrIndex::Control => {
                self.control.write(size, val)?;
                if self.control.reg.is_set(Control::RESET_DISPATCHER) {
                    log::info!("dma_afu: reset dispatcher requested");
                    self.coord.request_reset();
                    self.control.reg.modify(Control::RESET_DISPATCHER::CLEAR);
                }
                self.coord
                    .set_stop_descriptors(self.control.reg.is_set(Control::STOP_DESCRIPTORS));
                Ok(())
            }
            // Read-only registers were filtered above.
            _ => Ok(()),
        }
    }

    /// Latch the descriptor registers and hand them to the coordinator.
    fn go(&mut self) {
        let desc = Descriptor {
            src_addr: self.src_addr.reg.get(),
            dest_addr: self.dest_addr.reg.get(),
            length: self.length.reg.get(),
            control: self.descriptor_control.reg.get(),
        };
        // Rejections are logged and reflected in STATUS.
        let _ = self.coord.submit(desc);
    }
}

impl Bus for DmaAfu {
    fn read(&mut self, size: CsrSize, addr: CsrAddr) -> Result<CsrData, BusError> {
        match size {
            CsrSize::DoubleWord => {
                if addr % 8 != 0 {
                    return Err(BusError::LoadAddrMisaligned);
                }
                self.read_csr(CsrIndex::from_offset(addr))
            }
            CsrSize::Word => {
                if addr % 4 != 0 {
                    return Err(BusError::LoadAddrMisaligned);
                }
                let val = self.read_csr(CsrIndex::from_offset(addr & !7))?;
                Ok((val >> ((addr & 4) * 8)) & 0xffff_ffff)
            }
            CsrSize::Invalid => Err(BusError::LoadAccessFault),
        }
    }

    fn write(&mut self, size: CsrSize, addr: CsrAddr, val: CsrData) -> Result<(), BusError> {
        match size {
            CsrSize::DoubleWord => {
                if addr % 8 != 0 {
                    return Err(BusError::StoreAddrMisaligned);
                }
                self.write_csr(CsrIndex::from_offset(addr), val)
            }
            _ => Err(BusError::StoreAccessFault),
        }
    }

    fn poll(&mut self) {
        self.step();
    }
}
