/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains exports for the DMA Emulator Peripheral library.

--*/

mod axi;
mod axi_mem;
pub mod csr;
mod descriptor;
mod dispatcher;
mod dma_afu;
mod perf;
mod rd_src;
mod router;
mod transfer_fifo;
mod wr_dest;

pub use axi::{
    AxiAddrReq, AxiReadChannels, AxiWriteChannels, Beat, BurstPlan, Channel, ReadBeat, WriteBeat,
    FULL_STRB,
};
pub use axi_mem::{AxiMemory, AxiMemoryArgs};
pub use descriptor::{
    Descriptor, DescriptorError, DescriptorQueue, DmaMode, LocalLayout, DEFAULT_QUEUE_DEPTH,
};
pub use dispatcher::{AdmissionError, Coordinator, DmaStatus};
pub use dma_afu::{ConfigError, DmaAfu, DmaAfuArgs};
pub use perf::{PerfCntrWord, PerfCounter, PERF_FIELD_MAX};
pub use rd_src::{RdFault, RdSrc, RdSrcState, RdSrcStatus};
pub use router::{Route, Router, HOST_PORT};
pub use transfer_fifo::{FifoFull, FifoLevel, FifoReader, FifoWriter, TransferFifo};
pub use wr_dest::{WrDest, WrDestState, WrDestStatus};
