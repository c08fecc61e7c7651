/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains exports for the DMA Emulator Types library.

--*/

mod axi;
mod macros;

pub use crate::axi::{AxiBurst, AxiResp, AxiSize, AXI_4K_BOUNDARY};

/// CSR data width. Every engine register is 64 bits wide.
pub type CsrData = u64;

/// Byte offset into the CSR space.
pub type CsrAddr = u32;

/// Byte address on a memory port.
pub type AxiAddr = u64;

/// Width of one data beat on the memory ports (512 bits).
pub const DATA_WIDTH_BYTES: usize = 64;

emu_enum!(
    /// MMIO access size
    #[derive(Debug, Eq, PartialEq, Copy, Clone)]
    pub CsrSize;
    usize;
    {
        Word = 4,
        DoubleWord = 8,
    };
    Invalid
);
