/*++

Licensed under the Apache-2.0 license.

File Name:

    bus.rs

Abstract:

    File contains the Bus trait the host uses to reach device CSRs.

--*/

use dma_emu_types::{CsrAddr, CsrData, CsrSize};
use thiserror::Error;

/// Faults a CSR access can raise. Reads report `Load*`, writes `Store*`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Error)]
pub enum BusError {
    #[error("load address misaligned")]
    LoadAddrMisaligned,

    #[error("load access fault")]
    LoadAccessFault,

    #[error("store address misaligned")]
    StoreAddrMisaligned,

    #[error("store access fault")]
    StoreAccessFault,
}

/// Memory-mapped register window of a device.
pub trait Bus {
    /// Reads `size` bytes at CSR byte offset `addr`.
    fn read(&mut self, size: CsrSize, addr: CsrAddr) -> Result<CsrData, BusError>;

    /// Writes `val` as `size` bytes at CSR byte offset `addr`.
    fn write(&mut self, size: CsrSize, addr: CsrAddr, val: CsrData) -> Result<(), BusError>;

    /// Lets the device advance while the host is busy elsewhere, such as
    /// between two polls of a status register.
    fn poll(&mut self) {}
}
