/*++

Licensed under the Apache-2.0 license.

File Name:

    fake_bus.rs

Abstract:

    File contains code for a fake implementation of the Bus trait.

--*/
use dma_emu_types::{CsrAddr, CsrData, CsrSize};

use crate::{testing::Log, Bus, BusError};
use std::collections::VecDeque;
use std::fmt::Write;

/// A Bus implementation that logs all calls. Reads return queued values
/// first and fall back to `read_result`.
///
/// # Example
///
/// ```
/// use dma_emu_bus::{Bus, testing::FakeBus};
/// use dma_emu_types::CsrSize;
///
/// let mut fake_bus = FakeBus::new();
/// fake_bus.read_result = Ok(35);
/// fake_bus.read_queue.push_back(1);
/// assert_eq!(fake_bus.read(CsrSize::DoubleWord, 0x48), Ok(1));
/// assert_eq!(fake_bus.read(CsrSize::DoubleWord, 0x48), Ok(35));
/// assert_eq!(
///     "read(CsrSize::DoubleWord, 0x48)\nread(CsrSize::DoubleWord, 0x48)\n",
///     fake_bus.log.take()
/// );
/// ```
pub struct FakeBus {
    pub log: Log,
    pub read_queue: VecDeque<CsrData>,
    pub read_result: Result<CsrData, BusError>,
    pub write_result: Result<(), BusError>,
    pub polls: u64,
}
impl FakeBus {
    pub fn new() -> Self {
        Self {
            log: Log::new(),
            read_queue: VecDeque::new(),
            read_result: Ok(0),
            write_result: Ok(()),
            polls: 0,
        }
    }
}
impl Default for FakeBus {
    fn default() -> Self {
        Self::new()
    }
}
impl Bus for FakeBus {
    fn read(&mut self, size: CsrSize, addr: CsrAddr) -> Result<CsrData, BusError> {
        let _ = writeln!(self.log.w(), "read(CsrSize::{size:?}, {addr:#x})");
        match self.read_queue.pop_front() {
            Some(val) => Ok(val),
            None => self.read_result,
        }
    }

    fn write(&mut self, size: CsrSize, addr: CsrAddr, val: CsrData) -> Result<(), BusError> {
        let _ = writeln!(self.log.w(), "write(CsrSize::{size:?}, {addr:#x}, {val:#x})");
        self.write_result
    }

    fn poll(&mut self) {
        self.polls += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fake_bus() {
        let mut fake_bus = FakeBus::new();

        assert_eq!(fake_bus.read(CsrSize::DoubleWord, 0x48), Ok(0));
        assert_eq!("read(CsrSize::DoubleWord, 0x48)\n", fake_bus.log.take());

        assert_eq!(fake_bus.write(CsrSize::DoubleWord, 0x28, 0x1000), Ok(()));
        assert_eq!(
            "write(CsrSize::DoubleWord, 0x28, 0x1000)\n",
            fake_bus.log.take()
        );

        fake_bus.read_result = Err(BusError::LoadAccessFault);
        assert_eq!(
            fake_bus.read(CsrSize::Word, 0x4c),
            Err(BusError::LoadAccessFault)
        );
        assert_eq!("read(CsrSize::Word, 0x4c)\n", fake_bus.log.take());

        fake_bus.write_result = Err(BusError::StoreAccessFault);
        assert_eq!(
            fake_bus.write(CsrSize::Word, 0x40, 0x1),
            Err(BusError::StoreAccessFault)
        );

        fake_bus.poll();
        fake_bus.poll();
        assert_eq!(fake_bus.polls, 2);
    }
}
