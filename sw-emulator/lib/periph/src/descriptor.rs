/*++

Licensed under the Apache-2.0 license.

File Name:

    descriptor.rs

Abstract:

    File contains the transfer descriptor, its admission checks and the
    bounded descriptor queue.

--*/

use dma_emu_types::{AxiAddr, DATA_WIDTH_BYTES};
use std::collections::VecDeque;
use thiserror::Error;
use tock_registers::register_bitfields;
use tock_registers::LocalRegisterCopy;

register_bitfields! [
    u64,

    /// Descriptor Control
    pub DescriptorControl [
        MODE OFFSET(26) NUMBITS(2) [
            HOST_TO_DDR = 0b00,
            DDR_TO_HOST = 0b01,
            DDR_TO_DDR = 0b10,
        ],
        GO OFFSET(31) NUMBITS(1) [],
    ],
];

pub const DEFAULT_QUEUE_DEPTH: usize = 32;

/// Which side of the engine each end of a transfer lives on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DmaMode {
    HostToDdr = 0,
    DdrToHost = 1,
    DdrToDdr = 2,
}

impl DmaMode {
    pub fn src_is_local(self) -> bool {
        matches!(self, DmaMode::DdrToHost | DmaMode::DdrToDdr)
    }

    pub fn dest_is_local(self) -> bool {
        matches!(self, DmaMode::HostToDdr | DmaMode::DdrToDdr)
    }

    /// DESCRIPTOR_CONTROL value that submits a descriptor in this mode.
    pub fn control_word(self) -> u64 {
        (DescriptorControl::GO::SET + DescriptorControl::MODE.val(self as u64)).value
    }
}

impl TryFrom<u64> for DmaMode {
    type Error = DescriptorError;

    fn try_from(val: u64) -> Result<Self, Self::Error> {
        match val {
            0 => Ok(DmaMode::HostToDdr),
            1 => Ok(DmaMode::DdrToHost),
            2 => Ok(DmaMode::DdrToDdr),
            _ => Err(DescriptorError::InvalidMode(val)),
        }
    }
}

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("descriptor length is zero")]
    ZeroLength,
    #[error("{which} address {addr:#x} is not 64-byte aligned")]
    Misaligned { which: &'static str, addr: AxiAddr },
    #[error("unsupported transfer mode {0}")]
    InvalidMode(u64),
    #[error("{which} range at {addr:#x} crosses a local bank boundary")]
    CrossesBank { which: &'static str, addr: AxiAddr },
    #[error("{which} address {addr:#x} is beyond the last local bank")]
    NoSuchBank { which: &'static str, addr: AxiAddr },
    #[error("{which} range at {addr:#x} runs past the end of the address space")]
    AddressOverflow { which: &'static str, addr: AxiAddr },
}

/// Geometry of the local memory space. Bank `i` covers
/// `[i * bank_size, (i + 1) * bank_size)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LocalLayout {
    pub banks: usize,
    pub bank_size: u64,
}

impl LocalLayout {
    /// Bank index and bank-relative address of local address `addr`.
    pub fn locate(&self, addr: AxiAddr) -> (usize, AxiAddr) {
        ((addr / self.bank_size) as usize, addr % self.bank_size)
    }

    fn check(&self, which: &'static str, addr: AxiAddr, bytes: u64) -> Result<(), DescriptorError> {
        let (bank, _) = self.locate(addr);
        if bank >= self.banks {
            return Err(DescriptorError::NoSuchBank { which, addr });
        }
        let last = addr
            .checked_add(bytes - 1)
            .ok_or(DescriptorError::CrossesBank { which, addr })?;
        if self.locate(last).0 != bank {
            return Err(DescriptorError::CrossesBank { which, addr });
        }
        Ok(())
    }
}

/// One requested transfer, as latched from the CSRs on a `go` write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Descriptor {
    pub src_addr: AxiAddr,
    pub dest_addr: AxiAddr,
    /// Transfer length in lines of `DATA_WIDTH_BYTES`.
    pub length: u64,
    pub control: u64,
}

impl Descriptor {
    pub fn new(src_addr: AxiAddr, dest_addr: AxiAddr, length: u64, mode: DmaMode) -> Self {
        Self {
            src_addr,
            dest_addr,
            length,
            control: mode.control_word(),
        }
    }

    fn control_reg(&self) -> LocalRegisterCopy<u64, DescriptorControl::Register> {
        LocalRegisterCopy::new(self.control)
    }

    pub fn go(&self) -> bool {
        self.control_reg().is_set(DescriptorControl::GO)
    }

    pub fn mode(&self) -> Result<DmaMode, DescriptorError> {
        DmaMode::try_from(self.control_reg().read(DescriptorControl::MODE))
    }

    pub fn bytes(&self) -> u64 {
        self.length.saturating_mul(DATA_WIDTH_BYTES as u64)
    }

    /// Last byte address of the range starting at `addr`.
    fn last_byte(&self, which: &'static str, addr: AxiAddr) -> Result<AxiAddr, DescriptorError> {
        self.length
            .checked_mul(DATA_WIDTH_BYTES as u64)
            .and_then(|bytes| addr.checked_add(bytes - 1))
            .ok_or(DescriptorError::AddressOverflow { which, addr })
    }

    /// Admission checks. Returns the transfer mode of an acceptable
    /// descriptor.
    pub fn validate(&self, layout: &LocalLayout) -> Result<DmaMode, DescriptorError> {
        if self.length == 0 {
            return Err(DescriptorError::ZeroLength);
        }
        let align = DATA_WIDTH_BYTES as AxiAddr;
        if self.src_addr % align != 0 {
            return Err(DescriptorError::Misaligned {
                which: "source",
                addr: self.src_addr,
            });
        }
        if self.dest_addr % align != 0 {
            return Err(DescriptorError::Misaligned {
                which: "destination",
                addr: self.dest_addr,
            });
        }
        let mode = self.mode()?;
        self.last_byte("source", self.src_addr)?;
        self.last_byte("destination", self.dest_addr)?;
        if mode.src_is_local() {
            layout.check("source", self.src_addr, self.bytes())?;
        }
        if mode.dest_is_local() {
            layout.check("destination", self.dest_addr, self.bytes())?;
        }
        Ok(mode)
    }
}

/// Bounded FIFO of admitted descriptors.
pub struct DescriptorQueue {
    entries: VecDeque<Descriptor>,
    depth: usize,
}

impl DescriptorQueue {
    pub fn new(depth: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(depth),
            depth,
        }
    }

    /// Append `desc`. A full queue rejects it and keeps its contents.
    pub fn push(&mut self, desc: Descriptor) -> Result<(), Descriptor> {
        if self.is_full() {
            return Err(desc);
        }
        self.entries.push_back(desc);
        Ok(())
    }

    pub fn pop(&mut self) -> Option<Descriptor> {
        self.entries.pop_front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.depth
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn iter(&self) -> impl Iterator<Item = &Descriptor> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LAYOUT: LocalLayout = LocalLayout {
        banks: 2,
        bank_size: 0x10000,
    };

    #[test]
    fn test_control_word() {
        assert_eq!(DmaMode::HostToDdr.control_word(), 0x8000_0000);
        assert_eq!(DmaMode::DdrToHost.control_word(), 0x8400_0000);
        assert_eq!(DmaMode::DdrToDdr.control_word(), 0x8800_0000);
        let desc = Descriptor::new(0, 0, 1, DmaMode::DdrToHost);
        assert!(desc.go());
        assert_eq!(desc.mode(), Ok(DmaMode::DdrToHost));
    }

    #[test]
    fn test_validate() {
        let desc = Descriptor::new(0x1000, 0x2000, 4, DmaMode::HostToDdr);
        assert_eq!(desc.validate(&LAYOUT), Ok(DmaMode::HostToDdr));

        let desc = Descriptor::new(0x1000, 0x2000, 0, DmaMode::HostToDdr);
        assert_eq!(desc.validate(&LAYOUT), Err(DescriptorError::ZeroLength));

        let desc = Descriptor::new(0x1004, 0x2000, 1, DmaMode::HostToDdr);
        assert_eq!(
            desc.validate(&LAYOUT),
            Err(DescriptorError::Misaligned {
                which: "source",
                addr: 0x1004
            })
        );

        let desc = Descriptor {
            control: 0x8c00_0000,
            ..Descriptor::new(0, 0, 1, DmaMode::HostToDdr)
        };
        assert_eq!(desc.validate(&LAYOUT), Err(DescriptorError::InvalidMode(3)));
    }

    #[test]
    fn test_validate_banks() {
        // Last line of bank 0 is fine, one more line crosses into bank 1.
        let desc = Descriptor::new(0, 0xffc0, 1, DmaMode::HostToDdr);
        assert!(desc.validate(&LAYOUT).is_ok());
        let desc = Descriptor::new(0, 0xffc0, 2, DmaMode::HostToDdr);
        assert_eq!(
            desc.validate(&LAYOUT),
            Err(DescriptorError::CrossesBank {
                which: "destination",
                addr: 0xffc0
            })
        );
        let desc = Descriptor::new(0x20000, 0, 1, DmaMode::DdrToHost);
        assert_eq!(
            desc.validate(&LAYOUT),
            Err(DescriptorError::NoSuchBank {
                which: "source",
                addr: 0x20000
            })
        );
        // Host addresses are not checked against the banks.
        let desc = Descriptor::new(0x20000, 0x10000, 1, DmaMode::HostToDdr);
        assert!(desc.validate(&LAYOUT).is_ok());
        assert_eq!(LAYOUT.locate(0x10040), (1, 0x40));
    }

    #[test]
    fn test_validate_top_of_address_space() {
        let desc = Descriptor::new(0xFFFF_FFFF_FFFF_FFC0, 0, 1, DmaMode::HostToDdr);
        assert_eq!(desc.validate(&LAYOUT), Ok(DmaMode::HostToDdr));
        let desc = Descriptor::new(0xFFFF_FFFF_FFFF_FFC0, 0, 2, DmaMode::HostToDdr);
        assert_eq!(
            desc.validate(&LAYOUT),
            Err(DescriptorError::AddressOverflow {
                which: "source",
                addr: 0xFFFF_FFFF_FFFF_FFC0
            })
        );
        let desc = Descriptor::new(0, 0xFFFF_FFFF_FFFF_FF80, 3, DmaMode::DdrToHost);
        assert_eq!(
            desc.validate(&LAYOUT),
            Err(DescriptorError::AddressOverflow {
                which: "destination",
                addr: 0xFFFF_FFFF_FFFF_FF80
            })
        );
        let desc = Descriptor::new(0, 0, u64::MAX, DmaMode::HostToDdr);
        assert!(matches!(
            desc.validate(&LAYOUT),
            Err(DescriptorError::AddressOverflow { .. })
        ));
    }

    #[test]
    fn test_queue_overflow_keeps_contents() {
        let mut queue = DescriptorQueue::new(2);
        let a = Descriptor::new(0x0, 0x0, 1, DmaMode::HostToDdr);
        let b = Descriptor::new(0x40, 0x40, 1, DmaMode::HostToDdr);
        let c = Descriptor::new(0x80, 0x80, 1, DmaMode::HostToDdr);
        assert_eq!(queue.push(a), Ok(()));
        assert_eq!(queue.push(b), Ok(()));
        assert!(queue.is_full());
        assert_eq!(queue.push(c), Err(c));
        assert_eq!(queue.iter().copied().collect::<Vec<_>>(), vec![a, b]);
        assert_eq!(queue.pop(), Some(a));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.iter().next(), Some(&b));
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            DescriptorError::Misaligned {
                which: "source",
                addr: 0x1004
            }
            .to_string(),
            "source address 0x1004 is not 64-byte aligned"
        );
    }
}
