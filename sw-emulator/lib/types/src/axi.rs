/*++

Licensed under the Apache-2.0 license.

File Name:

    axi.rs

Abstract:

    File contains the encodings used on the AXI memory ports: transfer size,
    burst type and response codes.

--*/

use crate::{emu_enum, AxiAddr};
use serde::Deserialize;

/// Bursts must not cross this address boundary.
pub const AXI_4K_BOUNDARY: AxiAddr = 0x1000;

emu_enum!(
    /// AxSIZE: bytes per beat, encoded as log2.
    #[derive(Debug, Eq, PartialEq, Copy, Clone)]
    pub AxiSize;
    u8;
    {
        Bytes1 = 0,
        Bytes2 = 1,
        Bytes4 = 2,
        Bytes8 = 3,
        Bytes16 = 4,
        Bytes32 = 5,
        Bytes64 = 6,
        Bytes128 = 7,
    };
    Invalid
);

impl AxiSize {
    /// Number of bytes moved by one beat, or `None` for an invalid encoding.
    pub fn bytes(self) -> Option<usize> {
        self.encoding().map(|log2| 1usize << log2)
    }

    /// Encoding for a beat of `bytes` bytes. Anything that is not a power of
    /// two between 1 and 128 maps to `Invalid`.
    pub fn from_bytes(bytes: usize) -> Self {
        if bytes.is_power_of_two() && bytes <= 128 {
            AxiSize::from(bytes.trailing_zeros() as u8)
        } else {
            AxiSize::Invalid
        }
    }
}

/// AxBURST
#[derive(Debug, Eq, PartialEq, Copy, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AxiBurst {
    Fixed = 0,
    Incr = 1,
    Wrap = 2,
    #[serde(skip)]
    Reserved = 3,
}

impl From<u8> for AxiBurst {
    fn from(val: u8) -> Self {
        match val & 0b11 {
            0 => AxiBurst::Fixed,
            1 => AxiBurst::Incr,
            2 => AxiBurst::Wrap,
            _ => AxiBurst::Reserved,
        }
    }
}

impl From<AxiBurst> for u8 {
    fn from(val: AxiBurst) -> u8 {
        val as u8
    }
}

impl AxiBurst {
    /// Address of beat `index` of a burst of `beats` beats of `size_bytes`
    /// each, starting at `start`.
    ///
    /// WRAP bursts wrap at a boundary of `beats * size_bytes` bytes. RESERVED
    /// behaves like FIXED.
    pub fn beat_address(self, start: AxiAddr, size_bytes: usize, beats: usize, index: usize) -> AxiAddr {
        let size = size_bytes as AxiAddr;
        match self {
            AxiBurst::Fixed | AxiBurst::Reserved => start,
            AxiBurst::Incr => start.wrapping_add(index as AxiAddr * size),
            AxiBurst::Wrap => {
                let container = beats as AxiAddr * size;
                if container == 0 {
                    return start;
                }
                let lower = start / container * container;
                lower + (start - lower).wrapping_add(index as AxiAddr * size) % container
            }
        }
    }

    /// WRAP bursts are only legal for 2, 4, 8 or 16 beats.
    pub fn is_legal_length(self, beats: usize) -> bool {
        match self {
            AxiBurst::Wrap => matches!(beats, 2 | 4 | 8 | 16),
            AxiBurst::Fixed => (1..=16).contains(&beats),
            AxiBurst::Incr => (1..=256).contains(&beats),
            AxiBurst::Reserved => false,
        }
    }
}

/// xRESP
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum AxiResp {
    Okay = 0,
    ExOkay = 1,
    SlvErr = 2,
    DecErr = 3,
}

impl AxiResp {
    pub fn is_ok(self) -> bool {
        matches!(self, AxiResp::Okay | AxiResp::ExOkay)
    }
}

impl From<u8> for AxiResp {
    fn from(val: u8) -> Self {
        match val & 0b11 {
            0 => AxiResp::Okay,
            1 => AxiResp::ExOkay,
            2 => AxiResp::SlvErr,
            _ => AxiResp::DecErr,
        }
    }
}

impl std::fmt::Display for AxiResp {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match self {
            AxiResp::Okay => "OKAY",
            AxiResp::ExOkay => "EXOKAY",
            AxiResp::SlvErr => "SLVERR",
            AxiResp::DecErr => "DECERR",
        };
        f.write_str(name)
    }
}
