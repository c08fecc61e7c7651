/*++

Licensed under the Apache-2.0 license.

File Name:

    axi.rs

Abstract:

    File contains the AXI channel model shared by the engine and the memory
    models: payloads, valid/ready channels, per-port channel groups and burst
    planning.

--*/

use dma_emu_types::{AxiAddr, AxiBurst, AxiResp, AxiSize, AXI_4K_BOUNDARY, DATA_WIDTH_BYTES};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// One 512-bit data beat.
#[derive(Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct Beat(pub [u8; DATA_WIDTH_BYTES]);

impl Beat {
    pub const fn zeroed() -> Self {
        Beat([0u8; DATA_WIDTH_BYTES])
    }

    /// Build a beat from eight little-endian 64-bit words.
    pub fn from_words(words: [u64; DATA_WIDTH_BYTES / 8]) -> Self {
        let mut beat = Beat::zeroed();
        for (chunk, word) in beat.0.chunks_exact_mut(8).zip(words) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        beat
    }

    /// Little-endian 64-bit word `index` of the beat.
    pub fn word(&self, index: usize) -> u64 {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&self.0[index * 8..index * 8 + 8]);
        u64::from_le_bytes(bytes)
    }
}

impl Default for Beat {
    fn default() -> Self {
        Beat::zeroed()
    }
}

impl std::fmt::Debug for Beat {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "Beat({:#x}, ..)", self.word(0))
    }
}

/// Strobe with every byte lane of a beat enabled.
pub const FULL_STRB: u64 = u64::MAX;

/// Address phase request (AR or AW).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AxiAddrReq {
    pub addr: AxiAddr,
    /// Beats in the burst minus one.
    pub len: u8,
    pub size: AxiSize,
    pub burst: AxiBurst,
}

impl AxiAddrReq {
    pub fn beats(&self) -> usize {
        self.len as usize + 1
    }
}

/// R channel payload
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReadBeat {
    pub data: Beat,
    pub resp: AxiResp,
    pub last: bool,
}

/// W channel payload
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WriteBeat {
    pub data: Beat,
    pub strb: u64,
    pub last: bool,
}

/// A single valid/ready channel. The source drives `payload` (valid is
/// `payload.is_some()`), the sink drives `ready`. A transfer happens on a
/// cycle where both are asserted.
#[derive(Clone, Debug)]
pub struct Channel<T> {
    pub payload: Option<T>,
    pub ready: bool,
}

impl<T> Default for Channel<T> {
    fn default() -> Self {
        Self {
            payload: None,
            ready: false,
        }
    }
}

impl<T> Channel<T> {
    pub fn valid(&self) -> bool {
        self.payload.is_some()
    }

    pub fn fire(&self) -> bool {
        self.valid() && self.ready
    }

    /// Payload that transferred this cycle.
    pub fn fired(&self) -> Option<&T> {
        if self.ready {
            self.payload.as_ref()
        } else {
            None
        }
    }
}

/// Read half of a memory port. The master drives `ar.payload` and `r.ready`.
#[derive(Clone, Debug, Default)]
pub struct AxiReadChannels {
    pub ar: Channel<AxiAddrReq>,
    pub r: Channel<ReadBeat>,
}

impl AxiReadChannels {
    /// Return the master-driven signals to bus-idle values.
    pub fn park(&mut self) {
        self.ar.payload = None;
        self.r.ready = false;
    }
}

/// Write half of a memory port. The master drives `aw.payload`,
/// `w.payload` and `b.ready`.
#[derive(Clone, Debug, Default)]
pub struct AxiWriteChannels {
    pub aw: Channel<AxiAddrReq>,
    pub w: Channel<WriteBeat>,
    pub b: Channel<AxiResp>,
}

impl AxiWriteChannels {
    /// Return the master-driven signals to bus-idle values.
    pub fn park(&mut self) {
        self.aw.payload = None;
        self.w.payload = None;
        self.b.ready = false;
    }
}

/// Splits a transfer of whole lines into bursts. Each burst is at most
/// `max_beats` long and never crosses a 4 KiB boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BurstPlan {
    next_addr: AxiAddr,
    remaining: u64,
    max_beats: usize,
    burst: AxiBurst,
}

impl BurstPlan {
    pub fn new(addr: AxiAddr, lines: u64, max_beats: usize, burst: AxiBurst) -> Self {
        Self {
            next_addr: addr,
            remaining: lines,
            max_beats: max_beats.max(1),
            burst,
        }
    }

    /// Lines not yet covered by an issued burst.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn is_done(&self) -> bool {
        self.remaining == 0
    }

    /// Address request for the next burst, without consuming it.
    pub fn peek(&self) -> Option<AxiAddrReq> {
        if self.is_done() {
            return None;
        }
        let line = DATA_WIDTH_BYTES as AxiAddr;
        let to_boundary = (AXI_4K_BOUNDARY - self.next_addr % AXI_4K_BOUNDARY) / line;
        let mut beats = (self.remaining.min(to_boundary.max(1)) as usize).min(self.max_beats);
        let mut burst = self.burst;
        if burst == AxiBurst::Wrap {
            // A wrapping burst covers the same lines as an incrementing one
            // only when it starts on its own container boundary.
            match [16usize, 8, 4, 2]
                .into_iter()
                .find(|&n| n <= beats && self.next_addr % (n as AxiAddr * line) == 0)
            {
                Some(n) => beats = n,
                None => {
                    // Walk up to the next 16-line container with INCR.
                    let container = 16 * line;
                    let to_container = (container - self.next_addr % container) / line;
                    beats = beats.min(to_container.max(1) as usize);
                    burst = AxiBurst::Incr;
                }
            }
        }
        Some(AxiAddrReq {
            addr: self.next_addr,
            len: (beats - 1) as u8,
            size: AxiSize::from_bytes(DATA_WIDTH_BYTES),
            burst,
        })
    }

    /// Consume the next burst.
    pub fn advance(&mut self) -> Option<AxiAddrReq> {
        let req = self.peek()?;
        let beats = req.beats() as u64;
        // The line after the top of the address space is never fetched.
        self.next_addr = self
            .next_addr
            .wrapping_add(beats * DATA_WIDTH_BYTES as AxiAddr);
        self.remaining -= beats;
        Some(req)
    }
}

impl Iterator for BurstPlan {
    type Item = AxiAddrReq;

    fn next(&mut self) -> Option<AxiAddrReq> {
        self.advance()
    }
}
