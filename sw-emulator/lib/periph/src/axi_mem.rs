/*++

Licensed under the Apache-2.0 license.

File Name:

    axi_mem.rs

Abstract:

    File contains the AXI memory slave model that backs host memory and the
    local memory banks.

--*/

use crate::axi::{AxiAddrReq, AxiReadChannels, AxiWriteChannels, Beat, ReadBeat, WriteBeat};
use dma_emu_bus::testing::Log;
use dma_emu_bus::{ActionHandle, Ram, Timer};
use dma_emu_types::{AxiAddr, AxiBurst, AxiResp, AXI_4K_BOUNDARY, DATA_WIDTH_BYTES};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use std::fmt::Write;
use std::ops::Range;

/// Timing and backpressure of one memory port.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AxiMemoryArgs {
    /// Memory size in bytes.
    pub size: usize,
    /// Cycles from AR acceptance to the first R beat.
    pub read_latency: u64,
    /// Cycles from the last W beat to the B response.
    pub write_latency: u64,
    /// Percentage of cycles on which the port withholds ready or a new
    /// valid.
    pub stall_percent: u8,
    pub seed: u64,
}

impl Default for AxiMemoryArgs {
    fn default() -> Self {
        Self {
            size: 4 * 1024 * 1024,
            read_latency: 4,
            write_latency: 2,
            stall_percent: 0,
            seed: 0,
        }
    }
}

struct ReadBurst {
    req: AxiAddrReq,
    beat: usize,
    latency: Option<ActionHandle>,
    presented: Option<ReadBeat>,
}

struct WriteBurst {
    req: AxiAddrReq,
    beat: usize,
    resp: AxiResp,
    latency: Option<ActionHandle>,
    data_done: bool,
}

/// AXI slave with one outstanding read burst and one outstanding write
/// burst.
pub struct AxiMemory {
    name: String,
    ram: Ram,
    timer: Timer,
    rng: StdRng,
    args: AxiMemoryArgs,
    rd: Option<ReadBurst>,
    wr: Option<WriteBurst>,
    read_errors: Vec<Range<AxiAddr>>,
    write_errors: Vec<Range<AxiAddr>>,
    protocol_violations: u64,
    read_bursts: u64,
    write_bursts: u64,
    trace: Option<Log>,
}

impl AxiMemory {
    pub fn new(name: &str, timer: Timer, args: AxiMemoryArgs) -> Self {
        Self {
            name: name.to_string(),
            ram: Ram::zeroed(args.size),
            timer,
            rng: StdRng::seed_from_u64(args.seed),
            args,
            rd: None,
            wr: None,
            read_errors: Vec::new(),
            write_errors: Vec::new(),
            protocol_violations: 0,
            read_bursts: 0,
            write_bursts: 0,
            trace: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ram(&self) -> &Ram {
        &self.ram
    }

    pub fn ram_mut(&mut self) -> &mut Ram {
        &mut self.ram
    }

    /// Reads touching `range` complete with SLVERR.
    pub fn inject_read_error(&mut self, range: Range<AxiAddr>) {
        self.read_errors.push(range);
    }

    /// Writes touching `range` are dropped and the burst completes with
    /// SLVERR.
    pub fn inject_write_error(&mut self, range: Range<AxiAddr>) {
        self.write_errors.push(range);
    }

    pub fn clear_injected_errors(&mut self) {
        self.read_errors.clear();
        self.write_errors.clear();
    }

    /// Record every handshake on this port into `log`.
    pub fn set_trace(&mut self, log: Log) {
        self.trace = Some(log);
    }

    pub fn set_stall_percent(&mut self, percent: u8) {
        self.args.stall_percent = percent.min(99);
    }

    pub fn protocol_violations(&self) -> u64 {
        self.protocol_violations
    }

    /// Read bursts whose last beat has been accepted.
    pub fn read_bursts(&self) -> u64 {
        self.read_bursts
    }

    /// Write bursts whose response has been accepted.
    pub fn write_bursts(&self) -> u64 {
        self.write_bursts
    }

    /// Abandon any open burst.
    pub fn reset_port(&mut self) {
        if let Some(rd) = self.rd.take() {
            if let Some(handle) = rd.latency {
                self.timer.cancel(handle);
            }
        }
        if let Some(wr) = self.wr.take() {
            if let Some(handle) = wr.latency {
                self.timer.cancel(handle);
            }
        }
    }

    fn stall(&mut self) -> bool {
        self.args.stall_percent > 0 && self.rng.gen_range(0..100u8) < self.args.stall_percent
    }

    fn violation(&mut self, what: std::fmt::Arguments) {
        self.protocol_violations += 1;
        log::error!("{}: AXI protocol violation: {}", self.name, what);
    }

    fn check_request(&mut self, kind: &str, req: &AxiAddrReq) -> bool {
        let Some(size) = req.size.bytes().filter(|&b| b <= DATA_WIDTH_BYTES) else {
            self.violation(format_args!("{kind} with unsupported size {:?}", req.size));
            return false;
        };
        if !req.burst.is_legal_length(req.beats()) {
            self.violation(format_args!(
                "{kind} {:?} burst of {} beats",
                req.burst,
                req.beats()
            ));
            return false;
        }
        if req.burst == AxiBurst::Incr {
            let Some(last) = req.addr.checked_add((req.beats() * size) as AxiAddr - 1) else {
                self.violation(format_args!("{kind} at {:#x} wraps the address space", req.addr));
                return false;
            };
            if req.addr / AXI_4K_BOUNDARY != last / AXI_4K_BOUNDARY {
                self.violation(format_args!("{kind} at {:#x} crosses 4 KiB", req.addr));
                return false;
            }
        }
        true
    }

    fn beat_range(req: &AxiAddrReq, beat: usize) -> (AxiAddr, usize) {
        let size = req.size.bytes().unwrap_or(DATA_WIDTH_BYTES);
        (req.burst.beat_address(req.addr, size, req.beats(), beat), size)
    }

    fn hits(ranges: &[Range<AxiAddr>], addr: AxiAddr, len: usize) -> bool {
        let end = addr.saturating_add(len as AxiAddr);
        ranges.iter().any(|r| r.start < end && addr < r.end)
    }

    fn read_beat(&self, req: &AxiAddrReq, beat: usize) -> ReadBeat {
        let (addr, size) = Self::beat_range(req, beat);
        let last = beat + 1 == req.beats();
        let mut data = Beat::zeroed();
        let lane = addr as usize % DATA_WIDTH_BYTES;
        let resp = if Self::hits(&self.read_errors, addr, size) {
            AxiResp::SlvErr
        } else if lane + size > DATA_WIDTH_BYTES {
            AxiResp::SlvErr
        } else {
            match self.ram.read(addr, &mut data.0[lane..lane + size]) {
                Ok(()) => AxiResp::Okay,
                Err(_) => AxiResp::DecErr,
            }
        };
        ReadBeat { data, resp, last }
    }

    fn trace(&self, args: std::fmt::Arguments) {
        if let Some(log) = &self.trace {
            let _ = writeln!(log.w(), "{}", args);
        }
    }

    /// Drive the slave outputs of the read channels for this cycle.
    pub fn drive_read(&mut self, ch: &mut AxiReadChannels) {
        let stall = self.stall();
        ch.ar.ready = self.rd.is_none() && !stall;
        ch.r.payload = None;

        let mut next = None;
        if let Some(rd) = self.rd.as_mut() {
            if rd.latency.is_some() {
                self.timer.fired(&mut rd.latency);
            }
            if rd.presented.is_none() && rd.latency.is_none() && !stall {
                next = Some((rd.req, rd.beat));
            }
        }
        if let Some((req, beat)) = next {
            let payload = self.read_beat(&req, beat);
            if let Some(rd) = self.rd.as_mut() {
                rd.presented = Some(payload);
            }
        }
        ch.r.payload = self.rd.as_ref().and_then(|rd| rd.presented);
    }

    /// Latch the read handshakes that fired this cycle.
    pub fn commit_read(&mut self, ch: &AxiReadChannels) {
        if let Some(beat) = ch.r.fired().copied() {
            self.trace(format_args!(
                "R data={:#x} resp={} last={}",
                beat.data.word(0),
                beat.resp,
                beat.last as u8
            ));
            let finished = match self.rd.as_mut() {
                Some(rd) => {
                    rd.presented = None;
                    rd.beat += 1;
                    rd.beat == rd.req.beats()
                }
                None => false,
            };
            if finished {
                self.rd = None;
                self.read_bursts += 1;
            }
        }

        if let Some(req) = ch.ar.fired().copied() {
            self.trace(format_args!(
                "AR addr={:#x} len={} size={} burst={:?}",
                req.addr, req.len, req.size, req.burst
            ));
            if self.check_request("AR", &req) {
                let latency = Some(self.timer.schedule_poll_in(self.args.read_latency));
                self.rd = Some(ReadBurst {
                    req,
                    beat: 0,
                    latency,
                    presented: None,
                });
            } else {
                // Answer the illegal request with a single error beat.
                self.rd = Some(ReadBurst {
                    req: AxiAddrReq { len: 0, ..req },
                    beat: 0,
                    latency: None,
                    presented: Some(ReadBeat {
                        data: Beat::zeroed(),
                        resp: AxiResp::SlvErr,
                        last: true,
                    }),
                });
            }
        }
    }

    /// Drive the slave outputs of the write channels for this cycle.
    pub fn drive_write(&mut self, ch: &mut AxiWriteChannels) {
        let stall = self.stall();
        ch.aw.ready = self.wr.is_none() && !stall;
        ch.w.ready = false;
        ch.b.payload = None;
        if let Some(wr) = self.wr.as_mut() {
            if wr.data_done {
                if wr.latency.is_some() {
                    self.timer.fired(&mut wr.latency);
                }
                if wr.latency.is_none() {
                    ch.b.payload = Some(wr.resp);
                }
            } else {
                ch.w.ready = !stall;
            }
        }
    }

    /// Latch the write handshakes that fired this cycle.
    pub fn commit_write(&mut self, ch: &AxiWriteChannels) {
        if let Some(resp) = ch.b.fired().copied() {
            self.trace(format_args!("B resp={}", resp));
            self.wr = None;
            self.write_bursts += 1;
        }

        if let Some(beat) = ch.w.fired().copied() {
            self.trace(format_args!(
                "W data={:#x} strb={:#x} last={}",
                beat.data.word(0),
                beat.strb,
                beat.last as u8
            ));
            self.accept_write_beat(&beat);
        } else if ch.w.valid() && self.wr.is_none() && !ch.aw.fire() {
            self.violation(format_args!("W presented without an open write burst"));
        }

        if let Some(req) = ch.aw.fired().copied() {
            self.trace(format_args!(
                "AW addr={:#x} len={} size={} burst={:?}",
                req.addr, req.len, req.size, req.burst
            ));
            let resp = if self.check_request("AW", &req) {
                AxiResp::Okay
            } else {
                AxiResp::SlvErr
            };
            self.wr = Some(WriteBurst {
                req,
                beat: 0,
                resp,
                latency: None,
                data_done: false,
            });
        }
    }

    fn accept_write_beat(&mut self, beat: &WriteBeat) {
        let Some(wr) = self.wr.as_ref() else {
            return;
        };
        let req = wr.req;
        let index = wr.beat;
        let burst_ok = wr.resp.is_ok();
        let expect_last = index + 1 == req.beats();
        if beat.last != expect_last {
            self.violation(format_args!(
                "WLAST={} on beat {} of a {} beat burst",
                beat.last as u8,
                index,
                req.beats()
            ));
        }

        let (addr, size) = Self::beat_range(&req, index);
        let lane = addr as usize % DATA_WIDTH_BYTES;
        let mut resp = AxiResp::Okay;
        if Self::hits(&self.write_errors, addr, size) || lane + size > DATA_WIDTH_BYTES {
            resp = AxiResp::SlvErr;
        } else if !self.ram.contains(addr, size) {
            resp = AxiResp::DecErr;
        } else if burst_ok {
            let strb = (beat.strb >> lane) & lane_mask(size);
            if self
                .ram
                .write_strobed(addr, &beat.data.0[lane..lane + size], strb)
                .is_err()
            {
                resp = AxiResp::DecErr;
            }
        }
        if !resp.is_ok() {
            log::error!(
                "{}: write beat {} at {:#x} answered {}",
                self.name,
                index,
                addr,
                resp
            );
        }

        if let Some(wr) = self.wr.as_mut() {
            if burst_ok && !resp.is_ok() {
                wr.resp = resp;
            }
            wr.beat += 1;
            if wr.beat == req.beats() {
                wr.data_done = true;
                wr.latency = Some(self.timer.schedule_poll_in(self.args.write_latency));
            }
        }
    }
}

fn lane_mask(size: usize) -> u64 {
    if size >= 64 {
        u64::MAX
    } else {
        (1u64 << size) - 1
    }
}
