/*++

Licensed under the Apache-2.0 license.

File Name:

    rd_src.rs

Abstract:

    File contains the read-source state machine. It issues read bursts
    against the routed source port and pushes the returned beats into the
    transfer buffer.

--*/

use crate::axi::{AxiAddrReq, AxiReadChannels, BurstPlan, ReadBeat};
use crate::transfer_fifo::{FifoLevel, FifoWriter};
use dma_emu_types::{AxiAddr, AxiBurst, AxiResp, DATA_WIDTH_BYTES};
use smlang::statemachine;

statemachine! {
    derive_states: [Clone, Copy, Debug],
    derive_events: [Clone, Copy, Debug],
    transitions: {
        *Idle + Start [has_job] / latch_job = AddrSetup,
        AddrSetup + AddrAccepted = Streaming,
        Streaming + BurstDone / next_burst = AddrSetup,
        Streaming + TransferDone / finish_transfer = Idle,
        Streaming + RdError / latch_error = Error,
        _ + ResetDispatcher / clear = Idle,
    }
}

/// Why the read side stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RdFault {
    /// The source answered a beat with a non-OK response.
    Response(AxiResp),
    /// RLAST arrived before the expected number of beats.
    EarlyLast,
    /// The expected last beat came without RLAST.
    MissingLast,
    /// A beat was accepted with no room in the transfer buffer.
    BufferOverflow,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RdSrcState {
    Idle,
    AddrSetup,
    Streaming,
    Error,
}

/// Read-only view of the read side, sampled at the step boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RdSrcStatus {
    pub state: RdSrcState,
    pub fault: Option<RdFault>,
    /// Bytes pushed into the transfer buffer for the current descriptor.
    pub bytes_read: u64,
    /// A beat was accepted during the last step.
    pub beat_accepted: bool,
    /// The last beat of the current descriptor was accepted during the last
    /// step.
    pub done: bool,
}

impl RdSrcStatus {
    pub fn busy(&self) -> bool {
        matches!(self.state, RdSrcState::AddrSetup | RdSrcState::Streaming)
    }
}

#[derive(Clone, Copy, Debug)]
struct ReadJob {
    addr: AxiAddr,
    lines: u64,
}

pub struct Context {
    fifo: FifoWriter,
    max_beats: usize,
    burst_type: AxiBurst,
    job: Option<ReadJob>,
    plan: BurstPlan,
    current: Option<AxiAddrReq>,
    beats_in_burst: usize,
    bytes_read: u64,
    total_bytes: u64,
    fault: Option<RdFault>,
    /// Keep RREADY up until the burst that failed has ended.
    draining: bool,
}

impl Context {
    fn new(fifo: FifoWriter, max_beats: usize, burst_type: AxiBurst) -> Self {
        Self {
            fifo,
            max_beats,
            burst_type,
            job: None,
            plan: BurstPlan::new(0, 0, max_beats, burst_type),
            current: None,
            beats_in_burst: 0,
            bytes_read: 0,
            total_bytes: 0,
            fault: None,
            draining: false,
        }
    }
}

impl StateMachineContext for Context {
    fn has_job(&self) -> Result<bool, ()> {
        Ok(self.job.is_some())
    }

    fn latch_job(&mut self) -> Result<(), ()> {
        let job = self.job.take().ok_or(())?;
        self.plan = BurstPlan::new(job.addr, job.lines, self.max_beats, self.burst_type);
        self.current = self.plan.advance();
        self.beats_in_burst = 0;
        self.bytes_read = 0;
        self.total_bytes = job.lines * DATA_WIDTH_BYTES as u64;
        self.fault = None;
        log::debug!(
            "rd_src: reading {} lines from {:#x}",
            job.lines,
            job.addr
        );
        Ok(())
    }

    fn next_burst(&mut self) -> Result<(), ()> {
        self.current = self.plan.advance();
        self.beats_in_burst = 0;
        Ok(())
    }

    fn finish_transfer(&mut self) -> Result<(), ()> {
        self.current = None;
        log::debug!("rd_src: {} bytes read", self.bytes_read);
        Ok(())
    }

    fn latch_error(&mut self) -> Result<(), ()> {
        log::error!(
            "rd_src: stopped on {:?} after {} bytes",
            self.fault,
            self.bytes_read
        );
        Ok(())
    }

    fn clear(&mut self) -> Result<(), ()> {
        self.job = None;
        self.plan = BurstPlan::new(0, 0, self.max_beats, self.burst_type);
        self.current = None;
        self.beats_in_burst = 0;
        self.bytes_read = 0;
        self.total_bytes = 0;
        self.fault = None;
        self.draining = false;
        Ok(())
    }
}

pub struct RdSrc {
    sm: StateMachine<Context>,
    beat_accepted: bool,
    done: bool,
}

impl RdSrc {
    pub fn new(fifo: FifoWriter, max_beats: usize, burst_type: AxiBurst) -> Self {
        Self {
            sm: StateMachine::new(Context::new(fifo, max_beats, burst_type)),
            beat_accepted: false,
            done: false,
        }
    }

    /// Hand a transfer of `lines` lines starting at `addr` to the machine.
    /// Ignored unless the machine is idle.
    pub fn start(&mut self, addr: AxiAddr, lines: u64) -> bool {
        if *self.sm.state() != States::Idle {
            return false;
        }
        self.sm.context_mut().job = Some(ReadJob { addr, lines });
        self.sm.process_event(Events::Start).is_ok()
    }

    /// Return to IDLE from any state, dropping the current transfer.
    pub fn reset(&mut self) {
        let _ = self.sm.process_event(Events::ResetDispatcher);
        self.beat_accepted = false;
        self.done = false;
    }

    /// Transfer buffer occupancy as seen from the producer end.
    pub fn buffer_level(&self) -> FifoLevel {
        self.sm.context().fifo.level()
    }

    pub fn state(&self) -> RdSrcState {
        match *self.sm.state() {
            States::Idle => RdSrcState::Idle,
            States::AddrSetup => RdSrcState::AddrSetup,
            States::Streaming => RdSrcState::Streaming,
            States::Error => RdSrcState::Error,
        }
    }

    pub fn status(&self) -> RdSrcStatus {
        let ctx = self.sm.context();
        RdSrcStatus {
            state: self.state(),
            fault: ctx.fault,
            bytes_read: ctx.bytes_read,
            beat_accepted: self.beat_accepted,
            done: self.done,
        }
    }

    /// Evaluate one clock edge against the routed source port. `level` is
    /// the buffer occupancy sampled for this step.
    pub fn step(&mut self, port: &mut AxiReadChannels, level: FifoLevel) {
        self.beat_accepted = false;
        self.done = false;
        match *self.sm.state() {
            States::Idle => {}
            States::AddrSetup => {
                port.ar.payload = self.sm.context().current;
                if port.ar.fire() {
                    let _ = self.sm.process_event(Events::AddrAccepted);
                }
            }
            States::Streaming => {
                port.r.ready = level.can_push();
                if let Some(beat) = port.r.fired().copied() {
                    self.accept(beat);
                }
            }
            States::Error => {
                let ctx = self.sm.context_mut();
                port.r.ready = ctx.draining;
                if port.r.fired().is_some_and(|beat| beat.last) {
                    ctx.draining = false;
                }
            }
        }
    }

    fn accept(&mut self, beat: ReadBeat) {
        let ctx = self.sm.context_mut();
        let beats = ctx.current.map_or(0, |req| req.beats());
        let expect_last = ctx.beats_in_burst + 1 == beats;

        let fault = if !beat.resp.is_ok() {
            Some(RdFault::Response(beat.resp))
        } else if beat.last && !expect_last {
            Some(RdFault::EarlyLast)
        } else if !beat.last && expect_last {
            Some(RdFault::MissingLast)
        } else {
            ctx.fifo.push(beat.data).err().map(|_| RdFault::BufferOverflow)
        };
        if let Some(fault) = fault {
            ctx.fault = Some(fault);
            ctx.draining = !beat.last;
            let _ = self.sm.process_event(Events::RdError);
            return;
        }

        ctx.beats_in_burst += 1;
        ctx.bytes_read += DATA_WIDTH_BYTES as u64;
        self.beat_accepted = true;
        if beat.last {
            if ctx.bytes_read >= ctx.total_bytes {
                self.done = true;
                let _ = self.sm.process_event(Events::TransferDone);
            } else {
                let _ = self.sm.process_event(Events::BurstDone);
            }
        }
    }
}
