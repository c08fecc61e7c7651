/*++

Licensed under the Apache-2.0 license.

File Name:

    wr_dest.rs

Abstract:

    File contains the write-destination state machine. It drains the
    transfer buffer into write bursts on the routed destination port.

--*/

use crate::axi::{AxiAddrReq, AxiWriteChannels, BurstPlan, WriteBeat, FULL_STRB};
use crate::transfer_fifo::{FifoLevel, FifoReader};
use dma_emu_types::{AxiAddr, AxiBurst, AxiResp, DATA_WIDTH_BYTES};
use smlang::statemachine;

const LINE_BYTES: u64 = DATA_WIDTH_BYTES as u64;

statemachine! {
    derive_states: [Clone, Copy, Debug],
    derive_events: [Clone, Copy, Debug],
    transitions: {
        *Idle + Start [has_job] / latch_job = AddrSetup,
        AddrSetup + AddrAccepted = FifoEmpty,
        FifoEmpty + DataAvailable = RdFifoWrDest,
        RdFifoWrDest + FifoDrained = FifoEmpty,
        RdFifoWrDest + LastBeatAccepted = WaitForWrRsp,
        WaitForWrRsp + BurstRspOk / next_burst = AddrSetup,
        WaitForWrRsp + TransferRspOk / finish_transfer = Idle,
        WaitForWrRsp + RspErr / latch_error = Error,
        _ + ResetDispatcher / clear = Idle,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WrDestState {
    Idle,
    AddrSetup,
    FifoEmpty,
    RdFifoWrDest,
    WaitForWrRsp,
    Error,
}

/// Read-only view of the write side, sampled at the step boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WrDestStatus {
    pub state: WrDestState,
    pub fault: Option<AxiResp>,
    /// Bytes accepted by the destination for the current descriptor.
    pub bytes_written: u64,
    /// Write bursts whose last beat went out and whose response has not
    /// arrived.
    pub responses_outstanding: u32,
    /// A W beat was accepted during the last step.
    pub beat_accepted: bool,
    /// `wr_fsm_done`: the descriptor completed during the last step.
    pub done: bool,
}

impl WrDestStatus {
    pub fn busy(&self) -> bool {
        !matches!(self.state, WrDestState::Idle | WrDestState::Error)
    }
}

#[derive(Clone, Copy, Debug)]
struct WriteJob {
    addr: AxiAddr,
    lines: u64,
}

pub struct Context {
    fifo: FifoReader,
    max_beats: usize,
    burst_type: AxiBurst,
    job: Option<WriteJob>,
    plan: BurstPlan,
    current: Option<AxiAddrReq>,
    /// Running byte counter of the current burst.
    burst_bytes: u64,
    bytes_written: u64,
    fault: Option<AxiResp>,
    responses_outstanding: u32,
}

impl Context {
    fn new(fifo: FifoReader, max_beats: usize, burst_type: AxiBurst) -> Self {
        Self {
            fifo,
            max_beats,
            burst_type,
            job: None,
            plan: BurstPlan::new(0, 0, max_beats, burst_type),
            current: None,
            burst_bytes: 0,
            bytes_written: 0,
            fault: None,
            responses_outstanding: 0,
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
        self.burst_bytes = 0;
        self.bytes_written = 0;
        self.fault = None;
        log::debug!("wr_dest: writing {} lines to {:#x}", job.lines, job.addr);
        Ok(())
    }

    fn next_burst(&mut self) -> Result<(), ()> {
        self.current = self.plan.advance();
        self.burst_bytes = 0;
        Ok(())
    }

    fn finish_transfer(&mut self) -> Result<(), ()> {
        self.current = None;
        log::debug!("wr_dest: {} bytes written", self.bytes_written);
        Ok(())
    }

    fn latch_error(&mut self) -> Result<(), ()> {
        log::error!(
            "wr_dest: destination answered {:?} after {} bytes",
            self.fault,
            self.bytes_written
        );
        Ok(())
    }

    fn clear(&mut self) -> Result<(), ()> {
        self.fifo.flush();
        self.job = None;
        self.plan = BurstPlan::new(0, 0, self.max_beats, self.burst_type);
        self.current = None;
        self.burst_bytes = 0;
        self.bytes_written = 0;
        self.fault = None;
        self.responses_outstanding = 0;
        Ok(())
    }
}

pub struct WrDest {
    sm: StateMachine<Context>,
    beat_accepted: bool,
    done: bool,
}

impl WrDest {
    pub fn new(fifo: FifoReader, max_beats: usize, burst_type: AxiBurst) -> Self {
        Self {
            sm: StateMachine::new(Context::new(fifo, max_beats, burst_type)),
            beat_accepted: false,
            done: false,
        }
    }

    /// Hand a transfer of `lines` lines to `addr` to the machine. Ignored
    /// unless the machine is idle.
    pub fn start(&mut self, addr: AxiAddr, lines: u64) -> bool {
        if *self.sm.state() != States::Idle {
            return false;
        }
        self.sm.context_mut().job = Some(WriteJob { addr, lines });
        self.sm.process_event(Events::Start).is_ok()
    }

    /// Return to IDLE from any state and discard buffered data.
    pub fn reset(&mut self) {
        let _ = self.sm.process_event(Events::ResetDispatcher);
        self.beat_accepted = false;
        self.done = false;
    }

    /// Beats waiting in the transfer buffer.
    pub fn buffered(&self) -> usize {
        self.sm.context().fifo.len()
    }

    pub fn state(&self) -> WrDestState {
        match *self.sm.state() {
            States::Idle => WrDestState::Idle,
            States::AddrSetup => WrDestState::AddrSetup,
            States::FifoEmpty => WrDestState::FifoEmpty,
            States::RdFifoWrDest => WrDestState::RdFifoWrDest,
            States::WaitForWrRsp => WrDestState::WaitForWrRsp,
            States::Error => WrDestState::Error,
        }
    }

    pub fn status(&self) -> WrDestStatus {
        let ctx = self.sm.context();
        WrDestStatus {
            state: self.state(),
            fault: ctx.fault,
            bytes_written: ctx.bytes_written,
            responses_outstanding: ctx.responses_outstanding,
            beat_accepted: self.beat_accepted,
            done: self.done,
        }
    }

    /// Evaluate one clock edge against the routed destination port. `level`
    /// is the buffer occupancy sampled for this step.
    pub fn step(&mut self, port: &mut AxiWriteChannels, level: FifoLevel) {
        self.beat_accepted = false;
        self.done = false;
        match *self.sm.state() {
            States::Idle | States::Error => {}
            States::AddrSetup => {
                port.aw.payload = self.sm.context().current;
                if port.aw.fire() {
                    let _ = self.sm.process_event(Events::AddrAccepted);
                }
            }
            States::FifoEmpty => {
                if level.can_pop() {
                    let _ = self.sm.process_event(Events::DataAvailable);
                    self.stream(port);
                }
            }
            States::RdFifoWrDest => {
                if level.can_pop() {
                    self.stream(port);
                } else {
                    let _ = self.sm.process_event(Events::FifoDrained);
                }
            }
            States::WaitForWrRsp => {
                port.b.ready = true;
                if let Some(resp) = port.b.fired().copied() {
                    self.response(resp);
                }
            }
        }
    }

    fn stream(&mut self, port: &mut AxiWriteChannels) {
        let ctx = self.sm.context_mut();
        let Some(data) = ctx.fifo.peek() else {
            return;
        };
        let beats = ctx.current.map_or(1, |req| req.beats()) as u64;
        let last = ctx.burst_bytes == (beats - 1) * LINE_BYTES;
        port.w.payload = Some(WriteBeat {
            data,
            strb: FULL_STRB,
            last,
        });
        if !port.w.fire() {
            return;
        }
        ctx.fifo.pop();
        ctx.burst_bytes += LINE_BYTES;
        ctx.bytes_written += LINE_BYTES;
        self.beat_accepted = true;
        if last {
            ctx.responses_outstanding += 1;
            let _ = self.sm.process_event(Events::LastBeatAccepted);
        }
    }

    fn response(&mut self, resp: AxiResp) {
        let ctx = self.sm.context_mut();
        ctx.responses_outstanding = ctx.responses_outstanding.saturating_sub(1);
        if !resp.is_ok() {
            ctx.fault = Some(resp);
            let _ = self.sm.process_event(Events::RspErr);
        } else if ctx.plan.is_done() {
            self.done = true;
            let _ = self.sm.process_event(Events::TransferRspOk);
        } else {
            let _ = self.sm.process_event(Events::BurstRspOk);
        }
    }
}
