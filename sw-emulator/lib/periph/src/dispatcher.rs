/*++

Licensed under the Apache-2.0 license.

File Name:

    dispatcher.rs

Abstract:

    File contains the descriptor/status coordinator. It admits descriptors,
    hands them to the read-source and write-destination machines one at a
    time, latches errors and aggregates the status word.

--*/

use crate::csr::{FillLevelWord, SeqNumWord, Status};
use crate::descriptor::{Descriptor, DescriptorError, DescriptorQueue, LocalLayout};
use crate::perf::PerfCounter;
use crate::rd_src::{RdFault, RdSrc, RdSrcState, RdSrcStatus};
use crate::router::Router;
use crate::transfer_fifo::TransferFifo;
use crate::wr_dest::{WrDest, WrDestState, WrDestStatus};
use dma_emu_types::{AxiBurst, AxiResp};
use thiserror::Error;
use tock_registers::LocalRegisterCopy;

/// Why a descriptor was not queued.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum AdmissionError {
    #[error("engine is stopped on error")]
    StoppedOnError,
    #[error("descriptor queue is full")]
    QueueFull,
    #[error(transparent)]
    Invalid(#[from] DescriptorError),
}

/// Decoded STATUS register.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DmaStatus {
    pub busy: bool,
    pub descriptor_buffer_empty: bool,
    pub descriptor_buffer_full: bool,
    pub response_buffer_empty: bool,
    pub response_buffer_full: bool,
    pub stopped: bool,
    pub resetting: bool,
    pub stopped_on_error: bool,
    pub rd_error: bool,
    pub wr_error: bool,
    pub descriptor_invalid: bool,
}

impl DmaStatus {
    pub fn to_bits(&self) -> u64 {
        let mut reg = LocalRegisterCopy::<u64, Status::Register>::new(0);
        reg.modify(
            Status::BUSY.val(self.busy as u64)
                + Status::DESCRIPTOR_BUFFER_EMPTY.val(self.descriptor_buffer_empty as u64)
                + Status::DESCRIPTOR_BUFFER_FULL.val(self.descriptor_buffer_full as u64)
                + Status::RESPONSE_BUFFER_EMPTY.val(self.response_buffer_empty as u64)
                + Status::RESPONSE_BUFFER_FULL.val(self.response_buffer_full as u64)
                + Status::STOPPED.val(self.stopped as u64)
                + Status::RESETTING.val(self.resetting as u64)
                + Status::STOPPED_ON_ERROR.val(self.stopped_on_error as u64)
                + Status::RD_ERROR.val(self.rd_error as u64)
                + Status::WR_ERROR.val(self.wr_error as u64)
                + Status::DESCRIPTOR_INVALID.val(self.descriptor_invalid as u64),
        );
        reg.get()
    }

    pub fn from_bits(bits: u64) -> Self {
        let reg = LocalRegisterCopy::<u64, Status::Register>::new(bits);
        Self {
            busy: reg.is_set(Status::BUSY),
            descriptor_buffer_empty: reg.is_set(Status::DESCRIPTOR_BUFFER_EMPTY),
            descriptor_buffer_full: reg.is_set(Status::DESCRIPTOR_BUFFER_FULL),
            response_buffer_empty: reg.is_set(Status::RESPONSE_BUFFER_EMPTY),
            response_buffer_full: reg.is_set(Status::RESPONSE_BUFFER_FULL),
            stopped: reg.is_set(Status::STOPPED),
            resetting: reg.is_set(Status::RESETTING),
            stopped_on_error: reg.is_set(Status::STOPPED_ON_ERROR),
            rd_error: reg.is_set(Status::RD_ERROR),
            wr_error: reg.is_set(Status::WR_ERROR),
            descriptor_invalid: reg.is_set(Status::DESCRIPTOR_INVALID),
        }
    }
}

pub struct Coordinator {
    queue: DescriptorQueue,
    layout: LocalLayout,
    rd_src: RdSrc,
    wr_dest: WrDest,
    active: Option<Descriptor>,
    rd_error: Option<RdFault>,
    wr_error: Option<AxiResp>,
    descriptor_invalid: Option<DescriptorError>,
    stop_descriptors: bool,
    reset_pending: bool,
    rd_seq: u16,
    wr_seq: u16,
    rd_perf: PerfCounter,
    wr_perf: PerfCounter,
}

impl Coordinator {
    pub fn new(
        queue_depth: usize,
        buffer_depth: usize,
        max_beats: usize,
        burst: AxiBurst,
        layout: LocalLayout,
    ) -> Self {
        let (writer, reader) = TransferFifo::new(buffer_depth);
        Self {
            queue: DescriptorQueue::new(queue_depth),
            layout,
            rd_src: RdSrc::new(writer, max_beats, burst),
            wr_dest: WrDest::new(reader, max_beats, burst),
            active: None,
            rd_error: None,
            wr_error: None,
            descriptor_invalid: None,
            stop_descriptors: false,
            reset_pending: false,
            rd_seq: 0,
            wr_seq: 0,
            rd_perf: PerfCounter::default(),
            wr_perf: PerfCounter::default(),
        }
    }

    pub fn stopped_on_error(&self) -> bool {
        self.rd_error.is_some() || self.wr_error.is_some()
    }

    /// Admit a descriptor latched by a `go` write.
    pub fn submit(&mut self, desc: Descriptor) -> Result<(), AdmissionError> {
        if self.stopped_on_error() {
            log::warn!("dispatcher: go ignored while stopped on error");
            return Err(AdmissionError::StoppedOnError);
        }
        if let Err(err) = desc.validate(&self.layout) {
            log::warn!("dispatcher: rejected descriptor: {}", err);
            self.descriptor_invalid = Some(err);
            return Err(err.into());
        }
        if self.queue.push(desc).is_err() {
            log::warn!(
                "dispatcher: descriptor queue full ({} entries), descriptor dropped",
                self.queue.depth()
            );
            return Err(AdmissionError::QueueFull);
        }
        log::debug!("dispatcher: queued {:x?}", desc);
        Ok(())
    }

    /// Schedule a reset-dispatcher for the start of the next step.
    pub fn request_reset(&mut self) {
        self.reset_pending = true;
    }

    pub fn set_stop_descriptors(&mut self, stop: bool) {
        if stop != self.stop_descriptors {
            log::debug!(
                "dispatcher: descriptor processing {}",
                if stop { "paused" } else { "resumed" }
            );
        }
        self.stop_descriptors = stop;
    }

    /// One clock edge of the engine.
    pub fn step(&mut self, router: &mut Router) {
        if self.reset_pending {
            self.apply_reset(router);
        }
        self.dispatch(router);

        router.park();
        router.drive();
        let level = self.rd_src.buffer_level();
        let (rd_port, wr_port) = router.routed_ports();
        self.rd_src.step(rd_port, level);
        self.wr_dest.step(wr_port, level);
        router.commit();

        self.update();
    }

    fn apply_reset(&mut self, router: &mut Router) {
        self.rd_src.reset();
        self.wr_dest.reset();
        router.reset_ports();
        self.active = None;
        self.rd_error = None;
        self.wr_error = None;
        self.descriptor_invalid = None;
        self.rd_perf.reset();
        self.wr_perf.reset();
        self.reset_pending = false;
        log::info!(
            "dispatcher: reset, {} queued descriptors kept",
            self.queue.len()
        );
    }

    fn dispatch(&mut self, router: &mut Router) {
        if self.stopped_on_error()
            || self.stop_descriptors
            || self.rd_src.status().state != RdSrcState::Idle
            || self.wr_dest.status().state != WrDestState::Idle
        {
            return;
        }
        let Some(desc) = self.queue.pop() else {
            return;
        };
        let mode = match desc.validate(&self.layout) {
            Ok(mode) => mode,
            Err(err) => {
                log::warn!("dispatcher: dropped queued descriptor: {}", err);
                self.descriptor_invalid = Some(err);
                return;
            }
        };
        let route = router.select(mode, &desc);
        self.rd_perf.reset();
        self.wr_perf.reset();
        self.rd_src.start(route.src_addr, desc.length);
        self.wr_dest.start(route.dest_addr, desc.length);
        self.active = Some(desc);
        log::debug!(
            "dispatcher: started {:?} {:#x} -> {:#x}, {} lines",
            mode,
            desc.src_addr,
            desc.dest_addr,
            desc.length
        );
    }

    fn update(&mut self) {
        let rd = self.rd_src.status();
        let wr = self.wr_dest.status();

        if rd.state == RdSrcState::Error {
            self.rd_error = self.rd_error.or(rd.fault);
        }
        if wr.state == WrDestState::Error {
            self.wr_error = self.wr_error.or(wr.fault);
        }

        self.rd_perf.tick(rd.busy() || rd.beat_accepted, rd.beat_accepted);
        self.wr_perf.tick(wr.busy() || wr.beat_accepted, wr.beat_accepted);

        if rd.done {
            self.rd_seq = self.rd_seq.wrapping_add(1);
        }
        if wr.done {
            self.wr_seq = self.wr_seq.wrapping_add(1);
            if let Some(desc) = self.active.take() {
                log::debug!("dispatcher: descriptor to {:#x} complete", desc.dest_addr);
            }
        }
    }

    pub fn status(&self) -> DmaStatus {
        let rd = self.rd_src.status();
        let wr = self.wr_dest.status();
        DmaStatus {
            busy: rd.busy() || wr.busy() || !self.queue.is_empty(),
            descriptor_buffer_empty: self.queue.is_empty(),
            descriptor_buffer_full: self.queue.is_full(),
            response_buffer_empty: wr.responses_outstanding == 0,
            response_buffer_full: wr.responses_outstanding > 0,
            stopped: self.stop_descriptors,
            resetting: self.reset_pending,
            stopped_on_error: self.stopped_on_error(),
            rd_error: self.rd_error.is_some(),
            wr_error: self.wr_error.is_some(),
            descriptor_invalid: self.descriptor_invalid.is_some(),
        }
    }

    pub fn rd_status(&self) -> RdSrcStatus {
        self.rd_src.status()
    }

    pub fn wr_status(&self) -> WrDestStatus {
        self.wr_dest.status()
    }

    pub fn rd_error(&self) -> Option<RdFault> {
        self.rd_error
    }

    pub fn wr_error(&self) -> Option<AxiResp> {
        self.wr_error
    }

    pub fn descriptor_invalid(&self) -> Option<DescriptorError> {
        self.descriptor_invalid
    }

    pub fn active(&self) -> Option<&Descriptor> {
        self.active.as_ref()
    }

    pub fn queue(&self) -> &DescriptorQueue {
        &self.queue
    }

    pub fn fill_level_word(&self) -> u64 {
        let mut word = FillLevelWord(0);
        word.set_descriptors(self.queue.len() as u64);
        word.set_beats(self.rd_src.buffer_level().occupied as u64);
        word.0
    }

    pub fn resp_fill_level(&self) -> u64 {
        self.wr_dest.status().responses_outstanding as u64 & 0xffff
    }

    pub fn seq_num_word(&self) -> u64 {
        let mut word = SeqNumWord(0);
        word.set_rd_seq(self.rd_seq as u64);
        word.set_wr_seq(self.wr_seq as u64);
        word.0
    }

    pub fn rd_perf(&self) -> &PerfCounter {
        &self.rd_perf
    }

    pub fn wr_perf(&self) -> &PerfCounter {
        &self.wr_perf
    }
}
