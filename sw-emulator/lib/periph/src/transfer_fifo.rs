/*++

Licensed under the Apache-2.0 license.

File Name:

    transfer_fifo.rs

Abstract:

    File contains the transfer buffer between the read-source and the
    write-destination state machines: a single-producer single-consumer ring
    of data beats.

--*/

use crate::axi::Beat;
use std::cell::Cell;
use std::rc::Rc;
use thiserror::Error;

/// Returned by [`FifoWriter::push`] when the buffer has no free slot. Carries
/// the rejected beat back to the caller.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("transfer buffer full")]
pub struct FifoFull(pub Beat);

struct Ring {
    slots: Box<[Cell<Beat>]>,
    /// Free running, written only by the producer.
    wr_ptr: Cell<u32>,
    /// Free running, written only by the consumer.
    rd_ptr: Cell<u32>,
}

impl Ring {
    fn depth(&self) -> u32 {
        self.slots.len() as u32
    }

    fn len(&self) -> u32 {
        self.wr_ptr.get().wrapping_sub(self.rd_ptr.get())
    }

    fn slot(&self, ptr: u32) -> &Cell<Beat> {
        &self.slots[(ptr & (self.depth() - 1)) as usize]
    }
}

/// Occupancy of the buffer sampled at the start of the evaluation phase.
/// Both state machines decide against the same sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FifoLevel {
    pub occupied: u32,
    pub depth: u32,
}

impl FifoLevel {
    pub fn can_push(&self) -> bool {
        self.occupied < self.depth
    }

    pub fn can_pop(&self) -> bool {
        self.occupied > 0
    }
}

pub struct TransferFifo;

impl TransferFifo {
    /// Creates a buffer of `depth` beats and returns its two ends.
    ///
    /// * Panics
    ///
    /// Panics if `depth` is not a power of two.
    #[allow(clippy::new_ret_no_self)]
    pub fn new(depth: usize) -> (FifoWriter, FifoReader) {
        assert!(
            depth.is_power_of_two() && depth <= u32::MAX as usize / 2,
            "Transfer buffer depth must be a power of two."
        );
        let ring = Rc::new(Ring {
            slots: (0..depth).map(|_| Cell::new(Beat::zeroed())).collect(),
            wr_ptr: Cell::new(0),
            rd_ptr: Cell::new(0),
        });
        (
            FifoWriter {
                ring: Rc::clone(&ring),
            },
            FifoReader { ring },
        )
    }
}

/// Producer end, owned by the read-source state machine.
pub struct FifoWriter {
    ring: Rc<Ring>,
}

impl FifoWriter {
    pub fn push(&mut self, beat: Beat) -> Result<(), FifoFull> {
        if self.is_full() {
            return Err(FifoFull(beat));
        }
        let wr = self.ring.wr_ptr.get();
        self.ring.slot(wr).set(beat);
        self.ring.wr_ptr.set(wr.wrapping_add(1));
        Ok(())
    }

    pub fn is_full(&self) -> bool {
        self.ring.len() == self.ring.depth()
    }

    pub fn len(&self) -> usize {
        self.ring.len() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.ring.len() == 0
    }

    pub fn level(&self) -> FifoLevel {
        FifoLevel {
            occupied: self.ring.len(),
            depth: self.ring.depth(),
        }
    }
}

/// Consumer end, owned by the write-destination state machine.
pub struct FifoReader {
    ring: Rc<Ring>,
}

impl FifoReader {
    pub fn pop(&mut self) -> Option<Beat> {
        let beat = self.peek()?;
        let rd = self.ring.rd_ptr.get();
        self.ring.rd_ptr.set(rd.wrapping_add(1));
        Some(beat)
    }

    /// Head of the buffer, left in place.
    pub fn peek(&self) -> Option<Beat> {
        if self.is_empty() {
            return None;
        }
        Some(self.ring.slot(self.ring.rd_ptr.get()).get())
    }

    /// Discard everything currently buffered.
    pub fn flush(&mut self) {
        self.ring.rd_ptr.set(self.ring.wr_ptr.get());
    }

    pub fn is_empty(&self) -> bool {
        self.ring.len() == 0
    }

    pub fn len(&self) -> usize {
        self.ring.len() as usize
    }

    pub fn depth(&self) -> usize {
        self.ring.depth() as usize
    }
}
