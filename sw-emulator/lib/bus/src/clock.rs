/*++

Licensed under the Apache-2.0 license.

File Name:

    clock.rs

Abstract:

    File contains the engine clock and the latency timers derived from it.
    Memory models hold a Timer, schedule a deadline when a request arrives
    and poll it on every step.

--*/

use std::{
    cell::{Cell, RefCell},
    collections::BTreeMap,
    rc::Rc,
};

/// Cycle counter shared by every model on the emulated board.
///
/// ```
/// use dma_emu_bus::Clock;
///
/// let clock = Clock::new();
/// let timer = clock.timer();
/// let mut latency = Some(timer.schedule_poll_in(3));
/// clock.increment(2);
/// assert!(!timer.fired(&mut latency));
/// clock.increment(1);
/// assert!(timer.fired(&mut latency));
/// ```
#[derive(Default)]
pub struct Clock {
    state: Rc<ClockState>,
}

impl Clock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle models use to schedule deadlines against this clock.
    pub fn timer(&self) -> Timer {
        Timer {
            state: Rc::clone(&self.state),
        }
    }

    /// Cycles elapsed since the board came out of reset.
    #[inline]
    pub fn now(&self) -> u64 {
        self.state.cycle.get()
    }

    /// Advances the clock by `cycles`. Returns true when a scheduled deadline
    /// is due after the advance.
    pub fn increment(&self, cycles: u64) -> bool {
        let cycle = self
            .now()
            .checked_add(cycles)
            .unwrap_or_else(|| panic!("clock overflow advancing {cycles} cycles"));
        self.state.cycle.set(cycle);
        self.state
            .earliest()
            .is_some_and(|deadline| deadline <= cycle)
    }

    /// Deadlines that are scheduled and have not been observed or cancelled.
    pub fn pending_actions(&self) -> usize {
        self.state.deadlines.borrow().len()
    }
}

/// Deadline returned by [`Timer::schedule_poll_in`].
#[derive(Debug, PartialEq, Eq)]
pub struct ActionHandle {
    id: u64,
    deadline: u64,
    owner: *const ClockState,
}

#[derive(Clone)]
pub struct Timer {
    state: Rc<ClockState>,
}

impl Timer {
    pub fn new(clock: &Clock) -> Self {
        clock.timer()
    }

    #[inline]
    pub fn now(&self) -> u64 {
        self.state.cycle.get()
    }

    /// Schedules a deadline at absolute cycle `cycle`.
    pub fn schedule_poll_at(&self, cycle: u64) -> ActionHandle {
        let id = self.state.next_id.get();
        self.state.next_id.set(id + 1);
        self.state.deadlines.borrow_mut().insert(id, cycle);
        ActionHandle {
            id,
            deadline: cycle,
            owner: Rc::as_ptr(&self.state),
        }
    }

    /// Schedules a deadline `cycles` from now. Zero is due immediately.
    pub fn schedule_poll_in(&self, cycles: u64) -> ActionHandle {
        self.schedule_poll_at(self.now().saturating_add(cycles))
    }

    /// Takes `action` and returns true once its deadline has passed. An empty
    /// slot never fires.
    pub fn fired(&self, action: &mut Option<ActionHandle>) -> bool {
        let due = match action {
            Some(handle) => {
                self.check_owner(handle);
                handle.deadline <= self.now()
            }
            None => false,
        };
        if due {
            if let Some(handle) = action.take() {
                self.state.deadlines.borrow_mut().remove(&handle.id);
            }
        }
        due
    }

    /// Drops a deadline before it fires.
    ///
    /// # Panics
    ///
    /// Panics if `action` was scheduled on a different clock.
    pub fn cancel(&self, action: ActionHandle) {
        self.check_owner(&action);
        self.state.deadlines.borrow_mut().remove(&action.id);
    }

    fn check_owner(&self, action: &ActionHandle) {
        assert_eq!(
            action.owner,
            Rc::as_ptr(&self.state),
            "action scheduled on another clock"
        );
    }
}

#[derive(Default)]
struct ClockState {
    cycle: Cell<u64>,
    next_id: Cell<u64>,
    /// Outstanding deadlines keyed by scheduling order.
    deadlines: RefCell<BTreeMap<u64, u64>>,
}

impl ClockState {
    fn earliest(&self) -> Option<u64> {
        self.deadlines.borrow().values().min().copied()
    }
}
