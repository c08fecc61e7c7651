/*++

Licensed under the Apache-2.0 license.

File Name:

    perf.rs

Abstract:

    File contains the per-direction performance counters.

--*/

use bitfield::bitfield;

/// Largest value either 20-bit field can hold.
pub const PERF_FIELD_MAX: u64 = (1 << 20) - 1;

bitfield! {
    /// Performance counter CSR word
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct PerfCntrWord(u64);
    impl Debug;

    /// Cycles on which a data beat was accepted
    pub u64, valid_count, set_valid_count: 19, 0;

    /// Cycles on which the direction was active
    pub u64, clk_count, set_clk_count: 39, 20;
}

impl PerfCntrWord {
    /// Fraction of active cycles that moved a beat.
    pub fn uptime(&self) -> f64 {
        match self.clk_count() {
            0 => 0.0,
            clk => self.valid_count() as f64 / clk as f64,
        }
    }
}

/// Counts active cycles and accepted beats for one direction of the engine.
/// Once the clock field saturates both fields hold their values.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PerfCounter {
    clk: u64,
    valid: u64,
}

impl PerfCounter {
    pub fn tick(&mut self, active: bool, beat: bool) {
        if self.clk == PERF_FIELD_MAX {
            return;
        }
        if active {
            self.clk += 1;
        }
        if beat {
            self.valid = (self.valid + 1).min(PERF_FIELD_MAX);
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn to_bits(&self) -> u64 {
        let mut word = PerfCntrWord(0);
        word.set_valid_count(self.valid);
        word.set_clk_count(self.clk);
        word.0
    }
}
