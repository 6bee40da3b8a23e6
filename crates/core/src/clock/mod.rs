// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Virtual time sources.
//!
//! Both backends share the [`Clock`] interface: alarms carry a typed event
//! instead of a callback, and the owner of the clock dispatches the events
//! handed to `on_fire` during [`Clock::advance`].

pub mod realtime;
pub mod simulation;

pub use realtime::RealtimeClock;
pub use simulation::SimulationClock;

use serde::{Deserialize, Serialize};

pub const NANOS_PER_SECOND: u64 = 1_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimerHandle(pub u64);

pub trait Clock {
    type Event;

    fn now_nanos(&self) -> u64;

    fn now_micros(&self) -> u64 {
        self.now_nanos() / 1000
    }

    fn create_timer(&mut self, delta_nanos: u64, event: Self::Event) -> TimerHandle;

    /// Returns `false` if the timer already fired or was cancelled.
    fn cancel_timer(&mut self, handle: TimerHandle) -> bool;

    /// Time until the earliest pending alarm, `None` if nothing is scheduled.
    fn nanos_to_next_alarm(&self) -> Option<u64>;

    /// Moves time forward by `delta_nanos`, firing due alarms in deadline
    /// order. `now_nanos()` equals the alarm's deadline while its event is
    /// being handled.
    fn advance<F>(&mut self, delta_nanos: u64, on_fire: F)
    where
        Self: Sized,
        F: FnMut(&mut Self, Self::Event);
}

/// Elapsed time of `cycles` at `clock_hz`, computed from the cumulative count
/// so repeated conversions never drift.
pub fn cycles_to_nanos(cycles: u64, clock_hz: u64) -> u64 {
    if clock_hz == 0 {
        return 0;
    }
    ((cycles as u128 * NANOS_PER_SECOND as u128) / clock_hz as u128) as u64
}

/// Cycles needed to cover `nanos`, rounded up.
pub fn nanos_to_cycles(nanos: u64, clock_hz: u64) -> u64 {
    let num = nanos as u128 * clock_hz as u128;
    num.div_ceil(NANOS_PER_SECOND as u128) as u64
}
