// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use super::{Clock, SimulationClock, TimerHandle};
use std::time::{Duration, Instant};

/// Clock paced against the host's wall time.
///
/// Simulated time still only moves in `advance`, but the call sleeps whenever
/// the simulation gets ahead of real time. `pause`/`resume` rebase the wall
/// reference so a halted debugger session does not cause a catch-up burst.
#[derive(Debug)]
pub struct RealtimeClock<E> {
    inner: SimulationClock<E>,
    base: Instant,
    base_nanos: u64,
    paused: bool,
}

impl<E> Default for RealtimeClock<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> RealtimeClock<E> {
    pub fn new() -> Self {
        Self {
            inner: SimulationClock::new(),
            base: Instant::now(),
            base_nanos: 0,
            paused: false,
        }
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        if self.paused {
            self.base = Instant::now();
            self.base_nanos = self.inner.now_nanos();
            self.paused = false;
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    fn wall_nanos(&self) -> u64 {
        self.base_nanos
            .saturating_add(self.base.elapsed().as_nanos().min(u64::MAX as u128) as u64)
    }
}

impl<E> Clock for RealtimeClock<E> {
    type Event = E;

    fn now_nanos(&self) -> u64 {
        self.inner.now_nanos()
    }

    fn create_timer(&mut self, delta_nanos: u64, event: E) -> TimerHandle {
        self.inner.create_timer(delta_nanos, event)
    }

    fn cancel_timer(&mut self, handle: TimerHandle) -> bool {
        self.inner.cancel_timer(handle)
    }

    fn nanos_to_next_alarm(&self) -> Option<u64> {
        self.inner.nanos_to_next_alarm()
    }

    fn advance<F>(&mut self, delta_nanos: u64, mut on_fire: F)
    where
        F: FnMut(&mut Self, E),
    {
        let target = self.inner.now_nanos().saturating_add(delta_nanos);
        if !self.paused {
            let wall = self.wall_nanos();
            if target > wall {
                std::thread::sleep(Duration::from_nanos(target - wall));
            }
        }
        while let Some((deadline, event)) = self.inner.pop_due(target) {
            self.inner.set_now(deadline);
            on_fire(self, event);
        }
        self.inner.set_now(target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_waits_for_wall_time() {
        let mut clock: RealtimeClock<u8> = RealtimeClock::new();
        clock.create_timer(1_000_000, 7);
        let start = Instant::now();
        let mut fired = Vec::new();
        clock.advance(2_000_000, |c, e| fired.push((c.now_nanos(), e)));
        assert!(start.elapsed() >= Duration::from_millis(1));
        assert_eq!(fired, vec![(1_000_000, 7)]);
        assert_eq!(clock.now_nanos(), 2_000_000);
    }

    #[test]
    fn test_paused_clock_does_not_sleep() {
        let mut clock: RealtimeClock<()> = RealtimeClock::new();
        clock.pause();
        let start = Instant::now();
        clock.advance(5_000_000_000, |_, _| {});
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(clock.now_nanos(), 5_000_000_000);
    }
}
