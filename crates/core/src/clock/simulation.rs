// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use super::{Clock, TimerHandle};
use std::collections::VecDeque;

#[derive(Debug)]
struct Alarm<E> {
    handle: TimerHandle,
    deadline: u64,
    event: E,
}

/// Fully deterministic clock: time only moves when `advance` is called.
#[derive(Debug)]
pub struct SimulationClock<E> {
    now: u64,
    next_handle: u64,
    // Sorted by deadline; equal deadlines keep insertion order.
    alarms: VecDeque<Alarm<E>>,
}

impl<E> Default for SimulationClock<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> SimulationClock<E> {
    pub fn new() -> Self {
        Self {
            now: 0,
            next_handle: 1,
            alarms: VecDeque::new(),
        }
    }

    pub fn pending_alarms(&self) -> usize {
        self.alarms.len()
    }

    pub(crate) fn link(&mut self, deadline: u64, event: E) -> TimerHandle {
        let handle = TimerHandle(self.next_handle);
        self.next_handle += 1;
        let idx = self.alarms.partition_point(|a| a.deadline <= deadline);
        self.alarms.insert(
            idx,
            Alarm {
                handle,
                deadline,
                event,
            },
        );
        handle
    }

    pub(crate) fn pop_due(&mut self, target: u64) -> Option<(u64, E)> {
        if self.alarms.front().is_some_and(|a| a.deadline <= target) {
            self.alarms.pop_front().map(|a| (a.deadline, a.event))
        } else {
            None
        }
    }

    pub(crate) fn set_now(&mut self, nanos: u64) {
        self.now = nanos;
    }
}

impl<E> Clock for SimulationClock<E> {
    type Event = E;

    fn now_nanos(&self) -> u64 {
        self.now
    }

    fn create_timer(&mut self, delta_nanos: u64, event: E) -> TimerHandle {
        let deadline = self.now.saturating_add(delta_nanos);
        self.link(deadline, event)
    }

    fn cancel_timer(&mut self, handle: TimerHandle) -> bool {
        if let Some(idx) = self.alarms.iter().position(|a| a.handle == handle) {
            self.alarms.remove(idx);
            true
        } else {
            false
        }
    }

    fn nanos_to_next_alarm(&self) -> Option<u64> {
        self.alarms
            .front()
            .map(|a| a.deadline.saturating_sub(self.now))
    }

    fn advance<F>(&mut self, delta_nanos: u64, mut on_fire: F)
    where
        F: FnMut(&mut Self, E),
    {
        let target = self.now.saturating_add(delta_nanos);
        while let Some((deadline, event)) = self.pop_due(target) {
            self.now = deadline;
            on_fire(self, event);
        }
        self.now = target;
    }
}
