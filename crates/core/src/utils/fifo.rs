// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use serde::{Serialize, Serializer};

/// Fixed-capacity ring buffer. Pushing into a full FIFO drops the value,
/// pulling from an empty one yields the default.
#[derive(Debug, Clone)]
pub struct Fifo<T: Copy + Default = u32> {
    buffer: Vec<T>,
    start: usize,
    used: usize,
}

impl<T: Copy + Default> Fifo<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: vec![T::default(); capacity],
            start: 0,
            used: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    pub fn len(&self) -> usize {
        self.used
    }

    pub fn is_empty(&self) -> bool {
        self.used == 0
    }

    pub fn is_full(&self) -> bool {
        self.used == self.buffer.len()
    }

    /// Returns `false` if the value was dropped.
    pub fn push(&mut self, value: T) -> bool {
        if self.is_full() {
            return false;
        }
        let cap = self.buffer.len();
        self.buffer[(self.start + self.used) % cap] = value;
        self.used += 1;
        true
    }

    pub fn pull(&mut self) -> T {
        if self.used == 0 {
            return T::default();
        }
        let value = self.buffer[self.start];
        self.start = (self.start + 1) % self.buffer.len();
        self.used -= 1;
        value
    }

    pub fn peek(&self) -> T {
        if self.used == 0 {
            T::default()
        } else {
            self.buffer[self.start]
        }
    }

    pub fn reset(&mut self) {
        self.used = 0;
    }

    /// Items in pull order.
    pub fn items(&self) -> Vec<T> {
        let cap = self.buffer.len();
        (0..self.used)
            .map(|i| self.buffer[(self.start + i) % cap])
            .collect()
    }
}

impl<T: Copy + Default + Serialize> Serialize for Fifo<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.items())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_pull_order() {
        let mut fifo: Fifo = Fifo::new(3);
        assert!(fifo.is_empty());
        fifo.push(1);
        fifo.push(2);
        assert_eq!(fifo.peek(), 1);
        assert_eq!(fifo.pull(), 1);
        fifo.push(3);
        fifo.push(4);
        assert!(fifo.is_full());
        assert_eq!(fifo.items(), vec![2, 3, 4]);
    }

    #[test]
    fn test_overflow_drops_and_underflow_returns_zero() {
        let mut fifo: Fifo = Fifo::new(2);
        assert!(fifo.push(10));
        assert!(fifo.push(20));
        assert!(!fifo.push(30));
        assert_eq!(fifo.len(), 2);
        assert_eq!(fifo.pull(), 10);
        assert_eq!(fifo.pull(), 20);
        assert_eq!(fifo.pull(), 0);
        assert_eq!(fifo.peek(), 0);
    }

    #[test]
    fn test_reset() {
        let mut fifo: Fifo = Fifo::new(4);
        fifo.push(7);
        fifo.reset();
        assert!(fifo.is_empty());
        assert_eq!(fifo.pull(), 0);
    }
}
