// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};

pub const EXC_RESET: u32 = 1;
pub const EXC_NMI: u32 = 2;
pub const EXC_HARDFAULT: u32 = 3;
pub const EXC_SVCALL: u32 = 11;
pub const EXC_PENDSV: u32 = 14;
pub const EXC_SYSTICK: u32 = 15;
pub const EXC_IRQ_BASE: u32 = 16;

/// Execution priority of Thread mode with nothing active or masked.
pub const LOWEST_PRIORITY: i32 = 4;
pub const PRIORITY_LEVELS: usize = 4;

/// Highest IRQ number wired to an RP2040 peripheral.
pub const MAX_HARDWARE_IRQ: u32 = 25;

pub const EXC_RETURN_HANDLER: u32 = 0xFFFF_FFF1;
pub const EXC_RETURN_THREAD_MSP: u32 = 0xFFFF_FFF9;
pub const EXC_RETURN_THREAD_PSP: u32 = 0xFFFF_FFFD;

/// NVIC and SCB state of one core: IRQ pending/enable masks, the four
/// priority groups, system exception pending flags and their priority
/// registers.
///
/// `priorities[p]` holds the IRQ numbers configured at priority `p`, so
/// every IRQ bit is set in exactly one of the four masks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterruptController {
    pub pending: u32,
    pub enabled: u32,
    pub priorities: [u32; PRIORITY_LEVELS],
    pub pending_nmi: bool,
    pub pending_pendsv: bool,
    pub pending_systick: bool,
    pub pending_svcall: bool,
    pub shpr2: u32,
    pub shpr3: u32,
    pub vtor: u32,
    /// Set whenever pending/enabled/priority state changes; the next
    /// instruction boundary re-runs the preemption check.
    pub dirty: bool,
}

impl Default for InterruptController {
    fn default() -> Self {
        Self {
            pending: 0,
            enabled: 0,
            priorities: [0xFFFF_FFFF, 0, 0, 0],
            pending_nmi: false,
            pending_pendsv: false,
            pending_systick: false,
            pending_svcall: false,
            shpr2: 0,
            shpr3: 0,
            vtor: 0,
            dirty: false,
        }
    }
}

impl InterruptController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn svcall_priority(&self) -> i32 {
        (self.shpr2 >> 30) as i32
    }

    pub fn pendsv_priority(&self) -> i32 {
        ((self.shpr3 >> 22) & 0x3) as i32
    }

    pub fn systick_priority(&self) -> i32 {
        (self.shpr3 >> 30) as i32
    }

    pub fn irq_priority(&self, irq: u32) -> i32 {
        if irq >= 32 {
            return LOWEST_PRIORITY;
        }
        self.priorities
            .iter()
            .position(|mask| mask & (1 << irq) != 0)
            .map_or(LOWEST_PRIORITY, |p| p as i32)
    }

    pub fn exception_priority(&self, n: u32) -> i32 {
        match n {
            EXC_RESET => -3,
            EXC_NMI => -2,
            EXC_HARDFAULT => -1,
            EXC_SVCALL => self.svcall_priority(),
            EXC_PENDSV => self.pendsv_priority(),
            EXC_SYSTICK => self.systick_priority(),
            n if n < EXC_IRQ_BASE => LOWEST_PRIORITY,
            n => self.irq_priority(n - EXC_IRQ_BASE),
        }
    }

    /// Pends a system exception by number (NMI, SVCall, PendSV, SysTick) or
    /// an external interrupt (16 and up).
    pub fn pend_exception(&mut self, n: u32) {
        match n {
            EXC_NMI => self.pending_nmi = true,
            EXC_SVCALL => self.pending_svcall = true,
            EXC_PENDSV => self.pending_pendsv = true,
            EXC_SYSTICK => self.pending_systick = true,
            n if (EXC_IRQ_BASE..EXC_IRQ_BASE + 32).contains(&n) => {
                self.pending |= 1 << (n - EXC_IRQ_BASE);
            }
            _ => return,
        }
        self.dirty = true;
    }

    /// Applies an IRQ line level. Returns `true` on a new pending edge, in
    /// which case a waiting core must re-run the preemption check.
    pub fn set_interrupt(&mut self, irq: u32, high: bool) -> bool {
        if irq >= 32 {
            return false;
        }
        let bit = 1 << irq;
        if high && self.pending & bit == 0 {
            self.pending |= bit;
            self.dirty = true;
            true
        } else {
            if !high {
                self.pending &= !bit;
            }
            false
        }
    }

    /// ICSR.ISRPENDING
    pub fn any_pending(&self) -> bool {
        self.pending != 0 || self.pending_pendsv || self.pending_systick || self.pending_svcall
    }

    /// ICSR.VECTPENDING: the exception that would be taken next, ignoring
    /// the current execution priority and the IRQ enable mask.
    pub fn vect_pending(&self) -> u32 {
        if self.pending_nmi {
            return EXC_NMI;
        }
        for priority in 0..LOWEST_PRIORITY {
            if self.pending_svcall && priority == self.svcall_priority() {
                return EXC_SVCALL;
            }
            if self.pending_pendsv && priority == self.pendsv_priority() {
                return EXC_PENDSV;
            }
            if self.pending_systick && priority == self.systick_priority() {
                return EXC_SYSTICK;
            }
            let level = self.pending & self.priorities[priority as usize];
            if level != 0 {
                return EXC_IRQ_BASE + level.trailing_zeros();
            }
        }
        0
    }

    /// Picks the exception to take at an execution priority of
    /// `current_priority` and clears its pending state. NMI always wins;
    /// otherwise levels are scanned from 0 and within one level SVCall,
    /// PendSV and SysTick come before the lowest numbered enabled IRQ.
    ///
    /// Returns `None` and clears the dirty flag when nothing can preempt.
    pub fn select(&mut self, current_priority: i32) -> Option<u32> {
        if self.pending_nmi {
            self.pending_nmi = false;
            return Some(EXC_NMI);
        }

        let active = self.pending & self.enabled;
        for priority in 0..current_priority.min(LOWEST_PRIORITY) {
            if self.pending_svcall && priority == self.svcall_priority() {
                self.pending_svcall = false;
                return Some(EXC_SVCALL);
            }
            if self.pending_pendsv && priority == self.pendsv_priority() {
                self.pending_pendsv = false;
                return Some(EXC_PENDSV);
            }
            if self.pending_systick && priority == self.systick_priority() {
                self.pending_systick = false;
                return Some(EXC_SYSTICK);
            }
            let level = active & self.priorities[priority as usize];
            if level != 0 {
                let irq = level.trailing_zeros();
                // Lines above the last wired peripheral are never
                // re-asserted by hardware, so treat them as one-shot.
                if irq > MAX_HARDWARE_IRQ {
                    self.pending &= !(1 << irq);
                }
                return Some(EXC_IRQ_BASE + irq);
            }
        }

        self.dirty = false;
        None
    }

    /// NVIC_IPRn read: two priority bits per IRQ in bits [7:6] of each byte.
    pub fn read_ipr(&self, index: u32) -> u32 {
        let mut result = 0;
        for byte in 0..4 {
            let irq = index * 4 + byte;
            let priority = self.irq_priority(irq);
            if priority < LOWEST_PRIORITY {
                result |= (priority as u32) << (8 * byte + 6);
            }
        }
        result
    }

    pub fn write_ipr(&mut self, index: u32, value: u32) {
        for byte in 0..4 {
            let irq = index * 4 + byte;
            if irq >= 32 {
                continue;
            }
            let priority = ((value >> (8 * byte + 6)) & 0x3) as usize;
            for mask in self.priorities.iter_mut() {
                *mask &= !(1 << irq);
            }
            self.priorities[priority] |= 1 << irq;
        }
        self.dirty = true;
    }
}
