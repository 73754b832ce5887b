//! Configuration for the kernel
//!
//! Compile-time constants bound the table sizes; `KernelConfig` holds the
//! knobs that scenarios change at runtime.

use crate::types::{Prio, Tick};

/// Maximum number of priority levels
pub const CFG_PRIO_MAX: usize = 64;

/// Maximum number of task slots, idle task included
pub const CFG_TASK_MAX: usize = 32;

/// Maximum number of semaphores and mutexes alive at once
pub const CFG_OBJ_MAX: usize = 16;

/// Default time quanta for round-robin scheduling
pub const CFG_TIME_QUANTA_DEFAULT: Tick = 10;

/// Enable round-robin scheduling for same-priority tasks
pub const CFG_SCHED_ROUND_ROBIN_EN: bool = true;

/// Zero-time requests a task may issue before the kernel charges it a tick
pub const CFG_STEP_BUDGET: u32 = 64;

/// Number of scheduling events kept in the trace history
pub const CFG_TRACE_LEN: usize = 128;

/// Idle task priority
pub const CFG_PRIO_IDLE: Prio = 0;

/// Runtime kernel configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelConfig {
    pub(crate) round_robin: bool,
    pub(crate) time_quanta: Tick,
    pub(crate) step_budget: u32,
}

impl KernelConfig {
    pub const fn new() -> Self {
        KernelConfig {
            round_robin: CFG_SCHED_ROUND_ROBIN_EN,
            time_quanta: CFG_TIME_QUANTA_DEFAULT,
            step_budget: CFG_STEP_BUDGET,
        }
    }

    /// Enable or disable time slicing among equal-priority tasks
    pub const fn round_robin(mut self, enabled: bool) -> Self {
        self.round_robin = enabled;
        self
    }

    /// Ticks a task may run before yielding to an equal-priority peer.
    /// Zero is treated as one.
    pub const fn time_quanta(mut self, ticks: Tick) -> Self {
        self.time_quanta = if ticks == 0 { 1 } else { ticks };
        self
    }

    pub const fn step_budget(mut self, steps: u32) -> Self {
        self.step_budget = if steps == 0 { 1 } else { steps };
        self
    }

    #[inline]
    pub fn is_round_robin(&self) -> bool {
        self.round_robin
    }

    #[inline]
    pub fn quanta(&self) -> Tick {
        self.time_quanta
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self::new()
    }
}
