//! Core type definitions for the kernel
//!
//! These types provide strong typing for kernel handles and task state.

use core::fmt;

/// Task priority (larger value = more urgent, 0 = idle)
pub type Prio = u8;

/// Tick counter type
pub type Tick = u64;

/// Handle to a task in the registry
///
/// A handle is a slot index plus the generation of that slot. Once a
/// terminated task's slot is reclaimed, old handles stop resolving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TaskId {
    pub(crate) index: u16,
    pub(crate) generation: u16,
}

impl TaskId {
    pub(crate) const fn new(index: usize, generation: u16) -> Self {
        TaskId { index: index as u16, generation }
    }

    /// Slot index in the task table
    #[inline]
    pub fn index(self) -> usize {
        self.index as usize
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}.{}", self.index, self.generation)
    }
}

/// Handle to a kernel object (semaphore or mutex)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ObjId {
    pub(crate) index: u16,
    pub(crate) generation: u16,
}

impl ObjId {
    pub(crate) const fn new(index: usize, generation: u16) -> Self {
        ObjId { index: index as u16, generation }
    }

    #[inline]
    pub fn index(self) -> usize {
        self.index as usize
    }
}

impl fmt::Display for ObjId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obj#{}.{}", self.index, self.generation)
    }
}

/// Task state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum TaskState {
    /// Task is ready to run
    Ready = 0,
    /// Task owns the CPU
    Running = 1,
    /// Task is pending on a kernel object or delayed
    Blocked = 2,
    /// Task was deleted; its counters stay readable until the slot is reclaimed
    Terminated = 3,
}

/// Kernel object type marker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ObjType {
    Semaphore,
    Mutex,
}

/// Pend status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum PendStatus {
    /// Pend succeeded
    Ok = 0,
    /// Object was deleted while pending
    Del = 1,
    /// Timeout occurred
    Timeout = 2,
}

/// How long a `take` may block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Timeout {
    /// Fail immediately if the object is unavailable
    NoWait,
    /// Block for at most this many ticks
    Ticks(Tick),
    /// Block until the object is given
    Forever,
}

impl Timeout {
    /// Whether a take must fail at once instead of blocking
    ///
    /// `Ticks(0)` behaves like `NoWait`.
    #[inline]
    pub fn is_no_wait(self) -> bool {
        matches!(self, Timeout::NoWait | Timeout::Ticks(0))
    }

    /// Absolute expiry tick, if any, for a pend starting at `now`
    pub(crate) fn deadline(self, now: Tick) -> Option<Tick> {
        match self {
            Timeout::NoWait => Some(now),
            Timeout::Ticks(t) => Some(now.saturating_add(t)),
            Timeout::Forever => None,
        }
    }
}

impl From<Tick> for Timeout {
    fn from(ticks: Tick) -> Self {
        if ticks == 0 {
            Timeout::NoWait
        } else {
            Timeout::Ticks(ticks)
        }
    }
}

/// Result of a `take` on a semaphore or mutex
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TakeOutcome {
    Acquired,
    TimedOut,
    /// The object was deleted while the task was waiting on it
    Deleted,
}

impl TakeOutcome {
    /// Convert into a `Result`, mapping anything but `Acquired` to an error
    pub fn acquired(self) -> crate::error::KernelResult<()> {
        match self {
            TakeOutcome::Acquired => Ok(()),
            TakeOutcome::TimedOut => Err(crate::error::KernelError::Timeout),
            TakeOutcome::Deleted => Err(crate::error::KernelError::InvalidHandle),
        }
    }

    #[inline]
    pub fn is_acquired(self) -> bool {
        self == TakeOutcome::Acquired
    }
}

impl From<PendStatus> for TakeOutcome {
    fn from(status: PendStatus) -> Self {
        match status {
            PendStatus::Ok => TakeOutcome::Acquired,
            PendStatus::Timeout => TakeOutcome::TimedOut,
            PendStatus::Del => TakeOutcome::Deleted,
        }
    }
}
