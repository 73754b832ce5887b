//! Error types for the kernel
//!
//! Uses Rust's Result pattern; timeouts and blocking are `TakeOutcome`
//! variants, not errors.

use core::fmt;

/// Kernel error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
pub enum KernelError {
    // ============ Handle errors ============
    /// Operation on a deleted or unknown task/object
    InvalidHandle = 24002,
    /// Object is not of the type the operation expects
    WrongObjType = 24004,

    // ============ Mutex errors ============
    /// Caller is not the mutex owner
    NotOwner = 22401,
    /// Owner tried to take its own mutex again
    ReentrantLock = 22402,

    // ============ Scheduler errors ============
    /// No task is ready to run (missing idle task)
    NoReadyTask = 24204,

    // ============ Priority errors ============
    /// Priority outside `0..CFG_PRIO_MAX`
    InvalidPrio = 25203,

    // ============ Table errors ============
    /// No more TCBs available
    TaskTableFull = 29008,
    /// No more kernel object slots available
    ObjTableFull = 24001,
    /// The idle task cannot be deleted
    IdleTask = 29004,

    // ============ Timeout ============
    /// Operation timed out
    Timeout = 29401,
}

/// Result type alias for kernel operations
pub type KernelResult<T> = Result<T, KernelError>;

impl KernelError {
    /// Whether this error indicates misuse of the kernel by a task, as
    /// opposed to an expected control-flow result
    pub fn is_fatal(self) -> bool {
        !matches!(self, KernelError::Timeout)
    }

    /// Stable numeric code
    #[inline]
    pub fn code(self) -> u16 {
        self as u16
    }
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            KernelError::InvalidHandle => "invalid or deleted handle",
            KernelError::WrongObjType => "wrong kernel object type",
            KernelError::NotOwner => "caller does not own the mutex",
            KernelError::ReentrantLock => "mutex owner re-took its own mutex",
            KernelError::NoReadyTask => "no task ready to run",
            KernelError::InvalidPrio => "invalid priority",
            KernelError::TaskTableFull => "task table full",
            KernelError::ObjTableFull => "object table full",
            KernelError::IdleTask => "the idle task cannot be deleted",
            KernelError::Timeout => "operation timed out",
        };
        f.write_str(msg)
    }
}

impl core::error::Error for KernelError {}
