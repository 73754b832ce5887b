//! Priority-preemptive RTOS kernel model in Rust
//!
//! A deterministic, single-core kernel providing:
//! - Priority-based preemptive scheduling with optional round-robin
//! - Synchronization primitives (binary semaphores, priority-inheritance mutexes)
//! - Tick-based delays and take timeouts
//! - Per-task CPU-time accounting for verifying scheduling behaviour

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

extern crate alloc;

// ============ Modules ============

pub mod log;

pub mod core;
pub mod sync;
pub mod harness;

// ============ Re-exports ============

pub use crate::core::config;
pub use crate::core::config::*;
pub use crate::core::critical;
pub use crate::core::critical::SharedKernel;
pub use crate::core::error;
pub use crate::core::error::{KernelError, KernelResult};
pub use crate::core::kernel;
pub use crate::core::kernel::{Kernel, TraceEvent};
pub use crate::core::prio;
pub use crate::core::types;
pub use crate::core::types::*;
pub use crate::core::task;
pub use crate::core::task::{Runnable, Step, TaskContext};
pub use crate::core::sched;
pub use crate::core::time;

pub use sync::mutex;
pub use sync::sem;
