//! Helpers for driving the kernel from tests and demos
//!
//! [`Flag`] is a completion marker that remembers the tick it was first set
//! at. [`Script`] is a [`Runnable`] built from a list of operations, which
//! covers the usual "take, compute, give, forever" task bodies without
//! hand-writing a state machine.

use alloc::sync::Arc;
use alloc::vec::Vec;

use portable_atomic::{AtomicU64, Ordering};

use crate::task::{Runnable, Step, TaskContext};
use crate::types::{ObjId, Tick, Timeout};

/// Shareable completion marker
///
/// Clones share the same marker. Only the first `set` is recorded.
#[derive(Debug, Clone)]
pub struct Flag {
    at: Arc<AtomicU64>,
}

impl Flag {
    const UNSET: u64 = u64::MAX;

    pub fn new() -> Self {
        Flag {
            at: Arc::new(AtomicU64::new(Self::UNSET)),
        }
    }

    /// Mark the flag at tick `now`; later calls keep the first tick
    pub fn set(&self, now: Tick) {
        let _ = self
            .at
            .compare_exchange(Self::UNSET, now, Ordering::AcqRel, Ordering::Acquire);
    }

    #[inline]
    pub fn is_set(&self) -> bool {
        self.set_at().is_some()
    }

    /// Tick at which the flag was first set
    pub fn set_at(&self) -> Option<Tick> {
        match self.at.load(Ordering::Acquire) {
            Self::UNSET => None,
            at => Some(at),
        }
    }
}

impl Default for Flag {
    fn default() -> Self {
        Self::new()
    }
}

/// One operation of a [`Script`]
#[derive(Debug, Clone)]
pub enum Op {
    Work(Tick),
    Yield,
    Delay(Tick),
    /// Take an object; if it is not acquired the rest of the pass is skipped
    Take(ObjId, Timeout),
    Give(ObjId),
    /// Set a flag; costs no time
    Mark(Flag),
}

/// A task body that runs a fixed list of operations, once or forever
///
/// ```
/// use pirtos::harness::{Flag, Script};
/// use pirtos::{Kernel, Timeout};
///
/// let mut kernel = Kernel::new();
/// let sem = kernel.semaphore_create().unwrap();
/// kernel.give(sem).unwrap();
///
/// let done = Flag::new();
/// let body = Script::new()
///     .take(sem, Timeout::Forever)
///     .work(5)
///     .mark(&done)
///     .give(sem);
/// kernel.create_task(body, 1, "worker").unwrap();
///
/// kernel.run_for(10).unwrap();
/// assert_eq!(done.set_at(), Some(5));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Script {
    ops: Vec<Op>,
    pc: usize,
    repeat: bool,
    /// Whether the current pass returned any request
    issued: bool,
}

impl Script {
    pub fn new() -> Self {
        Script::default()
    }

    fn push(mut self, op: Op) -> Self {
        self.ops.push(op);
        self
    }

    pub fn work(self, ticks: Tick) -> Self {
        self.push(Op::Work(ticks))
    }

    pub fn yield_now(self) -> Self {
        self.push(Op::Yield)
    }

    pub fn delay(self, ticks: Tick) -> Self {
        self.push(Op::Delay(ticks))
    }

    pub fn take(self, obj: ObjId, timeout: impl Into<Timeout>) -> Self {
        self.push(Op::Take(obj, timeout.into()))
    }

    pub fn give(self, obj: ObjId) -> Self {
        self.push(Op::Give(obj))
    }

    pub fn mark(self, flag: &Flag) -> Self {
        self.push(Op::Mark(flag.clone()))
    }

    /// Start over after the last operation instead of exiting
    pub fn repeat(mut self) -> Self {
        self.repeat = true;
        self
    }
}

impl Runnable for Script {
    fn step(&mut self, cx: &mut TaskContext) -> Step {
        if let Some(outcome) = cx.outcome() {
            if !outcome.is_acquired() {
                self.pc = self.ops.len();
            }
        }

        loop {
            if self.pc >= self.ops.len() {
                if !self.repeat {
                    return Step::Exit;
                }
                self.pc = 0;

                // A pass of marks only would otherwise spin without a tick
                if !core::mem::replace(&mut self.issued, false) {
                    return Step::Yield;
                }
            }

            let op = &self.ops[self.pc];
            self.pc += 1;

            let step = match op {
                Op::Mark(flag) => {
                    flag.set(cx.now());
                    continue;
                }
                Op::Work(ticks) => Step::Work(*ticks),
                Op::Yield => Step::Yield,
                Op::Delay(ticks) => Step::Delay(*ticks),
                Op::Take(obj, timeout) => Step::Take(*obj, *timeout),
                Op::Give(obj) => Step::Give(*obj),
            };
            self.issued = true;
            return step;
        }
    }
}
