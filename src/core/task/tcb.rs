//! Task Control Block (TCB) definition
//!
//! The TCB contains all the information needed to manage a task. List links
//! are slot indices into the task table rather than pointers.

use alloc::boxed::Box;

use crate::task::Runnable;
use crate::types::{ObjId, PendStatus, Prio, TakeOutcome, TaskState, Tick};

/// Task Control Block
pub struct Tcb {
    // ============ Task identification ============
    /// Task name
    pub name: &'static str,

    // ============ Task body ============
    /// Work function; `None` once the task is terminated
    pub(crate) runnable: Option<Box<dyn Runnable>>,

    // ============ Ready list links ============
    pub(crate) next: Option<usize>,
    pub(crate) prev: Option<usize>,

    // ============ Pend list links ============
    pub(crate) pend_next: Option<usize>,
    pub(crate) pend_prev: Option<usize>,
    /// Object this task is pending on
    pub(crate) blocked_on: Option<ObjId>,
    /// Result of pend operation
    pub(crate) pend_status: PendStatus,
    /// Outcome of the last take, handed to the next step
    pub(crate) outcome: Option<TakeOutcome>,

    // ============ Delay / timeout ============
    /// Tick at which a delay or pend timeout expires
    pub(crate) wake_at: Option<Tick>,

    // ============ Priority ============
    /// Effective priority
    pub(crate) prio: Prio,
    /// Base priority
    pub(crate) base_prio: Prio,

    // ============ State ============
    pub(crate) state: TaskState,

    // ============ Time slicing ============
    /// Remaining time quanta
    pub(crate) time_quanta_ctr: Tick,

    // ============ Execution / accounting ============
    /// Ticks of `Step::Work` still owed
    pub(crate) remaining_work: Tick,
    /// Zero-time requests issued during tick `steps_at`
    pub(crate) steps: u32,
    pub(crate) steps_at: Tick,
    /// Accumulated ticks spent Running
    pub(crate) run_time: Tick,
    /// Tick at which the task was last dispatched
    pub(crate) dispatched_at: Tick,
    /// Number of times the task was dispatched
    pub(crate) activations: u32,
}

impl Tcb {
    pub(crate) fn new(name: &'static str, prio: Prio, runnable: Box<dyn Runnable>) -> Self {
        Tcb {
            name,
            runnable: Some(runnable),

            next: None,
            prev: None,

            pend_next: None,
            pend_prev: None,
            blocked_on: None,
            pend_status: PendStatus::Ok,
            outcome: None,

            wake_at: None,

            prio,
            base_prio: prio,

            state: TaskState::Ready,

            time_quanta_ctr: 0,

            remaining_work: 0,
            steps: 0,
            steps_at: 0,
            run_time: 0,
            dispatched_at: 0,
            activations: 0,
        }
    }

    /// Check if task is ready to run or running
    #[inline]
    pub fn is_runnable(&self) -> bool {
        matches!(self.state, TaskState::Ready | TaskState::Running)
    }

    #[inline]
    pub fn is_terminated(&self) -> bool {
        self.state == TaskState::Terminated
    }
}

/// Slot in the task table
pub(crate) struct TaskSlot {
    pub(crate) generation: u16,
    pub(crate) tcb: Tcb,
}
