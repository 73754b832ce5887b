//! Time management module
//!
//! Provides the tick handler, task delays, timeout expiry, and per-task
//! run-time accounting.

use crate::error::KernelResult;
use crate::kernel::{Kernel, TraceEvent};
use crate::types::{PendStatus, TakeOutcome, TaskId, TaskState, Tick};

impl Kernel {
    /// Current tick count
    #[inline]
    pub fn now(&self) -> Tick {
        self.tick
    }

    /// Tick handler
    ///
    /// Advances the time base by one tick on behalf of the running task,
    /// expires delays and pend timeouts, rotates equal-priority tasks, and
    /// reschedules.
    pub fn tick(&mut self) -> KernelResult<()> {
        if let Some(cur) = self.current {
            let tcb = &mut self.tasks[cur].tcb;
            tcb.remaining_work = tcb.remaining_work.saturating_sub(1);
        }

        self.tick = self.tick.wrapping_add(1);

        self.process_delayed_tasks();
        self.sched_round_robin();
        self.sched()
    }

    /// Block the running task for `ticks` ticks
    pub(crate) fn delay_current(&mut self, ticks: Tick) {
        if ticks == 0 {
            return;
        }

        let Some(cur) = self.current else { return };

        self.rdy_list_remove(cur);

        let tcb = &mut self.tasks[cur].tcb;
        tcb.state = TaskState::Blocked;
        tcb.wake_at = Some(self.tick.saturating_add(ticks));

        let id = self.task_id(cur);
        self.trace(TraceEvent::Block { tick: self.tick, task: id, on: None });
    }

    /// Wake tasks whose delay or pend timeout has expired, in slot order
    fn process_delayed_tasks(&mut self) {
        let now = self.tick;

        for idx in 0..self.tasks.len() {
            let tcb = &self.tasks[idx].tcb;
            let due = tcb.state == TaskState::Blocked && matches!(tcb.wake_at, Some(at) if at <= now);
            if due {
                self.expire(idx);
            }
        }
    }

    /// Make a blocked task ready because its deadline passed
    fn expire(&mut self, idx: usize) {
        let pending_on = self.tasks[idx].tcb.blocked_on;

        let status = match pending_on {
            Some(obj) => {
                self.pend_list_remove(obj, idx);
                PendStatus::Timeout
            }
            None => PendStatus::Ok,
        };

        let tcb = &mut self.tasks[idx].tcb;
        tcb.wake_at = None;
        tcb.blocked_on = None;
        tcb.pend_status = status;
        if pending_on.is_some() {
            tcb.outcome = Some(TakeOutcome::TimedOut);
        }
        tcb.state = TaskState::Ready;
        self.rdy_list_insert(idx);

        let id = self.task_id(idx);
        self.trace(TraceEvent::Wake { tick: self.tick, task: id, status });

        // A waiter that gave up no longer lends its priority to the owner
        if let Some(obj) = pending_on {
            if let Some(owner) = self.mutex_owner_index(obj) {
                self.refresh_prio(owner);
            }
        }
    }

    // ============ Accounting ============

    /// Record the dispatch tick of a task becoming Running
    #[inline]
    pub(crate) fn account_in(&mut self, idx: usize) {
        self.tasks[idx].tcb.dispatched_at = self.tick;
    }

    /// Charge the outgoing task for the ticks it ran
    #[inline]
    pub(crate) fn account_out(&mut self, idx: usize) {
        let now = self.tick;
        let tcb = &mut self.tasks[idx].tcb;
        tcb.run_time = tcb.run_time.wrapping_add(now.wrapping_sub(tcb.dispatched_at));
        tcb.dispatched_at = now;
    }

    /// Ticks the task has spent Running
    ///
    /// Valid for blocked and terminated tasks; for the running task the
    /// current slice is included.
    pub fn elapsed_ticks(&self, id: TaskId) -> KernelResult<Tick> {
        let idx = self.resolve_task(id)?;
        let tcb = &self.tasks[idx].tcb;

        let mut total = tcb.run_time;
        if self.current == Some(idx) {
            total = total.wrapping_add(self.tick.wrapping_sub(tcb.dispatched_at));
        }
        Ok(total)
    }
}
