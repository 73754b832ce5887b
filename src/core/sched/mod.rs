//! Scheduler module
//!
//! Priority-based preemptive scheduler with round-robin for same priority.

mod rdy_list;

pub use rdy_list::ReadyList;

use crate::error::{KernelError, KernelResult};
use crate::kernel::{Kernel, TraceEvent};
use crate::types::{Prio, TaskId, TaskState};

impl Kernel {
    /// Main scheduling point
    ///
    /// Determines the highest priority ready task and switches to it if it
    /// is not already running. Called after any operation that may change
    /// task readiness or priority, so preemption is immediate.
    pub(crate) fn sched(&mut self) -> KernelResult<()> {
        let next = self.highest_ready().ok_or(KernelError::NoReadyTask)?;

        if self.current == Some(next) {
            // A yield or rotation with no peer to switch to
            self.tasks[next].tcb.state = TaskState::Running;
            return Ok(());
        }

        if let Some(cur) = self.current.take() {
            let tcb = &mut self.tasks[cur].tcb;
            if tcb.state == TaskState::Running {
                tcb.state = TaskState::Ready;
            }
            self.account_out(cur);
        }

        let quanta = self.config.time_quanta;
        let tcb = &mut self.tasks[next].tcb;
        tcb.state = TaskState::Running;
        tcb.time_quanta_ctr = quanta;
        tcb.activations = tcb.activations.wrapping_add(1);

        self.account_in(next);
        self.current = Some(next);
        self.ctx_switches += 1;

        let id = self.task_id(next);
        self.trace(TraceEvent::Dispatch { tick: self.tick, task: id });
        crate::trace!("dispatch {} at {}", id, self.tick);
        Ok(())
    }

    /// Slot of the head of the highest non-empty ready list
    pub(crate) fn highest_ready(&self) -> Option<usize> {
        let prio = self.prio_tbl.get_highest()?;
        self.rdy_list[prio as usize].head()
    }

    /// Task the scheduler would run next
    ///
    /// The ready task with the highest effective priority; ties go to the
    /// one that became ready first.
    ///
    /// # Returns
    /// * `Err(KernelError::NoReadyTask)` - the ready index is empty
    pub fn pick_next(&self) -> KernelResult<TaskId> {
        self.highest_ready()
            .map(|idx| self.task_id(idx))
            .ok_or(KernelError::NoReadyTask)
    }

    /// Ready and running tasks at `prio`, in scheduling order
    ///
    /// Empty for a priority outside `0..CFG_PRIO_MAX`.
    pub fn ready_at(&self, prio: Prio) -> impl Iterator<Item = TaskId> + '_ {
        let list = self.rdy_list.get(prio as usize).copied().unwrap_or_default();
        list.iter(&self.tasks).map(move |idx| self.task_id(idx))
    }

    /// Move the running task to the back of its ready list
    pub(crate) fn yield_current(&mut self) {
        let Some(cur) = self.current else { return };
        let prio = self.tasks[cur].tcb.prio as usize;

        let Kernel { tasks, rdy_list, .. } = self;
        let list = &mut rdy_list[prio];
        if list.head() != list.tail() {
            list.remove(tasks, cur);
            list.insert_tail(tasks, cur);
        }
        tasks[cur].tcb.state = TaskState::Ready;
    }

    /// Round-robin scheduling for tasks at the same priority
    ///
    /// Called once per tick. When the running task's quanta runs out it is
    /// rotated behind its equal-priority peers.
    pub(crate) fn sched_round_robin(&mut self) {
        if !self.config.round_robin {
            return;
        }

        let Some(cur) = self.current else { return };
        let quanta = self.config.time_quanta;

        let Kernel { tasks, rdy_list, .. } = self;
        let tcb = &mut tasks[cur].tcb;

        if tcb.time_quanta_ctr > 0 {
            tcb.time_quanta_ctr -= 1;
        }

        if tcb.time_quanta_ctr == 0 {
            tcb.time_quanta_ctr = quanta;

            let list = &mut rdy_list[tcb.prio as usize];

            // Only rotate if more than one task at this priority
            if list.head() != list.tail() {
                list.remove(tasks, cur);
                list.insert_tail(tasks, cur);
                tasks[cur].tcb.state = TaskState::Ready;
            }
        }
    }

    /// Make a task ready
    pub(crate) fn rdy_list_insert(&mut self, idx: usize) {
        let prio = self.tasks[idx].tcb.prio;
        self.rdy_list[prio as usize].insert_tail(&mut self.tasks, idx);
        self.prio_tbl.insert(prio);
    }

    /// Remove a task from ready list
    pub(crate) fn rdy_list_remove(&mut self, idx: usize) {
        let prio = self.tasks[idx].tcb.prio;
        let list = &mut self.rdy_list[prio as usize];
        list.remove(&mut self.tasks, idx);

        if list.is_empty() {
            self.prio_tbl.remove(prio);
        }
    }

    /// Move a ready or running task to a different priority
    ///
    /// The task goes to the tail of the new priority's list.
    pub(crate) fn rdy_list_change_prio(&mut self, idx: usize, new_prio: Prio) {
        let old_prio = self.tasks[idx].tcb.prio;
        if old_prio == new_prio {
            return;
        }

        self.rdy_list_remove(idx);
        self.tasks[idx].tcb.prio = new_prio;
        self.rdy_list_insert(idx);
    }
}
