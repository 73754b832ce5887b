//! Task management module
//!
//! Provides task creation and deletion, and the interface task bodies use to
//! make requests of the kernel.

mod tcb;

pub use tcb::Tcb;
pub(crate) use tcb::TaskSlot;

use alloc::boxed::Box;

use crate::config::{CFG_OBJ_MAX, CFG_PRIO_MAX, CFG_TASK_MAX};
use crate::error::{KernelError, KernelResult};
use crate::kernel::{Kernel, TraceEvent};
use crate::types::{ObjId, Prio, TakeOutcome, TaskId, TaskState, Tick, Timeout};

/// Task table storage
pub(crate) type TaskTable = heapless::Vec<TaskSlot, CFG_TASK_MAX>;

/// A request returned by [`Runnable::step`]
///
/// Only `Take` (on an unavailable object), `Delay` and `Yield` give up the
/// CPU voluntarily. `Work` keeps the task running but may be preempted at any
/// tick boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Step {
    /// Compute for this many ticks before being stepped again
    Work(Tick),
    /// Move to the back of the ready bucket for this priority
    Yield,
    /// Block for this many ticks (0 = no-op)
    Delay(Tick),
    /// Take a semaphore or mutex; the outcome is visible on the next step
    Take(ObjId, Timeout),
    /// Give a semaphore or mutex
    Give(ObjId),
    /// Delete the calling task
    Exit,
}

/// A resumable task body
///
/// The kernel calls `step` whenever the task is running and has no
/// outstanding work. Each call must return promptly with the next request.
pub trait Runnable: Send {
    fn step(&mut self, cx: &mut TaskContext) -> Step;
}

impl<F> Runnable for F
where
    F: FnMut(&mut TaskContext) -> Step + Send,
{
    fn step(&mut self, cx: &mut TaskContext) -> Step {
        self(cx)
    }
}

/// Read-only view of the kernel handed to a task on each step
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub(crate) id: TaskId,
    pub(crate) now: Tick,
    pub(crate) prio: Prio,
    pub(crate) base_prio: Prio,
    pub(crate) outcome: Option<TakeOutcome>,
}

impl TaskContext {
    /// Handle of the running task
    #[inline]
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Current tick
    #[inline]
    pub fn now(&self) -> Tick {
        self.now
    }

    /// Effective priority
    #[inline]
    pub fn priority(&self) -> Prio {
        self.prio
    }

    #[inline]
    pub fn base_priority(&self) -> Prio {
        self.base_prio
    }

    /// Outcome of the `Step::Take` returned by the previous step, if any
    #[inline]
    pub fn outcome(&self) -> Option<TakeOutcome> {
        self.outcome
    }
}

impl Kernel {
    /// Create a new task
    ///
    /// The task is placed at the tail of the ready list for `prio`. If it
    /// outranks the running task it is dispatched immediately.
    ///
    /// # Returns
    /// * `Err(KernelError::InvalidPrio)` - `prio >= CFG_PRIO_MAX`
    /// * `Err(KernelError::TaskTableFull)` - no free or reclaimable slot
    pub fn create_task<R>(&mut self, runnable: R, prio: Prio, name: &'static str) -> KernelResult<TaskId>
    where
        R: Runnable + 'static,
    {
        if prio as usize >= CFG_PRIO_MAX {
            return Err(KernelError::InvalidPrio);
        }

        let id = self.spawn(Box::new(runnable), prio, name)?;
        self.sched()?;
        Ok(id)
    }

    /// Internal task creation, no reschedule
    pub(crate) fn spawn(
        &mut self,
        runnable: Box<dyn Runnable>,
        prio: Prio,
        name: &'static str,
    ) -> KernelResult<TaskId> {
        let tcb = Tcb::new(name, prio, runnable);

        let idx = if !self.tasks.is_full() {
            let idx = self.tasks.len();
            self.tasks
                .push(TaskSlot { generation: 0, tcb })
                .map_err(|_| KernelError::TaskTableFull)?;
            idx
        } else {
            // Reclaim the first terminated slot
            let idx = self
                .tasks
                .iter()
                .position(|slot| slot.tcb.is_terminated())
                .ok_or(KernelError::TaskTableFull)?;
            let slot = &mut self.tasks[idx];
            slot.generation = slot.generation.wrapping_add(1);
            slot.tcb = tcb;
            idx
        };

        self.rdy_list_insert(idx);

        let id = self.task_id(idx);
        self.trace(TraceEvent::Create { tick: self.tick, task: id, prio });
        crate::debug!("create {} '{}' prio {}", id, name, prio);
        Ok(id)
    }

    /// Delete a task
    ///
    /// A blocked task is removed from its wait-list; mutexes it holds are
    /// handed to their next waiter as if it had given them.
    ///
    /// # Returns
    /// * `Err(KernelError::InvalidHandle)` - unknown or already deleted task
    /// * `Err(KernelError::IdleTask)` - attempt to delete the idle task
    pub fn delete_task(&mut self, id: TaskId) -> KernelResult<()> {
        let idx = self.live_task(id)?;
        self.delete_index(idx)?;
        self.sched()
    }

    pub(crate) fn delete_index(&mut self, idx: usize) -> KernelResult<()> {
        if idx == self.idle {
            return Err(KernelError::IdleTask);
        }

        let tcb = &self.tasks[idx].tcb;
        if tcb.is_terminated() {
            return Err(KernelError::InvalidHandle);
        }
        let pending_on = tcb.blocked_on;

        if tcb.is_runnable() {
            self.rdy_list_remove(idx);
        } else if let Some(obj) = pending_on {
            self.pend_list_remove(obj, idx);
        }

        if self.current == Some(idx) {
            self.account_out(idx);
            self.current = None;
        }

        let tcb = &mut self.tasks[idx].tcb;
        tcb.state = TaskState::Terminated;
        tcb.blocked_on = None;
        tcb.wake_at = None;
        tcb.outcome = None;
        tcb.remaining_work = 0;
        tcb.runnable = None;

        let held: heapless::Vec<ObjId, CFG_OBJ_MAX> = self.mutexes_owned_by(idx);
        for obj in held {
            self.mutex_release(obj, idx);
        }

        // The mutex it was waiting on may have been boosting its owner
        if let Some(obj) = pending_on {
            if let Some(owner) = self.mutex_owner_index(obj) {
                self.refresh_prio(owner);
            }
        }

        let id = self.task_id(idx);
        self.trace(TraceEvent::Delete { tick: self.tick, task: id });
        crate::debug!("delete {}", id);
        Ok(())
    }

    /// Resolve a handle to a slot index; terminated tasks still resolve
    pub(crate) fn resolve_task(&self, id: TaskId) -> KernelResult<usize> {
        match self.tasks.get(id.index()) {
            Some(slot) if slot.generation == id.generation => Ok(id.index()),
            _ => Err(KernelError::InvalidHandle),
        }
    }

    /// Resolve a handle to a slot index of a task that is not terminated
    pub(crate) fn live_task(&self, id: TaskId) -> KernelResult<usize> {
        let idx = self.resolve_task(id)?;
        if self.tasks[idx].tcb.is_terminated() {
            return Err(KernelError::InvalidHandle);
        }
        Ok(idx)
    }

    #[inline]
    pub(crate) fn task_id(&self, idx: usize) -> TaskId {
        TaskId::new(idx, self.tasks[idx].generation)
    }

    /// State of a task
    pub fn task_state(&self, id: TaskId) -> KernelResult<TaskState> {
        let idx = self.resolve_task(id)?;
        Ok(self.tasks[idx].tcb.state)
    }

    /// Effective (possibly inherited) priority of a task
    pub fn effective_priority(&self, id: TaskId) -> KernelResult<Prio> {
        let idx = self.resolve_task(id)?;
        Ok(self.tasks[idx].tcb.prio)
    }

    pub fn base_priority(&self, id: TaskId) -> KernelResult<Prio> {
        let idx = self.resolve_task(id)?;
        Ok(self.tasks[idx].tcb.base_prio)
    }

    pub fn task_name(&self, id: TaskId) -> KernelResult<&'static str> {
        let idx = self.resolve_task(id)?;
        Ok(self.tasks[idx].tcb.name)
    }

    /// Number of times the task has been dispatched
    pub fn activations(&self, id: TaskId) -> KernelResult<u32> {
        let idx = self.resolve_task(id)?;
        Ok(self.tasks[idx].tcb.activations)
    }

    /// Object the task is currently blocked on, if any
    pub fn blocked_on(&self, id: TaskId) -> KernelResult<Option<ObjId>> {
        let idx = self.resolve_task(id)?;
        Ok(self.tasks[idx].tcb.blocked_on)
    }

    /// Task that owns the CPU
    pub fn current_task(&self) -> Option<TaskId> {
        self.current.map(|idx| self.task_id(idx))
    }

    pub fn idle_task(&self) -> TaskId {
        self.task_id(self.idle)
    }

    /// Handles of all tasks that are not terminated, in slot order
    pub fn live_tasks(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.tasks
            .iter()
            .enumerate()
            .filter(|(_, slot)| !slot.tcb.is_terminated())
            .map(|(idx, slot)| TaskId::new(idx, slot.generation))
    }
}
