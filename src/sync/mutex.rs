//! Mutex implementation with priority inheritance
//!
//! Mutexes provide mutual exclusion with automatic priority boosting
//! to prevent priority inversion.
//!
//! A task's effective priority is always derived, never accumulated: it is
//! the maximum of its base priority and the priority of the head waiter of
//! every mutex it owns. Any event that can change that maximum (a new
//! waiter, a waiter timing out or being deleted, a release) recomputes it and
//! follows the chain of owners blocked on further mutexes.

use crate::config::{CFG_OBJ_MAX, CFG_TASK_MAX};
use crate::error::{KernelError, KernelResult};
use crate::kernel::{Kernel, TraceEvent};
use crate::sync::{KernelObject, PendList};
use crate::types::{ObjId, PendStatus, Prio, TakeOutcome, TaskId, TaskState, Timeout};

/// Mutex with priority inheritance
#[derive(Debug)]
pub struct Mutex {
    /// Task that owns the mutex
    pub(crate) owner: Option<usize>,
    /// List of tasks waiting on this mutex, highest priority first
    pub(crate) pend_list: PendList,
}

impl Mutex {
    /// Create a new, unowned mutex
    pub const fn new() -> Self {
        Mutex {
            owner: None,
            pend_list: PendList::new(),
        }
    }

    #[inline(always)]
    pub fn is_owned(&self) -> bool {
        self.owner.is_some()
    }
}

impl Default for Mutex {
    fn default() -> Self {
        Self::new()
    }
}

impl Kernel {
    /// Create a priority-inheritance mutex
    ///
    /// # Returns
    /// * `Err(KernelError::ObjTableFull)` - no free object slot
    pub fn mutex_create(&mut self) -> KernelResult<ObjId> {
        self.obj_create(KernelObject::Mutex(Mutex::new()))
    }

    /// Current owner of a mutex
    pub fn mutex_owner(&self, id: ObjId) -> KernelResult<Option<TaskId>> {
        let idx = self.resolve_obj(id)?;
        match &self.objects[idx].obj {
            Some(KernelObject::Mutex(mutex)) => Ok(mutex.owner.map(|owner| self.task_id(owner))),
            _ => Err(KernelError::WrongObjType),
        }
    }

    /// Acquire the mutex on behalf of `task`
    ///
    /// If the mutex is owned by a lower-priority task, the owner's priority
    /// is boosted to the caller's for as long as the caller waits.
    ///
    /// # Returns
    /// * `Err(KernelError::ReentrantLock)` - `task` already owns the mutex
    pub(crate) fn mutex_take(&mut self, task: usize, id: ObjId, timeout: Timeout) -> KernelResult<()> {
        let idx = self.resolve_obj(id)?;
        let mutex = match self.objects[idx].obj.as_mut() {
            Some(KernelObject::Mutex(mutex)) => mutex,
            _ => return Err(KernelError::WrongObjType),
        };

        if !mutex.is_owned() {
            mutex.owner = Some(task);
            self.tasks[task].tcb.outcome = Some(TakeOutcome::Acquired);
            return Ok(());
        }

        let owner = match mutex.owner {
            Some(owner) if owner != task => owner,
            _ => return Err(KernelError::ReentrantLock),
        };

        if timeout.is_no_wait() {
            self.tasks[task].tcb.outcome = Some(TakeOutcome::TimedOut);
            return Ok(());
        }

        self.pend_current(task, id, timeout, true);

        // The new waiter may outrank the owner
        self.refresh_prio(owner);
        Ok(())
    }

    /// Release the mutex
    ///
    /// Giving an unowned mutex is a no-op. `caller` is `None` when the give
    /// comes from outside any task.
    ///
    /// # Returns
    /// * `Err(KernelError::NotOwner)` - the mutex is owned by another task
    pub(crate) fn mutex_give(&mut self, caller: Option<usize>, id: ObjId) -> KernelResult<()> {
        let idx = self.resolve_obj(id)?;
        let owner = match &self.objects[idx].obj {
            Some(KernelObject::Mutex(mutex)) => mutex.owner,
            _ => return Err(KernelError::WrongObjType),
        };

        match owner {
            None => Ok(()),
            Some(owner) if Some(owner) == caller => {
                self.mutex_release(id, owner);
                Ok(())
            }
            Some(_) => Err(KernelError::NotOwner),
        }
    }

    /// Hand the mutex to its highest-priority waiter, or leave it unowned
    ///
    /// The previous owner drops any priority it inherited through this mutex;
    /// the new owner inherits from the waiters left behind.
    pub(crate) fn mutex_release(&mut self, id: ObjId, owner: usize) {
        let next = {
            let Kernel { tasks, objects, .. } = self;
            let Some(KernelObject::Mutex(mutex)) = objects[id.index()].obj.as_mut() else {
                return;
            };
            let next = mutex.pend_list.pop_head(tasks);
            mutex.owner = next;
            next
        };

        if let Some(next) = next {
            self.wake_waiter(next, PendStatus::Ok);
        }

        self.refresh_prio(owner);
        if let Some(next) = next {
            self.refresh_prio(next);
        }
    }

    // ============ Priority inheritance ============

    /// Priority a task is entitled to from the mutexes it owns
    pub(crate) fn inherited_prio(&self, task: usize) -> Prio {
        let mut prio = self.tasks[task].tcb.base_prio;

        for slot in self.objects.iter() {
            if let Some(KernelObject::Mutex(mutex)) = &slot.obj {
                if mutex.owner != Some(task) {
                    continue;
                }
                if let Some(head) = mutex.pend_list.head() {
                    prio = prio.max(self.tasks[head].tcb.prio);
                }
            }
        }
        prio
    }

    /// Recompute a task's effective priority and propagate along the chain
    ///
    /// If the task is itself blocked on a mutex, its new priority may change
    /// what that mutex's owner inherits, and so on. The walk is bounded by
    /// the task table size so a deadlock cycle cannot spin forever.
    pub(crate) fn refresh_prio(&mut self, task: usize) {
        let mut task = task;

        for _ in 0..CFG_TASK_MAX {
            let from = self.tasks[task].tcb.prio;
            let to = self.inherited_prio(task);
            if from == to {
                return;
            }

            self.change_prio(task, to);

            let id = self.task_id(task);
            self.trace(TraceEvent::PrioChange { tick: self.tick, task: id, from, to });
            crate::debug!("{} priority {} -> {}", id, from, to);

            match self.tasks[task].tcb.blocked_on.and_then(|obj| self.mutex_owner_index(obj)) {
                Some(owner) => task = owner,
                None => return,
            }
        }
    }

    /// Set a task's effective priority, keeping every list it sits in ordered
    fn change_prio(&mut self, task: usize, prio: Prio) {
        match self.tasks[task].tcb.state {
            TaskState::Ready | TaskState::Running => self.rdy_list_change_prio(task, prio),
            TaskState::Blocked => {
                self.tasks[task].tcb.prio = prio;

                let Some(obj) = self.tasks[task].tcb.blocked_on else { return };
                let Kernel { tasks, objects, .. } = self;
                if let Some(KernelObject::Mutex(mutex)) = objects[obj.index()].obj.as_mut() {
                    mutex.pend_list.remove(tasks, task);
                    mutex.pend_list.insert_by_prio(tasks, task);
                }
            }
            TaskState::Terminated => self.tasks[task].tcb.prio = prio,
        }
    }

    /// Owner slot of a live mutex; `None` for semaphores and free mutexes
    pub(crate) fn mutex_owner_index(&self, id: ObjId) -> Option<usize> {
        let idx = self.resolve_obj(id).ok()?;
        match &self.objects[idx].obj {
            Some(KernelObject::Mutex(mutex)) => mutex.owner,
            _ => None,
        }
    }

    /// Handles of every mutex owned by `task`
    pub(crate) fn mutexes_owned_by(&self, task: usize) -> heapless::Vec<ObjId, CFG_OBJ_MAX> {
        self.objects
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| match &slot.obj {
                Some(KernelObject::Mutex(mutex)) if mutex.owner == Some(task) => {
                    Some(ObjId::new(idx, slot.generation))
                }
                _ => None,
            })
            .collect()
    }
}
