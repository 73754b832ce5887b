//! Binary semaphore implementation
//!
//! A binary semaphore has no owner and never changes any task's priority,
//! which is exactly what lets a medium-priority task starve a high-priority
//! waiter while a low-priority task holds it.

use crate::error::{KernelError, KernelResult};
use crate::kernel::Kernel;
use crate::sync::KernelObject;
use crate::task::TaskSlot;
use crate::types::{ObjId, PendStatus, TakeOutcome, Timeout};

/// Pend list for tasks waiting on a kernel object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendList {
    head: Option<usize>,
    tail: Option<usize>,
    count: usize,
}

impl PendList {
    /// Create a new empty pend list
    pub const fn new() -> Self {
        PendList {
            head: None,
            tail: None,
            count: 0,
        }
    }

    /// Check if list is empty
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Get head of list
    #[inline(always)]
    pub fn head(&self) -> Option<usize> {
        self.head
    }

    #[inline(always)]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Insert a task at the tail
    pub(crate) fn insert(&mut self, tasks: &mut [TaskSlot], idx: usize) {
        {
            let tcb = &mut tasks[idx].tcb;
            tcb.pend_next = None;
            tcb.pend_prev = self.tail;
        }

        match self.tail {
            Some(tail) => tasks[tail].tcb.pend_next = Some(idx),
            None => self.head = Some(idx),
        }

        self.tail = Some(idx);
        self.count += 1;
    }

    /// Insert in priority order, behind waiters of equal priority
    pub(crate) fn insert_by_prio(&mut self, tasks: &mut [TaskSlot], idx: usize) {
        let prio = tasks[idx].tcb.prio;

        let mut current = self.head;
        let mut prev: Option<usize> = None;

        while let Some(cur) = current {
            if prio > tasks[cur].tcb.prio {
                break;
            }
            prev = current;
            current = tasks[cur].tcb.pend_next;
        }

        {
            let tcb = &mut tasks[idx].tcb;
            tcb.pend_prev = prev;
            tcb.pend_next = current;
        }

        match prev {
            Some(p) => tasks[p].tcb.pend_next = Some(idx),
            None => self.head = Some(idx),
        }

        match current {
            Some(c) => tasks[c].tcb.pend_prev = Some(idx),
            None => self.tail = Some(idx),
        }

        self.count += 1;
    }

    /// Remove specific task from list
    pub(crate) fn remove(&mut self, tasks: &mut [TaskSlot], idx: usize) {
        let (prev, next) = {
            let tcb = &tasks[idx].tcb;
            (tcb.pend_prev, tcb.pend_next)
        };

        match prev {
            Some(prev) => tasks[prev].tcb.pend_next = next,
            None => self.head = next,
        }

        match next {
            Some(next) => tasks[next].tcb.pend_prev = prev,
            None => self.tail = prev,
        }

        let tcb = &mut tasks[idx].tcb;
        tcb.pend_prev = None;
        tcb.pend_next = None;

        self.count = self.count.saturating_sub(1);
    }

    /// Remove and return the first waiter
    pub(crate) fn pop_head(&mut self, tasks: &mut [TaskSlot]) -> Option<usize> {
        let head = self.head?;
        self.remove(tasks, head);
        Some(head)
    }

    /// Waiters in wake-up order
    pub(crate) fn iter<'a>(&self, tasks: &'a [TaskSlot]) -> impl Iterator<Item = usize> + 'a {
        let mut cursor = self.head;
        core::iter::from_fn(move || {
            let idx = cursor?;
            cursor = tasks[idx].tcb.pend_next;
            Some(idx)
        })
    }
}

impl Default for PendList {
    fn default() -> Self {
        Self::new()
    }
}

/// Binary semaphore
#[derive(Debug)]
pub struct Semaphore {
    /// Whether a take would succeed immediately
    available: bool,
    /// Tasks waiting on this semaphore, FIFO
    pub(crate) pend_list: PendList,
}

impl Semaphore {
    /// Create a new, unavailable semaphore
    pub const fn new() -> Self {
        Semaphore {
            available: false,
            pend_list: PendList::new(),
        }
    }

    #[inline(always)]
    pub fn is_available(&self) -> bool {
        self.available
    }

    /// Take without blocking
    fn try_take(&mut self) -> bool {
        core::mem::replace(&mut self.available, false)
    }
}

impl Default for Semaphore {
    fn default() -> Self {
        Self::new()
    }
}

impl Kernel {
    /// Create a binary semaphore
    ///
    /// The semaphore starts unavailable; give it once to make it available.
    ///
    /// # Returns
    /// * `Err(KernelError::ObjTableFull)` - no free object slot
    pub fn semaphore_create(&mut self) -> KernelResult<ObjId> {
        self.obj_create(KernelObject::Sem(Semaphore::new()))
    }

    /// Whether a take on the semaphore would succeed immediately
    pub fn semaphore_available(&self, id: ObjId) -> KernelResult<bool> {
        let idx = self.resolve_obj(id)?;
        match &self.objects[idx].obj {
            Some(KernelObject::Sem(sem)) => Ok(sem.is_available()),
            _ => Err(KernelError::WrongObjType),
        }
    }

    /// Wait on (take) the semaphore on behalf of `task`
    ///
    /// If the semaphore is unavailable the task is appended to the wait-list
    /// and blocked until a give or until `timeout` expires.
    pub(crate) fn sem_take(&mut self, task: usize, id: ObjId, timeout: Timeout) -> KernelResult<()> {
        let idx = self.resolve_obj(id)?;
        let acquired = match self.objects[idx].obj.as_mut() {
            Some(KernelObject::Sem(sem)) => sem.try_take(),
            _ => return Err(KernelError::WrongObjType),
        };

        if acquired {
            self.tasks[task].tcb.outcome = Some(TakeOutcome::Acquired);
            return Ok(());
        }

        if timeout.is_no_wait() {
            self.tasks[task].tcb.outcome = Some(TakeOutcome::TimedOut);
            return Ok(());
        }

        self.pend_current(task, id, timeout, false);
        Ok(())
    }

    /// Signal (give) the semaphore
    ///
    /// Wakes the earliest waiter, which implicitly takes the semaphore, or
    /// marks it available if nobody waits. Giving an available semaphore
    /// changes nothing.
    pub(crate) fn sem_give(&mut self, id: ObjId) -> KernelResult<()> {
        let idx = self.resolve_obj(id)?;

        let waiter = {
            let Kernel { tasks, objects, .. } = self;
            let sem = match objects[idx].obj.as_mut() {
                Some(KernelObject::Sem(sem)) => sem,
                _ => return Err(KernelError::WrongObjType),
            };

            let waiter = sem.pend_list.pop_head(tasks);
            if waiter.is_none() {
                sem.available = true;
            }
            waiter
        };

        if let Some(waiter) = waiter {
            self.wake_waiter(waiter, PendStatus::Ok);
        }
        Ok(())
    }
}
