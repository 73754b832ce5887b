//! Synchronization primitives
//!
//! Contains semaphores and mutexes, the object table that owns them, and
//! the pend/wake plumbing both share.

pub mod mutex;
pub mod sem;

pub use mutex::Mutex;
pub use sem::{PendList, Semaphore};

use crate::config::{CFG_OBJ_MAX, CFG_TASK_MAX};
use crate::error::{KernelError, KernelResult};
use crate::kernel::{Kernel, TraceEvent};
use crate::types::{ObjId, ObjType, PendStatus, TaskId, TaskState, Timeout};

/// A semaphore or mutex stored in the object table
#[derive(Debug)]
pub(crate) enum KernelObject {
    Sem(Semaphore),
    Mutex(Mutex),
}

impl KernelObject {
    fn obj_type(&self) -> ObjType {
        match self {
            KernelObject::Sem(_) => ObjType::Semaphore,
            KernelObject::Mutex(_) => ObjType::Mutex,
        }
    }

    fn pend_list(&self) -> &PendList {
        match self {
            KernelObject::Sem(sem) => &sem.pend_list,
            KernelObject::Mutex(mutex) => &mutex.pend_list,
        }
    }

    fn pend_list_mut(&mut self) -> &mut PendList {
        match self {
            KernelObject::Sem(sem) => &mut sem.pend_list,
            KernelObject::Mutex(mutex) => &mut mutex.pend_list,
        }
    }
}

#[derive(Debug)]
pub(crate) struct ObjSlot {
    pub(crate) generation: u16,
    pub(crate) obj: Option<KernelObject>,
}

/// Object table storage
pub(crate) type ObjTable = heapless::Vec<ObjSlot, CFG_OBJ_MAX>;

impl Kernel {
    /// Store a new object, reusing the first free slot
    pub(crate) fn obj_create(&mut self, obj: KernelObject) -> KernelResult<ObjId> {
        let id = match self.objects.iter().position(|slot| slot.obj.is_none()) {
            Some(idx) => {
                let slot = &mut self.objects[idx];
                slot.obj = Some(obj);
                ObjId::new(idx, slot.generation)
            }
            None => {
                let idx = self.objects.len();
                self.objects
                    .push(ObjSlot { generation: 0, obj: Some(obj) })
                    .map_err(|_| KernelError::ObjTableFull)?;
                ObjId::new(idx, 0)
            }
        };

        crate::debug!("create {}", id);
        Ok(id)
    }

    /// Resolve a handle to a slot index of a live object
    pub(crate) fn resolve_obj(&self, id: ObjId) -> KernelResult<usize> {
        match self.objects.get(id.index()) {
            Some(slot) if slot.generation == id.generation && slot.obj.is_some() => Ok(id.index()),
            _ => Err(KernelError::InvalidHandle),
        }
    }

    /// Whether the handle names a semaphore or a mutex
    pub fn object_type(&self, id: ObjId) -> KernelResult<ObjType> {
        let idx = self.resolve_obj(id)?;
        self.objects[idx]
            .obj
            .as_ref()
            .map(KernelObject::obj_type)
            .ok_or(KernelError::InvalidHandle)
    }

    /// Tasks waiting on the object, in wake-up order
    pub fn waiters(&self, id: ObjId) -> KernelResult<heapless::Vec<TaskId, CFG_TASK_MAX>> {
        let idx = self.resolve_obj(id)?;
        let obj = self.objects[idx].obj.as_ref().ok_or(KernelError::InvalidHandle)?;

        Ok(obj
            .pend_list()
            .iter(&self.tasks)
            .map(|task| self.task_id(task))
            .collect())
    }

    /// Give a semaphore or mutex from outside any task
    ///
    /// Used by the harness to seed a semaphore. A mutex held by some task can
    /// only be given by that task, so this returns `NotOwner` for it.
    pub fn give(&mut self, id: ObjId) -> KernelResult<()> {
        self.obj_give(None, id)?;
        self.sched()
    }

    /// Delete a semaphore or mutex
    ///
    /// Every waiter is made ready with a `Deleted` outcome, and a mutex
    /// owner's inherited priority is dropped.
    pub fn delete_object(&mut self, id: ObjId) -> KernelResult<()> {
        let idx = self.resolve_obj(id)?;

        let slot = &mut self.objects[idx];
        let obj = slot.obj.take().ok_or(KernelError::InvalidHandle)?;
        slot.generation = slot.generation.wrapping_add(1);

        let (mut pend_list, owner) = match obj {
            KernelObject::Sem(sem) => (sem.pend_list, None),
            KernelObject::Mutex(mutex) => (mutex.pend_list, mutex.owner),
        };

        while let Some(waiter) = pend_list.pop_head(&mut self.tasks) {
            self.wake_waiter(waiter, PendStatus::Del);
        }

        if let Some(owner) = owner {
            self.refresh_prio(owner);
        }

        crate::debug!("delete {}", id);
        self.sched()
    }

    /// Dispatch a take request to the object's implementation
    pub(crate) fn obj_take(&mut self, task: usize, id: ObjId, timeout: Timeout) -> KernelResult<()> {
        match self.object_type(id)? {
            ObjType::Semaphore => self.sem_take(task, id, timeout),
            ObjType::Mutex => self.mutex_take(task, id, timeout),
        }
    }

    /// Dispatch a give request; `caller` is `None` outside any task
    pub(crate) fn obj_give(&mut self, caller: Option<usize>, id: ObjId) -> KernelResult<()> {
        match self.object_type(id)? {
            ObjType::Semaphore => self.sem_give(id),
            ObjType::Mutex => self.mutex_give(caller, id),
        }
    }

    // ============ Pend / wake ============

    /// Block the running task on an object's wait-list
    ///
    /// Semaphores queue FIFO; mutexes queue by effective priority.
    pub(crate) fn pend_current(&mut self, task: usize, id: ObjId, timeout: Timeout, by_prio: bool) {
        self.rdy_list_remove(task);

        let wake_at = timeout.deadline(self.tick);
        {
            let tcb = &mut self.tasks[task].tcb;
            tcb.state = TaskState::Blocked;
            tcb.blocked_on = Some(id);
            tcb.pend_status = PendStatus::Ok;
            tcb.wake_at = wake_at;
            tcb.outcome = None;
        }

        let Kernel { tasks, objects, .. } = self;
        if let Some(obj) = objects[id.index()].obj.as_mut() {
            let pend_list = obj.pend_list_mut();
            if by_prio {
                pend_list.insert_by_prio(tasks, task);
            } else {
                pend_list.insert(tasks, task);
            }
        }

        let tid = self.task_id(task);
        self.trace(TraceEvent::Block { tick: self.tick, task: tid, on: Some(id) });
        crate::trace!("{} blocked on {}", tid, id);
    }

    /// Make a task that was removed from a wait-list ready
    pub(crate) fn wake_waiter(&mut self, task: usize, status: PendStatus) {
        {
            let tcb = &mut self.tasks[task].tcb;
            tcb.blocked_on = None;
            tcb.wake_at = None;
            tcb.pend_status = status;
            tcb.outcome = Some(status.into());
            tcb.state = TaskState::Ready;
        }
        self.rdy_list_insert(task);

        let tid = self.task_id(task);
        self.trace(TraceEvent::Wake { tick: self.tick, task: tid, status });
    }

    /// Unlink a task from the wait-list of the object it is blocked on
    pub(crate) fn pend_list_remove(&mut self, id: ObjId, task: usize) {
        let Kernel { tasks, objects, .. } = self;
        if let Some(ObjSlot { obj: Some(obj), .. }) = objects.get_mut(id.index()) {
            obj.pend_list_mut().remove(tasks, task);
        }
    }
}
