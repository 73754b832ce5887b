//! Ready list - doubly linked list of TCBs at a given priority
//!
//! Each priority level has its own ready list. Tasks are added to the
//! tail (FIFO for round-robin) and scheduled from the head. Links are
//! task-table slot indices stored in the TCB.

use crate::task::TaskSlot;

/// Ready list for a single priority level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadyList {
    head: Option<usize>,
    tail: Option<usize>,
    count: usize,
}

impl ReadyList {
    /// Create a new empty ready list
    pub const fn new() -> Self {
        ReadyList {
            head: None,
            tail: None,
            count: 0,
        }
    }

    /// Get head of list (first to be scheduled)
    #[inline]
    pub fn head(&self) -> Option<usize> {
        self.head
    }

    /// Get tail of list
    #[inline]
    pub fn tail(&self) -> Option<usize> {
        self.tail
    }

    /// Check if list is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Insert a task at the tail of the list (FIFO order)
    ///
    /// The task must not already be in any ready list.
    pub(crate) fn insert_tail(&mut self, tasks: &mut [TaskSlot], idx: usize) {
        {
            let tcb = &mut tasks[idx].tcb;
            tcb.next = None;
            tcb.prev = self.tail;
        }

        match self.tail {
            // List not empty - link from current tail
            Some(tail) => tasks[tail].tcb.next = Some(idx),
            // List is empty - this becomes head
            None => self.head = Some(idx),
        }

        self.tail = Some(idx);
        self.count += 1;
    }

    /// Remove a task from the list
    ///
    /// The task must be in this list.
    pub(crate) fn remove(&mut self, tasks: &mut [TaskSlot], idx: usize) {
        let (prev, next) = {
            let tcb = &tasks[idx].tcb;
            (tcb.prev, tcb.next)
        };

        match prev {
            Some(prev) => tasks[prev].tcb.next = next,
            None => self.head = next,
        }

        match next {
            Some(next) => tasks[next].tcb.prev = prev,
            None => self.tail = prev,
        }

        let tcb = &mut tasks[idx].tcb;
        tcb.prev = None;
        tcb.next = None;

        self.count = self.count.saturating_sub(1);
    }

    /// Slot indices in scheduling order
    pub(crate) fn iter<'a>(&self, tasks: &'a [TaskSlot]) -> impl Iterator<Item = usize> + 'a {
        let mut cursor = self.head;
        core::iter::from_fn(move || {
            let idx = cursor?;
            cursor = tasks[idx].tcb.next;
            Some(idx)
        })
    }
}

impl Default for ReadyList {
    fn default() -> Self {
        Self::new()
    }
}
