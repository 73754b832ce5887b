//! Kernel context and run loop
//!
//! `Kernel` owns the task registry, ready index, object table, and time
//! base. Every operation takes `&mut Kernel`, so each scheduling decision is
//! a single indivisible step: no task can observe half-done ownership or
//! priority changes.

use alloc::boxed::Box;
use heapless::HistoryBuf;

use crate::config::{KernelConfig, CFG_PRIO_IDLE, CFG_PRIO_MAX, CFG_TRACE_LEN};
use crate::error::{KernelError, KernelResult};
use crate::prio::PrioTable;
use crate::sched::ReadyList;
use crate::sync::ObjTable;
use crate::task::{Step, TaskContext, TaskTable};
use crate::types::{ObjId, PendStatus, Prio, TaskId, Tick};

// ============ Trace ============

/// Scheduling event recorded in the trace history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TraceEvent {
    Create { tick: Tick, task: TaskId, prio: Prio },
    /// Task became the running task
    Dispatch { tick: Tick, task: TaskId },
    /// Task blocked on an object, or on a delay if `on` is `None`
    Block { tick: Tick, task: TaskId, on: Option<ObjId> },
    Wake { tick: Tick, task: TaskId, status: PendStatus },
    /// Effective priority changed by inheritance or its removal
    PrioChange { tick: Tick, task: TaskId, from: Prio, to: Prio },
    Delete { tick: Tick, task: TaskId },
}

impl TraceEvent {
    pub fn tick(&self) -> Tick {
        match *self {
            TraceEvent::Create { tick, .. }
            | TraceEvent::Dispatch { tick, .. }
            | TraceEvent::Block { tick, .. }
            | TraceEvent::Wake { tick, .. }
            | TraceEvent::PrioChange { tick, .. }
            | TraceEvent::Delete { tick, .. } => tick,
        }
    }

    pub fn task(&self) -> TaskId {
        match *self {
            TraceEvent::Create { task, .. }
            | TraceEvent::Dispatch { task, .. }
            | TraceEvent::Block { task, .. }
            | TraceEvent::Wake { task, .. }
            | TraceEvent::PrioChange { task, .. }
            | TraceEvent::Delete { task, .. } => task,
        }
    }
}

// ============ Kernel State ============

/// Kernel context
pub struct Kernel {
    pub(crate) config: KernelConfig,
    pub(crate) tasks: TaskTable,
    pub(crate) objects: ObjTable,
    pub(crate) prio_tbl: PrioTable,
    pub(crate) rdy_list: [ReadyList; CFG_PRIO_MAX],
    /// Slot of the running task
    pub(crate) current: Option<usize>,
    /// Slot of the idle task
    pub(crate) idle: usize,
    /// Tick counter
    pub(crate) tick: Tick,
    pub(crate) ctx_switches: u64,
    pub(crate) history: HistoryBuf<TraceEvent, CFG_TRACE_LEN>,
}

/// Body of the idle task
fn os_idle_task(_cx: &mut TaskContext) -> Step {
    Step::Work(1)
}

impl Kernel {
    /// Create a kernel with the default configuration
    ///
    /// The idle task is created automatically at `CFG_PRIO_IDLE`.
    pub fn new() -> Self {
        Self::with_config(KernelConfig::default())
    }

    pub fn with_config(config: KernelConfig) -> Self {
        let mut kernel = Kernel {
            config,
            tasks: TaskTable::new(),
            objects: ObjTable::new(),
            prio_tbl: PrioTable::new(),
            rdy_list: [ReadyList::new(); CFG_PRIO_MAX],
            current: None,
            idle: 0,
            tick: 0,
            ctx_switches: 0,
            history: HistoryBuf::new(),
        };

        let idle = kernel
            .spawn(Box::new(os_idle_task), CFG_PRIO_IDLE, "Idle")
            .expect("IDLE task creation failed");
        kernel.idle = idle.index();

        crate::info!("kernel initialized, round-robin {}", config.round_robin);
        kernel
    }

    #[inline]
    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// Number of dispatches that changed the running task
    #[inline]
    pub fn context_switches(&self) -> u64 {
        self.ctx_switches
    }

    // ============ Run loop ============

    /// Run the system for `ticks` ticks
    pub fn run_for(&mut self, ticks: Tick) -> KernelResult<()> {
        let deadline = self.tick.saturating_add(ticks);
        self.run_until(deadline)
    }

    /// Run the system until the tick counter reaches `deadline`
    ///
    /// Each iteration either burns one tick of the running task's
    /// outstanding work or steps the task and serves the request it returns.
    /// A misuse error raised by a task's request (for example
    /// `ReentrantLock`) stops the run and is returned.
    pub fn run_until(&mut self, deadline: Tick) -> KernelResult<()> {
        self.sched()?;

        while self.tick < deadline {
            let cur = self.current.ok_or(KernelError::NoReadyTask)?;

            if self.tasks[cur].tcb.remaining_work > 0 {
                self.tick()?;
                continue;
            }

            if !self.charge_step(cur) {
                // The task is spinning on zero-time requests; charge it a tick
                self.tick()?;
                continue;
            }

            let step = self.step_task(cur)?;
            if let Err(err) = self.serve(cur, step) {
                crate::error!("{} request failed: {}", self.task_id(cur), err);
                return Err(err);
            }
            self.sched()?;
        }

        Ok(())
    }

    /// Count a zero-time request against the task's budget for this tick
    ///
    /// Returns `false` once the task has used up its budget.
    fn charge_step(&mut self, idx: usize) -> bool {
        let now = self.tick;
        let budget = self.config.step_budget;
        let tcb = &mut self.tasks[idx].tcb;

        if tcb.steps_at != now {
            tcb.steps_at = now;
            tcb.steps = 0;
        }
        if tcb.steps >= budget {
            return false;
        }
        tcb.steps += 1;
        true
    }

    /// Call the task's `step` with a fresh context
    fn step_task(&mut self, idx: usize) -> KernelResult<Step> {
        let id = self.task_id(idx);
        let now = self.tick;
        let tcb = &mut self.tasks[idx].tcb;

        let mut runnable = tcb.runnable.take().ok_or(KernelError::InvalidHandle)?;
        let mut cx = TaskContext {
            id,
            now,
            prio: tcb.prio,
            base_prio: tcb.base_prio,
            outcome: tcb.outcome.take(),
        };

        let step = runnable.step(&mut cx);
        self.tasks[idx].tcb.runnable = Some(runnable);
        Ok(step)
    }

    /// Serve a request made by the running task
    fn serve(&mut self, idx: usize, step: Step) -> KernelResult<()> {
        match step {
            Step::Work(ticks) => {
                self.tasks[idx].tcb.remaining_work = ticks;
                Ok(())
            }
            Step::Yield => {
                self.yield_current();
                Ok(())
            }
            Step::Delay(ticks) => {
                self.delay_current(ticks);
                Ok(())
            }
            Step::Take(obj, timeout) => self.obj_take(idx, obj, timeout),
            Step::Give(obj) => self.obj_give(Some(idx), obj),
            Step::Exit => self.delete_index(idx),
        }
    }

    // ============ Trace ============

    #[inline]
    pub(crate) fn trace(&mut self, event: TraceEvent) {
        self.history.write(event);
    }

    /// Recorded scheduling events, oldest first
    ///
    /// Only the most recent `CFG_TRACE_LEN` events are kept.
    pub fn trace_events(&self) -> impl Iterator<Item = &TraceEvent> + '_ {
        self.history.oldest_ordered()
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new()
    }
}
