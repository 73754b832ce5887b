//! Scheduling scenarios
//!
//! Low/medium/high task sets contending for a binary semaphore or a
//! priority-inheritance mutex, plus the accounting and timeout behaviour the
//! scenarios rely on.

use pirtos::harness::{Flag, Script};
use pirtos::{
    Kernel, KernelError, ObjId, Step, TakeOutcome, TaskContext, TaskId, TaskState, Timeout,
    TraceEvent, CFG_TASK_MAX,
};

const LOW_PRIO: u8 = 1;
const MED_PRIO: u8 = 2;
const HIGH_PRIO: u8 = 3;

const TAKE_TIMEOUT: u64 = 10_000;
const LOW_WORK: u64 = 10_000;
const MED_WORK: u64 = 5_000;
const HIGH_WORK: u64 = 10_000;
const OBSERVE: u64 = 20_000;

struct Inversion {
    kernel: Kernel,
    low: TaskId,
    med: TaskId,
    high: TaskId,
    /// Set each time medium finishes a pass
    x: Flag,
    /// Set each time high finishes its critical section
    y: Flag,
}

fn run_inversion(use_mutex: bool) -> Inversion {
    run_inversion_with(use_mutex, MED_WORK)
}

/// Low takes `obj` first, high blocks on it a tick later, then medium starts
fn run_inversion_with(use_mutex: bool, med_work: u64) -> Inversion {
    let mut kernel = Kernel::new();
    let obj = if use_mutex {
        kernel.mutex_create().unwrap()
    } else {
        kernel.semaphore_create().unwrap()
    };
    // Initially available; a no-op for a fresh mutex
    kernel.give(obj).unwrap();

    let x = Flag::new();
    let y = Flag::new();

    let low_body = Script::new()
        .take(obj, TAKE_TIMEOUT)
        .work(LOW_WORK)
        .give(obj)
        .repeat();
    let high_body = Script::new()
        .take(obj, TAKE_TIMEOUT)
        .work(HIGH_WORK)
        .mark(&y)
        .give(obj)
        .repeat();
    let med_body = Script::new().work(med_work).mark(&x).repeat();

    let low = kernel.create_task(low_body, LOW_PRIO, "low").unwrap();
    kernel.run_for(1).unwrap();

    let high = kernel.create_task(high_body, HIGH_PRIO, "high").unwrap();
    kernel.run_for(1).unwrap();

    let med = kernel.create_task(med_body, MED_PRIO, "medium").unwrap();
    kernel.run_for(OBSERVE).unwrap();

    Inversion { kernel, low, med, high, x, y }
}

fn total_elapsed(kernel: &Kernel) -> u64 {
    kernel
        .live_tasks()
        .map(|task| kernel.elapsed_ticks(task).unwrap())
        .sum()
}

#[test]
fn test_binary_semaphore_inversion() {
    let run = run_inversion(false);

    // Medium completed, high never got the semaphore
    assert!(run.x.is_set());
    assert!(!run.y.is_set());
    assert!(run.x.set_at().unwrap() <= 2 + MED_WORK);

    // High only ever issued zero-time requests
    assert_eq!(run.kernel.elapsed_ticks(run.high), Ok(0));
    // Low was preempted after two ticks and starved from then on
    assert_eq!(run.kernel.elapsed_ticks(run.low), Ok(2));
    assert_eq!(run.kernel.elapsed_ticks(run.med), Ok(OBSERVE));

    // A semaphore lends no priority
    assert_eq!(run.kernel.effective_priority(run.low), Ok(LOW_PRIO));
    assert!(!run
        .kernel
        .trace_events()
        .any(|e| matches!(e, TraceEvent::PrioChange { .. })));
}

#[test]
fn test_mutex_prevents_inversion() {
    let run = run_inversion(true);

    // High completed, medium never ran
    assert!(run.y.is_set());
    assert!(!run.x.is_set());
    assert_eq!(run.kernel.elapsed_ticks(run.med), Ok(0));

    // High waited no longer than low's critical section
    let acquired_by = run.y.set_at().unwrap() - HIGH_WORK;
    assert!(acquired_by <= 1 + LOW_WORK);

    // Low was boosted to high's priority and restored on release
    let low = run.low;
    let events: Vec<_> = run.kernel.trace_events().copied().collect();
    assert!(events.iter().any(|e| matches!(
        e,
        TraceEvent::PrioChange { task, from: LOW_PRIO, to: HIGH_PRIO, .. } if *task == low
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        TraceEvent::PrioChange { task, from: HIGH_PRIO, to: LOW_PRIO, .. } if *task == low
    )));
    assert_eq!(run.kernel.effective_priority(low), Ok(LOW_PRIO));
}

#[test]
fn test_high_wait_does_not_depend_on_medium() {
    let short = run_inversion_with(true, MED_WORK);
    let long = run_inversion_with(true, MED_WORK + 3_000);

    assert!(short.y.is_set());
    assert_eq!(short.y.set_at(), long.y.set_at());
    assert_eq!(
        short.kernel.elapsed_ticks(short.high),
        long.kernel.elapsed_ticks(long.high)
    );
    assert!(!short.x.is_set());
    assert!(!long.x.is_set());
}

#[test]
fn test_boost_ends_when_waiter_times_out() {
    let mut kernel = Kernel::new();
    let m = kernel.mutex_create().unwrap();

    let low = kernel
        .create_task(Script::new().take(m, Timeout::Forever).work(1_000).give(m), 1, "low")
        .unwrap();
    kernel.run_for(1).unwrap();

    let timed_out = Flag::new();
    let flag = timed_out.clone();
    let high = kernel
        .create_task(
            move |cx: &mut TaskContext| match cx.outcome() {
                None => Step::Take(m, Timeout::Ticks(20)),
                Some(outcome) => {
                    if outcome == TakeOutcome::TimedOut {
                        flag.set(cx.now());
                    }
                    Step::Delay(10_000)
                }
            },
            5,
            "high",
        )
        .unwrap();

    kernel.run_for(1).unwrap();
    assert_eq!(kernel.task_state(high), Ok(TaskState::Blocked));
    assert_eq!(kernel.effective_priority(low), Ok(5));

    kernel.run_for(10).unwrap();
    assert_eq!(kernel.effective_priority(low), Ok(5));
    assert!(!timed_out.is_set());

    kernel.run_for(10).unwrap();
    assert_eq!(timed_out.set_at(), Some(21));
    assert_eq!(kernel.effective_priority(low), Ok(1));
    assert_eq!(kernel.mutex_owner(m), Ok(Some(low)));
    assert!(kernel.waiters(m).unwrap().is_empty());
}

#[test]
fn test_elapsed_sums_to_now() {
    for use_mutex in [false, true] {
        let run = run_inversion(use_mutex);
        assert_eq!(total_elapsed(&run.kernel), run.kernel.now());
    }
}

#[test]
fn test_give_is_idempotent() {
    let mut kernel = Kernel::new();

    let sem = kernel.semaphore_create().unwrap();
    assert_eq!(kernel.semaphore_available(sem), Ok(false));
    kernel.give(sem).unwrap();
    kernel.give(sem).unwrap();
    assert_eq!(kernel.semaphore_available(sem), Ok(true));
    assert!(kernel.waiters(sem).unwrap().is_empty());

    let m = kernel.mutex_create().unwrap();
    kernel.give(m).unwrap();
    assert_eq!(kernel.mutex_owner(m), Ok(None));
    assert!(kernel.waiters(m).unwrap().is_empty());
}

#[test]
fn test_inheritance_round_trip() {
    let mut kernel = Kernel::new();
    let m = kernel.mutex_create().unwrap();

    let low = kernel
        .create_task(Script::new().take(m, Timeout::Forever).work(100).give(m).delay(10_000), 1, "low")
        .unwrap();
    kernel.run_for(10).unwrap();
    assert_eq!(kernel.mutex_owner(m), Ok(Some(low)));

    let high = kernel
        .create_task(Script::new().take(m, Timeout::Forever).give(m).delay(10_000), 5, "high")
        .unwrap();
    kernel.run_for(1).unwrap();
    assert_eq!(kernel.task_state(high), Ok(TaskState::Blocked));
    assert_eq!(kernel.blocked_on(high), Ok(Some(m)));
    assert_eq!(kernel.effective_priority(low), Ok(5));
    assert_eq!(kernel.base_priority(low), Ok(1));

    kernel.run_for(200).unwrap();
    assert_eq!(kernel.effective_priority(low), kernel.base_priority(low));
    assert_eq!(kernel.mutex_owner(m), Ok(None));
}

#[test]
fn test_yield_vs_busy() {
    let mut kernel = Kernel::new();

    let busy = kernel
        .create_task(Script::new().work(1_000).repeat(), 1, "busy")
        .unwrap();
    let yielder = kernel
        .create_task(Script::new().yield_now().repeat(), 1, "yielder")
        .unwrap();

    kernel.run_for(5_000).unwrap();

    // Time slicing hands the core to the yielder, which gives it straight back
    assert!(kernel.activations(yielder).unwrap() > 0);
    assert_eq!(kernel.elapsed_ticks(yielder), Ok(0));
    assert_eq!(kernel.elapsed_ticks(busy), Ok(5_000));
    assert_eq!(total_elapsed(&kernel), kernel.now());
}

#[test]
fn test_without_round_robin_busy_task_never_yields() {
    let config = pirtos::KernelConfig::new().round_robin(false);
    let mut kernel = Kernel::with_config(config);

    kernel
        .create_task(Script::new().work(1_000).repeat(), 1, "busy")
        .unwrap();
    let starved = kernel
        .create_task(Script::new().yield_now().repeat(), 1, "starved")
        .unwrap();

    kernel.run_for(5_000).unwrap();
    assert_eq!(kernel.activations(starved), Ok(0));
}

#[test]
fn test_take_times_out_exactly() {
    let mut kernel = Kernel::new();
    let sem = kernel.semaphore_create().unwrap();

    let timed_out = Flag::new();
    let flag = timed_out.clone();
    let waiter = kernel
        .create_task(
            move |cx: &mut TaskContext| match cx.outcome() {
                None => Step::Take(sem, Timeout::Ticks(50)),
                Some(TakeOutcome::TimedOut) => {
                    flag.set(cx.now());
                    Step::Delay(1_000)
                }
                Some(_) => Step::Exit,
            },
            2,
            "waiter",
        )
        .unwrap();

    kernel.run_for(49).unwrap();
    assert_eq!(kernel.task_state(waiter), Ok(TaskState::Blocked));
    assert!(!timed_out.is_set());

    kernel.run_for(10).unwrap();
    assert_eq!(timed_out.set_at(), Some(50));
    assert!(kernel.waiters(sem).unwrap().is_empty());
}

#[test]
fn test_take_no_wait_fails_immediately() {
    let mut kernel = Kernel::new();
    let sem = kernel.semaphore_create().unwrap();

    let failed = Flag::new();
    let flag = failed.clone();
    kernel
        .create_task(
            move |cx: &mut TaskContext| match cx.outcome() {
                None => Step::Take(sem, Timeout::NoWait),
                Some(outcome) => {
                    if outcome == TakeOutcome::TimedOut {
                        flag.set(cx.now());
                    }
                    Step::Exit
                }
            },
            2,
            "poller",
        )
        .unwrap();

    kernel.run_for(5).unwrap();
    assert_eq!(failed.set_at(), Some(0));
}

/// Task body that takes `obj` once and records a timeout in `flag`
fn take_once(obj: ObjId, timeout: Timeout, flag: &Flag) -> impl FnMut(&mut TaskContext) -> Step + Send {
    let flag = flag.clone();
    move |cx: &mut TaskContext| match cx.outcome() {
        None => Step::Take(obj, timeout),
        Some(outcome) => {
            if outcome == TakeOutcome::TimedOut {
                flag.set(cx.now());
            }
            Step::Delay(10_000)
        }
    }
}

#[test]
fn test_take_zero_ticks_fails_immediately() {
    let mut kernel = Kernel::new();
    let sem = kernel.semaphore_create().unwrap();
    let m = kernel.mutex_create().unwrap();

    let owner = kernel
        .create_task(Script::new().take(m, Timeout::Forever).work(1_000), 1, "owner")
        .unwrap();
    kernel.run_for(1).unwrap();
    assert_eq!(kernel.mutex_owner(m), Ok(Some(owner)));

    let sem_failed = Flag::new();
    let mutex_failed = Flag::new();
    kernel
        .create_task(take_once(sem, Timeout::Ticks(0), &sem_failed), 3, "sem poller")
        .unwrap();
    kernel
        .create_task(take_once(m, Timeout::Ticks(0), &mutex_failed), 4, "mutex poller")
        .unwrap();
    kernel.run_for(1).unwrap();

    assert_eq!(sem_failed.set_at(), Some(1));
    assert_eq!(mutex_failed.set_at(), Some(1));
    assert!(kernel.waiters(sem).unwrap().is_empty());
    assert!(kernel.waiters(m).unwrap().is_empty());

    // Never queued, so the owner was never boosted
    assert_eq!(kernel.effective_priority(owner), Ok(1));
    assert!(!kernel
        .trace_events()
        .any(|e| matches!(e, TraceEvent::PrioChange { .. })));
}

#[test]
fn test_huge_timeouts_do_not_wrap() {
    let mut kernel = Kernel::new();
    let sem = kernel.semaphore_create().unwrap();
    kernel.run_for(10).unwrap();

    let waiter = kernel
        .create_task(Script::new().take(sem, Timeout::Ticks(u64::MAX)).delay(1_000), 2, "waiter")
        .unwrap();
    let sleeper = kernel
        .create_task(Script::new().delay(u64::MAX), 3, "sleeper")
        .unwrap();
    kernel.run_for(5).unwrap();

    assert_eq!(kernel.task_state(waiter), Ok(TaskState::Blocked));
    assert_eq!(kernel.blocked_on(waiter), Ok(Some(sem)));
    assert_eq!(kernel.task_state(sleeper), Ok(TaskState::Blocked));
    assert_eq!(kernel.elapsed_ticks(sleeper), Ok(0));
}

#[test]
fn test_step_budget_is_per_task() {
    let config = pirtos::KernelConfig::new().step_budget(4);
    let mut kernel = Kernel::with_config(config);

    let done = Flag::new();
    kernel
        .create_task(Script::new().work(5).mark(&done), 1, "worker")
        .unwrap();
    // Uses its whole budget at tick 0 before blocking
    kernel
        .create_task(
            Script::new().yield_now().yield_now().yield_now().delay(100),
            2,
            "spinner",
        )
        .unwrap();

    kernel.run_for(10).unwrap();
    assert_eq!(done.set_at(), Some(5));
}

#[test]
fn test_deleting_owner_hands_mutex_to_waiter() {
    let mut kernel = Kernel::new();
    let m = kernel.mutex_create().unwrap();

    let low = kernel
        .create_task(Script::new().take(m, Timeout::Forever).work(1_000), 1, "low")
        .unwrap();
    kernel.run_for(5).unwrap();

    let got_it = Flag::new();
    let high = kernel
        .create_task(Script::new().take(m, Timeout::Forever).mark(&got_it).delay(1_000), 4, "high")
        .unwrap();
    kernel.run_for(5).unwrap();
    assert_eq!(kernel.effective_priority(low), Ok(4));

    kernel.delete_task(low).unwrap();
    assert_eq!(kernel.mutex_owner(m), Ok(Some(high)));
    assert_eq!(kernel.task_state(low), Ok(TaskState::Terminated));
    // Counters of a terminated task stay readable
    assert_eq!(kernel.elapsed_ticks(low), Ok(10));

    kernel.run_for(1).unwrap();
    assert_eq!(got_it.set_at(), Some(10));
}

#[test]
fn test_transitive_boost() {
    let mut kernel = Kernel::new();
    let m1 = kernel.mutex_create().unwrap();
    let m2 = kernel.mutex_create().unwrap();

    let a = kernel
        .create_task(Script::new().take(m1, Timeout::Forever).delay(100_000), 1, "a")
        .unwrap();
    kernel.run_for(1).unwrap();

    let b = kernel
        .create_task(
            Script::new()
                .take(m2, Timeout::Forever)
                .take(m1, Timeout::Forever)
                .delay(100_000),
            3,
            "b",
        )
        .unwrap();
    kernel.run_for(1).unwrap();
    assert_eq!(kernel.effective_priority(a), Ok(3));

    let c = kernel
        .create_task(Script::new().take(m2, Timeout::Forever), 5, "c")
        .unwrap();
    kernel.run_for(1).unwrap();
    assert_eq!(kernel.effective_priority(b), Ok(5));
    assert_eq!(kernel.effective_priority(a), Ok(5));

    // Removing the top waiter unwinds the whole chain
    kernel.delete_task(c).unwrap();
    assert_eq!(kernel.effective_priority(b), Ok(3));
    assert_eq!(kernel.effective_priority(a), Ok(3));
    assert_eq!(kernel.waiters(m1).unwrap().as_slice(), &[b]);
}

#[test]
fn test_reentrant_take_is_fatal() {
    let mut kernel = Kernel::new();
    let m = kernel.mutex_create().unwrap();

    kernel
        .create_task(
            Script::new().take(m, Timeout::Forever).take(m, Timeout::Forever),
            2,
            "greedy",
        )
        .unwrap();

    assert_eq!(kernel.run_for(10), Err(KernelError::ReentrantLock));
}

#[test]
fn test_stale_handles() {
    let mut kernel = Kernel::new();

    assert_eq!(kernel.delete_task(kernel.idle_task()), Err(KernelError::IdleTask));

    let task = kernel
        .create_task(Script::new().delay(1_000), 1, "sleeper")
        .unwrap();
    kernel.delete_task(task).unwrap();
    assert_eq!(kernel.delete_task(task), Err(KernelError::InvalidHandle));

    // A task that takes a deleted object is stopped with an error
    let sem = kernel.semaphore_create().unwrap();
    kernel.delete_object(sem).unwrap();
    kernel
        .create_task(Script::new().take(sem, Timeout::Forever), 1, "late")
        .unwrap();
    assert_eq!(kernel.run_for(5), Err(KernelError::InvalidHandle));

    assert_eq!(
        kernel.create_task(Script::new(), pirtos::CFG_PRIO_MAX as u8, "bad"),
        Err(KernelError::InvalidPrio)
    );
}

#[test]
fn test_terminated_slots_are_reclaimed_when_full() {
    let mut kernel = Kernel::new();

    let first = kernel.create_task(Script::new(), 1, "t").unwrap();
    for _ in 2..CFG_TASK_MAX {
        kernel.create_task(Script::new(), 1, "t").unwrap();
    }
    // Every task exits on its first step
    kernel.run_for(1).unwrap();
    assert_eq!(kernel.task_state(first), Ok(TaskState::Terminated));

    let next = kernel.create_task(Script::new(), 1, "t").unwrap();
    assert_eq!(next.index(), first.index());
    assert_eq!(kernel.task_state(first), Err(KernelError::InvalidHandle));
}

#[test]
fn test_object_handles_do_not_alias() {
    let mut kernel = Kernel::new();
    let sem: ObjId = kernel.semaphore_create().unwrap();
    kernel.delete_object(sem).unwrap();

    let m = kernel.mutex_create().unwrap();
    assert_eq!(m.index(), sem.index());
    assert_eq!(kernel.give(sem), Err(KernelError::InvalidHandle));
}
