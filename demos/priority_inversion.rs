//! Priority Inversion Demo - binary semaphore vs. mutex
//!
//! Three tasks: High(3), Med(2), Low(1)
//! Low holds the lock -> High waits -> Med runs (semaphore) or Low is
//! boosted to prio 3 (mutex)

use pirtos::harness::{Flag, Script};
use pirtos::{Kernel, KernelResult, TraceEvent};

const TAKE_TIMEOUT: u64 = 10_000;

fn run(use_mutex: bool) -> KernelResult<()> {
    let mut kernel = Kernel::new();
    let lock = if use_mutex {
        kernel.mutex_create()?
    } else {
        kernel.semaphore_create()?
    };
    kernel.give(lock)?;

    let med_done = Flag::new();
    let high_done = Flag::new();

    let low = Script::new()
        .take(lock, TAKE_TIMEOUT)
        .work(10_000)
        .give(lock)
        .repeat();
    let high = Script::new()
        .take(lock, TAKE_TIMEOUT)
        .work(10_000)
        .mark(&high_done)
        .give(lock)
        .repeat();
    let med = Script::new().work(5_000).mark(&med_done).repeat();

    kernel.create_task(low, 1, "L")?;
    kernel.run_for(1)?;
    kernel.create_task(high, 3, "H")?;
    kernel.run_for(1)?;
    let m = kernel.create_task(med, 2, "M")?;
    kernel.run_for(20_000)?;

    println!(
        "{}: medium done at {:?}, high done at {:?}",
        if use_mutex { "mutex" } else { "binary semaphore" },
        med_done.set_at(),
        high_done.set_at(),
    );
    println!("  medium ran for {} ticks", kernel.elapsed_ticks(m)?);

    for event in kernel.trace_events() {
        if let TraceEvent::PrioChange { tick, task, from, to } = event {
            println!("  [{}] {} prio {} -> {}", tick, task, from, to);
        }
    }
    Ok(())
}

fn main() -> KernelResult<()> {
    println!("Priority Inversion Demo: H(3) M(2) L(1)");
    run(false)?;
    run(true)
}
