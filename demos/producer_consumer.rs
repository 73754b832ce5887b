//! Producer-Consumer example with semaphores

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use pirtos::{Kernel, KernelResult, Step, TaskContext, Timeout};

fn main() -> KernelResult<()> {
    println!("Producer-Consumer Demo");

    let mut kernel = Kernel::new();
    let sem = kernel.semaphore_create()?;

    let produced = Arc::new(AtomicU32::new(0));
    let consumed = Arc::new(AtomicU32::new(0));

    let p = produced.clone();
    let mut gave = false;
    kernel.create_task(
        move |cx: &mut TaskContext| {
            gave = !gave;
            if !gave {
                return Step::Delay(200);
            }
            let n = p.fetch_add(1, Ordering::Relaxed) + 1;
            println!("[P] produced #{} at {}", n, cx.now());
            Step::Give(sem)
        },
        1,
        "P",
    )?;

    let c = consumed.clone();
    kernel.create_task(
        move |cx: &mut TaskContext| match cx.outcome() {
            Some(outcome) if outcome.is_acquired() => {
                let n = c.fetch_add(1, Ordering::Relaxed) + 1;
                println!("[C] consumed #{} at {}", n, cx.now());
                Step::Work(10)
            }
            _ => Step::Take(sem, Timeout::Forever),
        },
        2,
        "C",
    )?;

    kernel.run_for(1_000)?;

    println!(
        "produced {}, consumed {}",
        produced.load(Ordering::Relaxed),
        consumed.load(Ordering::Relaxed)
    );
    Ok(())
}
