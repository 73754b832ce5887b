//! Yield vs. busy demo
//!
//! Two tasks share priority 1. The busy one computes forever; the other
//! yields every time it is dispatched, so its run time stays at zero.

use pirtos::harness::Script;
use pirtos::{Kernel, KernelConfig, KernelResult};

fn main() -> KernelResult<()> {
    let mut kernel = Kernel::with_config(KernelConfig::new().time_quanta(5));

    let busy = kernel.create_task(Script::new().work(1_000).repeat(), 1, "busy")?;
    let yielder = kernel.create_task(Script::new().yield_now().repeat(), 1, "yielder")?;

    kernel.run_for(1_000)?;

    for task in [busy, yielder, kernel.idle_task()] {
        println!(
            "{:>8} ran {:>5} ticks over {:>4} dispatches",
            kernel.task_name(task)?,
            kernel.elapsed_ticks(task)?,
            kernel.activations(task)?,
        );
    }
    println!("now = {}, context switches = {}", kernel.now(), kernel.context_switches());
    Ok(())
}
