//! Critical section handling
//!
//! The kernel itself is a plain `&mut` value. `SharedKernel` puts one behind
//! a `critical_section::Mutex` so it can live in a `static` and be driven
//! from a timer interrupt or another thread.

use core::cell::RefCell;

use critical_section::Mutex;

use crate::config::KernelConfig;
use crate::error::KernelResult;
use crate::kernel::Kernel;

/// A kernel shared through critical sections
pub struct SharedKernel {
    inner: Mutex<RefCell<Option<Kernel>>>,
}

impl SharedKernel {
    /// Create an empty holder; call [`SharedKernel::init`] before use
    pub const fn new() -> Self {
        SharedKernel {
            inner: Mutex::new(RefCell::new(None)),
        }
    }

    /// Install a fresh kernel, dropping any previous one
    pub fn init(&self, config: KernelConfig) {
        critical_section::with(|cs| {
            self.inner.borrow(cs).replace(Some(Kernel::with_config(config)));
        });
    }

    /// Run `f` on the kernel inside a critical section
    ///
    /// Returns `None` if the kernel has not been initialized.
    pub fn with<R>(&self, f: impl FnOnce(&mut Kernel) -> R) -> Option<R> {
        critical_section::with(|cs| {
            let mut guard = self.inner.borrow_ref_mut(cs);
            guard.as_mut().map(f)
        })
    }

    /// Tick entry point for an interrupt handler
    pub fn tick(&self) -> Option<KernelResult<()>> {
        self.with(Kernel::tick)
    }
}

impl Default for SharedKernel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static KERNEL: SharedKernel = SharedKernel::new();

    #[test]
    fn test_shared_kernel_lifecycle() {
        assert!(KERNEL.with(|k| k.now()).is_none());

        KERNEL.init(KernelConfig::new());
        assert_eq!(KERNEL.tick(), Some(Ok(())));
        assert_eq!(KERNEL.tick(), Some(Ok(())));
        assert_eq!(KERNEL.with(|k| k.now()), Some(2));
    }
}
