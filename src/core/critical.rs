//! Critical section handling
//!
//! The bootstrap builds the task table with interrupts masked. The
//! single-core `critical-section` implementation below backs
//! `portable-atomic` and the defmt RTT transport, in handlers and in tasks.
//!
//! `cpsid i` is ignored in unprivileged Thread mode, so a task cannot mask
//! interrupts itself. It asks the SVCall handler to raise BASEPRI to
//! [`CFG_PRIO_TASK_MASK`] instead. Everything at that priority or below is
//! held off, which covers SysTick and PendSV. Level 0 stays reserved for
//! SVCall so the unmask request can still be taken.
//!
//! [`CFG_PRIO_TASK_MASK`]: crate::config::CFG_PRIO_TASK_MASK

use portable_atomic::{AtomicBool, Ordering};

/// RAII guard for critical sections in privileged code
///
/// Interrupts are masked on creation and unmasked on drop, unless the guard
/// is handed to the first-task transfer with [`CriticalSection::handoff`].
pub struct CriticalSection {
    _private: (),
}

impl CriticalSection {
    /// Enter a critical section by masking interrupts
    #[inline(always)]
    pub fn enter() -> Self {
        #[cfg(target_arch = "arm")]
        cortex_m::interrupt::disable();

        CriticalSection { _private: () }
    }

    /// Give up the guard without unmasking interrupts.
    ///
    /// The caller is about to transfer control to the first task, which
    /// unmasks interrupts itself (`cpsie i`) once PSP is selected.
    #[inline(always)]
    pub fn handoff(self) {
        core::mem::forget(self);
    }
}

impl Drop for CriticalSection {
    #[inline(always)]
    fn drop(&mut self) {
        #[cfg(target_arch = "arm")]
        unsafe { cortex_m::interrupt::enable() };
    }
}

/// Interrupt mask held on behalf of unprivileged Thread mode
///
/// Tasks cannot read back PRIMASK or BASEPRI, so nesting is tracked here.
/// While the mask is held no other task or kernel handler runs, so a plain
/// flag is enough.
pub struct TaskMask {
    masked: AtomicBool,
}

impl TaskMask {
    pub const fn new() -> Self {
        Self {
            masked: AtomicBool::new(false),
        }
    }

    /// Take the mask, calling `mask` unless it is already held
    ///
    /// # Returns
    /// `true` if this call took the mask and must release it
    pub fn acquire<F: FnOnce()>(&self, mask: F) -> bool {
        if self.masked.load(Ordering::Relaxed) {
            return false;
        }

        mask();
        self.masked.store(true, Ordering::Relaxed);
        true
    }

    /// Give the mask back if `restore` says this level took it
    pub fn release<F: FnOnce()>(&self, restore: bool, unmask: F) {
        if restore {
            self.masked.store(false, Ordering::Relaxed);
            unmask();
        }
    }

    /// Whether a task currently holds the mask
    #[inline]
    pub fn is_masked(&self) -> bool {
        self.masked.load(Ordering::Relaxed)
    }
}

impl Default for TaskMask {
    fn default() -> Self {
        Self::new()
    }
}

/// Mask held by the running task, if any
pub(crate) static TASK_MASK: TaskMask = TaskMask::new();

/// Check if currently executing in handler mode
#[inline]
pub fn is_isr_context() -> bool {
    #[cfg(target_arch = "arm")]
    {
        let ipsr: u32;
        unsafe {
            core::arch::asm!(
                "mrs {}, IPSR",
                out(reg) ipsr,
                options(nomem, nostack, preserves_flags)
            );
        }
        ipsr != 0
    }

    #[cfg(not(target_arch = "arm"))]
    {
        false
    }
}

#[cfg(target_arch = "arm")]
mod single_core {
    use cortex_m::register::{control, primask};
    use critical_section::{set_impl, Impl, RawRestoreState};

    use super::{is_isr_context, TASK_MASK};

    struct PrimaskCriticalSection;
    set_impl!(PrimaskCriticalSection);

    /// Handler mode, or Thread mode before the first task drops privilege
    #[inline(always)]
    fn is_privileged() -> bool {
        is_isr_context() || control::read().npriv() == control::Npriv::Privileged
    }

    unsafe impl Impl for PrimaskCriticalSection {
        unsafe fn acquire() -> RawRestoreState {
            if !is_privileged() {
                return TASK_MASK.acquire(|| crate::port::os_svc_task_mask(true));
            }

            // Restore state is "interrupts were enabled on entry"
            let enabled = primask::read().is_active();
            cortex_m::interrupt::disable();
            enabled
        }

        unsafe fn release(restore: RawRestoreState) {
            if !is_privileged() {
                TASK_MASK.release(restore, || crate::port::os_svc_task_mask(false));
                return;
            }

            if restore {
                unsafe { cortex_m::interrupt::enable() }
            }
        }
    }
}
