//! Cell for kernel state shared between the bootstrap and the switch handler
//!
//! Two access paths exist. The bootstrap borrows the value under a
//! [`CriticalSection`] guard. The switch handler borrows it without a guard:
//! it runs at the lowest exception priority and is never re-entered, so it
//! is the only code touching the value once tasks run.

use core::cell::UnsafeCell;
use crate::critical::CriticalSection;

/// Kernel-owned state with priority-based exclusive access
pub struct CsCell<T>(UnsafeCell<T>);

unsafe impl<T> Sync for CsCell<T> {}

impl<T> CsCell<T> {
    /// Create a new cell
    #[inline(always)]
    pub const fn new(value: T) -> Self {
        Self(UnsafeCell::new(value))
    }

    /// Borrow the value while interrupts are masked
    #[inline(always)]
    #[allow(clippy::mut_from_ref)]
    pub fn borrow<'cs>(&'cs self, _cs: &'cs CriticalSection) -> &'cs mut T {
        unsafe { &mut *self.0.get() }
    }

    /// Borrow the value from the switch handler
    ///
    /// # Safety
    /// Caller must be the only live accessor: either the PendSV handler, or
    /// a context that can neither be preempted by it nor preempt it.
    #[inline(always)]
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn handler_mut(&self) -> &mut T {
        unsafe { &mut *self.0.get() }
    }

    /// Raw pointer to the value
    #[inline(always)]
    pub const fn as_ptr(&self) -> *mut T {
        self.0.get()
    }
}
