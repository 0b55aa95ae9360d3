//! Task descriptors and task stacks
//!
//! Tasks are fixed at build time: each one owns a statically allocated,
//! 8-byte aligned stack and a descriptor holding its saved stack pointer.

use crate::error::{OsError, OsResult};
use crate::config::CFG_STK_SIZE_MIN;
use crate::port::frame::{os_task_stk_init, CONTEXT_FRAME_WORDS};
use crate::types::{StkElement, TaskFn};

/// Task stack storage of `W` words
#[repr(C, align(8))]
pub struct TaskStack<const W: usize>([StkElement; W]);

impl<const W: usize> TaskStack<W> {
    /// Create a zeroed stack
    pub const fn new() -> Self {
        Self([0; W])
    }

    /// Lowest address of the stack
    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut StkElement {
        self.0.as_mut_ptr()
    }

    /// Stack size in words
    #[inline]
    pub const fn len(&self) -> usize {
        W
    }

    /// Whether the stack has zero words
    #[inline]
    pub const fn is_empty(&self) -> bool {
        W == 0
    }

    /// Stack contents, lowest address first
    #[inline]
    pub fn words(&self) -> &[StkElement] {
        &self.0
    }
}

impl<const W: usize> Default for TaskStack<W> {
    fn default() -> Self {
        Self::new()
    }
}

/// Task descriptor
///
/// `stk_ptr` always points at a frame the exception return can consume:
/// the initial frame until the task first runs, then whatever the switch
/// handler saved when the task was last switched out.
#[derive(Debug, Clone, Copy)]
pub struct TaskDescriptor {
    /// Saved stack pointer
    pub(crate) stk_ptr: *mut StkElement,
    /// Base of stack
    stk_base: *mut StkElement,
    /// Stack size in words
    stk_size: usize,
}

impl TaskDescriptor {
    /// Create an unassigned descriptor
    pub const fn new() -> Self {
        TaskDescriptor {
            stk_ptr: core::ptr::null_mut(),
            stk_base: core::ptr::null_mut(),
            stk_size: 0,
        }
    }

    /// Assign the stack region and build the initial frame
    ///
    /// # Returns
    /// * `Err(OsError::StkSizeInvalid)` - fewer than `CFG_STK_SIZE_MIN` words
    ///
    /// # Safety
    /// `stk_base..stk_base + stk_size` must be writable memory owned by this
    /// task for the lifetime of the system.
    pub unsafe fn init(
        &mut self,
        stk_base: *mut StkElement,
        stk_size: usize,
        task_fn: TaskFn,
    ) -> OsResult<()> {
        if stk_base.is_null() || stk_size < CFG_STK_SIZE_MIN.max(CONTEXT_FRAME_WORDS) {
            return Err(OsError::StkSizeInvalid);
        }

        self.stk_base = stk_base;
        self.stk_size = stk_size;
        unsafe { os_task_stk_init(&mut self.stk_ptr, stk_base, stk_size, task_fn) };

        Ok(())
    }

    /// Saved stack pointer
    #[inline]
    pub fn stk_ptr(&self) -> *mut StkElement {
        self.stk_ptr
    }

    /// Whether `sp` lies inside this task's stack region
    pub fn owns(&self, sp: *const StkElement) -> bool {
        let base = self.stk_base as usize;
        let top = base + self.stk_size * core::mem::size_of::<StkElement>();
        (base..=top).contains(&(sp as usize))
    }
}

impl Default for TaskDescriptor {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl Send for TaskDescriptor {}
unsafe impl Sync for TaskDescriptor {}
