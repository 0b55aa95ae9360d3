//! Round-robin scheduler
//!
//! Owns the task table and the index of the running task. After the
//! bootstrap, only the switch handler mutates it (see [`Scheduler::switch_context`]).

use crate::error::{OsError, OsResult};
use crate::port::frame::is_stk_aligned;
use crate::task::TaskDescriptor;
use crate::types::{SchedPhase, StkElement, TaskFn, TaskId};
use crate::config::StartMode;

/// Task table and round-robin state for `N` tasks
pub struct Scheduler<const N: usize> {
    tasks: [TaskDescriptor; N],
    current: TaskId,
    phase: SchedPhase,
    switch_ctr: u32,
}

impl<const N: usize> Scheduler<N> {
    /// Create an empty scheduler
    pub const fn new() -> Self {
        Self {
            tasks: [TaskDescriptor::new(); N],
            current: 0,
            phase: SchedPhase::Bootstrap,
            switch_ctr: 0,
        }
    }

    /// Assign a stack to task `id` and build its initial frame
    ///
    /// # Returns
    /// * `Err(OsError::TaskInvalid)` - `id` out of range, or tasks already started
    /// * `Err(OsError::StkSizeInvalid)` - stack too small
    ///
    /// # Safety
    /// Same contract as [`TaskDescriptor::init`].
    pub unsafe fn task_init(
        &mut self,
        id: TaskId,
        stk_base: *mut StkElement,
        stk_size: usize,
        task_fn: TaskFn,
    ) -> OsResult<()> {
        if id >= N || self.phase != SchedPhase::Bootstrap {
            return Err(OsError::TaskInvalid);
        }

        unsafe { self.tasks[id].init(stk_base, stk_size, task_fn) }
    }

    /// Prepare the first transfer and return task 0's stack pointer
    ///
    /// With [`StartMode::Direct`] the caller enters task 0 itself, so the
    /// scheduler is marked running here. With [`StartMode::Pend`] the first
    /// switch handler invocation does it.
    pub fn start(&mut self, mode: StartMode) -> *mut StkElement {
        self.current = 0;
        if mode == StartMode::Direct {
            self.phase = SchedPhase::Running;
        }
        self.tasks[0].stk_ptr
    }

    /// Body of the switch handler, between the register save and restore
    ///
    /// `cur_sp` is the outgoing task's PSP after r4-r11 were pushed. The
    /// returned pointer is the incoming task's saved stack pointer, from
    /// which r4-r11 are popped before the exception return.
    ///
    /// # Safety
    /// Must only be called from the switch handler (or a model of it) with
    /// the stack pointer that handler just produced.
    pub unsafe fn switch_context(&mut self, cur_sp: *mut StkElement) -> *mut StkElement {
        match self.phase {
            SchedPhase::Halted => return cur_sp,
            SchedPhase::Bootstrap => {
                // First transfer: the interrupted context is the idle
                // background, nothing to save
                self.phase = SchedPhase::Running;
            }
            SchedPhase::Running => {
                debug_assert!(is_stk_aligned(cur_sp));
                debug_assert!(self.tasks[self.current].owns(cur_sp));

                self.tasks[self.current].stk_ptr = cur_sp;
                self.current = self.next_task();
                self.switch_ctr = self.switch_ctr.wrapping_add(1);
            }
        }

        self.tasks[self.current].stk_ptr
    }

    /// Stop switching. Later switch requests resume the interrupted task.
    pub fn halt(&mut self) {
        self.phase = SchedPhase::Halted;
    }

    /// Task the next switch will select
    #[inline]
    pub fn next_task(&self) -> TaskId {
        (self.current + 1) % N
    }

    /// Currently running task
    #[inline]
    pub fn current(&self) -> TaskId {
        self.current
    }

    /// Lifecycle phase
    #[inline]
    pub fn phase(&self) -> SchedPhase {
        self.phase
    }

    /// Number of completed switches
    #[inline]
    pub fn switch_count(&self) -> u32 {
        self.switch_ctr
    }

    /// Descriptor of task `id`
    #[inline]
    pub fn task(&self, id: TaskId) -> Option<&TaskDescriptor> {
        self.tasks.get(id)
    }

    /// All descriptors
    #[inline]
    pub fn tasks(&self) -> &[TaskDescriptor; N] {
        &self.tasks
    }

    /// Number of tasks
    #[inline]
    pub const fn len(&self) -> usize {
        N
    }

    /// Always false for a usable scheduler
    #[inline]
    pub const fn is_empty(&self) -> bool {
        N == 0
    }
}

impl<const N: usize> Default for Scheduler<N> {
    fn default() -> Self {
        Self::new()
    }
}
