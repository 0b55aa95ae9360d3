//! Core type definitions
//!
//! These types give names to the words and indices the kernel moves around.

/// Stack element type (one 32-bit register slot)
pub type StkElement = u32;

/// Tick counter type
pub type Tick = u32;

/// Task identity, an index into the task table
pub type TaskId = usize;

/// Task entry point. Tasks never return.
pub type TaskFn = fn() -> !;

/// Scheduler lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SchedPhase {
    /// Frames are built, no task has been entered yet
    Bootstrap = 0,
    /// Tasks are being switched round robin
    Running = 1,
    /// A fault was captured, switching has stopped
    Halted = 2,
}
