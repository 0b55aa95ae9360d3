//! tickswitch: a minimal preemptive kernel for ARM Cortex-M
//!
//! A fixed set of tasks is switched round robin on the SysTick tick:
//! - SysTick counts ticks and pends PendSV every `switch_period` ticks
//! - PendSV saves r4-r11 of the outgoing task, picks the next one and
//!   restores its registers before the hardware exception return
//! - Tasks run unprivileged on the process stack pointer (PSP)
//! - No heap, no dynamic task creation
//!
//! ```ignore
//! fn task0() -> ! { loop { /* ... */ } }
//! fn task1() -> ! { loop { /* ... */ } }
//!
//! #[cortex_m_rt::entry]
//! fn main() -> ! {
//!     match tickswitch::os_start([task0, task1]) {
//!         Ok(never) => match never {},
//!         Err(_) => loop { cortex_m::asm::bkpt() },
//!     }
//! }
//! ```

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]

// ============ Modules ============

pub mod log;
mod lang_items;

pub mod core;
pub mod port;

// ============ Re-exports ============

pub use crate::core::config;
pub use crate::core::config::{KernelConfig, StartMode};
pub use crate::core::critical;
pub use crate::core::error;
pub use crate::core::error::{OsError, OsResult};
pub use crate::core::fault;
pub use crate::core::fault::{os_fault_snapshot, FaultCause, FaultSnapshot};
pub use crate::core::kernel;
pub use crate::core::kernel::{os_start, os_start_with, os_task_current};
pub use crate::core::sched;
pub use crate::core::task;
pub use crate::core::task::{TaskDescriptor, TaskStack};
pub use crate::core::time;
pub use crate::core::time::os_time_get;
pub use crate::core::types;
pub use crate::core::types::*;

#[cfg(feature = "pac")]
pub use stm32_metapac as pac;
