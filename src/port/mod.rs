//! Port layer - CPU-specific implementations
//!
//! `frame` describes the Armv7-M context frame and is shared by every
//! target. The Cortex-M4 port provides the real handlers; other targets get
//! a software model of the exception entry/return so the switch logic can
//! be exercised on the host.

pub mod frame;

#[cfg(target_arch = "arm")]
pub mod cortex_m4;

#[cfg(target_arch = "arm")]
pub use cortex_m4::*;

#[cfg(not(target_arch = "arm"))]
pub mod sim;

#[cfg(not(target_arch = "arm"))]
pub use sim::stub::*;
