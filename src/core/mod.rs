//! Core kernel modules
//!
//! Contains the task registry, the round-robin switch logic, the tick
//! source, the fault reporter and the bootstrap.

pub mod config;
pub mod critical;
pub mod cs_cell;
pub mod error;
pub mod fault;
pub mod kernel;
pub mod sched;
pub mod task;
pub mod time;
pub mod types;
