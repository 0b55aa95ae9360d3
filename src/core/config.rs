//! Compile-time configuration
//!
//! These constants fix the task table, the stack budget, the tick and the
//! interrupt priorities. [`KernelConfig`] carries the run-time tunable part
//! and is checked once by the bootstrap.

use crate::error::{OsError, OsResult};

/// Number of tasks
pub const CFG_TASK_COUNT: usize = 2;

/// Task stack size in words
pub const CFG_STK_SIZE: usize = 64;

/// Minimum task stack size in words: the 16-word initial frame, one nested
/// hardware frame and one r4-r11 save area
pub const CFG_STK_SIZE_MIN: usize = 32;

/// SysTick reference clock in Hz (core clock)
pub const CFG_CPU_CLOCK_HZ: u32 = 8_000_000;

/// System tick rate in Hz
pub const CFG_TICK_RATE_HZ: u32 = 1000;

/// Ticks between two context switch requests
pub const CFG_SWITCH_PERIOD: u32 = 1;

/// Priority bits implemented by the NVIC (4 on STM32F4)
pub const CFG_NVIC_PRIO_BITS: u8 = 4;

/// SysTick priority, more urgent than PendSV
pub const CFG_PRIO_SYSTICK: u8 = 0x80;

/// PendSV priority, the lowest urgency in the system
pub const CFG_PRIO_PENDSV: u8 = 0xFF;

/// SVCall priority. Level 0 is reserved for it so that tasks can leave a
/// critical section while BASEPRI is raised.
pub const CFG_PRIO_SVCALL: u8 = 0x00;

/// BASEPRI held while a task is inside a critical section: the first level
/// below SVCall
pub const CFG_PRIO_TASK_MASK: u8 = 1 << (8 - CFG_NVIC_PRIO_BITS);

/// How the bootstrap enters the first task
pub const CFG_START_MODE: StartMode = StartMode::Pend;

/// SysTick reload register width
const SYST_RELOAD_MAX: u32 = 0x00FF_FFFF;

/// First task handoff strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartMode {
    /// Unstack the initial frame by hand and branch to the entry point
    Direct,
    /// Pend PendSV and let the switch handler perform the first transfer
    Pend,
}

/// Run-time kernel configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelConfig {
    /// SysTick reference clock in Hz
    pub cpu_clock_hz: u32,
    /// Tick frequency in Hz
    pub tick_rate_hz: u32,
    /// Ticks per switch request
    pub switch_period: u32,
    /// SysTick priority
    pub prio_tick: u8,
    /// PendSV priority
    pub prio_switch: u8,
    /// First task handoff strategy
    pub start_mode: StartMode,
}

impl KernelConfig {
    /// Configuration built from the `CFG_*` constants
    pub const fn new() -> Self {
        Self {
            cpu_clock_hz: CFG_CPU_CLOCK_HZ,
            tick_rate_hz: CFG_TICK_RATE_HZ,
            switch_period: CFG_SWITCH_PERIOD,
            prio_tick: CFG_PRIO_SYSTICK,
            prio_switch: CFG_PRIO_PENDSV,
            start_mode: CFG_START_MODE,
        }
    }

    /// Clock cycles per tick
    ///
    /// # Returns
    /// * `Err(OsError::TickRateInvalid)` - zero rate, or a rate above the clock
    /// * `Err(OsError::TickReloadOvf)` - does not fit the 24-bit reload register
    pub fn tick_cycles(&self) -> OsResult<u32> {
        if self.tick_rate_hz == 0 {
            return Err(OsError::TickRateInvalid);
        }

        let cycles = self.cpu_clock_hz / self.tick_rate_hz;
        if cycles == 0 {
            return Err(OsError::TickRateInvalid);
        }

        if cycles - 1 > SYST_RELOAD_MAX {
            return Err(OsError::TickReloadOvf);
        }

        Ok(cycles)
    }

    /// Check everything the bootstrap relies on
    pub fn validate(&self) -> OsResult<()> {
        self.tick_cycles()?;

        if self.switch_period == 0 {
            return Err(OsError::SwitchPeriodInvalid);
        }

        // Only the implemented high bits of a priority byte are compared
        if prio_level(self.prio_switch) <= prio_level(self.prio_tick) {
            return Err(OsError::PrioOrderInvalid);
        }

        // A task critical section must hold SysTick off
        if prio_level(self.prio_tick) < prio_level(CFG_PRIO_TASK_MASK) {
            return Err(OsError::PrioOrderInvalid);
        }

        Ok(())
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Priority as seen by the NVIC: the top `CFG_NVIC_PRIO_BITS` bits.
/// Larger means less urgent.
#[inline]
pub const fn prio_level(prio: u8) -> u8 {
    prio >> (8 - CFG_NVIC_PRIO_BITS)
}
