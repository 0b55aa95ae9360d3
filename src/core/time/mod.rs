//! Tick source
//!
//! SysTick counts ticks and, every `switch_period` ticks, pends PendSV.
//! It never touches the task table: the switch itself happens later, at
//! PendSV's lower priority.

use portable_atomic::{AtomicU32, Ordering};

use crate::config::CFG_SWITCH_PERIOD;
use crate::types::Tick;

/// Tick counter and switch period
pub struct TickSource {
    tick_ctr: AtomicU32,
    switch_period: AtomicU32,
}

impl TickSource {
    /// Create a tick source with the configured switch period
    pub const fn new() -> Self {
        Self::with_period(CFG_SWITCH_PERIOD)
    }

    /// Create a tick source switching every `switch_period` ticks
    pub const fn with_period(switch_period: u32) -> Self {
        Self {
            tick_ctr: AtomicU32::new(0),
            switch_period: AtomicU32::new(switch_period),
        }
    }

    /// Set the switch period. Zero disables switch requests.
    #[inline]
    pub fn set_period(&self, switch_period: u32) {
        self.switch_period.store(switch_period, Ordering::Relaxed);
    }

    /// Switch period in ticks
    #[inline]
    pub fn period(&self) -> u32 {
        self.switch_period.load(Ordering::Relaxed)
    }

    /// Current tick count
    #[inline(always)]
    pub fn tick_get(&self) -> Tick {
        self.tick_ctr.load(Ordering::Relaxed)
    }

    /// Count one tick
    ///
    /// # Returns
    /// `true` when this tick should request a context switch
    #[inline]
    pub fn tick(&self) -> bool {
        let tick = self.tick_ctr.fetch_add(1, Ordering::Relaxed).wrapping_add(1);

        match self.period() {
            0 => false,
            period => tick % period == 0,
        }
    }
}

impl Default for TickSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Kernel tick source, written only by the SysTick handler
pub(crate) static TICK: TickSource = TickSource::new();

/// Get current tick count
#[inline]
pub fn os_time_get() -> Tick {
    TICK.tick_get()
}

/// Tick handler
pub fn os_tick_handler() {
    if TICK.tick() {
        crate::port::os_int_ctx_sw();
    }
}

/// SysTick interrupt handler
#[no_mangle]
pub extern "C" fn SysTick() {
    os_tick_handler();
}
