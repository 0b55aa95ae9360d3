//! Error types
//!
//! Configuration problems that can be detected before the first task runs
//! are reported through `OsResult`. Processor faults never are: they go to
//! the fault reporter and halt.

/// Kernel error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum OsError {
    // ============ OS state errors ============
    /// Kernel is already running
    OsRunning = 24202,

    // ============ Tick errors ============
    /// Tick rate is zero or faster than the reference clock
    TickRateInvalid = 29601,
    /// Cycles per tick do not fit the 24-bit SysTick reload register
    TickReloadOvf = 29602,
    /// Switch period of zero ticks
    SwitchPeriodInvalid = 29603,

    // ============ Priority errors ============
    /// PendSV is not strictly less urgent than SysTick
    PrioOrderInvalid = 25204,

    // ============ Stack errors ============
    /// Stack smaller than the minimum frame budget
    StkSizeInvalid = 28208,

    // ============ Task errors ============
    /// Task id out of range or task table already sealed
    TaskInvalid = 29007,
}

/// Result type alias for kernel operations
pub type OsResult<T> = Result<T, OsError>;

impl OsError {
    /// Numeric code, stable across builds, for debugger inspection
    #[inline]
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Whether the error comes from the static configuration rather than
    /// from the call sequence
    #[inline]
    pub fn is_config(self) -> bool {
        !matches!(self, OsError::OsRunning | OsError::TaskInvalid)
    }
}

#[cfg(all(feature = "defmt", target_arch = "arm"))]
impl defmt::Format for OsError {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "OsError({=u16})", self.code())
    }
}
