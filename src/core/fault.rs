//! Fault reporter
//!
//! On an unrecoverable fault the HardFault handler copies the fault status
//! registers into [`FAULT`] and halts. Nothing is retried: the faulting
//! task's state cannot be trusted.

use portable_atomic::{AtomicBool, AtomicU32, Ordering};

use crate::critical::TASK_MASK;

bitflags::bitflags! {
    /// Bits in the Configurable Fault Status Register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[repr(transparent)]
    pub struct Cfsr: u32 {
        // MMFSR
        const IACCVIOL = 1 << 0;
        const DACCVIOL = 1 << 1;
        const MUNSTKERR = 1 << 3;
        const MSTKERR = 1 << 4;
        const MLSPERR = 1 << 5;
        const MMARVALID = 1 << 7;

        // BFSR
        const IBUSERR = 1 << (8 + 0);
        const PRECISERR = 1 << (8 + 1);
        const IMPRECISERR = 1 << (8 + 2);
        const UNSTKERR = 1 << (8 + 3);
        const STKERR = 1 << (8 + 4);
        const LSPERR = 1 << (8 + 5);
        const BFARVALID = 1 << (8 + 7);

        // UFSR
        const UNDEFINSTR = 1 << (16 + 0);
        const INVSTATE = 1 << (16 + 1);
        const INVPC = 1 << (16 + 2);
        const NOCP = 1 << (16 + 3);
        const UNALIGNED = 1 << (16 + 8);
        const DIVBYZERO = 1 << (16 + 9);
    }
}

bitflags::bitflags! {
    /// Bits in the HardFault Status Register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[repr(transparent)]
    pub struct Hfsr: u32 {
        const VECTTBL = 1 << 1;
        const FORCED = 1 << 30;
        const DEBUGEVT = 1 << 31;
    }
}

/// Raw fault status registers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaultSnapshot {
    /// HardFault Status Register
    pub hfsr: u32,
    /// Configurable Fault Status Register (MMFSR | BFSR | UFSR)
    pub cfsr: u32,
    /// MemManage Fault Address Register
    pub mmfar: u32,
    /// BusFault Address Register
    pub bfar: u32,
}

/// Decoded fault cause
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultCause {
    /// MPU or execute-never violation
    MemManage { address: Option<u32>, stacking: bool },
    /// Bus error on a load, store, fetch or exception stacking
    Bus { address: Option<u32>, precise: bool, stacking: bool },
    /// Undefined instruction, invalid state, divide by zero, ...
    Usage(u16),
    /// Bus error reading the vector table
    VectorTable,
    /// Debug event with no debugger attached
    Debug,
    /// No status bit set
    Unknown,
}

impl FaultSnapshot {
    /// Configurable fault status bits
    #[inline]
    pub fn cfsr_flags(&self) -> Cfsr {
        Cfsr::from_bits_truncate(self.cfsr)
    }

    /// HardFault status bits
    #[inline]
    pub fn hfsr_flags(&self) -> Hfsr {
        Hfsr::from_bits_truncate(self.hfsr)
    }

    /// Decode the snapshot. Configurable faults escalated to HardFault
    /// (`FORCED`) are reported by their configurable cause.
    pub fn cause(&self) -> FaultCause {
        let cfsr = self.cfsr_flags();
        let hfsr = self.hfsr_flags();

        if hfsr.contains(Hfsr::VECTTBL) {
            return FaultCause::VectorTable;
        }

        if cfsr.intersects(
            Cfsr::IACCVIOL | Cfsr::DACCVIOL | Cfsr::MUNSTKERR | Cfsr::MSTKERR | Cfsr::MLSPERR,
        ) {
            return FaultCause::MemManage {
                address: cfsr.contains(Cfsr::MMARVALID).then_some(self.mmfar),
                stacking: cfsr.intersects(Cfsr::MUNSTKERR | Cfsr::MSTKERR),
            };
        }

        if cfsr.intersects(
            Cfsr::IBUSERR | Cfsr::PRECISERR | Cfsr::IMPRECISERR
                | Cfsr::UNSTKERR | Cfsr::STKERR | Cfsr::LSPERR,
        ) {
            return FaultCause::Bus {
                address: cfsr.contains(Cfsr::BFARVALID).then_some(self.bfar),
                precise: cfsr.contains(Cfsr::PRECISERR),
                stacking: cfsr.intersects(Cfsr::UNSTKERR | Cfsr::STKERR),
            };
        }

        let ufsr = (self.cfsr >> 16) as u16;
        if ufsr != 0 {
            return FaultCause::Usage(ufsr);
        }

        if hfsr.contains(Hfsr::DEBUGEVT) {
            return FaultCause::Debug;
        }

        FaultCause::Unknown
    }
}

/// Write-once store for the fault snapshot
pub struct FaultRecord {
    captured: AtomicBool,
    hfsr: AtomicU32,
    cfsr: AtomicU32,
    mmfar: AtomicU32,
    bfar: AtomicU32,
}

impl FaultRecord {
    /// Create an empty record
    pub const fn new() -> Self {
        Self {
            captured: AtomicBool::new(false),
            hfsr: AtomicU32::new(0),
            cfsr: AtomicU32::new(0),
            mmfar: AtomicU32::new(0),
            bfar: AtomicU32::new(0),
        }
    }

    /// Store `snap` unless a fault was already captured
    ///
    /// # Returns
    /// `true` if this call stored the snapshot
    pub fn capture(&self, snap: FaultSnapshot) -> bool {
        if self.captured.load(Ordering::Acquire) {
            return false;
        }

        self.hfsr.store(snap.hfsr, Ordering::Relaxed);
        self.cfsr.store(snap.cfsr, Ordering::Relaxed);
        self.mmfar.store(snap.mmfar, Ordering::Relaxed);
        self.bfar.store(snap.bfar, Ordering::Relaxed);
        self.captured.store(true, Ordering::Release);
        true
    }

    /// Whether a fault has been captured
    #[inline]
    pub fn is_captured(&self) -> bool {
        self.captured.load(Ordering::Acquire)
    }

    /// The captured snapshot, if any
    pub fn snapshot(&self) -> Option<FaultSnapshot> {
        if !self.is_captured() {
            return None;
        }

        Some(FaultSnapshot {
            hfsr: self.hfsr.load(Ordering::Relaxed),
            cfsr: self.cfsr.load(Ordering::Relaxed),
            mmfar: self.mmfar.load(Ordering::Relaxed),
            bfar: self.bfar.load(Ordering::Relaxed),
        })
    }
}

impl Default for FaultRecord {
    fn default() -> Self {
        Self::new()
    }
}

/// Kernel fault record, read by diagnostics
#[no_mangle]
#[used]
pub static FAULT: FaultRecord = FaultRecord::new();

/// Snapshot of the fault that halted the kernel, if any
#[inline]
pub fn os_fault_snapshot() -> Option<FaultSnapshot> {
    FAULT.snapshot()
}

/// Record a fault and halt. Called from the HardFault handler.
///
/// The log is skipped when the faulting context held a critical section,
/// it may own the defmt logger.
pub fn os_fault_report(snap: FaultSnapshot) -> ! {
    let logger_free = !TASK_MASK.is_masked() && !crate::port::os_irq_masked();

    if FAULT.capture(snap) && logger_free {
        crate::error!(
            "fault: hfsr={=u32:#x} cfsr={=u32:#x} mmfar={=u32:#x} bfar={=u32:#x}",
            snap.hfsr,
            snap.cfsr,
            snap.mmfar,
            snap.bfar
        );
    }

    crate::port::os_halt()
}
