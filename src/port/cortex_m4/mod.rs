//! Cortex-M4 port implementation
//!
//! Context switching via the PendSV exception, tick via SysTick, fault
//! capture via HardFault. Tasks run in unprivileged Thread mode on PSP,
//! handlers on MSP.

use core::arch::{asm, naked_asm};

use cortex_m::peripheral::scb::SystemHandler;
use cortex_m::peripheral::syst::SystClkSource;
use cortex_m::peripheral::SCB;

use crate::config::{StartMode, CFG_PRIO_SVCALL, CFG_PRIO_TASK_MASK};
use crate::fault::FaultSnapshot;
use crate::kernel::{os_background_idle, os_switch_context};
use crate::types::StkElement;

/// CONTROL during the handoff: SPSEL = 1 (PSP), still privileged
const CONTROL_PSP_PRIV: u32 = 0b10;

/// CONTROL value for tasks: SPSEL = 1 (PSP), nPRIV = 1 (unprivileged)
const CONTROL_PSP_UNPRIV: u32 = 0b11;

/// Initialize SysTick timer for system tick generation
///
/// # Arguments
/// * `cycles` - Core clock cycles per tick
///
/// # Example
/// For 8MHz clock with 1000Hz tick rate: cycles = 8_000_000 / 1000 = 8_000
pub fn os_cpu_systick_init(cycles: u32) {
    let mut p = unsafe { cortex_m::Peripherals::steal() };

    p.SYST.set_reload(cycles - 1);
    p.SYST.clear_current();
    p.SYST.set_clock_source(SystClkSource::Core);
    p.SYST.enable_interrupt();
    p.SYST.enable_counter();
}

/// Set SVCall, SysTick and PendSV priorities. PendSV must be the least
/// urgent, SVCall the most.
pub fn os_cpu_prio_init(prio_tick: u8, prio_switch: u8) {
    let mut scb = unsafe { cortex_m::Peripherals::steal().SCB };

    unsafe {
        scb.set_priority(SystemHandler::SVCall, CFG_PRIO_SVCALL);
        scb.set_priority(SystemHandler::SysTick, prio_tick);
        scb.set_priority(SystemHandler::PendSV, prio_switch);
    }
}

/// Request a context switch from interrupt level
#[inline(always)]
pub fn os_int_ctx_sw() {
    SCB::set_pendsv();
}

/// Leave the bootstrap and enter task 0
///
/// Interrupts must be masked on entry. They are unmasked on PSP while
/// still privileged, then privilege is dropped.
///
/// # Safety
/// `first_sp` must point at a frame built by `os_task_stk_init`, and the
/// scheduler must have been prepared with the same `mode`.
pub unsafe fn os_start_first_task(first_sp: *mut StkElement, mode: StartMode) -> ! {
    match mode {
        StartMode::Direct => unsafe {
            asm!(
                "msr psp, r0",
                "msr control, r1",
                "isb",
                // cpsie is ignored once unprivileged
                "cpsie i",
                "msr control, r2",
                "isb",
                // Thread mode now runs on PSP: unstack the frame by hand
                "pop {{r4-r11}}",
                // Move the entry address to the xPSR slot so that it is
                // the last word popped, with every other register restored
                "ldr r0, [sp, #24]",
                "str r0, [sp, #28]",
                "pop {{r0-r3, r12, lr}}",
                "add sp, sp, #4",
                "pop {{pc}}",
                in("r0") first_sp,
                in("r1") CONTROL_PSP_PRIV,
                in("r2") CONTROL_PSP_UNPRIV,
                options(noreturn)
            )
        },
        StartMode::Pend => unsafe {
            // PendSV fires right after cpsie and drops privilege for
            // Thread mode itself, see `os_thread_unprivileged`
            SCB::set_pendsv();
            asm!(
                "msr psp, r0",
                "msr control, r1",
                "isb",
                "cpsie i",
                "msr control, r2",
                "isb",
                "b {idle}",
                in("r0") first_sp,
                in("r1") CONTROL_PSP_PRIV,
                in("r2") CONTROL_PSP_UNPRIV,
                idle = sym os_background_idle,
                options(noreturn)
            )
        },
    }
}

/// PendSV exception handler - performs the context switch
///
/// 1. Push R4-R11 of the outgoing task onto its PSP
/// 2. `os_switch_context` stores that PSP and returns the incoming one
/// 3. Pop R4-R11 of the incoming task
/// 4. Exception return pops R0-R3, R12, LR, PC, xPSR
///
/// EXC_RETURN is kept in R4 across the call; R4 is already saved.
#[no_mangle]
#[unsafe(naked)]
pub unsafe extern "C" fn PendSV() {
    naked_asm!(
        "mrs r0, psp",
        "stmdb r0!, {{r4-r11}}",

        "mov r4, lr",
        "bl {switch}",
        "mov lr, r4",

        "ldmia r0!, {{r4-r11}}",
        "msr psp, r0",

        "bx lr",

        switch = sym os_switch_context,
    );
}

/// Make Thread mode unprivileged from Handler mode
///
/// SPSEL writes are ignored in Handler mode, only nPRIV takes effect on
/// the next exception return.
pub fn os_thread_unprivileged() {
    unsafe {
        asm!(
            "msr control, {ctrl}",
            "isb",
            ctrl = in(reg) CONTROL_PSP_UNPRIV,
            options(nomem, nostack, preserves_flags)
        )
    }
}

/// SVC request in r0: raise BASEPRI for the calling task
const SVC_TASK_MASK: u32 = 1;

/// SVC request in r0: drop BASEPRI back to 0
const SVC_TASK_UNMASK: u32 = 0;

/// Ask the SVCall handler to mask or unmask on behalf of the calling task
///
/// Only for unprivileged Thread mode, where `cpsid`/`cpsie` and BASEPRI
/// writes are ignored.
#[inline(always)]
pub fn os_svc_task_mask(mask: bool) {
    let req = if mask { SVC_TASK_MASK } else { SVC_TASK_UNMASK };

    unsafe {
        asm!(
            "svc #0",
            inout("r0") req => _,
            options(nostack, preserves_flags)
        )
    }
}

/// SVCall exception handler
///
/// Tasks always trap from PSP: hand the stacked frame to the dispatcher,
/// which returns straight through EXC_RETURN in LR.
#[no_mangle]
#[unsafe(naked)]
pub unsafe extern "C" fn SVCall() {
    naked_asm!(
        "mrs r0, psp",
        "b {dispatch}",
        dispatch = sym os_svc_dispatch,
    );
}

/// Rust half of SVCall. BASEPRI is not part of the frame and stays in
/// effect after the exception return.
unsafe extern "C" fn os_svc_dispatch(frame: *const u32) {
    let req = unsafe { frame.read_volatile() };

    unsafe {
        match req {
            SVC_TASK_MASK => cortex_m::register::basepri::write(CFG_PRIO_TASK_MASK),
            _ => cortex_m::register::basepri::write(0),
        }
    }
}

/// Whether privileged code had interrupts masked when the current
/// exception was taken
pub fn os_irq_masked() -> bool {
    cortex_m::register::primask::read().is_inactive()
}

/// Read the fault status registers
pub fn os_fault_regs() -> FaultSnapshot {
    let scb = unsafe { &*SCB::PTR };

    FaultSnapshot {
        hfsr: scb.hfsr.read(),
        cfsr: scb.cfsr.read(),
        mmfar: scb.mmfar.read(),
        bfar: scb.bfar.read(),
    }
}

/// Stop here: trap to the debugger, or lock up without one
pub fn os_halt() -> ! {
    loop {
        cortex_m::asm::bkpt();
    }
}

/// HardFault handler. MemManage, BusFault and UsageFault are left disabled
/// and escalate here.
#[cortex_m_rt::exception]
unsafe fn HardFault(_ef: &cortex_m_rt::ExceptionFrame) -> ! {
    crate::fault::os_fault_report(os_fault_regs())
}
