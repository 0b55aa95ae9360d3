//! Global kernel state and bootstrap
//!
//! Owns the task table and the task stacks, starts multitasking and hosts
//! the Rust half of the context switch.

use core::convert::Infallible;
use portable_atomic::{AtomicBool, Ordering};

use crate::config::{KernelConfig, CFG_STK_SIZE, CFG_STK_SIZE_MIN, CFG_TASK_COUNT};
use crate::critical::CriticalSection;
use crate::core::cs_cell::CsCell;
use crate::error::{OsError, OsResult};
use crate::fault::FAULT;
use crate::sched::Scheduler;
use crate::task::TaskStack;
use crate::time::TICK;
use crate::types::{SchedPhase, StkElement, TaskFn, TaskId};

const _: () = assert!(CFG_TASK_COUNT >= 1, "at least one task is required");
const _: () = assert!(CFG_STK_SIZE >= CFG_STK_SIZE_MIN, "task stack below minimum");

// ============ Global Instances ============

/// Set once the bootstrap has committed to starting tasks
static RUNNING: AtomicBool = AtomicBool::new(false);

/// Task table and round-robin state
static SCHED: CsCell<Scheduler<CFG_TASK_COUNT>> = CsCell::new(Scheduler::new());

/// Task stacks
static TASK_STKS: CsCell<[TaskStack<CFG_STK_SIZE>; CFG_TASK_COUNT]> =
    CsCell::new([const { TaskStack::new() }; CFG_TASK_COUNT]);

// ============ Public API ============

/// Start multitasking with the configuration from [`crate::config`]
///
/// See [`os_start_with`].
pub fn os_start(entries: [TaskFn; CFG_TASK_COUNT]) -> OsResult<Infallible> {
    os_start_with(&KernelConfig::new(), entries)
}

/// Start multitasking
///
/// Builds one frame per task, arms SysTick, sets SysTick above PendSV,
/// then drops to unprivileged Thread mode on PSP and enters task 0.
/// Only returns on error.
///
/// # Returns
/// * `Err(OsError::OsRunning)` - called a second time
/// * any error from [`KernelConfig::validate`]
/// * `Err(OsError::StkSizeInvalid)` - task stack too small
pub fn os_start_with(
    cfg: &KernelConfig,
    entries: [TaskFn; CFG_TASK_COUNT],
) -> OsResult<Infallible> {
    cfg.validate()?;
    let tick_cycles = cfg.tick_cycles()?;

    let cs = CriticalSection::enter();

    if RUNNING.load(Ordering::Acquire) {
        return Err(OsError::OsRunning);
    }

    let sched = SCHED.borrow(&cs);
    let stacks = TASK_STKS.borrow(&cs);

    for (id, (stack, entry)) in stacks.iter_mut().zip(entries).enumerate() {
        unsafe { sched.task_init(id, stack.as_mut_ptr(), stack.len(), entry)? };
    }

    TICK.set_period(cfg.switch_period);
    crate::port::os_cpu_systick_init(tick_cycles);
    crate::port::os_cpu_prio_init(cfg.prio_tick, cfg.prio_switch);

    RUNNING.store(true, Ordering::Release);

    crate::info!(
        "starting {=usize} tasks, switch every {=u32} ticks",
        CFG_TASK_COUNT,
        cfg.switch_period
    );

    let first_sp = sched.start(cfg.start_mode);

    // Interrupts stay masked until the handoff unmasks them
    cs.handoff();

    unsafe { crate::port::os_start_first_task(first_sp, cfg.start_mode) }
}

/// Whether multitasking has been started
#[inline]
pub fn os_is_running() -> bool {
    RUNNING.load(Ordering::Acquire)
}

/// Currently running task
pub fn os_task_current() -> TaskId {
    // A single aligned word read, the switch handler is the only writer
    unsafe { (*SCHED.as_ptr()).current() }
}

// ============ Context switch ============

/// Rust half of the switch handler: save the outgoing stack pointer, pick
/// the next task, return its stack pointer
///
/// # Safety
/// Only called by the PendSV handler with the PSP it just pushed r4-r11 to.
#[no_mangle]
pub unsafe extern "C" fn os_switch_context(cur_sp: *mut StkElement) -> *mut StkElement {
    let sched = unsafe { SCHED.handler_mut() };

    if FAULT.is_captured() {
        sched.halt();
    }

    let next_sp = unsafe { sched.switch_context(cur_sp) };

    // nPRIV is not part of the frame. The bootstrap unmasks while still
    // privileged, so a switch can land before it has dropped privilege.
    if sched.phase() == SchedPhase::Running {
        crate::port::os_thread_unprivileged();
    }

    next_sp
}

/// Background context left behind by the bootstrap
///
/// Runs on task 0's stack below its initial frame until the first switch,
/// and is never resumed afterwards.
pub extern "C" fn os_background_idle() -> ! {
    loop {
        cortex_m::asm::nop();
    }
}
