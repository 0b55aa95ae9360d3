//! Tests for the global kernel instance
//!
//! These drive the bootstrap, the Rust half of the PendSV handler and the
//! fault reporter through the kernel's statics. The host port stops at the
//! first-task transfer and at the halt by panicking, so both are run under
//! `catch_unwind`. Kept in their own binary: a started kernel stays started.

use std::panic::catch_unwind;
use std::sync::atomic::Ordering;
use std::sync::{Mutex, Once};

use tickswitch::error::OsError;
use tickswitch::fault::{os_fault_report, os_fault_snapshot, FaultCause, FaultSnapshot};
use tickswitch::kernel::{os_is_running, os_switch_context};
use tickswitch::port::frame::{entry_address, EXC_RETURN_THREAD_PSP, SW_FRAME_WORDS};
use tickswitch::port::sim::stub::THREAD_NPRIV;
use tickswitch::types::StkElement;
use tickswitch::{os_start, os_task_current};

fn task_a() -> ! {
    loop {}
}

fn task_b() -> ! {
    loop {}
}

static START: Once = Once::new();

/// Tests that switch share the one scheduler
static SWITCH_LOCK: Mutex<()> = Mutex::new(());

fn start_kernel() {
    START.call_once(|| {
        let handoff = catch_unwind(|| os_start([task_a, task_b]));
        assert!(handoff.is_err(), "host port cannot enter a task");
    });
}

/// Stacked pc and lr of a saved context
fn frame_pc_lr(sp: *mut StkElement) -> (u32, u32) {
    unsafe {
        let hw = sp.add(SW_FRAME_WORDS);
        (hw.add(6).read(), hw.add(5).read())
    }
}

#[test]
fn test_second_start_is_refused() {
    start_kernel();

    assert!(os_is_running());
    assert_eq!(os_start([task_a, task_b]).err(), Some(OsError::OsRunning));
}

#[test]
fn test_switch_handler_then_fault_halts() {
    let _guard = SWITCH_LOCK.lock().unwrap();
    start_kernel();
    assert_eq!(os_task_current(), 0);

    // Pend start: the first PendSV discards the idle context
    THREAD_NPRIV.store(false, Ordering::Relaxed);
    let sp0 = unsafe { os_switch_context(core::ptr::null_mut()) };
    assert!(THREAD_NPRIV.load(Ordering::Relaxed));
    assert_eq!(os_task_current(), 0);
    assert_eq!(frame_pc_lr(sp0), (entry_address(task_a), EXC_RETURN_THREAD_PSP));

    // Every switch-in drops Thread mode privilege again
    THREAD_NPRIV.store(false, Ordering::Relaxed);
    let sp1 = unsafe { os_switch_context(sp0) };
    assert!(THREAD_NPRIV.load(Ordering::Relaxed));
    assert_eq!(os_task_current(), 1);
    assert_eq!(frame_pc_lr(sp1), (entry_address(task_b), EXC_RETURN_THREAD_PSP));

    let back = unsafe { os_switch_context(sp1) };
    assert_eq!(back, sp0);
    assert_eq!(os_task_current(), 0);

    // Precise bus fault at 0x6000_0000, escalated to HardFault
    let snap = FaultSnapshot { hfsr: 1 << 30, cfsr: 0x8200, mmfar: 0, bfar: 0x6000_0000 };
    assert_eq!(os_fault_snapshot(), None);

    let halted = catch_unwind(|| {
        os_fault_report(snap);
    });
    assert!(halted.is_err());

    let recorded = os_fault_snapshot().unwrap();
    assert_eq!(recorded, snap);
    assert_eq!(recorded.bfar, 0x6000_0000);
    assert_eq!(
        recorded.cause(),
        FaultCause::Bus { address: Some(0x6000_0000), precise: true, stacking: false }
    );

    // A second fault does not overwrite the first
    let later = FaultSnapshot { hfsr: 1 << 30, cfsr: 0x0100_0000, mmfar: 0, bfar: 0 };
    assert!(catch_unwind(|| {
        os_fault_report(later);
    })
    .is_err());
    assert_eq!(os_fault_snapshot(), Some(snap));

    // Halted: pending switches resume the interrupted task
    for _ in 0..3 {
        let sp = unsafe { os_switch_context(sp0) };
        assert_eq!(sp, sp0);
        assert_eq!(os_task_current(), 0);
    }
}
