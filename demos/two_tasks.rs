//! Two Tasks Example - two counters preempted round robin on STM32F401
//!
//! Both tasks log. The defmt logger lock is taken through the SVC-backed
//! task critical section, so a switch never lands inside a log frame.

#![no_std]
#![no_main]

use core::sync::atomic::{AtomicU32, Ordering};

use cortex_m_rt::entry;
use tickswitch::{os_start_with, KernelConfig};

/// STM32F401 runs from its 16 MHz HSI after reset
const DEMO_CONFIG: KernelConfig = KernelConfig {
    cpu_clock_hz: 16_000_000,
    ..KernelConfig::new()
};

// ============ Shared Counters ============

static G_VAR1: AtomicU32 = AtomicU32::new(0);
static G_VAR2: AtomicU32 = AtomicU32::new(0);

// ============ Tasks ============

fn task0() -> ! {
    loop {
        let n = G_VAR1.fetch_add(1, Ordering::Relaxed);
        if n % 1_000_000 == 0 {
            tickswitch::info!("task0: {=u32}", n);
        }
    }
}

fn task1() -> ! {
    loop {
        let n = G_VAR2.fetch_add(1, Ordering::Relaxed);
        if n % 1_000_000 == 0 {
            tickswitch::info!("task1: {=u32}", n);
        }
    }
}

// ============ Main ============

#[entry]
fn main() -> ! {
    tickswitch::info!("Starting kernel");

    match os_start_with(&DEMO_CONFIG, [task0, task1]) {
        Ok(never) => match never {},
        Err(_err) => {
            tickswitch::error!("start failed: {}", _err);
            loop { cortex_m::asm::bkpt(); }
        }
    }
}
