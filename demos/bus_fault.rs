//! Bus Fault Example - task 1 reads unmapped memory, the kernel halts
//!
//! Attach a debugger: execution stops on the `bkpt` in the fault handler
//! and `FAULT` holds the fault status, with BFAR = 0x6000_0000.

#![no_std]
#![no_main]

use core::sync::atomic::{AtomicU32, Ordering};

use cortex_m_rt::entry;
use tickswitch::{os_start_with, KernelConfig};

/// Unmapped on STM32F401 (FSMC bank, not present)
const BAD_ADDR: *const u32 = 0x6000_0000 as *const u32;

/// STM32F401 runs from its 16 MHz HSI after reset
const DEMO_CONFIG: KernelConfig = KernelConfig {
    cpu_clock_hz: 16_000_000,
    ..KernelConfig::new()
};

static TICKS_SEEN: AtomicU32 = AtomicU32::new(0);

fn task0() -> ! {
    loop {
        TICKS_SEEN.store(tickswitch::os_time_get(), Ordering::Relaxed);
    }
}

fn task1() -> ! {
    // Precise bus fault, escalated to HardFault
    let _value = unsafe { core::ptr::read_volatile(BAD_ADDR) };
    loop { cortex_m::asm::nop(); }
}

#[entry]
fn main() -> ! {
    match os_start_with(&DEMO_CONFIG, [task0, task1]) {
        Ok(never) => match never {},
        Err(_err) => {
            tickswitch::error!("start failed: {}", _err);
            loop { cortex_m::asm::bkpt(); }
        }
    }
}
