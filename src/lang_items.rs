//! Panic handling and the defmt transport

// RTT transport and panic-probe when defmt is enabled on ARM targets
#[cfg(all(feature = "defmt", target_arch = "arm"))]
use defmt_rtt as _;

#[cfg(all(feature = "defmt", target_arch = "arm"))]
use panic_probe as _;

#[cfg(all(feature = "defmt", target_arch = "arm"))]
#[defmt::panic_handler]
fn defmt_panic() -> ! {
    cortex_m::asm::udf()
}

// Without defmt a panic parks the core in an infinite loop
#[cfg(all(not(feature = "defmt"), target_arch = "arm"))]
use panic_halt as _;

// Log lines are stamped with the kernel tick
#[cfg(all(feature = "defmt", target_arch = "arm"))]
defmt::timestamp!("{=u32}", crate::core::time::os_time_get());
