//! Host model of the Cortex-M exception entry/return
//!
//! [`SimCpu`] reproduces, word for word, what the hardware and the PendSV
//! handler do to the process stack: hardware stacking on entry, the
//! `stmdb`/`ldmia` of r4-r11, and hardware unstacking on return. It runs
//! the real [`Scheduler::switch_context`] in between, so frame layout and
//! switch logic can be checked off-target.

use crate::config::StartMode;
use crate::port::frame::{
    is_stk_aligned, EXC_RETURN_THREAD_PSP, HW_FRAME_WORDS, SW_FRAME_WORDS, XPSR_THUMB,
};
use crate::sched::Scheduler;
use crate::types::StkElement;

/// Register file and process stack of a simulated core in Thread mode
#[derive(Debug, Clone)]
pub struct SimCpu {
    /// r0-r12
    pub r: [u32; 13],
    /// r14
    pub lr: u32,
    /// Program counter as loaded by the last exception return
    pub pc: u32,
    /// Program status register
    pub xpsr: u32,
    /// Process stack pointer
    pub psp: *mut StkElement,
    /// PENDSVSET latch
    pub pendsv_pending: bool,
    /// Number of PendSV handler runs
    pub pendsv_runs: u32,
}

impl SimCpu {
    /// A core fresh out of reset: registers zero, no stack yet
    pub fn new() -> Self {
        Self {
            r: [0; 13],
            lr: 0,
            pc: 0,
            xpsr: XPSR_THUMB,
            psp: core::ptr::null_mut(),
            pendsv_pending: false,
            pendsv_runs: 0,
        }
    }

    /// Set PENDSVSET. Setting it while already pending has no extra effect.
    pub fn set_pendsv(&mut self) {
        self.pendsv_pending = true;
    }

    /// Hardware stacking of r0-r3, r12, lr, pc, xPSR onto PSP
    ///
    /// # Safety
    /// `psp` must have room for the hardware frame below it.
    pub unsafe fn exception_entry(&mut self) {
        debug_assert!(is_stk_aligned(self.psp));

        let frame = [
            self.r[0], self.r[1], self.r[2], self.r[3], self.r[12],
            self.lr, self.pc, self.xpsr,
        ];

        unsafe {
            let sp = self.psp.sub(HW_FRAME_WORDS);
            for (i, word) in frame.iter().enumerate() {
                sp.add(i).write_volatile(*word);
            }
            self.psp = sp;
        }

        self.lr = EXC_RETURN_THREAD_PSP;
    }

    /// The PendSV handler body: push r4-r11, call `switch`, pop r4-r11
    ///
    /// # Safety
    /// `psp` must point at a hardware frame with room for r4-r11 below it,
    /// and `switch` must return a pointer to a saved r4-r11 block.
    pub unsafe fn pendsv<F>(&mut self, switch: F)
    where
        F: FnOnce(*mut StkElement) -> *mut StkElement,
    {
        unsafe {
            // stmdb r0!, {r4-r11}
            let sp = self.psp.sub(SW_FRAME_WORDS);
            for i in 0..SW_FRAME_WORDS {
                sp.add(i).write_volatile(self.r[4 + i]);
            }

            // EXC_RETURN survives the call in r4
            let exc_return = self.lr;
            let sp = switch(sp);
            self.lr = exc_return;

            // ldmia r0!, {r4-r11}
            for i in 0..SW_FRAME_WORDS {
                self.r[4 + i] = sp.add(i).read_volatile();
            }
            self.psp = sp.add(SW_FRAME_WORDS);
        }

        self.pendsv_runs += 1;
    }

    /// Hardware unstacking on `bx lr` with EXC_RETURN
    ///
    /// # Safety
    /// `psp` must point at a hardware frame.
    pub unsafe fn exception_return(&mut self) {
        assert_eq!(self.lr, EXC_RETURN_THREAD_PSP, "not returning to Thread mode on PSP");
        debug_assert!(is_stk_aligned(self.psp));

        unsafe {
            let sp = self.psp;
            self.r[0] = sp.add(0).read_volatile();
            self.r[1] = sp.add(1).read_volatile();
            self.r[2] = sp.add(2).read_volatile();
            self.r[3] = sp.add(3).read_volatile();
            self.r[12] = sp.add(4).read_volatile();
            self.lr = sp.add(5).read_volatile();
            self.pc = sp.add(6).read_volatile();
            self.xpsr = sp.add(7).read_volatile();
            self.psp = sp.add(HW_FRAME_WORDS);
        }
    }

    /// Take a pending PendSV if there is one
    ///
    /// # Returns
    /// `true` if a switch handler ran
    ///
    /// # Safety
    /// Same as [`SimCpu::exception_entry`], and `sched` must own the task
    /// stacks `psp` points into.
    pub unsafe fn service_pendsv<const N: usize>(&mut self, sched: &mut Scheduler<N>) -> bool {
        if !self.pendsv_pending {
            return false;
        }
        self.pendsv_pending = false;

        unsafe {
            self.exception_entry();
            self.pendsv(|sp| sched.switch_context(sp));
            self.exception_return();
        }

        true
    }

    /// Model of the bootstrap handoff into task 0
    ///
    /// # Safety
    /// Task frames must have been built in `sched`.
    pub unsafe fn start_first_task<const N: usize>(
        &mut self,
        sched: &mut Scheduler<N>,
        mode: StartMode,
    ) {
        let first_sp = sched.start(mode);

        match mode {
            StartMode::Direct => unsafe {
                // pop {r4-r11}; entry to the xPSR slot; pop {r0-r3, r12, lr};
                // skip; pop {pc}
                let mut sp = first_sp;
                for i in 0..SW_FRAME_WORDS {
                    self.r[4 + i] = sp.add(i).read_volatile();
                }
                sp = sp.add(SW_FRAME_WORDS);

                let entry = sp.add(6).read_volatile();
                sp.add(7).write_volatile(entry);

                self.r[0] = sp.add(0).read_volatile();
                self.r[1] = sp.add(1).read_volatile();
                self.r[2] = sp.add(2).read_volatile();
                self.r[3] = sp.add(3).read_volatile();
                self.r[12] = sp.add(4).read_volatile();
                self.lr = sp.add(5).read_volatile();
                self.pc = sp.add(7).read_volatile();
                self.psp = sp.add(HW_FRAME_WORDS);
            },
            StartMode::Pend => unsafe {
                // The idle background runs on task 0's stack below its frame
                self.psp = first_sp;
                self.set_pendsv();
                self.service_pendsv(sched);
            },
        }
    }
}

impl Default for SimCpu {
    fn default() -> Self {
        Self::new()
    }
}

/// Port entry points for targets without the Cortex-M port
pub mod stub {
    use crate::config::StartMode;
    use crate::fault::FaultSnapshot;
    use crate::types::StkElement;
    use portable_atomic::{AtomicBool, Ordering};

    /// CONTROL.nPRIV of the simulated Thread mode
    pub static THREAD_NPRIV: AtomicBool = AtomicBool::new(false);

    pub fn os_cpu_systick_init(_cycles: u32) {
        // No SysTick off-target
    }

    pub fn os_cpu_prio_init(_prio_tick: u8, _prio_switch: u8) {
        // No NVIC off-target
    }

    pub fn os_int_ctx_sw() {
        // No-op for testing
    }

    pub fn os_thread_unprivileged() {
        THREAD_NPRIV.store(true, Ordering::Relaxed);
    }

    pub fn os_irq_masked() -> bool {
        false
    }

    pub unsafe fn os_start_first_task(_first_sp: *mut StkElement, _mode: StartMode) -> ! {
        panic!("os_start_first_task not available on this platform");
    }

    pub fn os_fault_regs() -> FaultSnapshot {
        FaultSnapshot::default()
    }

    pub fn os_halt() -> ! {
        panic!("kernel halted");
    }
}
