//! Armv7-M context frame layout and the initial frame builder
//!
//! ```text
//! sp+
//!  0-7:  [saved by PendSV]   R4  R5  R6  R7  R8  R9  R10 R11
//!  8-15: [saved by HW]       R0  R1  R2  R3  R12 LR  PC  xPSR
//!                                                         ^ frame top, 8-byte aligned
//! ```
//!
//! A task that has never run gets this frame built by hand, so the first
//! PendSV return into it looks exactly like any later one.

use crate::types::{StkElement, TaskFn};

/// xPSR with only the Thumb (execution state) bit set
pub const XPSR_THUMB: u32 = 0x0100_0000;

/// EXC_RETURN: return to Thread mode, use PSP, basic frame
pub const EXC_RETURN_THREAD_PSP: u32 = 0xFFFF_FFFD;

/// Words pushed by `stmdb r0!, {r4-r11}` in PendSV
pub const SW_FRAME_WORDS: usize = 8;

/// Words pushed by the hardware on exception entry (no FPU state)
pub const HW_FRAME_WORDS: usize = 8;

/// Full frame size in words
pub const CONTEXT_FRAME_WORDS: usize = SW_FRAME_WORDS + HW_FRAME_WORDS;

/// Stack pointer alignment required by AAPCS and the exception entry
pub const STK_ALIGN: usize = 8;

/// Registers saved and restored by the switch handler
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SwFrame {
    pub r4: u32,
    pub r5: u32,
    pub r6: u32,
    pub r7: u32,
    pub r8: u32,
    pub r9: u32,
    pub r10: u32,
    pub r11: u32,
}

/// Registers stacked by the hardware on exception entry
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HwFrame {
    pub r0: u32,
    pub r1: u32,
    pub r2: u32,
    pub r3: u32,
    pub r12: u32,
    pub lr: u32,
    pub pc: u32,
    pub xpsr: u32,
}

/// Complete saved context of a switched-out task
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContextFrame {
    pub sw: SwFrame,
    pub hw: HwFrame,
}

const _: () = assert!(core::mem::size_of::<SwFrame>() == SW_FRAME_WORDS * 4);
const _: () = assert!(core::mem::size_of::<HwFrame>() == HW_FRAME_WORDS * 4);
const _: () = assert!(core::mem::size_of::<ContextFrame>() == CONTEXT_FRAME_WORDS * 4);

impl ContextFrame {
    /// Frame of a task that has never run: all registers zero, returning to
    /// `task_fn` in Thread mode on PSP
    pub fn initial(task_fn: TaskFn) -> Self {
        ContextFrame {
            sw: SwFrame::default(),
            hw: HwFrame {
                lr: EXC_RETURN_THREAD_PSP,
                pc: entry_address(task_fn),
                xpsr: XPSR_THUMB,
                ..HwFrame::default()
            },
        }
    }
}

/// Address of a task entry with the Thumb bit set
#[inline]
pub fn entry_address(task_fn: TaskFn) -> u32 {
    (task_fn as usize as u32) | 1
}

/// Whether a stack pointer satisfies the 8-byte alignment invariant
#[inline]
pub fn is_stk_aligned(sp: *const StkElement) -> bool {
    (sp as usize) % STK_ALIGN == 0
}

/// Build the initial frame of a task and store its stack pointer
///
/// # Arguments
/// * `stk_ptr` - Receives the stack pointer of the built frame
/// * `stk_base` - Lowest address of the stack region
/// * `stk_size` - Stack size in words
/// * `task_fn` - Task entry point
///
/// # Safety
/// `stk_base..stk_base + stk_size` must be writable memory owned by the
/// task and large enough for [`CONTEXT_FRAME_WORDS`] after aligning its top
/// down to 8 bytes. Nothing is checked here.
pub unsafe fn os_task_stk_init(
    stk_ptr: &mut *mut StkElement,
    stk_base: *mut StkElement,
    stk_size: usize,
    task_fn: TaskFn,
) {
    let stk_top = stk_base.wrapping_add(stk_size) as usize;
    let stk_aligned = stk_top & !(STK_ALIGN - 1);
    let frame_ptr = (stk_aligned as *mut StkElement).wrapping_sub(CONTEXT_FRAME_WORDS);

    unsafe {
        (frame_ptr as *mut ContextFrame).write_volatile(ContextFrame::initial(task_fn));
    }

    *stk_ptr = frame_ptr;
}
