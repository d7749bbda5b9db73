//! Interrupt enable/disable/save-restore primitives (spec §6).
//!
//! Grounded in the original `eflags.h`/`interrupt.h`: interrupt state lives
//! in EFLAGS.IF, read back via `pushfd`/`pop`.

use core::arch::asm;

const EFLAGS_IF: u32 = 1 << 9;

/// Return whether interrupts are currently enabled (EFLAGS.IF set).
#[inline]
pub fn interrupts_enabled() -> bool {
    let flags: u32;
    unsafe {
        asm!("pushfd; pop {0:e}", out(reg) flags, options(nomem, preserves_flags));
    }
    flags & EFLAGS_IF != 0
}

/// Enable interrupts (`sti`).
#[inline]
pub fn enable() {
    unsafe { asm!("sti", options(nomem, nostack)); }
}

/// Disable interrupts (`cli`).
#[inline]
pub fn disable() {
    unsafe { asm!("cli", options(nomem, nostack)); }
}

/// Disable interrupts, returning the previous enabled state so the caller
/// can restore it later. This is the "save-and-disable" half of the
/// nesting-safe discipline spec §5 requires.
#[inline]
pub fn save_and_disable() -> bool {
    let was_enabled = interrupts_enabled();
    disable();
    was_enabled
}

/// Halt the CPU until the next interrupt (`hlt`). Interrupts must already
/// be enabled or this blocks forever.
#[inline]
pub fn halt() {
    unsafe { asm!("hlt", options(nomem, nostack)); }
}
