//! Hardware abstraction layer — the narrow interface platform-agnostic
//! kernel code (`mem::heap`, `sched`, `sync`) is allowed to call into.
//!
//! Grounded in the teacher kernel's `arch::hal` facade pattern: free
//! functions forwarding to the single supported architecture. Spec §6 calls
//! these out explicitly as external interfaces consumed by the core: the
//! interrupt enable/disable/save-restore trio and the CPU idle loop.

use crate::arch::x86;

/// Return whether interrupts are currently enabled on this CPU.
#[inline]
pub fn interrupts_enabled() -> bool {
    x86::interrupts::interrupts_enabled()
}

/// Enable interrupts on this CPU.
#[inline]
pub fn enable_interrupts() {
    x86::interrupts::enable();
}

/// Disable interrupts on this CPU.
#[inline]
pub fn disable_interrupts() {
    x86::interrupts::disable();
}

/// Disable interrupts, returning whether they were enabled beforehand.
/// Pair with [`restore_interrupts`] to implement the save-and-disable /
/// restore-to-saved discipline spec §5 requires of every core critical
/// section.
#[inline]
pub fn save_and_disable_interrupts() -> bool {
    x86::interrupts::save_and_disable()
}

/// Restore a previously-saved interrupt state.
#[inline]
pub fn restore_interrupts(was_enabled: bool) {
    if was_enabled {
        x86::interrupts::enable();
    }
}

/// Halt the CPU until the next interrupt.
#[inline]
pub fn halt() {
    x86::interrupts::halt();
}

/// The CPU idle loop consumed by `sched::idle`: enable interrupts, wait for
/// one, disable again, then let the caller request a reschedule.
#[inline]
pub fn idle_wait() {
    enable_interrupts();
    halt();
    disable_interrupts();
}
