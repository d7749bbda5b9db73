//! Thread context switching and the timer interrupt entry point.
//!
//! Every context switch in this kernel — whether driven by a real PIT tick
//! or by a thread voluntarily raising the same vector via `int` — goes
//! through the one handler below. The outgoing thread's full register file
//! is saved by a hardware-style `pushad` onto its own stack, the scheduler
//! picks the next thread and hands back its saved stack pointer, and the
//! incoming thread's register file is restored by `popad`/`iretd`. A freshly
//! created thread's stack is seeded by [`seed_stack`] to look exactly like a
//! thread that was interrupted right before running `entry(arg)`, so the
//! same `popad`/`iretd` path brings it to life the first time it's chosen.
//!
//! `original_source/include/alienos/kernel/thread.h` requires the saved
//! stack pointer to sit at a fixed offset in the thread descriptor ("ensure
//! this field sits at offset 4, the timer interrupt handler expects it to
//! sit there") — `sched::thread::Thread` keeps `esp` as its second `u32`
//! field for exactly that reason.

use core::arch::naked_asm;
use super::pic;

/// Entry point installed at the PIC's remapped timer vector (32). Reached
/// either by a real IRQ0 or by [`raise_reschedule`] executing `int 32`
/// directly — both land here with interrupts already disabled by the CPU's
/// interrupt-gate semantics, so there is nothing further to disable.
///
/// Layout after `pushad`, from the resulting `esp` upward: edi, esi, ebp, a
/// dummy copy of the pre-`pushad` esp (ignored by `popad`), ebx, edx, ecx,
/// eax, then the CPU's own interrupt frame (eip, cs, eflags — no esp/ss
/// here since this is always a same-privilege-level trap). That whole
/// region is exactly what [`seed_stack`] builds for a new thread.
#[naked]
pub extern "C" fn timer_interrupt_entry() {
    unsafe {
        naked_asm!(
            "pushad",
            "push esp",
            "call {tick}",
            "add esp, 4",
            "mov esp, eax",
            "call {eoi}",
            "popad",
            "iretd",
            tick = sym on_timer_tick_ffi,
            eoi = sym send_eoi_irq0,
        );
    }
}

/// cdecl shim between the naked entry stub and the scheduler: advances the
/// wall clock, runs the tick handler (spec §4.2), and hands back the chosen
/// thread's saved stack pointer for the stub to switch onto.
extern "C" fn on_timer_tick_ffi(outgoing_esp: u32) -> u32 {
    super::pit::advance();
    crate::sched::on_timer_tick(outgoing_esp)
}

extern "C" fn send_eoi_irq0() {
    pic::send_eoi(0);
}

const TIMER_VECTOR: u8 = pic::IRQ_BASE;

/// Voluntarily raise the same vector the timer uses, so `yield`/`sleep`/
/// block drive the exact tick-handler body spec §4.2 specifies ("critical:
/// sleep/block set the outgoing status before yielding").
#[inline]
pub fn raise_reschedule() {
    unsafe {
        core::arch::asm!("int {vec}", vec = const TIMER_VECTOR, options(nomem, nostack));
    }
}

/// Trampoline a freshly seeded thread's first context switch lands on.
/// `popad` leaves the real entry point in `ebx` and the argument in `eax`
/// (see [`seed_stack`]); this calls `entry(arg)` and, on return, hands off
/// to the scheduler's exit shim, which never switches back to this stack.
#[naked]
extern "C" fn thread_entry_trampoline() {
    unsafe {
        naked_asm!(
            "push eax",
            "call ebx",
            "add esp, 4",
            "call {exit_shim}",
            "2:",
            "hlt",
            "jmp 2b",
            exit_shim = sym exit_shim_trampoline,
        );
    }
}

extern "C" fn exit_shim_trampoline() {
    crate::sched::exit_current();
}

/// Number of 32-bit words in the frame [`seed_stack`] writes: 8 general
/// registers (the `pushad` image) plus the 3-word `iretd` frame.
const FRAME_WORDS: u32 = 11;

/// Build the initial stack frame for a brand-new thread so that the first
/// `popad`/`iretd` sequence in [`timer_interrupt_entry`] resumes as if the
/// thread had already been running and was merely interrupted right before
/// `entry(arg)`. Returns the `esp` value to store in the new thread's
/// descriptor.
///
/// # Safety
/// `stack_top` must be the top (highest address, exclusive) of a stack
/// buffer at least [`FRAME_WORDS`] words long that nothing else references.
pub unsafe fn seed_stack(stack_top: u32, entry: extern "C" fn(usize), arg: usize) -> u32 {
    unsafe {
        let sp = (stack_top & !0xF).wrapping_sub(FRAME_WORDS * 4);
        let frame = sp as *mut u32;

        // pushad image, in popad's pop order (low address first): edi, esi,
        // ebp, dummy-esp, ebx, edx, ecx, eax.
        frame.add(0).write(0); // edi
        frame.add(1).write(0); // esi
        frame.add(2).write(0); // ebp
        frame.add(3).write(0); // esp (discarded by popad)
        frame.add(4).write(entry as u32); // ebx -- trampoline reads entry from here
        frame.add(5).write(0); // edx
        frame.add(6).write(0); // ecx
        frame.add(7).write(arg as u32); // eax -- trampoline reads arg from here

        // iretd frame: eip, cs, eflags (IF set, so the thread starts with
        // interrupts enabled, matching every other thread at this point).
        frame.add(8).write(thread_entry_trampoline as u32);
        frame.add(9).write(super::gdt::KERNEL_CODE_SEL as u32);
        frame.add(10).write(0x200);

        sp
    }
}
