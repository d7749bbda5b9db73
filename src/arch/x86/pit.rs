//! 8254 Programmable Interval Timer driver.
//!
//! Programs channel 0 for a fixed ~100 Hz square wave, matching
//! `original_source/src/io/timer.c` (divisor 11931 against the 1.193182 MHz
//! PIT clock) rather than the teacher kernel's TSC-calibrated 1000 Hz timer —
//! the original's fixed divisor is the simpler, directly-grounded choice for
//! a single fixed tick rate with no per-CPU calibration to do.

use super::port::outb;
use core::sync::atomic::{AtomicU32, Ordering};

const PIT_CHANNEL0: u16 = 0x40;
const PIT_COMMAND: u16 = 0x43;

/// Mode 3 (square wave), channel 0, lobyte/hibyte access.
const PIT_CMD_MODE3: u8 = 0x36;

/// Divisor chosen by the original kernel's `timer_init`: 1_193_182 / 11931
/// is approximately 100.0 Hz.
const PIT_DIVISOR: u16 = 11931;

pub const TICK_HZ: u32 = 100;

static TICKS: AtomicU32 = AtomicU32::new(0);

/// Program the PIT for periodic ~100 Hz interrupts on IRQ0.
pub fn init() {
    unsafe {
        outb(PIT_COMMAND, PIT_CMD_MODE3);
        outb(PIT_CHANNEL0, (PIT_DIVISOR & 0xFF) as u8);
        outb(PIT_CHANNEL0, (PIT_DIVISOR >> 8) as u8);
    }
}

/// Advance the monotonic tick counter. Called from the IRQ0 handler only.
pub fn advance() -> u32 {
    TICKS.fetch_add(1, Ordering::SeqCst) + 1
}

/// The current tick count since boot, used by `sched` for sleep deadlines
/// and by the serial driver's debug log prefix.
pub fn now_ticks() -> u32 {
    TICKS.load(Ordering::SeqCst)
}
