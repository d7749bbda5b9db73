#![no_std]
#![no_main]
#![feature(alloc_error_handler)]
#![feature(naked_functions)]
#![allow(dead_code, static_mut_refs)]

//! AlienOS kernel core entry point.
//!
//! Brings subsystems up in the order the hardware and the core triad
//! require: architecture (GDT, IDT, PIC, PIT) first since everything below
//! depends on a working interrupt story, then the heap, then the
//! scheduler, then interrupts are enabled last so nothing fires on an
//! uninitialized table. Grounded in the teacher kernel's `main.rs` phase
//! structure (numbered phases, a serial banner before anything else, CPU
//! setup before memory before subsystems before `sti`), trimmed to the
//! three subsystems spec §1 scopes this crate's core to.

extern crate alloc;

mod arch;
mod drivers;
mod mem;
mod panic;
mod sched;
mod sync;

#[cfg(feature = "kernel_tests")]
mod tests;

use arch::hal;
use arch::x86::multiboot::{self, MemoryRegion};

extern "C" {
    /// Linker-provided symbol (see `link.ld`) marking the end of the loaded
    /// kernel image — the heap's low bound starts at the next page above
    /// this address.
    static _kernel_end: u8;
}

/// Firmware memory maps in practice carry a handful of entries (conventional
/// memory, the EBDA, ACPI tables, usable RAM above 1 MiB); 32 is generous
/// headroom with no heap allocation required this early in boot.
const MAX_MEMORY_REGIONS: usize = 32;

#[no_mangle]
pub extern "C" fn kernel_main(multiboot_info_addr: u32) -> ! {
    drivers::serial::init();
    crate::serial_println!("");
    crate::serial_println!("==============================");
    crate::serial_println!("  AlienOS kernel core");
    crate::serial_println!("==============================");

    drivers::vga::init();
    crate::vga_println!("AlienOS kernel core booting...");

    arch::x86::gdt::init();
    crate::serial_println!("[OK] GDT initialized");
    arch::x86::idt::init();
    crate::serial_println!("[OK] IDT initialized");
    arch::x86::pic::init();
    crate::serial_println!("[OK] PIC remapped (IRQ0-15 -> vectors 32-47)");
    arch::x86::pit::init();
    crate::serial_println!("[OK] PIT programmed at {} Hz", arch::x86::pit::TICK_HZ);

    if drivers::serial::self_test() {
        crate::serial_println!("[OK] serial loopback self-test passed");
    } else {
        crate::serial_println!("[WARN] serial loopback self-test failed");
    }

    let mut regions = [MemoryRegion { base: 0, length: 0, available: false }; MAX_MEMORY_REGIONS];
    let region_count = unsafe { multiboot::memory_map(multiboot_info_addr, &mut regions) };
    crate::serial_println!("[OK] multiboot memory map: {} region(s)", region_count);
    if unsafe { multiboot::has_basic_mem_info(multiboot_info_addr) } {
        crate::serial_println!("[OK] bootloader reported basic memory sizes");
    }

    let kernel_end = unsafe { core::ptr::addr_of!(_kernel_end) as u32 };
    unsafe { mem::heap::init(kernel_end, &regions[..region_count]) };
    crate::serial_println!("[OK] heap initialized above {:#x}", kernel_end);
    mem::heap::print_debug();

    sched::main_init();
    crate::serial_println!("[OK] scheduler initialized (bootstrap tid 0, idle tid 1)");

    arch::x86::pic::unmask(0);
    hal::enable_interrupts();
    crate::serial_println!("[OK] interrupts enabled, 100 Hz tick running");

    #[cfg(feature = "kernel_tests")]
    {
        let report = tests::run_all();
        crate::serial_println!(
            "kernel_tests: {}/{} passed",
            report.total - report.failed,
            report.total
        );
        loop {
            hal::disable_interrupts();
            hal::halt();
        }
    }

    #[cfg(not(feature = "kernel_tests"))]
    loop {
        hal::idle_wait();
    }
}
