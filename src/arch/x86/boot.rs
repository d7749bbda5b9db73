//! Multiboot header and the `_start` entry point.
//!
//! Out of scope per spec §1 ("boot/multiboot entry" is an external
//! collaborator); carried here as a minimal, real implementation so the
//! crate is self-contained rather than depending on an externally-assembled
//! object, mirroring the teacher kernel's own multiboot-loaded layout
//! (`link.ld`'s `_start`/`.multiboot` section) but written directly as a
//! naked Rust function instead of a separate `.asm` file, since this crate
//! already does the rest of its privileged assembly that way (`context.rs`,
//! `idt.rs`).

use core::arch::naked_asm;

const MULTIBOOT_MAGIC: u32 = 0x1BAD_B002;
/// Bit 0: align loaded modules on page boundaries. Bit 1: pass a memory map
/// (`mem_*`/`mmap_*` fields `mem::heap::init` reads via `arch::x86::
/// multiboot`).
const MULTIBOOT_FLAGS: u32 = 0x0000_0003;

#[repr(C)]
struct MultibootHeader {
    magic: u32,
    flags: u32,
    checksum: u32,
}

/// Must live in its own linker-script section within the first 8 KiB of the
/// kernel image for GRUB (or any Multiboot-1 loader) to find it.
#[link_section = ".multiboot"]
#[used]
static MULTIBOOT_HEADER: MultibootHeader = MultibootHeader {
    magic: MULTIBOOT_MAGIC,
    flags: MULTIBOOT_FLAGS,
    checksum: 0u32
        .wrapping_sub(MULTIBOOT_MAGIC)
        .wrapping_sub(MULTIBOOT_FLAGS),
};

extern "C" {
    /// Linker-provided symbol (see `link.ld`): top of the small bootstrap
    /// stack `_start` switches onto before anything else runs. Used only as
    /// an address, never read through.
    static boot_stack_top: u8;
}

/// Entry point named in `link.ld`'s `ENTRY(_start)`. The bootloader hands
/// control here in 32-bit protected mode with `ebx` holding the physical
/// address of the Multiboot information structure; `eax` holds the
/// Multiboot magic value (unchecked here — a non-Multiboot loader has
/// nothing for us to fall back to anyway).
#[no_mangle]
#[naked]
pub extern "C" fn _start() -> ! {
    unsafe {
        naked_asm!(
            "mov esp, {stack_top}",
            "push ebx",
            "call {main}",
            "2:",
            "hlt",
            "jmp 2b",
            stack_top = sym boot_stack_top,
            main = sym crate::kernel_main,
        );
    }
}
