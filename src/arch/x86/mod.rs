pub mod boot;
pub mod context;
pub mod gdt;
pub mod idt;
pub mod interrupts;
pub mod multiboot;
pub mod pic;
pub mod pit;
pub mod port;

/// Bring up every architecture subsystem in the order the CPU requires:
/// segmentation before interrupts, the PIC remap before unmasking anything,
/// the PIT program before enabling IRQ0.
pub fn init() {
    gdt::init();
    idt::init();
    pic::init();
    pit::init();
    pic::unmask(0); // timer
}
