//! Architecture support. The only target is 32-bit x86 protected mode
//! (spec §1), so this module is a thin wrapper around `x86` plus the `hal`
//! facade platform-agnostic code is expected to use instead.

pub mod hal;
pub mod x86;
