//! Blocking synchronization primitives (spec §4.3): counting semaphore,
//! recursive mutex, condition variable.
//!
//! Grounded in the teacher kernel's three-module `sync` split
//! (`sync::{semaphore, mutex}` plus a spinlock for the internal critical
//! section), but this crate finishes what the teacher leaves as an explicit
//! `// TODO Phase 2: block on scheduler` stub: every primitive here actually
//! suspends the calling thread through `sched::mark_current_blocked` /
//! `sched::unblock` instead of spin-waiting. A `condvar` module is added —
//! absent from the teacher entirely — grounded directly in
//! `original_source/src/kernel/synch.c`'s `condition_wait`/
//! `condition_signal`/`condition_broadcast`.
//!
//! The guard discipline is "disable interrupts, restore on exit", per spec
//! §5's single-CPU model ("strictly stronger than any lock-free discipline
//! here"), the same convention `mem::heap` and `sched` already use — not the
//! teacher's `Spinlock<T>` wrapper, which would be redundant exclusion on a
//! single core and isn't grounded in spec §5's stated model.

pub mod condvar;
pub mod mutex;
pub mod semaphore;

pub use condvar::CondVar;
pub use mutex::Mutex;
pub use semaphore::Semaphore;
