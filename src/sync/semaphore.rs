//! Counting semaphore (spec §4.3): signed count, strict-FIFO wait queue.
//!
//! Grounded in the teacher's `sync::semaphore::Semaphore` for the public
//! shape (`new`, a wait/signal pair, `try_wait`), but `down` here blocks
//! through the scheduler instead of spinning — the teacher's own marked
//! `// TODO Phase 2: block on scheduler`. The decrement policy follows
//! `original_source/src/kernel/synch.c`'s `semaphore_down`/
//! `semaphore_try_down`/`semaphore_up`, which spec §9 fixes explicitly:
//! `down` decrements unconditionally and blocks iff the result went
//! negative; `try_down` decrements only if already positive.

use alloc::collections::VecDeque;
use core::cell::UnsafeCell;
use crate::arch::hal;
use crate::sched::{self, thread::BlockerKind};

struct Inner {
    count: i32,
    waiters: VecDeque<u32>,
}

/// A counting semaphore. `count` may go arbitrarily negative; its magnitude
/// then equals the number of currently blocked waiters (spec §8's universal
/// invariant).
pub struct Semaphore {
    inner: UnsafeCell<Inner>,
}

unsafe impl Sync for Semaphore {}

impl Semaphore {
    pub const fn new(initial: i32) -> Self {
        Semaphore {
            inner: UnsafeCell::new(Inner { count: initial, waiters: VecDeque::new() }),
        }
    }

    /// Decrement-always-then-block-if-negative. After resuming from a
    /// block, the resource is already considered acquired — the matching
    /// `up` accounted for it before unblocking this thread.
    pub fn down(&self) {
        let should_block = {
            let was_enabled = hal::save_and_disable_interrupts();
            let inner = unsafe { &mut *self.inner.get() };
            inner.count -= 1;
            let block = inner.count < 0;
            if block {
                let handle = self as *const Self as usize;
                let cur = sched::mark_current_blocked(BlockerKind::Semaphore, handle);
                inner.waiters.push_back(cur);
            }
            hal::restore_interrupts(was_enabled);
            block
        };
        if should_block {
            sched::yield_now();
        }
    }

    /// Decrement only if positive; never blocks. The sign convention
    /// differs deliberately from `down` — `try_down` preserves
    /// non-negativity (spec §4.3).
    pub fn try_down(&self) -> bool {
        let was_enabled = hal::save_and_disable_interrupts();
        let inner = unsafe { &mut *self.inner.get() };
        let acquired = if inner.count > 0 {
            inner.count -= 1;
            true
        } else {
            false
        };
        hal::restore_interrupts(was_enabled);
        acquired
    }

    /// Increment, then wake the longest-waiting blocked thread, if any.
    pub fn up(&self) {
        let was_enabled = hal::save_and_disable_interrupts();
        let inner = unsafe { &mut *self.inner.get() };
        inner.count += 1;
        let woken = inner.waiters.pop_front();
        if let Some(tid) = woken {
            sched::unblock(tid);
        }
        hal::restore_interrupts(was_enabled);
    }

    /// Current signed count. Debug/test use only.
    pub fn count(&self) -> i32 {
        let was_enabled = hal::save_and_disable_interrupts();
        let count = unsafe { (&*self.inner.get()).count };
        hal::restore_interrupts(was_enabled);
        count
    }

    /// Number of threads currently blocked on this semaphore. Debug/test
    /// use only.
    pub fn waiting(&self) -> usize {
        let was_enabled = hal::save_and_disable_interrupts();
        let n = unsafe { (&*self.inner.get()).waiters.len() };
        hal::restore_interrupts(was_enabled);
        n
    }
}
