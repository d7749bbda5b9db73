//! FIFO-ordering and recursive-mutex round-trip properties. These run
//! threads too (FIFO order can only be observed by actually blocking more
//! than one thread on a primitive), but unlike `tests::sched` they are
//! about the primitive's own contract rather than a scheduling scenario.

use crate::sched;
use crate::sync::{Mutex, Semaphore};
use super::{TestReport, TestResult};

pub(super) fn run(report: &mut TestReport) {
    crate::run_test!(report, "sync::semaphore_wakes_waiters_fifo", semaphore_wakes_waiters_fifo);
    crate::run_test!(report, "sync::recursive_mutex_round_trip", recursive_mutex_round_trip);
    crate::run_test!(report, "sync::mutex_try_acquire_contended", mutex_try_acquire_contended);
}

/// Threads block on a semaphore in the order they call `down`; each `up`
/// wakes exactly the one that has been waiting longest.
fn semaphore_wakes_waiters_fifo() -> TestResult {
    const THREADS: u32 = 6;

    static GATE: Semaphore = Semaphore::new(0);
    static DONE: Semaphore = Semaphore::new(0);
    static ORDER_LOCK: Mutex = Mutex::new();
    static mut ORDER: [u32; THREADS as usize] = [0; THREADS as usize];
    static mut NEXT: usize = 0;

    extern "C" fn waiter(tid_marker: usize) {
        GATE.down();
        ORDER_LOCK.acquire();
        unsafe {
            ORDER[NEXT] = tid_marker as u32;
            NEXT += 1;
        }
        ORDER_LOCK.release();
        DONE.up();
    }

    unsafe { NEXT = 0 };
    for i in 0..THREADS {
        sched::create(waiter, i as usize);
        // give each thread a chance to run up to GATE.down() and block
        // before the next one is created, so enqueue order is deterministic.
        sched::yield_now();
    }

    for _ in 0..THREADS {
        GATE.up();
    }
    for _ in 0..THREADS {
        DONE.down();
    }

    let order = unsafe { ORDER };
    for i in 0..THREADS as usize {
        if order[i] != i as u32 {
            return Err("semaphore did not wake waiters in FIFO order");
        }
    }
    Ok(())
}

/// Acquiring the same recursive mutex `k` times from one thread and then
/// releasing it `k` times leaves it fully unheld.
fn recursive_mutex_round_trip() -> TestResult {
    static MUTEX: Mutex = Mutex::new();

    if MUTEX.held_by_current() {
        return Err("mutex reported held before any acquire");
    }

    const DEPTH: u32 = 5;
    for _ in 0..DEPTH {
        MUTEX.acquire();
    }
    if MUTEX.depth() != DEPTH {
        return Err("depth did not match the number of acquires");
    }
    if !MUTEX.held_by_current() {
        return Err("mutex did not report held by the acquiring thread");
    }

    for _ in 0..DEPTH - 1 {
        MUTEX.release();
        if !MUTEX.held_by_current() {
            return Err("mutex released early, before depth reached zero");
        }
    }
    MUTEX.release();

    if MUTEX.held_by_current() {
        return Err("mutex still reported held after depth reached zero");
    }
    if MUTEX.depth() != 0 {
        return Err("depth did not return to zero");
    }
    Ok(())
}

/// `try_acquire` succeeds for the owner (recursively) and fails for a
/// contending thread while the owner still holds it.
fn mutex_try_acquire_contended() -> TestResult {
    static MUTEX: Mutex = Mutex::new();
    static STARTED: Semaphore = Semaphore::new(0);
    static FINISH: Semaphore = Semaphore::new(0);
    static mut CONTENDER_SAW_HELD: bool = false;

    extern "C" fn contender(_arg: usize) {
        STARTED.up();
        let acquired = MUTEX.try_acquire();
        unsafe { CONTENDER_SAW_HELD = !acquired };
        if acquired {
            MUTEX.release();
        }
        FINISH.up();
    }

    MUTEX.acquire();
    if !MUTEX.try_acquire() {
        MUTEX.release();
        return Err("try_acquire failed for the current owner");
    }
    MUTEX.release(); // undo the recursive try_acquire above

    sched::create(contender, 0);
    STARTED.down();
    FINISH.down();

    MUTEX.release();

    if !unsafe { CONTENDER_SAW_HELD } {
        return Err("a non-owning thread's try_acquire succeeded while held");
    }
    Ok(())
}
