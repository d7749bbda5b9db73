//! The preemptive thread scheduler (spec §4.2).
//!
//! Single-CPU, FIFO round-robin, integer-tid thread table. Grounded in the
//! teacher kernel's `task::scheduler` for the broad shape (a module-private
//! table of thread descriptors mutated under a single guard, `VecDeque<u32>`
//! run queues per `task::scheduler::run_queue::RunQueue`) but stripped down
//! to the spec's single priority level, no-SMP, no-user-mode model: the
//! teacher's 128-level bitmap run queue and per-CPU atomics have no
//! counterpart here, so the queues are plain `VecDeque<u32>` and the whole
//! table is guarded the same way `mem::heap` guards its state — disabling
//! interrupts, not a spinlock, per the design notes' "single-CPU with
//! interrupt-based exclusion" model.
//!
//! The tid-indexed `Vec<Option<Thread>>` arena is the safe-language
//! rendering of the original's intrusive `all_list`/`local_list` pointers
//! (spec §9's "indices into an arena of thread descriptors" alternative).

pub mod idle;
pub mod thread;

use alloc::boxed::Box;
use alloc::collections::VecDeque;
use alloc::vec::Vec;
use crate::arch::hal;
use crate::arch::x86::context;
use crate::arch::x86::pit;
use thread::{BlockerKind, Thread, ThreadStatus, STACK_SIZE};

pub use thread::ThreadStatus as Status;

struct SchedState {
    threads: Vec<Option<Thread>>,
    next_tid: u32,
    current: u32,
    ready: VecDeque<u32>,
    sleeping: VecDeque<u32>,
    zombie: VecDeque<u32>,
    initialized: bool,
}

static mut STATE: SchedState = SchedState {
    threads: Vec::new(),
    next_tid: 0,
    current: 0,
    ready: VecDeque::new(),
    sleeping: VecDeque::new(),
    zombie: VecDeque::new(),
    initialized: false,
};

const BOOTSTRAP_TID: u32 = 0;
const IDLE_TID: u32 = 1;

fn with_sched_locked<R>(f: impl FnOnce(&mut SchedState) -> R) -> R {
    let was_enabled = hal::save_and_disable_interrupts();
    let result = unsafe { f(&mut STATE) };
    hal::restore_interrupts(was_enabled);
    result
}

impl SchedState {
    fn thread_mut(&mut self, tid: u32) -> &mut Thread {
        self.threads[tid as usize]
            .as_mut()
            .unwrap_or_else(|| panic!("scheduler: tid {} has no descriptor", tid))
    }

    fn thread(&self, tid: u32) -> &Thread {
        self.threads[tid as usize]
            .as_ref()
            .unwrap_or_else(|| panic!("scheduler: tid {} has no descriptor", tid))
    }

    fn alloc_tid(&mut self) -> u32 {
        let tid = self.next_tid;
        self.next_tid = self
            .next_tid
            .checked_add(1)
            .unwrap_or_else(|| panic!("scheduler: tid overflow"));
        if tid as usize >= self.threads.len() {
            self.threads.resize_with(tid as usize + 1, || None);
        }
        tid
    }
}

/// Called exactly once by the bootstrap flow of execution, before
/// interrupts are enabled. Installs a descriptor for the calling flow (tid
/// 0, Running) and the idle thread (tid 1, Ready), then sets `current`.
pub fn main_init() {
    with_sched_locked(|s| {
        let boot_tid = s.alloc_tid();
        debug_assert_eq!(boot_tid, BOOTSTRAP_TID);
        let mut boot = Thread::new(boot_tid);
        boot.status = ThreadStatus::Running;
        s.threads[boot_tid as usize] = Some(boot);

        let idle_tid = s.alloc_tid();
        debug_assert_eq!(idle_tid, IDLE_TID);
        let mut idle_thread = Thread::new(idle_tid);
        let stack_top = idle_thread.stack_top();
        idle_thread.esp = unsafe { context::seed_stack(stack_top, idle::idle_entry, 0) };
        idle_thread.status = ThreadStatus::Ready;
        s.threads[idle_tid as usize] = Some(idle_thread);

        s.current = boot_tid;
        s.initialized = true;
    });
}

/// Allocate a thread and its stack, seed it so the first context switch
/// into it lands at `entry(arg)`, and add it to the ready queue. Fatal on
/// tid overflow or allocation failure (the allocator itself is fatal on
/// exhaustion, so nothing further to check here).
pub fn create(entry: extern "C" fn(usize), arg: usize) -> u32 {
    with_sched_locked(|s| {
        let tid = s.alloc_tid();
        let mut t = Thread::new(tid);
        let stack_top = t.stack_top();
        t.esp = unsafe { context::seed_stack(stack_top, entry, arg) };
        t.status = ThreadStatus::Ready;
        s.threads[tid as usize] = Some(t);
        s.ready.push_front(tid);
        tid
    })
}

/// Voluntary reschedule: raises the same tick vector the timer uses.
pub fn yield_now() {
    context::raise_reschedule();
}

/// Put the current thread to sleep for `ticks` timer periods.
pub fn sleep(ticks: u32) {
    with_sched_locked(|s| {
        let now = pit::now_ticks();
        let cur = s.current;
        let t = s.thread_mut(cur);
        t.wake_deadline = now.wrapping_add(ticks);
        t.status = ThreadStatus::Sleeping;
    });
    yield_now();
}

/// Unblock a thread previously blocked on a synchronization primitive.
/// Caller-synchronized: must already be running inside an
/// interrupt-disabled critical section (every sync primitive's entry
/// points are). Requires `t.status == Blocked`.
pub fn unblock(tid: u32) {
    unsafe {
        let t = STATE.thread_mut(tid);
        if t.status != ThreadStatus::Blocked {
            panic!("scheduler: unblock of non-Blocked tid {}", tid);
        }
        t.status = ThreadStatus::Ready;
        t.blocked_on_kind = BlockerKind::None;
        t.blocked_on_handle = 0;
        STATE.ready.push_front(tid);
    }
}

/// Mark the current thread Blocked on a primitive and enqueue it on that
/// primitive's wait queue (the caller owns the wait queue and does the
/// enqueueing); this only records the blocker tag on the thread itself.
/// Must be called with interrupts already disabled by the primitive's own
/// critical section.
pub fn mark_current_blocked(kind: BlockerKind, handle: usize) -> u32 {
    unsafe {
        let cur = STATE.current;
        let t = STATE.thread_mut(cur);
        // condvar_wait sets blocked_on before calling mutex_release, which
        // must not stomp on it; everyone else just overwrites freely since
        // a thread can only be blocked on one thing at a time.
        t.status = ThreadStatus::Blocked;
        t.blocked_on_kind = kind;
        t.blocked_on_handle = handle;
        cur
    }
}

/// Current thread's tid.
pub fn current_tid() -> u32 {
    unsafe { STATE.current }
}

/// The scheduler's exit shim: called when a thread's entry function
/// returns. Transitions it to Zombie and yields; never returns.
pub extern "C" fn exit_current() -> ! {
    with_sched_locked(|s| {
        let cur = s.current;
        s.thread_mut(cur).status = ThreadStatus::Zombie;
    });
    yield_now();
    unreachable!("exit_current: scheduler resumed a Zombie thread");
}

/// The tick handler (spec §4.2, ordering is material). Runs with
/// interrupts disabled (either by hardware, on a real timer interrupt, or
/// by the save-and-disable at the top of `yield_now`'s caller).
///
/// 1. Stash the outgoing thread's stack pointer (the caller already pushed
///    its register snapshot onto its own stack before calling this).
/// 2. Wake every sleeper whose deadline has elapsed, reinserting at ready's
///    head.
/// 3. Reclaim every zombie other than `current`.
/// 4. Choose next: ready's tail if non-empty, else keep Running current,
///    else idle.
/// 5. Enqueue the outgoing thread onto the list matching its status.
/// 6. Install `chosen` as `current`, mark it Running, and return its esp
///    for the caller to switch into.
pub fn on_timer_tick(outgoing_esp: u32) -> u32 {
    with_sched_locked(|s| {
        let outgoing = s.current;
        s.thread_mut(outgoing).esp = outgoing_esp;

        let now = pit::now_ticks();
        let mut still_sleeping = VecDeque::new();
        while let Some(tid) = s.sleeping.pop_front() {
            if s.thread(tid).wake_deadline <= now {
                s.thread_mut(tid).status = ThreadStatus::Ready;
                s.ready.push_front(tid);
            } else {
                still_sleeping.push_back(tid);
            }
        }
        s.sleeping = still_sleeping;

        let zombies: Vec<u32> = s.zombie.iter().copied().filter(|&t| t != outgoing).collect();
        for tid in zombies {
            s.zombie.retain(|&t| t != tid);
            s.threads[tid as usize] = None;
        }

        let chosen = if let Some(tid) = s.ready.pop_back() {
            tid
        } else if s.thread(outgoing).status == ThreadStatus::Running {
            outgoing
        } else {
            IDLE_TID
        };

        if chosen != outgoing {
            match s.thread(outgoing).status {
                ThreadStatus::Running => {
                    s.thread_mut(outgoing).status = ThreadStatus::Ready;
                    s.ready.push_front(outgoing);
                }
                ThreadStatus::Sleeping => s.sleeping.push_back(outgoing),
                ThreadStatus::Zombie => s.zombie.push_back(outgoing),
                ThreadStatus::Blocked => {}
                ThreadStatus::Ready => {}
            }
        }

        s.current = chosen;
        s.thread_mut(chosen).status = ThreadStatus::Running;
        s.thread(chosen).esp
    })
}

/// Number of threads currently Ready (excluding the idle thread, which
/// never sits on the ready queue itself but counts as Ready when not
/// running).
pub fn count_ready() -> usize {
    with_sched_locked(|s| s.ready.len())
}

pub fn count_sleeping() -> usize {
    with_sched_locked(|s| s.sleeping.len())
}

pub fn count_zombie() -> usize {
    with_sched_locked(|s| s.zombie.len())
}

pub fn count_all() -> usize {
    with_sched_locked(|s| s.threads.iter().filter(|t| t.is_some()).count())
}

/// Snapshot of a thread's scheduler-visible state, for introspection and
/// tests. Not a live handle — taken once under the lock and immediately
/// detached, per spec §9's note that inspecting a Zombie (or any thread)
/// from outside the scheduler would otherwise race.
#[derive(Debug, Clone, Copy)]
pub struct ThreadInfo {
    pub tid: u32,
    pub status: ThreadStatus,
    pub wake_deadline: u32,
    pub blocked_on_kind: BlockerKind,
    pub blocked_on_handle: usize,
}

/// Supplemented introspection (spec §11), grounded in the original's
/// `thread_get`: snapshot a thread's state by tid, or `None` if it has no
/// descriptor (never created, tid out of range, or already reclaimed).
pub fn get(tid: u32) -> Option<ThreadInfo> {
    with_sched_locked(|s| {
        s.threads.get(tid as usize).and_then(|slot| slot.as_ref()).map(|t| ThreadInfo {
            tid: t.tid,
            status: t.status,
            wake_deadline: t.wake_deadline,
            blocked_on_kind: t.blocked_on_kind,
            blocked_on_handle: t.blocked_on_handle,
        })
    })
}

/// Supplemented introspection (spec §11), grounded in the original's
/// `thread_debug_synch_dependencies`: print every Blocked thread and which
/// primitive it's waiting on, to serial. A boot-time/test diagnostic only,
/// never on a hot path.
pub fn debug_dependencies() {
    with_sched_locked(|s| {
        for slot in s.threads.iter() {
            if let Some(t) = slot {
                if t.status == ThreadStatus::Blocked {
                    crate::serial_println!(
                        "sched: tid {} blocked on {:?} @ {:#x}",
                        t.tid,
                        t.blocked_on_kind,
                        t.blocked_on_handle
                    );
                }
            }
        }
    });
}
