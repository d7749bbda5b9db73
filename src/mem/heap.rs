//! The kernel heap allocator (spec §4.1).
//!
//! Style is grounded in the teacher kernel's `memory::heap::LockedHeap`: a
//! first-fit search over an address-sorted, eagerly-coalesced free list,
//! guarded by an IRQ-safe critical section rather than a blocking lock (per
//! the design notes' "do not scatter atomics — the model is single-CPU with
//! interrupt-based exclusion"). The block layout, split policy, extend
//! policy, and stats counters follow the specification directly; the
//! bootstrap sequence (locate the available region containing the
//! kernel-image end) follows `original_source/src/kernel/kmalloc.c`'s
//! `kmalloc_init`.

use core::alloc::{GlobalAlloc, Layout};
use core::ptr;
use crate::arch::hal;
use crate::arch::x86::multiboot::{self, MemoryRegion};

const HEADER_SIZE: u32 = 16;
const ALIGN: u32 = 16;
const MIN_BLOCK_SIZE: u32 = 32;
const PAGE_SIZE: u32 = 4096;
const INITIAL_EXTEND: u32 = 16 * 1024;
const MAGIC: u32 = 0xA11E_B10C;

const FLAG_ALLOC: u32 = 1;

#[repr(C)]
struct BlockHeader {
    /// Size of this block including the header, in the upper bits; the
    /// allocation flag in bit 0. Block sizes are always multiples of 16, so
    /// the two never overlap.
    size_and_flag: u32,
    /// Address of the next free block in ascending address order, or 0.
    /// Meaningless once the block is allocated.
    next: u32,
    magic: u32,
    _reserved: u32,
}

impl BlockHeader {
    fn size(&self) -> u32 {
        self.size_and_flag & !0xF
    }

    fn is_alloc(&self) -> bool {
        self.size_and_flag & FLAG_ALLOC != 0
    }

    fn set(&mut self, size: u32, alloc: bool) {
        self.size_and_flag = (size & !0xF) | (alloc as u32);
    }
}

/// Allocation/free counters, monotone for the lifetime of the kernel.
#[derive(Copy, Clone, Debug, Default)]
pub struct HeapStats {
    pub allocation_count: u64,
    pub allocation_bytes: u64,
    pub free_count: u64,
    pub free_bytes: u64,
}

struct HeapState {
    heap_start: u32,
    heap_end: u32,
    heap_limit: u32,
    free_head: u32,
    stats: HeapStats,
    debug: bool,
}

static mut STATE: HeapState = HeapState {
    heap_start: 0,
    heap_end: 0,
    heap_limit: 0,
    free_head: 0,
    stats: HeapStats {
        allocation_count: 0,
        allocation_bytes: 0,
        free_count: 0,
        free_bytes: 0,
    },
    debug: false,
};

#[inline]
fn round_up(value: u32, to: u32) -> u32 {
    (value + to - 1) & !(to - 1)
}

#[inline]
unsafe fn header_at(addr: u32) -> *mut BlockHeader {
    addr as *mut BlockHeader
}

/// Initialize the heap from the firmware memory map. `kernel_end` is the
/// linker-provided address immediately past the kernel image; the heap's low
/// bound is the next page boundary above it, and its upper bound is the top
/// of the available region that contains it. Must be called exactly once,
/// early in boot, with interrupts already disabled.
///
/// # Safety
/// Must run before any call to `alloc`/`free`/etc., and the memory described
/// by `regions` must genuinely be unused by anything else.
pub unsafe fn init(kernel_end: u32, regions: &[MemoryRegion]) {
    unsafe {
        let start = round_up(kernel_end, PAGE_SIZE);
        let region = multiboot::find_available_region(regions, start as u64)
            .unwrap_or_else(|| panic!("heap init: no available memory region contains kernel end"));

        STATE.heap_start = start;
        STATE.heap_end = start;
        STATE.heap_limit = (region.base + region.length) as u32;
        STATE.free_head = 0;
        STATE.stats = HeapStats::default();

        extend_heap_unsync(INITIAL_EXTEND);
    }
}

/// Extend the heap by at least `min_bytes`, rounded up to a page, inserting
/// the new space as a free block. Panics (fatally, per spec's failure
/// semantics for resource exhaustion) if doing so would cross `heap_limit`.
unsafe fn extend_heap_unsync(min_bytes: u32) {
    unsafe {
        let grow = round_up(min_bytes, PAGE_SIZE);
        let new_end = STATE
            .heap_end
            .checked_add(grow)
            .unwrap_or_else(|| panic!("heap extend: address overflow"));
        if new_end > STATE.heap_limit {
            panic!("heap extend: would exceed upper bound ({} > {})", new_end, STATE.heap_limit);
        }

        let block_addr = STATE.heap_end;
        let header = &mut *header_at(block_addr);
        header.set(grow, false);
        header.magic = MAGIC;
        header.next = 0;

        STATE.heap_end = new_end;
        insert_free(block_addr);
    }
}

/// Insert a free block into the address-ordered free list, coalescing with
/// the physically adjacent predecessor and/or successor if either is free.
unsafe fn insert_free(addr: u32) {
    unsafe {
        let mut prev: u32 = 0;
        let mut cursor = STATE.free_head;
        while cursor != 0 && cursor < addr {
            prev = cursor;
            cursor = (&*header_at(cursor)).next;
        }

        // Link in at [prev, cursor).
        if prev == 0 {
            (&mut *header_at(addr)).next = STATE.free_head;
            STATE.free_head = addr;
        } else {
            (&mut *header_at(addr)).next = cursor;
            (&mut *header_at(prev)).next = addr;
        }

        // Coalesce forward: if this block's end equals the next free block's
        // start, merge them.
        let mut block_addr = addr;
        loop {
            let header = &*header_at(block_addr);
            let next_addr = header.next;
            if next_addr != 0 && block_addr + header.size() == next_addr {
                let absorbed_size = (&*header_at(next_addr)).size();
                let new_next = (&*header_at(next_addr)).next;
                let header = &mut *header_at(block_addr);
                header.set(header.size() + absorbed_size, false);
                header.next = new_next;
                continue;
            }
            break;
        }

        // Coalesce backward: if the predecessor's end equals this block's
        // start, fold this block into it and continue from the predecessor.
        if prev != 0 {
            let prev_header = &*header_at(prev);
            if prev + prev_header.size() == block_addr {
                let absorbed_size = (&*header_at(block_addr)).size();
                let new_next = (&*header_at(block_addr)).next;
                let prev_header = &mut *header_at(prev);
                prev_header.set(prev_header.size() + absorbed_size, false);
                prev_header.next = new_next;
            }
        }
    }
}

/// Remove a specific free block from the list, given the address of its
/// predecessor (0 if it is the head).
unsafe fn unlink_free(prev: u32, addr: u32) {
    unsafe {
        let next = (&*header_at(addr)).next;
        if prev == 0 {
            STATE.free_head = next;
        } else {
            (&mut *header_at(prev)).next = next;
        }
    }
}

/// First-fit search: the first free block whose size is >= `needed`.
/// Returns `(predecessor_addr_or_0, block_addr)`.
unsafe fn find_fit(needed: u32) -> Option<(u32, u32)> {
    unsafe {
        let mut prev = 0u32;
        let mut cursor = STATE.free_head;
        while cursor != 0 {
            let header = &*header_at(cursor);
            if header.size() >= needed {
                return Some((prev, cursor));
            }
            prev = cursor;
            cursor = header.next;
        }
        None
    }
}

/// Split `addr` (a block of size `block_size`) into a leading block of
/// `needed` bytes and, if the remainder is large enough, a trailing free
/// block reinserted into the free list.
unsafe fn split_and_take(addr: u32, block_size: u32, needed: u32) {
    unsafe {
        let remainder = block_size - needed;
        if remainder >= MIN_BLOCK_SIZE {
            let header = &mut *header_at(addr);
            header.set(needed, true);
            header.magic = MAGIC;

            let tail_addr = addr + needed;
            let tail = &mut *header_at(tail_addr);
            tail.set(remainder, false);
            tail.magic = MAGIC;
            tail.next = 0;
            insert_free(tail_addr);
        } else {
            let header = &mut *header_at(addr);
            header.set(block_size, true);
            header.magic = MAGIC;
        }
    }
}

fn block_size_for(n: usize) -> u32 {
    let n = u32::try_from(n).unwrap_or_else(|_| panic!("allocation request too large"));
    let total = n
        .checked_add(HEADER_SIZE)
        .unwrap_or_else(|| panic!("allocation size overflow"));
    let rounded = round_up(total, ALIGN);
    rounded.max(MIN_BLOCK_SIZE)
}

/// Core allocation routine shared by `alloc`/`alloc_unsync`. Assumes the
/// caller already holds whatever exclusion is appropriate.
unsafe fn do_alloc(n: usize) -> *mut u8 {
    unsafe {
        let needed = block_size_for(n);
        loop {
            if let Some((prev, addr)) = find_fit(needed) {
                let size = (&*header_at(addr)).size();
                unlink_free(prev, addr);
                split_and_take(addr, size, needed);
                STATE.stats.allocation_count += 1;
                STATE.stats.allocation_bytes += needed as u64;
                crate::debug_println!("heap: alloc {} bytes at {:#x}", needed, addr);
                return (addr + HEADER_SIZE) as *mut u8;
            }
            extend_heap_unsync(needed);
        }
    }
}

unsafe fn do_free(ptr: *mut u8) {
    unsafe {
        if ptr.is_null() {
            return;
        }
        let addr = (ptr as u32) - HEADER_SIZE;
        let header = &*header_at(addr);
        if header.magic != MAGIC {
            panic!("heap corruption: bad magic at {:#x}", addr);
        }
        if !header.is_alloc() {
            panic!("heap corruption: double free at {:#x}", addr);
        }
        let size = header.size();
        let header = &mut *header_at(addr);
        header.set(size, false);
        STATE.stats.free_count += 1;
        STATE.stats.free_bytes += size as u64;
        crate::debug_println!("heap: free {:#x} ({} bytes)", addr, size);
        insert_free(addr);
    }
}

unsafe fn do_realloc(ptr: *mut u8, n: usize) -> *mut u8 {
    unsafe {
        if ptr.is_null() {
            return do_alloc(n);
        }
        if n == 0 {
            do_free(ptr);
            return ptr::null_mut();
        }

        let addr = (ptr as u32) - HEADER_SIZE;
        let header = &*header_at(addr);
        if header.magic != MAGIC || !header.is_alloc() {
            panic!("heap corruption: realloc of invalid block at {:#x}", addr);
        }
        let old_size = header.size();
        let old_payload = old_size - HEADER_SIZE;
        let needed = block_size_for(n);

        if needed <= old_size {
            split_and_take(addr, old_size, needed);
            return ptr;
        }

        let next_addr = addr + old_size;
        if next_addr < STATE.heap_end {
            let next_header = &*header_at(next_addr);
            if !next_header.is_alloc() && old_size + next_header.size() >= needed {
                // Find the free block's predecessor so we can unlink it.
                let mut prev = 0u32;
                let mut cursor = STATE.free_head;
                while cursor != 0 && cursor != next_addr {
                    prev = cursor;
                    cursor = (&*header_at(cursor)).next;
                }
                unlink_free(prev, next_addr);
                let combined = old_size + next_header.size();
                let header = &mut *header_at(addr);
                header.set(combined, true);
                header.magic = MAGIC;
                split_and_take(addr, combined, needed);
                return ptr;
            }
        }

        let new_ptr = do_alloc(n);
        if !new_ptr.is_null() {
            ptr::copy_nonoverlapping(ptr, new_ptr, old_payload.min(needed - HEADER_SIZE) as usize);
            do_free(ptr);
        }
        new_ptr
    }
}

/// Critical-section wrapper: disable interrupts for the duration of `f`,
/// restoring the previous state afterward. The allocator's own re-entrancy
/// guard — not a blocking mutex, since the allocator must remain usable
/// before the scheduler (and therefore any blocking primitive) exists.
fn with_heap_locked<R>(f: impl FnOnce() -> R) -> R {
    let was_enabled = hal::save_and_disable_interrupts();
    let result = f();
    hal::restore_interrupts(was_enabled);
    result
}

/// Allocate at least `n` bytes, 16-byte aligned. `n = 0` is legal. Fatal on
/// exhaustion of the heap's hard upper bound.
pub fn alloc(n: usize) -> *mut u8 {
    with_heap_locked(|| unsafe { do_alloc(n) })
}

/// Allocate and zero `c * s` bytes, saturating to allocation failure on
/// overflow of the size computation.
pub fn calloc(c: usize, s: usize) -> *mut u8 {
    let total = c.checked_mul(s).unwrap_or_else(|| panic!("calloc size overflow"));
    let p = alloc(total);
    if !p.is_null() {
        unsafe { ptr::write_bytes(p, 0, total) };
    }
    p
}

/// Resize a previous allocation, preserving `min(old_payload, n)` bytes.
pub fn realloc(p: *mut u8, n: usize) -> *mut u8 {
    with_heap_locked(|| unsafe { do_realloc(p, n) })
}

/// Release a previous allocation. Null is a no-op.
pub fn free(p: *mut u8) {
    with_heap_locked(|| unsafe { do_free(p) });
}

/// Unsynchronized variant of [`alloc`] for callers that already run with
/// interrupts disabled (e.g. scheduler bootstrap) and cannot afford the
/// save/restore overhead or re-entrant disable.
///
/// # Safety
/// The caller must already hold exclusive access to the heap (interrupts
/// disabled, no concurrent heap use).
pub unsafe fn alloc_unsync(n: usize) -> *mut u8 {
    unsafe { do_alloc(n) }
}

/// Unsynchronized variant of [`calloc`]. See [`alloc_unsync`] for the safety
/// contract.
pub unsafe fn calloc_unsync(c: usize, s: usize) -> *mut u8 {
    unsafe {
        let total = c.checked_mul(s).unwrap_or_else(|| panic!("calloc size overflow"));
        let p = do_alloc(total);
        if !p.is_null() {
            ptr::write_bytes(p, 0, total);
        }
        p
    }
}

/// Unsynchronized variant of [`realloc`]. See [`alloc_unsync`] for the
/// safety contract.
pub unsafe fn realloc_unsync(p: *mut u8, n: usize) -> *mut u8 {
    unsafe { do_realloc(p, n) }
}

/// Unsynchronized variant of [`free`]. See [`alloc_unsync`] for the safety
/// contract.
pub unsafe fn free_unsync(p: *mut u8) {
    unsafe { do_free(p) }
}

/// Snapshot the four monotone stats counters.
pub fn heap_stats() -> HeapStats {
    with_heap_locked(|| unsafe { STATE.stats })
}

/// Enable or disable verbose free-list tracing in [`print_debug`].
pub fn set_debug(enabled: bool) {
    with_heap_locked(|| unsafe { STATE.debug = enabled });
}

/// Print a one-line summary of heap state to serial, and the free list if
/// debug tracing is enabled.
pub fn print_debug() {
    with_heap_locked(|| unsafe {
        crate::serial_println!(
            "heap: start={:#x} end={:#x} limit={:#x} allocs={} frees={} alloc_bytes={} free_bytes={}",
            STATE.heap_start,
            STATE.heap_end,
            STATE.heap_limit,
            STATE.stats.allocation_count,
            STATE.stats.free_count,
            STATE.stats.allocation_bytes,
            STATE.stats.free_bytes,
        );
        if STATE.debug {
            let mut cursor = STATE.free_head;
            while cursor != 0 {
                let header = &*header_at(cursor);
                crate::serial_println!("  free block at {:#x} size {}", cursor, header.size());
                cursor = header.next;
            }
        }
    })
}

/// Walk the free list checking magic words and strict address ordering.
/// Used by the in-kernel self-tests, not on any hot path.
pub fn validate_heap() -> bool {
    with_heap_locked(|| unsafe {
        let mut cursor = STATE.free_head;
        let mut last = 0u32;
        while cursor != 0 {
            let header = &*header_at(cursor);
            if header.magic != MAGIC || header.is_alloc() {
                return false;
            }
            if last != 0 && cursor <= last {
                return false;
            }
            last = cursor;
            cursor = header.next;
        }
        true
    })
}

/// `#[global_allocator]` adapter so ordinary `alloc::boxed::Box`,
/// `alloc::vec::Vec`, etc. route through this heap.
pub struct KernelHeap;

unsafe impl GlobalAlloc for KernelHeap {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        // The allocator's own alignment (16 bytes) covers every layout this
        // kernel ever asks for; anything stricter is a bug in the caller.
        debug_assert!(layout.align() <= ALIGN as usize);
        alloc(layout.size())
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
        free(ptr);
    }

    unsafe fn realloc(&self, ptr: *mut u8, _layout: Layout, new_size: usize) -> *mut u8 {
        realloc(ptr, new_size)
    }
}

#[global_allocator]
static GLOBAL_HEAP: KernelHeap = KernelHeap;

/// Entries referenced by `mem::heap::init`, re-exported so callers only
/// need to import this module.
pub use crate::arch::x86::multiboot::MemoryRegion as HeapMemoryRegion;
