/*
 * Heap Allocator Tests
 *
 * Alignment, disjointness, degenerate requests, and boundary-tag
 * coalescing. The kernel heap is live while these run (thread stacks and
 * the test machinery sit on it), so the coalescing check is expressed as
 * a conservation property - free everything we took, in scrambled order,
 * and both the free byte count and the largest free block must come back
 * exactly - rather than as "one block spans the whole heap".
 */

use core::ptr::NonNull;

use super::check;
use crate::config::{HEAP_ALIGN, HEAP_SIZE};
use crate::memory::heap;

pub fn run() {
    alignment();
    disjointness();
    degenerate_requests();
    coalescing();
}

/// Every successful allocation is payload-aligned.
fn alignment() {
    let sizes = [1usize, 7, 16, 33, 100, 4096];
    let mut all_aligned = true;
    let mut ptrs: heapless::Vec<NonNull<u8>, 8> = heapless::Vec::new();

    for &size in &sizes {
        match heap::allocate(size) {
            Some(ptr) => {
                if ptr.as_ptr() as usize % HEAP_ALIGN != 0 {
                    all_aligned = false;
                }
                let _ = ptrs.push(ptr);
            }
            None => all_aligned = false,
        }
    }
    for ptr in ptrs {
        heap::deallocate(ptr.as_ptr());
    }
    check(all_aligned, "payload pointers aligned for odd sizes");
}

/// Live allocations never overlap.
fn disjointness() {
    const SIZE: usize = 64;
    let a = heap::allocate(SIZE).expect("allocation failed");
    let b = heap::allocate(SIZE).expect("allocation failed");
    let c = heap::allocate(SIZE).expect("allocation failed");

    let ranges = [
        (a.as_ptr() as usize, a.as_ptr() as usize + SIZE),
        (b.as_ptr() as usize, b.as_ptr() as usize + SIZE),
        (c.as_ptr() as usize, c.as_ptr() as usize + SIZE),
    ];
    let mut disjoint = true;
    for i in 0..ranges.len() {
        for j in (i + 1)..ranges.len() {
            let (lo1, hi1) = ranges[i];
            let (lo2, hi2) = ranges[j];
            if lo1 < hi2 && lo2 < hi1 {
                disjoint = false;
            }
        }
    }

    heap::deallocate(a.as_ptr());
    heap::deallocate(b.as_ptr());
    heap::deallocate(c.as_ptr());
    check(disjoint, "concurrent allocations are disjoint");
}

/// Zero-size requests yield nothing; impossible requests fail cleanly.
fn degenerate_requests() {
    check(heap::allocate(0).is_none(), "zero-size allocation returns none");
    check(
        heap::allocate(HEAP_SIZE * 2).is_none(),
        "oversized allocation fails cleanly",
    );
    // Freeing null is a no-op, not a fault.
    heap::deallocate(core::ptr::null_mut());
    check(true, "freeing null is a no-op");
}

/// Three adjacent blocks freed in the order first, third, second merge
/// back into the block they were carved from.
fn coalescing() {
    let free_before = heap::free_bytes();
    let largest_before = heap::largest_free_block();

    let p1 = heap::allocate(16).expect("allocation failed");
    let p2 = heap::allocate(16).expect("allocation failed");
    let p3 = heap::allocate(16).expect("allocation failed");

    heap::deallocate(p1.as_ptr());
    heap::deallocate(p3.as_ptr());
    heap::deallocate(p2.as_ptr());

    check(
        heap::free_bytes() == free_before,
        "free byte count conserved across alloc/free cycle",
    );
    check(
        heap::largest_free_block() == largest_before,
        "mixed-order frees coalesced back into one block",
    );
}
