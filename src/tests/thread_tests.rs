/*
 * Scheduler Tests
 *
 * Exercises dispatch order, preemption, sleep/wakeup, and the thread
 * lifecycle. The test runner executes at DEFAULT_PRIORITY (10); helper
 * threads are placed above or below it depending on whether a test needs
 * them to run immediately on spawn or only once the runner blocks.
 */

use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::check;
use crate::error::KernelError;
use crate::scheduler;

const STACK: usize = 8 * 1024;
const LOOPS: usize = 1000;

pub fn run() {
    priority_preemption();
    fifo_same_priority();
    sleep_wakeup();
    join_lifecycle();
    spawn_validation();
    preempt_balance();
}

// ============================================================================
// PRIORITY DISPATCH
// ============================================================================

static COUNTER: AtomicUsize = AtomicUsize::new(0);
static HIGH_DONE: AtomicBool = AtomicBool::new(false);
static LOW_SAW_HIGH_DONE: AtomicBool = AtomicBool::new(false);

fn high_main(_arg: usize) {
    for _ in 0..LOOPS {
        COUNTER.fetch_add(1, Ordering::SeqCst);
    }
    HIGH_DONE.store(true, Ordering::SeqCst);
}

fn low_main(_arg: usize) {
    // If strict priority dispatch holds, the higher thread has fully
    // finished before we execute a single instruction.
    LOW_SAW_HIGH_DONE.store(HIGH_DONE.load(Ordering::SeqCst), Ordering::SeqCst);
    for _ in 0..LOOPS {
        COUNTER.fetch_add(1, Ordering::SeqCst);
    }
}

/// Two threads below the runner at priorities 8 and 6: the higher one
/// must run to completion before the lower one starts.
fn priority_preemption() {
    COUNTER.store(0, Ordering::SeqCst);
    HIGH_DONE.store(false, Ordering::SeqCst);
    LOW_SAW_HIGH_DONE.store(false, Ordering::SeqCst);

    let high = scheduler::spawn(high_main, 0, "prio-high", STACK, 8).unwrap();
    let low = scheduler::spawn(low_main, 0, "prio-low", STACK, 6).unwrap();

    scheduler::join_thread(high);
    scheduler::join_thread(low);

    check(
        COUNTER.load(Ordering::SeqCst) == 2 * LOOPS,
        "both threads completed their loops",
    );
    check(
        LOW_SAW_HIGH_DONE.load(Ordering::SeqCst),
        "higher priority finished before lower priority started",
    );
}

// ============================================================================
// FIFO WITHIN A PRIORITY LEVEL
// ============================================================================

static FIFO_ORDER: spin::Mutex<heapless::Vec<usize, 8>> = spin::Mutex::new(heapless::Vec::new());

fn fifo_main(tag: usize) {
    let _ = FIFO_ORDER.lock().push(tag);
}

/// Three equal-priority threads created in order run in that order.
fn fifo_same_priority() {
    FIFO_ORDER.lock().clear();

    let a = scheduler::spawn(fifo_main, 1, "fifo-a", STACK, 6).unwrap();
    let b = scheduler::spawn(fifo_main, 2, "fifo-b", STACK, 6).unwrap();
    let c = scheduler::spawn(fifo_main, 3, "fifo-c", STACK, 6).unwrap();

    scheduler::join_thread(a);
    scheduler::join_thread(b);
    scheduler::join_thread(c);

    let order = FIFO_ORDER.lock();
    check(
        order.as_slice() == [1, 2, 3].as_slice(),
        "equal-priority threads dispatched in creation order",
    );
}

// ============================================================================
// SLEEP / WAKEUP
// ============================================================================

static FLAG: AtomicBool = AtomicBool::new(false);
static WOKE: AtomicBool = AtomicBool::new(false);

fn sleeper_main(_arg: usize) {
    // The canonical pattern: test the predicate and sleep under one
    // preemption disable, so the waker cannot slip in between.
    scheduler::preempt_disable();
    while !FLAG.load(Ordering::SeqCst) {
        scheduler::sleep_current();
    }
    scheduler::preempt_enable();
    WOKE.store(true, Ordering::SeqCst);
}

/// A sleeper above the runner's priority blocks until the runner's
/// wakeup, then preempts the runner immediately.
fn sleep_wakeup() {
    FLAG.store(false, Ordering::SeqCst);
    WOKE.store(false, Ordering::SeqCst);

    // Priority 12 > runner: runs at spawn, finds the flag unset, sleeps.
    let sleeper = scheduler::spawn(sleeper_main, 0, "sleeper", STACK, 12).unwrap();
    check(
        !WOKE.load(Ordering::SeqCst),
        "sleeper blocked on unset predicate",
    );

    scheduler::preempt_disable();
    FLAG.store(true, Ordering::SeqCst);
    scheduler::wake_thread(sleeper);
    scheduler::preempt_enable();
    // The sleeper outranks us, so by the time the enable above returns
    // it has already run to completion.
    check(
        WOKE.load(Ordering::SeqCst),
        "wakeup of a higher-priority sleeper preempts immediately",
    );

    scheduler::join_thread(sleeper);

    // Waking the current thread is a no-op rather than an error.
    scheduler::wake_thread(scheduler::current_thread_id());
    check(true, "wakeup of the current thread is a no-op");
}

// ============================================================================
// LIFECYCLE
// ============================================================================

static QUICK_RAN: AtomicBool = AtomicBool::new(false);

fn quick_main(_arg: usize) {
    QUICK_RAN.store(true, Ordering::SeqCst);
}

/// Joining a thread that already died reaps it; the slot is empty
/// afterwards.
fn join_lifecycle() {
    QUICK_RAN.store(false, Ordering::SeqCst);

    // Priority 12: runs to completion during spawn; we join a corpse.
    let quick = scheduler::spawn(quick_main, 0, "quick", STACK, 12).unwrap();
    check(QUICK_RAN.load(Ordering::SeqCst), "thread ran before join");

    scheduler::join_thread(quick);
    check(
        scheduler::thread_state(quick).is_none(),
        "joined thread's slot was reclaimed",
    );

    // Join-before-death: a lower-priority thread only runs once we block.
    QUICK_RAN.store(false, Ordering::SeqCst);
    let slow = scheduler::spawn(quick_main, 0, "slow", STACK, 6).unwrap();
    check(
        !QUICK_RAN.load(Ordering::SeqCst),
        "lower-priority thread deferred until join",
    );
    scheduler::join_thread(slow);
    check(QUICK_RAN.load(Ordering::SeqCst), "join waited for exit");
}

// ============================================================================
// CREATION ERRORS AND PREEMPTION NESTING
// ============================================================================

fn spawn_validation() {
    check(
        scheduler::spawn(quick_main, 0, "bad", STACK, 0) == Err(KernelError::InvalidArgument),
        "spawn at idle priority rejected",
    );
    check(
        scheduler::spawn(quick_main, 0, "bad", STACK, 200) == Err(KernelError::InvalidArgument),
        "spawn beyond the priority range rejected",
    );
}

fn preempt_balance() {
    let level = scheduler::preempt_level();
    scheduler::preempt_disable();
    scheduler::preempt_disable();
    check(
        scheduler::preempt_level() == level + 2,
        "preemption disables nest",
    );
    scheduler::preempt_enable();
    scheduler::preempt_enable();
    check(
        scheduler::preempt_level() == level,
        "preemption enables rebalance",
    );

    // Yield with nothing else runnable at our level returns promptly.
    scheduler::yield_now();
    check(true, "yield with an empty level returns");
}
