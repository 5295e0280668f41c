/*
 * Condition Variable Tests
 *
 * The classic predicate hand-shake, broadcast to a crowd, and one-token
 * hand-off through repeated signals.
 */

use core::sync::atomic::{AtomicUsize, Ordering};

use super::check;
use crate::scheduler;
use crate::sync::{Condvar, Mutex};

const STACK: usize = 8 * 1024;

pub fn run() {
    wait_signal();
    broadcast();
    token_handoff();
}

// ============================================================================
// WAIT / SIGNAL
// ============================================================================

static FLAG: Mutex<bool> = Mutex::new(false);
static FLAG_CV: Condvar = Condvar::new();
static WAIT_RETURNS: AtomicUsize = AtomicUsize::new(0);

fn flag_waiter_main(_arg: usize) {
    let mut guard = FLAG.lock();
    while !*guard {
        guard = FLAG_CV.wait(guard);
    }
    check(*guard, "wait returned with the predicate true");
    WAIT_RETURNS.fetch_add(1, Ordering::SeqCst);
}

/// One waiter, one signaller, the classic predicate loop: the waiter
/// returns exactly once, holding the mutex, with the flag set.
fn wait_signal() {
    *FLAG.lock() = false;
    WAIT_RETURNS.store(0, Ordering::SeqCst);

    // Priority 11 > runner: blocks in wait before we touch the flag.
    let waiter = scheduler::spawn(flag_waiter_main, 0, "cv-wait", STACK, 11).unwrap();
    check(
        WAIT_RETURNS.load(Ordering::SeqCst) == 0,
        "waiter blocked on the unset predicate",
    );

    {
        let mut guard = FLAG.lock();
        *guard = true;
        FLAG_CV.signal();
    }

    scheduler::join_thread(waiter);
    check(
        WAIT_RETURNS.load(Ordering::SeqCst) == 1,
        "wait returned exactly once",
    );
}

// ============================================================================
// BROADCAST
// ============================================================================

static GATE: Mutex<bool> = Mutex::new(false);
static GATE_CV: Condvar = Condvar::new();
static RELEASED: AtomicUsize = AtomicUsize::new(0);

fn gate_waiter_main(_arg: usize) {
    let mut guard = GATE.lock();
    while !*guard {
        guard = GATE_CV.wait(guard);
    }
    RELEASED.fetch_add(1, Ordering::SeqCst);
}

/// Broadcast releases every thread then waiting, exactly once each.
fn broadcast() {
    *GATE.lock() = false;
    RELEASED.store(0, Ordering::SeqCst);

    let a = scheduler::spawn(gate_waiter_main, 0, "cv-bcast-a", STACK, 11).unwrap();
    let b = scheduler::spawn(gate_waiter_main, 0, "cv-bcast-b", STACK, 11).unwrap();
    let c = scheduler::spawn(gate_waiter_main, 0, "cv-bcast-c", STACK, 11).unwrap();

    {
        let mut guard = GATE.lock();
        *guard = true;
        GATE_CV.broadcast();
    }

    scheduler::join_thread(a);
    scheduler::join_thread(b);
    scheduler::join_thread(c);
    check(
        RELEASED.load(Ordering::SeqCst) == 3,
        "broadcast released every waiter once",
    );
}

// ============================================================================
// TOKEN HAND-OFF
// ============================================================================

static TOKENS: Mutex<u32> = Mutex::new(0);
static TOKENS_CV: Condvar = Condvar::new();
static CONSUMED: AtomicUsize = AtomicUsize::new(0);

fn consumer_main(_arg: usize) {
    let mut guard = TOKENS.lock();
    while *guard == 0 {
        guard = TOKENS_CV.wait(guard);
    }
    *guard -= 1;
    CONSUMED.fetch_add(1, Ordering::SeqCst);
}

/// Each signal hands one token to one consumer; the second consumer
/// stays parked until its own token arrives.
fn token_handoff() {
    *TOKENS.lock() = 0;
    CONSUMED.store(0, Ordering::SeqCst);

    let first = scheduler::spawn(consumer_main, 0, "cv-tok-1", STACK, 11).unwrap();
    let second = scheduler::spawn(consumer_main, 0, "cv-tok-2", STACK, 11).unwrap();

    {
        let mut guard = TOKENS.lock();
        *guard += 1;
    }
    TOKENS_CV.signal();
    check(
        CONSUMED.load(Ordering::SeqCst) == 1,
        "one signal released one consumer",
    );

    {
        let mut guard = TOKENS.lock();
        *guard += 1;
    }
    TOKENS_CV.signal();

    scheduler::join_thread(first);
    scheduler::join_thread(second);
    check(
        CONSUMED.load(Ordering::SeqCst) == 2 && *TOKENS.lock() == 0,
        "both tokens consumed, none left",
    );
}
