/*
 * Condition Variable
 *
 * Blocks threads until a predicate guarded by a mutex may have changed.
 * Waiters register a per-wait record (thread id + awaken flag) that lives
 * in the condition variable's bounded queue for exactly the duration of
 * the wait.
 *
 * ATOMICITY ARGUMENT:
 * ==================
 *
 * wait() must release the mutex and block as one step with respect to
 * concurrent signal()/broadcast(), or a signal sent between the two would
 * be lost. Both sides run their critical part under a preemption disable,
 * so on a uniprocessor the signaller cannot execute between the waiter's
 * unlock, its record enqueue, and its sleep. The awaken flag closes the
 * remaining gap: a signal delivered after the enqueue but before the
 * sleep marks the record, and the waiter's recheck loop sees the mark and
 * returns without sleeping.
 *
 * Spurious wakeups are permitted; callers must re-test their predicate in
 * a loop around wait(). broadcast() wakes every current waiter (the
 * thundering-herd cost is accepted - the waiters reacquire the mutex one
 * at a time anyway).
 */

use heapless::Deque;

use crate::config::MAX_THREADS;
use crate::scheduler::{self, ThreadId};
use crate::sync::mutex::MutexGuard;

/// Per-wait record: who waits, and whether a signal already picked them.
struct WaitRecord {
    thread: ThreadId,
    awaken: bool,
}

/// Condition variable. Pair it with one mutex at a time.
pub struct Condvar {
    waiters: spin::Mutex<Deque<WaitRecord, MAX_THREADS>>,
}

impl Condvar {
    pub const fn new() -> Self {
        Self {
            waiters: spin::Mutex::new(Deque::new()),
        }
    }

    /// Atomically release the mutex behind `guard` and block until
    /// signalled, then reacquire the mutex and return its guard.
    ///
    /// The caller must hold the guard of the mutex that protects the
    /// predicate (enforced by the signature). May wake spuriously.
    pub fn wait<'a, T>(&self, guard: MutexGuard<'a, T>) -> MutexGuard<'a, T> {
        let mutex = guard.mutex();
        let cur = scheduler::current_thread_id();

        scheduler::preempt_disable();

        // Release the mutex. The next owner can be chosen now, but it
        // cannot run - and thus cannot signal - until our preemption
        // disable ends, which is after we are asleep with our record
        // queued.
        drop(guard);

        self.waiters
            .lock()
            .push_back(WaitRecord {
                thread: cur,
                awaken: false,
            })
            .unwrap_or_else(|_| panic!("condvar wait queue overflow"));

        loop {
            let awakened = {
                let waiters = self.waiters.lock();
                waiters
                    .iter()
                    .find(|r| r.thread == cur)
                    .map(|r| r.awaken)
                    .unwrap_or(true)
            };
            if awakened {
                break;
            }
            scheduler::sleep_current();
        }

        {
            let mut waiters = self.waiters.lock();
            remove_record(&mut waiters, cur);
        }

        scheduler::preempt_enable();
        mutex.lock()
    }

    /// Wake one waiter that has not been picked by an earlier signal.
    pub fn signal(&self) {
        scheduler::preempt_disable();

        let target = {
            let mut waiters = self.waiters.lock();
            waiters.iter_mut().find(|r| !r.awaken).map(|r| {
                r.awaken = true;
                r.thread
            })
        };
        if let Some(thread) = target {
            scheduler::wake_thread(thread);
        }

        scheduler::preempt_enable();
    }

    /// Wake every thread currently waiting.
    pub fn broadcast(&self) {
        scheduler::preempt_disable();

        let mut targets: heapless::Vec<ThreadId, MAX_THREADS> = heapless::Vec::new();
        {
            let mut waiters = self.waiters.lock();
            for record in waiters.iter_mut() {
                if !record.awaken {
                    record.awaken = true;
                    let _ = targets.push(record.thread);
                }
            }
        }
        for thread in targets {
            scheduler::wake_thread(thread);
        }

        scheduler::preempt_enable();
    }
}

impl Default for Condvar {
    fn default() -> Self {
        Self::new()
    }
}

/// Drop one record, preserving the order of the rest.
fn remove_record(waiters: &mut Deque<WaitRecord, MAX_THREADS>, id: ThreadId) {
    for _ in 0..waiters.len() {
        let record = waiters.pop_front().expect("wait queue shrank underfoot");
        if record.thread != id {
            let _ = waiters.push_back(record);
        }
    }
}
