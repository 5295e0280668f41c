/*
 * Sleeping Mutex
 *
 * Mutual exclusion lock whose contended callers sleep. The protected data
 * lives inside the lock and is reached through an RAII guard, so the type
 * system enforces "unlock only by the owner" structurally; the ownership
 * assertion below catches the remaining hole (a guard smuggled across
 * threads cannot happen safely, but a bug in this module could).
 *
 * ALGORITHM:
 * =========
 *
 * The lock word, the owner, and the FIFO wait queue sit behind a short
 * spin lock. A contended locker appends itself to the wait queue once,
 * then sleeps in a recheck loop - the flag may be gone again by the time
 * it runs (a fresh locker can barge in), in which case it simply sleeps
 * again, still at the front of the queue. Unlock clears the flag and
 * wakes the queue head; the head removes its own entry when it finally
 * acquires. Waiters therefore acquire in arrival order among themselves.
 *
 * The whole acquire path runs under a single preemption disable. That is
 * what makes "test the flag, then sleep" atomic against the owner's
 * unlock on a uniprocessor: the unlocking thread cannot run between the
 * test and the sleep, and interrupt handlers never touch mutexes. The
 * disable is released while *holding* the mutex - holding is not a
 * critical section, only the state manipulation is - so owners may block,
 * take further mutexes, or run for a long time.
 *
 * There is no priority inheritance: a high-priority waiter behind a
 * low-priority owner waits as long as the owner takes (see DESIGN.md).
 * Interrupt handlers must never lock a mutex.
 */

use core::cell::UnsafeCell;
use core::fmt;
use core::ops::{Deref, DerefMut};

use heapless::Deque;

use crate::config::MAX_THREADS;
use crate::error::KernelError;
use crate::scheduler::{self, ThreadId};

/// Lock state: flag, owner, and FIFO wait queue.
///
/// The wait queue is a bounded in-place deque so that lock and unlock
/// never touch the allocator - the heap itself is protected by one of
/// these mutexes.
struct MutexState {
    locked: bool,
    owner: Option<ThreadId>,
    waiters: Deque<ThreadId, MAX_THREADS>,
}

/// Sleeping mutual exclusion lock around a value of type `T`.
pub struct Mutex<T> {
    state: spin::Mutex<MutexState>,
    data: UnsafeCell<T>,
}

// The mutex hands out exclusive access one thread at a time.
unsafe impl<T: Send> Send for Mutex<T> {}
unsafe impl<T: Send> Sync for Mutex<T> {}

impl<T> Mutex<T> {
    /// Create an unlocked mutex owning `data`.
    pub const fn new(data: T) -> Self {
        Self {
            state: spin::Mutex::new(MutexState {
                locked: false,
                owner: None,
                waiters: Deque::new(),
            }),
            data: UnsafeCell::new(data),
        }
    }

    /// Acquire the lock, sleeping while it is held elsewhere.
    ///
    /// Thread context only, with preemption enabled. Re-locking a mutex
    /// the caller already owns is a fatal error.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        let cur = scheduler::current_thread_id();
        scheduler::preempt_disable();

        let mut state = self.state.lock();
        if state.locked {
            assert!(
                state.owner != Some(cur),
                "recursive lock of mutex by {}",
                cur
            );
            state
                .waiters
                .push_back(cur)
                .unwrap_or_else(|_| panic!("mutex wait queue overflow"));
            while state.locked {
                drop(state);
                scheduler::sleep_current();
                state = self.state.lock();
            }
            remove_waiter(&mut state.waiters, cur);
        }
        state.locked = true;
        state.owner = Some(cur);
        drop(state);

        scheduler::preempt_enable();
        MutexGuard { mutex: self }
    }

    /// Acquire the lock only if it is free right now.
    pub fn try_lock(&self) -> Result<MutexGuard<'_, T>, KernelError> {
        let cur = scheduler::current_thread_id();
        scheduler::preempt_disable();

        let mut state = self.state.lock();
        let acquired = if state.locked {
            false
        } else {
            state.locked = true;
            state.owner = Some(cur);
            true
        };
        drop(state);

        scheduler::preempt_enable();
        if acquired {
            Ok(MutexGuard { mutex: self })
        } else {
            Err(KernelError::Busy)
        }
    }

    /// Release the lock and wake the first waiter.
    ///
    /// Internal; reached through guard drop and the condition variable.
    pub(crate) fn unlock(&self) {
        let cur = scheduler::current_thread_id();
        scheduler::preempt_disable();

        let mut state = self.state.lock();
        assert_eq!(
            state.owner,
            Some(cur),
            "unlock of mutex by non-owner {}",
            cur
        );
        state.locked = false;
        state.owner = None;
        let head = state.waiters.front().copied();
        drop(state);

        if let Some(waiter) = head {
            scheduler::wake_thread(waiter);
        }
        scheduler::preempt_enable();
    }
}

impl<T: fmt::Debug> fmt::Debug for Mutex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.try_lock() {
            Ok(guard) => f.debug_struct("Mutex").field("data", &*guard).finish(),
            Err(_) => f.write_str("Mutex { <locked> }"),
        }
    }
}

/// Remove one entry from the wait queue, preserving the order of the
/// rest. The queue is short and this runs rarely (only on acquisition
/// after contention).
fn remove_waiter(waiters: &mut Deque<ThreadId, MAX_THREADS>, id: ThreadId) {
    for _ in 0..waiters.len() {
        let t = waiters.pop_front().expect("wait queue shrank underfoot");
        if t != id {
            let _ = waiters.push_back(t);
        }
    }
}

/// RAII guard providing access to the protected data. Dropping the guard
/// releases the lock.
pub struct MutexGuard<'a, T> {
    mutex: &'a Mutex<T>,
}

impl<'a, T> MutexGuard<'a, T> {
    /// The mutex this guard locks; used by the condition variable to
    /// reacquire after a wait.
    pub(crate) fn mutex(&self) -> &'a Mutex<T> {
        self.mutex
    }
}

impl<T> Deref for MutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &*self.mutex.data.get() }
    }
}

impl<T> DerefMut for MutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.mutex.data.get() }
    }
}

impl<T> Drop for MutexGuard<'_, T> {
    fn drop(&mut self) {
        self.mutex.unlock();
    }
}
