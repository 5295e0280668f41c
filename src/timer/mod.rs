/*
 * Software Timer Service
 *
 * Tick counting and deadline-driven callbacks. The hardware tick handler
 * increments a monotonic counter; timers carry an absolute deadline in
 * ticks and sit on one global list sorted by deadline; a dedicated worker
 * thread dispatches the callbacks of every expired timer.
 *
 * WHY A WORKER THREAD:
 * ===================
 *
 * Callbacks run in the worker's thread context with preemption and
 * interrupts enabled, so they may log, take mutexes, sleep, and
 * reschedule their own timer (periodic timers). None of that is legal in
 * interrupt context, so the tick handler only ever wakes the worker.
 *
 * The tick handler still needs a cheap "is anything due" test that does
 * not take the timer mutex. Two interrupt-visible summaries provide it:
 * a list-empty flag and the deadline at the head of the list, both
 * refreshed - with interrupts disabled, nested inside the mutex -
 * whenever the list changes.
 *
 * WRAP-SAFE TIME:
 * ==============
 *
 * The tick counter is a u32 that is allowed to wrap. All deadline
 * comparisons go through ticks_expired/ticks_occurred, which split the
 * unsigned range in half around the reference point: anything within
 * half the range ahead is "future", the rest is "past". At 100 Hz the
 * counter wraps after ~497 days and a deadline may sit up to ~248 days
 * out.
 *
 * No cancellation: once scheduled, a timer fires. Timers are created once
 * and live forever; their slots are never reclaimed.
 */

use core::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

use alloc::vec::Vec;

use crate::arch;
use crate::config::{DEFAULT_STACK_SIZE, MIN_PRIORITY};
use crate::scheduler::{self, ThreadId};
use crate::sync::Mutex;
use crate::utils::list::{Links, List, Node};

/// Kernel time in scheduler ticks. Wraps; compare only through
/// `ticks_expired` / `ticks_occurred`.
pub type Ticks = u32;

/// Half the unsigned tick range; the boundary between "future" and
/// "past" relative to a reference point.
const TICKS_THRESHOLD: Ticks = Ticks::MAX / 2;

/// Whether `t` lies strictly in the past relative to `reference`.
pub fn ticks_expired(t: Ticks, reference: Ticks) -> bool {
    t.wrapping_sub(reference) > TICKS_THRESHOLD
}

/// Whether `t` has been reached relative to `reference` (now or past).
pub fn ticks_occurred(t: Ticks, reference: Ticks) -> bool {
    t == reference || ticks_expired(t, reference)
}

/// Monotonic tick counter, incremented once per tick interrupt.
static TICKS: AtomicU32 = AtomicU32::new(0);

/// Interrupt-visible summary: is the timer list empty?
static LIST_EMPTY: AtomicBool = AtomicBool::new(true);

/// Interrupt-visible summary: deadline of the list head. Only meaningful
/// while LIST_EMPTY is false.
static HEAD_DEADLINE: AtomicU32 = AtomicU32::new(0);

/// Worker thread id; usize::MAX until the service is initialized.
static WORKER: AtomicUsize = AtomicUsize::new(usize::MAX);

/// Index of a timer in the service arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TimerId(usize);

/// One timer: bound callback plus list linkage. The node is linked
/// exactly while the timer is scheduled.
struct TimerEntry {
    deadline: Ticks,
    callback: fn(usize),
    arg: usize,
    node: Node<TimerId>,
}

/// Arena of every timer ever created.
struct TimerTable {
    entries: Vec<TimerEntry>,
}

impl TimerTable {
    const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn entry(&self, id: TimerId) -> &TimerEntry {
        &self.entries[id.0]
    }

    fn entry_mut(&mut self, id: TimerId) -> &mut TimerEntry {
        &mut self.entries[id.0]
    }
}

impl Links<TimerId> for TimerTable {
    fn node(&self, id: TimerId) -> &Node<TimerId> {
        &self.entries[id.0].node
    }

    fn node_mut(&mut self, id: TimerId) -> &mut Node<TimerId> {
        &mut self.entries[id.0].node
    }
}

/// Mutex-guarded service state: the arena and the sorted pending list.
struct TimerService {
    table: TimerTable,
    pending: List<TimerId>,
}

impl TimerService {
    const fn new() -> Self {
        Self {
            table: TimerTable::new(),
            pending: List::new(),
        }
    }

    /// Refresh the interrupt-visible summaries from the list head.
    /// Nested interrupts-disabled section inside the mutex, so the tick
    /// handler never sees the two summaries out of step.
    fn refresh_summaries(&self) {
        arch::without_interrupts(|| match self.pending.front() {
            Some(head) => {
                HEAD_DEADLINE.store(self.table.entry(head).deadline, Ordering::SeqCst);
                LIST_EMPTY.store(false, Ordering::SeqCst);
            }
            None => {
                LIST_EMPTY.store(true, Ordering::SeqCst);
            }
        })
    }
}

static SERVICE: Mutex<TimerService> = Mutex::new(TimerService::new());

/// Handle to a timer. Copyable; all state lives in the service.
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    id: TimerId,
}

/// Create a timer bound to `callback`/`arg`. The timer starts
/// unscheduled.
pub fn create(callback: fn(usize), arg: usize) -> Timer {
    let mut service = SERVICE.lock();
    let id = TimerId(service.table.entries.len());
    service.table.entries.push(TimerEntry {
        deadline: 0,
        callback,
        arg,
        node: Node::new(),
    });
    Timer { id }
}

impl Timer {
    /// Schedule this timer for the absolute deadline `deadline_ticks`.
    ///
    /// The timer must not currently be scheduled (there is no
    /// cancellation, so "scheduled twice" can only be a bug). Keeps the
    /// pending list sorted by wrap-safe deadline order, FIFO among equal
    /// deadlines.
    pub fn schedule(&self, deadline_ticks: Ticks) {
        let mut service = SERVICE.lock();
        let TimerService { table, pending } = &mut *service;

        assert!(
            !table.node(self.id).is_linked(),
            "timer already scheduled"
        );
        table.entry_mut(self.id).deadline = deadline_ticks;

        // Insert before the first entry strictly later than us; equal
        // deadlines dispatch in schedule order.
        let mut anchor = None;
        let mut cursor = pending.front();
        while let Some(candidate) = cursor {
            if !ticks_occurred(table.entry(candidate).deadline, deadline_ticks) {
                anchor = Some(candidate);
                break;
            }
            cursor = pending.next(table, candidate);
        }
        match anchor {
            Some(candidate) => pending.insert_before(table, candidate, self.id),
            None => pending.push_back(table, self.id),
        }

        service.refresh_summaries();
    }

    /// Deadline of this timer as observed under the service mutex.
    ///
    /// Meaningful for a scheduled timer; during a concurrent dispatch the
    /// value read here and the timer's linkage can disagree, and no
    /// guarantee is made beyond "the value at the time of the call".
    pub fn deadline(&self) -> Ticks {
        SERVICE.lock().table.entry(self.id).deadline
    }
}

/// Current kernel time in ticks.
pub fn now() -> Ticks {
    TICKS.load(Ordering::SeqCst)
}

/// Timer half of the periodic tick, called from the tick interrupt
/// handler with interrupts disabled. Counts the tick and wakes the
/// worker once the head deadline has occurred.
pub fn report_tick() {
    let now = TICKS.fetch_add(1, Ordering::SeqCst).wrapping_add(1);

    if LIST_EMPTY.load(Ordering::SeqCst) {
        return;
    }
    if ticks_occurred(HEAD_DEADLINE.load(Ordering::SeqCst), now) {
        let worker = WORKER.load(Ordering::SeqCst);
        if worker != usize::MAX {
            scheduler::wake_thread(ThreadId(worker));
        }
    }
}

/// Start the timer service: create the dispatch worker at the lowest
/// regular priority.
pub fn init() {
    assert_eq!(
        WORKER.load(Ordering::SeqCst),
        usize::MAX,
        "timer service already initialized"
    );
    let id = scheduler::spawn(worker_main, 0, "timer", DEFAULT_STACK_SIZE, MIN_PRIORITY)
        .expect("failed to create timer worker");
    WORKER.store(id.0, Ordering::SeqCst);
    log::info!("timer service started ({} Hz tick)", crate::config::TICK_HZ);
}

/// Dispatch worker: sleep until the tick handler reports work, then run
/// every expired callback.
fn worker_main(_arg: usize) {
    loop {
        // The pending test and the sleep must be one atomic step with
        // respect to the tick interrupt, or a wakeup could land between
        // them and be lost; interrupts stay off from the test to the
        // sleep.
        scheduler::preempt_disable();
        let saved = arch::intr_save();
        loop {
            let pending = !LIST_EMPTY.load(Ordering::SeqCst)
                && ticks_occurred(HEAD_DEADLINE.load(Ordering::SeqCst), now());
            if pending {
                break;
            }
            scheduler::sleep_current();
        }
        arch::intr_restore(saved);
        scheduler::preempt_enable();

        dispatch_expired();
    }
}

/// Pop and invoke every timer whose deadline has occurred. The service
/// mutex is dropped around each callback so callbacks may use the
/// service (periodic timers reschedule themselves).
fn dispatch_expired() {
    loop {
        let (callback, arg) = {
            let mut service = SERVICE.lock();
            let TimerService { table, pending } = &mut *service;

            let Some(head) = pending.front() else {
                break;
            };
            if !ticks_occurred(table.entry(head).deadline, now()) {
                break;
            }

            pending.remove(table, head);
            service.refresh_summaries();

            let entry = service.table.entry(head);
            (entry.callback, entry.arg)
        };
        callback(arg);
    }
}
