/*
 * Preemptive Fixed-Priority Scheduler
 *
 * This module implements the kernel's thread subsystem: a preemptive,
 * fixed-priority scheduler for a single processor, with FIFO ordering
 * inside each priority level.
 *
 * SCHEDULING MODEL:
 * ================
 *
 * - 20 priority levels; level 0 belongs exclusively to the idle thread.
 * - The runnable thread at the front of the highest non-empty level runs.
 * - Within a level, threads are dispatched strictly FIFO; the tick
 *   handler requests a round-robin hand-off once per quantum when a peer
 *   of the same priority is queued.
 * - A thread runs until it sleeps, exits, yields, or a higher-priority
 *   thread becomes runnable.
 *
 * PREEMPTION DISCIPLINE:
 * =====================
 *
 * Preemption is governed by a per-processor counter: zero means
 * preemptable, and disable/enable must pair up exactly. While the counter
 * is non-zero the yield flag can accumulate switch requests but no switch
 * happens; the matching enable that brings the counter back to zero
 * consumes the flag and reschedules. Interrupt handlers never switch
 * directly either - they set the yield flag, and the IRQ dispatch tail
 * performs the switch after all interrupt work (including the controller
 * acknowledge) is done. That deferral is what `reschedule_from_interrupt`
 * implements.
 *
 * Every context switch happens with interrupts disabled and the
 * preemption counter at exactly 1. Each suspended thread therefore
 * resumes on a path that will run the matching enable (or, for a brand
 * new thread, the trampoline prologue that resets the counter), keeping
 * the single per-processor counter consistent across switches without
 * saving it per thread.
 *
 * LOCKING:
 * =======
 *
 * All scheduler state lives behind one spin lock that is only ever taken
 * with interrupts disabled. Interrupt-context entry points (wake_thread,
 * report_tick, reschedule_from_interrupt) can therefore never find the
 * lock held on this uniprocessor. The lock is released before the actual
 * context switch so the incoming thread can immediately take it again.
 *
 * SLEEP / WAKEUP:
 * ==============
 *
 * sleep_current() and wake_thread() are the kernel's one blocking
 * primitive; the mutex, the condition variable, the timer worker and the
 * serial driver are all built from the same pattern: disable preemption,
 * test the predicate, and sleep in a loop. A wakeup issued while the
 * sleeper still holds its preemption disable cannot be lost, because the
 * waker cannot run (thread context) or runs to completion first
 * (interrupt context with the sleeper's interrupts disabled).
 */

use core::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

use alloc::boxed::Box;
use alloc::vec::Vec;
use spin::Mutex;

pub mod runqueue;
pub mod thread;

pub use self::thread::{Thread, ThreadId, ThreadState};

use self::runqueue::RunQueue;
use self::thread::ThreadTable;
use crate::arch;
use crate::config::{
    IDLE_STACK_SIZE, MAX_PRIORITY, MIN_PRIORITY, MIN_STACK_SIZE, SCHED_QUANTUM_TICKS,
};
use crate::error::KernelError;

/// Global scheduler instance. Only locked with interrupts disabled.
static SCHEDULER: Mutex<Option<Scheduler>> = Mutex::new(None);

/// Currently running thread id (atomic for IRQ-safe reads).
static CURRENT_THREAD_ID: AtomicUsize = AtomicUsize::new(0);

/// Per-processor preemption level. Zero means preemption is enabled.
/// Starts at 1: the whole boot sequence runs with preemption disabled
/// until the first real thread's prologue resets it.
static PREEMPT_LEVEL: AtomicU32 = AtomicU32::new(1);

/// Deferred "switch requested" flag, consumed on the next enable-to-zero
/// or at the IRQ dispatch tail.
static YIELD_PENDING: AtomicBool = AtomicBool::new(false);

/// Ticks left in the current scheduling quantum.
static QUANTUM_LEFT: AtomicU32 = AtomicU32::new(SCHED_QUANTUM_TICKS);

/// Scheduler state: the thread table, the ready lists, and the idle
/// thread's identity.
struct Scheduler {
    threads: ThreadTable,
    runq: RunQueue,
    idle: Option<ThreadId>,
}

impl Scheduler {
    fn new() -> Self {
        Self {
            threads: ThreadTable::new(),
            runq: RunQueue::new(),
            idle: None,
        }
    }

    /// Queue a thread at the tail of its priority level.
    fn enqueue(&mut self, id: ThreadId) {
        let Self { threads, runq, .. } = self;
        runq.enqueue(threads, id);
    }

    /// Front of the highest non-empty level, or the idle thread.
    fn pick_next(&mut self) -> ThreadId {
        let Self { threads, runq, idle } = self;
        runq.pick_next(threads)
            .unwrap_or_else(|| idle.expect("idle thread not created"))
    }
}

/// Run a closure against the scheduler with interrupts disabled.
fn with_scheduler<R>(f: impl FnOnce(&mut Scheduler) -> R) -> R {
    arch::without_interrupts(|| {
        let mut guard = SCHEDULER.lock();
        f(guard.as_mut().expect("scheduler not bootstrapped"))
    })
}

// ============================================================================
// PREEMPTION CONTROL
// ============================================================================

/// Current preemption level (0 = preemption enabled).
pub fn preempt_level() -> u32 {
    PREEMPT_LEVEL.load(Ordering::SeqCst)
}

/// Whether preemption is currently enabled.
pub fn preempt_enabled() -> bool {
    preempt_level() == 0
}

/// Enter a preemption-disabled section. Must be paired with
/// `preempt_enable` in the same thread.
pub fn preempt_disable() {
    let prev = PREEMPT_LEVEL.fetch_add(1, Ordering::SeqCst);
    assert!(prev != u32::MAX, "preemption level overflow");
}

/// Leave a preemption-disabled section. When the level returns to zero
/// with a switch request pending, the switch happens here.
pub fn preempt_enable() {
    let prev = PREEMPT_LEVEL.fetch_sub(1, Ordering::SeqCst);
    assert!(prev > 0, "preemption level underflow");
    if prev != 1 {
        return;
    }
    // The level just reached zero; service any pending switch request.
    // An interrupt sneaking in between the decrement and the check simply
    // services the request first and the loop finds the flag clear.
    while YIELD_PENDING.swap(false, Ordering::SeqCst) {
        PREEMPT_LEVEL.fetch_add(1, Ordering::SeqCst);
        arch::without_interrupts(reschedule);
        PREEMPT_LEVEL.fetch_sub(1, Ordering::SeqCst);
    }
}

// ============================================================================
// SETUP
// ============================================================================

/// Install a placeholder descriptor for the boot context so that
/// `current_thread_id` (and everything built on it, such as mutex
/// ownership) works before the scheduler runs.
///
/// Requires a working heap. Preemption stays disabled (level 1, as set at
/// link time) for the whole boot sequence.
pub fn bootstrap() {
    assert_eq!(preempt_level(), 1, "bootstrap with preemption enabled");
    arch::without_interrupts(|| {
        let mut guard = SCHEDULER.lock();
        assert!(guard.is_none(), "scheduler already bootstrapped");

        let mut sched = Scheduler::new();
        let Ok(id) = sched.threads.insert(Thread::bootstrap_placeholder()) else {
            panic!("empty thread table rejected bootstrap thread");
        };
        CURRENT_THREAD_ID.store(id.0, Ordering::SeqCst);
        *guard = Some(sched);
    });
    log::info!("scheduler bootstrapped");
}

/// Create the idle thread. The idle thread is never enqueued; it is the
/// dispatch fallback when no regular thread is runnable.
pub fn init() {
    let id = create_thread(idle_thread_main, 0, "idle", IDLE_STACK_SIZE, 0, false)
        .expect("failed to create idle thread");
    with_scheduler(|sched| {
        assert!(sched.idle.is_none(), "idle thread already created");
        sched.idle = Some(id);
    });
    log::info!("idle thread created ({})", id);
}

/// Hand the processor to the scheduler. The bootstrap context is
/// discarded and the highest-priority thread (or idle) starts running.
pub fn start() -> ! {
    arch::intr_disable();

    let next_sp = {
        let mut guard = SCHEDULER.lock();
        let sched = guard.as_mut().expect("scheduler not bootstrapped");
        let boot = current_thread_id();

        let next = sched.pick_next();
        CURRENT_THREAD_ID.store(next.0, Ordering::SeqCst);
        let sp = sched
            .threads
            .get(next)
            .expect("picked thread missing")
            .saved_sp;

        // The boot context is never scheduled again; drop its descriptor.
        sched.threads.remove(boot);
        sp
    };

    log::info!("scheduler started");
    unsafe { arch::context_load(next_sp) }
}

// ============================================================================
// THREAD CREATION
// ============================================================================

/// Create a thread and enqueue it at the tail of its priority level.
///
/// The new thread starts in `entry` with `arg`, with preemption enabled
/// and interrupts on, and dies when `entry` returns (or when it calls
/// `exit_thread`). If the new priority exceeds the current thread's, a
/// switch request is recorded and serviced as soon as preemption allows.
///
/// Creation is atomic: on any error nothing remains allocated.
pub fn spawn(
    entry: fn(usize),
    arg: usize,
    name: &str,
    stack_size: usize,
    priority: u8,
) -> Result<ThreadId, KernelError> {
    if priority < MIN_PRIORITY || priority > MAX_PRIORITY {
        return Err(KernelError::InvalidArgument);
    }
    create_thread(entry, arg, name, stack_size, priority, true)
}

fn create_thread(
    entry: fn(usize),
    arg: usize,
    name: &str,
    stack_size: usize,
    priority: u8,
    enqueue: bool,
) -> Result<ThreadId, KernelError> {
    let stack = allocate_stack(stack_size)?;

    // Forge the initial frame at the highest 16-byte boundary inside the
    // stack region.
    let top = (stack.as_ptr() as usize + stack.len()) & !15;
    let saved_sp = arch::stack_forge(top as *mut u8, entry, arg);

    let thread = Thread::new(name, priority, stack, saved_sp);

    let id = match with_scheduler(|sched| {
        let id = sched.threads.insert(thread)?;
        if enqueue {
            sched.enqueue(id);
            let current_priority = sched
                .threads
                .get(current_thread_id())
                .map(|t| t.priority)
                .unwrap_or(0);
            if priority > current_priority {
                YIELD_PENDING.store(true, Ordering::SeqCst);
            }
        }
        Ok(id)
    }) {
        Ok(id) => id,
        Err(thread) => {
            // Table full: release the descriptor (and its stack) outside
            // the scheduler lock and report exhaustion.
            drop(thread);
            return Err(KernelError::OutOfMemory);
        }
    };

    log::debug!("created {} '{}' (priority {})", id, name, priority);

    // Give a higher-priority newcomer the processor right away.
    preempt_disable();
    preempt_enable();

    Ok(id)
}

fn allocate_stack(stack_size: usize) -> Result<Box<[u8]>, KernelError> {
    let size = stack_size.max(MIN_STACK_SIZE);
    let mut stack: Vec<u8> = Vec::new();
    stack
        .try_reserve_exact(size)
        .map_err(|_| KernelError::OutOfMemory)?;
    stack.resize(size, 0);
    Ok(stack.into_boxed_slice())
}

/// Prologue of every new thread, entered from the architecture
/// trampoline. Runs the entry function and exits on its behalf when it
/// returns.
pub extern "C" fn thread_start(entry: usize, arg: usize) -> ! {
    // The switch into a fresh thread happened at preemption level 1; a
    // new thread begins preemptable with interrupts on.
    PREEMPT_LEVEL.store(0, Ordering::SeqCst);
    arch::intr_enable();

    let entry: fn(usize) = unsafe { core::mem::transmute::<usize, fn(usize)>(entry) };
    entry(arg);

    exit_thread()
}

fn idle_thread_main(_arg: usize) {
    loop {
        arch::idle();
    }
}

// ============================================================================
// SCHEDULING
// ============================================================================

/// Id of the currently running thread.
pub fn current_thread_id() -> ThreadId {
    ThreadId(CURRENT_THREAD_ID.load(Ordering::SeqCst))
}

/// State of a thread, for diagnostics; None if the slot is empty.
pub fn thread_state(id: ThreadId) -> Option<ThreadState> {
    with_scheduler(|sched| sched.threads.get(id).map(|t| t.state))
}

/// Snapshot of one thread for diagnostics.
#[derive(Debug, Clone)]
pub struct ThreadStats {
    pub id: ThreadId,
    pub name: heapless::String<{ crate::config::THREAD_NAME_MAX }>,
    pub state: ThreadState,
    pub priority: u8,
    pub stack_size: usize,
}

/// Snapshot of every live thread.
///
/// Collected into a bounded vector: nothing may allocate while the
/// scheduler lock is held.
pub fn thread_stats() -> heapless::Vec<ThreadStats, { crate::config::MAX_THREADS }> {
    with_scheduler(|sched| {
        let mut stats = heapless::Vec::new();
        for thread in sched.threads.iter() {
            let _ = stats.push(ThreadStats {
                id: thread.id,
                name: thread.name.clone(),
                state: thread.state,
                priority: thread.priority,
                stack_size: thread.stack_size(),
            });
        }
        stats
    })
}

/// Core dispatch: pick the next runnable thread and switch to it.
///
/// Preconditions: interrupts disabled, preemption level exactly 1 (the
/// caller's single disable - the level every suspended thread resumes
/// at). Returns in the caller's context once the caller is dispatched
/// again.
fn reschedule() {
    debug_assert!(!arch::intr_enabled());
    assert_eq!(preempt_level(), 1, "reschedule outside a single preempt-disable");

    let mut guard = SCHEDULER.lock();
    let sched = guard.as_mut().expect("scheduler not bootstrapped");
    let prev = current_thread_id();

    // A thread that is still Running goes back to the tail of its level;
    // sleeping and dead threads just lose the processor. Idle is never
    // queued.
    let prev_state = sched
        .threads
        .get(prev)
        .expect("current thread missing from table")
        .state;
    if prev_state == ThreadState::Running && Some(prev) != sched.idle {
        sched.enqueue(prev);
    }

    let next = sched.pick_next();
    if next == prev {
        return;
    }

    CURRENT_THREAD_ID.store(next.0, Ordering::SeqCst);

    let prev_sp: *mut u64 = &mut sched
        .threads
        .get_mut(prev)
        .expect("current thread missing from table")
        .saved_sp;
    let next_sp = sched
        .threads
        .get(next)
        .expect("picked thread missing from table")
        .saved_sp;

    // Release the lock before switching; the pointer into the previous
    // thread's descriptor stays valid because nothing can touch the table
    // until the switch completes (interrupts are off, one processor).
    drop(guard);
    unsafe { arch::context_switch(prev_sp, next_sp) };
}

/// Voluntarily hand the processor to the next runnable thread.
///
/// A no-op while preemption is disabled; the pending request (if any)
/// stays recorded for the matching enable.
pub fn yield_now() {
    if !preempt_enabled() {
        return;
    }
    YIELD_PENDING.store(false, Ordering::SeqCst);
    preempt_disable();
    arch::without_interrupts(reschedule);
    preempt_enable();
}

/// Block the current thread until another party wakes it.
///
/// Precondition: the caller holds exactly one preemption disable and is
/// Running. Interrupts may be in any state; callers whose waker runs in
/// interrupt context keep them disabled across the predicate test and the
/// sleep. Returns once a wakeup has made the thread Running again and the
/// scheduler has dispatched it.
pub fn sleep_current() {
    assert_eq!(
        preempt_level(),
        1,
        "sleep requires exactly one preemption disable"
    );

    let saved = arch::intr_save();
    {
        let mut guard = SCHEDULER.lock();
        let sched = guard.as_mut().expect("scheduler not bootstrapped");
        let thread = sched
            .threads
            .get_mut(current_thread_id())
            .expect("current thread missing from table");
        debug_assert_eq!(thread.state, ThreadState::Running);
        thread.state = ThreadState::Sleeping;
    }
    reschedule();
    arch::intr_restore(saved);
}

/// Make a sleeping thread runnable again.
///
/// Safe from interrupt context and with preemption disabled. A wakeup of
/// an absent, current, or already-Running thread is a no-op; waking a
/// dead thread is a fatal error. If the woken thread outranks the current
/// one, a switch request is recorded.
pub fn wake_thread(id: ThreadId) {
    arch::without_interrupts(|| {
        let mut guard = SCHEDULER.lock();
        let Some(sched) = guard.as_mut() else {
            return;
        };
        if id == current_thread_id() {
            return;
        }
        let Some(thread) = sched.threads.get_mut(id) else {
            return;
        };
        match thread.state {
            ThreadState::Running => return,
            ThreadState::Dead => panic!("wakeup of dead {}", id),
            ThreadState::Sleeping => {}
        }
        thread.state = ThreadState::Running;
        let priority = thread.priority;
        sched.enqueue(id);

        let current_priority = sched
            .threads
            .get(current_thread_id())
            .map(|t| t.priority)
            .unwrap_or(0);
        if priority > current_priority {
            YIELD_PENDING.store(true, Ordering::SeqCst);
        }
    })
}

// ============================================================================
// THREAD TERMINATION
// ============================================================================

/// Terminate the current thread. Wakes the joiner, if one is already
/// waiting, and never returns. The descriptor and stack stay allocated
/// until the joiner reaps them.
pub fn exit_thread() -> ! {
    preempt_disable();
    arch::intr_disable();

    let joiner = {
        let mut guard = SCHEDULER.lock();
        let sched = guard.as_mut().expect("scheduler not bootstrapped");
        let idle = sched.idle;
        let thread = sched
            .threads
            .get_mut(current_thread_id())
            .expect("current thread missing from table");
        assert!(Some(thread.id) != idle, "idle thread attempted to exit");
        thread.state = ThreadState::Dead;
        thread.joiner.take()
    };

    if let Some(joiner) = joiner {
        wake_thread(joiner);
    }

    reschedule();
    unreachable!("dead thread was dispatched");
}

/// Wait for `id` to die, then release its stack and descriptor.
///
/// A thread has at most one joiner; a second concurrent joiner is a
/// fatal error, as is joining self or an unknown thread.
pub fn join_thread(id: ThreadId) {
    let cur = current_thread_id();
    assert_ne!(id, cur, "thread attempted to join itself");

    preempt_disable();
    loop {
        let dead = arch::without_interrupts(|| {
            let mut guard = SCHEDULER.lock();
            let sched = guard.as_mut().expect("scheduler not bootstrapped");
            let thread = sched
                .threads
                .get_mut(id)
                .expect("join of unknown thread");
            if thread.state == ThreadState::Dead {
                true
            } else {
                assert!(
                    thread.joiner.is_none() || thread.joiner == Some(cur),
                    "{} already has a joiner",
                    id
                );
                thread.joiner = Some(cur);
                false
            }
        });
        if dead {
            break;
        }
        sleep_current();
    }
    preempt_enable();

    // Reap outside every critical section: dropping the descriptor frees
    // the stack through the heap mutex.
    let thread = with_scheduler(|sched| sched.threads.remove(id));
    drop(thread);
}

// ============================================================================
// TICK HANDLING
// ============================================================================

/// Scheduler part of the periodic tick, called from the tick interrupt
/// handler with interrupts disabled.
///
/// Once per quantum: request a hand-off when a peer waits at the current
/// thread's priority, or unconditionally when the idle thread is running
/// while regular threads are queued.
pub fn report_tick() {
    let prev = QUANTUM_LEFT.fetch_sub(1, Ordering::SeqCst);
    if prev != 1 {
        return;
    }
    QUANTUM_LEFT.store(SCHED_QUANTUM_TICKS, Ordering::SeqCst);

    let mut guard = SCHEDULER.lock();
    let Some(sched) = guard.as_mut() else {
        return;
    };
    let cur = current_thread_id();

    if Some(cur) == sched.idle {
        if sched.runq.nr_runnable() > 0 {
            YIELD_PENDING.store(true, Ordering::SeqCst);
        }
        return;
    }
    if let Some(thread) = sched.threads.get(cur) {
        if !sched.runq.level_is_empty(thread.priority) {
            YIELD_PENDING.store(true, Ordering::SeqCst);
        }
    }
}

/// Deferred-preemption check, run at the tail of IRQ dispatch after the
/// handler has finished and the controller has been acknowledged.
///
/// If the interrupted thread was preemptable and an interrupt handler
/// requested a switch, perform it now. The interrupted thread resumes
/// here later and finishes the interrupt return normally.
pub fn reschedule_from_interrupt() {
    debug_assert!(!arch::intr_enabled());
    if !preempt_enabled() {
        return;
    }
    if !YIELD_PENDING.swap(false, Ordering::SeqCst) {
        return;
    }
    preempt_disable();
    reschedule();
    preempt_enable();
}
