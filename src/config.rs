/*
 * Build-Time Kernel Configuration
 *
 * This module collects the tunable constants of the kernel in one place.
 * Everything here is resolved at compile time; there is no runtime
 * configuration surface.
 *
 * Why this is important:
 * - Gives every subsystem a single source of truth for its sizing
 * - Makes the timing base (TICK_HZ) visible to both scheduler and timer
 * - Keeps stack and heap sizing auditable in one place
 */

/// Frequency of the scheduling clock in Hz. The PIT is programmed to this
/// rate and every subsystem that talks about "ticks" means periods of it.
pub const TICK_HZ: u32 = 100;

/// Number of scheduling priority levels. Priority 0 is reserved for the
/// idle thread; 1..NR_PRIORITIES-1 are regular priorities.
pub const NR_PRIORITIES: usize = 20;

/// Priority of the idle thread. Nothing else may run at this level.
pub const IDLE_PRIORITY: u8 = 0;

/// Lowest priority available to regular threads (the timer worker runs
/// here so that timer callbacks never starve application threads).
pub const MIN_PRIORITY: u8 = 1;

/// Highest regular priority.
pub const MAX_PRIORITY: u8 = (NR_PRIORITIES - 1) as u8;

/// Default priority for threads that have no particular requirement.
pub const DEFAULT_PRIORITY: u8 = 10;

/// Minimum per-thread stack size in bytes. Requests below this are
/// rounded up at creation time.
pub const MIN_STACK_SIZE: usize = 512;

/// Default per-thread stack size in bytes.
pub const DEFAULT_STACK_SIZE: usize = 16 * 1024;

/// Stack size of the idle thread. Interrupt frames land on the stack of
/// whatever thread is current, so even idle needs headroom beyond the
/// bare minimum.
pub const IDLE_STACK_SIZE: usize = 4096;

/// Stack size for the double-fault handler's dedicated interrupt stack.
/// A kernel stack overflow is serviced on this stack, so it must hold
/// the exception frame plus the panic path's formatting.
pub const DOUBLE_FAULT_STACK_SIZE: usize = 4096;

/// Maximum thread name length in bytes.
pub const THREAD_NAME_MAX: usize = 16;

/// Size of the thread table. Thread creation fails with OutOfMemory once
/// this many threads exist simultaneously.
pub const MAX_THREADS: usize = 64;

/// Scheduling quantum in ticks. Once per quantum the tick handler checks
/// whether the current thread should hand the processor to a peer at the
/// same priority.
pub const SCHED_QUANTUM_TICKS: u32 = 2;

/// Total size of the kernel heap in bytes. Must be a multiple of
/// HEAP_ALIGN; checked at heap setup.
pub const HEAP_SIZE: usize = 4 * 1024 * 1024;

/// Alignment of every heap payload, and the allocation granularity.
/// Must be a power of two and at least one machine word.
pub const HEAP_ALIGN: usize = 16;

/// Size of the serial driver's receive buffer. Must be a power of two.
pub const SERIAL_RX_BUF_SIZE: usize = 256;
