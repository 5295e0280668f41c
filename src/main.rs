/*
 * CRUX Kernel Main Entry Point
 *
 * This is the main entry point for the CRUX kernel, a small preemptive
 * multitasking kernel for a single-processor x86_64 target. It handles
 * the early boot process and the kernel initialization sequence.
 *
 * Why this is important:
 * - Provides the entry point the loader jumps to
 * - Sets up a proper kernel stack before entering Rust code
 * - Implements panic handling for kernel-level errors
 * - Coordinates the overall kernel initialization sequence
 *
 * INITIALIZATION ORDER:
 * ====================
 *
 * The order below is load-bearing. The console and logger come first so
 * everything later can report. The heap must exist before the scheduler
 * is bootstrapped (the thread table lives on it), and the scheduler must
 * be bootstrapped before anything takes a mutex (mutex ownership is
 * expressed in thread ids). Interrupts stay masked for the whole
 * sequence; the first thread dispatched by scheduler::start() is the
 * first code to run with them enabled.
 */

#![no_std]
#![no_main]
#![feature(abi_x86_interrupt)]
#![feature(alloc_error_handler)]
#![allow(dead_code)]

extern crate alloc;
extern crate rlibc;

use core::panic::PanicInfo;

mod arch;
mod config;
mod drivers;
mod error;
mod irq;
mod memory;
mod scheduler;
mod sync;
#[cfg(feature = "selftest")]
mod tests;
mod timer;
mod utils;

#[repr(C, align(16))]
pub struct AlignedBootStack([u8; BOOT_STACK_SIZE]);

const BOOT_STACK_SIZE: usize = 64 * 1024;

#[unsafe(no_mangle)]
pub static mut BOOT_STACK: AlignedBootStack = AlignedBootStack([0; BOOT_STACK_SIZE]);

/// ===============================
///  EARLY ENTRY POINT (_start)
/// ===============================
///
/// Called by the loader in long mode with interrupts masked. Required to:
///   - Switch to our own 64 KiB kernel stack
///   - Call into Rust's `kstart`
#[unsafe(naked)]
#[unsafe(no_mangle)]
pub unsafe extern "C" fn _start() -> ! {
    core::arch::naked_asm!(
        "lea rax, [rip + BOOT_STACK]",
        "add rax, {stack_size}",
        "mov rsp, rax",
        "jmp kstart",
        stack_size = const BOOT_STACK_SIZE,
    );
}

/// ===============================
///  RUST KERNEL ENTRY POINT
/// ===============================
///
/// Now running on our own boot stack, interrupts still masked.
#[unsafe(no_mangle)]
pub extern "C" fn kstart() -> ! {
    // Step 1: Console and logging, so everything later can report.
    drivers::serial::init();
    utils::logger::init();
    log::info!("CRUX kernel starting...");

    // Step 2: Processor tables (GDT, TSS, IDT).
    arch::x86_64::init();

    // Step 3: Heap. Everything dynamic, including the thread table,
    // comes from here.
    memory::init();

    // Step 4: Scheduler bootstrap - from here on current_thread_id()
    // works and mutexes may be taken.
    scheduler::bootstrap();

    // Step 5: Interrupt controller and tick source.
    arch::x86_64::peripheral::pic::init();
    arch::x86_64::peripheral::pit::init(config::TICK_HZ);

    // Step 6: Idle thread and timer service worker.
    scheduler::init();
    timer::init();

    // Step 7: Hardware interrupt plumbing. The tick handler feeds both
    // the scheduler (quantum accounting) and the timer service (tick
    // counter, deadline wakeups).
    irq::register(
        arch::x86_64::peripheral::pit::PIT_IRQ,
        tick_irq_handler,
        0,
    )
    .expect("tick IRQ registration failed");
    drivers::serial::enable_input();

    // Step 8: First real work: the console echo thread, plus the
    // self-test suite when it is built in.
    scheduler::spawn(echo_thread, 0, "echo", config::DEFAULT_STACK_SIZE, 2)
        .expect("failed to spawn echo thread");

    #[cfg(feature = "selftest")]
    {
        scheduler::spawn(
            tests::run_all,
            0,
            "selftest",
            config::DEFAULT_STACK_SIZE,
            config::DEFAULT_PRIORITY,
        )
        .expect("failed to spawn self-test thread");
    }

    log::info!("kernel initialization complete");

    // Step 9: Hand over to the scheduler; the boot context is discarded.
    scheduler::start()
}

/// Periodic tick handler, one call per PIT interrupt.
fn tick_irq_handler(_arg: usize) {
    scheduler::report_tick();
    timer::report_tick();
}

/// Echo console input back to the console. Blocks on the serial driver,
/// so it costs nothing while no one is typing.
fn echo_thread(_arg: usize) {
    loop {
        match drivers::serial::read_byte() {
            Ok(byte) => drivers::serial::write_byte(byte),
            Err(err) => {
                log::warn!("console read failed: {}", err);
                scheduler::exit_thread();
            }
        }
    }
}

/// ===============================
///  PANIC HANDLER
/// ===============================
///
/// Contract violations and hardware exceptions end up here: emit one
/// diagnostic line through the console byte sink and halt the processor
/// for good.
#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    arch::intr_disable();

    // The panicking thread may hold the console; tear the lock open so
    // the diagnostic can get out.
    unsafe { drivers::serial::force_unlock() };

    if let Some(location) = info.location() {
        log::error!(
            "PANIC at {}:{}: {}",
            location.file(),
            location.line(),
            info.message()
        );
    } else {
        log::error!("PANIC: {}", info.message());
    }

    loop {
        x86_64::instructions::hlt();
    }
}
