/*
 * Global Descriptor Table (GDT) Implementation
 *
 * x86_64 uses a flat memory model where segmentation is largely unused,
 * but the GDT is still required for:
 *
 * 1. Code/Data Segment Descriptors: Define the kernel code/data segments
 * 2. Task State Segment (TSS): Provides the interrupt stack table
 * 3. Double-Fault Stack: A known-good stack for the double fault handler,
 *    so that a kernel stack overflow produces a diagnostic instead of a
 *    triple fault
 *
 * This kernel runs entirely in ring 0, so no user segments are defined.
 * The descriptor table and its three selectors are built together as one
 * `KernelTables` value; the double-fault stack is a static region shaped
 * like every other raw stack in this kernel (see BOOT_STACK in main.rs),
 * sized from the shared configuration.
 */

use lazy_static::lazy_static;
use x86_64::{
    VirtAddr,
    structures::{
        gdt::{Descriptor, GlobalDescriptorTable, SegmentSelector},
        tss::TaskStateSegment,
    },
};

use crate::config::DOUBLE_FAULT_STACK_SIZE;

/// IST slot used by the double fault handler (see idt.rs).
pub const DOUBLE_FAULT_IST_INDEX: u16 = 0;

/// Raw stack region for the double-fault IST entry. Alignment matches
/// the ABI stack alignment, same as the thread and boot stacks.
#[repr(C, align(16))]
struct ExceptionStack([u8; DOUBLE_FAULT_STACK_SIZE]);

static mut DOUBLE_FAULT_STACK: ExceptionStack = ExceptionStack([0; DOUBLE_FAULT_STACK_SIZE]);

/// Exclusive top of the double-fault stack; the CPU pushes downward
/// from here when it takes the exception.
fn double_fault_stack_top() -> VirtAddr {
    VirtAddr::from_ptr(&raw const DOUBLE_FAULT_STACK) + DOUBLE_FAULT_STACK_SIZE as u64
}

/// The descriptor table together with the selectors it defines. Built
/// once; the selectors are what init() loads into the segment registers.
struct KernelTables {
    table: GlobalDescriptorTable,
    code: SegmentSelector,
    data: SegmentSelector,
    tss: SegmentSelector,
}

impl KernelTables {
    fn build() -> Self {
        let mut table = GlobalDescriptorTable::new();
        let code = table.append(Descriptor::kernel_code_segment());
        let data = table.append(Descriptor::kernel_data_segment());
        let tss = table.append(Descriptor::tss_segment(&TSS));
        Self {
            table,
            code,
            data,
            tss,
        }
    }
}

lazy_static! {
    static ref TSS: TaskStateSegment = {
        let mut tss = TaskStateSegment::new();
        tss.interrupt_stack_table[DOUBLE_FAULT_IST_INDEX as usize] = double_fault_stack_top();
        tss
    };
    static ref TABLES: KernelTables = KernelTables::build();
}

/// Initialize the Global Descriptor Table
///
/// Loads the GDT, points every segment register at the new descriptors,
/// and loads the TSS. Must be called before IDT initialization.
pub fn init() {
    use x86_64::instructions::{
        segmentation::{CS, DS, ES, FS, GS, SS, Segment},
        tables::load_tss,
    };

    TABLES.table.load();

    unsafe {
        // Stale segment registers left over from the loader would fault
        // on the first interrupt, so CS and every data segment are
        // reloaded against our own table.
        CS::set_reg(TABLES.code);
        DS::set_reg(TABLES.data);
        ES::set_reg(TABLES.data);
        SS::set_reg(TABLES.data);
        FS::set_reg(TABLES.data);
        GS::set_reg(TABLES.data);

        load_tss(TABLES.tss);
    }

    log::info!(
        "GDT initialized ({} byte double-fault stack)",
        DOUBLE_FAULT_STACK_SIZE
    );
}
