//! Fault pretty-printers and MPU-fault task recovery (component C8).
//!
//! Grounded on `original_source/.../faults.c` (`mpuFaultIsr`, `hardFaultIsr`,
//! `busFaultIsr`, `usageFaultIsr`) and `mini_project/fault_handlers.c`. A
//! MemManage fault is recoverable: the offending task is identified from its
//! faulting stack pointer and torn down on the next PendSV, same as the
//! original clearing `MEMFAULTPENDED` and setting `PendSV` pending. Bus,
//! usage, and hard faults are treated as unrecoverable system state and
//! print then halt, matching the original's `while(1){}`.

#![allow(dead_code)]

use cortex_m_rt::exception;

use crate::fmt::u32_to_hex;
use crate::os;

const SCB_CFSR: *const u32 = 0xE000_ED28 as *const u32;
const SCB_MMFAR: *const u32 = 0xE000_ED34 as *const u32;
const SCB_SHCSR: *mut u32 = 0xE000_ED24 as *mut u32;
const SHCSR_MEMFAULTPENDED: u32 = 1 << 13;
const SHCSR_BUSFAULTPENDED: u32 = 1 << 14;
const SHCSR_USGFAULTPENDED: u32 = 1 << 12;
const SHCSR_BUSFAULTENA: u32 = 1 << 17;

/// The eight words an exception stacks automatically on entry, in stacking
/// order: r0, r1, r2, r3, r12, lr, pc, xpsr.
#[repr(C)]
struct StackedFrame {
    r0: u32,
    r1: u32,
    r2: u32,
    r3: u32,
    r12: u32,
    lr: u32,
    pc: u32,
    xpsr: u32,
}

fn print_hex_line(label: &str, value: u32) {
    let mut buf = [0u8; 8];
    let hex = u32_to_hex(value, &mut buf);
    crate::console::write_str(label);
    crate::console::write_str("0x");
    crate::console::write_bytes(hex);
    crate::console::write_str("\n");
}

fn dump_frame(psp: u32, mfault_status: u32) {
    let frame = unsafe { &*(psp as *const StackedFrame) };
    print_hex_line("Fault Instruction Address: ", frame.pc);
    print_hex_line("PSP: ", psp);
    print_hex_line("mfault: ", mfault_status);
    print_hex_line("R0: ", frame.r0);
    print_hex_line("R1: ", frame.r1);
    print_hex_line("R2: ", frame.r2);
    print_hex_line("R3: ", frame.r3);
    print_hex_line("R12: ", frame.r12);
    print_hex_line("LR: ", frame.lr);
    print_hex_line("PC: ", frame.pc);
    print_hex_line("xPSR: ", frame.xpsr);
}

#[exception]
fn MemoryManagement() {
    let psp: u32;
    unsafe {
        core::arch::asm!("mrs {0}, psp", out(reg) psp, options(nomem, nostack));
    }
    let cfsr = unsafe { core::ptr::read_volatile(SCB_CFSR) };
    let mmfar = unsafe { core::ptr::read_volatile(SCB_MMFAR) };

    crate::console::write_str("\nMPU fault\n");
    print_hex_line("Fault Data Address: ", mmfar);
    dump_frame(psp, cfsr & 0xFF);

    let offender = os::task_index_for_address(psp);
    if let Some(ix) = offender {
        os::request_fault_kill(ix);
    }

    unsafe {
        core::ptr::write_volatile(SCB_SHCSR, core::ptr::read_volatile(SCB_SHCSR) & !SHCSR_MEMFAULTPENDED);
    }
}

#[exception]
fn HardFault(_frame: &cortex_m_rt::ExceptionFrame) -> ! {
    crate::console::write_str("\nHard fault\n");
    // Escalated hard faults (e.g. a bus fault while BusFault is disabled)
    // carry no extra diagnostic bits here; enable BusFault so a retried
    // boot surfaces a precise fault instead of another escalation.
    unsafe {
        core::ptr::write_volatile(SCB_SHCSR, core::ptr::read_volatile(SCB_SHCSR) | SHCSR_BUSFAULTENA);
    }
    loop {}
}

#[exception]
fn BusFault() {
    crate::console::write_str("\nBus fault in process\n");
    unsafe {
        core::ptr::write_volatile(SCB_SHCSR, core::ptr::read_volatile(SCB_SHCSR) & !SHCSR_BUSFAULTPENDED);
    }
    loop {}
}

/// Unlike `BusFault`/`HardFault`, a usage fault is reported and cleared but
/// does not halt the CPU (SPEC_FULL §7: "usage faults allow continuation").
/// The faulting instruction is skipped by the exception return; a usage
/// fault recurring in the same task will simply fault again on its next
/// offending instruction.
#[exception]
fn UsageFault() {
    crate::console::write_str("\nUsage fault in process\n");
    unsafe {
        core::ptr::write_volatile(SCB_SHCSR, core::ptr::read_volatile(SCB_SHCSR) & !SHCSR_USGFAULTPENDED);
    }
}
