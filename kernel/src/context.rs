//! Context switch primitives (component C5).
//!
//! Grounded on `hanifeee535-rust_os`'s `os.rs` (`PendSV`/`SysTick`
//! `#[exception]` handlers, `schedule()`, `init_task_stack`) and
//! `original_source/mini_project/asm_src.h` (`setPsp`/`goThreadMode`/
//! `getPsp`/`getStackDump`). The teacher's `kernel/Cargo.toml` carries a
//! `cc` build-dependency implying an external `context_switch.s`, but no
//! such file (nor a `build.rs`) exists anywhere in the source tree this was
//! copied from; this module reimplements the same register-save/restore
//! sequence with `core::arch::global_asm!` instead, the approach
//! `tock`'s Cortex-M arch crate uses for its naked SVC/PendSV trampolines
//! (see `other_examples/.../arch-cortex-m-src-syscall.rs`). The `cc`
//! dependency is dropped; see DESIGN.md.

#![allow(dead_code)]

use core::arch::{asm, global_asm};

use crate::config::{TaskEntry, DUMMY_XPSR, EXC_RETURN_THREAD_PSP};

const SCB_ICSR: *mut u32 = 0xE000_ED04 as *mut u32;
const ICSR_PENDSVSET: u32 = 1 << 28;

/// Requests a deferred context switch by setting PendSV pending. Safe to
/// call from any exception priority at or above PendSV's (lowest).
pub fn request_switch() {
    unsafe {
        core::ptr::write_volatile(SCB_ICSR, ICSR_PENDSVSET);
    }
}

/// Parks the boot (MSP) stack pointer at `top` before the first task runs.
///
/// # Safety
/// Must only be called once, before interrupts are unmasked, with `top`
/// pointing at the top of a region reserved for the privileged handler stack.
#[inline(always)]
pub unsafe fn set_main_stack(top: u32) {
    unsafe {
        asm!("msr msp, {0}", in(reg) top, options(nomem, nostack, preserves_flags));
    }
}

/// Loads `sp` into the process stack pointer (PSP). PSP is a banked
/// register distinct from the currently-selected `sp` alias, so this is
/// safe to call before `CONTROL.SPSEL` has been switched to PSP.
///
/// # Safety
/// `sp` must point into memory reserved for the task about to run on PSP.
#[inline(always)]
pub unsafe fn set_process_stack(sp: u32) {
    unsafe {
        asm!("msr psp, {0}", in(reg) sp, options(nomem, nostack, preserves_flags));
    }
}

/// Switches Thread-mode stack addressing from MSP to PSP (`CONTROL.SPSEL`)
/// and drops Thread mode to unprivileged (`CONTROL.nPRIV`) in one write.
/// Called once at boot, immediately before jumping into the first task.
/// Handler-mode code (SVC/PendSV/SysTick/faults) is unaffected — `nPRIV`
/// only governs Thread-mode privilege, so exception handlers stay
/// privileged regardless — which is exactly how a user task is meant to
/// reach kernel state only through the SVC gateway (§5).
///
/// # Safety
/// PSP must already have been loaded (see [`set_process_stack`]) with a
/// valid stack pointer for the task about to run.
#[inline(always)]
pub unsafe fn switch_to_psp_unprivileged_thread_mode() {
    unsafe {
        asm!(
            "mrs r0, control",
            "orr r0, r0, #3", // bit0 nPRIV=1 (unprivileged), bit1 SPSEL=1 (PSP)
            "msr control, r0",
            "isb",
            out("r0") _,
            options(nostack, preserves_flags),
        );
    }
}

/// Builds the initial exception frame for a brand-new task at the top of
/// its stack (`stack_top`, exclusive), so that the first PendSV restore
/// "returns" directly into `entry`. Mirrors `init_task_stack` in the
/// teacher, generalized to a dynamically-sized per-task stack instead of a
/// fixed compile-time slice. Returns the resulting PSP value to store in
/// the task's `Tcb::sp`.
///
/// # Safety
/// `[stack_top - 64, stack_top)` must be valid, exclusively-owned memory.
pub unsafe fn synthesize_initial_frame(stack_top: u32, entry: TaskEntry) -> u32 {
    unsafe {
        let mut p = stack_top as *mut u32;

        p = p.offset(-1);
        p.write_volatile(DUMMY_XPSR);

        p = p.offset(-1);
        p.write_volatile(entry as usize as u32);

        p = p.offset(-1);
        p.write_volatile(EXC_RETURN_THREAD_PSP);

        // R12, R3, R2, R1, R0
        for _ in 0..5 {
            p = p.offset(-1);
            p.write_volatile(0);
        }
        // R4-R11
        for _ in 0..8 {
            p = p.offset(-1);
            p.write_volatile(0);
        }

        p as u32
    }
}

// Rust-side hook invoked by the naked PendSV trampoline below with the
// outgoing task's PSP (post-hardware-stacking, pre-r4..r11-push is done by
// the trampoline itself before calling in) and expected to return the
// incoming task's PSP. Defined in `os` where the `Kernel` singleton lives;
// re-exported here under the C name the assembly calls.
unsafe extern "C" {
    fn kernel_on_pend_sv(old_psp: u32) -> u32;
}

global_asm!(
    ".global PendSV",
    ".type PendSV, %function",
    ".thumb_func",
    "PendSV:",
    "    mrs r0, psp",
    "    stmdb r0!, {{r4-r11}}",
    "    bl kernel_on_pend_sv",
    "    ldmia r0!, {{r4-r11}}",
    "    msr psp, r0",
    "    bx lr",
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthesized_frame_lays_out_pc_and_lr_in_the_expected_slots() {
        let mut stack = [0u32; 16];
        let top = unsafe { stack.as_mut_ptr().add(16) } as u32;
        extern "C" fn fake_entry() {}
        let sp = unsafe { synthesize_initial_frame(top, fake_entry) };
        let frame = sp as *const u32;
        unsafe {
            assert_eq!(*frame.add(8), DUMMY_XPSR);
            assert_eq!(*frame.add(7), fake_entry as usize as u32);
            assert_eq!(*frame.add(6), EXC_RETURN_THREAD_PSP);
        }
    }
}
