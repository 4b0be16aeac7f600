//! SVC dispatch gateway (component C6): the 21-entry syscall table tasks
//! use to request kernel services.
//!
//! Grounded on `original_source/.../kernel.c`'s `svCallIsr`, which decodes
//! the SVC immediate from the two bytes preceding the stacked return
//! address (`*(pc - 2) & 0xFF`) rather than passing the op number in a
//! register — this module keeps that convention: every syscall is a
//! distinct `svc #N` instruction, generated by the `svc_call!` macro below.

#![allow(dead_code)]

use core::arch::{asm, global_asm};

use crate::tcb::Pid;

pub const OP_START: u32 = 0;
pub const OP_YIELD: u32 = 1;
pub const OP_SLEEP: u32 = 2;
pub const OP_LOCK: u32 = 3;
pub const OP_UNLOCK: u32 = 4;
pub const OP_WAIT: u32 = 5;
pub const OP_POST: u32 = 6;
pub const OP_MALLOC: u32 = 7;
pub const OP_IPCS: u32 = 8;
pub const OP_KILL: u32 = 9;
pub const OP_PKILL: u32 = 10;
pub const OP_PIDOF: u32 = 11;
pub const OP_SCHED: u32 = 12;
pub const OP_PREEMPT: u32 = 13;
pub const OP_PI: u32 = 14;
pub const OP_MEMINFO: u32 = 15;
pub const OP_REBOOT: u32 = 16;
pub const OP_RESTART: u32 = 17;
pub const OP_NAME_R: u32 = 18;
pub const OP_SET_PRI: u32 = 19;
pub const OP_PS: u32 = 20;

/// One row of the `PS` report, laid out to match
/// `original_source/.../shell.h`'s `PS_DATA`.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct PsRow {
    pub valid: bool,
    pub pid: u32,
    pub name: [u8; 16],
    pub cpu_percent_x100: u16,
    pub memory_bytes: u16,
    pub state: u8,
    pub mutex_ix: i8,
    pub semaphore_ix: i8,
}

impl PsRow {
    pub const EMPTY: PsRow = PsRow {
        valid: false,
        pid: 0,
        name: [0; 16],
        cpu_percent_x100: 0,
        memory_bytes: 0,
        state: 0,
        mutex_ix: -1,
        semaphore_ix: -1,
    };
}

macro_rules! svc_call {
    ($name:ident, $op:literal) => {
        /// # Safety
        /// Must only be called from task (Thread-mode) context after the
        /// scheduler has started.
        #[inline(always)]
        unsafe fn $name(a0: u32, a1: u32, a2: u32) -> u32 {
            let result: u32;
            unsafe {
                asm!(
                    concat!("svc #", $op),
                    inlateout("r0") a0 => result,
                    in("r1") a1,
                    in("r2") a2,
                    options(nostack),
                );
            }
            result
        }
    };
}

svc_call!(svc_yield, "1");
svc_call!(svc_sleep, "2");
svc_call!(svc_lock, "3");
svc_call!(svc_unlock, "4");
svc_call!(svc_wait, "5");
svc_call!(svc_post, "6");
svc_call!(svc_malloc, "7");
svc_call!(svc_ipcs, "8");
svc_call!(svc_kill, "9");
svc_call!(svc_pkill, "10");
svc_call!(svc_pidof, "11");
svc_call!(svc_sched, "12");
svc_call!(svc_preempt, "13");
svc_call!(svc_pi, "14");
svc_call!(svc_meminfo, "15");
svc_call!(svc_reboot, "16");
svc_call!(svc_restart, "17");
svc_call!(svc_name_r, "18");
svc_call!(svc_set_pri, "19");
svc_call!(svc_ps, "20");

/// Starts the RTOS: called once from `main`, before the scheduler's first
/// task has been selected. Never returns.
///
/// `OP_START` exists in the syscall numbering for documentation parity with
/// the rest of the table, but booting is a privileged, pre-emption-free
/// action taken from the reset handler's own Thread-mode call stack (the
/// same shortcut the teacher's `scheduler_init` takes) rather than a real
/// `svc` trap: there is no previous task context to trap back into.
pub fn start() -> ! {
    crate::os::boot()
}

pub fn yield_now() {
    unsafe {
        svc_yield(0, 0, 0);
    }
}

pub fn sleep_ms(ms: u32) {
    unsafe {
        svc_sleep(ms, 0, 0);
    }
}

pub fn lock(mutex_ix: u32) {
    unsafe {
        svc_lock(mutex_ix, 0, 0);
    }
}

pub fn unlock(mutex_ix: u32) {
    unsafe {
        svc_unlock(mutex_ix, 0, 0);
    }
}

pub fn wait(semaphore_ix: u32) {
    unsafe {
        svc_wait(semaphore_ix, 0, 0);
    }
}

pub fn post(semaphore_ix: u32) {
    unsafe {
        svc_post(semaphore_ix, 0, 0);
    }
}

/// Requests `size` bytes from the task heap. Returns a null pointer on
/// failure — the only failure signal the external syscall contract exposes.
pub fn malloc(size: u32) -> *mut u8 {
    unsafe { svc_malloc(size, 0, 0) as *mut u8 }
}

pub fn kill(pid: u32) {
    unsafe {
        svc_kill(pid, 0, 0);
    }
}

pub fn pkill(name_ptr: *const u8, name_len: u32) {
    unsafe {
        svc_pkill(name_ptr as u32, name_len, 0);
    }
}

/// Looks up a task by name. Returns `Pid::NULL` if no live task matches.
pub fn pidof(name_ptr: *const u8, name_len: u32) -> Pid {
    let raw = unsafe { svc_pidof(name_ptr as u32, name_len, 0) };
    Pid(raw)
}

pub fn sched_round_robin(round_robin: bool) {
    unsafe {
        svc_sched(round_robin as u32, 0, 0);
    }
}

pub fn preempt(enabled: bool) {
    unsafe {
        svc_preempt(enabled as u32, 0, 0);
    }
}

pub fn priority_inheritance(enabled: bool) {
    unsafe {
        svc_pi(enabled as u32, 0, 0);
    }
}

/// Asks the kernel to render the heap ledger and free space to the console.
pub fn meminfo() {
    unsafe {
        svc_meminfo(0, 0, 0);
    }
}

/// Asks the kernel to render mutex and semaphore state to the console.
pub fn ipcs() {
    unsafe {
        svc_ipcs(0, 0, 0);
    }
}

pub fn reboot() -> ! {
    unsafe {
        svc_reboot(0, 0, 0);
    }
    loop {}
}

pub fn restart(pid: u32) {
    unsafe {
        svc_restart(pid, 0, 0);
    }
}

/// Restarts the named `Stopped` task (the shell's bare-task-name affordance).
/// No-op if no live task matches `name` or it isn't currently `Stopped`.
pub fn restart_by_name(name_ptr: *const u8, name_len: u32) {
    unsafe {
        svc_name_r(name_ptr as u32, name_len, 0);
    }
}

pub fn set_priority(pid: u32, priority: u32) {
    unsafe {
        svc_set_pri(pid, priority, 0);
    }
}

/// Fills `out` with one row per live task and returns the count written.
pub fn ps(out: &mut [PsRow]) -> u32 {
    unsafe { svc_ps(out.as_mut_ptr() as u32, out.len() as u32, 0) }
}

// ---------------------------------------------------------------------------
// The handler itself
// ---------------------------------------------------------------------------

global_asm!(
    ".global SVCall",
    ".type SVCall, %function",
    ".thumb_func",
    "SVCall:",
    "    tst lr, #4",
    "    ite eq",
    "    mrseq r0, msp",
    "    mrsne r0, psp",
    "    b svc_dispatch_entry",
);

/// Reads the stacked exception frame, decodes the SVC immediate from the
/// instruction that trapped, runs the requested operation against the
/// `Kernel` singleton, and writes the result back into the stacked r0 so it
/// is visible to the task once the exception returns.
///
/// # Safety
/// `frame` must point at a valid Cortex-M exception stack frame
/// (r0, r1, r2, r3, r12, lr, pc, xpsr) produced by automatic stacking.
#[unsafe(no_mangle)]
unsafe extern "C" fn svc_dispatch_entry(frame: *mut u32) {
    unsafe {
        let pc = *frame.add(6);
        let instr = *(((pc & !1) as *const u16).offset(-1));
        let op = (instr & 0xFF) as u32;
        let a0 = *frame;
        let a1 = *frame.add(1);
        let a2 = *frame.add(2);
        let result = crate::os::dispatch_svc(op, a0, a1, a2);
        *frame = result;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn op_constants_are_0_through_20_with_no_gaps() {
        let ops = [
            OP_START, OP_YIELD, OP_SLEEP, OP_LOCK, OP_UNLOCK, OP_WAIT, OP_POST, OP_MALLOC,
            OP_IPCS, OP_KILL, OP_PKILL, OP_PIDOF, OP_SCHED, OP_PREEMPT, OP_PI, OP_MEMINFO,
            OP_REBOOT, OP_RESTART, OP_NAME_R, OP_SET_PRI, OP_PS,
        ];
        for (i, op) in ops.iter().enumerate() {
            assert_eq!(*op, i as u32);
        }
    }
}
