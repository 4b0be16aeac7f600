//! The kernel singleton: task table, scheduler state, and the entry points
//! the exception handlers and SVC dispatcher call into.
//!
//! Grounded on `hanifeee535-rust_os`'s `os.rs` (`scheduler_init`,
//! `update_to_next_task`, the `PendSV`/`SysTick` `#[exception]` handlers,
//! the `static mut TASKS`/`CURRENT_TASK_IDX` globals) and
//! `original_source/.../kernel.c`'s `initRtos`/`startRtos`/`createThread`/
//! `killThread`/`svCallIsr`. Where the teacher used a fixed 4-entry
//! `TASKS: [Tcb; MAX_TASK]` array of compile-time stack slices, this module
//! generalizes to dynamically-sized, heap-backed per-task stacks sized at
//! `create_thread` time (SPEC_FULL §4.5).

#![allow(clippy::empty_loop)]
#![allow(dead_code)]

use cortex_m::interrupt;
use cortex_m_rt::exception;

use crate::config::{
    KERNEL_TICK_PERIOD_MS, MAX_TASKS, NUM_PRIORITIES, PROCESS_STACK_TOP, TASK_CPU_TIME_PERIOD_MS,
};
use crate::console;
use crate::context;
use crate::error::{KernelError, KernelResult};
use crate::mm::{self, Heap};
use crate::sched::{Scheduler, SchedulingPolicy};
use crate::sync::{AcquireOutcome, MutexTable, SemaphoreTable};
use crate::svc::{self, PsRow};
use crate::systick::SysTick;
use crate::tcb::{CpuClock, Pid, TaskName, TaskState, Tcb};

pub const CORE_CLOCK_MHZ: u32 = crate::config::CORE_CLOCK_HZ / 1_000_000;

/// Default per-task stack size when the caller doesn't need a specific one.
pub const DEFAULT_STACK_BYTES: u32 = 1024;

pub struct Kernel {
    tasks: [Tcb; MAX_TASKS],
    heap: Heap,
    mutexes: MutexTable,
    semaphores: SemaphoreTable,
    scheduler: Scheduler,
    current: usize,
    idle_ix: Option<usize>,
    ping_pong: bool,
    ms_in_period: u32,
    last_switch_ms: u32,
    preempt_enabled: bool,
    priority_inheritance_enabled: bool,
    /// Set by the MemManage fault handler when a task overruns its MPU
    /// window; consumed by the next PendSV before picking a new task.
    pending_fault_kill: Option<usize>,
}

impl Kernel {
    const fn new() -> Kernel {
        Kernel {
            tasks: [Tcb::INVALID; MAX_TASKS],
            heap: Heap::new(),
            mutexes: MutexTable::new(),
            semaphores: SemaphoreTable::new([0; crate::config::MAX_SEMAPHORES]),
            scheduler: Scheduler::new(SchedulingPolicy::Priority),
            current: 0,
            idle_ix: None,
            ping_pong: false,
            ms_in_period: 0,
            last_switch_ms: 0,
            preempt_enabled: true,
            priority_inheritance_enabled: true,
            pending_fault_kill: None,
        }
    }

    fn find_free_slot(&self) -> Option<usize> {
        self.tasks.iter().position(|t| !t.is_live())
    }

    fn find_by_pid(&self, pid: Pid) -> Option<usize> {
        self.tasks.iter().position(|t| t.is_live() && t.pid == pid)
    }

    fn find_by_name(&self, name: &[u8]) -> Option<usize> {
        self.tasks.iter().position(|t| t.is_live() && t.name.eq_ignore_case(name))
    }

    /// Registers a new task. `stack_bytes` is rounded up by the heap
    /// suballocator to its subregion granularity. The first task registered
    /// becomes the idle task iff `is_idle` is set; there must be exactly one.
    fn create_thread(
        &mut self,
        entry: crate::config::TaskEntry,
        name: &str,
        priority: u8,
        stack_bytes: u32,
        is_idle: bool,
    ) -> KernelResult<Pid> {
        let pid = Pid(entry as usize as u32);
        if self.find_by_pid(pid).is_some() {
            return Err(KernelError::DuplicateEntryPoint);
        }
        let ix = self.find_free_slot().ok_or(KernelError::NoFreeSlot)?;

        let base = self.heap.alloc(stack_bytes, pid)?;
        let stack_top = base + stack_bytes;
        let sp = unsafe { context::synthesize_initial_frame(stack_top, entry) };

        let mut srd_mask = mm::make_deny_all();
        mm::add_window(&mut srd_mask, base, stack_bytes);

        let priority = priority.min((NUM_PRIORITIES - 1) as u8);
        self.tasks[ix] = Tcb {
            state: TaskState::Ready,
            pid,
            name: TaskName::from_str(name),
            sp_init: sp,
            sp,
            stack_size: stack_bytes,
            priority,
            current_priority: priority,
            ticks: 0,
            srd_mask,
            mutex_ix: None,
            sem_ix: None,
            clock: CpuClock::default(),
        };

        if is_idle {
            self.idle_ix = Some(ix);
        }

        Ok(pid)
    }

    /// Stops task `ix`: removes it from every wait queue it sits in, hands
    /// off any mutex it held to the next waiter, frees its stack block and
    /// every heap allocation it owns, and transitions it to `Stopped`. The
    /// slot itself is *not* freed here — `pid`/`name`/`priority`/
    /// `stack_size` survive so RESTART/NAME_R can find and re-arm it; the
    /// slot is only actually destroyed when a later `restart_index` call
    /// re-allocates it (SPEC_FULL §3 Lifecycle: STOPPED is freeable,
    /// DESTROYED happens implicitly on restart).
    fn kill_index(&mut self, ix: usize) {
        if Some(ix) == self.idle_ix {
            return; // the idle task is never killable
        }
        let pid = self.tasks[ix].pid;
        self.mutexes.purge_waiter(pid);
        self.semaphores.purge_waiter(pid);

        let released = self.mutexes.release_owned_by(pid);
        for &(mix, next_pid) in released.iter() {
            if let Some(next) = next_pid {
                if let Some(next_ix) = self.find_by_pid(next) {
                    self.tasks[next_ix].state = TaskState::Ready;
                    self.tasks[next_ix].mutex_ix = None;
                    let base = self.tasks[next_ix].priority;
                    let _ = self.mutexes.set_new_owner_base_priority(mix, base);
                }
            }
        }

        self.heap.free_all_owned_by(pid);
        self.tasks[ix].state = TaskState::Stopped;
        self.tasks[ix].mutex_ix = None;
        self.tasks[ix].sem_ix = None;
        self.tasks[ix].srd_mask = mm::make_deny_all();
        if self.current == ix {
            context::request_switch();
        }
    }

    /// Tears down a `Stopped` task's slot and re-creates it from its saved
    /// identity (same entry point / name / priority / stack size), used by
    /// RESTART and NAME_R. No-op if `ix` isn't actually `Stopped`.
    fn restart_index(&mut self, ix: usize) -> KernelResult<()> {
        if self.tasks[ix].state != TaskState::Stopped {
            return Err(KernelError::NoSuchTask);
        }
        let entry: crate::config::TaskEntry =
            unsafe { core::mem::transmute(self.tasks[ix].pid.0 as usize) };
        let name = self.tasks[ix].name;
        let priority = self.tasks[ix].priority;
        let stack_bytes = self.tasks[ix].stack_size;
        self.tasks[ix] = Tcb::INVALID;
        let name_str = core::str::from_utf8(name.as_bytes()).unwrap_or("");
        self.create_thread(entry, name_str, priority, stack_bytes, false)?;
        Ok(())
    }
}

static mut KERNEL: Kernel = Kernel::new();

fn with_kernel<R>(f: impl FnOnce(&mut Kernel) -> R) -> R {
    interrupt::free(|_| unsafe { f(&mut *core::ptr::addr_of_mut!(KERNEL)) })
}

/// Registers a task before the scheduler has started. Intended to be
/// called from `main`, once per task, before `svc::start()`.
pub fn spawn(
    entry: crate::config::TaskEntry,
    name: &str,
    priority: u8,
    stack_bytes: u32,
) -> KernelResult<Pid> {
    with_kernel(|k| k.create_thread(entry, name, priority, stack_bytes, false))
}

/// Registers the idle task. Must be called exactly once; the idle task is
/// immune to KILL/PKILL and always has somewhere to run.
pub fn spawn_idle(entry: crate::config::TaskEntry, stack_bytes: u32) -> KernelResult<Pid> {
    with_kernel(|k| {
        k.create_thread(entry, "Idle", (NUM_PRIORITIES - 1) as u8, stack_bytes, true)
    })
}

/// Programs the five fixed MPU regions the heap allocator doesn't manage
/// itself: region 0 (flash), region 1 (peripherals), region 2 (the 4 KiB
/// OS-kernel-reserved window just below the heap). Heap regions 3..7 are
/// also enabled here with every subregion initially disabled (SRD = 0xFF);
/// [`mm::apply`] narrows that per task on every context switch.
///
/// Grounded on `original_source/.../mm.c`'s `allowFlashAccess`,
/// `allowPeripheralAccess`, and `setupSramAccess`. The AP/XN encoding
/// collapses the original's "privileged rwx, user rx" flash intent into a
/// single full-access-both-privileges region: ARMv7-M's AP/XN fields can't
/// express a different execute permission per privilege level, and a
/// write-protected flash region buys nothing once code is already running
/// from it (see DESIGN.md).
fn configure_mpu() {
    use drivers::stm32f407_registers::*;
    use drivers::read_write::{read_register, write_register};

    const AP_PRIV_RW_USER_NONE: u32 = 0b001;
    const AP_FULL_ACCESS: u32 = 0b011;
    const XN: u32 = 1 << 28;
    const ENABLE: u32 = 1;

    fn region_size_field(bytes: u32) -> u32 {
        // RASR SIZE field N encodes a region of 2^(N+1) bytes.
        (31 - bytes.leading_zeros()) - 1
    }

    fn program_region(number: u32, base: u32, size_bytes: u32, ap: u32, xn: u32, srd: u32) {
        unsafe {
            write_register(MPU_RNR as *mut u32, number);
            write_register(MPU_RBAR as *mut u32, base);
            let rasr = ENABLE
                | (region_size_field(size_bytes) << 1)
                | (srd << 8)
                | (ap << 24)
                | xn;
            write_register(MPU_RASR as *mut u32, rasr);
        }
    }

    const FLASH_BASE: u32 = 0x0800_0000;
    const FLASH_SIZE: u32 = 1024 * 1024;
    const PERIPHERAL_BASE: u32 = 0x4000_0000;
    const PERIPHERAL_SIZE: u32 = 512 * 1024 * 1024;
    const OS_KERNEL_BASE: u32 = crate::config::HEAP_BASE - 4096;
    const OS_KERNEL_SIZE: u32 = 4096;

    program_region(0, FLASH_BASE, FLASH_SIZE, AP_FULL_ACCESS, 0, 0);
    program_region(1, PERIPHERAL_BASE, PERIPHERAL_SIZE, AP_FULL_ACCESS, XN, 0);
    program_region(2, OS_KERNEL_BASE, OS_KERNEL_SIZE, AP_PRIV_RW_USER_NONE, XN, 0);

    let heap_region_bytes: [u32; 5] = [4096, 8192, 4096, 4096, 8192];
    let mut addr = crate::config::HEAP_BASE;
    for (i, &size) in heap_region_bytes.iter().enumerate() {
        program_region((3 + i) as u32, addr, size, AP_FULL_ACCESS, XN, 0xFF);
        addr += size;
    }

    unsafe {
        write_register(MPU_CTRL as *mut u32, MPU_CTRL_ENABLE | MPU_CTRL_PRIVDEFENA);
        let shcsr = read_register(SCB_SHCSR as *mut u32);
        write_register(
            SCB_SHCSR as *mut u32,
            shcsr | SHCSR_MEMFAULTENA | SHCSR_BUSFAULTENA | SHCSR_USGFAULTENA,
        );
    }
}

/// Boots the scheduler: programs exception priorities, starts SysTick, and
/// jumps into the first selected task via a direct call (not an exception
/// return — see the note on `svc::start`).
pub fn boot() -> ! {
    unsafe {
        context::set_main_stack(PROCESS_STACK_TOP);

        let shpr3 = 0xE000_ED20 as *mut u32;
        let mut v = core::ptr::read_volatile(shpr3);
        v &= !((0xFFu32 << 16) | (0xFFu32 << 24));
        v |= (0xFFu32 << 16) | (0xF0u32 << 24); // PendSV lowest, SysTick above it
        core::ptr::write_volatile(shpr3, v);

        let fpccr = 0xE000_EF34 as *mut u32;
        let vv = core::ptr::read_volatile(fpccr);
        core::ptr::write_volatile(fpccr, (vv | (1 << 31)) & !(1 << 30));

        configure_mpu();
        console::init(crate::config::CORE_CLOCK_HZ, 115_200);

        let mut systick = SysTick::take().expect("SysTick already taken");
        systick.init_systic_interrupt_ms(KERNEL_TICK_PERIOD_MS, CORE_CLOCK_MHZ);

        let (entry, stack_top) = with_kernel(|k| {
            let idle_ix = k.idle_ix.expect("spawn_idle must run before boot");
            let first = k.scheduler.pick_next(&k.tasks, idle_ix);
            k.current = first;
            mm::apply(k.tasks[first].srd_mask);
            (k.tasks[first].pid.0, k.tasks[first].sp_init)
        });

        // Load PSP with the first task's saved stack pointer before
        // switching Thread-mode stack addressing to it and dropping to
        // unprivileged execution — the "restore" SPEC_FULL §4.4 row 0
        // (START) requires. `sp_init` sits 64 bytes below the top of the
        // task's stack (the synthesized initial frame occupies the 64
        // bytes above it); this direct call, unlike every later context
        // switch, runs the entry point without popping that frame, so
        // those bytes are simply unused rather than corrupted.
        context::set_process_stack(stack_top);
        context::switch_to_psp_unprivileged_thread_mode();
        let entry_fn: crate::config::TaskEntry = core::mem::transmute(entry as usize);
        entry_fn();
    }
    loop {}
}

// ---------------------------------------------------------------------------
// PendSV: deferred context switch
// ---------------------------------------------------------------------------

/// Called by the naked `PendSV` trampoline in `context` with the outgoing
/// task's PSP (after r4-r11 were pushed). Returns the PSP to restore for
/// the incoming task.
#[unsafe(no_mangle)]
extern "C" fn kernel_on_pend_sv(old_psp: u32) -> u32 {
    with_kernel(|k| {
        let idle_ix = k.idle_ix.expect("PendSV fired before boot");

        if let Some(faulted) = k.pending_fault_kill.take() {
            k.kill_index(faulted);
        } else {
            k.tasks[k.current].sp = old_psp;
            if k.tasks[k.current].state == TaskState::Ready {
                // still runnable, just preempted or yielded
            }
        }

        let next = k.scheduler.pick_next(&k.tasks, idle_ix);
        k.current = next;
        mm::apply(k.tasks[next].srd_mask);
        k.tasks[next].sp
    })
}

// PendSV itself is the naked `context::PendSV` symbol (a `global_asm!`
// trampoline), not a `#[exception]` function: cortex-m-rt's vector table
// resolves exception handlers by symbol name, and a bare `.global PendSV`
// label overrides its default weak handler just as well as the macro would,
// while letting us control register save/restore by hand.

// ---------------------------------------------------------------------------
// SysTick: 1ms periodic accounting
// ---------------------------------------------------------------------------

#[exception]
fn SysTick() {
    with_kernel(|k| {
        for t in k.tasks.iter_mut() {
            if t.state == TaskState::Delayed {
                t.ticks = t.ticks.saturating_sub(1);
                if t.ticks == 0 {
                    t.state = TaskState::Ready;
                }
            }
        }

        k.ms_in_period += KERNEL_TICK_PERIOD_MS;
        if k.ms_in_period >= TASK_CPU_TIME_PERIOD_MS {
            k.ms_in_period = 0;
            k.ping_pong = !k.ping_pong;
            for t in k.tasks.iter_mut() {
                t.clock.clear(k.ping_pong);
            }
        }
        k.tasks[k.current].clock.add(k.ping_pong, KERNEL_TICK_PERIOD_MS);
    });

    context::request_switch();
}

/// Called from the MemManage fault handler (`fault`) with the index of a
/// task whose stack access violated its SRD window. Schedules it to be
/// torn down on the next PendSV rather than killing it from fault context.
pub fn request_fault_kill(task_ix: usize) {
    with_kernel(|k| k.pending_fault_kill = Some(task_ix));
    context::request_switch();
}

/// Finds which live task (if any) owns the heap allocation containing
/// `faulting_addr`, used by the fault handler to resolve a task index from
/// a bad stack pointer.
pub fn task_index_for_address(faulting_addr: u32) -> Option<usize> {
    with_kernel(|k| {
        let pid = k.heap.find_owner_by_faulting_sp(faulting_addr)?;
        k.find_by_pid(pid)
    })
}

// ---------------------------------------------------------------------------
// SVC dispatch
// ---------------------------------------------------------------------------

fn print_decimal(label: &str, value: u32) {
    let mut buf = [0u8; 10];
    let digits = crate::fmt::num_to_str(value, &mut buf);
    console::write_str(label);
    console::write_bytes(digits);
    console::write_str("\n");
}

/// Renders the heap ledger (used/free bytes and the live allocation count)
/// to the console, the behavior SPEC_FULL §4.4 assigns directly to MEMINFO.
fn render_meminfo(k: &Kernel) {
    console::write_str("\n");
    print_decimal("heap used (bytes):      ", k.heap.used_space());
    print_decimal("heap free (bytes):      ", k.heap.free_space());
    print_decimal("live tasks:             ", k.tasks.iter().filter(|t| t.is_live()).count() as u32);
}

/// Renders mutex and semaphore state to the console, the behavior
/// SPEC_FULL §4.4 assigns directly to IPCS.
fn render_ipcs(k: &Kernel) {
    console::write_str("\nmutexes:\n");
    for ix in 0..crate::config::MAX_MUTEXES {
        let m = match k.mutexes.get(ix) {
            Ok(m) => m,
            Err(_) => continue,
        };
        print_decimal("  mutex index:          ", ix as u32);
        print_decimal("  locked:               ", m.locked as u32);
        print_decimal("  owner pid:            ", m.owner.0);
        print_decimal("  waiters:              ", m.queue_len() as u32);
    }
    console::write_str("semaphores:\n");
    for ix in 0..crate::config::MAX_SEMAPHORES {
        let s = match k.semaphores.get(ix) {
            Ok(s) => s,
            Err(_) => continue,
        };
        print_decimal("  semaphore index:      ", ix as u32);
        print_decimal("  count:                ", s.count);
        print_decimal("  waiters:              ", s.queue_len() as u32);
    }
}

fn block_current(k: &mut Kernel, state: TaskState) {
    k.tasks[k.current].state = state;
    context::request_switch();
}

/// Runs the syscall named by `op` against the kernel singleton. Called only
/// from `svc::svc_dispatch_entry`.
pub(crate) fn dispatch_svc(op: u32, a0: u32, a1: u32, a2: u32) -> u32 {
    with_kernel(|k| match op {
        svc::OP_YIELD => {
            context::request_switch();
            0
        }
        svc::OP_SLEEP => {
            k.tasks[k.current].ticks = a0;
            block_current(k, TaskState::Delayed);
            0
        }
        svc::OP_LOCK => {
            let ix = a0 as usize;
            let caller = k.tasks[k.current].pid;
            let caller_priority = k.tasks[k.current].current_priority;
            match k.mutexes.lock(ix, caller, caller_priority, k.priority_inheritance_enabled) {
                Ok((AcquireOutcome::Acquired, _)) => {
                    k.tasks[k.current].mutex_ix = Some(ix);
                    0
                }
                Ok((AcquireOutcome::Blocked, promotion)) => {
                    if let Some((holder_pid, new_priority)) = promotion {
                        if let Some(holder_ix) = k.find_by_pid(holder_pid) {
                            k.tasks[holder_ix].current_priority = new_priority;
                        }
                    }
                    k.tasks[k.current].mutex_ix = Some(ix);
                    block_current(k, TaskState::BlockedMutex);
                    0
                }
                // Queue overflow (§7): the task is not enqueued, but a
                // PendSV is still requested so the caller doesn't busy-spin.
                // A bad index stays effect-free.
                Err(KernelError::QueueFull) => {
                    context::request_switch();
                    0
                }
                Err(_) => 0,
            }
        }
        svc::OP_UNLOCK => {
            let ix = a0 as usize;
            let caller = k.tasks[k.current].pid;
            let base_priority = k.tasks[k.current].priority;
            match k.mutexes.unlock(ix, caller) {
                Ok((_, next_pid)) => {
                    k.tasks[k.current].current_priority = base_priority;
                    k.tasks[k.current].mutex_ix = None;
                    if let Some(next) = next_pid {
                        if let Some(next_ix) = k.find_by_pid(next) {
                            k.tasks[next_ix].state = TaskState::Ready;
                            k.tasks[next_ix].mutex_ix = None;
                            let _ = k.mutexes.set_new_owner_base_priority(ix, k.tasks[next_ix].priority);
                        }
                    }
                }
                // Protocol violation (§7): UNLOCK by a task that doesn't
                // hold the mutex kills the offender. A bad mutex index is
                // not a protocol violation and "returns without effect".
                Err(KernelError::NotOwner) => {
                    let current = k.current;
                    k.kill_index(current);
                }
                Err(_) => {}
            }
            0
        }
        svc::OP_WAIT => {
            let ix = a0 as usize;
            let caller = k.tasks[k.current].pid;
            match k.semaphores.wait(ix, caller) {
                Ok(AcquireOutcome::Acquired) => 0,
                Ok(AcquireOutcome::Blocked) => {
                    k.tasks[k.current].sem_ix = Some(ix);
                    block_current(k, TaskState::BlockedSemaphore);
                    0
                }
                // Queue overflow (§7): not enqueued, but PendSV is still
                // requested so the caller doesn't busy-spin.
                Err(KernelError::QueueFull) => {
                    context::request_switch();
                    0
                }
                Err(_) => 0,
            }
        }
        svc::OP_POST => {
            let ix = a0 as usize;
            if let Ok(Some(woken)) = k.semaphores.post(ix) {
                if let Some(woken_ix) = k.find_by_pid(woken) {
                    k.tasks[woken_ix].state = TaskState::Ready;
                    k.tasks[woken_ix].sem_ix = None;
                }
            }
            0
        }
        svc::OP_MALLOC => {
            let owner = k.tasks[k.current].pid;
            match k.heap.alloc(a0, owner) {
                Ok(base) => {
                    // Grant the caller's SRD mask access to exactly the
                    // subregions this allocation occupies (its rounded
                    // size, which may exceed the requested `a0`).
                    if let Some((_, size)) = k.heap.iter_owned_by(owner).find(|&(b, _)| b == base) {
                        mm::add_window(&mut k.tasks[k.current].srd_mask, base, size);
                    }
                    base
                }
                Err(_) => 0,
            }
        }
        svc::OP_KILL => {
            if let Some(ix) = k.find_by_pid(Pid(a0)) {
                k.kill_index(ix);
            }
            0
        }
        svc::OP_PKILL => {
            let name = unsafe { core::slice::from_raw_parts(a0 as *const u8, a1 as usize) };
            if let Some(ix) = k.find_by_name(name) {
                k.kill_index(ix);
            }
            0
        }
        svc::OP_PIDOF => {
            let name = unsafe { core::slice::from_raw_parts(a0 as *const u8, a1 as usize) };
            k.find_by_name(name).map(|ix| k.tasks[ix].pid.0).unwrap_or(0)
        }
        svc::OP_RESTART => {
            if let Some(ix) = k.find_by_pid(Pid(a0)) {
                let _ = k.restart_index(ix);
            }
            0
        }
        svc::OP_SCHED => {
            k.scheduler.set_policy(if a0 != 0 {
                SchedulingPolicy::RoundRobin
            } else {
                SchedulingPolicy::Priority
            });
            0
        }
        svc::OP_PREEMPT => {
            k.preempt_enabled = a0 != 0;
            0
        }
        svc::OP_PI => {
            k.priority_inheritance_enabled = a0 != 0;
            0
        }
        svc::OP_SET_PRI => {
            if let Some(ix) = k.find_by_pid(Pid(a0)) {
                let p = (a1 as u8).min((NUM_PRIORITIES - 1) as u8);
                k.tasks[ix].priority = p;
                k.tasks[ix].current_priority = p;
            }
            0
        }
        svc::OP_MEMINFO => {
            render_meminfo(k);
            0
        }
        svc::OP_NAME_R => {
            // RESTART resolved by name rather than pid (the shell's "bare
            // task name restarts it" affordance).
            let name = unsafe { core::slice::from_raw_parts(a0 as *const u8, a1 as usize) };
            if let Some(ix) = k.find_by_name(name) {
                let _ = k.restart_index(ix);
            }
            0
        }
        svc::OP_PS => {
            let out = unsafe { core::slice::from_raw_parts_mut(a0 as *mut PsRow, a1 as usize) };
            let mut n = 0usize;
            for t in k.tasks.iter() {
                if n >= out.len() {
                    break;
                }
                if !t.is_live() {
                    continue;
                }
                let mut row = PsRow::EMPTY;
                row.valid = true;
                row.pid = t.pid.0;
                let name = t.name.as_bytes();
                row.name[..name.len()].copy_from_slice(name);
                row.cpu_percent_x100 =
                    ((t.clock.retired(k.ping_pong) as u64 * 10_000) / TASK_CPU_TIME_PERIOD_MS as u64) as u16;
                row.memory_bytes = t.stack_size.min(u16::MAX as u32) as u16;
                row.state = t.state as u8;
                row.mutex_ix = t.mutex_ix.map(|i| i as i8).unwrap_or(-1);
                row.semaphore_ix = t.sem_ix.map(|i| i as i8).unwrap_or(-1);
                out[n] = row;
                n += 1;
            }
            n as u32
        }
        svc::OP_IPCS => {
            render_ipcs(k);
            0
        }
        svc::OP_REBOOT => cortex_m::peripheral::SCB::sys_reset(),
        _ => 0,
    })
}
