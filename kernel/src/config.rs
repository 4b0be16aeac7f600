//! # Kernel configuration for Cortex-M4 microcontrollers
//!
//! Central `pub const` tunables for the scheduler, the MPU heap suballocator,
//! and the synchronization primitives, designed to work on any Cortex-M4 MCU
//! with an MPU (e.g. STM32F407, TM4C123).
//!
//! ## Adapting to a target MCU
//! - Adjust `MAX_TASKS` and `NUM_PRIORITIES` to the application.
//! - `HEAP_BASE`/`HEAP_SIZE` must sit inside the part's SRAM and must not
//!   overlap the process-stack base (`PROCESS_STACK_TOP`).
//! - `CORE_CLOCK_HZ` feeds the SysTick reload computation.

#![allow(dead_code)]

/// Kernel tick period in milliseconds. Lower means more frequent preemption checks.
pub const KERNEL_TICK_PERIOD_MS: u32 = 1;

/// Maximum number of concurrent task slots.
pub const MAX_TASKS: usize = 10;

/// Number of distinct priority levels; 0 is highest, NUM_PRIORITIES-1 is lowest.
pub const NUM_PRIORITIES: usize = 16;

/// Bytes reserved for a task name, including the NUL terminator.
pub const NAME_SIZE: usize = 16;

/// Number of mutex slots.
pub const MAX_MUTEXES: usize = 1;

/// Maximum tasks that may simultaneously wait on a single mutex.
pub const MAX_MUTEX_QUEUE_SIZE: usize = 9;

/// Number of semaphore slots.
pub const MAX_SEMAPHORES: usize = 3;

/// Maximum tasks that may simultaneously wait on a single semaphore.
pub const MAX_SEMAPHORE_QUEUE_SIZE: usize = 9;

/// Number of heap ledger entries (live allocations tracked simultaneously).
pub const MAX_ALLOCATIONS: usize = 14;

/// Milliseconds per CPU-accounting period; counters reset (and ping-pong flips)
/// once this many ticks have elapsed.
pub const TASK_CPU_TIME_PERIOD_MS: u32 = 2000;

/// Core clock used to program SysTick (Hz). 16 MHz matches the STM32F407 HSI default.
pub const CORE_CLOCK_HZ: u32 = 16_000_000;

// ---------------------------------------------------------------------------
// Memory map
// ---------------------------------------------------------------------------

/// Base address of the 28 KiB task heap (region 3 of the MPU layout, just
/// above the 4 KiB OS-kernel-reserved region).
pub const HEAP_BASE: u32 = 0x2000_1000;

/// Total size of the task heap in bytes: five regions of {4K,8K,4K,4K,8K}.
pub const HEAP_SIZE: u32 = 28 * 1024;

pub const HEAP_END: u32 = HEAP_BASE + HEAP_SIZE;

/// Top of the process-stack region; `startRtos` parks the privileged MSP
/// boot stack here before the first SVC START.
pub const PROCESS_STACK_TOP: u32 = HEAP_END;

/// Largest single allocation the suballocator will satisfy (in bytes).
pub const MAX_ALLOCATION_BYTES: u32 = 8 * 1024;

/// Default xPSR value written into a synthesized exception frame (Thumb bit set).
pub const DUMMY_XPSR: u32 = 0x0100_0000;

/// Exception-return value (EXC_RETURN) for "return to Thread mode using PSP,
/// no floating-point state" — written into LR when synthesizing a new task frame.
pub const EXC_RETURN_THREAD_PSP: u32 = 0xFFFF_FFFD;

/// Task entry-point ABI: tasks are plain `extern "C"` functions taking no
/// arguments and never returning (a task that falls off its function should
/// idle-loop; the kernel does not support task exit).
pub type TaskEntry = unsafe extern "C" fn();
