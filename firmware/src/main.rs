#![no_std]
#![no_main]
#![allow(clippy::empty_loop)]

mod button;
mod led;
mod shell;
mod tasks;

use cortex_m_rt::entry;
use panic_halt as _;

use kernel::os;
use kernel::svc;

use led::init_led;

const IDLE_STACK_BYTES: u32 = 512;
const IMPORTANT_STACK_BYTES: u32 = 1024;
const LENGTHY_FN_STACK_BYTES: u32 = 1024;
const FLASH4HZ_STACK_BYTES: u32 = 512;
const SHELL_STACK_BYTES: u32 = 1024;

/// Registers every task the image ships with, then hands control to the
/// scheduler. Mirrors SPEC_FULL §8 scenario 1/2/3: `Idle` at the lowest
/// priority, `Important` at the highest holding the shared mutex briefly,
/// `LengthyFn` at a middle priority to demonstrate preemption, and
/// `Flash4Hz` sleeping 125 ticks between toggles. `Shell` gives the console
/// a way to drive KILL/PKILL/RESTART/SCHED/PI/PREEMPT live.
#[entry]
fn main() -> ! {
    init_led();
    button::init_user_button();

    os::spawn_idle(tasks::idle_task, IDLE_STACK_BYTES).expect("spawn Idle");
    os::spawn(tasks::important_task, "Important", 0, IMPORTANT_STACK_BYTES)
        .expect("spawn Important");
    os::spawn(tasks::lengthy_fn_task, "LengthyFn", 12, LENGTHY_FN_STACK_BYTES)
        .expect("spawn LengthyFn");
    os::spawn(tasks::flash4hz_task, "Flash4Hz", 8, FLASH4HZ_STACK_BYTES)
        .expect("spawn Flash4Hz");
    os::spawn(shell::shell_task, "Shell", 10, SHELL_STACK_BYTES).expect("spawn Shell");

    svc::start();
}
