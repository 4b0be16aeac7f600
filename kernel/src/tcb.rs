//! Task Control Block table.
//!
//! Grounded on `kernel.c`'s `struct _tcb` and `hanifeee535-rust_os`'s
//! `Tcb`/`TASKS` layout, generalized from a 4-entry fixed stack-slice array
//! to an MPU-backed heap allocation per task with full lifecycle state.

use crate::config::{NAME_SIZE, NUM_PRIORITIES};

/// Opaque task identity: the task's entry-point address. No two live tasks
/// may share a `Pid` (mirrors the original's `void* pid = (void*)fn`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pid(pub u32);

impl Pid {
    pub const NULL: Pid = Pid(0);

    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Invalid,
    Stopped,
    Ready,
    Delayed,
    BlockedMutex,
    BlockedSemaphore,
}

/// A bounded ASCII task name, NUL-padded to `NAME_SIZE`.
#[derive(Clone, Copy)]
pub struct TaskName {
    bytes: [u8; NAME_SIZE],
}

impl TaskName {
    pub const EMPTY: TaskName = TaskName { bytes: [0; NAME_SIZE] };

    pub fn from_str(s: &str) -> TaskName {
        let mut bytes = [0u8; NAME_SIZE];
        let src = s.as_bytes();
        let n = src.len().min(NAME_SIZE - 1);
        bytes[..n].copy_from_slice(&src[..n]);
        TaskName { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        let len = self.bytes.iter().position(|&b| b == 0).unwrap_or(NAME_SIZE);
        &self.bytes[..len]
    }

    pub fn eq_ignore_case(&self, other: &[u8]) -> bool {
        let a = self.as_bytes();
        if a.len() != other.len() {
            return false;
        }
        a.iter()
            .zip(other.iter())
            .all(|(x, y)| x.to_ascii_lowercase() == y.to_ascii_lowercase())
    }
}

/// Double-buffered CPU-accounting counters ("ping-pong accounting"): one
/// buffer is written while the other is stable for reading, so `ps` never
/// observes a torn in-progress accumulation.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuClock {
    pub buf_a: u32,
    pub buf_b: u32,
}

impl CpuClock {
    pub fn add(&mut self, ping_pong: bool, cycles: u32) {
        if ping_pong {
            self.buf_b = self.buf_b.wrapping_add(cycles);
        } else {
            self.buf_a = self.buf_a.wrapping_add(cycles);
        }
    }

    /// Reads the *retired* (stable) buffer for the given ping-pong phase:
    /// while `buf_a` is being written, `buf_b` holds last period's total.
    pub fn retired(&self, ping_pong: bool) -> u32 {
        if ping_pong { self.buf_a } else { self.buf_b }
    }

    pub fn clear(&mut self, ping_pong: bool) {
        if ping_pong {
            self.buf_a = 0;
        } else {
            self.buf_b = 0;
        }
    }
}

#[derive(Clone, Copy)]
pub struct Tcb {
    pub state: TaskState,
    pub pid: Pid,
    pub name: TaskName,
    pub sp_init: u32,
    pub sp: u32,
    pub stack_size: u32,
    pub priority: u8,
    pub current_priority: u8,
    pub ticks: u32,
    pub srd_mask: u64,
    pub mutex_ix: Option<usize>,
    pub sem_ix: Option<usize>,
    pub clock: CpuClock,
}

impl Tcb {
    pub const INVALID: Tcb = Tcb {
        state: TaskState::Invalid,
        pid: Pid::NULL,
        name: TaskName::EMPTY,
        sp_init: 0,
        sp: 0,
        stack_size: 0,
        priority: (NUM_PRIORITIES - 1) as u8,
        current_priority: (NUM_PRIORITIES - 1) as u8,
        ticks: 0,
        srd_mask: u64::MAX,
        mutex_ix: None,
        sem_ix: None,
        clock: CpuClock { buf_a: 0, buf_b: 0 },
    };

    pub fn is_live(&self) -> bool {
        self.state != TaskState::Invalid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_round_trips_and_is_bounded() {
        let n = TaskName::from_str("LengthyFn");
        assert_eq!(n.as_bytes(), b"LengthyFn");
    }

    #[test]
    fn name_truncates_overlong_input() {
        let n = TaskName::from_str("ThisNameIsDefinitelyTooLongForTheBuffer");
        assert_eq!(n.as_bytes().len(), NAME_SIZE - 1);
    }

    #[test]
    fn name_case_insensitive_compare() {
        let n = TaskName::from_str("Idle");
        assert!(n.eq_ignore_case(b"idle"));
        assert!(n.eq_ignore_case(b"IDLE"));
        assert!(!n.eq_ignore_case(b"idl"));
    }

    #[test]
    fn cpu_clock_reads_stable_buffer_while_other_accumulates() {
        let mut c = CpuClock::default();
        c.add(false, 100);
        c.add(false, 50);
        assert_eq!(c.retired(true), 150);
        c.add(true, 10);
        assert_eq!(c.retired(true), 150);
    }
}
