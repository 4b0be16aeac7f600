//! Task scheduler (component C4).
//!
//! Grounded on `original_source/.../kernel.c`'s `rtosScheduler` and
//! `hanifeee535-rust_os`'s `update_to_next_task`. Two selectable policies:
//!
//! - `Priority`: picks the lowest-numbered priority level with at least one
//!   `Ready` task, rotating round-robin among the tasks at that level.
//! - `RoundRobin`: ignores priority entirely, rotating round-robin across
//!   every `Ready` task.
//!
//! The scheduler never mutates task state itself — it only answers "which
//! slot runs next given this table", leaving state transitions to the
//! SVC/PendSV/tick layers that actually own the `Tcb` table.

#![allow(dead_code)]

use crate::config::{MAX_TASKS, NUM_PRIORITIES};
use crate::tcb::{TaskState, Tcb};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulingPolicy {
    Priority,
    RoundRobin,
}

pub struct Scheduler {
    policy: SchedulingPolicy,
    /// For `RoundRobin`: index to resume scanning from.
    rr_cursor: usize,
    /// For `Priority`: per-priority-level resume index, so each level
    /// rotates independently of the others.
    priority_cursor: [usize; NUM_PRIORITIES],
}

impl Scheduler {
    pub const fn new(policy: SchedulingPolicy) -> Scheduler {
        Scheduler { policy, rr_cursor: 0, priority_cursor: [0; NUM_PRIORITIES] }
    }

    pub fn policy(&self) -> SchedulingPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: SchedulingPolicy) {
        self.policy = policy;
    }

    /// Picks the next task slot to run. `tasks[idle_ix]` must always be
    /// `Ready` (the idle task never blocks) so this never returns `None`
    /// once the kernel has booted.
    pub fn pick_next(&mut self, tasks: &[Tcb; MAX_TASKS], idle_ix: usize) -> usize {
        match self.policy {
            SchedulingPolicy::RoundRobin => self.pick_round_robin(tasks, idle_ix),
            SchedulingPolicy::Priority => self.pick_priority(tasks, idle_ix),
        }
    }

    fn pick_round_robin(&mut self, tasks: &[Tcb; MAX_TASKS], idle_ix: usize) -> usize {
        for offset in 1..=MAX_TASKS {
            let ix = (self.rr_cursor + offset) % MAX_TASKS;
            if tasks[ix].state == TaskState::Ready {
                self.rr_cursor = ix;
                return ix;
            }
        }
        idle_ix
    }

    fn pick_priority(&mut self, tasks: &[Tcb; MAX_TASKS], idle_ix: usize) -> usize {
        let mut best_priority = u8::MAX;
        for t in tasks.iter() {
            if t.state == TaskState::Ready && t.current_priority < best_priority {
                best_priority = t.current_priority;
            }
        }
        if best_priority == u8::MAX {
            return idle_ix;
        }
        let level = best_priority as usize;
        let cursor = self.priority_cursor[level];
        for offset in 1..=MAX_TASKS {
            let ix = (cursor + offset) % MAX_TASKS;
            if tasks[ix].state == TaskState::Ready && tasks[ix].current_priority as usize == level {
                self.priority_cursor[level] = ix;
                return ix;
            }
        }
        idle_ix
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tcb::Pid;

    fn ready(priority: u8) -> Tcb {
        Tcb { state: TaskState::Ready, current_priority: priority, priority, pid: Pid(1), ..Tcb::INVALID }
    }

    #[test]
    fn round_robin_rotates_through_all_ready_tasks() {
        let mut s = Scheduler::new(SchedulingPolicy::RoundRobin);
        let mut tasks = [Tcb::INVALID; MAX_TASKS];
        tasks[0] = ready(0);
        tasks[2] = ready(0);
        tasks[5] = ready(0);
        let first = s.pick_next(&tasks, 9);
        let second = s.pick_next(&tasks, 9);
        let third = s.pick_next(&tasks, 9);
        let fourth = s.pick_next(&tasks, 9);
        assert_eq!([first, second, third], [2, 5, 0]);
        assert_eq!(fourth, 2);
    }

    #[test]
    fn round_robin_falls_back_to_idle_when_nothing_ready() {
        let mut s = Scheduler::new(SchedulingPolicy::RoundRobin);
        let tasks = [Tcb::INVALID; MAX_TASKS];
        assert_eq!(s.pick_next(&tasks, 9), 9);
    }

    #[test]
    fn priority_mode_always_prefers_lower_numbered_priority() {
        let mut s = Scheduler::new(SchedulingPolicy::Priority);
        let mut tasks = [Tcb::INVALID; MAX_TASKS];
        tasks[0] = ready(5);
        tasks[1] = ready(1);
        assert_eq!(s.pick_next(&tasks, 9), 1);
    }

    #[test]
    fn priority_mode_rotates_within_same_level_independent_of_other_levels() {
        let mut s = Scheduler::new(SchedulingPolicy::Priority);
        let mut tasks = [Tcb::INVALID; MAX_TASKS];
        tasks[0] = ready(2);
        tasks[1] = ready(2);
        let first = s.pick_next(&tasks, 9);
        let second = s.pick_next(&tasks, 9);
        let third = s.pick_next(&tasks, 9);
        assert_eq!([first, second, third], [1, 0, 1]);
    }

    #[test]
    fn idle_runs_when_all_other_tasks_are_blocked() {
        let mut s = Scheduler::new(SchedulingPolicy::Priority);
        let mut tasks = [Tcb::INVALID; MAX_TASKS];
        tasks[0] = Tcb { state: TaskState::Delayed, ..ready(1) };
        tasks[9] = ready(15);
        assert_eq!(s.pick_next(&tasks, 9), 9);
    }
}
