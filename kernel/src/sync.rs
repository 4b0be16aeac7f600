//! Mutexes and counting semaphores (component C3).
//!
//! Grounded on `original_source/.../kernel.c`'s mutex/semaphore structs and
//! the LOCK/UNLOCK/WAIT/POST branches of `svCallIsr`. Both primitives use a
//! FIFO wait queue (`queue_push`/`queue_pop` below); the mutex additionally
//! supports priority inheritance.
//!
//! Priority inheritance contract (ambiguity #4, SPEC_FULL §9): a task may
//! hold boosted priority from at most one mutex at a time. `unlock` always
//! demotes the releasing task back to its own `base_priority` rather than to
//! "the next highest priority it's still owed" — the original never tracks
//! nested boosts, and neither do we.

#![allow(dead_code)]

use crate::config::{
    MAX_MUTEXES, MAX_MUTEX_QUEUE_SIZE, MAX_SEMAPHORES, MAX_SEMAPHORE_QUEUE_SIZE,
};
use crate::error::{KernelError, KernelResult};
use crate::tcb::Pid;

/// Fixed-capacity FIFO queue of waiting pids.
#[derive(Clone, Copy)]
struct WaitQueue<const N: usize> {
    buf: [Pid; N],
    head: usize,
    len: usize,
}

impl<const N: usize> WaitQueue<N> {
    const fn new() -> Self {
        WaitQueue { buf: [Pid::NULL; N], head: 0, len: 0 }
    }

    fn push(&mut self, pid: Pid) -> KernelResult<()> {
        if self.len == N {
            return Err(KernelError::QueueFull);
        }
        let tail = (self.head + self.len) % N;
        self.buf[tail] = pid;
        self.len += 1;
        Ok(())
    }

    fn pop(&mut self) -> Option<Pid> {
        if self.len == 0 {
            return None;
        }
        let pid = self.buf[self.head];
        self.head = (self.head + 1) % N;
        self.len -= 1;
        Some(pid)
    }

    fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn len(&self) -> usize {
        self.len
    }

    fn iter(&self) -> impl Iterator<Item = Pid> + '_ {
        (0..self.len).map(move |i| self.buf[(self.head + i) % N])
    }
}

#[derive(Clone, Copy)]
pub struct Mutex {
    pub locked: bool,
    pub owner: Pid,
    /// Base priority the owner held before any inheritance boost, restored
    /// verbatim on unlock.
    pub owner_base_priority: u8,
    queue: WaitQueue<MAX_MUTEX_QUEUE_SIZE>,
}

impl Mutex {
    pub const fn new() -> Mutex {
        Mutex { locked: false, owner: Pid::NULL, owner_base_priority: 0, queue: WaitQueue::new() }
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn queued_pids(&self) -> impl Iterator<Item = Pid> + '_ {
        self.queue.iter()
    }
}

#[derive(Clone, Copy)]
pub struct Semaphore {
    pub count: u32,
    queue: WaitQueue<MAX_SEMAPHORE_QUEUE_SIZE>,
}

impl Semaphore {
    pub const fn new(initial_count: u32) -> Semaphore {
        Semaphore { count: initial_count, queue: WaitQueue::new() }
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn queued_pids(&self) -> impl Iterator<Item = Pid> + '_ {
        self.queue.iter()
    }
}

/// Outcome of a lock/wait attempt: whether the calling task must block.
pub enum AcquireOutcome {
    Acquired,
    Blocked,
}

pub struct MutexTable {
    mutexes: [Mutex; MAX_MUTEXES],
}

impl MutexTable {
    pub const fn new() -> MutexTable {
        MutexTable { mutexes: [Mutex::new(); MAX_MUTEXES] }
    }

    pub fn get(&self, ix: usize) -> KernelResult<&Mutex> {
        self.mutexes.get(ix).ok_or(KernelError::BadIndex)
    }

    /// Attempts to lock mutex `ix` on behalf of `caller` (whose current
    /// priority is `caller_priority`). On contention the caller is enqueued
    /// and, if priority inheritance is enabled, the holder is promoted.
    pub fn lock(
        &mut self,
        ix: usize,
        caller: Pid,
        caller_priority: u8,
        priority_inheritance: bool,
    ) -> KernelResult<(AcquireOutcome, Option<(Pid, u8)>)> {
        let m = self.mutexes.get_mut(ix).ok_or(KernelError::BadIndex)?;
        if !m.locked {
            m.locked = true;
            m.owner = caller;
            m.owner_base_priority = caller_priority;
            return Ok((AcquireOutcome::Acquired, None));
        }
        m.queue.push(caller)?;
        let mut promotion = None;
        if priority_inheritance && caller_priority < m.owner_base_priority {
            // only boost if the waiter is actually higher priority (lower number)
            promotion = Some((m.owner, caller_priority));
        }
        Ok((AcquireOutcome::Blocked, promotion))
    }

    /// Releases mutex `ix` held by `caller`. Returns the next owner (if the
    /// queue was non-empty) and the demotion the previous owner must apply
    /// (always back to `owner_base_priority`, per the single-boost contract).
    pub fn unlock(&mut self, ix: usize, caller: Pid) -> KernelResult<(u8, Option<Pid>)> {
        let m = self.mutexes.get_mut(ix).ok_or(KernelError::BadIndex)?;
        if !m.locked || m.owner != caller {
            return Err(KernelError::NotOwner);
        }
        let demote_to = m.owner_base_priority;
        match m.queue.pop() {
            Some(next) => {
                m.owner = next;
                // owner_base_priority for the new owner is set by the caller
                // (sched/svc layer) once it knows the new owner's own base
                // priority; leave locked = true.
                Ok((demote_to, Some(next)))
            }
            None => {
                m.locked = false;
                m.owner = Pid::NULL;
                Ok((demote_to, None))
            }
        }
    }

    /// Finalizes a handoff: records the new owner's base priority once the
    /// scheduler resolves it. Call immediately after `unlock` returns `Some`.
    pub fn set_new_owner_base_priority(&mut self, ix: usize, base_priority: u8) -> KernelResult<()> {
        let m = self.mutexes.get_mut(ix).ok_or(KernelError::BadIndex)?;
        m.owner_base_priority = base_priority;
        Ok(())
    }

    /// Forcibly releases every mutex `pid` currently owns (used by
    /// KILL/PKILL/fault teardown, where the holder disappears without ever
    /// calling UNLOCK itself). Hands off to the queue head exactly as
    /// `unlock` would; the caller still owes `set_new_owner_base_priority`
    /// for each returned `(ix, Some(new_owner))` pair once it knows the new
    /// owner's base priority.
    pub fn release_owned_by(&mut self, pid: Pid) -> ReleasedMutexes {
        let mut released = ReleasedMutexes::new();
        for (ix, m) in self.mutexes.iter_mut().enumerate() {
            if m.locked && m.owner == pid {
                match m.queue.pop() {
                    Some(next) => {
                        m.owner = next;
                        released.push(ix, Some(next));
                    }
                    None => {
                        m.locked = false;
                        m.owner = Pid::NULL;
                        released.push(ix, None);
                    }
                }
            }
        }
        released
    }

    /// Removes `pid` from every mutex's wait queue (used by KILL/PKILL).
    /// Returns true if it was found waiting anywhere.
    pub fn purge_waiter(&mut self, pid: Pid) -> bool {
        let mut found = false;
        for m in self.mutexes.iter_mut() {
            let mut rebuilt = WaitQueue::<MAX_MUTEX_QUEUE_SIZE>::new();
            while let Some(p) = m.queue.pop() {
                if p == pid {
                    found = true;
                } else {
                    let _ = rebuilt.push(p);
                }
            }
            m.queue = rebuilt;
        }
        found
    }
}

/// Fixed-capacity list of `(mutex_ix, new_owner)` pairs produced by
/// [`MutexTable::release_owned_by`]; avoids an allocator in a `no_std` crate.
pub struct ReleasedMutexes {
    buf: [(usize, Option<Pid>); MAX_MUTEXES],
    len: usize,
}

impl ReleasedMutexes {
    fn new() -> Self {
        ReleasedMutexes { buf: [(0, None); MAX_MUTEXES], len: 0 }
    }

    fn push(&mut self, ix: usize, next: Option<Pid>) {
        if self.len < MAX_MUTEXES {
            self.buf[self.len] = (ix, next);
            self.len += 1;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &(usize, Option<Pid>)> {
        self.buf[..self.len].iter()
    }
}

pub struct SemaphoreTable {
    semaphores: [Semaphore; MAX_SEMAPHORES],
}

impl SemaphoreTable {
    pub const fn new(initial_counts: [u32; MAX_SEMAPHORES]) -> SemaphoreTable {
        SemaphoreTable {
            semaphores: [
                Semaphore::new(initial_counts[0]),
                Semaphore::new(initial_counts[1]),
                Semaphore::new(initial_counts[2]),
            ],
        }
    }

    pub fn get(&self, ix: usize) -> KernelResult<&Semaphore> {
        self.semaphores.get(ix).ok_or(KernelError::BadIndex)
    }

    pub fn wait(&mut self, ix: usize, caller: Pid) -> KernelResult<AcquireOutcome> {
        let s = self.semaphores.get_mut(ix).ok_or(KernelError::BadIndex)?;
        if s.count > 0 {
            s.count -= 1;
            return Ok(AcquireOutcome::Acquired);
        }
        s.queue.push(caller)?;
        Ok(AcquireOutcome::Blocked)
    }

    /// Posts to semaphore `ix`. Returns the woken task, if any waiter was
    /// queued; otherwise increments the count.
    pub fn post(&mut self, ix: usize) -> KernelResult<Option<Pid>> {
        let s = self.semaphores.get_mut(ix).ok_or(KernelError::BadIndex)?;
        match s.queue.pop() {
            Some(woken) => Ok(Some(woken)),
            None => {
                s.count += 1;
                Ok(None)
            }
        }
    }

    pub fn purge_waiter(&mut self, pid: Pid) -> bool {
        let mut found = false;
        for s in self.semaphores.iter_mut() {
            let mut rebuilt = WaitQueue::<MAX_SEMAPHORE_QUEUE_SIZE>::new();
            while let Some(p) = s.queue.pop() {
                if p == pid {
                    found = true;
                } else {
                    let _ = rebuilt.push(p);
                }
            }
            s.queue = rebuilt;
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uncontended_lock_succeeds_immediately() {
        let mut t = MutexTable::new();
        let (outcome, promo) = t.lock(0, Pid(1), 5, true).unwrap();
        assert!(matches!(outcome, AcquireOutcome::Acquired));
        assert!(promo.is_none());
        assert_eq!(t.get(0).unwrap().owner, Pid(1));
    }

    #[test]
    fn contended_lock_queues_and_promotes_holder() {
        let mut t = MutexTable::new();
        t.lock(0, Pid(1), 10, true).unwrap();
        let (outcome, promo) = t.lock(0, Pid(2), 2, true).unwrap();
        assert!(matches!(outcome, AcquireOutcome::Blocked));
        assert_eq!(promo, Some((Pid(1), 2)));
    }

    #[test]
    fn unlock_hands_off_fifo_and_demotes_to_base() {
        let mut t = MutexTable::new();
        t.lock(0, Pid(1), 10, true).unwrap();
        t.lock(0, Pid(2), 2, true).unwrap();
        t.lock(0, Pid(3), 5, true).unwrap();
        let (demote_to, next) = t.unlock(0, Pid(1)).unwrap();
        assert_eq!(demote_to, 10);
        assert_eq!(next, Some(Pid(2)));
    }

    #[test]
    fn unlock_by_non_owner_rejected() {
        let mut t = MutexTable::new();
        t.lock(0, Pid(1), 10, true).unwrap();
        assert_eq!(t.unlock(0, Pid(2)), Err(KernelError::NotOwner));
    }

    #[test]
    fn semaphore_post_without_waiters_increments_count() {
        let mut t = SemaphoreTable::new([0, 0, 0]);
        assert_eq!(t.post(0).unwrap(), None);
        assert_eq!(t.get(0).unwrap().count, 1);
    }

    #[test]
    fn semaphore_wait_blocks_at_zero_then_wakes_on_post() {
        let mut t = SemaphoreTable::new([0, 0, 0]);
        let outcome = t.wait(0, Pid(9)).unwrap();
        assert!(matches!(outcome, AcquireOutcome::Blocked));
        assert_eq!(t.post(0).unwrap(), Some(Pid(9)));
    }

    #[test]
    fn purge_waiter_removes_from_queue_without_disturbing_others() {
        let mut t = MutexTable::new();
        t.lock(0, Pid(1), 10, true).unwrap();
        t.lock(0, Pid(2), 8, true).unwrap();
        t.lock(0, Pid(3), 8, true).unwrap();
        assert!(t.purge_waiter(Pid(2)));
        let remaining: heapless_pids::PidVec = t.get(0).unwrap().queued_pids().collect();
        assert_eq!(remaining.as_slice(), &[Pid(3)]);
    }
}

#[cfg(test)]
mod heapless_pids {
    use crate::tcb::Pid;

    pub struct PidVec {
        buf: [Pid; 9],
        len: usize,
    }

    impl PidVec {
        pub fn as_slice(&self) -> &[Pid] {
            &self.buf[..self.len]
        }
    }

    impl FromIterator<Pid> for PidVec {
        fn from_iter<T: IntoIterator<Item = Pid>>(iter: T) -> Self {
            let mut buf = [Pid::NULL; 9];
            let mut len = 0;
            for p in iter {
                buf[len] = p;
                len += 1;
            }
            PidVec { buf, len }
        }
    }
}
