//! Internal kernel error type.
//!
//! The external SVC contract (see `svc`) never surfaces these directly — a
//! caller only ever observes a null heap pointer or a null pid. This type
//! exists so the table-manipulation code that runs inside SVC/PendSV/SysTick
//! can use `?` instead of threading sentinel values by hand.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// No free TCB slot was available for `create_thread`/`restart`.
    NoFreeSlot,
    /// The requested entry point is already registered to a live task.
    DuplicateEntryPoint,
    /// A mutex or semaphore index was out of range.
    BadIndex,
    /// UNLOCK was attempted by a task that isn't the current holder
    /// (protocol violation, distinct from a bad index so a bad index stays
    /// effect-free per §7 while this one kills the caller).
    NotOwner,
    /// A mutex or semaphore wait queue was already at capacity.
    QueueFull,
    /// The heap suballocator could not satisfy the request.
    OutOfMemory,
    /// No task matched the given pid or name.
    NoSuchTask,
}

pub type KernelResult<T> = Result<T, KernelError>;
