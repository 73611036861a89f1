//! Platform abstraction traits for the hookdom runtime.
//!
//! The runtime never runs queued work on its own. It records tasks and asks
//! the host platform to come back later, which lets it integrate with event
//! loops, timers, or a plain test loop without depending on any of them.

/// Receives notifications whenever the runtime queues a task.
///
/// Implementations typically raise a flag or wake an event loop; the loop
/// then calls [`crate::Root::run_until_idle`] on the thread that owns the root.
/// They must be safe to share with other threads so wakers can live there.
pub trait RuntimeScheduler: Send + Sync {
    /// Request that the host run a tick soon.
    fn schedule_tick(&self);
}

/// Scheduler that ignores tick requests. Callers drive the root manually.
#[derive(Debug, Default, Clone, Copy)]
pub struct ManualScheduler;

impl RuntimeScheduler for ManualScheduler {
    fn schedule_tick(&self) {}
}
