use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::thread_local;

use crate::collections::map::HashSet;
use crate::config::RuntimeConfig;
use crate::context::{Hook, HookBucket, HookKind, HookStore};
use crate::hooks::Cleanup;
use crate::path;
use crate::platform::{ManualScheduler, RuntimeScheduler};

/// Lifecycle of one kind of deferred task.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScheduleState {
    Idle,
    Scheduled,
    Running,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Task {
    Render,
    FlushEffects,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct EffectEntry {
    path: String,
    slot: usize,
    /// Id of the owning bucket; paths can be reused by a later occupant.
    bucket: u64,
}

struct RuntimeInner {
    config: RuntimeConfig,
    scheduler: Arc<dyn RuntimeScheduler>,
    hooks: RefCell<HookStore>,
    effects: RefCell<Vec<EffectEntry>>,
    tasks: RefCell<VecDeque<Task>>,
    render_state: Cell<ScheduleState>,
    flush_state: Cell<ScheduleState>,
    /// Buckets whose state changed since the last pass started.
    dirty: RefCell<HashSet<u64>>,
    /// Snapshot of `dirty` taken when the current pass started.
    pass_dirty: RefCell<HashSet<u64>>,
}

impl RuntimeInner {
    fn new(scheduler: Arc<dyn RuntimeScheduler>, config: RuntimeConfig) -> Self {
        Self {
            config,
            scheduler,
            hooks: RefCell::new(HookStore::default()),
            effects: RefCell::new(Vec::new()),
            tasks: RefCell::new(VecDeque::new()),
            render_state: Cell::new(ScheduleState::Idle),
            flush_state: Cell::new(ScheduleState::Idle),
            dirty: RefCell::new(HashSet::default()),
            pass_dirty: RefCell::new(HashSet::default()),
        }
    }

    fn state(&self, task: Task) -> &Cell<ScheduleState> {
        match task {
            Task::Render => &self.render_state,
            Task::FlushEffects => &self.flush_state,
        }
    }

    fn request(&self, task: Task) {
        let state = self.state(task);
        if state.get() == ScheduleState::Scheduled {
            return;
        }
        state.set(ScheduleState::Scheduled);
        self.tasks.borrow_mut().push_back(task);
        self.scheduler.schedule_tick();
    }

    fn mark_dirty(&self, bucket: u64) {
        self.dirty.borrow_mut().insert(bucket);
    }
}

/// Owned hook store, effect queue and task queue for one root.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

impl Runtime {
    pub fn new(scheduler: Arc<dyn RuntimeScheduler>) -> Self {
        Self::with_config(scheduler, RuntimeConfig::default())
    }

    pub fn with_config(scheduler: Arc<dyn RuntimeScheduler>, config: RuntimeConfig) -> Self {
        Self {
            inner: Rc::new(RuntimeInner::new(scheduler, config)),
        }
    }

    /// Runtime whose ticks are driven by hand.
    pub fn manual() -> Self {
        Self::new(Arc::new(ManualScheduler))
    }

    pub fn handle(&self) -> RuntimeHandle {
        RuntimeHandle(Rc::downgrade(&self.inner))
    }

    pub fn config(&self) -> RuntimeConfig {
        self.inner.config
    }

    pub fn request_render(&self) {
        self.inner.request(Task::Render);
    }

    pub fn request_flush(&self) {
        self.inner.request(Task::FlushEffects);
    }

    pub fn render_state(&self) -> ScheduleState {
        self.inner.render_state.get()
    }

    pub fn flush_state(&self) -> ScheduleState {
        self.inner.flush_state.get()
    }

    pub fn has_pending_tasks(&self) -> bool {
        !self.inner.tasks.borrow().is_empty()
    }

    pub fn pending_tasks(&self) -> Vec<Task> {
        self.inner.tasks.borrow().iter().copied().collect()
    }

    pub fn pending_effects(&self) -> usize {
        self.inner.effects.borrow().len()
    }

    /// Hook kinds recorded for `path`, in slot order.
    pub fn hook_kinds(&self, path: &str) -> Vec<HookKind> {
        self.inner.hooks.borrow().kinds(path)
    }

    /// Every path that currently owns hook state, sorted.
    pub fn hook_paths(&self) -> Vec<String> {
        self.inner.hooks.borrow().paths()
    }

    pub(crate) fn next_task(&self) -> Option<Task> {
        self.inner.tasks.borrow_mut().pop_front()
    }

    /// Marks `task` as running until the returned guard drops.
    pub(crate) fn begin(&self, task: Task) -> TaskGuard<'_> {
        self.inner.state(task).set(ScheduleState::Running);
        TaskGuard {
            runtime: self,
            task,
        }
    }

    pub(crate) fn with_hooks<R>(&self, f: impl FnOnce(&mut HookStore) -> R) -> R {
        f(&mut self.inner.hooks.borrow_mut())
    }

    pub(crate) fn reset(&self) {
        self.inner.hooks.borrow_mut().clear();
        self.inner.effects.borrow_mut().clear();
        self.inner.tasks.borrow_mut().clear();
        self.inner.dirty.borrow_mut().clear();
        self.inner.pass_dirty.borrow_mut().clear();
        self.inner.render_state.set(ScheduleState::Idle);
        self.inner.flush_state.set(ScheduleState::Idle);
    }

    pub(crate) fn begin_pass(&self) {
        self.inner.hooks.borrow_mut().begin_pass();
        let dirty = std::mem::take(&mut *self.inner.dirty.borrow_mut());
        *self.inner.pass_dirty.borrow_mut() = dirty;
    }

    /// True when the component at `path` had its state changed before this pass.
    pub(crate) fn has_pending_update(&self, path: &str) -> bool {
        let id = match self.inner.hooks.borrow().bucket(path) {
            Some(bucket) => bucket.id,
            None => return false,
        };
        self.inner.pass_dirty.borrow().contains(&id)
    }

    pub(crate) fn enqueue_effect(&self, path: String, slot: usize, bucket: u64) {
        self.inner
            .effects
            .borrow_mut()
            .push(EffectEntry { path, slot, bucket });
        self.request_flush();
    }

    /// Runs queued effects in insertion order. Entries queued while flushing
    /// wait for the next flush.
    pub(crate) fn flush_effects(&self) {
        let queue = std::mem::take(&mut *self.inner.effects.borrow_mut());
        for EffectEntry { path, slot, bucket: id } in queue {
            let pending = {
                let mut hooks = self.inner.hooks.borrow_mut();
                match hooks
                    .bucket_mut(&path)
                    .filter(|bucket| bucket.id == id)
                    .and_then(|bucket| bucket.hooks.get_mut(slot))
                {
                    Some(Hook::Effect(record)) => record
                        .effect
                        .take()
                        .map(|effect| (effect, record.cleanup.take())),
                    _ => None,
                }
            };
            let Some((effect, cleanup)) = pending else {
                continue;
            };
            if let Some(cleanup) = cleanup {
                run_guarded(&path, slot, "effect cleanup", cleanup);
            }
            let Some(next) = run_guarded(&path, slot, "effect", effect).and_then(Cleanup::into_cleanup)
            else {
                continue;
            };
            let orphaned = {
                let mut hooks = self.inner.hooks.borrow_mut();
                match hooks
                    .bucket_mut(&path)
                    .filter(|bucket| bucket.id == id)
                    .and_then(|bucket| bucket.hooks.get_mut(slot))
                {
                    Some(Hook::Effect(record)) => {
                        record.cleanup = Some(next);
                        None
                    }
                    _ => Some(next),
                }
            };
            if let Some(cleanup) = orphaned {
                log::debug!("effect at {path}[{slot}] finished after its component left");
                run_guarded(&path, slot, "effect cleanup", cleanup);
            }
        }
    }

    /// Drops hook state of every component that did not run this pass.
    pub(crate) fn cleanup_unused_hooks(&self) {
        let stale = self.inner.hooks.borrow_mut().take_unvisited();
        if !stale.is_empty() {
            log::trace!("releasing {} stale hook paths", stale.len());
        }
        self.dispose(stale);
    }

    /// Releases the hook state stored at exactly `path`.
    pub(crate) fn release_hooks(&self, path: &str) {
        let bucket = self.inner.hooks.borrow_mut().remove(path);
        if let Some(bucket) = bucket {
            self.dispose(vec![(path.to_owned(), bucket)]);
        }
    }

    /// Runs the pending cleanups of buckets that left the store.
    pub(crate) fn dispose(&self, buckets: Vec<(String, HookBucket)>) {
        if buckets.is_empty() {
            return;
        }
        self.inner
            .effects
            .borrow_mut()
            .retain(|entry| !buckets.iter().any(|(_, bucket)| bucket.id == entry.bucket));
        for (path, mut bucket) in buckets {
            for (slot, cleanup) in bucket.take_cleanups() {
                run_guarded(&path, slot, "effect cleanup", cleanup);
            }
        }
    }

    /// Moves hook state between path prefixes; see [`HookStore::migrate`].
    /// Queued effects follow their buckets.
    pub(crate) fn migrate(
        &self,
        moves: &[(String, String)],
        fresh: &[String],
    ) -> Vec<(String, HookBucket)> {
        if moves.is_empty() && fresh.is_empty() {
            return Vec::new();
        }
        let displaced = self.inner.hooks.borrow_mut().migrate(moves, fresh);
        let mut effects = self.inner.effects.borrow_mut();
        effects.retain(|entry| !displaced.iter().any(|(_, bucket)| bucket.id == entry.bucket));
        for entry in effects.iter_mut() {
            if let Some((from, to)) = moves
                .iter()
                .find(|(from, _)| path::is_within(&entry.path, from))
            {
                entry.path = path::rebase(&entry.path, from, to);
            }
        }
        displaced
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("render_state", &self.render_state())
            .field("flush_state", &self.flush_state())
            .field("pending_tasks", &self.pending_tasks())
            .field("pending_effects", &self.pending_effects())
            .finish()
    }
}

pub(crate) struct TaskGuard<'a> {
    runtime: &'a Runtime,
    task: Task,
}

impl Drop for TaskGuard<'_> {
    fn drop(&mut self) {
        let state = self.runtime.inner.state(self.task);
        if state.get() == ScheduleState::Running {
            state.set(ScheduleState::Idle);
        }
    }
}

/// Weak reference to a [`Runtime`], held by setters and callbacks.
#[derive(Clone)]
pub struct RuntimeHandle(Weak<RuntimeInner>);

impl RuntimeHandle {
    pub fn upgrade(&self) -> Option<Runtime> {
        self.0.upgrade().map(|inner| Runtime { inner })
    }

    pub fn request_render(&self) {
        if let Some(inner) = self.0.upgrade() {
            inner.request(Task::Render);
        }
    }

    pub(crate) fn mark_dirty(&self, bucket: u64) {
        if let Some(inner) = self.0.upgrade() {
            inner.mark_dirty(bucket);
        }
    }

    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

impl fmt::Debug for RuntimeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RuntimeHandle").field(&self.is_alive()).finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

/// Runs user code, logging a panic instead of unwinding into the runtime.
fn run_guarded<R>(path: &str, slot: usize, what: &str, f: impl FnOnce() -> R) -> Option<R> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Some(value),
        Err(payload) => {
            log::error!(
                "{what} at {path}[{slot}] panicked: {}",
                panic_message(payload.as_ref())
            );
            None
        }
    }
}

thread_local! {
    static ACTIVE_RUNTIMES: RefCell<Vec<RuntimeHandle>> = RefCell::new(Vec::new());
}

/// Runtime of the innermost render pass on this thread.
pub(crate) fn current_runtime() -> Option<Runtime> {
    ACTIVE_RUNTIMES.with(|stack| stack.borrow().last().and_then(RuntimeHandle::upgrade))
}

pub(crate) struct ActiveRuntime(());

impl Drop for ActiveRuntime {
    fn drop(&mut self) {
        ACTIVE_RUNTIMES.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// Makes `runtime` the target of hook calls until the guard drops.
pub(crate) fn push_active_runtime(runtime: &Runtime) -> ActiveRuntime {
    ACTIVE_RUNTIMES.with(|stack| stack.borrow_mut().push(runtime.handle()));
    ActiveRuntime(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingScheduler {
        ticks: AtomicUsize,
    }

    impl RuntimeScheduler for CountingScheduler {
        fn schedule_tick(&self) {
            self.ticks.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn requests_coalesce_while_scheduled() {
        let scheduler = Arc::new(CountingScheduler::default());
        let runtime = Runtime::new(scheduler.clone());
        runtime.request_render();
        runtime.request_render();
        runtime.request_render();
        assert_eq!(runtime.pending_tasks(), [Task::Render]);
        assert_eq!(runtime.render_state(), ScheduleState::Scheduled);
        assert_eq!(scheduler.ticks.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn request_while_running_schedules_follow_up() {
        let runtime = Runtime::manual();
        runtime.request_render();
        let task = runtime.next_task();
        assert_eq!(task, Some(Task::Render));
        {
            let _guard = runtime.begin(Task::Render);
            assert_eq!(runtime.render_state(), ScheduleState::Running);
            runtime.request_render();
            runtime.request_render();
        }
        assert_eq!(runtime.render_state(), ScheduleState::Scheduled);
        assert_eq!(runtime.pending_tasks(), [Task::Render]);
    }

    #[test]
    fn guard_restores_idle_on_unwind() {
        let runtime = Runtime::manual();
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let _guard = runtime.begin(Task::Render);
            panic!("render failed");
        }));
        assert!(result.is_err());
        assert_eq!(runtime.render_state(), ScheduleState::Idle);
    }

    #[test]
    fn active_runtime_stack_nests() {
        let outer = Runtime::manual();
        let inner = Runtime::manual();
        assert!(current_runtime().is_none());
        let _outer_guard = push_active_runtime(&outer);
        {
            let _inner_guard = push_active_runtime(&inner);
            assert!(current_runtime().is_some_and(|rt| Rc::ptr_eq(&rt.inner, &inner.inner)));
        }
        assert!(current_runtime().is_some_and(|rt| Rc::ptr_eq(&rt.inner, &outer.inner)));
    }

    #[test]
    fn handle_does_not_keep_runtime_alive() {
        let runtime = Runtime::manual();
        let handle = runtime.handle();
        assert!(handle.is_alive());
        drop(runtime);
        assert!(!handle.is_alive());
        handle.request_render();
    }
}
