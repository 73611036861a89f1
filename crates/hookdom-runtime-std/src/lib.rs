//! Scheduling services backed by Rust's `std` library.
//!
//! [`StdScheduler`] records tick requests in an atomic flag and optionally
//! wakes the host event loop. [`StdRuntime`] hands out roots wired to one
//! shared scheduler and drains them when the loop comes around.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use hookdom_core::{HostTree, RenderError, Root, Runtime, RuntimeConfig, RuntimeScheduler};

type Waker = Arc<dyn Fn() + Send + Sync + 'static>;

/// Scheduler that flags pending ticks for a host loop to pick up.
pub struct StdScheduler {
    tick_requested: AtomicBool,
    waker: RwLock<Option<Waker>>,
}

impl StdScheduler {
    pub fn new() -> Self {
        Self {
            tick_requested: AtomicBool::new(false),
            waker: RwLock::new(None),
        }
    }

    /// Returns whether a tick has been requested since the last call.
    pub fn take_tick_request(&self) -> bool {
        self.tick_requested.swap(false, Ordering::SeqCst)
    }

    /// Registers a waker invoked whenever a tick is requested.
    pub fn set_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        *self.waker.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(waker));
    }

    pub fn clear_waker(&self) {
        *self.waker.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn wake(&self) {
        let waker = self
            .waker
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(waker) = waker {
            waker();
        }
    }
}

impl Default for StdScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StdScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdScheduler")
            .field("tick_requested", &self.tick_requested.load(Ordering::SeqCst))
            .finish()
    }
}

impl RuntimeScheduler for StdScheduler {
    fn schedule_tick(&self) {
        self.tick_requested.store(true, Ordering::SeqCst);
        self.wake();
    }
}

/// Factory for roots that share one [`StdScheduler`].
///
/// Every root gets its own [`Runtime`], so hook state and task queues stay
/// per root while a single waker serves them all.
#[derive(Clone)]
pub struct StdRuntime {
    scheduler: Arc<StdScheduler>,
    config: RuntimeConfig,
}

impl StdRuntime {
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        Self {
            scheduler: Arc::new(StdScheduler::default()),
            config,
        }
    }

    /// A fresh runtime that reports to the shared scheduler.
    pub fn create_runtime(&self) -> Runtime {
        Runtime::with_config(self.scheduler.clone(), self.config)
    }

    pub fn config(&self) -> RuntimeConfig {
        self.config
    }

    pub fn scheduler(&self) -> Arc<StdScheduler> {
        Arc::clone(&self.scheduler)
    }

    /// Builds a root over `host` with a runtime of its own.
    pub fn create_root<H: HostTree>(&self, host: H) -> Root<H> {
        Root::with_runtime(host, self.create_runtime())
    }

    pub fn take_tick_request(&self) -> bool {
        self.scheduler.take_tick_request()
    }

    pub fn set_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        self.scheduler.set_waker(waker);
    }

    pub fn clear_waker(&self) {
        self.scheduler.clear_waker();
    }

    /// Runs `root` until idle when a tick was requested or it has queued
    /// work. Returns the number of tasks processed.
    pub fn drive<H: HostTree>(&self, root: &mut Root<H>) -> Result<usize, RenderError> {
        if !self.take_tick_request() && !root.runtime().has_pending_tasks() {
            return Ok(0);
        }
        let ticks = root.run_until_idle()?;
        log::trace!("drained {ticks} tasks");
        Ok(ticks)
    }
}

impl fmt::Debug for StdRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdRuntime")
            .field("scheduler", &self.scheduler)
            .field("config", &self.config)
            .finish()
    }
}

impl Default for StdRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;
    use std::sync::atomic::AtomicUsize;

    use hookdom_core::{component, create_element, text, use_state, MemoryHost, SetState};

    use super::*;

    #[test]
    fn state_change_requests_tick_and_rerenders() {
        let renders = Rc::new(Cell::new(0_u32));
        let setter: Rc<RefCell<Option<SetState<i32>>>> = Rc::new(RefCell::new(None));

        let counter = component({
            let renders = Rc::clone(&renders);
            let setter = Rc::clone(&setter);
            move |_| {
                renders.set(renders.get() + 1);
                let (count, set_count) = use_state(|| 0);
                setter.borrow_mut().replace(set_count);
                Some(text(count))
            }
        });

        let runtime = StdRuntime::new();
        let wakes = Arc::new(AtomicUsize::new(0));
        runtime.set_waker({
            let wakes = Arc::clone(&wakes);
            move || {
                wakes.fetch_add(1, Ordering::SeqCst);
            }
        });

        let mut host = MemoryHost::new();
        let container = host.create_container();
        let mut root = runtime.create_root(host);
        root.mount(create_element(counter, None, vec![]), container)
            .expect("initial render");
        assert_eq!(renders.get(), 1);
        assert_eq!(runtime.drive(&mut root), Ok(0));

        let set_count = setter.borrow().clone().expect("setter captured during render");
        set_count.set(1);
        set_count.set(1);
        assert_eq!(wakes.load(Ordering::SeqCst), 1);

        assert_eq!(runtime.drive(&mut root), Ok(1));
        assert_eq!(renders.get(), 2);
        assert_eq!(root.host().text_content(container), "1");
        assert!(!runtime.take_tick_request());
    }

    #[test]
    fn roots_keep_their_own_state() {
        let setter: Rc<RefCell<Option<SetState<i32>>>> = Rc::new(RefCell::new(None));
        let counter = component({
            let setter = Rc::clone(&setter);
            move |_| {
                let (count, set_count) = use_state(|| 0);
                setter.borrow_mut().replace(set_count);
                Some(text(count))
            }
        });
        let runtime = StdRuntime::new();

        let mut first_host = MemoryHost::new();
        let first_container = first_host.create_container();
        let mut first = runtime.create_root(first_host);
        first
            .mount(create_element(counter.clone(), None, vec![]), first_container)
            .expect("first mount");
        let set_first = setter.borrow().clone().expect("first setter");
        set_first.set(4);
        assert_eq!(runtime.drive(&mut first), Ok(1));

        let mut second_host = MemoryHost::new();
        let second_container = second_host.create_container();
        let mut second = runtime.create_root(second_host);
        second
            .mount(create_element(counter, None, vec![]), second_container)
            .expect("second mount");

        set_first.set(5);
        assert_eq!(runtime.drive(&mut first), Ok(1));
        assert_eq!(runtime.drive(&mut second), Ok(0));
        assert_eq!(first.host().text_content(first_container), "5");
        assert_eq!(second.host().text_content(second_container), "0");
    }
}
