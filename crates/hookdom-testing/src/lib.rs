//! Testing utilities and harness for hookdom.

use std::cell::RefCell;
use std::fmt::Display;
use std::rc::Rc;
use std::sync::Arc;

use hookdom_core::{
    HostId, HostOp, ManualScheduler, MemoryHost, RenderError, Root, Runtime, RuntimeConfig, Value,
    VNode,
};

/// Headless root over a [`MemoryHost`].
///
/// `mount` and `render` settle the root: queued renders and effect flushes
/// are drained before they return, the way a host event loop would after
/// one turn.
pub struct TestRoot {
    root: Root<MemoryHost>,
    container: HostId,
}

impl TestRoot {
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        let mut host = MemoryHost::new();
        let container = host.create_container();
        let runtime = Runtime::with_config(Arc::new(ManualScheduler), config);
        Self {
            root: Root::with_runtime(host, runtime),
            container,
        }
    }

    /// Mounts `node` into the container and settles.
    pub fn mount(&mut self, node: VNode) -> Result<(), RenderError> {
        self.root.mount(node, self.container)?;
        self.settle().map(|_| ())
    }

    /// Mounts without draining, leaving effects queued.
    pub fn mount_only(&mut self, node: VNode) -> Result<(), RenderError> {
        self.root.mount(node, self.container)
    }

    /// Replaces the root node and settles.
    pub fn render(&mut self, node: VNode) -> Result<(), RenderError> {
        self.root.set_root(node)?;
        self.settle().map(|_| ())
    }

    /// Drains queued tasks; returns how many ran.
    pub fn settle(&mut self) -> Result<usize, RenderError> {
        self.root.run_until_idle()
    }

    pub fn tick(&mut self) -> Result<bool, RenderError> {
        self.root.tick()
    }

    pub fn unmount(&mut self) {
        self.root.unmount();
    }

    pub fn html(&self) -> String {
        self.root.host().inner_html(self.container)
    }

    pub fn text(&self) -> String {
        self.root.host().text_content(self.container)
    }

    pub fn container(&self) -> HostId {
        self.container
    }

    /// Top-level host nodes under the container.
    pub fn children(&self) -> Vec<HostId> {
        self.root.host().children_of(self.container)
    }

    pub fn find(&self, tag: &str) -> Option<HostId> {
        self.root.host().find_by_tag(self.container, tag)
    }

    pub fn find_all(&self, tag: &str) -> Vec<HostId> {
        self.root.host().find_all_by_tag(self.container, tag)
    }

    /// Fires `event` on the first `tag` element and settles. Returns the
    /// number of listeners that ran.
    pub fn fire(&mut self, tag: &str, event: &str) -> Result<usize, RenderError> {
        let Some(target) = self.find(tag) else {
            return Ok(0);
        };
        self.fire_on(target, event, Value::Null)
    }

    pub fn fire_on(&mut self, target: HostId, event: &str, detail: Value) -> Result<usize, RenderError> {
        let handled = self.root.host().dispatch(target, event, detail);
        self.settle()?;
        Ok(handled)
    }

    pub fn ops(&self) -> &[HostOp] {
        self.root.host().ops()
    }

    pub fn take_ops(&mut self) -> Vec<HostOp> {
        self.root.host_mut().take_ops()
    }

    pub fn clear_ops(&mut self) {
        self.root.host_mut().clear_ops();
    }

    pub fn host(&self) -> &MemoryHost {
        self.root.host()
    }

    pub fn host_mut(&mut self) -> &mut MemoryHost {
        self.root.host_mut()
    }

    pub fn runtime(&self) -> &Runtime {
        self.root.runtime()
    }

    pub fn root(&mut self) -> &mut Root<MemoryHost> {
        &mut self.root
    }
}

impl Default for TestRoot {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs `f` against a fresh [`TestRoot`].
pub fn run_test_root<R>(f: impl FnOnce(&mut TestRoot) -> R) -> R {
    let mut root = TestRoot::new();
    f(&mut root)
}

/// Shared, cloneable event log for instrumenting components and effects.
#[derive(Clone, Default)]
pub struct Recorder {
    entries: Rc<RefCell<Vec<String>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Display) {
        self.entries.borrow_mut().push(entry.to_string());
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.borrow().clone()
    }

    /// Returns the recorded entries and starts over.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.entries.borrow_mut())
    }

    pub fn count(&self, entry: &str) -> usize {
        self.entries.borrow().iter().filter(|e| *e == entry).count()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}
