//! Root entry point and the task driver.

use crate::context::RenderContext;
use crate::host::HostTree;
use crate::instance::Instance;
use crate::path::ROOT_PATH;
use crate::reconciler::Reconciler;
use crate::runtime::{push_active_runtime, Runtime, Task};
use crate::vnode::VNode;
use crate::{HostError, RenderError};

/// A host tree plus everything needed to keep one container in sync with a
/// root node.
///
/// State updates only queue tasks. Call [`Root::tick`] or
/// [`Root::run_until_idle`] from the host's event loop to process them.
pub struct Root<H: HostTree> {
    host: H,
    context: RenderContext<H::Node>,
}

impl<H: HostTree> Root<H> {
    /// Root driven by hand through [`Root::tick`].
    pub fn new(host: H) -> Self {
        Self::with_runtime(host, Runtime::manual())
    }

    pub fn with_runtime(host: H, runtime: Runtime) -> Self {
        Self {
            host,
            context: RenderContext::create(runtime),
        }
    }

    /// Replaces the content of `container` with `root` and renders it synchronously.
    ///
    /// A previous mount is torn down first, running its cleanups.
    pub fn mount(
        &mut self,
        root: impl Into<Option<VNode>>,
        container: H::Node,
    ) -> Result<(), RenderError> {
        if !self.host.is_element(&container) {
            return Err(RenderError::InvalidContainer);
        }
        let root = root.into().ok_or(RenderError::MissingRoot)?;
        self.unmount();
        self.clear_container(&container)?;
        self.context.reset_binding(container, root);
        self.render()
    }

    /// Swaps the root node; the change is rendered on the next tick.
    pub fn set_root(&mut self, root: VNode) -> Result<(), RenderError> {
        if self.context.root.container.is_none() {
            return Err(RenderError::NotMounted);
        }
        self.context.root.node = Some(root);
        self.context.runtime().request_render();
        Ok(())
    }

    /// Runs one render pass right away.
    pub fn render(&mut self) -> Result<(), RenderError> {
        let runtime = self.context.runtime().clone();
        let _task = runtime.begin(Task::Render);
        self.render_pass(&runtime)
    }

    fn render_pass(&mut self, runtime: &Runtime) -> Result<(), RenderError> {
        let root = &mut self.context.root;
        let (Some(container), Some(node)) = (root.container.clone(), root.node.clone()) else {
            return Err(RenderError::NotMounted);
        };
        let previous = root.instance.take();

        self.context.begin_pass();
        let _active = push_active_runtime(runtime);
        let reconciled = Reconciler::new(&mut self.host, runtime).reconcile(
            &container,
            previous,
            Some(&node),
            ROOT_PATH,
            None,
        );
        match reconciled {
            Ok(instance) => {
                self.context.root.instance = instance;
                runtime.cleanup_unused_hooks();
                Ok(())
            }
            Err(err) => {
                // Nothing of a failed pass survives; the next one mounts fresh.
                log::debug!("render failed, clearing the container: {err}");
                if let Err(host) = self.clear_container(&container) {
                    log::debug!("clearing the container after a failed render: {host}");
                }
                runtime.begin_pass();
                runtime.cleanup_unused_hooks();
                Err(err)
            }
        }
    }

    fn clear_container(&mut self, container: &H::Node) -> Result<(), HostError> {
        while let Some(child) = self.host.first_child(container) {
            self.host.remove_child(container, &child)?;
        }
        Ok(())
    }

    /// Runs the oldest queued task. Returns `false` when the queue was empty.
    pub fn tick(&mut self) -> Result<bool, RenderError> {
        let runtime = self.context.runtime().clone();
        let Some(task) = runtime.next_task() else {
            return Ok(false);
        };
        let _task = runtime.begin(task);
        match task {
            Task::Render if self.context.root.node.is_none() => {
                log::debug!("render requested with nothing mounted");
            }
            Task::Render => self.render_pass(&runtime)?,
            Task::FlushEffects => runtime.flush_effects(),
        }
        Ok(true)
    }

    /// Ticks until no task is left and returns how many ran.
    ///
    /// Gives up with [`RenderError::TickLimit`] once
    /// [`crate::RuntimeConfig::max_drain_ticks`] tasks ran and more are queued.
    pub fn run_until_idle(&mut self) -> Result<usize, RenderError> {
        let limit = self.context.runtime().config().max_drain_ticks;
        let mut ticks = 0;
        while self.tick()? {
            ticks += 1;
            if ticks >= limit && self.context.runtime().has_pending_tasks() {
                log::warn!("still busy after {ticks} ticks; giving up");
                return Err(RenderError::TickLimit { ticks });
            }
        }
        Ok(ticks)
    }

    /// Removes the rendered tree, runs every outstanding cleanup and forgets
    /// the binding. Calling it again does nothing.
    pub fn unmount(&mut self) {
        let runtime = self.context.runtime().clone();
        if let Some(instance) = self.context.root.instance.take() {
            Reconciler::new(&mut self.host, &runtime).unmount(&instance, false);
        }
        runtime.begin_pass();
        runtime.cleanup_unused_hooks();
        self.context.teardown();
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn runtime(&self) -> &Runtime {
        self.context.runtime()
    }

    pub fn context(&self) -> &RenderContext<H::Node> {
        &self.context
    }

    pub fn container(&self) -> Option<&H::Node> {
        self.context.root().container()
    }

    pub fn instance(&self) -> Option<&Instance<H::Node>> {
        self.context.root().instance()
    }

    pub fn is_mounted(&self) -> bool {
        self.context.root().container().is_some()
    }
}
