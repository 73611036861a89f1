//! Diffs virtual nodes against the live instance tree and drives the host.

use std::rc::Rc;

use indexmap::IndexMap;

use crate::collections::map::HashSet;
use crate::host::{
    apply_props, apply_text, collect_host_nodes, create_host_node, first_host_node, insert,
    last_host_node, next_content, previous_content, remove, HostTree,
};
use crate::instance::Instance;
use crate::path::{component_child_path, create_child_path};
use crate::runtime::Runtime;
use crate::vnode::{is_valid_tag, Component, Element, NodeKind, VNode};
use crate::{HostError, RenderError};

type Slot<N> = Option<Instance<N>>;

/// One child of the next list, paired with the instance it reuses.
struct Planned<'v, N> {
    node: &'v VNode,
    previous: Slot<N>,
    path: String,
}

/// Keeps a component's hook bucket active while its render function runs.
struct ComponentScope<'r> {
    runtime: &'r Runtime,
}

impl<'r> ComponentScope<'r> {
    fn enter(runtime: &'r Runtime, path: &str) -> Self {
        runtime.with_hooks(|hooks| hooks.enter(path));
        Self { runtime }
    }
}

impl Drop for ComponentScope<'_> {
    fn drop(&mut self) {
        self.runtime.with_hooks(|hooks| hooks.exit());
    }
}

pub(crate) struct Reconciler<'a, H: HostTree> {
    host: &'a mut H,
    runtime: &'a Runtime,
}

impl<'a, H: HostTree> Reconciler<'a, H> {
    pub(crate) fn new(host: &'a mut H, runtime: &'a Runtime) -> Self {
        Self { host, runtime }
    }

    /// Brings the position at `path` from `previous` to `next`.
    ///
    /// New host nodes are inserted into `parent` before `anchor`. Returns the
    /// instance now living at `path`.
    pub(crate) fn reconcile(
        &mut self,
        parent: &H::Node,
        previous: Slot<H::Node>,
        next: Option<&VNode>,
        path: &str,
        anchor: Option<&H::Node>,
    ) -> Result<Slot<H::Node>, RenderError> {
        let Some(next) = next else {
            if let Some(previous) = previous {
                self.unmount(&previous, false);
            }
            return Ok(None);
        };
        let instance = match previous {
            None => self.mount(parent, next, path, anchor)?,
            Some(previous) if previous.key() != next.key() || !previous.node.same_kind(next) => {
                let anchor = self.replacement_anchor(&previous, anchor);
                self.unmount(&previous, false);
                self.mount(parent, next, path, anchor.as_ref())?
            }
            Some(previous) => self.update(parent, previous, next, path, anchor)?,
        };
        Ok(Some(instance))
    }

    /// Where a replacement goes once `previous` has been removed.
    fn replacement_anchor(
        &self,
        previous: &Instance<H::Node>,
        anchor: Option<&H::Node>,
    ) -> Option<H::Node> {
        let nodes = collect_host_nodes(previous);
        let Some(last) = nodes.last() else {
            return anchor.cloned();
        };
        if anchor.is_some_and(|anchor| !nodes.contains(anchor)) {
            return anchor.cloned();
        }
        let mut candidate = next_content(&*self.host, self.host.next_sibling(last));
        while let Some(node) = candidate.as_ref().filter(|node| nodes.contains(node)) {
            candidate = next_content(&*self.host, self.host.next_sibling(node));
        }
        candidate
    }

    fn mount(
        &mut self,
        parent: &H::Node,
        node: &VNode,
        path: &str,
        anchor: Option<&H::Node>,
    ) -> Result<Instance<H::Node>, RenderError> {
        match node.kind() {
            NodeKind::Component(component) => {
                self.mount_component(parent, node, component, path, anchor)
            }
            NodeKind::Tag(tag) if !is_valid_tag(tag) => Err(RenderError::UnknownKind {
                path: path.to_owned(),
                kind: tag.to_string(),
            }),
            NodeKind::Tag(_) | NodeKind::Text => self.mount_host(parent, node, path, anchor),
            NodeKind::Fragment => {
                let mut instance = Instance::new(node.clone(), None, path.to_owned());
                instance.children =
                    self.reconcile_children(parent, Vec::new(), node.children(), path, anchor)?;
                Ok(instance)
            }
        }
    }

    fn mount_host(
        &mut self,
        parent: &H::Node,
        node: &VNode,
        path: &str,
        anchor: Option<&H::Node>,
    ) -> Result<Instance<H::Node>, RenderError> {
        let element = create_host_node(&mut *self.host, node)?;
        let mut instance = Instance::new(node.clone(), Some(element.clone()), path.to_owned());
        instance.children =
            self.reconcile_children(&element, Vec::new(), node.children(), path, None)?;
        insert(&mut *self.host, parent, &instance, anchor)?;
        Ok(instance)
    }

    fn mount_component(
        &mut self,
        parent: &H::Node,
        node: &VNode,
        component: &Component,
        path: &str,
        anchor: Option<&H::Node>,
    ) -> Result<Instance<H::Node>, RenderError> {
        let rendered = self.render_component(component, node, path);
        let mut instance = Instance::new(node.clone(), None, path.to_owned());
        if component.is_memo() {
            instance.memoized = Some(node.clone());
        }
        let child = self.reconcile(
            parent,
            None,
            rendered.as_ref(),
            &component_child_path(path),
            anchor,
        )?;
        instance.host = child.as_ref().and_then(first_host_node);
        instance.children = vec![child];
        Ok(instance)
    }

    fn render_component(&self, component: &Component, node: &VNode, path: &str) -> Element {
        let _scope = ComponentScope::enter(self.runtime, path);
        log::trace!("rendering {component:?} at {path}");
        component.render(node.props())
    }

    fn update(
        &mut self,
        parent: &H::Node,
        mut instance: Instance<H::Node>,
        next: &VNode,
        path: &str,
        anchor: Option<&H::Node>,
    ) -> Result<Instance<H::Node>, RenderError> {
        match next.kind() {
            NodeKind::Component(component) => {
                self.update_component(parent, instance, next, component, path, anchor)
            }
            NodeKind::Tag(_) => {
                let element = instance.host.clone().ok_or(HostError::Missing)?;
                apply_props(&mut *self.host, &element, instance.node.props(), next.props());
                instance.node = next.clone();
                let previous = std::mem::take(&mut instance.children);
                let start = self.host.first_child(&element);
                instance.children = self.reconcile_children(
                    &element,
                    previous,
                    next.children(),
                    path,
                    start.as_ref(),
                )?;
                Ok(instance)
            }
            NodeKind::Text => {
                let text = instance.host.clone().ok_or(HostError::Missing)?;
                apply_text(&mut *self.host, &text, &instance.node, next);
                instance.node = next.clone();
                Ok(instance)
            }
            NodeKind::Fragment => {
                let start = first_host_node(&instance).or_else(|| anchor.cloned());
                instance.node = next.clone();
                let previous = std::mem::take(&mut instance.children);
                instance.children = self.reconcile_children(
                    parent,
                    previous,
                    next.children(),
                    path,
                    start.as_ref(),
                )?;
                Ok(instance)
            }
        }
    }

    fn update_component(
        &mut self,
        parent: &H::Node,
        mut instance: Instance<H::Node>,
        next: &VNode,
        component: &Component,
        path: &str,
        anchor: Option<&H::Node>,
    ) -> Result<Instance<H::Node>, RenderError> {
        if self.can_skip(&instance, component, next) {
            log::trace!("{component:?} at {path} skipped; props unchanged");
            self.retain(&instance);
            instance.node = next.clone();
            return Ok(instance);
        }

        let rendered = self.render_component(component, next, path);
        instance.node = next.clone();
        instance.memoized = component.is_memo().then(|| next.clone());
        let previous = instance.children.pop().flatten();
        let child = self.reconcile(
            parent,
            previous,
            rendered.as_ref(),
            &component_child_path(path),
            anchor,
        )?;
        instance.host = child.as_ref().and_then(first_host_node);
        instance.children = vec![child];
        Ok(instance)
    }

    /// A memoized component may reuse its subtree when its props compare equal
    /// and nothing inside the subtree has a state update waiting.
    fn can_skip(&self, instance: &Instance<H::Node>, component: &Component, next: &VNode) -> bool {
        let Some(memoized) = instance.memoized.as_ref() else {
            return false;
        };
        if component.props_unchanged(memoized.props(), next.props()) != Some(true) {
            return false;
        }
        let mut paths = Vec::new();
        instance.component_paths(&mut paths);
        !paths.iter().any(|path| self.runtime.has_pending_update(path))
    }

    /// Keeps the hook state of a reused subtree alive through this pass.
    fn retain(&self, instance: &Instance<H::Node>) {
        let mut paths = Vec::new();
        instance.component_paths(&mut paths);
        self.runtime.with_hooks(|hooks| {
            for path in &paths {
                hooks.mark_visited(path);
            }
        });
    }

    fn reconcile_children(
        &mut self,
        parent: &H::Node,
        previous: Vec<Slot<H::Node>>,
        next: &[VNode],
        path: &str,
        start: Option<&H::Node>,
    ) -> Result<Vec<Slot<H::Node>>, RenderError> {
        let had_previous = previous.iter().any(Option::is_some);
        let mut keyed: IndexMap<Rc<str>, Instance<H::Node>> = IndexMap::new();
        let mut unkeyed = Vec::new();
        let mut shadowed = Vec::new();
        for child in previous.into_iter().flatten() {
            match child.key.clone() {
                Some(key) => {
                    if let Some(older) = keyed.insert(key, child) {
                        shadowed.push(older);
                    }
                }
                None => unkeyed.push(child),
            }
        }

        let mut seen_keys: HashSet<&str> = HashSet::default();
        let mut plan = Vec::with_capacity(next.len());
        for (index, node) in next.iter().enumerate() {
            let previous = match node.key() {
                Some(key) => keyed.shift_remove(key),
                None => unkeyed
                    .iter()
                    .position(|old: &Instance<H::Node>| old.node.same_kind(node))
                    .map(|position| unkeyed.remove(position)),
            };
            let key = node.key().filter(|key| {
                let first = seen_keys.insert(*key);
                if !first {
                    log::warn!("duplicate key {key:?} under {path}; using position {index}");
                }
                first
            });
            plan.push(Planned {
                node,
                previous,
                path: create_child_path(path, key, index),
            });
        }

        let moves: Vec<(String, String)> = plan
            .iter()
            .filter_map(|planned| {
                let previous = planned.previous.as_ref()?;
                (previous.path != planned.path)
                    .then(|| (previous.path.clone(), planned.path.clone()))
            })
            .collect();
        let fresh: Vec<String> = if had_previous {
            plan.iter()
                .filter(|planned| planned.previous.is_none())
                .map(|planned| planned.path.clone())
                .collect()
        } else {
            Vec::new()
        };
        let displaced = self.runtime.migrate(&moves, &fresh);
        for planned in &mut plan {
            if let Some(previous) = planned.previous.as_mut() {
                if previous.path != planned.path {
                    let from = previous.path.clone();
                    previous.rebase_path(&from, &planned.path);
                }
            }
        }

        let occupied: HashSet<String> = plan.iter().map(|planned| planned.path.clone()).collect();
        let mut children = Vec::with_capacity(plan.len());
        let mut last_placed: Option<H::Node> = None;
        for Planned {
            node,
            previous,
            path: child_path,
        } in plan
        {
            let anchor = match last_placed.as_ref() {
                Some(placed) => next_content(&*self.host, self.host.next_sibling(placed)),
                None => next_content(&*self.host, start.cloned()),
            };
            let matched = previous.is_some();
            let child = self.reconcile(parent, previous, Some(node), &child_path, anchor.as_ref())?;
            if let Some(instance) = child.as_ref() {
                if let Some(first) = first_host_node(instance) {
                    if matched && !self.in_place(parent, &first, last_placed.as_ref(), anchor.as_ref()) {
                        insert(&mut *self.host, parent, instance, anchor.as_ref())?;
                    }
                    last_placed = last_host_node(instance);
                }
            }
            children.push(child);
        }

        for leftover in unkeyed
            .into_iter()
            .chain(keyed.into_values())
            .chain(shadowed)
        {
            let collides = occupied.contains(&leftover.path);
            if collides {
                log::trace!("{} is reused; keeping its hook state", leftover.path);
            }
            self.unmount(&leftover, collides);
        }
        self.runtime.dispose(displaced);
        Ok(children)
    }

    /// True when `first` already sits right after the last placed sibling.
    fn in_place(
        &self,
        parent: &H::Node,
        first: &H::Node,
        last_placed: Option<&H::Node>,
        anchor: Option<&H::Node>,
    ) -> bool {
        match last_placed {
            Some(placed) => previous_content(&*self.host, first).as_ref() == Some(placed),
            None if anchor.is_some() => anchor == Some(first),
            None => {
                self.host.parent(first).as_ref() == Some(parent)
                    && previous_content(&*self.host, first).is_none()
            }
        }
    }

    /// Detaches an instance and, unless `keep_hooks`, releases the hook state
    /// of every component inside it, parents first.
    pub(crate) fn unmount(&mut self, instance: &Instance<H::Node>, keep_hooks: bool) {
        remove(&mut *self.host, instance);
        if keep_hooks {
            return;
        }
        let mut paths = Vec::new();
        instance.component_paths(&mut paths);
        for path in paths {
            self.runtime.release_hooks(&path);
        }
    }
}
