//! Render context: the root binding plus the per-path hook store.

use std::any::Any;
use std::rc::Rc;

use crate::collections::map::{HashMap, HashSet};
use crate::hooks::Cleanup;
use crate::instance::Instance;
use crate::path;
use crate::runtime::Runtime;
use crate::value::Value;
use crate::vnode::VNode;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HookKind {
    State,
    Effect,
    Ref,
}

impl HookKind {
    pub fn name(self) -> &'static str {
        match self {
            HookKind::State => "state",
            HookKind::Effect => "effect",
            HookKind::Ref => "ref",
        }
    }
}

pub(crate) type EffectFn = Box<dyn FnOnce() -> Cleanup>;
pub(crate) type CleanupFn = Box<dyn FnOnce()>;

pub(crate) struct EffectHook {
    /// Body waiting for the next flush.
    pub(crate) effect: Option<EffectFn>,
    pub(crate) deps: Option<Vec<Value>>,
    pub(crate) cleanup: Option<CleanupFn>,
}

pub(crate) enum Hook {
    State(Rc<dyn Any>),
    Effect(EffectHook),
    Ref(Rc<dyn Any>),
}

impl Hook {
    pub(crate) fn kind(&self) -> HookKind {
        match self {
            Hook::State(_) => HookKind::State,
            Hook::Effect(_) => HookKind::Effect,
            Hook::Ref(_) => HookKind::Ref,
        }
    }
}

/// Hook records of one identity path.
///
/// `id` survives path migration, which lets setters refer to their component
/// without knowing where it currently lives.
pub(crate) struct HookBucket {
    pub(crate) id: u64,
    pub(crate) hooks: Vec<Hook>,
    pub(crate) cursor: usize,
}

impl HookBucket {
    /// Takes every pending effect cleanup out of this bucket.
    pub(crate) fn take_cleanups(&mut self) -> Vec<(usize, CleanupFn)> {
        self.hooks
            .iter_mut()
            .enumerate()
            .filter_map(|(slot, hook)| match hook {
                Hook::Effect(effect) => effect.cleanup.take().map(|cleanup| (slot, cleanup)),
                _ => None,
            })
            .collect()
    }
}

#[derive(Default)]
pub(crate) struct HookStore {
    buckets: HashMap<String, HookBucket>,
    visited: HashSet<String>,
    stack: Vec<String>,
    next_id: u64,
}

impl HookStore {
    pub(crate) fn clear(&mut self) {
        self.buckets.clear();
        self.visited.clear();
        self.stack.clear();
    }

    /// Forgets which components ran; stored hooks and cursors are untouched.
    pub(crate) fn begin_pass(&mut self) {
        self.visited.clear();
        self.stack.clear();
    }

    pub(crate) fn enter(&mut self, path: &str) {
        self.stack.push(path.to_owned());
        self.visited.insert(path.to_owned());
        let next_id = &mut self.next_id;
        let bucket = self
            .buckets
            .entry(path.to_owned())
            .or_insert_with(|| {
                *next_id += 1;
                HookBucket {
                    id: *next_id,
                    hooks: Vec::new(),
                    cursor: 0,
                }
            });
        bucket.cursor = 0;
    }

    pub(crate) fn exit(&mut self) {
        self.stack.pop();
    }

    pub(crate) fn current_path(&self) -> Option<&str> {
        self.stack.last().map(String::as_str)
    }

    /// Active component path and its bucket.
    pub(crate) fn current(&mut self) -> Option<(String, &mut HookBucket)> {
        let path = self.stack.last()?;
        let bucket = self.buckets.get_mut(path)?;
        Some((path.clone(), bucket))
    }

    pub(crate) fn mark_visited(&mut self, path: &str) {
        self.visited.insert(path.to_owned());
    }

    pub(crate) fn is_visited(&self, path: &str) -> bool {
        self.visited.contains(path)
    }

    pub(crate) fn bucket(&self, path: &str) -> Option<&HookBucket> {
        self.buckets.get(path)
    }

    pub(crate) fn bucket_mut(&mut self, path: &str) -> Option<&mut HookBucket> {
        self.buckets.get_mut(path)
    }

    pub(crate) fn remove(&mut self, path: &str) -> Option<HookBucket> {
        self.buckets.remove(path)
    }

    pub(crate) fn contains(&self, path: &str) -> bool {
        self.buckets.contains_key(path)
    }

    pub(crate) fn kinds(&self, path: &str) -> Vec<HookKind> {
        self.buckets
            .get(path)
            .map(|bucket| bucket.hooks.iter().map(Hook::kind).collect())
            .unwrap_or_default()
    }

    pub(crate) fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.buckets.keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Removes every bucket not visited in the current pass, sorted by path.
    pub(crate) fn take_unvisited(&mut self) -> Vec<(String, HookBucket)> {
        let mut stale: Vec<String> = self
            .buckets
            .keys()
            .filter(|path| !self.visited.contains(*path))
            .cloned()
            .collect();
        stale.sort();
        stale
            .into_iter()
            .filter_map(|path| {
                let bucket = self.buckets.remove(&path)?;
                Some((path, bucket))
            })
            .collect()
    }

    fn drain_within(&mut self, prefix: &str) -> Vec<(String, HookBucket)> {
        let mut inside: Vec<String> = self
            .buckets
            .keys()
            .filter(|path| path::is_within(path, prefix))
            .cloned()
            .collect();
        inside.sort();
        inside
            .into_iter()
            .filter_map(|path| {
                let bucket = self.buckets.remove(&path)?;
                Some((path, bucket))
            })
            .collect()
    }

    /// Moves the buckets under each `(from, to)` prefix in one batch.
    ///
    /// All sources are lifted out before anything is written, so swapped
    /// siblings cannot overwrite each other. Buckets still sitting under a
    /// destination or under a `fresh` path belong to departing siblings; they
    /// are returned so their cleanups can run.
    pub(crate) fn migrate(
        &mut self,
        moves: &[(String, String)],
        fresh: &[String],
    ) -> Vec<(String, HookBucket)> {
        let lifted: Vec<(&str, Vec<(String, HookBucket)>)> = moves
            .iter()
            .map(|(from, to)| {
                let moved = self
                    .drain_within(from)
                    .into_iter()
                    .map(|(path, bucket)| (path::rebase(&path, from, to), bucket))
                    .collect();
                (to.as_str(), moved)
            })
            .collect();

        let mut displaced = Vec::new();
        for target in lifted
            .iter()
            .map(|(to, _)| *to)
            .chain(fresh.iter().map(String::as_str))
        {
            displaced.extend(self.drain_within(target));
        }

        for (_, moved) in lifted {
            self.buckets.extend(moved);
        }
        displaced
    }
}

/// Container, current root node and the live instance tree.
pub struct RootBinding<N> {
    pub(crate) container: Option<N>,
    pub(crate) node: Option<VNode>,
    pub(crate) instance: Option<Instance<N>>,
}

impl<N> Default for RootBinding<N> {
    fn default() -> Self {
        Self {
            container: None,
            node: None,
            instance: None,
        }
    }
}

impl<N> RootBinding<N> {
    pub fn container(&self) -> Option<&N> {
        self.container.as_ref()
    }

    pub fn node(&self) -> Option<&VNode> {
        self.node.as_ref()
    }

    pub fn instance(&self) -> Option<&Instance<N>> {
        self.instance.as_ref()
    }

    fn reset(&mut self, container: N, node: VNode) {
        self.container = Some(container);
        self.node = Some(node);
        self.instance = None;
    }
}

/// Everything a root needs between passes.
pub struct RenderContext<N> {
    pub(crate) root: RootBinding<N>,
    runtime: Runtime,
}

impl<N> RenderContext<N> {
    pub fn create(runtime: Runtime) -> Self {
        Self {
            root: RootBinding::default(),
            runtime,
        }
    }

    /// Rebinds the root and forgets all hook state, queued effects and tasks.
    pub fn reset_binding(&mut self, container: N, node: VNode) {
        self.root.reset(container, node);
        self.runtime.reset();
    }

    pub fn begin_pass(&mut self) {
        self.runtime.begin_pass();
    }

    pub fn teardown(&mut self) {
        self.root = RootBinding::default();
        self.runtime.reset();
    }

    pub fn root(&self) -> &RootBinding<N> {
        &self.root
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }
}
