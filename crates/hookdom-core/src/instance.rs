use std::rc::Rc;

use crate::path;
use crate::vnode::{NodeKind, VNode};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstanceKind {
    Component,
    Tag,
    Text,
    Fragment,
}

impl From<&NodeKind> for InstanceKind {
    fn from(kind: &NodeKind) -> Self {
        match kind {
            NodeKind::Component(_) => InstanceKind::Component,
            NodeKind::Tag(_) => InstanceKind::Tag,
            NodeKind::Text => InstanceKind::Text,
            NodeKind::Fragment => InstanceKind::Fragment,
        }
    }
}

/// What is live at one tree position.
///
/// Tag and text instances own exactly one host node. Component instances
/// mirror the first host node of their rendered child; fragments have none.
#[derive(Debug)]
pub struct Instance<N> {
    pub(crate) node: VNode,
    pub(crate) host: Option<N>,
    pub(crate) children: Vec<Option<Instance<N>>>,
    pub(crate) path: String,
    pub(crate) kind: InstanceKind,
    pub(crate) key: Option<Rc<str>>,
    /// Node a memoized component last rendered with.
    pub(crate) memoized: Option<VNode>,
}

impl<N> Instance<N> {
    pub(crate) fn new(node: VNode, host: Option<N>, path: String) -> Self {
        let kind = InstanceKind::from(node.kind());
        let key = node.key().map(Rc::from);
        Self {
            node,
            host,
            children: Vec::new(),
            path,
            kind,
            key,
            memoized: None,
        }
    }

    pub fn node(&self) -> &VNode {
        &self.node
    }

    pub fn host(&self) -> Option<&N> {
        self.host.as_ref()
    }

    pub fn children(&self) -> &[Option<Instance<N>>] {
        &self.children
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn kind(&self) -> InstanceKind {
        self.kind
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// True for tag and text instances, whose host node is their own.
    pub fn owns_host(&self) -> bool {
        matches!(self.kind, InstanceKind::Tag | InstanceKind::Text)
    }

    /// Re-roots this subtree's paths after its hook state moved from `from` to `to`.
    pub(crate) fn rebase_path(&mut self, from: &str, to: &str) {
        self.path = path::rebase(&self.path, from, to);
        for child in self.children.iter_mut().flatten() {
            child.rebase_path(from, to);
        }
    }

    /// Paths of every component instance in this subtree, parents first.
    pub(crate) fn component_paths(&self, out: &mut Vec<String>) {
        if self.kind == InstanceKind::Component {
            out.push(self.path.clone());
        }
        for child in self.children.iter().flatten() {
            child.component_paths(out);
        }
    }
}
