//! In-memory host tree that records every mutation.

use indexmap::IndexMap;

use crate::host::HostTree;
use crate::value::{Event, EventHandler, Value};
use crate::vnode::is_valid_tag;
use crate::HostError;

pub type HostId = usize;

/// One mutation applied to a [`MemoryHost`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HostOp {
    CreateElement { node: HostId, tag: String },
    CreateText { node: HostId, value: String },
    SetAttribute { node: HostId, name: String, value: String },
    RemoveAttribute { node: HostId, name: String },
    SetProperty { node: HostId, name: String, value: String },
    SetStyle { node: HostId, name: String, value: Option<String> },
    SetText { node: HostId, value: String },
    AddListener { node: HostId, event: String },
    RemoveListener { node: HostId, event: String },
    Insert { parent: HostId, node: HostId, anchor: Option<HostId> },
    Remove { parent: HostId, node: HostId },
}

impl HostOp {
    /// True for operations that create, move or detach nodes.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            HostOp::CreateElement { .. }
                | HostOp::CreateText { .. }
                | HostOp::Insert { .. }
                | HostOp::Remove { .. }
        )
    }
}

#[derive(Debug)]
enum NodeData {
    Element(String),
    Text(String),
    Comment(String),
}

#[derive(Debug)]
struct MemoryNode {
    data: NodeData,
    parent: Option<HostId>,
    children: Vec<HostId>,
    attributes: IndexMap<String, String>,
    properties: IndexMap<String, Value>,
    styles: IndexMap<String, String>,
    listeners: Vec<(String, EventHandler)>,
}

impl MemoryNode {
    fn new(data: NodeData) -> Self {
        Self {
            data,
            parent: None,
            children: Vec::new(),
            attributes: IndexMap::new(),
            properties: IndexMap::new(),
            styles: IndexMap::new(),
            listeners: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryHost {
    nodes: Vec<MemoryNode>,
    ops: Vec<HostOp>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc(&mut self, data: NodeData) -> HostId {
        let id = self.nodes.len();
        self.nodes.push(MemoryNode::new(data));
        id
    }

    fn node(&self, id: HostId) -> Option<&MemoryNode> {
        self.nodes.get(id)
    }

    fn node_mut(&mut self, id: HostId) -> Option<&mut MemoryNode> {
        self.nodes.get_mut(id)
    }

    /// Element used as a mount point. Not recorded in the op log.
    pub fn create_container(&mut self) -> HostId {
        self.alloc(NodeData::Element("root".to_owned()))
    }

    /// Comment node; never used as a placement anchor.
    pub fn create_comment(&mut self, value: &str) -> HostId {
        self.alloc(NodeData::Comment(value.to_owned()))
    }

    pub fn ops(&self) -> &[HostOp] {
        &self.ops
    }

    pub fn take_ops(&mut self) -> Vec<HostOp> {
        std::mem::take(&mut self.ops)
    }

    pub fn clear_ops(&mut self) {
        self.ops.clear();
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn tag(&self, id: HostId) -> Option<&str> {
        match &self.node(id)?.data {
            NodeData::Element(tag) => Some(tag),
            _ => None,
        }
    }

    pub fn text(&self, id: HostId) -> Option<&str> {
        match &self.node(id)?.data {
            NodeData::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn children_of(&self, id: HostId) -> Vec<HostId> {
        self.node(id)
            .map(|node| node.children.clone())
            .unwrap_or_default()
    }

    pub fn style(&self, id: HostId, name: &str) -> Option<String> {
        self.node(id)?.styles.get(name).cloned()
    }

    pub fn listeners(&self, id: HostId, event: &str) -> Vec<EventHandler> {
        self.node(id)
            .map(|node| {
                node.listeners
                    .iter()
                    .filter(|(name, _)| name == event)
                    .map(|(_, handler)| handler.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Calls every `event` listener of `id`; returns how many ran.
    pub fn dispatch(&self, id: HostId, event: &str, detail: Value) -> usize {
        let handlers = self.listeners(id, event);
        let payload = Event::new(event, detail);
        for handler in &handlers {
            handler.call(&payload);
        }
        handlers.len()
    }

    /// Depth-first search for the first element with `tag` below `root`.
    pub fn find_by_tag(&self, root: HostId, tag: &str) -> Option<HostId> {
        self.find_all_by_tag(root, tag).into_iter().next()
    }

    pub fn find_all_by_tag(&self, root: HostId, tag: &str) -> Vec<HostId> {
        let mut found = Vec::new();
        let mut stack: Vec<HostId> = self.children_of(root).into_iter().rev().collect();
        while let Some(id) = stack.pop() {
            if self.tag(id) == Some(tag) {
                found.push(id);
            }
            stack.extend(self.children_of(id).into_iter().rev());
        }
        found
    }

    pub fn text_content(&self, id: HostId) -> String {
        let Some(node) = self.node(id) else {
            return String::new();
        };
        match &node.data {
            NodeData::Text(value) => value.clone(),
            NodeData::Comment(_) => String::new(),
            NodeData::Element(_) => node
                .children
                .iter()
                .map(|child| self.text_content(*child))
                .collect(),
        }
    }

    /// Markup of the children of `id`.
    pub fn inner_html(&self, id: HostId) -> String {
        let mut out = String::new();
        for child in self.children_of(id) {
            self.write_html(child, &mut out);
        }
        out
    }

    pub fn to_html(&self, id: HostId) -> String {
        let mut out = String::new();
        self.write_html(id, &mut out);
        out
    }

    fn write_html(&self, id: HostId, out: &mut String) {
        let Some(node) = self.node(id) else {
            return;
        };
        match &node.data {
            NodeData::Text(value) => out.push_str(&escape(value)),
            NodeData::Comment(value) => {
                out.push_str("<!--");
                out.push_str(value);
                out.push_str("-->");
            }
            NodeData::Element(tag) => {
                out.push('<');
                out.push_str(tag);
                if let Some(class) = node
                    .properties
                    .get("className")
                    .and_then(Value::as_str)
                    .filter(|class| !class.is_empty())
                {
                    out.push_str(&format!(" class=\"{}\"", escape(class)));
                }
                for (name, value) in &node.attributes {
                    out.push_str(&format!(" {name}=\"{}\"", escape(value)));
                }
                if !node.styles.is_empty() {
                    let style: Vec<String> = node
                        .styles
                        .iter()
                        .map(|(name, value)| format!("{name}: {value}"))
                        .collect();
                    out.push_str(&format!(" style=\"{}\"", escape(&style.join("; "))));
                }
                out.push('>');
                for child in &node.children {
                    self.write_html(*child, out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }

    fn detach(&mut self, child: HostId) {
        let Some(parent) = self.node(child).and_then(|node| node.parent) else {
            return;
        };
        if let Some(parent) = self.node_mut(parent) {
            parent.children.retain(|id| *id != child);
        }
        if let Some(child) = self.node_mut(child) {
            child.parent = None;
        }
    }
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn describe(value: &Value) -> String {
    value
        .to_attribute()
        .unwrap_or_else(|| value.kind_name().to_owned())
}

impl HostTree for MemoryHost {
    type Node = HostId;

    fn create_element(&mut self, tag: &str) -> Result<HostId, HostError> {
        if !is_valid_tag(tag) {
            return Err(HostError::InvalidTag {
                tag: tag.to_owned(),
            });
        }
        let node = self.alloc(NodeData::Element(tag.to_owned()));
        self.ops.push(HostOp::CreateElement {
            node,
            tag: tag.to_owned(),
        });
        Ok(node)
    }

    fn create_text(&mut self, value: &str) -> HostId {
        let node = self.alloc(NodeData::Text(value.to_owned()));
        self.ops.push(HostOp::CreateText {
            node,
            value: value.to_owned(),
        });
        node
    }

    fn attribute(&self, node: &HostId, name: &str) -> Option<String> {
        self.node(*node)?.attributes.get(name).cloned()
    }

    fn set_attribute(&mut self, node: &HostId, name: &str, value: &str) {
        if let Some(target) = self.node_mut(*node) {
            target.attributes.insert(name.to_owned(), value.to_owned());
            self.ops.push(HostOp::SetAttribute {
                node: *node,
                name: name.to_owned(),
                value: value.to_owned(),
            });
        }
    }

    fn remove_attribute(&mut self, node: &HostId, name: &str) {
        if let Some(target) = self.node_mut(*node) {
            target.attributes.shift_remove(name);
            self.ops.push(HostOp::RemoveAttribute {
                node: *node,
                name: name.to_owned(),
            });
        }
    }

    fn property(&self, node: &HostId, name: &str) -> Option<Value> {
        self.node(*node)?.properties.get(name).cloned()
    }

    fn set_property(&mut self, node: &HostId, name: &str, value: Value) {
        let described = describe(&value);
        if let Some(target) = self.node_mut(*node) {
            target.properties.insert(name.to_owned(), value);
            self.ops.push(HostOp::SetProperty {
                node: *node,
                name: name.to_owned(),
                value: described,
            });
        }
    }

    fn set_style(&mut self, node: &HostId, name: &str, value: Option<&str>) {
        if let Some(target) = self.node_mut(*node) {
            match value.filter(|value| !value.is_empty()) {
                Some(value) => {
                    target.styles.insert(name.to_owned(), value.to_owned());
                }
                None => {
                    target.styles.shift_remove(name);
                }
            }
            self.ops.push(HostOp::SetStyle {
                node: *node,
                name: name.to_owned(),
                value: value.map(str::to_owned),
            });
        }
    }

    fn set_text(&mut self, node: &HostId, value: &str) {
        if let Some(MemoryNode {
            data: NodeData::Text(text) | NodeData::Comment(text),
            ..
        }) = self.node_mut(*node)
        {
            *text = value.to_owned();
            self.ops.push(HostOp::SetText {
                node: *node,
                value: value.to_owned(),
            });
        }
    }

    fn add_event_listener(&mut self, node: &HostId, event: &str, handler: &EventHandler) {
        if let Some(target) = self.node_mut(*node) {
            target.listeners.push((event.to_owned(), handler.clone()));
            self.ops.push(HostOp::AddListener {
                node: *node,
                event: event.to_owned(),
            });
        }
    }

    fn remove_event_listener(&mut self, node: &HostId, event: &str, handler: &EventHandler) {
        if let Some(target) = self.node_mut(*node) {
            target
                .listeners
                .retain(|(name, existing)| !(name == event && existing.ptr_eq(handler)));
            self.ops.push(HostOp::RemoveListener {
                node: *node,
                event: event.to_owned(),
            });
        }
    }

    fn insert_before(
        &mut self,
        parent: &HostId,
        child: &HostId,
        anchor: Option<&HostId>,
    ) -> Result<(), HostError> {
        if self.node(*parent).is_none() || self.node(*child).is_none() {
            return Err(HostError::Missing);
        }
        if let Some(anchor) = anchor {
            if self.node(*anchor).and_then(|node| node.parent) != Some(*parent) {
                return Err(HostError::NotAChild);
            }
            if anchor == child {
                return Ok(());
            }
        }
        self.detach(*child);
        let siblings = &mut self.nodes[*parent].children;
        let index = anchor
            .and_then(|anchor| siblings.iter().position(|id| id == anchor))
            .unwrap_or(siblings.len());
        siblings.insert(index, *child);
        self.nodes[*child].parent = Some(*parent);
        self.ops.push(HostOp::Insert {
            parent: *parent,
            node: *child,
            anchor: anchor.copied(),
        });
        Ok(())
    }

    fn remove_child(&mut self, parent: &HostId, child: &HostId) -> Result<(), HostError> {
        if self.node(*child).and_then(|node| node.parent) != Some(*parent) {
            return Err(HostError::NotAChild);
        }
        self.detach(*child);
        self.ops.push(HostOp::Remove {
            parent: *parent,
            node: *child,
        });
        Ok(())
    }

    fn parent(&self, node: &HostId) -> Option<HostId> {
        self.node(*node)?.parent
    }

    fn next_sibling(&self, node: &HostId) -> Option<HostId> {
        let siblings = &self.node(self.parent(node)?)?.children;
        let index = siblings.iter().position(|id| id == node)?;
        siblings.get(index + 1).copied()
    }

    fn previous_sibling(&self, node: &HostId) -> Option<HostId> {
        let siblings = &self.node(self.parent(node)?)?.children;
        let index = siblings.iter().position(|id| id == node)?;
        index.checked_sub(1).and_then(|prev| siblings.get(prev).copied())
    }

    fn first_child(&self, node: &HostId) -> Option<HostId> {
        self.node(*node)?.children.first().copied()
    }

    fn is_element(&self, node: &HostId) -> bool {
        matches!(self.node(*node).map(|n| &n.data), Some(NodeData::Element(_)))
    }

    fn is_content(&self, node: &HostId) -> bool {
        !matches!(self.node(*node).map(|n| &n.data), Some(NodeData::Comment(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn insert_before_moves_existing_children() {
        let mut host = MemoryHost::new();
        let root = host.create_container();
        let a = host.create_text("a");
        let b = host.create_text("b");
        let c = host.create_text("c");
        for node in [a, b, c] {
            host.insert_before(&root, &node, None).expect("append");
        }
        host.insert_before(&root, &c, Some(&a)).expect("move");
        assert_eq!(host.children_of(root), [c, a, b]);
        assert_eq!(host.next_sibling(&c), Some(a));
        assert_eq!(host.previous_sibling(&c), None);
        assert_eq!(host.inner_html(root), "cab");
    }

    #[test]
    fn foreign_anchor_and_detached_child_are_rejected() {
        let mut host = MemoryHost::new();
        let root = host.create_container();
        let other = host.create_container();
        let anchor = host.create_text("x");
        let child = host.create_text("y");
        host.insert_before(&other, &anchor, None).expect("append");
        assert_eq!(
            host.insert_before(&root, &child, Some(&anchor)),
            Err(HostError::NotAChild)
        );
        assert_eq!(host.remove_child(&root, &child), Err(HostError::NotAChild));
        assert!(host.create_element("").is_err());
    }

    #[test]
    fn html_and_dispatch() {
        let mut host = MemoryHost::new();
        let root = host.create_container();
        let button = host.create_element("button").expect("button");
        host.set_property(&button, "className", Value::from("primary"));
        host.set_attribute(&button, "type", "submit");
        host.set_style(&button, "color", Some("red"));
        let label = host.create_text("a < b");
        host.insert_before(&button, &label, None).expect("label");
        host.insert_before(&root, &button, None).expect("button");
        let comment = host.create_comment("marker");
        host.insert_before(&root, &comment, None).expect("comment");

        assert_eq!(
            host.inner_html(root),
            "<button class=\"primary\" type=\"submit\" style=\"color: red\">a &lt; b</button><!--marker-->"
        );
        assert!(!host.is_content(&comment));

        let clicks = Rc::new(Cell::new(0));
        let counter = clicks.clone();
        host.add_event_listener(
            &button,
            "click",
            &EventHandler::new(move |_| counter.set(counter.get() + 1)),
        );
        assert_eq!(host.dispatch(button, "click", Value::Null), 1);
        assert_eq!(clicks.get(), 1);
        assert_eq!(host.find_by_tag(root, "button"), Some(button));
        assert_eq!(host.text_content(root), "a < b");
    }
}
