//! Host tree adapter: the operation set a host must expose, prop diffing and
//! host node placement.

use std::fmt;

use crate::instance::Instance;
use crate::value::{EventHandler, SameValue, Value, ValueMap};
use crate::vnode::{NodeKind, Props, VNode};
use crate::HostError;

/// A mutable tree the reconciler can drive: a DOM, a widget tree, or
/// [`crate::MemoryHost`].
pub trait HostTree {
    /// Cheap handle to one host node.
    type Node: Clone + PartialEq + fmt::Debug;

    fn create_element(&mut self, tag: &str) -> Result<Self::Node, HostError>;
    fn create_text(&mut self, value: &str) -> Self::Node;

    fn attribute(&self, node: &Self::Node, name: &str) -> Option<String>;
    fn set_attribute(&mut self, node: &Self::Node, name: &str, value: &str);
    fn remove_attribute(&mut self, node: &Self::Node, name: &str);

    fn property(&self, node: &Self::Node, name: &str) -> Option<Value>;
    fn set_property(&mut self, node: &Self::Node, name: &str, value: Value);

    /// Sets one style entry; `None` clears it.
    fn set_style(&mut self, node: &Self::Node, name: &str, value: Option<&str>);
    fn set_text(&mut self, node: &Self::Node, value: &str);

    fn add_event_listener(&mut self, node: &Self::Node, event: &str, handler: &EventHandler);
    fn remove_event_listener(&mut self, node: &Self::Node, event: &str, handler: &EventHandler);

    /// Moves `child` under `parent` right before `anchor`, or to the end.
    fn insert_before(
        &mut self,
        parent: &Self::Node,
        child: &Self::Node,
        anchor: Option<&Self::Node>,
    ) -> Result<(), HostError>;
    fn remove_child(&mut self, parent: &Self::Node, child: &Self::Node) -> Result<(), HostError>;

    fn parent(&self, node: &Self::Node) -> Option<Self::Node>;
    fn next_sibling(&self, node: &Self::Node) -> Option<Self::Node>;
    fn previous_sibling(&self, node: &Self::Node) -> Option<Self::Node>;
    fn first_child(&self, node: &Self::Node) -> Option<Self::Node>;
    fn is_element(&self, node: &Self::Node) -> bool;

    /// False for nodes that never serve as placement anchors, such as comments.
    fn is_content(&self, _node: &Self::Node) -> bool {
        true
    }
}

const STYLE: &str = "style";
const CHILDREN: &str = "children";

fn is_event(name: &str) -> bool {
    name.len() > 2 && name.starts_with("on")
}

fn event_type(name: &str) -> String {
    name[2..].to_lowercase()
}

fn is_attribute(name: &str) -> bool {
    !is_event(name) && name != STYLE && name != CHILDREN
}

/// Props written through the live property instead of an attribute.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Recognized {
    Text,
    Flag,
}

fn recognized(name: &str) -> Option<Recognized> {
    match name {
        "className" | "value" => Some(Recognized::Text),
        "checked" | "disabled" | "readOnly" => Some(Recognized::Flag),
        _ => None,
    }
}

fn style_map(props: &Props) -> Option<&ValueMap> {
    props.get(STYLE).and_then(Value::as_map)
}

fn changed(previous: &Props, name: &str, value: &Value) -> bool {
    previous
        .get(name)
        .map_or(true, |prev| !prev.same_value(value))
}

/// Creates the host node for a tag or text node. Tags receive their full prop set.
pub fn create_host_node<H: HostTree>(host: &mut H, node: &VNode) -> Result<H::Node, HostError> {
    match node.kind() {
        NodeKind::Tag(tag) => {
            let element = host.create_element(tag)?;
            apply_props(host, &element, &Props::default(), node.props());
            Ok(element)
        }
        NodeKind::Text => Ok(host.create_text(node.text_value().unwrap_or(""))),
        other => Err(HostError::InvalidTag {
            tag: other.describe(),
        }),
    }
}

/// Applies the difference between two prop sets to an element.
pub fn apply_props<H: HostTree>(host: &mut H, node: &H::Node, previous: &Props, next: &Props) {
    // Listeners that went away or changed.
    for (name, value) in previous.iter().filter(|(name, _)| is_event(name)) {
        let Some(handler) = value.as_handler() else {
            continue;
        };
        if changed(next, name, value) {
            host.remove_event_listener(node, &event_type(name), handler);
        }
    }

    for (name, _) in previous.iter().filter(|(name, _)| is_attribute(name)) {
        if next.contains(name) {
            continue;
        }
        match recognized(name) {
            Some(Recognized::Text) => host.set_property(node, name, Value::from("")),
            Some(Recognized::Flag) => {
                host.set_property(node, name, Value::Bool(false));
                host.remove_attribute(node, &name.to_lowercase());
            }
            None => host.remove_attribute(node, name),
        }
    }

    let empty = ValueMap::new();
    let prev_style = style_map(previous).unwrap_or(&empty);
    let next_style = style_map(next).unwrap_or(&empty);
    for name in prev_style.keys() {
        if !next_style.contains_key(name) {
            host.set_style(node, name, None);
        }
    }
    for (name, value) in next_style {
        let same = prev_style.get(name).is_some_and(|prev| prev.same_value(value));
        if !same {
            host.set_style(node, name, value.to_attribute().as_deref());
        }
    }

    for (name, value) in next.iter().filter(|(name, _)| is_event(name)) {
        if !changed(previous, name, value) {
            continue;
        }
        match value.as_handler() {
            Some(handler) => host.add_event_listener(node, &event_type(name), handler),
            None => log::debug!("ignoring {name}: expected a handler, got {}", value.kind_name()),
        }
    }

    for (name, value) in next.iter().filter(|(name, _)| is_attribute(name)) {
        if !changed(previous, name, value) {
            continue;
        }
        match (recognized(name), value) {
            (Some(Recognized::Flag), Value::Bool(flag)) => {
                host.set_property(node, name, Value::Bool(*flag));
                let mirror = name.to_lowercase();
                if *flag {
                    host.set_attribute(node, &mirror, "");
                } else {
                    host.remove_attribute(node, &mirror);
                }
            }
            (Some(_), value) => host.set_property(node, name, value.clone()),
            (None, value) => match value.to_attribute() {
                Some(text) => host.set_attribute(node, name, &text),
                None => host.remove_attribute(node, name),
            },
        }
    }
}

/// Text nodes compare and write their single value only.
pub fn apply_text<H: HostTree>(host: &mut H, node: &H::Node, previous: &VNode, next: &VNode) {
    let next_value = next.text_value().unwrap_or("");
    if previous.text_value().unwrap_or("") != next_value {
        host.set_text(node, next_value);
    }
}

/// Host nodes of an instance, depth first, left to right.
pub fn collect_host_nodes<N: Clone>(instance: &Instance<N>) -> Vec<N> {
    let mut nodes = Vec::new();
    collect_into(instance, &mut nodes);
    nodes
}

fn collect_into<N: Clone>(instance: &Instance<N>, out: &mut Vec<N>) {
    if instance.owns_host() {
        out.extend(instance.host.iter().cloned());
        return;
    }
    for child in instance.children.iter().flatten() {
        collect_into(child, out);
    }
}

pub fn first_host_node<N: Clone>(instance: &Instance<N>) -> Option<N> {
    if instance.owns_host() {
        return instance.host.clone();
    }
    instance
        .children
        .iter()
        .flatten()
        .find_map(first_host_node)
}

pub fn last_host_node<N: Clone>(instance: &Instance<N>) -> Option<N> {
    if instance.owns_host() {
        return instance.host.clone();
    }
    instance
        .children
        .iter()
        .rev()
        .flatten()
        .find_map(last_host_node)
}

/// First content node at or after `start`.
pub(crate) fn next_content<H: HostTree>(host: &H, start: Option<H::Node>) -> Option<H::Node> {
    let mut current = start;
    while let Some(node) = current {
        if host.is_content(&node) {
            return Some(node);
        }
        current = host.next_sibling(&node);
    }
    None
}

/// Closest content node before `node` among its siblings.
pub(crate) fn previous_content<H: HostTree>(host: &H, node: &H::Node) -> Option<H::Node> {
    let mut current = host.previous_sibling(node);
    while let Some(candidate) = current {
        if host.is_content(&candidate) {
            return Some(candidate);
        }
        current = host.previous_sibling(&candidate);
    }
    None
}

/// Inserts every host node of `instance` into `parent` before `anchor`.
///
/// An anchor that is no longer a child of `parent` degrades to an append. An
/// anchor that is itself being inserted is advanced past the inserted run.
pub fn insert<H: HostTree>(
    host: &mut H,
    parent: &H::Node,
    instance: &Instance<H::Node>,
    anchor: Option<&H::Node>,
) -> Result<(), HostError> {
    let nodes = collect_host_nodes(instance);
    if nodes.is_empty() {
        return Ok(());
    }
    let mut anchor = anchor.cloned();
    if let Some(stale) = anchor.as_ref().filter(|a| host.parent(a).as_ref() != Some(parent)) {
        log::debug!("anchor {stale:?} left {parent:?}; appending instead");
        anchor = None;
    }
    while let Some(current) = anchor.as_ref().filter(|a| nodes.contains(a)) {
        anchor = host.next_sibling(current);
    }
    for node in &nodes {
        host.insert_before(parent, node, anchor.as_ref())?;
    }
    Ok(())
}

/// Detaches every host node of `instance` from wherever it currently lives.
pub fn remove<H: HostTree>(host: &mut H, instance: &Instance<H::Node>) {
    for node in collect_host_nodes(instance) {
        match host.parent(&node) {
            Some(parent) => {
                if let Err(err) = host.remove_child(&parent, &node) {
                    log::debug!("failed to detach {node:?}: {err}");
                }
            }
            None => log::trace!("{node:?} already detached"),
        }
    }
}
