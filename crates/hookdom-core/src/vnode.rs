//! Virtual node construction.
//!
//! A [`VNode`] describes one tree position for the next render. Nodes are
//! immutable and cheap to clone; a render pass builds a fresh tree every time.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::equals::shallow_equals_props;
use crate::value::{format_number, EventHandler, Value};

/// Ordered prop name to value mapping.
pub type PropMap = IndexMap<Rc<str>, Value>;

/// What a component renders: a single node or nothing.
pub type Element = Option<VNode>;

pub(crate) const NODE_VALUE: &str = "nodeValue";
const KEY: &str = "key";

type RenderFn = Rc<dyn Fn(&Props) -> Element>;
type MemoEquals = Rc<dyn Fn(&Props, &Props) -> bool>;

/// A render function plus its kind identity.
///
/// Each call to [`Component::new`] creates a new kind; clones share it. Build
/// a component once and clone it into every node that should reuse the same
/// instance, the way a function reference is shared.
#[derive(Clone)]
pub struct Component {
    name: &'static str,
    render: RenderFn,
    memo: Option<MemoEquals>,
}

impl Component {
    pub fn new<F>(render: F) -> Self
    where
        F: Fn(&Props) -> Element + 'static,
    {
        Self {
            name: std::any::type_name::<F>(),
            render: Rc::new(render),
            memo: None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_memo(&self) -> bool {
        self.memo.is_some()
    }

    pub fn same_kind(&self, other: &Component) -> bool {
        std::ptr::addr_eq(Rc::as_ptr(&self.render), Rc::as_ptr(&other.render))
            && self.is_memo() == other.is_memo()
    }

    pub(crate) fn render(&self, props: &Props) -> Element {
        (self.render)(props)
    }

    /// `Some(true)` when a memoized component may skip rendering for `next`.
    pub(crate) fn props_unchanged(&self, prev: &Props, next: &Props) -> Option<bool> {
        self.memo.as_ref().map(|equals| equals(prev, next))
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_memo() {
            write!(f, "Memo({})", self.name)
        } else {
            f.write_str(self.name)
        }
    }
}

pub fn component<F>(render: F) -> Component
where
    F: Fn(&Props) -> Element + 'static,
{
    Component::new(render)
}

/// Wraps a component so it skips rendering while its props stay shallow-equal.
pub fn memo(component: Component) -> Component {
    memo_with(component, shallow_equals_props)
}

pub fn memo_with(
    component: Component,
    equals: impl Fn(&Props, &Props) -> bool + 'static,
) -> Component {
    Component {
        memo: Some(Rc::new(equals)),
        ..component
    }
}

#[derive(Clone, Debug)]
pub enum NodeKind {
    Tag(Rc<str>),
    Text,
    Fragment,
    Component(Component),
}

impl NodeKind {
    pub fn same_kind(&self, other: &NodeKind) -> bool {
        match (self, other) {
            (NodeKind::Tag(a), NodeKind::Tag(b)) => a == b,
            (NodeKind::Text, NodeKind::Text) | (NodeKind::Fragment, NodeKind::Fragment) => true,
            (NodeKind::Component(a), NodeKind::Component(b)) => a.same_kind(b),
            _ => false,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            NodeKind::Tag(tag) => tag.to_string(),
            NodeKind::Text => "#text".to_owned(),
            NodeKind::Fragment => "#fragment".to_owned(),
            NodeKind::Component(component) => format!("{component:?}"),
        }
    }
}

/// Tag names start with an ASCII letter and continue with letters, digits,
/// `-`, `_`, `:` or `.`.
pub fn is_valid_tag(tag: &str) -> bool {
    let mut chars = tag.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {
            chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.'))
        }
        _ => false,
    }
}

impl From<&str> for NodeKind {
    fn from(tag: &str) -> Self {
        NodeKind::Tag(Rc::from(tag))
    }
}

impl From<String> for NodeKind {
    fn from(tag: String) -> Self {
        NodeKind::Tag(Rc::from(tag))
    }
}

impl From<Component> for NodeKind {
    fn from(component: Component) -> Self {
        NodeKind::Component(component)
    }
}

/// Props of a node: named values plus the reserved children list.
#[derive(Clone, Default)]
pub struct Props {
    values: PropMap,
    children: Option<Rc<[VNode]>>,
}

impl Props {
    pub fn from_map(values: PropMap) -> Self {
        Self {
            values,
            children: None,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn get_number(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_number)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    pub fn get_handler(&self, name: &str) -> Option<&EventHandler> {
        self.get(name).and_then(Value::as_handler)
    }

    pub fn get_object<T: 'static>(&self, name: &str) -> Option<Rc<T>> {
        self.get(name).and_then(Value::downcast::<T>)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Rc<str>, &Value)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Children declared on the node; empty when none were given.
    pub fn children(&self) -> &[VNode] {
        self.children.as_deref().unwrap_or(&[])
    }

    pub fn has_children(&self) -> bool {
        self.children.is_some()
    }

    pub(crate) fn children_rc(&self) -> Option<&Rc<[VNode]>> {
        self.children.as_ref()
    }
}

impl fmt::Debug for Props {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        map.entries(self.values.iter());
        if let Some(children) = &self.children {
            map.entry(&"children", children);
        }
        map.finish()
    }
}

struct VNodeInner {
    kind: NodeKind,
    key: Option<Rc<str>>,
    props: Props,
}

#[derive(Clone)]
pub struct VNode(Rc<VNodeInner>);

impl VNode {
    fn new(kind: NodeKind, key: Option<Rc<str>>, props: Props) -> Self {
        Self(Rc::new(VNodeInner { kind, key, props }))
    }

    pub fn kind(&self) -> &NodeKind {
        &self.0.kind
    }

    pub fn key(&self) -> Option<&str> {
        self.0.key.as_deref()
    }

    pub fn props(&self) -> &Props {
        &self.0.props
    }

    pub fn children(&self) -> &[VNode] {
        self.0.props.children()
    }

    /// String carried by a text node.
    pub fn text_value(&self) -> Option<&str> {
        match self.0.kind {
            NodeKind::Text => Some(self.0.props.get_str(NODE_VALUE).unwrap_or("")),
            _ => None,
        }
    }

    pub fn ptr_eq(&self, other: &VNode) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn same_kind(&self, other: &VNode) -> bool {
        self.kind().same_kind(other.kind())
    }
}

impl fmt::Debug for VNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("VNode");
        debug.field("kind", &self.0.kind);
        if let Some(key) = &self.0.key {
            debug.field("key", key);
        }
        debug.field("props", &self.0.props).finish()
    }
}

/// Anything accepted in a children list before normalization.
#[derive(Clone, Debug)]
pub enum Child {
    Empty,
    Text(Rc<str>),
    Node(VNode),
    List(Vec<Child>),
}

impl From<VNode> for Child {
    fn from(node: VNode) -> Self {
        Child::Node(node)
    }
}

impl From<&VNode> for Child {
    fn from(node: &VNode) -> Self {
        Child::Node(node.clone())
    }
}

impl<T: Into<Child>> From<Option<T>> for Child {
    fn from(child: Option<T>) -> Self {
        child.map_or(Child::Empty, Into::into)
    }
}

impl<T: Into<Child>> From<Vec<T>> for Child {
    fn from(children: Vec<T>) -> Self {
        Child::List(children.into_iter().map(Into::into).collect())
    }
}

impl From<&str> for Child {
    fn from(text: &str) -> Self {
        Child::Text(Rc::from(text))
    }
}

impl From<String> for Child {
    fn from(text: String) -> Self {
        Child::Text(Rc::from(text))
    }
}

impl From<Rc<str>> for Child {
    fn from(text: Rc<str>) -> Self {
        Child::Text(text)
    }
}

impl From<bool> for Child {
    fn from(_: bool) -> Self {
        Child::Empty
    }
}

impl From<()> for Child {
    fn from(_: ()) -> Self {
        Child::Empty
    }
}

macro_rules! number_child {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Child {
                fn from(value: $ty) -> Self {
                    Child::Text(Rc::from(format_number(value as f64)))
                }
            }
        )*
    };
}

number_child!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);

fn flatten(children: Vec<Child>, out: &mut Vec<VNode>) {
    for child in children {
        match child {
            Child::Empty => {}
            Child::Text(value) => out.push(text_node(Value::Str(value))),
            Child::Node(node) => out.push(node),
            Child::List(list) => flatten(list, out),
        }
    }
}

fn key_from_value(value: Value) -> Option<Rc<str>> {
    match value {
        Value::Str(key) => Some(key),
        Value::Number(n) => Some(Rc::from(format_number(n))),
        Value::Bool(b) => Some(Rc::from(b.to_string())),
        _ => None,
    }
}

fn text_node(value: Value) -> VNode {
    let text = match value {
        Value::Str(text) => text,
        other => Rc::from(other.to_attribute().unwrap_or_default()),
    };
    let mut values = PropMap::with_capacity(1);
    values.insert(Rc::from(NODE_VALUE), Value::Str(text));
    VNode::new(
        NodeKind::Text,
        None,
        Props {
            values,
            children: Some(Rc::from([])),
        },
    )
}

/// Builds a node from a kind, an optional prop map and a children list.
///
/// The `key` prop is moved out of the map. Children are flattened, empty
/// entries are dropped and strings or numbers become text nodes. Tags,
/// fragments and text nodes always carry a children list; components only
/// when it is non-empty.
pub fn create_element(
    kind: impl Into<NodeKind>,
    props: impl Into<Option<PropMap>>,
    children: Vec<Child>,
) -> VNode {
    let kind = kind.into();
    let mut values = props.into().unwrap_or_default();
    let key = values.shift_remove(KEY).and_then(key_from_value);

    let mut flat = Vec::with_capacity(children.len());
    flatten(children, &mut flat);

    let children = match kind {
        NodeKind::Component(_) if flat.is_empty() => None,
        NodeKind::Text => {
            if !values.contains_key(NODE_VALUE) {
                values.insert(Rc::from(NODE_VALUE), Value::Str(Rc::from("")));
            }
            Some(Rc::from([]))
        }
        _ => Some(Rc::from(flat)),
    };
    VNode::new(kind, key, Props { values, children })
}

/// Text node whose value is coerced from any primitive.
pub fn text(value: impl Into<Value>) -> VNode {
    text_node(value.into())
}

pub fn fragment(children: Vec<Child>) -> VNode {
    create_element(NodeKind::Fragment, None, children)
}

/// Builds a [`PropMap`]: `props! { "className" => "row", "count" => 3 }`.
#[macro_export]
macro_rules! props {
    () => {
        $crate::vnode::PropMap::new()
    };
    ($($name:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::vnode::PropMap::new();
        $(
            map.insert(
                ::std::rc::Rc::<str>::from($name),
                $crate::value::Value::from($value),
            );
        )+
        map
    }};
}

/// Builds a children list, converting each entry into a [`Child`].
#[macro_export]
macro_rules! children {
    ($($child:expr),* $(,)?) => {
        vec![$($crate::vnode::Child::from($child)),*]
    };
}

/// Builds a dependency list for effects and memoized values.
#[macro_export]
macro_rules! deps {
    ($($dep:expr),* $(,)?) => {
        vec![$($crate::value::Value::from($dep)),*]
    };
}
