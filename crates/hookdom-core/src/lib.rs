#![doc = r"Core runtime for hookdom: virtual nodes, the reconciler and the hook engine."]

pub mod collections;
pub mod config;
mod context;
mod equals;
pub mod hooks;
pub mod host;
mod instance;
pub mod memory;
pub mod path;
pub mod platform;
mod reconciler;
mod render;
mod runtime;
pub mod value;
pub mod vnode;

use std::fmt;

pub use config::{HookViolationPolicy, RuntimeConfig};
pub use context::{HookKind, RenderContext, RootBinding};
pub use equals::{deep_equals, shallow_equals, shallow_equals_props, shallow_equals_values};
pub use hooks::{
    use_auto_callback, use_callback, use_effect, use_memo, use_memo_with, use_ref, use_state,
    Cleanup, MutableRef, SetState,
};
pub use host::{
    apply_props, apply_text, collect_host_nodes, create_host_node, first_host_node, insert,
    last_host_node, remove, HostTree,
};
pub use instance::{Instance, InstanceKind};
pub use memory::{HostId, HostOp, MemoryHost};
pub use path::{component_child_path, create_child_path, ROOT_PATH};
pub use platform::{ManualScheduler, RuntimeScheduler};
pub use render::Root;
pub use runtime::{Runtime, RuntimeHandle, ScheduleState, Task};
pub use value::{format_number, Event, EventHandler, SameValue, Value, ValueMap};
pub use vnode::{
    component, create_element, fragment, memo, memo_with, text, Child, Component, Element,
    NodeKind, PropMap, Props, VNode,
};

/// Failure reported by a host tree operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    InvalidTag { tag: String },
    NotAChild,
    Missing,
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostError::InvalidTag { tag } => write!(f, "invalid tag name {tag:?}"),
            HostError::NotAChild => write!(f, "node is not a child of the given parent"),
            HostError::Missing => write!(f, "host node missing"),
        }
    }
}

impl std::error::Error for HostError {}

/// Failure of a render pass or of the root entry points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    NotMounted,
    InvalidContainer,
    MissingRoot,
    UnknownKind { path: String, kind: String },
    Host(HostError),
    TickLimit { ticks: usize },
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::NotMounted => write!(f, "root is not mounted"),
            RenderError::InvalidContainer => write!(f, "container must be an element node"),
            RenderError::MissingRoot => write!(f, "root node is required"),
            RenderError::UnknownKind { path, kind } => {
                write!(f, "unknown node kind {kind:?} at {path}")
            }
            RenderError::Host(err) => write!(f, "host operation failed: {err}"),
            RenderError::TickLimit { ticks } => {
                write!(f, "runtime still busy after {ticks} ticks")
            }
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::Host(err) => Some(err),
            _ => None,
        }
    }
}

impl From<HostError> for RenderError {
    fn from(err: HostError) -> Self {
        RenderError::Host(err)
    }
}

/// Hook usage violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookError {
    OutsideComponent,
    KindMismatch {
        path: String,
        slot: usize,
        expected: &'static str,
        found: &'static str,
    },
}

impl fmt::Display for HookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookError::OutsideComponent => {
                write!(f, "hooks can only be called while a component is rendering")
            }
            HookError::KindMismatch {
                path,
                slot,
                expected,
                found,
            } => write!(
                f,
                "hook mismatch at {path}[{slot}]: expected {expected}, found {found}; \
                 hooks must be called in the same order on every render"
            ),
        }
    }
}

impl std::error::Error for HookError {}
