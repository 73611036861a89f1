//! Hooks: per-component state, effects and refs addressed by call order.
//!
//! Every hook call claims the next slot of the rendering component's path.
//! Components must call the same hooks in the same order on every render.

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use crate::config::HookViolationPolicy;
use crate::context::{EffectHook, Hook, HookKind};
use crate::equals::shallow_equals_values;
use crate::runtime::{current_runtime, Runtime, RuntimeHandle};
use crate::value::{Event, EventHandler, SameValue, Value};
use crate::HookError;

/// Value returned from an effect body; runs before the next body or on unmount.
#[derive(Default)]
pub struct Cleanup {
    cleanup: Option<Box<dyn FnOnce()>>,
}

impl Cleanup {
    pub fn new(cleanup: impl FnOnce() + 'static) -> Self {
        Self {
            cleanup: Some(Box::new(cleanup)),
        }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub(crate) fn into_cleanup(self) -> Option<Box<dyn FnOnce()>> {
        self.cleanup
    }
}

impl From<()> for Cleanup {
    fn from(_: ()) -> Self {
        Cleanup::none()
    }
}

impl fmt::Debug for Cleanup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cleanup")
            .field("present", &self.cleanup.is_some())
            .finish()
    }
}

fn outside_component() -> ! {
    panic!("{}", HookError::OutsideComponent)
}

/// The slot claimed by one hook call.
struct Claim {
    runtime: Runtime,
    path: String,
    slot: usize,
    bucket: u64,
}

enum Existing<X> {
    Found(X),
    Missing,
    Mismatch(&'static str),
}

impl Claim {
    fn next() -> Self {
        let Some(runtime) = current_runtime() else {
            outside_component()
        };
        let claimed = runtime.with_hooks(|hooks| {
            hooks.current().map(|(path, bucket)| {
                let slot = bucket.cursor;
                bucket.cursor += 1;
                (path, slot, bucket.id)
            })
        });
        let Some((path, slot, bucket)) = claimed else {
            outside_component()
        };
        Self {
            runtime,
            path,
            slot,
            bucket,
        }
    }

    /// Inspects the record already in this slot; `inspect` returns `None`
    /// when the record does not fit the call site.
    fn existing<X>(&self, inspect: impl FnOnce(&mut Hook) -> Option<X>) -> Existing<X> {
        self.runtime.with_hooks(|hooks| {
            let hook = hooks
                .bucket_mut(&self.path)
                .and_then(|bucket| bucket.hooks.get_mut(self.slot));
            match hook {
                None => Existing::Missing,
                Some(hook) => {
                    let found = hook.kind().name();
                    match inspect(hook) {
                        Some(value) => Existing::Found(value),
                        None => Existing::Mismatch(found),
                    }
                }
            }
        })
    }

    fn store(&self, hook: Hook) {
        let replaced = self.runtime.with_hooks(|hooks| {
            let bucket = hooks.bucket_mut(&self.path)?;
            if self.slot < bucket.hooks.len() {
                Some(std::mem::replace(&mut bucket.hooks[self.slot], hook))
            } else {
                bucket.hooks.push(hook);
                None
            }
        });
        drop(replaced);
    }

    fn violation(&self, expected: HookKind, found: &'static str) {
        let found = if found == expected.name() {
            "a value of another type"
        } else {
            found
        };
        let err = HookError::KindMismatch {
            path: self.path.clone(),
            slot: self.slot,
            expected: expected.name(),
            found,
        };
        match self.runtime.config().hook_violation {
            HookViolationPolicy::Log => log::error!("{err}"),
            HookViolationPolicy::Panic => panic!("{err}"),
        }
    }
}

/// Setter returned by [`use_state`].
pub struct SetState<T> {
    cell: Rc<RefCell<T>>,
    bucket: u64,
    runtime: RuntimeHandle,
}

impl<T> Clone for SetState<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Rc::clone(&self.cell),
            bucket: self.bucket,
            runtime: self.runtime.clone(),
        }
    }
}

impl<T: SameValue + 'static> SetState<T> {
    pub fn set(&self, value: T) {
        self.update(|_| value);
    }

    /// Computes the next value from the current one. Same values are ignored;
    /// anything else is stored and a render is requested.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let next = {
            let current = self.cell.borrow();
            f(&current)
        };
        if self.cell.borrow().same_value(&next) {
            return;
        }
        *self.cell.borrow_mut() = next;
        self.runtime.mark_dirty(self.bucket);
        self.runtime.request_render();
    }
}

impl<T: Clone> SetState<T> {
    /// Latest stored value, including updates not rendered yet.
    pub fn get(&self) -> T {
        self.cell.borrow().clone()
    }
}

impl<T> fmt::Debug for SetState<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SetState").field("bucket", &self.bucket).finish()
    }
}

/// Component-local state. `init` only runs the first time the slot is claimed.
pub fn use_state<T>(init: impl FnOnce() -> T) -> (T, SetState<T>)
where
    T: Clone + SameValue + 'static,
{
    let claim = Claim::next();
    let existing = claim.existing(|hook| match hook {
        Hook::State(cell) => Rc::clone(cell).downcast::<RefCell<T>>().ok(),
        _ => None,
    });
    let cell = match existing {
        Existing::Found(cell) => cell,
        Existing::Missing => {
            let cell = Rc::new(RefCell::new(init()));
            claim.store(Hook::State(cell.clone()));
            cell
        }
        Existing::Mismatch(found) => {
            claim.violation(HookKind::State, found);
            let cell = Rc::new(RefCell::new(init()));
            claim.store(Hook::State(cell.clone()));
            cell
        }
    };
    let value = cell.borrow().clone();
    let setter = SetState {
        cell,
        bucket: claim.bucket,
        runtime: claim.runtime.handle(),
    };
    (value, setter)
}

/// Schedules `effect` to run after the current render reaches the host tree.
///
/// With `None` deps the effect runs after every render; otherwise it runs on
/// mount and whenever the dependency list is not shallow-equal to the last
/// one. The previous cleanup runs right before the next body.
pub fn use_effect<F, C>(effect: F, deps: impl Into<Option<Vec<Value>>>)
where
    F: FnOnce() -> C + 'static,
    C: Into<Cleanup>,
{
    let claim = Claim::next();
    let deps = deps.into();
    let body: Box<dyn FnOnce() -> Cleanup> = Box::new(move || effect().into());

    let existing = claim.existing(|hook| {
        let Hook::Effect(record) = hook else {
            return None;
        };
        let changed = match (&record.deps, &deps) {
            (Some(prev), Some(next)) => !shallow_equals_values(prev, next),
            _ => true,
        };
        if changed {
            record.deps = deps.clone();
        }
        Some(changed)
    });

    match existing {
        Existing::Found(false) => return,
        Existing::Found(true) => {
            let body = Some(body);
            claim.runtime.with_hooks(|hooks| {
                if let Some(Hook::Effect(record)) = hooks
                    .bucket_mut(&claim.path)
                    .and_then(|bucket| bucket.hooks.get_mut(claim.slot))
                {
                    record.effect = body;
                }
            });
        }
        Existing::Missing => claim.store(Hook::Effect(EffectHook {
            effect: Some(body),
            deps,
            cleanup: None,
        })),
        Existing::Mismatch(found) => {
            claim.violation(HookKind::Effect, found);
            claim.store(Hook::Effect(EffectHook {
                effect: Some(body),
                deps,
                cleanup: None,
            }));
        }
    }
    claim
        .runtime
        .enqueue_effect(claim.path.clone(), claim.slot, claim.bucket);
}

/// Mutable cell whose identity survives re-renders. Writing to it never
/// triggers a render.
pub struct MutableRef<T>(Rc<RefCell<T>>);

impl<T> Clone for MutableRef<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T> MutableRef<T> {
    pub fn borrow(&self) -> Ref<'_, T> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, T> {
        self.0.borrow_mut()
    }

    pub fn set(&self, value: T) {
        *self.0.borrow_mut() = value;
    }

    pub fn replace(&self, value: T) -> T {
        self.0.replace(value)
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.0.borrow())
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl<T: Clone> MutableRef<T> {
    pub fn get(&self) -> T {
        self.0.borrow().clone()
    }
}

impl<T: fmt::Debug> fmt::Debug for MutableRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MutableRef").field(&self.0.borrow()).finish()
    }
}

pub fn use_ref<T: 'static>(initial: T) -> MutableRef<T> {
    let claim = Claim::next();
    let existing = claim.existing(|hook| match hook {
        Hook::Ref(cell) => Rc::clone(cell).downcast::<RefCell<T>>().ok(),
        _ => None,
    });
    let cell = match existing {
        Existing::Found(cell) => cell,
        Existing::Missing => {
            let cell = Rc::new(RefCell::new(initial));
            claim.store(Hook::Ref(cell.clone()));
            cell
        }
        Existing::Mismatch(found) => {
            claim.violation(HookKind::Ref, found);
            let cell = Rc::new(RefCell::new(initial));
            claim.store(Hook::Ref(cell.clone()));
            cell
        }
    };
    MutableRef(cell)
}

/// Caches `factory()` until `deps` stops being shallow-equal to the last list.
pub fn use_memo<T: Clone + 'static>(factory: impl FnOnce() -> T, deps: Vec<Value>) -> T {
    use_memo_with(factory, deps, shallow_equals_values)
}

pub fn use_memo_with<T: Clone + 'static>(
    factory: impl FnOnce() -> T,
    deps: Vec<Value>,
    equals: impl Fn(&[Value], &[Value]) -> bool,
) -> T {
    let cache: MutableRef<Option<(Vec<Value>, T)>> = use_ref(None);
    let cached = cache.with(|cache| {
        cache
            .as_ref()
            .filter(|(prev, _)| equals(prev, &deps))
            .map(|(_, value)| value.clone())
    });
    if let Some(value) = cached {
        return value;
    }
    let value = factory();
    cache.set(Some((deps, value.clone())));
    value
}

/// Keeps the first `callback` until `deps` change.
pub fn use_callback<F: Clone + 'static>(callback: F, deps: Vec<Value>) -> F {
    use_memo(move || callback, deps)
}

/// Handler with a stable identity that always calls the latest `f`.
pub fn use_auto_callback(f: impl Fn(&Event) + 'static) -> EventHandler {
    let latest: MutableRef<Option<Rc<dyn Fn(&Event)>>> = use_ref(None);
    latest.set(Some(Rc::new(f)));
    use_memo(
        || {
            let latest = latest.clone();
            EventHandler::new(move |event| {
                let current = latest.get();
                if let Some(f) = current {
                    f(event);
                }
            })
        },
        Vec::new(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::push_active_runtime;
    use std::cell::Cell;

    fn in_component<R>(runtime: &Runtime, path: &str, f: impl FnOnce() -> R) -> R {
        let _active = push_active_runtime(runtime);
        runtime.with_hooks(|hooks| hooks.enter(path));
        let result = f();
        runtime.with_hooks(|hooks| hooks.exit());
        result
    }

    #[test]
    #[should_panic(expected = "hooks can only be called while a component is rendering")]
    fn hooks_outside_component_panic() {
        let _ = use_state(|| 0);
    }

    #[test]
    fn state_initializer_runs_once() {
        let runtime = Runtime::manual();
        let calls = Cell::new(0);
        for _ in 0..3 {
            let (value, _) = in_component(&runtime, "0", || {
                use_state(|| {
                    calls.set(calls.get() + 1);
                    5
                })
            });
            assert_eq!(value, 5);
        }
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn same_value_updates_do_not_request_render() {
        let runtime = Runtime::manual();
        let (_, set) = in_component(&runtime, "0", || use_state(|| f64::NAN));
        set.set(f64::NAN);
        assert!(!runtime.has_pending_tasks());
        set.set(1.0);
        assert!(runtime.has_pending_tasks());
        assert_eq!(set.get(), 1.0);
    }

    #[test]
    fn refs_keep_identity() {
        let runtime = Runtime::manual();
        let first = in_component(&runtime, "0", || use_ref(1));
        first.set(7);
        let second = in_component(&runtime, "0", || use_ref(1));
        assert!(first.ptr_eq(&second));
        assert_eq!(second.get(), 7);
    }

    #[test]
    fn kind_mismatch_replaces_record() {
        let runtime = Runtime::manual();
        in_component(&runtime, "0", || use_ref(1));
        let (value, _) = in_component(&runtime, "0", || use_state(|| 9));
        assert_eq!(value, 9);
        assert_eq!(runtime.hook_kinds("0"), [HookKind::State]);
    }

    #[test]
    #[should_panic(expected = "hook mismatch at 0[0]")]
    fn strict_policy_panics_on_mismatch() {
        let runtime = Runtime::with_config(
            std::sync::Arc::new(crate::ManualScheduler),
            crate::RuntimeConfig::strict(),
        );
        in_component(&runtime, "0", || use_ref(1));
        in_component(&runtime, "0", || use_state(|| 9));
    }

    #[test]
    fn memo_recomputes_on_dependency_change() {
        let runtime = Runtime::manual();
        let calls = Cell::new(0);
        let compute = |dep: i32| {
            in_component(&runtime, "0", || {
                use_memo(
                    || {
                        calls.set(calls.get() + 1);
                        dep * 2
                    },
                    crate::deps![dep],
                )
            })
        };
        assert_eq!(compute(1), 2);
        assert_eq!(compute(1), 2);
        assert_eq!(compute(2), 4);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn effects_queue_only_when_deps_change() {
        let runtime = Runtime::manual();
        let render = |dep: i32| {
            in_component(&runtime, "0", || use_effect(|| (), crate::deps![dep]));
        };
        render(1);
        assert_eq!(runtime.pending_effects(), 1);
        runtime.flush_effects();
        render(1);
        assert_eq!(runtime.pending_effects(), 0);
        render(2);
        assert_eq!(runtime.pending_effects(), 1);
    }
}
