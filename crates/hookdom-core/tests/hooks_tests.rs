use std::cell::RefCell;
use std::rc::Rc;

use hookdom_core::{
    children, component, create_element, deps, props, text, use_callback, use_effect, use_memo,
    use_ref, use_state, Cleanup, Component, HookKind, MutableRef, Props, RuntimeConfig, SetState,
    Task, Value,
};
use hookdom_testing::{Recorder, TestRoot};

type Slot<T> = Rc<RefCell<Option<T>>>;

fn slot<T>() -> Slot<T> {
    Rc::new(RefCell::new(None))
}

/// Logs `run {a}` when the effect body runs and `clean {a}` when its cleanup does.
fn effect_probe(log: &Recorder) -> Component {
    let log = log.clone();
    component(move |props: &Props| {
        let a = props.get_number("a").unwrap_or_default();
        let log = log.clone();
        use_effect(
            move || {
                log.push(format!("run {a}"));
                Cleanup::new(move || log.push(format!("clean {a}")))
            },
            deps![a],
        );
        Some(text(a))
    })
}

#[test]
fn effect_reruns_only_when_deps_change() {
    let log = Recorder::new();
    let probe = effect_probe(&log);
    let node = |a: i32| create_element(probe.clone(), props! { "a" => a }, vec![]);

    let mut root = TestRoot::new();
    root.mount(node(1)).expect("mount");
    assert_eq!(log.take(), ["run 1"]);

    root.render(node(1)).expect("same deps");
    assert!(log.is_empty());

    root.render(node(2)).expect("new deps");
    assert_eq!(log.take(), ["clean 1", "run 2"]);

    root.unmount();
    assert_eq!(log.take(), ["clean 2"]);
    root.unmount();
    assert!(log.is_empty());
}

#[test]
fn effect_policies_without_and_with_empty_deps() {
    let log = Recorder::new();
    let widget = component({
        let log = log.clone();
        move |_: &Props| {
            let every = log.clone();
            use_effect(move || every.push("every"), None::<Vec<Value>>);
            let once = log.clone();
            use_effect(move || once.push("once"), Some(vec![]));
            Some(text("w"))
        }
    });

    let mut root = TestRoot::new();
    root.mount(create_element(widget.clone(), None, vec![]))
        .expect("mount");
    for _ in 0..3 {
        root.render(create_element(widget.clone(), None, vec![]))
            .expect("rerender");
    }
    assert_eq!(log.count("every"), 4);
    assert_eq!(log.count("once"), 1);
}

#[test]
fn effects_wait_for_the_next_tick() {
    let log = Recorder::new();
    let probe = effect_probe(&log);
    let mut root = TestRoot::new();
    root.mount_only(create_element(probe, props! { "a" => 7 }, vec![]))
        .expect("mount");

    assert_eq!(root.html(), "7");
    assert!(log.is_empty());
    assert_eq!(root.runtime().pending_effects(), 1);
    assert_eq!(root.runtime().pending_tasks(), [Task::FlushEffects]);

    assert_eq!(root.tick(), Ok(true));
    assert_eq!(log.take(), ["run 7"]);
    assert_eq!(root.tick(), Ok(false));
}

#[test]
fn same_value_updates_are_ignored() {
    let setter: Slot<SetState<f64>> = slot();
    let renders = Recorder::new();
    let view = component({
        let setter = Rc::clone(&setter);
        let renders = renders.clone();
        move |_: &Props| {
            let (value, set_value) = use_state(|| f64::NAN);
            renders.push("render");
            setter.borrow_mut().replace(set_value);
            Some(text(value))
        }
    });

    let mut root = TestRoot::new();
    root.mount(create_element(view, None, vec![])).expect("mount");
    let set_value = setter.borrow().clone().expect("setter");

    set_value.set(f64::NAN);
    assert!(!root.runtime().has_pending_tasks());
    assert_eq!(root.settle(), Ok(0));

    set_value.set(2.5);
    set_value.set(2.5);
    assert_eq!(root.runtime().pending_tasks(), [Task::Render]);
    root.settle().expect("render");
    assert_eq!(root.html(), "2.5");
    assert_eq!(renders.count("render"), 2);
}

#[test]
fn hook_order_is_stable_across_renders() {
    let view = component(|props: &Props| {
        let (count, _) = use_state(|| 0);
        use_effect(|| (), deps![count]);
        let _node: MutableRef<Option<u32>> = use_ref(None);
        Some(text(props.get_number("n").unwrap_or_default()))
    });
    let mut root = TestRoot::new();
    root.mount(create_element(view.clone(), props! { "n" => 0 }, vec![]))
        .expect("mount");
    for n in 1..5 {
        root.render(create_element(view.clone(), props! { "n" => n }, vec![]))
            .expect("rerender");
        assert_eq!(
            root.runtime().hook_kinds("0"),
            [HookKind::State, HookKind::Effect, HookKind::Ref]
        );
    }
}

fn flipping() -> Component {
    component(|props: &Props| {
        if props.get_bool("flip").unwrap_or_default() {
            let node = use_ref(1);
            Some(text(node.get()))
        } else {
            let (value, _) = use_state(|| 0);
            Some(text(value))
        }
    })
}

#[test]
fn mismatched_hook_is_replaced_under_log_policy() {
    let view = flipping();
    let mut root = TestRoot::new();
    root.mount(create_element(view.clone(), props! { "flip" => false }, vec![]))
        .expect("mount");
    assert_eq!(root.runtime().hook_kinds("0"), [HookKind::State]);

    root.render(create_element(view, props! { "flip" => true }, vec![]))
        .expect("flip");
    assert_eq!(root.runtime().hook_kinds("0"), [HookKind::Ref]);
    assert_eq!(root.html(), "1");
}

#[test]
#[should_panic(expected = "hook mismatch at 0[0]: expected ref, found state")]
fn mismatched_hook_panics_under_strict_policy() {
    let view = flipping();
    let mut root = TestRoot::with_config(RuntimeConfig::strict());
    root.mount(create_element(view.clone(), props! { "flip" => false }, vec![]))
        .expect("mount");
    let _ = root.render(create_element(view, props! { "flip" => true }, vec![]));
}

#[test]
fn updates_during_render_schedule_one_follow_up() {
    let renders = Recorder::new();
    let view = component({
        let renders = renders.clone();
        move |_: &Props| {
            let (count, set_count) = use_state(|| 0);
            renders.push(format!("render {count}"));
            if count == 0 {
                set_count.set(1);
                set_count.set(2);
            }
            Some(text(count))
        }
    });

    let mut root = TestRoot::new();
    root.mount_only(create_element(view, None, vec![]))
        .expect("mount");
    assert_eq!(root.runtime().pending_tasks(), [Task::Render]);

    assert_eq!(root.settle(), Ok(1));
    assert_eq!(renders.take(), ["render 0", "render 2"]);
    assert_eq!(root.html(), "2");
}

#[test]
fn state_set_from_effect_rerenders() {
    let view = component(|_: &Props| {
        let (ready, set_ready) = use_state(|| false);
        use_effect(move || set_ready.set(true), Some(vec![]));
        Some(text(if ready { "ready" } else { "loading" }))
    });
    let mut root = TestRoot::new();
    root.mount_only(create_element(view, None, vec![]))
        .expect("mount");
    assert_eq!(root.html(), "loading");
    assert_eq!(root.settle(), Ok(2));
    assert_eq!(root.html(), "ready");
}

#[test]
fn panicking_effect_does_not_stop_the_flush() {
    let log = Recorder::new();
    let faulty = component(|_: &Props| {
        use_effect(|| -> Cleanup { panic!("effect failed") }, Some(vec![]));
        Some(text("faulty"))
    });
    let probe = effect_probe(&log);

    let mut root = TestRoot::new();
    root.mount(create_element(
        "div",
        None,
        children![
            create_element(faulty, None, vec![]),
            create_element(probe, props! { "a" => 1 }, vec![]),
        ],
    ))
    .expect("mount");
    assert_eq!(log.take(), ["run 1"]);
    assert_eq!(root.text(), "faulty1");
}

#[test]
fn removing_a_subtree_cleans_up_parents_first() {
    let log = Recorder::new();
    let leaf = component({
        let log = log.clone();
        move |_: &Props| {
            let log = log.clone();
            use_effect(move || Cleanup::new(move || log.push("leaf")), Some(vec![]));
            Some(text("leaf"))
        }
    });
    let branch = component({
        let log = log.clone();
        let leaf = leaf.clone();
        move |_: &Props| {
            let log = log.clone();
            use_effect(move || Cleanup::new(move || log.push("branch")), Some(vec![]));
            Some(create_element("section", None, children![create_element(leaf.clone(), None, vec![])]))
        }
    });
    let tree = |show: bool| {
        create_element(
            "main",
            None,
            children![show.then(|| create_element(branch.clone(), None, vec![]))],
        )
    };

    let mut root = TestRoot::new();
    root.mount(tree(true)).expect("mount");
    assert!(log.is_empty());
    root.render(tree(false)).expect("remove");
    assert_eq!(log.take(), ["branch", "leaf"]);
    assert_eq!(root.html(), "<main></main>");
    assert!(root.runtime().hook_paths().is_empty());
}

#[test]
fn memo_and_ref_hooks_keep_values_between_renders() {
    let computed = Recorder::new();
    let refs: Slot<MutableRef<u32>> = slot();
    let callbacks: Rc<RefCell<Vec<Rc<dyn Fn() -> u32>>>> = Rc::default();
    let view = component({
        let computed = computed.clone();
        let refs = Rc::clone(&refs);
        let callbacks = Rc::clone(&callbacks);
        move |props: &Props| {
            let n = props.get_number("n").unwrap_or_default();
            let computed = computed.clone();
            let doubled = use_memo(
                move || {
                    computed.push("compute");
                    n * 2.0
                },
                deps![n],
            );
            let renders = use_ref(0_u32);
            *renders.borrow_mut() += 1;
            if let Some(previous) = refs.borrow().as_ref() {
                assert!(previous.ptr_eq(&renders));
            }
            refs.borrow_mut().replace(renders.clone());
            let callback: Rc<dyn Fn() -> u32> = Rc::new(|| 1);
            callbacks.borrow_mut().push(use_callback(callback, deps![]));
            Some(text(doubled))
        }
    });

    let mut root = TestRoot::new();
    root.mount(create_element(view.clone(), props! { "n" => 2 }, vec![]))
        .expect("mount");
    root.render(create_element(view.clone(), props! { "n" => 2 }, vec![]))
        .expect("same");
    root.render(create_element(view, props! { "n" => 3 }, vec![]))
        .expect("changed");

    assert_eq!(root.html(), "6");
    assert_eq!(computed.count("compute"), 2);
    assert_eq!(refs.borrow().as_ref().map(MutableRef::get), Some(3));
    let callbacks = callbacks.borrow();
    assert_eq!(callbacks.len(), 3);
    assert!(callbacks.iter().all(|cb| Rc::ptr_eq(cb, &callbacks[0])));
}

#[test]
fn setter_after_unmount_is_harmless() {
    let setter: Slot<SetState<i32>> = slot();
    let view = component({
        let setter = Rc::clone(&setter);
        move |_: &Props| {
            let (value, set_value) = use_state(|| 0);
            setter.borrow_mut().replace(set_value);
            Some(text(value))
        }
    });
    let mut root = TestRoot::new();
    root.mount(create_element(view, None, vec![])).expect("mount");
    root.unmount();

    let set_value = setter.borrow().clone().expect("setter");
    set_value.set(4);
    assert_eq!(root.settle(), Ok(1));
    assert_eq!(root.html(), "");
}

#[test]
fn independent_roots_keep_separate_state() {
    let setters: Rc<RefCell<Vec<SetState<i32>>>> = Rc::default();
    let view = component({
        let setters = Rc::clone(&setters);
        move |_: &Props| {
            let (value, set_value) = use_state(|| 0);
            let mut setters = setters.borrow_mut();
            if setters.len() < 2 {
                setters.push(set_value);
            }
            Some(text(value))
        }
    });

    let mut first = TestRoot::new();
    let mut second = TestRoot::new();
    first.mount(create_element(view.clone(), None, vec![])).expect("mount first");
    second.mount(create_element(view, None, vec![])).expect("mount second");

    let second_setter = setters.borrow()[1].clone();
    second_setter.set(9);
    assert!(!first.runtime().has_pending_tasks());
    first.settle().expect("settle first");
    second.settle().expect("settle second");
    assert_eq!(first.html(), "0");
    assert_eq!(second.html(), "9");
}
