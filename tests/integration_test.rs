use std::cell::{Cell, RefCell};
use std::rc::Rc;

use script_bridge::*;
use serde_json::json;

fn bridge() -> Bridge {
    Bridge::with_defaults().expect("bridge")
}

fn script(value: HostValue) -> ScriptObject {
    value.as_script().cloned().expect("script object")
}

/// 只暴露 length 的宿主对象
struct Sized3;

impl HostObject for Sized3 {
    fn get(&self, _scope: &Scope<'_>, key: &HostValue) -> BridgeResult<HostValue> {
        Ok(match key.as_str() {
            Some("length") => HostValue::Int(3),
            _ => HostValue::Null,
        })
    }
}

/// 记录写入的宿主对象
#[derive(Default)]
struct Slots {
    values: RefCell<Vec<(String, HostValue)>>,
}

impl HostObject for Slots {
    fn get(&self, _scope: &Scope<'_>, key: &HostValue) -> BridgeResult<HostValue> {
        let name = key.clone().coerce::<String>()?;
        Ok(self
            .values
            .borrow()
            .iter()
            .rev()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.clone())
            .unwrap_or(HostValue::Null))
    }

    fn set(&self, _scope: &Scope<'_>, key: &HostValue, value: HostValue) -> BridgeResult<bool> {
        let name = key.clone().coerce::<String>()?;
        self.values.borrow_mut().push((name, value));
        Ok(true)
    }
}

fn failing(message: &'static str) -> HostValue {
    HostValue::function("fail", move |_, _, _| Err(HostException::new(message).into()))
}

/// 以 `name` 开头的栈帧数
fn frame_count(frames: &[String], name: &str) -> usize {
    frames.iter().filter(|frame| frame.starts_with(name)).count()
}

// ============================================================================
// 场景
// ============================================================================

#[test]
fn test_property_round_trip() -> anyhow::Result<()> {
    let bridge = Bridge::with_defaults()?;
    let object = bridge.evaluate("({})", "props.js")?.coerce::<ScriptObject>()?;
    assert!(bridge.set_key(&object, "x".into(), &HostValue::Int(42))?);
    assert_eq!(bridge.get_key(&object, "x".into())?, HostValue::Int(42));
    assert!(bridge.get_key(&object, "missing".into())?.is_undefined());
    Ok(())
}

#[test]
fn test_index_keys() {
    let bridge = bridge();
    let array = script(bridge.evaluate("[10, 20, 30]", "array.js").unwrap());
    assert_eq!(bridge.get_key(&array, 1u32.into()).unwrap(), HostValue::Int(20));
    assert_eq!(bridge.get_key(&array, "length".into()).unwrap(), HostValue::Int(3));
    assert!(array.set(&bridge, 3u32, 40).unwrap());
    assert_eq!(array.get(&bridge, "length").unwrap(), HostValue::Int(4));
}

#[test]
fn test_call_marshalling() -> anyhow::Result<()> {
    let bridge = Bridge::with_defaults()?;
    let func = bridge.compile(
        "function (n, s, b) { return typeof n + ':' + typeof s + ':' + typeof b; }",
        "tags.js",
    )?;
    let result = bridge.call(&func, &[HostValue::Int(1), "a".into(), true.into()])?;
    assert_eq!(result.coerce::<String>()?, "number:string:boolean");
    Ok(())
}

#[test]
fn test_proxy_delegation() {
    let bridge = bridge();
    bridge.set_global_property("obj", HostValue::object(Sized3)).unwrap();
    assert_eq!(
        bridge.evaluate("obj.length === 3", "proxy.js").unwrap(),
        HostValue::Bool(true)
    );
    assert_eq!(
        bridge.evaluate("'length' in obj && !('width' in obj)", "proxy.js").unwrap(),
        HostValue::Bool(true)
    );
    assert_eq!(
        bridge.evaluate("obj[Symbol.iterator]", "proxy.js").unwrap(),
        HostValue::Null
    );
}

#[test]
fn test_proxy_set_reaches_host() {
    let bridge = bridge();
    let slots = Rc::new(Slots::default());
    bridge
        .set_global_property("slots", HostValue::Object(slots.clone()))
        .unwrap();
    let result = bridge
        .evaluate("slots.answer = 41; slots.answer + 1", "slots.js")
        .unwrap();
    assert_eq!(result, HostValue::Int(42));
    assert_eq!(slots.values.borrow()[0].0, "answer");
}

#[test]
fn test_cross_engine_object() {
    let a = bridge();
    let b = bridge();
    let object = a.evaluate("({ value: 7 })", "a.js").unwrap();

    let plus_one = b.compile("function (o) { return o.value + 1; }", "b.js").unwrap();
    assert_eq!(b.call(&plus_one, &[object.clone()]).unwrap(), HostValue::Int(8));

    // 从 B 返回的是同一个宿主值，而不是 B 中的新包装
    let identity = b.compile("function (o) { return o; }", "b.js").unwrap();
    let returned = b.call(&identity, &[object.clone()]).unwrap();
    assert_eq!(returned, object);
    assert_eq!(script(returned).bridge_id(), a.id());

    let write = b.compile("function (o) { o.value = 9; }", "b.js").unwrap();
    b.call(&write, &[object.clone()]).unwrap();
    assert_eq!(a.get_key(&script(object), "value".into()).unwrap(), HostValue::Int(9));
}

#[test]
fn test_foreign_object_through_facade() {
    let a = bridge();
    let b = bridge();
    let object = script(a.evaluate("({ n: 5 })", "a.js").unwrap());
    // B 的接口操作 A 的对象时交给 A 处理
    assert_eq!(b.get_key(&object, "n".into()).unwrap(), HostValue::Int(5));
}

#[test]
fn test_foreign_access_while_owner_is_running() {
    let a = bridge();
    let b = Rc::new(bridge());
    let read = b.compile("function (o) { return o.value + 1; }", "b.js").unwrap();

    // A 的回调里由 B 读取 A 的对象，A 此时仍在运行
    let via = b.clone();
    a.set_global_property(
        "viaB",
        HostValue::function("viaB", move |_, _, args| via.call(&read, &args)),
    )
    .unwrap();
    assert_eq!(a.evaluate("viaB({ value: 1 })", "a.js").unwrap(), HostValue::Int(2));
}

// ============================================================================
// 身份与终结
// ============================================================================

#[test]
fn test_identity_stability() {
    let bridge = bridge();
    let first = bridge.evaluate("globalThis.o = {}; o", "id.js").unwrap();
    let second = bridge.evaluate("o", "id.js").unwrap();
    assert_eq!(first, second);

    let global = bridge.global().unwrap();
    let third = bridge.get_key(&global, "o".into()).unwrap();
    assert_eq!(first, third);
    assert_eq!(bridge.stats().stashed_objects, 2);
}

#[test]
fn test_identity_is_per_bridge() {
    let a = bridge();
    let b = bridge();
    let from_a = a.evaluate("({})", "a.js").unwrap();
    let from_b = b.evaluate("({})", "b.js").unwrap();
    assert_ne!(from_a, from_b);
    assert_ne!(script(from_a).bridge_id(), script(from_b).bridge_id());
}

#[test]
fn test_finalization_is_idempotent() {
    let bridge = bridge();
    let object = script(bridge.evaluate("({})", "fin.js").unwrap());
    let id = object.id();
    drop(object);
    bridge.notify_host_wrapper_finalized(id);
    bridge.notify_host_wrapper_finalized(id);
    assert_eq!(bridge.stats().stashed_objects, 0);
    assert_eq!(bridge.stats().pending_finalizations, 0);
}

#[test]
fn test_stale_wrapper_fails_with_marshalling_error() {
    let bridge = bridge();
    let object = script(bridge.evaluate("({ a: 1 })", "stale.js").unwrap());
    bridge.notify_host_wrapper_finalized(object.id());
    assert!(matches!(
        bridge.get_key(&object, "a".into()),
        Err(BridgeError::Marshalling(MarshalError::StaleReference(id))) if id == object.id()
    ));
    assert!(matches!(
        bridge.call(&object, &[]),
        Err(BridgeError::Marshalling(MarshalError::StaleReference(_)))
    ));
}

#[test]
fn test_dead_wrapper_link_self_heals() {
    let bridge = bridge();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let record = seen.clone();
    bridge
        .set_global_property(
            "probe",
            HostValue::function("probe", move |_, _, args| {
                // 参数在返回时释放，包装随之死亡
                let object = args[0].as_script().cloned().expect("script object");
                record.borrow_mut().push(object.id());
                Ok(HostValue::Null)
            }),
        )
        .unwrap();
    bridge
        .evaluate("const target = {}; probe(target); probe(target);", "heal.js")
        .unwrap();
    let seen = seen.borrow();
    assert_eq!(seen.len(), 2);
    assert_ne!(seen[0], seen[1]);
    bridge.gc().unwrap();
    assert_eq!(bridge.stats().stashed_objects, 0);
}

#[test]
fn test_proxy_finalization_releases_host_object() {
    let bridge = bridge();
    let alive = Rc::new(Sized3);
    bridge
        .set_global_property("tmp", HostValue::Object(alive.clone()))
        .unwrap();
    assert_eq!(bridge.stats().host_references, 1);
    assert!(Rc::strong_count(&alive) > 1);

    bridge.evaluate("delete globalThis.tmp", "release.js").unwrap();
    bridge.gc().unwrap();
    assert_eq!(bridge.stats().host_references, 0);
    assert_eq!(Rc::strong_count(&alive), 1);
}

// ============================================================================
// 异常
// ============================================================================

#[test]
fn test_script_error_carries_source() {
    let bridge = bridge();
    match bridge.evaluate("throw new Error('boom')", "boom.js") {
        Err(BridgeError::Script(e)) => {
            assert_eq!(e.message(), "boom");
            assert_eq!(e.source(), Some("boom.js"));
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_non_error_throw() {
    let bridge = bridge();
    match bridge.evaluate("throw 'plain'", "plain.js") {
        Err(BridgeError::Script(e)) => assert_eq!(e.message(), "plain"),
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_host_error_round_trip() {
    let bridge = bridge();
    bridge.set_global_property("fail", failing("host failure")).unwrap();
    match bridge.evaluate("fail()", "host.js") {
        Err(BridgeError::Host(e)) => {
            assert_eq!(e.message(), "host failure");
            assert_eq!(e.host_frames().len(), 1);
            assert!(!e.script_frames().is_empty());
            assert!(e.stack_trace().contains("[host]"));
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_host_error_visible_to_script() {
    let bridge = bridge();
    bridge.set_global_property("fail", failing("host failure")).unwrap();
    let result = bridge
        .evaluate(
            "try { fail(); } catch (e) { (e instanceof Error) + ':' + e.message }",
            "catch.js",
        )
        .unwrap();
    assert_eq!(result, HostValue::from("true:host failure"));
}

#[test]
fn test_stack_merge_idempotence() {
    let bridge = bridge();
    bridge.set_global_property("fail", failing("again")).unwrap();
    let source = r#"
        function relay() { try { fail(); } catch (e) { throw e; } }
        function outer() { try { relay(); } catch (e) { throw e; } }
        function top() { try { outer(); } catch (e) { throw e; } }
        top();
    "#;
    let Err(BridgeError::Host(first)) = bridge.evaluate(source, "merge.js") else {
        panic!("expected host error");
    };
    let frames = first.script_frames();
    for name in ["relay (", "outer (", "top (", "<eval>"] {
        assert_eq!(frame_count(frames, name), 1, "{} in {:?}", name, frames);
    }
    assert_eq!(first.host_frames().len(), 1);
}

#[test]
fn test_recursive_frames_are_kept() {
    let bridge = bridge();
    let source = "function f(n) { if (n === 0) throw new Error('x'); return f(n - 1); } f(3);";
    let Err(BridgeError::Script(err)) = bridge.evaluate(source, "recursion.js") else {
        panic!("expected script error");
    };
    let frames = err.frames();
    assert_eq!(frame_count(frames, "f ("), 4, "{:?}", frames);
    assert!(frames[0].starts_with("f ("));
}

#[test]
fn test_helper_frames_are_hidden() {
    let bridge = bridge();
    bridge.set_global_property("fail", failing("hidden")).unwrap();
    let Err(BridgeError::Host(err)) = bridge.evaluate("fail()", "hidden.js") else {
        panic!("expected host error");
    };
    assert!(!err.stack_trace().contains("script_bridge:bootstrap"), "{}", err.stack_trace());
}

#[test]
fn test_host_error_crossing_twice() {
    let bridge = bridge();
    bridge.set_global_property("fail", failing("deep failure")).unwrap();
    bridge
        .set_global_property(
            "relay",
            HostValue::function("relay", |scope, _, args| {
                let callback = args[0].as_script().cloned().expect("callback");
                // 错误原样返回，再次进入引擎
                scope.call(&callback, &[])
            }),
        )
        .unwrap();
    let result = bridge.evaluate("relay(function inner() { fail(); })", "twice.js");
    let Err(BridgeError::Host(err)) = result else {
        panic!("expected host error, got {:?}", result);
    };
    assert_eq!(err.message(), "deep failure");
    assert_eq!(err.host_frames().len(), 1);
    let frames = err.script_frames();
    assert_eq!(frame_count(frames, "inner ("), 1, "{:?}", frames);
    assert_eq!(frame_count(frames, "<eval>"), 1, "{:?}", frames);
}

#[test]
fn test_memory_limit_reports_resource_exhaustion() {
    let mut config = BridgeConfig::default();
    config.runtime.memory_limit = Some(2 * 1024 * 1024);
    let bridge = Bridge::new(config).unwrap();

    let source = "(function () { const a = []; for (;;) a.push(new Array(1000).fill(1)); })()";
    match bridge.evaluate(source, "oom.js") {
        Err(BridgeError::ResourceExhausted(message)) => assert!(message.contains("out of memory")),
        other => panic!("expected resource exhaustion, got {:?}", other),
    }
    // 分配在函数返回后释放，上下文仍然可用
    assert_eq!(bridge.evaluate("1 + 1", "after.js").unwrap(), HostValue::Int(2));
}

// ============================================================================
// 数据
// ============================================================================

#[test]
fn test_buffers_are_copied_both_ways() {
    let bridge = bridge();
    let sum = bridge
        .compile(
            "function (buf) { let s = 0; for (const b of buf) s += b; buf[0] = 99; return s; }",
            "buf.js",
        )
        .unwrap();
    let input = vec![1u8, 2, 3, 4];
    let result = bridge.call(&sum, &[HostValue::Buffer(input.clone())]).unwrap();
    assert_eq!(result, HostValue::Int(10));
    assert_eq!(input, vec![1, 2, 3, 4]);

    let out = bridge
        .evaluate("new Uint8Array([5, 6, 7])", "buf.js")
        .unwrap();
    assert_eq!(out, HostValue::Buffer(vec![5, 6, 7]));
    let raw = bridge
        .evaluate("new Uint8Array([8, 9]).buffer", "buf.js")
        .unwrap();
    assert_eq!(raw, HostValue::Buffer(vec![8, 9]));
}

#[test]
fn test_json_values() {
    let bridge = bridge();
    let count = bridge
        .compile("function (o) { return o.items.length; }", "json.js")
        .unwrap();
    let result = bridge
        .call(&count, &[HostValue::json(r#"{"items":[1,2,3]}"#)])
        .unwrap();
    assert_eq!(result, HostValue::Int(3));
    assert!(matches!(
        bridge.call(&count, &[HostValue::json("{broken")]),
        Err(BridgeError::Marshalling(MarshalError::InvalidJson(_)))
    ));
}

#[test]
fn test_record_write_through() {
    let bridge = bridge();
    let record = Record::new(json!({ "name": "ana", "scores": [1, 2] }));
    bridge.set_global_property("rec", record.clone()).unwrap();
    let length = bridge
        .evaluate("rec.name = 'bo'; rec.scores[2] = 3; rec.scores.length", "record.js")
        .unwrap();
    assert_eq!(length, HostValue::Int(3));
    assert_eq!(
        record.to_value(),
        json!({ "name": "bo", "scores": [1, 2, 3] })
    );
    assert_eq!(bridge.evaluate("rec", "record.js").unwrap(), HostValue::Record(record));
}

#[test]
fn test_large_integers_become_strings() {
    let bridge = bridge();
    assert_eq!(bridge.type_of(&HostValue::Long(i64::MAX)).unwrap(), "string");
    assert_eq!(bridge.type_of(&HostValue::Long(1 << 40)).unwrap(), "number");
}

#[test]
fn test_symbols_are_not_marshalled() {
    let bridge = bridge();
    assert!(matches!(
        bridge.evaluate("Symbol('x')", "symbol.js"),
        Err(BridgeError::Marshalling(MarshalError::Unsupported("symbol")))
    ));
}

/// 只用默认能力的宿主对象
struct Point {
    x: i32,
    y: i32,
}

impl HostObject for Point {}

#[test]
fn test_missing_host_property_is_undefined() {
    let bridge = bridge();
    bridge.set_global_property("point", HostValue::object(Point { x: 0, y: 0 })).unwrap();
    let result = bridge
        .evaluate("[typeof point.missing, 'missing' in point].join()", "missing.js")
        .unwrap();
    assert_eq!(result, HostValue::from("undefined,false"));
}

#[test]
fn test_host_coercion_replaces_proxy() {
    let bridge = bridge();
    bridge.register_host_coercion::<Point, _>(|p| {
        Ok(HostValue::Json(json!({ "x": p.x, "y": p.y }).to_string()))
    });
    bridge
        .set_global_property("point", HostValue::object(Point { x: 1, y: 2 }))
        .unwrap();
    bridge.set_global_property("slots", HostValue::object(Slots::default())).unwrap();

    let result = bridge.evaluate("JSON.stringify(point)", "point.js").unwrap();
    assert_eq!(result, HostValue::from(r#"{"x":1,"y":2}"#));
    // 未注册的类型仍然是代理
    assert_eq!(bridge.evaluate("typeof slots", "slots.js").unwrap(), HostValue::from("function"));
}

#[test]
fn test_script_coercion_by_constructor() {
    let bridge = bridge();
    bridge.register_script_coercion("Date", |scope, date| {
        scope.call_property(&date, &HostValue::from("getTime"), &[])
    });
    assert_eq!(bridge.evaluate("new Date(0)", "date.js").unwrap(), HostValue::Int(0));
    // 其他对象照常包装
    assert!(bridge.evaluate("({})", "plain.js").unwrap().as_script().is_some());
}

#[test]
fn test_stringify() {
    let bridge = bridge();
    let object = bridge.evaluate("({ a: [1, 'b'] })", "json.js").unwrap();
    assert_eq!(bridge.stringify(&object).unwrap(), r#"{"a":[1,"b"]}"#);
    assert_eq!(bridge.stringify(&HostValue::Int(3)).unwrap(), "3");
    let func = bridge.evaluate("(function named() {})", "json.js").unwrap();
    assert!(bridge.stringify(&func).unwrap().contains("named"));
}

// ============================================================================
// 调用接口
// ============================================================================

#[test]
fn test_call_property_method_and_constructor() {
    let bridge = bridge();
    let object = script(
        bridge
            .evaluate("({ n: 2, twice(x) { return x * this.n; } })", "calls.js")
            .unwrap(),
    );
    assert_eq!(
        bridge
            .call_property(&object, &HostValue::from("twice"), &[HostValue::Int(21)])
            .unwrap(),
        HostValue::Int(42)
    );

    let method = script(bridge.get_key(&object, "twice".into()).unwrap());
    let other = bridge.evaluate("({ n: 10 })", "calls.js").unwrap();
    assert_eq!(
        bridge.call_method(&method, &other, &[HostValue::Int(3)]).unwrap(),
        HostValue::Int(30)
    );

    let point = bridge
        .compile("function Point(x) { this.x = x; }", "calls.js")
        .unwrap();
    let instance = script(bridge.call_constructor(&point, &[HostValue::Int(5)]).unwrap());
    assert_eq!(instance.get(&bridge, "x").unwrap(), HostValue::Int(5));
}

#[test]
fn test_compile_rejects_non_functions() {
    let bridge = bridge();
    assert!(matches!(
        bridge.compile("1 + 1", "compile.js"),
        Err(BridgeError::Marshalling(MarshalError::TypeMismatch { expected: "function", .. }))
    ));
}

#[test]
fn test_host_callback_uses_scope() {
    let bridge = bridge();
    bridge
        .set_global_property(
            "twice",
            HostValue::function("twice", |scope, _, args| {
                let callback = args[0].as_script().cloned().expect("callback");
                let once = scope.call(&callback, &[HostValue::Int(1)])?.coerce::<i32>()?;
                let again = scope.call(&callback, &[HostValue::Int(once)])?;
                Ok(again)
            }),
        )
        .unwrap();
    assert_eq!(
        bridge.evaluate("twice(x => x + 10)", "scope.js").unwrap(),
        HostValue::Int(21)
    );
}

#[test]
fn test_host_constructor() {
    let bridge = bridge();
    bridge
        .set_global_property(
            "Pair",
            HostValue::function("Pair", |_, _, args| {
                Ok(HostValue::Record(Record::new(json!({
                    "left": args[0].as_i32(),
                    "right": args[1].as_i32(),
                }))))
            }),
        )
        .unwrap();
    assert_eq!(
        bridge.evaluate("const p = new Pair(1, 2); p.left + p.right", "ctor.js").unwrap(),
        HostValue::Int(3)
    );
}

#[test]
fn test_pending_jobs() {
    let bridge = bridge();
    bridge
        .evaluate(
            "globalThis.done = false; Promise.resolve(1).then(() => { done = true; });",
            "jobs.js",
        )
        .unwrap();
    assert!(bridge.has_pending_jobs());
    assert!(bridge.run_pending_jobs().unwrap() >= 1);
    assert!(!bridge.has_pending_jobs());
    assert_eq!(bridge.evaluate("done", "jobs.js").unwrap(), HostValue::Bool(true));
}

#[test]
fn test_rejected_promises_do_not_stop_drain() {
    let bridge = bridge();
    bridge
        .evaluate(
            r#"
            globalThis.count = 0;
            Promise.resolve().then(() => { throw new Error('x'); }).catch(() => count++);
            Promise.reject(new Error('y')).catch(() => {});
            Promise.resolve().then(() => count++);
            "#,
            "jobs.js",
        )
        .unwrap();
    bridge.run_pending_jobs().unwrap();
    assert_eq!(bridge.evaluate("count", "jobs.js").unwrap().as_i32(), Some(2));
}

#[test]
fn test_job_budget() {
    let mut config = BridgeConfig::default();
    config.jobs.max_jobs_per_drain = Some(1);
    let bridge = Bridge::new(config).unwrap();
    bridge
        .evaluate("Promise.resolve().then(() => 1); Promise.resolve().then(() => 2);", "budget.js")
        .unwrap();
    assert_eq!(bridge.run_pending_jobs().unwrap(), 1);
    assert!(bridge.has_pending_jobs());
    assert_eq!(bridge.run_pending_jobs().unwrap(), 1);
}

#[test]
fn test_type_of() {
    let bridge = bridge();
    assert_eq!(bridge.type_of(&HostValue::Int(1)).unwrap(), "number");
    assert_eq!(bridge.type_of(&HostValue::Null).unwrap(), "object");
    assert_eq!(bridge.type_of(&HostValue::object(Sized3)).unwrap(), "function");
}

#[test]
fn test_closed_bridge_rejects_calls() {
    let bridge = bridge();
    bridge.close();
    assert!(bridge.is_closed());
    assert!(matches!(
        bridge.evaluate("1", "closed.js"),
        Err(BridgeError::ContextClosed)
    ));
    assert!(!bridge.has_pending_jobs());
}

#[test]
fn test_script_time_is_tracked() {
    let bridge = bridge();
    bridge
        .evaluate("let s = 0; for (let i = 0; i < 10000; i++) s += i; s", "time.js")
        .unwrap();
    assert!(bridge.stats().script_time > std::time::Duration::ZERO);
    bridge.reset_script_time();
    assert_eq!(bridge.stats().script_time, std::time::Duration::ZERO);
}

// ============================================================================
// 调试器
// ============================================================================

#[derive(Default)]
struct RecordingHook {
    attached: Cell<bool>,
    cooperations: Cell<u32>,
    notifications: RefCell<Vec<usize>>,
}

struct HookHandle(Rc<RecordingHook>);

impl DebugHook for HookHandle {
    fn attach(&self, _connection: &str) -> BridgeResult<()> {
        self.0.attached.set(true);
        Ok(())
    }

    fn cooperate(&self) {
        self.0.cooperations.set(self.0.cooperations.get() + 1);
    }

    fn is_attached(&self) -> bool {
        self.0.attached.get()
    }

    fn notify(&self, args: &[HostValue]) {
        self.0.notifications.borrow_mut().push(args.len());
    }
}

#[test]
fn test_debug_hook_pass_through() {
    let bridge = bridge();
    assert!(!bridge.is_debugging());
    assert!(bridge.wait_for_debugger("tcp:9229").is_ok());

    let hook = Rc::new(RecordingHook::default());
    bridge.set_debug_hook(Box::new(HookHandle(hook.clone())));
    bridge.wait_for_debugger("tcp:9229").unwrap();
    bridge.cooperate_debugger();
    bridge.debugger_notify(&[HostValue::Int(1), HostValue::Null]);
    assert!(bridge.is_debugging());
    assert_eq!(hook.cooperations.get(), 1);
    assert_eq!(*hook.notifications.borrow(), vec![2]);
}
