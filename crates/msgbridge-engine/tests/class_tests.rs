mod common;

use msgbridge_engine::{handles, Arg, ClassState, ForeignRuntime, NSPoint, NativeStruct, Value};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn test_class_lifecycle_states() {
    let bridge = common::bridge();
    let name = "ClassTestsLifecycle";
    assert_eq!(bridge.class_state(name), ClassState::Unregistered);

    let builder = bridge.define_class(name, bridge.class_named("NSObject").unwrap());
    assert_eq!(bridge.class_state(name), ClassState::Defining);
    assert!(bridge.synthesized_class(name).is_none());

    let class = builder.add_method("ping", "v@:", |_| Value::Void).publish();
    assert_eq!(bridge.class_state(name), ClassState::Published);
    assert_eq!(class.name(), name);
    assert_eq!(class.method_encoding("ping"), Some("v@:"));
    assert!(!class.has_method("pong"));
    assert_eq!(bridge.class_named(name).unwrap(), class.handle());
    assert!(Arc::ptr_eq(&bridge.synthesized_class(name).unwrap(), &class));
}

#[test]
fn test_dropped_builder_gives_name_back() {
    let bridge = common::bridge();
    let sim = common::sim();
    let name = "ClassTestsAbandoned";
    let object = bridge.class_named("NSObject").unwrap();

    let builder = bridge
        .define_class(name, object)
        .add_handle_slot()
        .add_method("ping", "v@:", |_| Value::Void);
    let abandoned = builder.handle();
    drop(builder);
    assert_eq!(bridge.class_state(name), ClassState::Unregistered);
    assert!(bridge.class_named(name).is_err());
    assert!(sim.superclass(abandoned).is_nil());

    let class = bridge
        .define_class(name, object)
        .add_method("ping", "v@:", |_| Value::Void)
        .publish();
    assert_ne!(class.handle(), abandoned);
    assert_eq!(bridge.class_state(name), ClassState::Published);
}

#[test]
#[should_panic(expected = "already defined")]
fn test_redefining_a_class_is_fatal() {
    let bridge = common::bridge();
    let object = bridge.class_named("NSObject").unwrap();
    let _first = bridge.define_class("ClassTestsDuplicate", object);
    let _second = bridge.define_class("ClassTestsDuplicate", object);
}

#[test]
#[should_panic(expected = "already exists in the runtime")]
fn test_shadowing_a_runtime_class_is_fatal() {
    let bridge = common::bridge();
    let object = bridge.class_named("NSObject").unwrap();
    let _builder = bridge.define_class("NSView", object);
}

#[test]
#[should_panic(expected = "declares 0 arguments")]
fn test_encoding_must_match_selector_arity() {
    let bridge = common::bridge();
    let object = bridge.class_named("NSObject").unwrap();
    let _builder = bridge
        .define_class("ClassTestsArity", object)
        .add_method("takesOne:", "v@:", |_| Value::Void);
}

#[test]
#[should_panic(expected = "added twice")]
fn test_duplicate_method_is_fatal() {
    let bridge = common::bridge();
    let object = bridge.class_named("NSObject").unwrap();
    let _builder = bridge
        .define_class("ClassTestsTwice", object)
        .add_method("ping", "v@:", |_| Value::Void)
        .add_method("ping", "v@:", |_| Value::Void);
}

// ============================================================================
// Callbacks
// ============================================================================

fn counter_for(call: &msgbridge_engine::MethodCall) -> Option<Arc<AtomicI64>> {
    let class = msgbridge_engine::bridge().synthesized_class("ClassTestsCounter")?;
    unsafe { class.delegate::<AtomicI64>(call.receiver) }
}

#[test]
fn test_callback_recovers_stored_value() {
    let bridge = common::bridge();
    let class = bridge
        .define_class("ClassTestsCounter", bridge.class_named("NSObject").unwrap())
        .add_handle_slot()
        .add_method("add:", "q@:q", |call| match counter_for(call) {
            Some(counter) => {
                let amount = call.arg(0).as_i64();
                Value::Int(counter.fetch_add(amount, Ordering::SeqCst) + amount)
            }
            None => Value::Int(-1),
        })
        .publish();

    let instance = class.instantiate().unwrap();
    let add = bridge.sel("add:");
    let counter = Arc::new(AtomicI64::new(0));
    unsafe {
        assert_eq!(class.handle_of(instance), None);
        let unbound: i64 = bridge.send(instance, add, &[Arg::I64(3)]);
        assert_eq!(unbound, -1);

        let id = handles().store(counter.clone());
        class.set_handle(instance, Some(id));
        assert_eq!(class.handle_of(instance), Some(id));

        let total: i64 = bridge.send(instance, add, &[Arg::I64(5)]);
        assert_eq!(total, 5);
        let total: i64 = bridge.send(instance, add, &[Arg::I64(-12)]);
        assert_eq!(total, -7);
        assert_eq!(counter.load(Ordering::SeqCst), -7);

        assert!(handles().remove(id));
        let removed: i64 = bridge.send(instance, add, &[Arg::I64(1)]);
        assert_eq!(removed, -1);

        class.set_handle(instance, None);
        assert_eq!(class.handle_of(instance), None);
        bridge.release(instance);
    }
}

#[test]
fn test_float_and_struct_methods() {
    let bridge = common::bridge();
    let class = bridge
        .define_class("ClassTestsGeometry", bridge.class_named("NSObject").unwrap())
        .add_method("scale:by:", "d@:df", |call| {
            Value::Float(call.arg(0).as_f64() * call.arg(1).as_f64())
        })
        .add_method("mirror:", "{CGPoint=dd}@:{CGPoint=dd}", |call| {
            let point = call
                .arg(0)
                .as_struct_bytes()
                .and_then(NSPoint::from_bytes)
                .unwrap_or_default();
            Value::Struct(NSPoint::new(-point.x, -point.y).to_bytes())
        })
        .publish();
    let instance = class.instantiate().unwrap();

    let scaled: f64 =
        unsafe { bridge.send(instance, bridge.sel("scale:by:"), &[Arg::F64(1.5), Arg::F32(4.0)]) };
    assert_eq!(scaled, 6.0);

    let point = NSPoint::new(3.0, -8.5);
    let mirrored: NSPoint =
        unsafe { bridge.send(instance, bridge.sel("mirror:"), &[point.to_arg()]) };
    assert_eq!(mirrored, NSPoint::new(-3.0, 8.5));

    unsafe { bridge.release(instance) };
}

#[test]
fn test_slots_are_per_instance() {
    let bridge = common::bridge();
    let class = bridge
        .define_class("ClassTestsSlots", bridge.class_named("NSObject").unwrap())
        .add_handle_slot()
        .publish();
    let first = class.instantiate().unwrap();
    let second = class.instantiate().unwrap();

    let id = handles().store_value(String::from("first"));
    unsafe {
        class.set_handle(first, Some(id));
        assert_eq!(class.handle_of(first), Some(id));
        assert_eq!(class.handle_of(second), None);
        assert_eq!(
            class.delegate::<String>(first).as_deref().map(String::as_str),
            Some("first")
        );
        assert!(class.delegate::<i32>(first).is_none());

        handles().remove(id);
        bridge.release(first);
        bridge.release(second);
    }
}
