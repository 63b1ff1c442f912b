mod common;

use std::panic::{self, AssertUnwindSafe};

#[test]
fn test_release_frees_transient_objects() {
    let bridge = common::bridge();
    let sim = common::sim();

    let mut scope = bridge.acquire_scope();
    let pool = scope.pool();
    let transient = bridge.ns_string("transient").unwrap();
    let kept = unsafe { bridge.retain(bridge.ns_string("kept").unwrap()) };
    assert!(sim.is_live(transient));
    assert_eq!(sim.pending_autoreleases(), 2);

    scope.release();
    assert!(scope.is_released());
    assert!(!sim.is_live(transient));
    assert!(!sim.is_live(pool));
    assert!(sim.is_live(kept));
    assert_eq!(unsafe { bridge.string_from(kept) }, "kept");

    // second release is a no-op
    scope.release();
    drop(scope);
    assert!(sim.is_live(kept));

    unsafe { bridge.release(kept) };
    assert!(!sim.is_live(kept));
}

#[test]
fn test_scopes_nest_in_stack_order() {
    let bridge = common::bridge();
    let sim = common::sim();

    bridge.with_scope(|_| {
        let outer = bridge.number_u64(1);
        let inner = bridge.with_scope(|_| {
            let inner = bridge.number_u64(2);
            assert!(sim.is_live(inner));
            inner
        });
        assert!(!sim.is_live(inner));
        assert!(sim.is_live(outer));
        assert_eq!(unsafe { bridge.number_value(outer) }, 1);
    });
}

#[test]
fn test_drop_releases_on_unwind() {
    let bridge = common::bridge();
    let sim = common::sim();
    let mut created = None;

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        bridge.with_scope(|_| {
            created = Some(bridge.number_u64(99));
            panic!("host failure inside scope");
        })
    }));

    assert!(result.is_err());
    let created = created.unwrap();
    assert!(!sim.is_live(created));
    assert_eq!(sim.pending_autoreleases(), 0);
}

#[test]
fn test_scope_result_passes_through() {
    let bridge = common::bridge();
    let text = bridge.with_scope(|scope| {
        assert!(!scope.is_released());
        let string = bridge.ns_string("copied out").unwrap();
        unsafe { bridge.string_from(string) }
    });
    assert_eq!(text, "copied out");
}
