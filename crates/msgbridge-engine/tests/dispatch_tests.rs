mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

#[test]
fn test_run_on_main_returns_closure_result() {
    let bridge = common::bridge();
    assert!(!bridge.is_main_thread());
    let main_thread = common::sim().main_thread_id();

    let (ran_on, on_main) = bridge.run_on_main(|| {
        (thread::current().id(), msgbridge_engine::bridge().is_main_thread())
    });
    assert_eq!(ran_on, main_thread);
    assert!(on_main);
}

#[test]
fn test_concurrent_posts_all_run_once() {
    let bridge = common::bridge();
    let counter = Arc::new(AtomicUsize::new(0));

    let workers: Vec<_> = (0..8)
        .map(|_| {
            let counter = Arc::clone(&counter);
            thread::spawn(move || {
                common::bridge().run_on_main(move || counter.fetch_add(1, Ordering::SeqCst))
            })
        })
        .collect();
    let mut seen: Vec<usize> = workers.into_iter().map(|w| w.join().unwrap()).collect();

    assert_eq!(counter.load(Ordering::SeqCst), 8);
    seen.sort_unstable();
    assert_eq!(seen, (0..8).collect::<Vec<_>>());
    assert!(!bridge.is_main_thread());
}

#[test]
fn test_nested_post_runs_in_place() {
    let bridge = common::bridge();
    let depth = bridge.run_on_main(|| {
        let bridge = msgbridge_engine::bridge();
        let outer = thread::current().id();
        let inner = bridge.run_on_main(move || thread::current().id() == outer);
        inner as usize + 1
    });
    assert_eq!(depth, 2);
}

#[test]
fn test_main_thread_turn_has_a_pool() {
    let bridge = common::bridge();
    let (before, after, text) = bridge.run_on_main(|| {
        let bridge = msgbridge_engine::bridge();
        let sim = common::sim();
        let before = sim.pending_autoreleases();
        let text = bridge
            .ns_string("posted")
            .map(|s| unsafe { bridge.string_from(s) });
        (before, sim.pending_autoreleases(), text)
    });
    assert_eq!(after, before + 1);
    assert_eq!(text.unwrap(), "posted");
}
