//! `msgbridge selftest` - Run the end-to-end bridge scenario.

use anyhow::{ensure, Context};
use msgbridge_engine::{handles, Backend, Bridge, Value};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

enum Outcome {
    Passed,
    Skipped(&'static str),
}

type Step = fn(&'static Bridge, usize) -> anyhow::Result<Outcome>;

pub fn execute(config: Option<PathBuf>, backend: Option<Backend>, threads: usize) -> anyhow::Result<()> {
    let options = super::load_options(config, backend)?;
    let bridge = msgbridge_engine::initialize_with(options);
    println!("Self-test on {} runtime", bridge.runtime().name());

    let steps: [(&str, Step); 4] = [
        ("class synthesis and callback", class_callback),
        ("concurrent main-thread dispatch", concurrent_dispatch),
        ("nested main-thread dispatch", nested_dispatch),
        ("lifetime scopes", scopes),
    ];

    let mut failed = 0;
    for (name, step) in steps {
        match step(bridge, threads) {
            Ok(Outcome::Passed) => println!("  ok      {}", name),
            Ok(Outcome::Skipped(reason)) => {
                tracing::debug!(step = name, reason, "step skipped");
                println!("  skipped {} ({})", name, reason);
            }
            Err(e) => {
                tracing::error!(step = name, "{:#}", e);
                println!("  FAILED  {}: {:#}", name, e);
                failed += 1;
            }
        }
    }

    ensure!(failed == 0, "{} of {} steps failed", failed, steps.len());
    println!("All steps passed.");
    Ok(())
}

fn class_callback(bridge: &'static Bridge, _threads: usize) -> anyhow::Result<Outcome> {
    let name = bridge.options().class_name("SelfTestProbe");
    let lookup = name.clone();
    let class = bridge
        .define_class(&name, bridge.class_named("NSObject")?)
        .add_handle_slot()
        .add_method("storedValue", "Q@:", move |call| {
            // SAFETY: the receiver is an instance of the class being looked up
            let stored = msgbridge_engine::bridge()
                .synthesized_class(&lookup)
                .and_then(|class| unsafe { class.delegate::<u64>(call.receiver) });
            Value::UInt(stored.map(|value| *value).unwrap_or(0))
        })
        .publish();

    let instance = class.instantiate().context("instantiating probe class")?;
    let id = handles().store_value(42u64);
    // SAFETY: instance is a fresh instance of the class, and storedValue was
    // installed above as `Q@:`
    let value: u64 = unsafe {
        class.set_handle(instance, Some(id));
        let value = bridge.send(instance, bridge.sel("storedValue"), &[]);
        handles().remove(id);
        class.set_handle(instance, None);
        bridge.release(instance);
        value
    };
    ensure!(value == 42, "callback returned {} instead of 42", value);
    Ok(Outcome::Passed)
}

fn concurrent_dispatch(bridge: &'static Bridge, threads: usize) -> anyhow::Result<Outcome> {
    // posts would wait on a run loop this thread never spins
    if bridge.is_main_thread() {
        return Ok(Outcome::Skipped("running on the main thread"));
    }
    let counter = Arc::new(AtomicUsize::new(0));
    let workers: Vec<_> = (0..threads)
        .map(|_| {
            let counter = Arc::clone(&counter);
            thread::spawn(move || {
                bridge.run_on_main(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
            })
        })
        .collect();
    for worker in workers {
        if worker.join().is_err() {
            anyhow::bail!("worker thread panicked");
        }
    }

    let total = counter.load(Ordering::SeqCst);
    ensure!(total == threads, "{} of {} closures ran", total, threads);
    ensure!(
        bridge.pending_main_thread_closures() == 0,
        "{} closures still pending",
        bridge.pending_main_thread_closures()
    );
    Ok(Outcome::Passed)
}

fn nested_dispatch(bridge: &'static Bridge, _threads: usize) -> anyhow::Result<Outcome> {
    let nested = bridge.run_on_main(|| {
        let bridge = msgbridge_engine::bridge();
        bridge.run_on_main(|| msgbridge_engine::bridge().is_main_thread())
    });
    ensure!(nested, "nested closure left the main thread");
    Ok(Outcome::Passed)
}

fn scopes(bridge: &'static Bridge, _threads: usize) -> anyhow::Result<Outcome> {
    let mut scope = bridge.acquire_scope();
    let string = bridge.ns_string("scoped")?;
    // SAFETY: the string is alive until the scope is released
    let text = unsafe { bridge.string_from(string) };
    scope.release();
    ensure!(scope.is_released(), "scope not released");
    scope.release();
    ensure!(text == "scoped", "string came back as {:?}", text);
    Ok(Outcome::Passed)
}
