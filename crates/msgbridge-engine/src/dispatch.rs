//! Main-thread dispatch
//!
//! Host closures are parked in a pending map under a fresh integer key. Only
//! the key crosses to the foreign side, boxed in a number object and handed to
//! the runtime's own `performSelectorOnMainThread:withObject:waitUntilDone:`
//! on an instance of the synthesized callback class. On the main thread the
//! callback method takes the closure out of the map and runs it.

use crate::bridge::Bridge;
use crate::class::{MethodCall, SynthesizedClass};
use crate::invoke;
use crossbeam::channel;
use msgbridge_sdk::{Arg, ResultShape, Value};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

type Job = Box<dyn FnOnce() + Send>;

/// Selector of the callback method
pub const CALLBACK_SELECTOR: &str = "invoke:";

struct Pending {
    next_key: u64,
    jobs: HashMap<u64, Job>,
}

/// Closures waiting to run on the main thread
pub(crate) struct MainThreadDispatcher {
    pending: Mutex<Pending>,
}

impl MainThreadDispatcher {
    pub(crate) fn new() -> Self {
        Self {
            pending: Mutex::new(Pending {
                next_key: 1,
                jobs: HashMap::new(),
            }),
        }
    }

    fn register(&self, job: Job) -> u64 {
        let mut pending = self.pending.lock();
        let key = pending.next_key;
        pending.next_key += 1;
        pending.jobs.insert(key, job);
        key
    }

    fn take(&self, key: u64) -> Option<Job> {
        self.pending.lock().jobs.remove(&key)
    }

    /// Number of closures posted but not yet run
    pub(crate) fn pending(&self) -> usize {
        self.pending.lock().jobs.len()
    }
}

/// Body of the callback class's `invoke:` method
fn run_pending(call: &MethodCall) -> Value {
    let bridge = crate::bridge();
    // SAFETY: the poster passes a number object holding the key
    let key = unsafe { bridge.number_value(call.object(0)) };
    match bridge.dispatcher.take(key) {
        Some(job) => job(),
        None => tracing::debug!(key, "no pending closure for main-thread callback"),
    }
    // SAFETY: the poster allocated this instance for exactly one callback
    unsafe { bridge.release(call.receiver) };
    Value::Void
}

impl Bridge {
    pub(crate) fn define_callback_class(&self) -> Arc<SynthesizedClass> {
        let name = self.options.class_name("MainThreadCallback");
        self.define_class(&name, self.classes.object)
            .add_method(CALLBACK_SELECTOR, "v@:@", run_pending)
            .publish()
    }

    /// True on the runtime's main thread
    pub fn is_main_thread(&self) -> bool {
        // SAFETY: +[NSThread isMainThread] is `B@:`
        unsafe {
            invoke::send::<bool>(
                self.runtime.as_ref(),
                self.classes.thread,
                self.sels.is_main_thread,
                &[],
            )
        }
    }

    /// Run `f` on the main thread and return its result.
    ///
    /// On the main thread `f` runs in place. Elsewhere the call blocks until
    /// the main thread has run `f`; there is no timeout, so a stalled main
    /// thread stalls every caller.
    pub fn run_on_main<R, F>(&self, f: F) -> R
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.is_main_thread() {
            return f();
        }

        let (done, result) = channel::bounded::<R>(1);
        let key = self.dispatcher.register(Box::new(move || {
            let _ = done.send(f());
        }));
        tracing::trace!(key, "posting closure to main thread");

        self.with_scope(|_| {
            let callback = match self.synthesized().callback.instantiate() {
                Ok(callback) => callback,
                Err(e) => fatal!("cannot create main-thread callback: {}", e),
            };
            let number = self.number_u64(key);
            let invoke_sel = self.sel(CALLBACK_SELECTOR);
            // SAFETY: performSelectorOnMainThread:withObject:waitUntilDone: is `v@::@B`
            unsafe {
                invoke::invoke(
                    self.runtime.as_ref(),
                    callback,
                    self.sels.perform_on_main,
                    &[Arg::Sel(invoke_sel), Arg::object(number), Arg::Bool(true)],
                    &ResultShape::Void,
                );
            }
        });

        match result.recv() {
            Ok(value) => value,
            Err(_) => fatal!("main thread dropped closure {} without running it", key),
        }
    }

    /// Closures posted to the main thread that have not run yet
    pub fn pending_main_thread_closures(&self) -> usize {
        self.dispatcher.pending()
    }
}
