//! Autorelease-pool lifetime scopes

use crate::bridge::Bridge;
use crate::invoke;
use crate::runtime::ForeignRuntime;
use msgbridge_sdk::{NativeHandle, ResultShape, Sel};
use std::marker::PhantomData;
use std::sync::Arc;

/// Bounds the lifetime of transient foreign objects autoreleased while it is
/// open.
///
/// Scopes nest in stack order on one thread and are released when dropped,
/// so every exit path (including unwinding) drains the pool. Releasing twice
/// is a no-op. Not `Send`: a pool belongs to the thread that opened it.
pub struct LifetimeScope {
    runtime: Arc<dyn ForeignRuntime>,
    drain: Sel,
    pool: NativeHandle,
    released: bool,
    _thread_bound: PhantomData<*const ()>,
}

impl LifetimeScope {
    /// The underlying pool object
    pub fn pool(&self) -> NativeHandle {
        self.pool
    }

    /// True once the pool has been drained
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Drain the pool, releasing everything autoreleased inside this scope
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        // SAFETY: drain is `v@:` and the pool was opened on this thread
        unsafe {
            invoke::invoke(
                self.runtime.as_ref(),
                self.pool,
                self.drain,
                &[],
                &ResultShape::Void,
            );
        }
        tracing::trace!(pool = %self.pool, "released scope");
    }
}

impl Drop for LifetimeScope {
    fn drop(&mut self) {
        self.release();
    }
}

impl Bridge {
    /// Open a new scope on the current thread
    pub fn acquire_scope(&self) -> LifetimeScope {
        // SAFETY: the pool class was resolved at start-up
        let pool = match unsafe { self.alloc_init(self.classes.autorelease_pool) } {
            Ok(pool) => pool,
            Err(e) => fatal!("cannot open an autorelease pool: {}", e),
        };
        tracing::trace!(pool = %pool, "acquired scope");
        LifetimeScope {
            runtime: Arc::clone(&self.runtime),
            drain: self.sels.drain,
            pool,
            released: false,
            _thread_bound: PhantomData,
        }
    }

    /// Run `f` inside a scope that is released when `f` returns or unwinds
    pub fn with_scope<R>(&self, f: impl FnOnce(&mut LifetimeScope) -> R) -> R {
        let mut scope = self.acquire_scope();
        let result = f(&mut scope);
        scope.release();
        result
    }
}
