//! Shared setup for integration tests
//!
//! Every test binary runs against the headless runtime. Class names are
//! process-wide, so tests that synthesize classes pick names unique to them.

#![allow(dead_code)]

use msgbridge_engine::runtime::SimRuntime;
use msgbridge_engine::{Bridge, BridgeOptions};
use std::sync::Arc;

/// The process-wide bridge on the simulated runtime
pub fn bridge() -> &'static Bridge {
    msgbridge_engine::initialize_with(BridgeOptions::sim())
}

/// The simulated runtime behind [`bridge`]
pub fn sim() -> &'static Arc<SimRuntime> {
    SimRuntime::global()
}
