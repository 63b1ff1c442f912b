//! `msgbridge probe` - Initialize the bridge and report what it resolved.

use msgbridge_engine::{Backend, ClassState};
use std::path::PathBuf;

const FOUNDATION_CLASSES: &[&str] = &[
    "NSObject",
    "NSAutoreleasePool",
    "NSThread",
    "NSNumber",
    "NSArray",
    "NSString",
    "NSTrackingArea",
];

pub fn execute(
    config: Option<PathBuf>,
    backend: Option<Backend>,
    classes: Vec<String>,
) -> anyhow::Result<()> {
    let options = super::load_options(config, backend)?;
    let view_superclass = options.view_superclass.clone();
    let bridge = msgbridge_engine::initialize_with(options);

    println!("Runtime:      {}", bridge.runtime().name());
    println!("Backend:      {}", bridge.options().backend);
    println!();

    println!("Classes:");
    let mut missing = Vec::new();
    let names = FOUNDATION_CLASSES
        .iter()
        .map(|name| name.to_string())
        .chain(std::iter::once(view_superclass))
        .chain(classes);
    for name in names {
        match bridge.class_named(&name) {
            Ok(class) => println!("  {:<24} {}", name, class),
            Err(e) => {
                tracing::warn!(class = %name, "{}", e);
                println!("  {:<24} missing", name);
                missing.push(name);
            }
        }
    }

    println!();
    println!("Synthesized:");
    for suffix in ["MainThreadCallback", "View", "AppDelegate"] {
        let name = bridge.options().class_name(suffix);
        let state = match bridge.class_state(&name) {
            ClassState::Published => "published",
            ClassState::Defining => "defining",
            ClassState::Unregistered => "unregistered",
        };
        println!("  {:<24} {}", name, state);
    }

    let count = bridge.run_on_main(|| {
        let bridge = msgbridge_engine::bridge();
        // SAFETY: empty_array answers a live array inside the scope
        bridge.with_scope(|_| unsafe { bridge.array_count(bridge.empty_array()) })
    });
    println!();
    println!("[[NSArray array] count] = {}", count);

    if !missing.is_empty() {
        anyhow::bail!("missing classes: {}", missing.join(", "));
    }
    Ok(())
}
