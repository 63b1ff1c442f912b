//! Selector interning
//!
//! Selectors are content-addressed by name: registered once, cached for the
//! life of the process.

use crate::runtime::ForeignRuntime;
use dashmap::DashMap;
use msgbridge_sdk::Sel;

/// Name-to-selector cache in front of the runtime's own registry.
#[derive(Debug, Default)]
pub struct SelectorCache {
    cache: DashMap<String, Sel>,
}

impl SelectorCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Selector for `name`, registering it on first use
    pub fn get(&self, runtime: &dyn ForeignRuntime, name: &str) -> Sel {
        if let Some(sel) = self.cache.get(name) {
            return *sel;
        }
        *self
            .cache
            .entry(name.to_string())
            .or_insert_with(|| runtime.register_selector(name))
    }

    /// Number of cached selectors
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// True when nothing has been registered through this cache
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

macro_rules! well_known {
    ($($field:ident => $name:literal),* $(,)?) => {
        /// Selectors the bridge itself sends, registered once at start-up.
        #[derive(Debug, Clone, Copy)]
        #[allow(missing_docs)]
        pub struct Selectors {
            $(pub $field: Sel,)*
        }

        impl Selectors {
            /// Register every well-known selector through `cache`
            pub fn register(cache: &SelectorCache, runtime: &dyn ForeignRuntime) -> Self {
                Self {
                    $($field: cache.get(runtime, $name),)*
                }
            }
        }
    };
}

well_known! {
    alloc => "alloc",
    init => "init",
    new => "new",
    retain => "retain",
    release => "release",
    autorelease => "autorelease",
    retain_count => "retainCount",
    class => "class",
    drain => "drain",
    is_main_thread => "isMainThread",
    perform_on_main => "performSelectorOnMainThread:withObject:waitUntilDone:",
    number_with_u64 => "numberWithUnsignedLongLong:",
    u64_value => "unsignedLongLongValue",
    array => "array",
    count => "count",
    object_at_index => "objectAtIndex:",
    string_with_utf8 => "stringWithUTF8String:",
    utf8_string => "UTF8String",
    window => "window",
    make_first_responder => "makeFirstResponder:",
    frame => "frame",
    tracking_areas => "trackingAreas",
    add_tracking_area => "addTrackingArea:",
    remove_tracking_area => "removeTrackingArea:",
    update_tracking_areas => "updateTrackingAreas",
    init_tracking_area => "initWithRect:options:owner:userInfo:",
    object => "object",
    dragging_pasteboard => "draggingPasteboard",
    property_list_for_type => "propertyListForType:",
    location_in_window => "locationInWindow",
    key_code => "keyCode",
    modifier_flags => "modifierFlags",
    characters => "characters",
    scrolling_delta_x => "scrollingDeltaX",
    scrolling_delta_y => "scrollingDeltaY",
    button_number => "buttonNumber",
    click_count => "clickCount",
    phase => "phase",
    magnification => "magnification",
    rotation => "rotation",
    delta_x => "deltaX",
    delta_y => "deltaY",
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::SimRuntime;

    #[test]
    fn test_cache_is_content_addressed() {
        let runtime = SimRuntime::global().as_ref();
        let cache = SelectorCache::new();
        let first = cache.get(runtime, "windowDidResize:");
        let second = cache.get(runtime, "windowDidResize:");
        assert_eq!(first, second);
        assert_eq!(cache.len(), 1);
        assert_eq!(runtime.register_selector("windowDidResize:"), first);
    }

    #[test]
    fn test_well_known_names() {
        let runtime = SimRuntime::global().as_ref();
        let cache = SelectorCache::new();
        let sels = Selectors::register(&cache, runtime);
        assert_eq!(runtime.selector_name(sels.count).as_deref(), Some("count"));
        assert_eq!(
            runtime.selector_name(sels.perform_on_main).as_deref(),
            Some("performSelectorOnMainThread:withObject:waitUntilDone:")
        );
        assert_ne!(sels.alloc, sels.init);
    }
}
