//! Built-in classes of the simulated runtime
//!
//! Every method is a C function taking `(receiver, selector, args...)`, the
//! same shape a real message send lands on.

use super::object::{Kind, Payload, SimEvent};
use super::{SimRuntime, FILE_URL_TYPE};
use msgbridge_sdk::{NSPoint, NSRect};
use std::ffi::{c_char, CStr, CString};

fn sim() -> &'static SimRuntime {
    SimRuntime::global()
}

pub(super) fn install(sim: &SimRuntime) {
    let object = sim.define_builtin("NSObject", None, Some(Kind::Plain));
    sim.add_builtin_methods(
        object,
        &[
            ("init", object_init as usize),
            ("retain", object_retain as usize),
            ("release", object_release as usize),
            ("autorelease", object_autorelease as usize),
            ("retainCount", object_retain_count as usize),
            ("class", object_class as usize),
            ("respondsToSelector:", object_responds_to as usize),
            (
                "performSelectorOnMainThread:withObject:waitUntilDone:",
                object_perform_on_main as usize,
            ),
        ],
        &[
            ("alloc", class_alloc as usize),
            ("new", class_alloc as usize),
            ("class", class_self as usize),
            ("instancesRespondToSelector:", class_instances_respond_to as usize),
        ],
    );

    let thread = sim.define_builtin("NSThread", Some("NSObject"), None);
    sim.add_builtin_methods(thread, &[], &[("isMainThread", thread_is_main as usize)]);

    let pool = sim.define_builtin("NSAutoreleasePool", Some("NSObject"), Some(Kind::Pool));
    sim.add_builtin_methods(
        pool,
        &[("init", pool_init as usize), ("drain", pool_drain as usize)],
        &[],
    );

    let number = sim.define_builtin("NSNumber", Some("NSObject"), Some(Kind::Number));
    sim.add_builtin_methods(
        number,
        &[
            ("unsignedLongLongValue", number_u64 as usize),
            ("longLongValue", number_i64 as usize),
            ("intValue", number_i32 as usize),
        ],
        &[
            ("numberWithUnsignedLongLong:", number_with_u64 as usize),
            ("numberWithInt:", number_with_i32 as usize),
        ],
    );

    let array = sim.define_builtin("NSArray", Some("NSObject"), Some(Kind::Array));
    sim.add_builtin_methods(
        array,
        &[
            ("count", array_count as usize),
            ("objectAtIndex:", array_object_at as usize),
        ],
        &[("array", array_empty as usize)],
    );

    let string = sim.define_builtin("NSString", Some("NSObject"), Some(Kind::Str));
    sim.add_builtin_methods(
        string,
        &[
            ("initWithUTF8String:", string_init_utf8 as usize),
            ("UTF8String", string_utf8 as usize),
            ("length", string_length as usize),
        ],
        &[("stringWithUTF8String:", string_with_utf8 as usize)],
    );

    let responder = sim.define_builtin("NSResponder", Some("NSObject"), None);
    sim.add_builtin_methods(
        responder,
        &[("acceptsFirstResponder", responder_accepts_first as usize)],
        &[],
    );

    let view = sim.define_builtin("NSView", Some("NSResponder"), Some(Kind::View));
    sim.add_builtin_methods(
        view,
        &[
            ("initWithFrame:", view_init_with_frame as usize),
            ("frame", view_frame as usize),
            ("setFrame:", view_set_frame as usize),
            ("window", view_window as usize),
            ("trackingAreas", view_tracking_areas as usize),
            ("addTrackingArea:", view_add_tracking_area as usize),
            ("removeTrackingArea:", view_remove_tracking_area as usize),
            ("updateTrackingAreas", view_noop as usize),
            ("viewDidMoveToWindow", view_noop as usize),
        ],
        &[],
    );

    let window = sim.define_builtin("NSWindow", Some("NSResponder"), Some(Kind::Window));
    sim.add_builtin_methods(
        window,
        &[
            ("makeFirstResponder:", window_make_first_responder as usize),
            ("firstResponder", window_first_responder as usize),
        ],
        &[],
    );

    let tracking = sim.define_builtin("NSTrackingArea", Some("NSObject"), Some(Kind::TrackingArea));
    sim.add_builtin_methods(
        tracking,
        &[
            ("initWithRect:options:owner:userInfo:", tracking_init as usize),
            ("rect", tracking_rect as usize),
            ("options", tracking_options as usize),
            ("owner", tracking_owner as usize),
        ],
        &[],
    );

    let event = sim.define_builtin("NSEvent", Some("NSObject"), Some(Kind::Event));
    sim.add_builtin_methods(
        event,
        &[
            ("keyCode", event_key_code as usize),
            ("modifierFlags", event_modifier_flags as usize),
            ("characters", event_characters as usize),
            ("locationInWindow", event_location as usize),
            ("scrollingDeltaX", event_scrolling_delta_x as usize),
            ("scrollingDeltaY", event_scrolling_delta_y as usize),
            ("buttonNumber", event_button_number as usize),
            ("clickCount", event_click_count as usize),
            ("phase", event_phase as usize),
            ("magnification", event_magnification as usize),
            ("rotation", event_rotation as usize),
            ("deltaX", event_delta_x as usize),
            ("deltaY", event_delta_y as usize),
        ],
        &[],
    );

    let pasteboard = sim.define_builtin("NSPasteboard", Some("NSObject"), Some(Kind::Pasteboard));
    sim.add_builtin_methods(
        pasteboard,
        &[("propertyListForType:", pasteboard_property_list as usize)],
        &[],
    );

    let notification =
        sim.define_builtin("NSNotification", Some("NSObject"), Some(Kind::Notification));
    sim.add_builtin_methods(
        notification,
        &[("object", notification_object as usize)],
        &[],
    );

    let dragging = sim.define_builtin("SimDraggingInfo", Some("NSObject"), Some(Kind::DraggingInfo));
    sim.add_builtin_methods(
        dragging,
        &[("draggingPasteboard", dragging_pasteboard as usize)],
        &[],
    );
}

// ============================================================================
// NSObject
// ============================================================================

extern "C" fn class_alloc(class: usize, _sel: usize) -> usize {
    sim().instantiate(class)
}

extern "C" fn class_self(class: usize, _sel: usize) -> usize {
    class
}

extern "C" fn class_instances_respond_to(class: usize, _sel: usize, query: usize) -> u8 {
    sim().lookup_instance_method(class, query).is_some() as u8
}

extern "C" fn object_init(object: usize, _sel: usize) -> usize {
    object
}

extern "C" fn object_retain(object: usize, _sel: usize) -> usize {
    sim().retain_object(object);
    object
}

extern "C" fn object_release(object: usize, _sel: usize) {
    sim().release_object(object);
}

extern "C" fn object_autorelease(object: usize, _sel: usize) -> usize {
    sim().autorelease_object(object)
}

extern "C" fn object_retain_count(object: usize, _sel: usize) -> u64 {
    sim().retain_count_of(object) as u64
}

extern "C" fn object_class(object: usize, _sel: usize) -> usize {
    sim().class_of(object)
}

extern "C" fn object_responds_to(object: usize, _sel: usize, query: usize) -> u8 {
    let sim = sim();
    sim.lookup_instance_method(sim.class_of(object), query).is_some() as u8
}

extern "C" fn object_perform_on_main(
    object: usize,
    _sel: usize,
    target: usize,
    argument: usize,
    wait: u8,
) {
    sim().perform_on_main(object, target, argument, wait != 0);
}

// ============================================================================
// NSThread, NSAutoreleasePool
// ============================================================================

extern "C" fn thread_is_main(_class: usize, _sel: usize) -> u8 {
    sim().is_main_thread() as u8
}

extern "C" fn pool_init(pool: usize, _sel: usize) -> usize {
    sim().push_pool(pool);
    pool
}

extern "C" fn pool_drain(pool: usize, _sel: usize) {
    let sim = sim();
    sim.drain_pool(pool);
    sim.release_object(pool);
}

// ============================================================================
// NSNumber
// ============================================================================

fn number_bits(object: usize) -> u64 {
    sim().with_payload(object, |payload| match payload {
        Payload::Number(bits) => *bits,
        _ => 0,
    })
}

extern "C" fn number_with_u64(class: usize, _sel: usize, value: u64) -> usize {
    let sim = sim();
    sim.autorelease_object(sim.create_object(class, Payload::Number(value)))
}

extern "C" fn number_with_i32(class: usize, _sel: usize, value: i32) -> usize {
    let sim = sim();
    sim.autorelease_object(sim.create_object(class, Payload::Number(value as i64 as u64)))
}

extern "C" fn number_u64(object: usize, _sel: usize) -> u64 {
    number_bits(object)
}

extern "C" fn number_i64(object: usize, _sel: usize) -> i64 {
    number_bits(object) as i64
}

extern "C" fn number_i32(object: usize, _sel: usize) -> i32 {
    number_bits(object) as i32
}

// ============================================================================
// NSArray
// ============================================================================

fn array_items(object: usize) -> Vec<usize> {
    sim().with_payload(object, |payload| match payload {
        Payload::Array(items) => items.clone(),
        _ => Vec::new(),
    })
}

extern "C" fn array_empty(_class: usize, _sel: usize) -> usize {
    let sim = sim();
    sim.autorelease_object(sim.new_array(Vec::new()))
}

extern "C" fn array_count(object: usize, _sel: usize) -> u64 {
    array_items(object).len() as u64
}

extern "C" fn array_object_at(object: usize, _sel: usize, index: u64) -> usize {
    let items = array_items(object);
    match items.get(index as usize) {
        Some(item) => *item,
        None => fatal!("index {} beyond bounds of array of {}", index, items.len()),
    }
}

// ============================================================================
// NSString
// ============================================================================

fn utf8_argument(ptr: usize) -> Option<String> {
    if ptr == 0 {
        return None;
    }
    // SAFETY: callers pass NUL-terminated strings
    let text = unsafe { CStr::from_ptr(ptr as *const c_char) };
    Some(text.to_string_lossy().into_owned())
}

extern "C" fn string_with_utf8(class: usize, _sel: usize, ptr: usize) -> usize {
    let sim = sim();
    match utf8_argument(ptr) {
        Some(text) => sim.autorelease_object(sim.new_string(class, &text)),
        None => 0,
    }
}

extern "C" fn string_init_utf8(object: usize, _sel: usize, ptr: usize) -> usize {
    let sim = sim();
    match utf8_argument(ptr) {
        Some(text) => {
            let value = CString::new(text.replace('\0', "")).unwrap_or_default();
            sim.with_payload(object, |payload| *payload = Payload::Str(value));
            object
        }
        None => {
            sim.release_object(object);
            0
        }
    }
}

extern "C" fn string_utf8(object: usize, _sel: usize) -> usize {
    sim().with_payload(object, |payload| match payload {
        Payload::Str(s) => s.as_ptr() as usize,
        _ => 0,
    })
}

extern "C" fn string_length(object: usize, _sel: usize) -> u64 {
    sim().with_payload(object, |payload| match payload {
        Payload::Str(s) => s.to_string_lossy().encode_utf16().count() as u64,
        _ => 0,
    })
}

// ============================================================================
// NSResponder, NSView, NSWindow
// ============================================================================

extern "C" fn responder_accepts_first(_object: usize, _sel: usize) -> u8 {
    0
}

extern "C" fn view_init_with_frame(object: usize, _sel: usize, rect: NSRect) -> usize {
    view_set_frame(object, 0, rect);
    object
}

extern "C" fn view_frame(object: usize, _sel: usize) -> NSRect {
    sim().with_payload(object, |payload| match payload {
        Payload::View { frame, .. } => *frame,
        _ => NSRect::default(),
    })
}

extern "C" fn view_set_frame(object: usize, _sel: usize, rect: NSRect) {
    sim().with_payload(object, |payload| {
        if let Payload::View { frame, .. } = payload {
            *frame = rect;
        }
    });
}

extern "C" fn view_window(object: usize, _sel: usize) -> usize {
    sim().with_payload(object, |payload| match payload {
        Payload::View { window, .. } => *window,
        _ => 0,
    })
}

extern "C" fn view_tracking_areas(object: usize, _sel: usize) -> usize {
    let sim = sim();
    let areas = sim.with_payload(object, |payload| match payload {
        Payload::View { tracking, .. } => tracking.clone(),
        _ => Vec::new(),
    });
    for area in &areas {
        sim.retain_object(*area);
    }
    sim.autorelease_object(sim.new_array(areas))
}

extern "C" fn view_add_tracking_area(object: usize, _sel: usize, area: usize) {
    let sim = sim();
    sim.retain_object(area);
    sim.with_payload(object, |payload| {
        if let Payload::View { tracking, .. } = payload {
            tracking.push(area);
        }
    });
}

extern "C" fn view_remove_tracking_area(object: usize, _sel: usize, area: usize) {
    let sim = sim();
    let removed = sim.with_payload(object, |payload| match payload {
        Payload::View { tracking, .. } => match tracking.iter().position(|a| *a == area) {
            Some(index) => {
                tracking.remove(index);
                true
            }
            None => false,
        },
        _ => false,
    });
    if removed {
        sim.release_object(area);
    }
}

extern "C" fn view_noop(_object: usize, _sel: usize) {}

extern "C" fn window_make_first_responder(object: usize, _sel: usize, responder: usize) -> u8 {
    sim().with_payload(object, |payload| {
        if let Payload::Window { first_responder } = payload {
            *first_responder = responder;
        }
    });
    1
}

extern "C" fn window_first_responder(object: usize, _sel: usize) -> usize {
    sim().with_payload(object, |payload| match payload {
        Payload::Window { first_responder } => *first_responder,
        _ => 0,
    })
}

// ============================================================================
// NSTrackingArea
// ============================================================================

extern "C" fn tracking_init(
    object: usize,
    _sel: usize,
    area: NSRect,
    area_options: u64,
    area_owner: usize,
    _user_info: usize,
) -> usize {
    sim().with_payload(object, |payload| {
        if let Payload::TrackingArea { rect, options, owner } = payload {
            *rect = area;
            *options = area_options;
            *owner = area_owner;
        }
    });
    object
}

extern "C" fn tracking_rect(object: usize, _sel: usize) -> NSRect {
    sim().with_payload(object, |payload| match payload {
        Payload::TrackingArea { rect, .. } => *rect,
        _ => NSRect::default(),
    })
}

extern "C" fn tracking_options(object: usize, _sel: usize) -> u64 {
    sim().with_payload(object, |payload| match payload {
        Payload::TrackingArea { options, .. } => *options,
        _ => 0,
    })
}

extern "C" fn tracking_owner(object: usize, _sel: usize) -> usize {
    sim().with_payload(object, |payload| match payload {
        Payload::TrackingArea { owner, .. } => *owner,
        _ => 0,
    })
}

// ============================================================================
// NSEvent
// ============================================================================

fn event<R: Default>(object: usize, f: impl FnOnce(&SimEvent) -> R) -> R {
    sim().with_payload(object, |payload| match payload {
        Payload::Event(event) => f(event),
        _ => R::default(),
    })
}

extern "C" fn event_key_code(object: usize, _sel: usize) -> u16 {
    event(object, |e| e.key_code)
}

extern "C" fn event_modifier_flags(object: usize, _sel: usize) -> u64 {
    event(object, |e| e.modifier_flags)
}

extern "C" fn event_characters(object: usize, _sel: usize) -> usize {
    let sim = sim();
    let text = event(object, |e| e.characters.clone());
    sim.autorelease_object(sim.new_string(sim.builtin_class("NSString"), &text))
}

extern "C" fn event_location(object: usize, _sel: usize) -> NSPoint {
    event(object, |e| e.location)
}

extern "C" fn event_scrolling_delta_x(object: usize, _sel: usize) -> f64 {
    event(object, |e| e.scrolling_delta_x)
}

extern "C" fn event_scrolling_delta_y(object: usize, _sel: usize) -> f64 {
    event(object, |e| e.scrolling_delta_y)
}

extern "C" fn event_button_number(object: usize, _sel: usize) -> i64 {
    event(object, |e| e.button_number)
}

extern "C" fn event_click_count(object: usize, _sel: usize) -> i64 {
    event(object, |e| e.click_count)
}

extern "C" fn event_phase(object: usize, _sel: usize) -> u64 {
    event(object, |e| e.phase)
}

extern "C" fn event_magnification(object: usize, _sel: usize) -> f64 {
    event(object, |e| e.magnification)
}

extern "C" fn event_rotation(object: usize, _sel: usize) -> f32 {
    event(object, |e| e.rotation)
}

extern "C" fn event_delta_x(object: usize, _sel: usize) -> f64 {
    event(object, |e| e.delta_x)
}

extern "C" fn event_delta_y(object: usize, _sel: usize) -> f64 {
    event(object, |e| e.delta_y)
}

// ============================================================================
// Pasteboard, notifications, dragging
// ============================================================================

extern "C" fn pasteboard_property_list(object: usize, _sel: usize, type_name: usize) -> usize {
    let sim = sim();
    if sim.string_value(type_name).as_deref() != Some(FILE_URL_TYPE) {
        return 0;
    }
    let files = sim.with_payload(object, |payload| match payload {
        Payload::Pasteboard { files } => files.clone(),
        _ => Vec::new(),
    });
    let string_class = sim.builtin_class("NSString");
    let items = files
        .iter()
        .map(|file| sim.new_string(string_class, file))
        .collect();
    sim.autorelease_object(sim.new_array(items))
}

extern "C" fn notification_object(object: usize, _sel: usize) -> usize {
    sim().with_payload(object, |payload| match payload {
        Payload::Notification { object } => *object,
        _ => 0,
    })
}

extern "C" fn dragging_pasteboard(object: usize, _sel: usize) -> usize {
    sim().with_payload(object, |payload| match payload {
        Payload::DraggingInfo { pasteboard } => *pasteboard,
        _ => 0,
    })
}
