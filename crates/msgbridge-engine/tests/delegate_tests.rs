mod common;

use msgbridge_engine::delegate::{
    DRAG_OPERATION_COPY, TRACKING_ACTIVE_IN_KEY_WINDOW, TRACKING_MOUSE_ENTERED_AND_EXITED,
    TRACKING_MOUSE_MOVED,
};
use msgbridge_engine::events;
use msgbridge_engine::runtime::sim::SimEvent;
use msgbridge_engine::{handles, Arg, NSPoint, NSRect, NativeHandle, ResultShape, WindowDelegate};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Default)]
struct Recorder {
    log: Mutex<Vec<String>>,
}

impl Recorder {
    fn push(&self, entry: String) {
        self.log.lock().push(entry);
    }

    fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.log.lock())
    }
}

impl WindowDelegate for Recorder {
    fn did_become_key(&self) {
        self.push("key".into());
    }

    fn did_resign_key(&self) {
        self.push("resign".into());
    }

    fn did_resize(&self, window: NativeHandle) {
        self.push(format!("resize {}", window.as_raw()));
    }

    fn should_close(&self) {
        self.push("close".into());
    }

    fn key_down(&self, event: NativeHandle) {
        self.push(format!(
            "down {} {:?} {:#x}",
            unsafe { events::key_code(event) },
            unsafe { events::characters(event) },
            unsafe { events::modifier_flags(event) }
        ));
    }

    fn mouse_down(&self, event: NativeHandle) {
        let location = unsafe { events::location_in_window(event) };
        self.push(format!(
            "click {} {} at {},{}",
            unsafe { events::button_number(event) },
            unsafe { events::click_count(event) },
            location.x,
            location.y
        ));
    }

    fn scroll_wheel(&self, event: NativeHandle) {
        let (dx, dy) = unsafe { events::scrolling_delta(event) };
        self.push(format!("scroll {} {} phase {}", dx, dy, unsafe { events::phase(event) }));
    }

    fn magnify(&self, event: NativeHandle) {
        self.push(format!("magnify {}", unsafe { events::magnification(event) }));
    }

    fn rotate(&self, event: NativeHandle) {
        self.push(format!("rotate {}", unsafe { events::rotation(event) }));
    }

    fn swipe(&self, event: NativeHandle) {
        let (dx, dy) = unsafe { events::translation(event) };
        self.push(format!("swipe {} {}", dx, dy));
    }

    fn files_dropped(&self, paths: Vec<String>) {
        self.push(format!("drop {}", paths.join(",")));
    }
}

fn send_event(view: NativeHandle, selector: &str, event: NativeHandle) {
    let bridge = common::bridge();
    bridge.with_scope(|_| unsafe {
        bridge.invoke(view, bridge.sel(selector), &[Arg::object(event)], &ResultShape::Void);
    });
}

fn new_view() -> NativeHandle {
    common::bridge()
        .create_view(NSRect::new(0.0, 0.0, 800.0, 600.0))
        .unwrap()
}

// ============================================================================
// Input Events
// ============================================================================

#[test]
fn test_input_events_reach_delegate() {
    let bridge = common::bridge();
    let sim = common::sim();
    let view = new_view();
    let recorder = Arc::new(Recorder::default());
    unsafe { bridge.attach_delegate(view, recorder.clone()) };

    let key = sim.make_event(SimEvent {
        key_code: 12,
        characters: "q".into(),
        modifier_flags: 0x10_0000,
        ..Default::default()
    });
    send_event(view, "keyDown:", key);

    let click = sim.make_event(SimEvent {
        button_number: 1,
        click_count: 2,
        location: NSPoint::new(15.5, 40.0),
        ..Default::default()
    });
    send_event(view, "mouseDown:", click);

    let scroll = sim.make_event(SimEvent {
        scrolling_delta_x: -1.5,
        scrolling_delta_y: 3.0,
        phase: 4,
        ..Default::default()
    });
    send_event(view, "scrollWheel:", scroll);

    let gesture = sim.make_event(SimEvent {
        magnification: 0.25,
        rotation: 90.0,
        delta_x: 1.0,
        delta_y: -1.0,
        ..Default::default()
    });
    send_event(view, "magnifyWithEvent:", gesture);
    send_event(view, "rotateWithEvent:", gesture);
    send_event(view, "swipeWithEvent:", gesture);

    assert_eq!(
        recorder.take(),
        vec![
            "down 12 \"q\" 0x100000".to_string(),
            "click 1 2 at 15.5,40".to_string(),
            "scroll -1.5 3 phase 4".to_string(),
            "magnify 0.25".to_string(),
            "rotate 90".to_string(),
            "swipe 1 -1".to_string(),
        ]
    );

    for event in [key, click, scroll, gesture] {
        unsafe { bridge.release(event) };
    }
    unsafe { bridge.release(view) };
}

#[test]
fn test_unbound_view_drops_events() {
    let bridge = common::bridge();
    let sim = common::sim();
    let view = new_view();
    assert!(unsafe { bridge.delegate_of(view) }.is_none());

    let key = sim.make_event(SimEvent::default());
    send_event(view, "keyDown:", key);
    send_event(view, "windowDidBecomeKey:", NativeHandle::NIL);

    unsafe { bridge.release(key) };
    unsafe { bridge.release(view) };
}

// ============================================================================
// Window Lifecycle
// ============================================================================

#[test]
fn test_focus_and_resize() {
    let bridge = common::bridge();
    let sim = common::sim();
    let view = new_view();
    let recorder = Arc::new(Recorder::default());
    unsafe { bridge.attach_delegate(view, recorder.clone()) };

    let window = sim.make_window();
    let notification = sim.make_notification(window);
    send_event(view, "windowDidBecomeKey:", notification);
    send_event(view, "windowDidResize:", notification);
    send_event(view, "windowDidResignKey:", notification);

    assert_eq!(
        recorder.take(),
        vec![
            "key".to_string(),
            format!("resize {}", window.as_raw()),
            "resign".to_string(),
        ]
    );

    unsafe { bridge.release(notification) };
    unsafe { bridge.release(window) };
    unsafe { bridge.release(view) };
}

#[test]
fn test_close_releases_the_handle() {
    let bridge = common::bridge();
    let sim = common::sim();
    let view = new_view();
    let recorder = Arc::new(Recorder::default());
    let id = unsafe { bridge.attach_delegate(view, recorder.clone()) };
    assert!(handles().lookup(id).is_some());
    assert!(unsafe { bridge.delegate_of(view) }.is_some());

    let should_close: bool =
        unsafe { bridge.send(view, bridge.sel("windowShouldClose:"), &[Arg::nil()]) };
    assert!(should_close);
    assert!(handles().lookup(id).is_none());
    assert_eq!(unsafe { bridge.view_class().handle_of(view) }, None);
    assert!(unsafe { bridge.delegate_of(view) }.is_none());

    // events after teardown are dropped
    let key = sim.make_event(SimEvent::default());
    send_event(view, "keyDown:", key);
    assert_eq!(recorder.take(), vec!["close".to_string()]);

    // the bridge held the only other reference
    assert_eq!(Arc::strong_count(&recorder), 1);

    unsafe { bridge.release(key) };
    unsafe { bridge.release(view) };
}

#[test]
fn test_reattach_replaces_previous_delegate() {
    let bridge = common::bridge();
    let view = new_view();
    let first = Arc::new(Recorder::default());
    let second = Arc::new(Recorder::default());

    let first_id = unsafe { bridge.attach_delegate(view, first.clone()) };
    let second_id = unsafe { bridge.attach_delegate(view, second.clone()) };
    assert_ne!(first_id, second_id);
    assert!(handles().lookup(first_id).is_none());
    assert_eq!(unsafe { bridge.view_class().handle_of(view) }, Some(second_id));

    send_event(view, "windowDidBecomeKey:", NativeHandle::NIL);
    assert!(first.take().is_empty());
    assert_eq!(second.take(), vec!["key".to_string()]);

    handles().remove(second_id);
    unsafe { bridge.release(view) };
}

// ============================================================================
// Responder and Tracking Areas
// ============================================================================

#[test]
fn test_view_becomes_first_responder() {
    let bridge = common::bridge();
    let sim = common::sim();
    let view = new_view();
    let window = sim.make_window();

    let accepts: bool = unsafe { bridge.send(view, bridge.sel("acceptsFirstResponder"), &[]) };
    assert!(accepts);

    sim.attach_view(window, view);
    let responder: NativeHandle =
        unsafe { bridge.send(window, bridge.sel("firstResponder"), &[]) };
    assert_eq!(responder, view);

    unsafe { bridge.release(view) };
    unsafe { bridge.release(window) };
}

#[test]
fn test_tracking_area_is_rebuilt_from_frame() {
    let bridge = common::bridge();
    let view = new_view();
    let update = bridge.sels().update_tracking_areas;

    bridge.with_scope(|_| unsafe {
        bridge.invoke(view, update, &[], &ResultShape::Void);
        bridge.invoke(view, update, &[], &ResultShape::Void);
    });

    bridge.with_scope(|_| {
        let areas: NativeHandle = unsafe { bridge.send(view, bridge.sels().tracking_areas, &[]) };
        let items = unsafe { bridge.array_items(areas) };
        assert_eq!(items.len(), 1);

        let area = items[0];
        let rect: NSRect = unsafe { bridge.send(area, bridge.sel("rect"), &[]) };
        let options: u64 = unsafe { bridge.send(area, bridge.sel("options"), &[]) };
        let owner: NativeHandle = unsafe { bridge.send(area, bridge.sel("owner"), &[]) };
        assert_eq!(rect, NSRect::new(0.0, 0.0, 800.0, 600.0));
        assert_eq!(
            options,
            TRACKING_MOUSE_MOVED | TRACKING_ACTIVE_IN_KEY_WINDOW | TRACKING_MOUSE_ENTERED_AND_EXITED
        );
        assert_eq!(owner, view);
    });

    unsafe { bridge.release(view) };
}

// ============================================================================
// File Drops
// ============================================================================

#[test]
fn test_file_drop() {
    let bridge = common::bridge();
    let sim = common::sim();
    let view = new_view();
    let recorder = Arc::new(Recorder::default());
    unsafe { bridge.attach_delegate(view, recorder.clone()) };

    let pasteboard = sim.make_pasteboard(&["/tmp/a.png", "/tmp/b.txt"]);
    let info = sim.make_dragging_info(pasteboard);

    let operation: u64 =
        unsafe { bridge.send(view, bridge.sel("draggingEntered:"), &[Arg::object(info)]) };
    assert_eq!(operation, DRAG_OPERATION_COPY);

    let accepted = bridge.with_scope(|_| unsafe {
        bridge.send::<bool>(view, bridge.sel("performDragOperation:"), &[Arg::object(info)])
    });
    assert!(accepted);
    assert_eq!(recorder.take(), vec!["drop /tmp/a.png,/tmp/b.txt".to_string()]);

    let paths = bridge.with_scope(|_| unsafe { events::file_paths_from_pasteboard(pasteboard) });
    assert_eq!(paths, vec!["/tmp/a.png".to_string(), "/tmp/b.txt".to_string()]);

    unsafe { bridge.release(info) };
    unsafe { bridge.release(pasteboard) };
    unsafe { bridge.release(view) };
}

#[test]
fn test_empty_drop_is_refused() {
    let bridge = common::bridge();
    let sim = common::sim();
    let view = new_view();
    let recorder = Arc::new(Recorder::default());
    unsafe { bridge.attach_delegate(view, recorder.clone()) };

    let pasteboard = sim.make_pasteboard(&[]);
    let info = sim.make_dragging_info(pasteboard);
    let accepted = bridge.with_scope(|_| unsafe {
        bridge.send::<bool>(view, bridge.sel("performDragOperation:"), &[Arg::object(info)])
    });
    assert!(!accepted);
    assert!(recorder.take().is_empty());
    assert!(unsafe { events::file_paths_from_pasteboard(NativeHandle::NIL) }.is_empty());

    unsafe { bridge.release(info) };
    unsafe { bridge.release(pasteboard) };
    unsafe { bridge.release(view) };
}

// ============================================================================
// Application Delegate
// ============================================================================

#[test]
fn test_application_hooks() {
    let bridge = common::bridge();
    let delegate = bridge.app_delegate_class().instantiate().unwrap();
    let launched = Arc::new(AtomicUsize::new(0));
    let terminating = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&launched);
    bridge.hooks().set_did_finish_launching(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let counter = Arc::clone(&terminating);
    bridge.hooks().set_will_terminate(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let notify = |selector: &str| unsafe {
        bridge.invoke(delegate, bridge.sel(selector), &[Arg::nil()], &ResultShape::Void);
    };
    notify("applicationDidFinishLaunching:");
    notify("applicationWillTerminate:");
    assert_eq!(launched.load(Ordering::SeqCst), 1);
    assert_eq!(terminating.load(Ordering::SeqCst), 1);

    let should_terminate = bridge.sel("applicationShouldTerminateAfterLastWindowClosed:");
    let answer: bool = unsafe { bridge.send(delegate, should_terminate, &[Arg::nil()]) };
    assert!(answer);

    bridge.hooks().set_terminate_after_last_window_closed(false);
    let answer: bool = unsafe { bridge.send(delegate, should_terminate, &[Arg::nil()]) };
    assert!(!answer);
    bridge.hooks().set_terminate_after_last_window_closed(true);

    unsafe { bridge.release(delegate) };
}
