//! The upward interface: foreign events delivered to host delegates
//!
//! The bridge synthesizes two classes at start-up. The view class (a subclass
//! of the configured view superclass) carries a handle slot binding each
//! instance to a host [`WindowDelegate`] and forwards focus, input, resize,
//! close, and file-drop events to it. The application delegate class forwards
//! launch and termination to [`ApplicationHooks`].
//!
//! A view whose slot is empty, or whose entry was already removed, has no
//! delegate: its events are dropped quietly.

use crate::bridge::{bridge, Bridge};
use crate::class::{MethodCall, SynthesizedClass};
use crate::events;
use crate::handles::{handles, HandleId};
use crate::invoke;
use msgbridge_sdk::{Arg, BridgeError, BridgeResult, NSRect, NativeHandle, NativeStruct, ResultShape, Value};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// `NSTrackingMouseEnteredAndExited`
pub const TRACKING_MOUSE_ENTERED_AND_EXITED: u64 = 0x01;
/// `NSTrackingMouseMoved`
pub const TRACKING_MOUSE_MOVED: u64 = 0x02;
/// `NSTrackingActiveInKeyWindow`
pub const TRACKING_ACTIVE_IN_KEY_WINDOW: u64 = 0x20;
/// `NSDragOperationCopy`
pub const DRAG_OPERATION_COPY: u64 = 1;

/// Host receiver of window and view events. Every method defaults to a no-op.
///
/// Event handles are only valid for the duration of the call.
#[allow(unused_variables)]
pub trait WindowDelegate: Send + Sync {
    /// The window became key
    fn did_become_key(&self) {}
    /// The window stopped being key
    fn did_resign_key(&self) {}
    /// The window was resized
    fn did_resize(&self, window: NativeHandle) {}
    /// The user asked to close the window. The binding is torn down right
    /// after this returns.
    fn should_close(&self) {}
    /// Key pressed
    fn key_down(&self, event: NativeHandle) {}
    /// Key released
    fn key_up(&self, event: NativeHandle) {}
    /// Mouse button pressed
    fn mouse_down(&self, event: NativeHandle) {}
    /// Mouse button released
    fn mouse_up(&self, event: NativeHandle) {}
    /// Pointer moved
    fn mouse_moved(&self, event: NativeHandle) {}
    /// Pointer moved with a button held
    fn mouse_dragged(&self, event: NativeHandle) {}
    /// Scroll wheel or trackpad scroll
    fn scroll_wheel(&self, event: NativeHandle) {}
    /// Modifier keys changed
    fn flags_changed(&self, event: NativeHandle) {}
    /// Pinch gesture
    fn magnify(&self, event: NativeHandle) {}
    /// Rotate gesture
    fn rotate(&self, event: NativeHandle) {}
    /// Swipe gesture
    fn swipe(&self, event: NativeHandle) {}
    /// Files dropped onto the view
    fn files_dropped(&self, paths: Vec<String>) {}
}

/// What the handle table stores for a view
type DelegateRef = Arc<dyn WindowDelegate>;

type Hook = Arc<dyn Fn() + Send + Sync>;

/// Callbacks for the synthesized application delegate.
pub struct ApplicationHooks {
    did_finish_launching: RwLock<Option<Hook>>,
    will_terminate: RwLock<Option<Hook>>,
    terminate_after_last_window_closed: AtomicBool,
}

impl ApplicationHooks {
    pub(crate) fn new(terminate_after_last_window_closed: bool) -> Self {
        Self {
            did_finish_launching: RwLock::new(None),
            will_terminate: RwLock::new(None),
            terminate_after_last_window_closed: AtomicBool::new(terminate_after_last_window_closed),
        }
    }

    /// Run `f` once the application has finished launching
    pub fn set_did_finish_launching(&self, f: impl Fn() + Send + Sync + 'static) {
        *self.did_finish_launching.write() = Some(Arc::new(f));
    }

    /// Run `f` just before the application terminates
    pub fn set_will_terminate(&self, f: impl Fn() + Send + Sync + 'static) {
        *self.will_terminate.write() = Some(Arc::new(f));
    }

    /// Whether closing the last window quits the application
    pub fn set_terminate_after_last_window_closed(&self, terminate: bool) {
        self.terminate_after_last_window_closed
            .store(terminate, Ordering::Release);
    }

    /// Current answer to "terminate after last window closed"
    pub fn terminate_after_last_window_closed(&self) -> bool {
        self.terminate_after_last_window_closed
            .load(Ordering::Acquire)
    }

    fn fire(hook: &RwLock<Option<Hook>>) {
        // clone out so the hook may replace itself
        let hook = hook.read().clone();
        if let Some(hook) = hook {
            hook();
        }
    }
}

// ============================================================================
// View class
// ============================================================================

fn view_class() -> Arc<SynthesizedClass> {
    Arc::clone(&bridge().synthesized().view)
}

/// Delegate of the view receiving a callback
fn delegate_for(view: NativeHandle) -> Option<DelegateRef> {
    // SAFETY: only called with the receiver of a view-class method
    unsafe { view_class().delegate::<DelegateRef>(view) }.map(|delegate| Arc::clone(&*delegate))
}

fn forward(call: &MethodCall, f: impl FnOnce(&dyn WindowDelegate, NativeHandle)) -> Value {
    if let Some(delegate) = delegate_for(call.receiver) {
        f(delegate.as_ref(), call.object(0));
    }
    Value::Void
}

fn accepts_first_responder(_call: &MethodCall) -> Value {
    Value::Bool(true)
}

fn view_did_move_to_window(call: &MethodCall) -> Value {
    let bridge = bridge();
    // SAFETY: window is `@@:`, makeFirstResponder: is `B@:@`
    unsafe {
        let window: NativeHandle =
            invoke::send(bridge.runtime.as_ref(), call.receiver, bridge.sels.window, &[]);
        if !window.is_nil() {
            let accepted: bool = invoke::send(
                bridge.runtime.as_ref(),
                window,
                bridge.sels.make_first_responder,
                &[Arg::object(call.receiver)],
            );
            tracing::debug!(view = %call.receiver, window = %window, accepted, "view moved to window");
        }
    }
    Value::Void
}

fn update_tracking_areas(call: &MethodCall) -> Value {
    let bridge = bridge();
    let runtime = bridge.runtime.as_ref();
    let view = call.receiver;
    let sels = &bridge.sels;
    // SAFETY: every selector below is sent with its documented AppKit signature
    unsafe {
        invoke::invoke_super(
            runtime,
            view,
            call.class,
            sels.update_tracking_areas,
            &[],
            &ResultShape::Void,
        );

        let existing: NativeHandle = invoke::send(runtime, view, sels.tracking_areas, &[]);
        for area in bridge.array_items(existing) {
            invoke::send::<()>(runtime, view, sels.remove_tracking_area, &[Arg::object(area)]);
        }

        let frame: NSRect = invoke::send(runtime, view, sels.frame, &[]);
        let options =
            TRACKING_MOUSE_MOVED | TRACKING_ACTIVE_IN_KEY_WINDOW | TRACKING_MOUSE_ENTERED_AND_EXITED;
        let allocated: NativeHandle =
            invoke::send(runtime, bridge.classes.tracking_area, sels.alloc, &[]);
        let area: NativeHandle = invoke::send(
            runtime,
            allocated,
            sels.init_tracking_area,
            &[frame.to_arg(), Arg::U64(options), Arg::object(view), Arg::nil()],
        );
        if !area.is_nil() {
            invoke::send::<()>(runtime, view, sels.add_tracking_area, &[Arg::object(area)]);
            bridge.release(area);
        }
    }
    Value::Void
}

fn dragging_entered(_call: &MethodCall) -> Value {
    Value::UInt(DRAG_OPERATION_COPY)
}

fn perform_drag_operation(call: &MethodCall) -> Value {
    let bridge = bridge();
    // SAFETY: draggingPasteboard is `@@:`
    let pasteboard: NativeHandle = unsafe {
        invoke::send(
            bridge.runtime.as_ref(),
            call.object(0),
            bridge.sels.dragging_pasteboard,
            &[],
        )
    };
    if pasteboard.is_nil() {
        return Value::Bool(false);
    }
    // SAFETY: draggingPasteboard answered a live pasteboard
    let paths = unsafe { events::file_paths_from_pasteboard(pasteboard) };
    if paths.is_empty() {
        return Value::Bool(false);
    }
    match delegate_for(call.receiver) {
        Some(delegate) => {
            tracing::debug!(view = %call.receiver, files = paths.len(), "files dropped");
            delegate.files_dropped(paths);
            Value::Bool(true)
        }
        None => Value::Bool(false),
    }
}

fn window_should_close(call: &MethodCall) -> Value {
    let class = view_class();
    if let Some(delegate) = delegate_for(call.receiver) {
        delegate.should_close();
    }
    // SAFETY: the receiver is a live instance of the view class
    unsafe {
        if let Some(id) = class.handle_of(call.receiver) {
            handles().remove(id);
            class.set_handle(call.receiver, None);
            tracing::debug!(view = %call.receiver, handle = %id, "released view delegate");
        }
    }
    Value::Bool(true)
}

fn window_did_resize(call: &MethodCall) -> Value {
    let Some(delegate) = delegate_for(call.receiver) else {
        return Value::Void;
    };
    let bridge = bridge();
    // SAFETY: object is `@@:`
    let window: NativeHandle = unsafe {
        invoke::send(bridge.runtime.as_ref(), call.object(0), bridge.sels.object, &[])
    };
    delegate.did_resize(window);
    Value::Void
}

// ============================================================================
// Application delegate class
// ============================================================================

fn application_did_finish_launching(_call: &MethodCall) -> Value {
    tracing::info!("application finished launching");
    ApplicationHooks::fire(&bridge().hooks.did_finish_launching);
    Value::Void
}

fn application_should_terminate_after_last_window_closed(_call: &MethodCall) -> Value {
    Value::Bool(bridge().hooks.terminate_after_last_window_closed())
}

fn application_will_terminate(_call: &MethodCall) -> Value {
    tracing::info!("application will terminate");
    ApplicationHooks::fire(&bridge().hooks.will_terminate);
    Value::Void
}

impl Bridge {
    pub(crate) fn define_view_class(&self) -> Arc<SynthesizedClass> {
        let superclass = match self.class_named(&self.options.view_superclass) {
            Ok(class) => class,
            Err(e) => fatal!("view superclass unavailable: {}", e),
        };
        self.define_class(&self.options.class_name("View"), superclass)
            .add_handle_slot()
            .add_method("acceptsFirstResponder", "B@:", accepts_first_responder)
            .add_method("viewDidMoveToWindow", "v@:", view_did_move_to_window)
            .add_method("updateTrackingAreas", "v@:", update_tracking_areas)
            .add_method("keyDown:", "v@:@", |c| forward(c, |d, e| d.key_down(e)))
            .add_method("keyUp:", "v@:@", |c| forward(c, |d, e| d.key_up(e)))
            .add_method("mouseDown:", "v@:@", |c| forward(c, |d, e| d.mouse_down(e)))
            .add_method("mouseUp:", "v@:@", |c| forward(c, |d, e| d.mouse_up(e)))
            .add_method("mouseMoved:", "v@:@", |c| forward(c, |d, e| d.mouse_moved(e)))
            .add_method("mouseDragged:", "v@:@", |c| forward(c, |d, e| d.mouse_dragged(e)))
            .add_method("scrollWheel:", "v@:@", |c| forward(c, |d, e| d.scroll_wheel(e)))
            .add_method("flagsChanged:", "v@:@", |c| forward(c, |d, e| d.flags_changed(e)))
            .add_method("magnifyWithEvent:", "v@:@", |c| forward(c, |d, e| d.magnify(e)))
            .add_method("rotateWithEvent:", "v@:@", |c| forward(c, |d, e| d.rotate(e)))
            .add_method("swipeWithEvent:", "v@:@", |c| forward(c, |d, e| d.swipe(e)))
            .add_method("windowDidBecomeKey:", "v@:@", |c| forward(c, |d, _| d.did_become_key()))
            .add_method("windowDidResignKey:", "v@:@", |c| forward(c, |d, _| d.did_resign_key()))
            .add_method("draggingEntered:", "Q@:@", dragging_entered)
            .add_method("performDragOperation:", "B@:@", perform_drag_operation)
            .add_method("windowShouldClose:", "B@:@", window_should_close)
            .add_method("windowDidResize:", "v@:@", window_did_resize)
            .publish()
    }

    pub(crate) fn define_app_delegate_class(&self) -> Arc<SynthesizedClass> {
        self.define_class(&self.options.class_name("AppDelegate"), self.classes.object)
            .add_method(
                "applicationDidFinishLaunching:",
                "v@:@",
                application_did_finish_launching,
            )
            .add_method(
                "applicationShouldTerminateAfterLastWindowClosed:",
                "B@:@",
                application_should_terminate_after_last_window_closed,
            )
            .add_method("applicationWillTerminate:", "v@:@", application_will_terminate)
            .publish()
    }

    /// The synthesized view class
    pub fn view_class(&self) -> Arc<SynthesizedClass> {
        Arc::clone(&self.synthesized().view)
    }

    /// The synthesized application delegate class
    pub fn app_delegate_class(&self) -> Arc<SynthesizedClass> {
        Arc::clone(&self.synthesized().app_delegate)
    }

    /// Application lifecycle hooks
    pub fn hooks(&self) -> &ApplicationHooks {
        &self.hooks
    }

    /// New instance of the synthesized view class with the given frame; the
    /// caller owns it
    pub fn create_view(&self, frame: NSRect) -> BridgeResult<NativeHandle> {
        let class = self.view_class();
        // SAFETY: alloc is `@@:`, initWithFrame: is `@@:{CGRect=...}`
        let view: NativeHandle = unsafe {
            let allocated: NativeHandle =
                invoke::send(self.runtime.as_ref(), class.handle(), self.sels.alloc, &[]);
            invoke::send(
                self.runtime.as_ref(),
                allocated,
                self.sel("initWithFrame:"),
                &[frame.to_arg()],
            )
        };
        view.non_nil()
            .ok_or_else(|| BridgeError::nil("initWithFrame:"))
    }

    /// Bind `view` to `delegate`, replacing any earlier binding. The entry is
    /// released when the window asks to close.
    ///
    /// # Safety
    ///
    /// `view` must be a live instance of the synthesized view class, such as
    /// one returned by [`Bridge::create_view`].
    pub unsafe fn attach_delegate(
        &self,
        view: NativeHandle,
        delegate: Arc<dyn WindowDelegate>,
    ) -> HandleId {
        let class = self.view_class();
        if let Some(previous) = class.handle_of(view) {
            handles().remove(previous);
        }
        let id = handles().store_value::<DelegateRef>(delegate);
        class.set_handle(view, Some(id));
        tracing::debug!(view = %view, handle = %id, "attached view delegate");
        id
    }

    /// Host delegate currently bound to `view`
    ///
    /// # Safety
    ///
    /// As for [`Bridge::attach_delegate`], or nil.
    pub unsafe fn delegate_of(&self, view: NativeHandle) -> Option<Arc<dyn WindowDelegate>> {
        self.view_class()
            .delegate::<DelegateRef>(view)
            .map(|delegate| Arc::clone(&*delegate))
    }
}
