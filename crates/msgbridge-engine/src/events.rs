//! Accessors for input events and drag pasteboards
//!
//! Delegate callbacks receive raw event handles; these read the fields host
//! code usually wants. All of them go through the process-wide bridge. They
//! are `unsafe` because the handle must still name a live event of the right
//! kind, which holds inside the callback that received it.

use crate::bridge::bridge;
use msgbridge_sdk::{Arg, FromValue, NSPoint, NativeHandle, Sel};

/// Every accessor below names a zero-argument getter with the result type it
/// is decoded as; the caller vouches for the event.
unsafe fn read<R: FromValue>(event: NativeHandle, pick: impl FnOnce(&crate::Selectors) -> Sel) -> R {
    let bridge = bridge();
    let sel = pick(&bridge.sels);
    crate::invoke::send(bridge.runtime.as_ref(), event, sel, &[])
}

/// Pointer location in window coordinates
///
/// # Safety
///
/// `event` must be a live event of a kind that carries this field.
pub unsafe fn location_in_window(event: NativeHandle) -> NSPoint {
    read(event, |s| s.location_in_window)
}

/// Hardware key code
///
/// # Safety
///
/// `event` must be a live event of a kind that carries this field.
pub unsafe fn key_code(event: NativeHandle) -> u16 {
    read(event, |s| s.key_code)
}

/// Modifier flag mask
///
/// # Safety
///
/// `event` must be a live event of a kind that carries this field.
pub unsafe fn modifier_flags(event: NativeHandle) -> u64 {
    read(event, |s| s.modifier_flags)
}

/// Characters produced by a key event; empty for nil
///
/// # Safety
///
/// `event` must be a live event of a kind that carries this field.
pub unsafe fn characters(event: NativeHandle) -> String {
    let bridge = bridge();
    let string: NativeHandle = read(event, |s| s.characters);
    bridge.string_from(string)
}

/// Precise scroll deltas `(x, y)`
///
/// # Safety
///
/// `event` must be a live event of a kind that carries this field.
pub unsafe fn scrolling_delta(event: NativeHandle) -> (f64, f64) {
    (
        read(event, |s| s.scrolling_delta_x),
        read(event, |s| s.scrolling_delta_y),
    )
}

/// Mouse button number
///
/// # Safety
///
/// `event` must be a live event of a kind that carries this field.
pub unsafe fn button_number(event: NativeHandle) -> i64 {
    read(event, |s| s.button_number)
}

/// Click count of a mouse event
///
/// # Safety
///
/// `event` must be a live event of a kind that carries this field.
pub unsafe fn click_count(event: NativeHandle) -> i64 {
    read(event, |s| s.click_count)
}

/// Gesture phase mask
///
/// # Safety
///
/// `event` must be a live event of a kind that carries this field.
pub unsafe fn phase(event: NativeHandle) -> u64 {
    read(event, |s| s.phase)
}

/// Magnification amount of a pinch gesture
///
/// # Safety
///
/// `event` must be a live event of a kind that carries this field.
pub unsafe fn magnification(event: NativeHandle) -> f64 {
    read(event, |s| s.magnification)
}

/// Rotation of a rotate gesture, in degrees
///
/// # Safety
///
/// `event` must be a live event of a kind that carries this field.
pub unsafe fn rotation(event: NativeHandle) -> f32 {
    read(event, |s| s.rotation)
}

/// Swipe translation `(x, y)`
///
/// # Safety
///
/// `event` must be a live event of a kind that carries this field.
pub unsafe fn translation(event: NativeHandle) -> (f64, f64) {
    (read(event, |s| s.delta_x), read(event, |s| s.delta_y))
}

/// File paths on a pasteboard; empty if it holds none
///
/// # Safety
///
/// `pasteboard` must be nil or a live pasteboard.
pub unsafe fn file_paths_from_pasteboard(pasteboard: NativeHandle) -> Vec<String> {
    let bridge = bridge();
    if pasteboard.is_nil() {
        return Vec::new();
    }
    // propertyListForType: is `@@:@` and answers an array of strings
    let list: NativeHandle = crate::invoke::send(
        bridge.runtime.as_ref(),
        pasteboard,
        bridge.sels.property_list_for_type,
        &[Arg::object(bridge.constants.file_url_type)],
    );
    bridge
        .array_items(list)
        .into_iter()
        .map(|item| bridge.string_from(item))
        .filter(|path| !path.is_empty())
        .collect()
}
