//! Object, string, number, and array helpers
//!
//! Thin wrappers over the invoker for the handful of foundation messages the
//! bridge and its callers need everywhere. Each one has a fixed, known
//! signature. Helpers that only message classes the bridge resolved itself
//! are safe; helpers that message a caller-supplied handle are `unsafe`,
//! because a stale or wrong-class handle is undefined behavior on the
//! platform runtime.

use crate::bridge::Bridge;
use crate::invoke;
use msgbridge_sdk::{Arg, BridgeError, BridgeResult, FromValue, NativeHandle, Sel};
use std::ffi::{c_char, CStr, CString};

impl Bridge {
    /// # Safety
    ///
    /// `receiver` must be nil or a live object that responds to `sel` with
    /// the signature `args` and `R` describe.
    unsafe fn send_fixed<R: FromValue>(&self, receiver: NativeHandle, sel: Sel, args: &[Arg]) -> R {
        invoke::send(self.runtime.as_ref(), receiver, sel, args)
    }

    /// Selector for `name`, registered on first use
    pub fn sel(&self, name: &str) -> Sel {
        self.selectors.get(self.runtime.as_ref(), name)
    }

    /// Name of a registered selector
    pub fn selector_name(&self, sel: Sel) -> Option<String> {
        self.runtime.selector_name(sel)
    }

    /// Class by name
    pub fn class_named(&self, name: &str) -> BridgeResult<NativeHandle> {
        self.runtime
            .class_named(name)
            .non_nil()
            .ok_or_else(|| BridgeError::ClassNotFound(name.to_string()))
    }

    /// Exported object constant, e.g. `NSPasteboardTypeFileURL`
    pub fn constant(&self, name: &str) -> BridgeResult<NativeHandle> {
        self.runtime
            .constant(name)
            .and_then(NativeHandle::non_nil)
            .ok_or_else(|| BridgeError::ConstantNotFound(name.to_string()))
    }

    /// `[[class alloc] init]`; the caller owns the result
    ///
    /// # Safety
    ///
    /// `class` must be a class handle obtained from the runtime.
    pub unsafe fn alloc_init(&self, class: NativeHandle) -> BridgeResult<NativeHandle> {
        let allocated: NativeHandle = self.send_fixed(class, self.sels.alloc, &[]);
        let object: NativeHandle = self.send_fixed(allocated, self.sels.init, &[]);
        object.non_nil().ok_or_else(|| BridgeError::nil("alloc/init"))
    }

    /// `retain`
    ///
    /// # Safety
    ///
    /// `object` must be nil or a live object.
    pub unsafe fn retain(&self, object: NativeHandle) -> NativeHandle {
        self.send_fixed(object, self.sels.retain, &[])
    }

    /// `release`
    ///
    /// # Safety
    ///
    /// `object` must be nil or a live object the caller owns a reference to.
    pub unsafe fn release(&self, object: NativeHandle) {
        self.send_fixed::<()>(object, self.sels.release, &[])
    }

    /// `autorelease`
    ///
    /// # Safety
    ///
    /// `object` must be nil or a live object the caller owns a reference to.
    pub unsafe fn autorelease(&self, object: NativeHandle) -> NativeHandle {
        self.send_fixed(object, self.sels.autorelease, &[])
    }

    /// `retainCount`
    ///
    /// # Safety
    ///
    /// `object` must be nil or a live object.
    pub unsafe fn retain_count(&self, object: NativeHandle) -> u64 {
        self.send_fixed(object, self.sels.retain_count, &[])
    }

    /// Autoreleased string object holding `text`
    pub fn ns_string(&self, text: &str) -> BridgeResult<NativeHandle> {
        let c_text = CString::new(text)?;
        // SAFETY: the string class answers stringWithUTF8String: as `@@:*`
        let string: NativeHandle = unsafe {
            self.send_fixed(
                self.classes.string,
                self.sels.string_with_utf8,
                &[Arg::CString(c_text)],
            )
        };
        string
            .non_nil()
            .ok_or_else(|| BridgeError::nil("stringWithUTF8String:"))
    }

    /// Host copy of a string object; nil gives an empty string
    ///
    /// # Safety
    ///
    /// `string` must be nil or a live string object.
    pub unsafe fn string_from(&self, string: NativeHandle) -> String {
        if string.is_nil() {
            return String::new();
        }
        let ptr: NativeHandle = self.send_fixed(string, self.sels.utf8_string, &[]);
        if ptr.is_nil() {
            return String::new();
        }
        // UTF8String returns a NUL-terminated buffer that lives at least as
        // long as the enclosing autorelease scope
        CStr::from_ptr(ptr.as_raw() as *const c_char)
            .to_string_lossy()
            .into_owned()
    }

    /// Autoreleased number object
    pub fn number_u64(&self, value: u64) -> NativeHandle {
        // SAFETY: the number class answers numberWithUnsignedLongLong: as `@@:Q`
        unsafe { self.send_fixed(self.classes.number, self.sels.number_with_u64, &[Arg::U64(value)]) }
    }

    /// `unsignedLongLongValue` of a number object
    ///
    /// # Safety
    ///
    /// `number` must be nil or a live number object.
    pub unsafe fn number_value(&self, number: NativeHandle) -> u64 {
        self.send_fixed(number, self.sels.u64_value, &[])
    }

    /// Autoreleased empty array
    pub fn empty_array(&self) -> NativeHandle {
        // SAFETY: the array class answers +array as `@@:`
        unsafe { self.send_fixed(self.classes.array, self.sels.array, &[]) }
    }

    /// `count` of an array; 0 for nil
    ///
    /// # Safety
    ///
    /// `array` must be nil or a live array object.
    pub unsafe fn array_count(&self, array: NativeHandle) -> u64 {
        self.send_fixed(array, self.sels.count, &[])
    }

    /// Every element of an array, in order
    ///
    /// # Safety
    ///
    /// `array` must be nil or a live array object.
    pub unsafe fn array_items(&self, array: NativeHandle) -> Vec<NativeHandle> {
        (0..self.array_count(array))
            .map(|index| self.send_fixed(array, self.sels.object_at_index, &[Arg::U64(index)]))
            .collect()
    }
}
