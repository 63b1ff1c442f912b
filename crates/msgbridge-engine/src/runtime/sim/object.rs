//! Objects and classes of the simulated runtime

use msgbridge_sdk::{NSPoint, NSRect, Scalar};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::ffi::CString;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Built-in storage shape inherited by every subclass of a built-in class.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Kind {
    Plain,
    Pool,
    Number,
    Str,
    Array,
    View,
    Window,
    TrackingArea,
    Event,
    Pasteboard,
    Notification,
    DraggingInfo,
}

/// Input event fields reported by the simulated `NSEvent` accessors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimEvent {
    /// Hardware key code
    pub key_code: u16,
    /// Modifier flag mask
    pub modifier_flags: u64,
    /// Typed characters
    pub characters: String,
    /// Location in window coordinates
    pub location: NSPoint,
    /// Precise horizontal scroll delta
    pub scrolling_delta_x: f64,
    /// Precise vertical scroll delta
    pub scrolling_delta_y: f64,
    /// Mouse button number
    pub button_number: i64,
    /// Click count
    pub click_count: i64,
    /// Gesture phase mask
    pub phase: u64,
    /// Magnification gesture amount
    pub magnification: f64,
    /// Rotation gesture amount in degrees
    pub rotation: f32,
    /// Swipe horizontal delta
    pub delta_x: f64,
    /// Swipe vertical delta
    pub delta_y: f64,
}

/// Per-kind object state.
#[derive(Debug)]
pub(crate) enum Payload {
    Plain,
    Pool,
    Number(u64),
    Str(CString),
    Array(Vec<usize>),
    View {
        frame: NSRect,
        window: usize,
        tracking: Vec<usize>,
    },
    Window {
        first_responder: usize,
    },
    TrackingArea {
        rect: NSRect,
        options: u64,
        owner: usize,
    },
    Event(SimEvent),
    Pasteboard {
        files: Vec<String>,
    },
    Notification {
        object: usize,
    },
    DraggingInfo {
        pasteboard: usize,
    },
}

impl Payload {
    pub(crate) fn empty(kind: Kind) -> Self {
        match kind {
            Kind::Plain => Payload::Plain,
            Kind::Pool => Payload::Pool,
            Kind::Number => Payload::Number(0),
            Kind::Str => Payload::Str(CString::default()),
            Kind::Array => Payload::Array(Vec::new()),
            Kind::View => Payload::View {
                frame: NSRect::default(),
                window: 0,
                tracking: Vec::new(),
            },
            Kind::Window => Payload::Window { first_responder: 0 },
            Kind::TrackingArea => Payload::TrackingArea {
                rect: NSRect::default(),
                options: 0,
                owner: 0,
            },
            Kind::Event => Payload::Event(SimEvent::default()),
            Kind::Pasteboard => Payload::Pasteboard { files: Vec::new() },
            Kind::Notification => Payload::Notification { object: 0 },
            Kind::DraggingInfo => Payload::DraggingInfo { pasteboard: 0 },
        }
    }

    /// Objects this payload holds a strong reference to
    pub(crate) fn owned_references(&self) -> Vec<usize> {
        match self {
            Payload::Array(items) => items.clone(),
            Payload::View { tracking, .. } => tracking.clone(),
            Payload::Notification { object } => vec![*object],
            Payload::DraggingInfo { pasteboard } => vec![*pasteboard],
            _ => Vec::new(),
        }
        .into_iter()
        .filter(|addr| *addr != 0)
        .collect()
    }
}

/// A live object.
#[derive(Debug)]
pub(crate) struct SimObject {
    pub(crate) class: usize,
    refcount: AtomicUsize,
    pub(crate) ivars: Mutex<HashMap<String, u64>>,
    pub(crate) payload: Mutex<Payload>,
}

impl SimObject {
    pub(crate) fn new(class: usize, ivars: &[(String, Scalar)], payload: Payload) -> Self {
        Self {
            class,
            refcount: AtomicUsize::new(1),
            ivars: Mutex::new(ivars.iter().map(|(name, _)| (name.clone(), 0)).collect()),
            payload: Mutex::new(payload),
        }
    }

    pub(crate) fn retain(&self) -> usize {
        self.refcount.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Returns the remaining count
    pub(crate) fn release(&self) -> usize {
        let previous = self.refcount.fetch_sub(1, Ordering::AcqRel);
        if previous == 0 {
            fatal!("over-release of simulated object");
        }
        previous - 1
    }

    pub(crate) fn retain_count(&self) -> usize {
        self.refcount.load(Ordering::Acquire)
    }
}

/// A class, built-in or synthesized.
#[derive(Debug)]
pub(crate) struct SimClass {
    pub(crate) name: String,
    pub(crate) superclass: usize,
    pub(crate) metaclass: usize,
    pub(crate) kind: Option<Kind>,
    pub(crate) instance_methods: HashMap<usize, usize>,
    pub(crate) class_methods: HashMap<usize, usize>,
    pub(crate) ivars: Vec<(String, Scalar)>,
    pub(crate) registered: bool,
}

impl SimClass {
    pub(crate) fn new(name: &str, superclass: usize, metaclass: usize, kind: Option<Kind>) -> Self {
        Self {
            name: name.to_string(),
            superclass,
            metaclass,
            kind,
            instance_methods: HashMap::new(),
            class_methods: HashMap::new(),
            ivars: Vec::new(),
            registered: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refcount() {
        let object = SimObject::new(0x10, &[], Payload::Plain);
        assert_eq!(object.retain_count(), 1);
        assert_eq!(object.retain(), 2);
        assert_eq!(object.release(), 1);
        assert_eq!(object.release(), 0);
    }

    #[test]
    fn test_ivars_start_empty() {
        let ivars = vec![("hostHandle".to_string(), Scalar::U64)];
        let object = SimObject::new(0x10, &ivars, Payload::Plain);
        assert_eq!(object.ivars.lock().get("hostHandle"), Some(&0));
    }

    #[test]
    fn test_owned_references_skip_nil() {
        let payload = Payload::Notification { object: 0 };
        assert!(payload.owned_references().is_empty());
        let payload = Payload::Array(vec![0x20, 0x30]);
        assert_eq!(payload.owned_references(), vec![0x20, 0x30]);
    }
}
