//! Pointer and keyboard ownership shared by every form known to a dispatcher
use crate::{core::keys::ModMask, pure::geometry::Point, FormId, ObjectId, Xid};
use std::time::Duration;

/// The last known pointer state and how many idle passes ago it was refreshed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PointerSnapshot {
    /// The window the position is relative to
    pub win: Option<Xid>,
    /// Position relative to `win`
    pub pos: Point,
    /// Held buttons and modifiers
    pub state: ModMask,
    pub(crate) age: u32,
}

impl PointerSnapshot {
    pub(crate) fn update(&mut self, win: Xid, pos: Point, state: ModMask) {
        self.win = Some(win);
        self.pos = pos;
        self.state = state;
        self.age = 0;
    }

    pub(crate) fn tick(&mut self) {
        self.age = self.age.saturating_add(1);
    }

    /// Whether the snapshot has gone unrefreshed for at least `max_age` idle passes.
    pub fn is_stale(&self, max_age: u32) -> bool {
        self.age >= max_age
    }
}

/// Tracks repeated pushes of the same object for double and triple click detection.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ClickTracker {
    obj: Option<ObjectId>,
    time: u32,
    count: u32,
}

impl ClickTracker {
    /// Record a push of `obj` at server time `time`, returning the click count: 1 for a single
    /// click, 2 for a double click and 3 for a triple click. A fourth click starts over.
    pub(crate) fn register(&mut self, obj: ObjectId, time: u32, timeout: Duration) -> u32 {
        let within = time.wrapping_sub(self.time) as u128 <= timeout.as_millis();

        self.count = if self.obj == Some(obj) && within && self.count < 3 {
            self.count + 1
        } else {
            1
        };
        self.obj = Some(obj);
        self.time = time;

        self.count
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Which form and object currently own the pointer and keyboard.
///
/// There is a single pointer so there is at most one capturing object across all forms, and a
/// single object under the mouse. Keyboard focus is held per form (see
/// [Form::focus][crate::core::form::Form::focus]) with `keyboard_form` naming the form that
/// receives key events.
#[derive(Debug, Default, Clone)]
pub struct InteractionContext {
    pub(crate) mouse_form: Option<FormId>,
    pub(crate) keyboard_form: Option<FormId>,
    pub(crate) pushobj: Option<ObjectId>,
    pub(crate) mouseobj: Option<ObjectId>,
    pub(crate) pointer: PointerSnapshot,
    pub(crate) clicks: ClickTracker,
}

impl InteractionContext {
    /// The form the pointer is currently over.
    pub fn mouse_form(&self) -> Option<FormId> {
        self.mouse_form
    }

    /// The form currently receiving key events.
    pub fn keyboard_form(&self) -> Option<FormId> {
        self.keyboard_form
    }

    /// The object currently capturing the pointer.
    pub fn pushobj(&self) -> Option<ObjectId> {
        self.pushobj
    }

    /// The object currently under the pointer.
    pub fn mouseobj(&self) -> Option<ObjectId> {
        self.mouseobj
    }

    /// The last known pointer state.
    pub fn pointer(&self) -> &PointerSnapshot {
        &self.pointer
    }

    /// Drop any reference to an object that is being removed.
    pub(crate) fn forget_object(&mut self, id: ObjectId) {
        if self.pushobj == Some(id) {
            self.pushobj = None;
        }
        if self.mouseobj == Some(id) {
            self.mouseobj = None;
        }
        if self.clicks.obj == Some(id) {
            self.clicks.reset();
        }
    }

    /// Drop any reference to a form that is being hidden or freed.
    pub(crate) fn forget_form(&mut self, id: FormId) {
        if self.mouse_form == Some(id) {
            self.mouse_form = None;
        }
        if self.keyboard_form == Some(id) {
            self.keyboard_form = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simple_test_case::test_case;

    const TIMEOUT: Duration = Duration::from_millis(400);

    #[test_case(&[(1, 0)], 1; "single click")]
    #[test_case(&[(1, 0), (1, 100)], 2; "double click")]
    #[test_case(&[(1, 0), (1, 100), (1, 200)], 3; "triple click")]
    #[test_case(&[(1, 0), (1, 100), (1, 200), (1, 300)], 1; "fourth click starts over")]
    #[test_case(&[(1, 0), (1, 500)], 1; "too slow")]
    #[test_case(&[(1, 0), (2, 100)], 1; "different object")]
    #[test_case(&[(1, u32::MAX - 50), (1, 50)], 2; "server time wraps")]
    #[test]
    fn click_counting(clicks: &[(u32, u32)], expected: u32) {
        let mut t = ClickTracker::default();
        let mut count = 0;
        for (obj, time) in clicks {
            count = t.register(ObjectId(*obj), *time, TIMEOUT);
        }

        assert_eq!(count, expected);
    }

    #[test]
    fn forgetting_an_object_clears_every_reference() {
        let mut ix = InteractionContext {
            pushobj: Some(ObjectId(1)),
            mouseobj: Some(ObjectId(1)),
            ..Default::default()
        };
        ix.clicks.register(ObjectId(1), 0, TIMEOUT);
        ix.forget_object(ObjectId(1));

        assert_eq!(ix.pushobj(), None);
        assert_eq!(ix.mouseobj(), None);
        assert_eq!(ix.clicks, ClickTracker::default());
    }

    #[test]
    fn pointer_snapshot_ages() {
        let mut p = PointerSnapshot::default();
        p.update(Xid(1), Point::new(1, 2), ModMask::empty());
        p.tick();

        assert!(!p.is_stale(2));
        p.tick();
        assert!(p.is_stale(2));
    }
}
